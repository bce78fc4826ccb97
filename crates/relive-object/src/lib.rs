//! relive object model
//!
//! The runtime surface that live reloading operates on.
//!
//! # Overview
//!
//! - **Unit**: a named, mutable export table (`name -> Value`)
//! - **Definition**: a [`Callable`] or a [`TypeDef`], compared by identity
//! - **TypeDef**: ordered ancestors, weakly tracked subtypes, members with an
//!   explicit [`Binding`] kind, and a storage [`Layout`]
//! - **Instance**: a live object whose dynamic type can be retargeted
//! - **ObjectEnumerator**: best-effort enumeration of live instances
//!
//! # Example
//!
//! ```rust
//! use relive_object::{Callable, UnitRegistry, Value};
//!
//! let registry = UnitRegistry::new();
//! let unit = registry.load("greet");
//!
//! let hello = Callable::new(&unit, "hello", |_frame, _args| Ok(Value::from("hi")));
//! unit.set("hello", Value::from(hello));
//!
//! let out = unit.get("hello").unwrap().call(&[]).unwrap();
//! assert_eq!(out.as_str(), Some("hi"));
//! ```

#![warn(missing_docs)]

pub mod definition;
pub mod error;
pub mod instance;
pub mod name;
pub mod types;
pub mod unit;
pub mod value;

// Re-exports
pub use definition::{Callable, DefId, Definition, DefinitionKind, Frame};
pub use error::{CallError, IntrospectError, RetypeError};
pub use instance::{Instance, InstanceRegistry, ObjectEnumerator};
pub use name::{QualifiedName, UnitName};
pub use types::{Binding, Layout, Member, TypeBuilder, TypeDef};
pub use unit::{ExportTable, Unit, UnitRegistry};
pub use value::Value;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building units and definitions
    pub use crate::{
        Binding, CallError, Callable, Definition, ExportTable, Frame, Instance, Layout, Member,
        ObjectEnumerator, QualifiedName, TypeDef, Unit, UnitRegistry, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
