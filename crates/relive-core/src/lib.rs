//! relive core - reload engine
//!
//! Replaces the code behind live units and repairs every reference the
//! running object graph still holds to the old code:
//! - External bindings: copies of a definition held by other units
//! - Subtype relations: ancestor-list entries of types elsewhere
//! - Live instances: objects whose dynamic type was redefined
//!
//! # Pipeline
//!
//! 1. Snapshot the target units (staleness set by identity)
//! 2. Build the reference and instance caches
//! 3. Recompile each unit (retry/skip policy) or wrap its callables
//! 4. Propagate new definitions through the caches
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use relive_core::Reloader;
//! use relive_object::{Callable, ExportTable, Unit, UnitRegistry, Value};
//!
//! let registry = Arc::new(UnitRegistry::new());
//! let b = registry.load("b");
//! b.set("f", Callable::new(&b, "f", |_, _| Ok(Value::from("b"))));
//! let a = registry.load("a");
//! a.set("f", b.get("f").unwrap());
//!
//! let recompile = |unit: &Arc<Unit>, _: &UnitRegistry| -> anyhow::Result<ExportTable> {
//!     Ok(ExportTable::new().with("f", Callable::new(unit, "f", |_, _| Ok(Value::from("b2")))))
//! };
//! let reloader = Reloader::new(Arc::clone(&registry), Arc::new(recompile));
//! let report = reloader.reload_unit("b").unwrap();
//!
//! assert!(report.is_clean());
//! assert_eq!(a.get("f").unwrap().call(&[]).unwrap(), Value::from("b2"));
//! ```
//!
//! # Concurrency
//!
//! One reload or wrap call runs at a time per [`Reloader`]; a second call
//! while one is in flight fails with [`ReloadError::Busy`]. All caches belong
//! to a [`ReloadSession`] that lives for exactly one call.
//!
//! The guard does not reach across reloaders. Callers must serialize calls
//! on two [`Reloader`]s when their target sets overlap, or when they share a
//! registry and some unit holds definitions of targets of both. Running
//! those concurrently can leave a holder pointing at either generation.
//! Reloaders over disjoint targets with disjoint holders may run in
//! parallel.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod index;
pub mod journal;
pub mod logging;
pub mod propagate;
pub mod reloader;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod state_machine;
pub mod wrap;

// Re-exports for convenience
pub use cache::{ExternalBinding, InstanceCache, ReferenceCache};
pub use config::{InstallMode, ReloadConfig, DEFAULT_RETRY_BUDGET};
pub use driver::Recompiler;
pub use error::{ConfigError, RecompileFailure, ReloadError};
pub use journal::{Journal, Level, ReloadEvent, ReloadEventKind, SessionId};
pub use propagate::PropagationStats;
pub use reloader::Reloader;
pub use report::ReloadReport;
pub use session::ReloadSession;
pub use snapshot::Snapshot;
pub use state_machine::UnitState;
pub use wrap::{WrapOptions, Wrapper};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving reloads
    pub use crate::{
        InstallMode, Recompiler, ReloadConfig, ReloadError, ReloadReport, Reloader, WrapOptions,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
