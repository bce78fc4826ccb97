//! Testing utilities for relive workspace
//!
//! Scripted unit sources standing in for a real compiler, and the two-unit
//! fixture most scenario tests start from.

#![allow(missing_docs)]

use anyhow::{anyhow, bail};
use parking_lot::RwLock;
use relive_core::{Recompiler, ReloadConfig, Reloader};
use relive_object::{Callable, ExportTable, TypeDef, Unit, UnitRegistry, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Source of a unit: builds its export table against the current registry
pub type Script = Arc<dyn Fn(&Arc<Unit>, &UnitRegistry) -> anyhow::Result<ExportTable> + Send + Sync>;

/// Editable map of unit name to source script
#[derive(Default)]
pub struct ScriptedSources {
    scripts: RwLock<HashMap<String, Script>>,
    compiles: AtomicU32,
}

impl ScriptedSources {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the source of `unit`
    pub fn set(&self, unit: &str, script: Script) {
        self.scripts.write().insert(unit.to_string(), script);
    }

    /// Alias of [`ScriptedSources::set`] that reads better in tests
    pub fn edit(&self, unit: &str, script: Script) {
        self.set(unit, script);
    }

    /// First import: run the script and install its table
    pub fn load(&self, registry: &UnitRegistry, name: &str) -> anyhow::Result<Arc<Unit>> {
        let unit = registry.load(name);
        let table = self.recompile(&unit, registry)?;
        unit.merge(table);
        Ok(unit)
    }

    /// Number of times any script has run
    pub fn compiles(&self) -> u32 {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl Recompiler for ScriptedSources {
    fn recompile(&self, unit: &Arc<Unit>, registry: &UnitRegistry) -> anyhow::Result<ExportTable> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .read()
            .get(unit.name())
            .cloned()
            .ok_or_else(|| anyhow!("no source for unit '{}'", unit.name()))?;
        script(unit, registry)
    }
}

/// Script that always fails with `message`
pub fn broken(message: &'static str) -> Script {
    Arc::new(move |_: &Arc<Unit>, _: &UnitRegistry| -> anyhow::Result<ExportTable> { bail!(message) })
}

/// Unit `b`: function `f` and type `C` with method `m`, both returning `label`
pub fn b_source(label: &'static str) -> Script {
    Arc::new(move |unit: &Arc<Unit>, _: &UnitRegistry| -> anyhow::Result<ExportTable> {
        let f = Callable::new(unit, "f", move |_, _| Ok(Value::from(label)));
        let c = TypeDef::builder(unit, "C")
            .method("m", move |_, _| Ok(Value::from(label)))
            .build();
        Ok(ExportTable::new().with("f", f).with("C", c))
    })
}

/// Unit `a`, which uses `b` every way it can:
/// - `b`: the unit itself (qualified access)
/// - `f`, `C`: direct imports
/// - `D`: subtype of `C` without its own `m`
/// - `b_direct`, `b_through_mod`: call `f` and `b.f`
/// - `obj`, `sub`: instances of `C` and `D`
pub fn a_source() -> Script {
    Arc::new(|unit: &Arc<Unit>, registry: &UnitRegistry| -> anyhow::Result<ExportTable> {
        let b = registry.get("b").ok_or_else(|| anyhow!("unit 'b' is not loaded"))?;
        let f = b.get("f").ok_or_else(|| anyhow!("b.f is not defined"))?;
        let c = b
            .get("C")
            .and_then(|v| v.as_type().cloned())
            .ok_or_else(|| anyhow!("b.C is not a type"))?;
        let d = TypeDef::builder(unit, "D").extends(&c).build();
        let obj = c.construct(&[])?;
        let sub = d.construct(&[])?;

        Ok(ExportTable::new()
            .with("b", Arc::clone(&b))
            .with("f", f)
            .with("C", c)
            .with("D", d)
            .with("b_direct", Callable::new(unit, "b_direct", |frame, args| frame.call("f", args)))
            .with(
                "b_through_mod",
                Callable::new(unit, "b_through_mod", |frame, args| frame.call("b.f", args)),
            )
            .with("obj", obj)
            .with("sub", sub))
    })
}

/// Units `a` and `b` loaded from [`a_source`] and [`b_source`]
pub struct TwoUnits {
    pub registry: Arc<UnitRegistry>,
    pub sources: Arc<ScriptedSources>,
    pub a: Arc<Unit>,
    pub b: Arc<Unit>,
}

impl TwoUnits {
    /// Load `b` returning "b", then `a`
    pub fn new() -> Self {
        let registry = Arc::new(UnitRegistry::new());
        let sources = ScriptedSources::new();
        sources.set("b", b_source("b"));
        sources.set("a", a_source());
        let b = sources.load(&registry, "b").expect("load b");
        let a = sources.load(&registry, "a").expect("load a");
        Self {
            registry,
            sources,
            a,
            b,
        }
    }

    /// Change what `b`'s definitions return on the next reload
    pub fn edit_b(&self, label: &'static str) {
        self.sources.edit("b", b_source(label));
    }

    /// Reloader over this fixture with default configuration
    pub fn reloader(&self) -> Reloader {
        self.reloader_with(ReloadConfig::default())
    }

    pub fn reloader_with(&self, config: ReloadConfig) -> Reloader {
        let recompiler: Arc<dyn Recompiler> = Arc::clone(&self.sources) as Arc<dyn Recompiler>;
        Reloader::new(Arc::clone(&self.registry), recompiler).with_config(config)
    }

    /// Call export `name` of `a` with no arguments and return its string
    pub fn call_a(&self, name: &str) -> String {
        let value = self.a.get(name).expect("export exists").call(&[]).expect("call succeeds");
        value.as_str().expect("string result").to_string()
    }

    /// Call method `m` on export `name` of `a`
    pub fn method_on(&self, name: &str) -> String {
        let value = self.a.get(name).expect("export exists");
        let object = value.as_object().expect("instance");
        let out = object.call_method("m", &[]).expect("m succeeds");
        out.as_str().expect("string result").to_string()
    }
}

impl Default for TwoUnits {
    fn default() -> Self {
        Self::new()
    }
}
