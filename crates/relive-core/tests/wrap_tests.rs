use pretty_assertions::assert_eq;
use relive_core::{ReloadEventKind, Reloader, WrapOptions};
use relive_object::{Binding, Callable, ExportTable, TypeDef, Unit, UnitRegistry, Value};
use relive_test_utils::{ScriptedSources, Script, TwoUnits};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting(calls: &Arc<AtomicUsize>) -> impl Fn(&Arc<Callable>, &str) -> Arc<Callable> + Send + Sync {
    let calls = Arc::clone(calls);
    move |original: &Arc<Callable>, _: &str| {
        let inner = Arc::clone(original);
        let calls = Arc::clone(&calls);
        Callable::wrapping(original, move |_, args| {
            calls.fetch_add(1, Ordering::SeqCst);
            inner.call(args)
        })
    }
}

#[test]
fn test_wrap_reaches_importers_and_instances() {
    let fixture = TwoUnits::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = fixture.reloader().wrap_unit("b", &counting(&calls)).unwrap();

    assert_eq!(fixture.call_a("f"), "b");
    assert_eq!(fixture.call_a("b_through_mod"), "b");
    assert_eq!(fixture.method_on("obj"), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.stats.bindings_repointed, 1);
    assert_eq!(report.stats.subtypes_repointed, 0);
}

#[test]
fn test_wrap_passes_qualified_names() {
    let fixture = TwoUnits::new();
    let seen = parking_lot::Mutex::new(Vec::new());
    let wrapper = |original: &Arc<Callable>, name: &str| {
        seen.lock().push(name.to_string());
        Arc::clone(original)
    };

    let report = fixture.reloader().wrap_unit("b", &wrapper).unwrap();

    assert_eq!(*seen.lock(), vec!["b.f".to_string(), "b.C.m".to_string()]);
    let wrapped = report
        .events
        .iter()
        .filter(|e| matches!(e.kind, ReloadEventKind::Wrapped { .. }))
        .count();
    assert_eq!(wrapped, 2);
}

#[test]
fn test_member_filter() {
    let fixture = TwoUnits::new();
    let calls = Arc::new(AtomicUsize::new(0));

    fixture
        .reloader()
        .wrap_with(&["b"], &counting(&calls), &WrapOptions::only_members(["other"]))
        .unwrap();

    assert_eq!(fixture.method_on("obj"), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.call_a("f"), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wrap_then_reload() {
    let fixture = TwoUnits::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let reloader = fixture.reloader();
    reloader.wrap(&["b"], &counting(&calls)).unwrap();

    fixture.edit_b("b2");
    reloader.reload_unit("b").unwrap();

    assert_eq!(fixture.call_a("f"), "b2");
    assert_eq!(
        fixture.a.get("b_direct").unwrap().call(&[]).unwrap(),
        Value::from("b2")
    );
    // the reload replaced the wrapped definitions
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_wrapped_static_member_keeps_binding() {
    let registry = Arc::new(UnitRegistry::new());
    let sources = ScriptedSources::new();
    let script: Script = Arc::new(|unit: &Arc<Unit>, _: &UnitRegistry| -> anyhow::Result<ExportTable> {
        let s = TypeDef::builder(unit, "S")
            .static_method("answer", |_, args| {
                assert!(args.is_empty(), "static members get no receiver");
                Ok(Value::Int(100))
            })
            .build();
        Ok(ExportTable::new().with("S", s))
    });
    sources.set("s", script);
    let unit = sources.load(&registry, "s").unwrap();
    let ty = unit.get("S").unwrap().as_type().cloned().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = Reloader::new(Arc::clone(&registry), sources)
        .wrap_with(&["s"], &counting(&calls), &WrapOptions::new())
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(ty.own_member("answer").unwrap().binding(), Binding::Static);
    assert_eq!(ty.call_member("answer", &[]).unwrap(), Value::Int(100));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
