use pretty_assertions::assert_eq;
use proptest::prelude::*;
use relive_core::{Level, ReloadConfig, ReloadError, ReloadEventKind, Reloader};
use relive_object::{ExportTable, Layout, TypeDef, Unit, UnitRegistry};
use relive_test_utils::{broken, ScriptedSources, Script, TwoUnits};
use std::sync::Arc;

#[test]
fn test_failing_unit_is_reported_once_and_batch_continues() {
    let fixture = TwoUnits::new();
    fixture.sources.edit("b", broken("unexpected indent"));
    let config = ReloadConfig::new().with_retry_budget(3);

    let report = fixture.reloader_with(config).reload(&["b", "a"]).unwrap();

    let failure = report.failed("b").unwrap();
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.detail, "unexpected indent");
    assert_eq!(report.reloaded, vec!["a".to_string()]);
    assert_eq!(report.events_at(Level::Error).count(), 1);
    // b keeps its old definitions and so does everything pointing at them
    assert_eq!(fixture.call_a("f"), "b");
    assert_eq!(fixture.method_on("obj"), "b");
}

#[test]
fn test_default_budget_is_ten_attempts() {
    let fixture = TwoUnits::new();
    fixture.sources.edit("b", broken("nope"));
    let before = fixture.sources.compiles();

    let report = fixture.reloader().reload_unit("b").unwrap();

    assert_eq!(report.failed("b").unwrap().attempts, 10);
    assert_eq!(fixture.sources.compiles() - before, 10);
}

#[test]
fn test_missing_source_is_a_recompile_failure() {
    let registry = Arc::new(UnitRegistry::new());
    registry.load("orphan");
    let sources = ScriptedSources::new();
    let reloader = Reloader::new(registry, sources).with_config(ReloadConfig::new().with_retry_budget(1));

    let report = reloader.reload_unit("orphan").unwrap();

    assert!(report.failed("orphan").unwrap().detail.contains("no source"));
}

#[test]
fn test_unknown_unit_changes_nothing() {
    let fixture = TwoUnits::new();
    fixture.edit_b("b2");
    let before = fixture.sources.compiles();

    let err = fixture.reloader().reload(&["b", "missing"]).unwrap_err();

    assert!(matches!(err, ReloadError::UnknownUnit(_)));
    assert_eq!(fixture.sources.compiles(), before);
    assert_eq!(fixture.call_a("f"), "b");
}

#[test]
fn test_rejected_retype_is_journaled_at_debug() {
    let registry = Arc::new(UnitRegistry::new());
    let sources = ScriptedSources::new();
    let native: Script = Arc::new(|unit: &Arc<Unit>, _: &UnitRegistry| -> anyhow::Result<ExportTable> {
        Ok(ExportTable::new().with("N", TypeDef::builder(unit, "N").layout(Layout::Native).build()))
    });
    sources.set("host", native);
    let host = sources.load(&registry, "host").unwrap();
    let old = host.get("N").unwrap().as_type().cloned().unwrap();
    let obj = old.construct(&[]).unwrap();

    let reloader = Reloader::new(Arc::clone(&registry), sources);
    let report = reloader.reload_unit("host").unwrap();

    assert!(report.is_clean());
    assert_eq!(report.stats.instances_rejected, 1);
    assert!(Arc::ptr_eq(&obj.type_def(), &old));
    let rejected: Vec<_> = report
        .events_at(Level::Debug)
        .filter(|e| matches!(e.kind, ReloadEventKind::RetypeRejected { .. }))
        .collect();
    assert_eq!(rejected.len(), 1);
}

proptest! {
    #[test]
    fn prop_flaky_unit_succeeds_iff_failures_fit_budget(fail_times in 0u32..8, budget in 1u32..8) {
        let fixture = TwoUnits::new();
        let remaining = Arc::new(std::sync::atomic::AtomicU32::new(fail_times));
        let flaky: Script = {
            let remaining = Arc::clone(&remaining);
            Arc::new(move |unit: &Arc<Unit>, registry: &UnitRegistry| -> anyhow::Result<ExportTable> {
                let left = remaining.load(std::sync::atomic::Ordering::SeqCst);
                if left > 0 {
                    remaining.store(left - 1, std::sync::atomic::Ordering::SeqCst);
                    anyhow::bail!("flaky");
                }
                relive_test_utils::b_source("b2")(unit, registry)
            })
        };
        fixture.sources.edit("b", flaky);
        let config = ReloadConfig::new().with_retry_budget(budget);

        let report = fixture.reloader_with(config).reload_unit("b").unwrap();

        if fail_times < budget {
            prop_assert!(report.failures.is_empty());
            prop_assert_eq!(fixture.call_a("f"), "b2");
        } else {
            prop_assert_eq!(report.failures.len(), 1);
            prop_assert_eq!(fixture.call_a("f"), "b");
        }
    }
}
