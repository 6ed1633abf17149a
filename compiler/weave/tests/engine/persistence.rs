//! Flushing generated code and loading it back.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use weave::{FlushError, LoadError, LoadReport, Participant};
use weave_emit::PersistedModule;

use crate::support::{class, widget, Harness, Logging, Versioned};

#[test]
fn flush_writes_one_module_per_context_with_new_code() {
    let harness = Harness::new();
    let engine = harness.engine(2, vec![Logging::shared()], &[]);

    engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    let first = engine.flush().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(first, vec![Some(harness.path().join("proxies.0.1.weave")), None]);

    engine.get_or_create(&class("Other")).unwrap_or_else(|e| panic!("{e}"));
    engine.get_or_create(&class("Third")).unwrap_or_else(|e| panic!("{e}"));
    let mut second = engine.flush().unwrap_or_else(|e| panic!("{e}"));
    second.sort();
    assert_eq!(
        second,
        vec![
            Some(harness.path().join("proxies.0.2.weave")),
            Some(harness.path().join("proxies.1.1.weave")),
        ]
    );

    let module = PersistedModule::read(&harness.path().join("proxies.0.1.weave")).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(module.configuration_id, "logging");
    assert_eq!(module.types.len(), 1);
    assert_eq!(module.types[0].name.as_str(), "Widget_Proxy_1");
}

#[test]
fn failed_context_flush_is_aggregated() {
    let harness = Harness::new();
    let engine = harness.engine(3, vec![Logging::shared()], &[1]);

    // Sequential requests rotate through the pool: one type per context.
    for name in ["A", "B", "C"] {
        engine.get_or_create(&class(name)).unwrap_or_else(|e| panic!("{e}"));
    }

    match engine.flush() {
        Err(FlushError::Contexts { failures }) => {
            let failed: Vec<_> = failures.iter().map(|f| f.context).collect();
            assert_eq!(failed, vec![1]);
            assert!(failures[0].to_string().contains("volume is read-only"));
        }
        other => panic!("expected a flush failure, got {other:?}"),
    }
    assert_eq!(engine.pool().available(), 3);
    assert!(harness.path().join("proxies.0.1.weave").exists());
    assert!(harness.path().join("proxies.2.1.weave").exists());
    assert!(!harness.path().join("proxies.1.1.weave").exists());
}

#[test]
fn reload_serves_flushed_proxies_without_building() {
    let harness = Harness::new();
    let source = harness.engine(1, vec![Logging::shared()], &[]);
    let original = source.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    source.flush().unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(harness.counter.builds(), 1);

    let target = harness.engine(1, vec![Logging::shared()], &[]);
    let report = target
        .load_flushed_file(&harness.path().join("proxies.0.1.weave"))
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        report,
        LoadReport {
            loaded: 1,
            duplicates: 0,
            additional: 0,
        }
    );

    let loaded = target.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(loaded.name(), original.name());
    assert_eq!(loaded.image(), original.image());
    assert_eq!(harness.counter.builds(), 1);
}

#[test]
fn reload_keeps_existing_entries() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![Logging::shared()], &[]);
    let cached = engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    engine.flush().unwrap_or_else(|e| panic!("{e}"));

    let report = engine
        .load_flushed_file(&harness.path().join("proxies.0.1.weave"))
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.loaded, 0);
    assert_eq!(engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}")), cached);
}

#[test]
fn reload_rejects_another_participant_configuration() {
    let harness = Harness::new();
    let source = harness.engine(1, vec![Logging::shared()], &[]);
    source.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    source.flush().unwrap_or_else(|e| panic!("{e}"));

    let target = harness.engine(1, vec![Versioned::new(1) as Arc<dyn Participant>], &[]);
    match target.load_flushed_file(&harness.path().join("proxies.0.1.weave")) {
        Err(LoadError::ConfigurationMismatch { expected, found }) => {
            assert_eq!(expected, "versioned");
            assert_eq!(found, "logging");
        }
        other => panic!("expected a configuration mismatch, got {other:?}"),
    }
    assert_eq!(target.cached_types(), 0);
}
