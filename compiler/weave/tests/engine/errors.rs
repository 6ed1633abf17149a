//! Error reporting through the engine.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use weave::{AssemblyError, Engine, FlushError, IdentityError, Participant, ParticipantError, PoolError, ProxyContext};
use weave_emit::{EmitError, Phase};
use weave_ir::{Name, TypeSpec};

use crate::support::{widget, Harness, Logging};

struct SelfReferencing;

impl Participant for SelfReferencing {
    fn name(&self) -> &Name {
        static NAME: std::sync::OnceLock<Name> = std::sync::OnceLock::new();
        NAME.get_or_init(|| Name::new("self-referencing"))
    }

    fn participate(&self, _: Option<&weave::IdentityPart>, cx: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        let proxy = cx.proxy_name().clone();
        let holder = cx.create_additional_type(format!("{proxy}.Holder"), "object");
        holder.add_uses_type(proxy);
        Ok(())
    }
}

#[test]
fn backend_failure_names_request_and_participants() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![Logging::shared(), Arc::new(SelfReferencing) as Arc<dyn Participant>], &[]);

    harness.counter.fail_next_finalize.store(true, Ordering::SeqCst);
    match engine.get_or_create(&widget()) {
        Err(AssemblyError::Backend {
            requested,
            participants,
            source,
        }) => {
            assert_eq!(requested.as_str(), "Widget");
            assert_eq!(
                participants,
                vec![Name::new("logging"), Name::new("self-referencing")]
            );
            assert!(matches!(
                source,
                EmitError::Backend {
                    phase: Phase::Finalize,
                    ..
                }
            ));
        }
        other => panic!("expected a backend failure, got {other:?}"),
    }
    assert_eq!(engine.cached_types(), 0);
    // The failed batch left nothing behind to flush.
    assert_eq!(engine.flush().unwrap_or_else(|e| panic!("{e}")), vec![None]);

    let ty = engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(ty.name().as_str(), "Widget_Proxy_2");
    assert_eq!(harness.counter.builds(), 1);
}

#[test]
fn backend_error_message_lists_participants() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![Logging::shared()], &[]);
    harness.counter.fail_next_finalize.store(true, Ordering::SeqCst);

    let message = engine
        .get_or_create(&widget())
        .map(|_| ())
        .map_err(|e| e.to_string())
        .err()
        .unwrap_or_else(|| panic!("expected a failure"));
    assert!(message.contains("`Widget`"), "{message}");
    assert!(message.contains("participants: logging"), "{message}");
}

#[test]
fn identity_errors_reach_the_caller() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![], &[]);

    let interface = Arc::new(TypeSpec::interface("IWidget"));
    assert!(matches!(
        engine.get_or_create(&interface),
        Err(AssemblyError::Identity(IdentityError::Interface(_)))
    ));
    assert_eq!(engine.pool().available(), 1);
}

/// Flushes its own engine in the middle of a build.
struct Flusher {
    name: Name,
    engine: OnceLock<Weak<Engine>>,
    outcome: Mutex<Option<FlushError>>,
}

impl Participant for Flusher {
    fn name(&self) -> &Name {
        &self.name
    }

    fn participate(&self, _: Option<&weave::IdentityPart>, _: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        let engine = self
            .engine
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ParticipantError::failed("engine dropped"))?;
        if let Err(err) = engine.flush() {
            *self.outcome.lock() = Some(err);
        }
        Ok(())
    }
}

#[test]
fn flush_during_a_build_fails_instead_of_waiting() {
    let harness = Harness::new();
    let flusher = Arc::new(Flusher {
        name: Name::new("flusher"),
        engine: OnceLock::new(),
        outcome: Mutex::new(None),
    });
    let engine = Arc::new(harness.engine(2, vec![Arc::clone(&flusher) as Arc<dyn Participant>], &[]));
    assert!(flusher.engine.set(Arc::downgrade(&engine)).is_ok());

    engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    match flusher.outcome.lock().take() {
        Some(FlushError::Pool(PoolError::DrainWhileHolding { .. })) => {}
        other => panic!("expected a drain refusal, got {other:?}"),
    }
    assert_eq!(engine.pool().available(), 2);
    engine.flush().unwrap_or_else(|e| panic!("{e}"));
}
