//! Cache behavior seen through the engine.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use weave::{AssemblyError, Engine, IdentityPart, Participant, ParticipantError, ProxyContext};
use weave_emit::GeneratedType;
use weave_ir::{Access, Body, Name};

use crate::support::{class, widget, Harness, Logging, Versioned};

#[test]
fn repeated_requests_share_one_build() {
    let harness = Harness::new();
    let engine = harness.engine(2, vec![Logging::shared()], &[]);

    let first = engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    let second = engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(first, second);
    assert_eq!(harness.counter.builds(), 1);
    assert_eq!(engine.cached_types(), 1);

    let render = first
        .image()
        .method("Render")
        .unwrap_or_else(|| panic!("Render was not overridden"));
    assert_eq!(
        render.body,
        Some(Body::Sequence(vec![Body::opaque("enter()"), Body::opaque("log()")]))
    );
}

#[test]
fn concurrent_requests_build_at_most_once() {
    let harness = Harness::new();
    let engine = harness.engine(4, vec![Logging::shared()], &[]);
    let requested = widget();

    let results = std::thread::scope(|s| {
        let workers: Vec<_> = (0..16)
            .map(|_| s.spawn(|| engine.get_or_create(&requested)))
            .collect();
        workers
            .into_iter()
            .map(|w| {
                w.join()
                    .unwrap_or_else(|_| panic!("worker panicked"))
                    .unwrap_or_else(|e| panic!("{e}"))
            })
            .collect::<Vec<_>>()
    });

    assert_eq!(harness.counter.builds(), 1);
    assert!(results.iter().all(|ty| *ty == results[0]));
}

#[test]
fn distinct_requests_build_separately() {
    let harness = Harness::new();
    let engine = harness.engine(2, vec![Logging::shared()], &[]);

    let names = ["A", "B", "C", "D"];
    std::thread::scope(|s| {
        for name in names {
            let engine = &engine;
            s.spawn(move || {
                for _ in 0..3 {
                    engine.get_or_create(&class(name)).unwrap_or_else(|e| panic!("{e}"));
                }
            });
        }
    });
    assert_eq!(harness.counter.builds(), names.len());
    assert_eq!(engine.cached_types(), names.len());
}

#[test]
fn identifier_part_reaches_the_participant() {
    let harness = Harness::new();
    let v1 = harness.engine(1, vec![Versioned::new(1) as Arc<dyn Participant>], &[]);
    let ty = v1.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert!(ty.image().fields.iter().any(|f| f.name.as_str() == "__version"));

    let identity = v1.identify(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(identity.parts(), &[weave::IdentityPart::Int(1)]);
}

#[test]
fn failed_build_caches_nothing_and_can_be_retried() {
    let harness = Harness::new();
    let versioned = Versioned::new(3);
    let engine = harness.engine(1, vec![Arc::clone(&versioned) as Arc<dyn Participant>], &[]);

    versioned.broken.store(true, Ordering::SeqCst);
    let err = engine.get_or_create(&widget());
    match err {
        Err(AssemblyError::Participant { participant, .. }) => assert_eq!(participant.as_str(), "versioned"),
        other => panic!("expected a participant failure, got {other:?}"),
    }
    assert_eq!(engine.cached_types(), 0);
    assert_eq!(engine.pool().available(), 1);

    versioned.broken.store(false, Ordering::SeqCst);
    let ty = engine.get_or_create(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(engine.cached_types(), 1);
    assert_eq!(harness.counter.builds(), 1);
    // The failed attempt still used up a type number.
    assert_eq!(ty.name().as_str(), "Widget_Proxy_2");
}

#[test]
fn constructor_shortcuts() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![Logging::shared()], &[]);
    let requested = widget();
    let string = [Name::new("string")];

    let default = engine
        .get_or_create_constructor_call(&requested, &[], false)
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(default.access, Access::Public);

    match engine.get_or_create_constructor_call(&requested, &string, false) {
        Err(AssemblyError::ConstructorNotFound { ty, reason, .. }) => {
            assert_eq!(ty, *default.ty.name());
            assert_eq!(reason, "the matching constructor is not public");
        }
        other => panic!("expected a missing constructor, got {other:?}"),
    }

    let protected = engine
        .get_or_create_constructor_call(&requested, &string, true)
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(protected.params, string.to_vec());
    assert_eq!(protected.ty, default.ty);
    assert_eq!(harness.counter.builds(), 1);
}

/// Requests `Inner` from its own engine while building anything else.
struct Nester {
    name: Name,
    engine: OnceLock<Weak<Engine>>,
    built: Mutex<Option<GeneratedType>>,
}

impl Participant for Nester {
    fn name(&self) -> &Name {
        &self.name
    }

    fn participate(&self, _: Option<&IdentityPart>, cx: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        if cx.requested().name.as_str() == "Inner" {
            return Ok(());
        }
        let engine = self
            .engine
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| ParticipantError::failed("engine dropped"))?;
        let inner = engine
            .get_or_create(&class("Inner"))
            .map_err(|e| ParticipantError::failed(e.to_string()))?;
        cx.proxy_mut()
            .add_field("inner", inner.name().as_str(), Access::Private);
        *self.built.lock() = Some(inner);
        Ok(())
    }
}

#[test]
fn participant_can_request_another_type_mid_build() {
    let harness = Harness::new();
    let nester = Arc::new(Nester {
        name: Name::new("nester"),
        engine: OnceLock::new(),
        built: Mutex::new(None),
    });
    let engine = Arc::new(harness.engine(2, vec![Arc::clone(&nester) as Arc<dyn Participant>], &[]));
    assert!(nester.engine.set(Arc::downgrade(&engine)).is_ok());

    let outer = engine.get_or_create(&class("Outer")).unwrap_or_else(|e| panic!("{e}"));
    let inner = nester
        .built
        .lock()
        .take()
        .unwrap_or_else(|| panic!("the nested request did not run"));

    // Both were numbered by the one context the calling thread holds.
    assert_eq!(outer.name().as_str(), "Outer_Proxy_1");
    assert_eq!(inner.name().as_str(), "Inner_Proxy_2");
    assert!(outer.image().fields.iter().any(|f| f.name.as_str() == "inner"));

    assert_eq!(engine.get_or_create(&class("Inner")).unwrap_or_else(|e| panic!("{e}")), inner);
    assert_eq!(harness.counter.builds(), 2);
    assert_eq!(engine.pool().available(), 2);
}
