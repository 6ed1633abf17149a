use std::sync::{Mutex, OnceLock};

use pretty_assertions::assert_eq;
use weave_descriptor::ResolutionError;
use weave_emit::{CodeGenerator, MemoryModule};
use weave_ir::{Body, MethodInfo, MethodSig};

use super::*;
use crate::error::ParticipantError;
use crate::identity::{IdentityPart, TypeIdentifier, IDENTITY_ATTRIBUTE};
use crate::pool::ContextPool;

struct FnParticipant<F> {
    name: Name,
    identifier: Option<Box<dyn TypeIdentifier>>,
    participate: F,
}

impl<F> Participant for FnParticipant<F>
where
    F: Fn(Option<&IdentityPart>, &mut ProxyContext<'_>) -> Result<(), ParticipantError> + Send + Sync,
{
    fn name(&self) -> &Name {
        &self.name
    }

    fn identifier(&self) -> Option<&dyn TypeIdentifier> {
        self.identifier.as_deref()
    }

    fn participate(&self, identity: Option<&IdentityPart>, cx: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        (self.participate)(identity, cx)
    }
}

fn participant<F>(name: &str, participate: F) -> Arc<dyn Participant>
where
    F: Fn(Option<&IdentityPart>, &mut ProxyContext<'_>) -> Result<(), ParticipantError> + Send + Sync + 'static,
{
    Arc::new(FnParticipant {
        name: Name::new(name),
        identifier: None,
        participate,
    })
}

struct Fixture {
    assembler: Arc<TypeAssembler>,
    identities: Arc<IdentityProvider>,
    pool: Arc<ReusingPool>,
}

impl Fixture {
    fn new(participants: Vec<Arc<dyn Participant>>) -> Self {
        let participants: Arc<[Arc<dyn Participant>]> = participants.into();
        let identities = Arc::new(IdentityProvider::new(Arc::clone(&participants)));
        let generators = (0..2).map(|i| {
            Box::new(MemoryModule::new(format!("assembler.{i}"), std::env::temp_dir())) as Box<dyn CodeGenerator>
        });
        let pool = Arc::new(ReusingPool::new(ContextPool::new(generators)));
        let assembler = Arc::new(TypeAssembler::new(
            participants,
            Arc::clone(&identities),
            Arc::clone(&pool),
            "{requested}_Proxy_{n}",
        ));
        Self {
            assembler,
            identities,
            pool,
        }
    }

    fn assemble(&self, requested: &Arc<TypeSpec>) -> Result<GeneratedType, AssemblyError> {
        let identity = self
            .identities
            .identify(requested)
            .unwrap_or_else(|e| panic!("{e}"));
        self.assembler.assemble(requested, &identity)
    }

    fn all_returned(&self) -> bool {
        self.pool.available() == self.pool.capacity()
    }
}

fn render() -> MethodInfo {
    MethodInfo::virtual_method("Widget", MethodSig::new("Render", Vec::<Name>::new(), "void"))
}

fn widget() -> Arc<TypeSpec> {
    Arc::new(
        TypeSpec::class("Widget")
            .with_method(render())
            .with_method(MethodInfo::new("Widget", MethodSig::new("Id", Vec::<Name>::new(), "int"))),
    )
}

#[test]
fn proxy_name_expands_the_pattern() {
    assert_eq!(
        proxy_name("{requested}_Proxy_{n}", &Name::new("Widget"), 7).as_str(),
        "Widget_Proxy_7"
    );
    assert_eq!(proxy_name("Fixed", &Name::new("Widget"), 7).as_str(), "Fixed");
}

#[test]
fn participants_shape_the_proxy() {
    let fixture = Fixture::new(vec![participant("logging", |_, cx| {
        let id = cx.proxy_mut().get_or_add_override(&render())?;
        cx.proxy_mut().set_body(id, Some(Body::opaque("log(); base()")))?;
        Ok(())
    })]);

    let ty = fixture.assemble(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(ty.name().as_str(), "Widget_Proxy_1");
    assert_eq!(ty.image().base, Some(Name::new("Widget")));
    assert!(ty.image().attribute(IDENTITY_ATTRIBUTE).is_some());

    let method = ty.image().method("Render").unwrap_or_else(|| panic!("Render missing"));
    assert_eq!(method.body, Some(Body::opaque("log(); base()")));
    assert!(ty.image().constructor(&[]).is_some());
    assert!(fixture.all_returned());
}

#[test]
fn only_identified_participants_see_a_part() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (first, second) = (Arc::clone(&seen), Arc::clone(&seen));
    let identified: Arc<dyn Participant> = Arc::new(FnParticipant {
        name: Name::new("identified"),
        identifier: Some(Box::new(|_: &TypeSpec| IdentityPart::Int(42))),
        participate: move |part: Option<&IdentityPart>, _: &mut ProxyContext<'_>| -> Result<(), ParticipantError> {
            first.lock().unwrap_or_else(|e| panic!("{e}")).push(part.cloned());
            Ok(())
        },
    });
    let plain = participant("plain", move |part, _| {
        second.lock().unwrap_or_else(|e| panic!("{e}")).push(part.cloned());
        Ok(())
    });

    let fixture = Fixture::new(vec![identified, plain]);
    fixture.assemble(&widget()).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        *seen.lock().unwrap_or_else(|e| panic!("{e}")),
        vec![Some(IdentityPart::Int(42)), None]
    );
}

#[test]
fn participant_failure_names_the_participant() {
    let fixture = Fixture::new(vec![
        participant("ok", |_, _| Ok(())),
        participant("broken", |_, _| Err(ParticipantError::failed("nope"))),
    ]);

    match fixture.assemble(&widget()) {
        Err(AssemblyError::Participant { participant, .. }) => assert_eq!(participant.as_str(), "broken"),
        other => panic!("expected a participant failure, got {other:?}"),
    }
    assert!(fixture.all_returned());
}

#[test]
fn invalid_override_is_a_resolution_error() {
    let id_method = MethodInfo::new("Widget", MethodSig::new("Id", Vec::<Name>::new(), "int"));
    let fixture = Fixture::new(vec![participant("overrider", move |_, cx| {
        cx.proxy_mut().get_or_add_override(&id_method)?;
        Ok(())
    })]);

    match fixture.assemble(&widget()) {
        Err(AssemblyError::Resolution { participant, source }) => {
            assert_eq!(participant.as_str(), "overrider");
            assert!(matches!(source, ResolutionError::NotVirtual { .. }));
        }
        other => panic!("expected a resolution error, got {other:?}"),
    }
}

#[test]
fn cyclic_additional_types_fail_before_emission() {
    let fixture = Fixture::new(vec![participant("cyclic", |_, cx| {
        cx.create_additional_type("Loop.A", "Loop.B");
        cx.create_additional_type("Loop.B", "Loop.A");
        Ok(())
    })]);

    match fixture.assemble(&widget()) {
        Err(AssemblyError::Cycle(cycle)) => {
            assert_eq!(cycle.types, vec![Name::new("Loop.A"), Name::new("Loop.B")]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert!(fixture.all_returned());
}

#[test]
fn backend_failure_carries_request_and_participants() {
    let fixture = Fixture::new(vec![
        participant("first", |_, _| Ok(())),
        participant("clash", |_, cx| {
            let name = cx.proxy_name().clone();
            cx.create_additional_type(name, "object");
            Ok(())
        }),
    ]);

    match fixture.assemble(&widget()) {
        Err(AssemblyError::Backend {
            requested,
            participants,
            ..
        }) => {
            assert_eq!(requested.as_str(), "Widget");
            assert_eq!(participants, vec![Name::new("first"), Name::new("clash")]);
        }
        other => panic!("expected a backend failure, got {other:?}"),
    }
    assert!(fixture.all_returned());
}

fn other() -> (Arc<TypeSpec>, CompositeIdentity) {
    (
        Arc::new(TypeSpec::class("Other")),
        CompositeIdentity::new("Other", vec![IdentityPart::Absent]),
    )
}

#[test]
fn nested_assembly_reuses_the_scope_context() {
    let slot: Arc<OnceLock<Arc<TypeAssembler>>> = Arc::new(OnceLock::new());
    let nested: Arc<Mutex<Option<GeneratedType>>> = Arc::default();
    let (inner_slot, inner_result) = (Arc::clone(&slot), Arc::clone(&nested));
    let fixture = Fixture::new(vec![participant("nesting", move |_, cx| {
        if cx.requested().name.as_str() != "Widget" {
            return Ok(());
        }
        let assembler = inner_slot.get().unwrap_or_else(|| panic!("assembler not set"));
        let (requested, identity) = other();
        let ty = assembler
            .assemble(&requested, &identity)
            .map_err(|e| ParticipantError::failed(e.to_string()))?;
        *inner_result.lock().unwrap_or_else(|e| panic!("{e}")) = Some(ty);
        Ok(())
    })]);
    assert!(slot.set(Arc::clone(&fixture.assembler)).is_ok());

    let outer = fixture.assemble(&widget()).unwrap_or_else(|e| panic!("{e}"));
    let inner = nested
        .lock()
        .unwrap_or_else(|e| panic!("{e}"))
        .take()
        .unwrap_or_else(|| panic!("the nested build did not run"));

    // One context numbered both types.
    assert_eq!(outer.name().as_str(), "Widget_Proxy_1");
    assert_eq!(inner.name().as_str(), "Other_Proxy_2");
    assert_eq!(fixture.pool.depth(&CurrentThread), 0);
    assert!(fixture.all_returned());
}

#[test]
fn nested_request_while_holding_state_is_refused() {
    let slot: Arc<OnceLock<Arc<TypeAssembler>>> = Arc::new(OnceLock::new());
    let inner_slot = Arc::clone(&slot);
    let fixture = Fixture::new(vec![participant("hoarding", move |_, cx| {
        if cx.requested().name.as_str() != "Widget" {
            return Ok(());
        }
        let assembler = inner_slot.get().unwrap_or_else(|| panic!("assembler not set"));
        let (requested, identity) = other();
        let state = cx.state();
        let result = assembler.assemble(&requested, &identity);
        drop(state);
        match result {
            Err(err @ AssemblyError::StateHeld { .. }) => Err(ParticipantError::failed(err.to_string())),
            unexpected => panic!("expected the held state to block the nested build, got {unexpected:?}"),
        }
    })]);
    assert!(slot.set(Arc::clone(&fixture.assembler)).is_ok());

    match fixture.assemble(&widget()) {
        Err(AssemblyError::Participant { source, .. }) => {
            assert!(source.to_string().contains("holds its context's state"), "{source}");
        }
        other => panic!("expected a participant failure, got {other:?}"),
    }
    assert_eq!(fixture.pool.depth(&CurrentThread), 0);
    assert!(fixture.all_returned());
}
