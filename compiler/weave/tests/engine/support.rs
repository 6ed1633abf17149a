//! Generators and participants shared by the engine tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use weave::{
    Engine, EngineConfig, GeneratorSpec, IdentityPart, Participant, ParticipantError, ProxyContext,
    TypeIdentifier,
};
use weave_emit::{
    BackendError, CodeGenerator, EmitBackend, GeneratedType, MemberSpec, MemoryModule, SlotHandle,
    TypeHeader,
};
use weave_ir::{Access, Body, CtorInfo, MethodInfo, MethodSig, Name, TypeSpec};

/// Switches and counters shared by every generator of one engine.
#[derive(Clone, Default)]
pub struct BuildCounter {
    /// Successful finalizations of proxies (types carrying an identity).
    pub builds: Arc<AtomicUsize>,
    /// When set, the next finalize fails once.
    pub fail_next_finalize: Arc<AtomicBool>,
}

impl BuildCounter {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

/// A [`MemoryModule`] that reports to a [`BuildCounter`].
pub struct CountingModule {
    inner: MemoryModule,
    counter: BuildCounter,
}

impl EmitBackend for CountingModule {
    fn declare_slot(&mut self, name: &Name) -> Result<SlotHandle, BackendError> {
        self.inner.declare_slot(name)
    }

    fn define_header(&mut self, slot: SlotHandle, header: TypeHeader) -> Result<(), BackendError> {
        self.inner.define_header(slot, header)
    }

    fn define_member(&mut self, slot: SlotHandle, member: MemberSpec) -> Result<(), BackendError> {
        self.inner.define_member(slot, member)
    }

    fn finalize(&mut self, slot: SlotHandle) -> Result<GeneratedType, BackendError> {
        if self.counter.fail_next_finalize.swap(false, Ordering::SeqCst) {
            return Err(BackendError::UnknownSlot { slot });
        }
        let ty = self.inner.finalize(slot)?;
        if ty.image().attribute(weave::IDENTITY_ATTRIBUTE).is_some() {
            self.counter.builds.fetch_add(1, Ordering::SeqCst);
        }
        Ok(ty)
    }

    fn discard(&mut self, slot: SlotHandle) {
        self.inner.discard(slot);
    }
}

impl CodeGenerator for CountingModule {
    fn has_unflushed(&self) -> bool {
        self.inner.has_unflushed()
    }

    fn flush(&mut self) -> Result<Option<PathBuf>, BackendError> {
        self.inner.flush()
    }
}

/// Builds engines over [`CountingModule`]s writing into one directory.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub counter: BuildCounter,
}

impl Harness {
    pub fn new() -> Self {
        weave::init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap_or_else(|e| panic!("{e}")),
            counter: BuildCounter::default(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An engine with `contexts` contexts. Contexts listed in `failing`
    /// reject every flush.
    pub fn engine(&self, contexts: usize, participants: Vec<Arc<dyn Participant>>, failing: &[usize]) -> Engine {
        let counter = self.counter.clone();
        let failing = failing.to_vec();
        let mut builder = Engine::builder()
            .config(
                EngineConfig::new()
                    .with_pool_size(contexts)
                    .with_output_dir(self.path())
                    .with_module_name("proxies"),
            )
            .generator_factory(move |spec: &GeneratorSpec<'_>| {
                let mut inner = MemoryModule::new(spec.module_name.as_str(), spec.output_dir)
                    .with_configuration_id(spec.configuration_id);
                if failing.contains(&spec.index) {
                    inner = inner.with_fail_on_flush("volume is read-only");
                }
                Box::new(CountingModule {
                    inner,
                    counter: counter.clone(),
                })
            });
        for participant in participants {
            builder = builder.shared_participant(participant);
        }
        builder.build()
    }
}

pub fn render() -> MethodInfo {
    MethodInfo::virtual_method("Widget", MethodSig::new("Render", Vec::<Name>::new(), "void"))
}

/// A class with one virtual method and a public and a protected constructor.
pub fn widget() -> Arc<TypeSpec> {
    Arc::new(
        TypeSpec::class("Widget")
            .with_method(render())
            .with_constructors([
                CtorInfo::default_public(),
                CtorInfo::new(["string"], Access::Protected),
            ]),
    )
}

pub fn class(name: &str) -> Arc<TypeSpec> {
    Arc::new(TypeSpec::class(name))
}

/// Wraps `Render` with a log call when the requested type has it.
pub struct Logging {
    name: Name,
}

impl Logging {
    pub fn shared() -> Arc<dyn Participant> {
        Arc::new(Self {
            name: Name::new("logging"),
        })
    }
}

impl Participant for Logging {
    fn name(&self) -> &Name {
        &self.name
    }

    fn participate(&self, _: Option<&IdentityPart>, cx: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        let Some(render) = cx.requested().methods.iter().find(|m| m.is_virtual()).cloned() else {
            return Ok(());
        };
        let id = cx.proxy_mut().get_or_add_override(&render)?;
        let body = Body::opaque("log()").preceded_by(Body::opaque("enter()"));
        cx.proxy_mut().set_body(id, Some(body))?;
        Ok(())
    }
}

/// Contributes a fixed identity part and fails while `broken` is set.
pub struct Versioned {
    name: Name,
    version: i64,
    pub broken: AtomicBool,
}

impl Versioned {
    pub fn new(version: i64) -> Arc<Self> {
        Arc::new(Self {
            name: Name::new("versioned"),
            version,
            broken: AtomicBool::new(false),
        })
    }
}

impl TypeIdentifier for Versioned {
    fn identify(&self, _: &TypeSpec) -> IdentityPart {
        IdentityPart::Int(self.version)
    }
}

impl Participant for Versioned {
    fn name(&self) -> &Name {
        &self.name
    }

    fn identifier(&self) -> Option<&dyn TypeIdentifier> {
        Some(self)
    }

    fn participate(&self, part: Option<&IdentityPart>, cx: &mut ProxyContext<'_>) -> Result<(), ParticipantError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(ParticipantError::failed("version service unavailable"));
        }
        assert_eq!(part, Some(&IdentityPart::Int(self.version)));
        cx.proxy_mut()
            .add_field("__version", "long", Access::Private);
        Ok(())
    }
}
