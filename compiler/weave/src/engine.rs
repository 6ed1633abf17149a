//! The engine facade.
//!
//! Wires the identity provider, cache, context pool, assembler and code
//! manager together around one participant set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use weave_emit::{CodeGenerator, GeneratedType, MemoryModule, PersistedModule};
use weave_ir::{Name, TypeSpec};

use crate::assembler::TypeAssembler;
use crate::cache::{AssemblyCache, ConstructorCall};
use crate::code_manager::{CodeManager, LoadReport};
use crate::config::EngineConfig;
use crate::error::{AssemblyError, FlushError, IdentityError, LoadError};
use crate::identity::{CompositeIdentity, IdentityProvider};
use crate::participant::Participant;
use crate::pool::{ContextPool, ReusingPool};

/// What a generator factory is asked to build.
#[derive(Clone, Debug)]
pub struct GeneratorSpec<'a> {
    /// Index of the context the generator belongs to.
    pub index: usize,
    pub module_name: String,
    pub output_dir: &'a Path,
    pub configuration_id: &'a str,
}

type GeneratorFactory = dyn Fn(&GeneratorSpec<'_>) -> Box<dyn CodeGenerator>;

fn memory_module(spec: &GeneratorSpec<'_>) -> Box<dyn CodeGenerator> {
    Box::new(
        MemoryModule::new(spec.module_name.as_str(), spec.output_dir)
            .with_configuration_id(spec.configuration_id),
    )
}

#[must_use]
pub struct EngineBuilder {
    config: EngineConfig,
    participants: Vec<Arc<dyn Participant>>,
    factory: Option<Box<GeneratorFactory>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a participant. Participants run in registration order.
    pub fn participant(self, participant: impl Participant + 'static) -> Self {
        self.shared_participant(Arc::new(participant))
    }

    pub fn shared_participant(mut self, participant: Arc<dyn Participant>) -> Self {
        self.participants.push(participant);
        self
    }

    /// Build each context's generator with `factory` instead of a
    /// [`MemoryModule`].
    pub fn generator_factory(
        mut self,
        factory: impl Fn(&GeneratorSpec<'_>) -> Box<dyn CodeGenerator> + 'static,
    ) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn build(self) -> Engine {
        let factory: Box<GeneratorFactory> = match self.factory {
            Some(factory) => factory,
            None => Box::new(memory_module),
        };
        let participants: Arc<[Arc<dyn Participant>]> = self.participants.into();
        let identities = Arc::new(IdentityProvider::new(Arc::clone(&participants)));

        let generators = (0..self.config.pool_size.max(1))
            .map(|index| {
                factory(&GeneratorSpec {
                    index,
                    module_name: format!("{}.{index}", self.config.module_name),
                    output_dir: &self.config.output_dir,
                    configuration_id: identities.participant_configuration_id(),
                })
            })
            .collect::<Vec<_>>();
        let pool = Arc::new(ReusingPool::new(ContextPool::new(generators)));
        let cache = Arc::new(AssemblyCache::new());

        let assembler = TypeAssembler::new(
            Arc::clone(&participants),
            Arc::clone(&identities),
            Arc::clone(&pool),
            self.config.proxy_name_pattern.as_str(),
        );
        let code_manager = CodeManager::new(
            participants,
            Arc::clone(&identities),
            Arc::clone(&cache),
            Arc::clone(&pool),
        );
        tracing::debug!(
            contexts = pool.capacity(),
            participants = %identities.participant_configuration_id(),
            "built engine"
        );

        Engine {
            config: self.config,
            identities,
            cache,
            pool,
            assembler,
            code_manager,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    identities: Arc<IdentityProvider>,
    cache: Arc<AssemblyCache>,
    pool: Arc<ReusingPool>,
    assembler: TypeAssembler,
    code_manager: CodeManager,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            participants: Vec::new(),
            factory: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &ReusingPool {
        &self.pool
    }

    pub fn participant_configuration_id(&self) -> &str {
        self.identities.participant_configuration_id()
    }

    pub fn participant_names(&self) -> Vec<Name> {
        self.assembler.participant_names()
    }

    pub fn identify(&self, requested: &TypeSpec) -> Result<CompositeIdentity, IdentityError> {
        self.identities.identify(requested)
    }

    /// The generated proxy for `requested`, assembling it on first use.
    #[tracing::instrument(level = "debug", skip_all, fields(requested = %requested.name))]
    pub fn get_or_create(&self, requested: &Arc<TypeSpec>) -> Result<GeneratedType, AssemblyError> {
        let identity = self.identities.identify(requested)?;
        self.cache
            .get_or_create(&identity, || self.assembler.assemble(requested, &identity))
    }

    /// The proxy's constructor taking exactly `signature`.
    #[tracing::instrument(level = "debug", skip_all, fields(requested = %requested.name))]
    pub fn get_or_create_constructor_call(
        &self,
        requested: &Arc<TypeSpec>,
        signature: &[Name],
        allow_non_public: bool,
    ) -> Result<ConstructorCall, AssemblyError> {
        let identity = self.identities.identify(requested)?;
        self.cache
            .get_or_create_constructor_call(&identity, signature, allow_non_public, || {
                self.assembler.assemble(requested, &identity)
            })
    }

    pub fn flush(&self) -> Result<Vec<Option<PathBuf>>, FlushError> {
        self.code_manager.flush()
    }

    pub fn load_flushed_code(&self, module: PersistedModule) -> Result<LoadReport, LoadError> {
        self.code_manager.load_flushed_code(module)
    }

    pub fn load_flushed_file(&self, path: &Path) -> Result<LoadReport, LoadError> {
        self.code_manager.load_flushed_file(path)
    }

    /// Forget every cached type. Generated code stays with its contexts.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("participants", &self.identities.participant_configuration_id())
            .field("cache", &self.cache)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
