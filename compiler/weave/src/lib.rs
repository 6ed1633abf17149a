//! Weave: concurrent, cache-coherent generation of proxy types.
//!
//! An [`Engine`] generates a subclass ("proxy") of a requested type, shaped
//! by an ordered set of [`Participant`]s, and caches it under a
//! [`CompositeIdentity`] so that each distinct request is built once.
//!
//! - [`IdentityProvider`]: cache keys for requested types
//! - [`AssemblyCache`]: double-checked, lock-guarded cache of proxies
//! - [`ContextPool`]/[`ReusingPool`]: bounded pool of generation contexts
//! - [`TypeAssembler`]: runs participants and emits the resulting batch
//! - [`CodeManager`]: flushes generated code and loads it back
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=weave=debug`: cache misses, assemblies, flushes and reloads.
//! - `RUST_LOG=weave=trace`: cache hits and pool traffic as well.
//! - `WEAVE_POOL_SIZE`, `WEAVE_OUTPUT_DIR`: read by [`EngineConfig::from_env`].

use std::sync::Once;

mod assembler;
mod cache;
mod code_manager;
mod config;
mod context;
mod engine;
mod error;
mod identity;
mod participant;
mod pool;

pub use assembler::TypeAssembler;
pub use cache::{AssemblyCache, ConstructorCall};
pub use code_manager::{CodeManager, LoadReport};
pub use config::{EngineConfig, OUTPUT_DIR_VAR, POOL_SIZE_VAR};
pub use context::{ContextHandle, GenerationContext};
pub use engine::{Engine, EngineBuilder, GeneratorSpec};
pub use error::{
    AssemblyError, ContextFlushFailure, FlushError, IdentityError, LoadError, ParticipantError,
    PoolError,
};
pub use identity::{
    CompositeIdentity, IdentityPart, IdentityProvider, TypeIdentifier, IDENTITY_ATTRIBUTE,
};
pub use participant::{LoadedTypes, Participant, ParticipantState, ProxyContext};
pub use pool::{ContextPool, CurrentThread, ExecutionScope, ReusingPool, ScopeKey, TaskScope};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debugging.
///
/// Safe to call more than once. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
