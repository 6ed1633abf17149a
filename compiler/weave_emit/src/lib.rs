//! Staged emission for the weave engine.
//!
//! - [`EmitBackend`]/[`CodeGenerator`]: what a code-generation target must provide
//! - [`StagedEmitter`]: drives a dependency-sorted batch through a backend
//!   in declare, define and finalize passes
//! - [`GeneratedType`]: handle to a finalized type
//! - [`MemoryModule`]: the in-memory reference backend, flushing to
//!   [`PersistedModule`] files

mod backend;
mod error;
mod generated;
mod memory;
mod persist;
mod staged;

pub use backend::{CodeGenerator, EmitBackend, MemberSpec, SlotHandle, SlotState, TypeHeader, TypeRef};
pub use error::{BackendError, EmitError, Phase};
pub use generated::{
    CtorImage, EventImage, FieldImage, GeneratedType, MethodImage, OverrideImage, PropertyImage,
    TypeImage,
};
pub use memory::MemoryModule;
pub use persist::PersistedModule;
pub use staged::{emit, EmittedBatch, StagedEmitter};
