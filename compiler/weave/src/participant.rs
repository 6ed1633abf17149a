//! The participant contract.
//!
//! A participant is one pluggable modification of generated proxies. It
//! may contribute a part of the cache identity (through its
//! [`TypeIdentifier`]) and then shapes the proxy descriptor of every
//! requested type that misses the cache.

use std::any::Any;
use std::sync::Arc;

use parking_lot::{MappedMutexGuard, MutexGuard};
use rustc_hash::FxHashMap;
use weave_descriptor::TypeDescriptor;
use weave_emit::GeneratedType;
use weave_ir::{Name, TypeSpec};

use crate::context::{ContextHandle, GenerationContext};
use crate::error::ParticipantError;
use crate::identity::{CompositeIdentity, IdentityPart, TypeIdentifier};

pub trait Participant: Send + Sync {
    /// Stable name; part of the participant configuration id.
    fn name(&self) -> &Name;

    /// Contributor to the cache identity, if the participant's output
    /// depends on anything besides the requested type.
    fn identifier(&self) -> Option<&dyn TypeIdentifier> {
        None
    }

    /// Modify the proxy. `identity` is this participant's own identity part,
    /// `None` when it has no identifier.
    fn participate(
        &self,
        identity: Option<&IdentityPart>,
        cx: &mut ProxyContext<'_>,
    ) -> Result<(), ParticipantError>;

    /// Restore per-context state after previously flushed types are loaded.
    fn rebuild_state(&self, loaded: &LoadedTypes, state: &mut ParticipantState) {
        let _ = (loaded, state);
    }
}

/// Arbitrary per-context state shared by participants, keyed by string.
///
/// Lives as long as the generation context and is reset when the context's
/// code is flushed.
#[derive(Default)]
pub struct ParticipantState {
    values: FxHashMap<String, Box<dyn Any + Send>>,
}

impl ParticipantState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Store `value`, returning whatever was stored under `key` before.
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) -> Option<Box<dyn Any + Send>> {
        self.values.insert(key.into(), Box::new(value))
    }

    /// Apply `f` to the value under `key`, first storing `T::default()` if
    /// the key is missing or holds another type.
    pub fn update<T: Any + Send + Default>(&mut self, key: impl Into<String>, f: impl FnOnce(&mut T)) {
        let slot = self
            .values
            .entry(key.into())
            .or_insert_with(|| Box::new(T::default()));
        if !slot.is::<T>() {
            *slot = Box::new(T::default());
        }
        if let Some(value) = slot.downcast_mut::<T>() {
            f(value);
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for ParticipantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// What a participant sees while one proxy is being assembled.
///
/// The generation context is not locked while participants run, so a
/// participant may request other types from the engine; those builds reuse
/// the same context.
pub struct ProxyContext<'a> {
    requested: &'a Arc<TypeSpec>,
    proxy: TypeDescriptor,
    additional: Vec<TypeDescriptor>,
    context: &'a ContextHandle,
}

impl<'a> ProxyContext<'a> {
    pub(crate) fn new(requested: &'a Arc<TypeSpec>, proxy: TypeDescriptor, context: &'a ContextHandle) -> Self {
        Self {
            requested,
            proxy,
            additional: Vec::new(),
            context,
        }
    }

    pub fn requested(&self) -> &TypeSpec {
        self.requested
    }

    pub fn proxy_name(&self) -> &Name {
        self.proxy.name()
    }

    pub fn proxy(&self) -> &TypeDescriptor {
        &self.proxy
    }

    pub fn proxy_mut(&mut self) -> &mut TypeDescriptor {
        &mut self.proxy
    }

    /// Add another type to the batch emitted with the proxy.
    pub fn create_additional_type(&mut self, name: impl Into<Name>, base: impl Into<Name>) -> &mut TypeDescriptor {
        let index = self.additional.len();
        self.additional.push(TypeDescriptor::with_base_name(name, base));
        &mut self.additional[index]
    }

    pub fn additional_types(&self) -> &[TypeDescriptor] {
        &self.additional
    }

    pub fn additional_type_mut(&mut self, name: &str) -> Option<&mut TypeDescriptor> {
        self.additional.iter_mut().find(|d| d.name().as_str() == name)
    }

    /// The context's participant state, locked until the guard drops.
    ///
    /// Drop the guard before requesting another type from the engine; a
    /// nested request fails with `AssemblyError::StateHeld` while it lives.
    pub fn state(&self) -> MappedMutexGuard<'_, ParticipantState> {
        MutexGuard::map(self.context.lock(), GenerationContext::state_mut)
    }

    /// The proxy first, then additional types in creation order.
    pub(crate) fn into_batch(self) -> Vec<TypeDescriptor> {
        let mut batch = Vec::with_capacity(1 + self.additional.len());
        batch.push(self.proxy);
        batch.extend(self.additional);
        batch
    }
}

/// Types read back from a flushed module.
#[derive(Clone, Debug, Default)]
pub struct LoadedTypes {
    /// Proxies newly entered into the cache.
    pub proxies: Vec<(CompositeIdentity, GeneratedType)>,
    /// Types without an identity of their own.
    pub additional: Vec<GeneratedType>,
}
