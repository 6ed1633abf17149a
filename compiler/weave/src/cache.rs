//! The assembly cache.
//!
//! Lookups are lock-free reads of concurrent maps. Insertions happen only
//! while holding the generation lock, which is re-checked after acquiring
//! so that each identity is built at most once. The lock is reentrant: a
//! build may request other types on the same thread.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::FxBuildHasher;
use weave_emit::GeneratedType;
use weave_ir::{Access, Name};

use crate::error::AssemblyError;
use crate::identity::CompositeIdentity;

/// A resolved constructor on a generated type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorCall {
    /// The type declaring the constructor.
    pub ty: GeneratedType,
    /// Parameter types, in declaration order.
    pub params: Vec<Name>,
    pub access: Access,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CtorKey {
    identity: CompositeIdentity,
    signature: Vec<Name>,
    allow_non_public: bool,
}

pub struct AssemblyCache {
    /// Proxies by the identity they were generated for.
    types: DashMap<CompositeIdentity, GeneratedType, FxBuildHasher>,
    /// Constructor lookups, including non-public ones when asked for.
    constructors: DashMap<CtorKey, ConstructorCall, FxBuildHasher>,
    /// The generation lock. Reentrant so a build may request another type.
    lock: ReentrantMutex<()>,
}

impl Default for AssemblyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssemblyCache {
    pub fn new() -> Self {
        Self {
            types: DashMap::with_hasher(FxBuildHasher::default()),
            constructors: DashMap::with_hasher(FxBuildHasher::default()),
            lock: ReentrantMutex::new(()),
        }
    }

    /// Take the generation lock.
    pub fn generation_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    pub fn get(&self, identity: &CompositeIdentity) -> Option<GeneratedType> {
        self.types.get(identity).map(|entry| entry.value().clone())
    }

    /// The cached type for `identity`, building it with `build` on a miss.
    ///
    /// A failed build inserts nothing; the error is returned unchanged.
    pub fn get_or_create(
        &self,
        identity: &CompositeIdentity,
        build: impl FnOnce() -> Result<GeneratedType, AssemblyError>,
    ) -> Result<GeneratedType, AssemblyError> {
        if let Some(hit) = self.get(identity) {
            tracing::trace!(%identity, "cache hit");
            return Ok(hit);
        }

        let _guard = self.lock.lock();
        if let Some(hit) = self.get(identity) {
            tracing::trace!(%identity, "cache hit after lock");
            return Ok(hit);
        }

        tracing::debug!(%identity, "cache miss");
        let ty = build()?;
        self.types.insert(identity.clone(), ty.clone());
        Ok(ty)
    }

    /// The constructor of the type for `identity` taking exactly
    /// `signature`, cached per signature and `allow_non_public`.
    pub fn get_or_create_constructor_call(
        &self,
        identity: &CompositeIdentity,
        signature: &[Name],
        allow_non_public: bool,
        build: impl FnOnce() -> Result<GeneratedType, AssemblyError>,
    ) -> Result<ConstructorCall, AssemblyError> {
        let key = CtorKey {
            identity: identity.clone(),
            signature: signature.to_vec(),
            allow_non_public,
        };
        if let Some(hit) = self.constructors.get(&key) {
            return Ok(hit.value().clone());
        }

        let _guard = self.lock.lock();
        if let Some(hit) = self.constructors.get(&key) {
            return Ok(hit.value().clone());
        }

        let ty = self.get_or_create(identity, build)?;
        let call = resolve_constructor(ty, signature, allow_non_public)?;
        self.constructors.insert(key, call.clone());
        Ok(call)
    }

    /// Insert unless an entry exists; `false` if one did.
    pub fn insert_if_absent(&self, identity: CompositeIdentity, ty: GeneratedType) -> bool {
        let _guard = self.lock.lock();
        match self.types.entry(identity) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ty);
                true
            }
        }
    }

    /// Drop every cached type and constructor call.
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.types.clear();
        self.constructors.clear();
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn constructor_calls(&self) -> usize {
        self.constructors.len()
    }
}

impl std::fmt::Debug for AssemblyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyCache")
            .field("types", &self.types.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}

fn resolve_constructor(
    ty: GeneratedType,
    signature: &[Name],
    allow_non_public: bool,
) -> Result<ConstructorCall, AssemblyError> {
    let not_found = |ty: &GeneratedType, reason: &'static str| AssemblyError::ConstructorNotFound {
        ty: ty.name().clone(),
        signature: signature
            .iter()
            .map(Name::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        reason,
    };
    if ty.is_abstract() {
        return Err(not_found(&ty, "the generated type is abstract"));
    }
    let Some(ctor) = ty.image().constructor(signature) else {
        return Err(not_found(&ty, "no constructor takes these parameters"));
    };
    if !ctor.access.is_public() && !allow_non_public {
        return Err(not_found(&ty, "the matching constructor is not public"));
    }
    let (params, access) = (ctor.params.clone(), ctor.access);
    Ok(ConstructorCall { ty, params, access })
}
