//! Assembly of one proxy.
//!
//! Runs on a cache miss, under the generation lock: borrow the calling
//! scope's context, build the proxy descriptor, let every participant
//! modify it, then emit the batch through the context's generator.

use std::sync::Arc;

use parking_lot::MutexGuard;
use weave_descriptor::TypeDescriptor;
use weave_emit::{EmitError, GeneratedType};
use weave_ir::{Name, TypeSpec};

use crate::context::{ContextHandle, GenerationContext};
use crate::error::AssemblyError;
use crate::identity::{CompositeIdentity, IdentityProvider};
use crate::participant::{Participant, ProxyContext};
use crate::pool::{CurrentThread, ReusingPool};

pub struct TypeAssembler {
    participants: Arc<[Arc<dyn Participant>]>,
    identities: Arc<IdentityProvider>,
    pool: Arc<ReusingPool>,
    proxy_name_pattern: String,
}

impl TypeAssembler {
    pub fn new(
        participants: Arc<[Arc<dyn Participant>]>,
        identities: Arc<IdentityProvider>,
        pool: Arc<ReusingPool>,
        proxy_name_pattern: impl Into<String>,
    ) -> Self {
        Self {
            participants,
            identities,
            pool,
            proxy_name_pattern: proxy_name_pattern.into(),
        }
    }

    pub fn participant_names(&self) -> Vec<Name> {
        self.participants.iter().map(|p| p.name().clone()).collect()
    }

    /// Generate the proxy for `requested`. The context is returned to the
    /// pool whether or not generation succeeds.
    #[tracing::instrument(level = "debug", skip_all, fields(requested = %requested.name))]
    pub fn assemble(
        &self,
        requested: &Arc<TypeSpec>,
        identity: &CompositeIdentity,
    ) -> Result<GeneratedType, AssemblyError> {
        let handle = self.pool.borrow(&CurrentThread)?;
        let result = self.assemble_in(&handle, requested, identity);
        let returned = self.pool.return_context(&CurrentThread, handle);
        let ty = result?;
        returned?;
        tracing::debug!(proxy = %ty.name(), "assembled proxy");
        Ok(ty)
    }

    fn assemble_in(
        &self,
        handle: &ContextHandle,
        requested: &Arc<TypeSpec>,
        identity: &CompositeIdentity,
    ) -> Result<GeneratedType, AssemblyError> {
        let number = lock_context(handle, requested)?.next_type_number();
        let name = proxy_name(&self.proxy_name_pattern, &requested.name, number);
        let mut proxy = TypeDescriptor::subclass_of(Arc::clone(requested), name.clone());
        proxy.add_attribute(self.identities.identity_attribute(identity)?);

        // Unlocked from here until emission: a participant's own requests
        // run on this same context.
        let mut cx = ProxyContext::new(requested, proxy, handle);
        for (participant, part) in self.participants.iter().zip(identity.parts()) {
            let part = participant.identifier().map(|_| part);
            tracing::trace!(participant = %participant.name(), "participating");
            participant
                .participate(part, &mut cx)
                .map_err(|e| AssemblyError::from_participant(participant.name(), e))?;
        }
        let descriptors = cx.into_batch();

        let mut context = lock_context(handle, requested)?;
        let batch = weave_emit::emit(context.generator_mut(), descriptors).map_err(|source| match source {
            EmitError::Cycle(cycle) => AssemblyError::Cycle(cycle),
            source @ EmitError::Backend { .. } => AssemblyError::Backend {
                requested: requested.name.clone(),
                participants: self.participant_names(),
                source,
            },
        })?;
        batch
            .get(name.as_str())
            .cloned()
            .ok_or(AssemblyError::ProxyNotEmitted { name })
    }
}

/// Lock a borrowed context. The borrowing scope is its only user, so the
/// lock is free unless a participant is still holding the state guard.
fn lock_context<'h>(
    handle: &'h ContextHandle,
    requested: &TypeSpec,
) -> Result<MutexGuard<'h, GenerationContext>, AssemblyError> {
    handle.try_lock().ok_or_else(|| AssemblyError::StateHeld {
        requested: requested.name.clone(),
    })
}

/// Expand `{requested}` and `{n}` in `pattern`.
pub(crate) fn proxy_name(pattern: &str, requested: &Name, n: u64) -> Name {
    Name::new(
        pattern
            .replace("{requested}", requested.as_str())
            .replace("{n}", &n.to_string()),
    )
}

#[cfg(test)]
mod tests;
