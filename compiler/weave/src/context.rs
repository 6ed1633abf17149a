//! Generation contexts.
//!
//! A context pairs one [`CodeGenerator`] with the participant state built
//! up while generating into it. Contexts are created with their pool and
//! recycled for the life of the process.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use weave_emit::{BackendError, CodeGenerator};

use crate::participant::ParticipantState;

/// A code generator together with the participant state built up on it.
pub struct GenerationContext {
    /// Receives every type emitted on this context.
    generator: Box<dyn CodeGenerator>,
    /// Participant bookkeeping; cleared on flush, rebuilt on load.
    state: ParticipantState,
    /// Numbers handed out for generated type names.
    next_type: u64,
}

impl GenerationContext {
    pub fn new(generator: Box<dyn CodeGenerator>) -> Self {
        Self {
            generator,
            state: ParticipantState::new(),
            next_type: 0,
        }
    }

    pub fn generator_mut(&mut self) -> &mut dyn CodeGenerator {
        self.generator.as_mut()
    }

    pub fn state(&self) -> &ParticipantState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ParticipantState {
        &mut self.state
    }

    /// Next number for a generated type name, starting at 1.
    pub fn next_type_number(&mut self) -> u64 {
        self.next_type += 1;
        self.next_type
    }

    pub fn has_unflushed(&self) -> bool {
        self.generator.has_unflushed()
    }

    /// Flush the generator. Participant state is reset only when the
    /// flush succeeds.
    pub fn flush(&mut self) -> Result<Option<PathBuf>, BackendError> {
        let location = self.generator.flush()?;
        self.state.clear();
        Ok(location)
    }
}

impl fmt::Debug for GenerationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("state", &self.state)
            .field("next_type", &self.next_type)
            .finish_non_exhaustive()
    }
}

/// Pool-owned storage of one context.
pub(crate) struct ContextCell {
    /// Index of the context within its pool.
    id: usize,
    /// The owning pool's id.
    pool_id: u64,
    /// Set while a borrower holds the handle.
    lent: AtomicBool,
    context: Mutex<GenerationContext>,
}

/// Shared handle to a pooled context.
///
/// Handles compare equal when they refer to the same context.
#[derive(Clone)]
pub struct ContextHandle(Arc<ContextCell>);

impl ContextHandle {
    pub(crate) fn new(id: usize, pool_id: u64, context: GenerationContext) -> Self {
        Self(Arc::new(ContextCell {
            id,
            pool_id,
            lent: AtomicBool::new(false),
            context: Mutex::new(context),
        }))
    }

    /// Index of the context within its pool.
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn pool_id(&self) -> u64 {
        self.0.pool_id
    }

    /// Lock the context. Uncontended while the protocol is followed: only
    /// the current borrower touches it.
    pub fn lock(&self) -> MutexGuard<'_, GenerationContext> {
        self.0.context.lock()
    }

    /// Lock the context unless it is already locked. For a borrower that
    /// means a guard taken earlier on the same scope is still alive.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, GenerationContext>> {
        self.0.context.try_lock()
    }

    /// Mark lent; `false` if it already was.
    pub(crate) fn mark_lent(&self) -> bool {
        !self.0.lent.swap(true, Ordering::AcqRel)
    }

    /// Mark returned; `false` if it was not lent.
    pub(crate) fn mark_returned(&self) -> bool {
        self.0
            .lent
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl PartialEq for ContextHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextHandle {}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextHandle(pool {} #{})", self.0.pool_id, self.0.id)
    }
}
