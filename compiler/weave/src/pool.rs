//! Bounded pool of generation contexts.
//!
//! Available contexts sit in a bounded crossbeam channel sized to the pool.
//! `borrow` blocks on the channel until one is free. `borrow_all` drains
//! the whole pool; concurrent drains are serialized so that two of them
//! can never each end up holding part of the pool.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use weave_emit::CodeGenerator;

use crate::context::{ContextHandle, GenerationContext};
use crate::error::PoolError;

mod reuse;

pub use reuse::{CurrentThread, ExecutionScope, ReusingPool, ScopeKey, TaskScope};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

pub struct ContextPool {
    /// Process-unique; handles from another pool are refused on return.
    id: u64,
    /// Number of contexts the pool owns.
    capacity: usize,
    /// Returns idle contexts to the queue.
    available_tx: Sender<ContextHandle>,
    /// Idle contexts, oldest first.
    available_rx: Receiver<ContextHandle>,
    /// Held for the duration of a `borrow_all`.
    drain: Mutex<()>,
}

impl ContextPool {
    /// Create a pool owning one context per generator.
    pub fn new(generators: impl IntoIterator<Item = Box<dyn CodeGenerator>>) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let contexts: Vec<_> = generators
            .into_iter()
            .enumerate()
            .map(|(index, generator)| ContextHandle::new(index, id, GenerationContext::new(generator)))
            .collect();
        let capacity = contexts.len();
        let (available_tx, available_rx) = channel::bounded(capacity.max(1));
        for context in contexts {
            // Capacity matches the number of contexts, so this never fails.
            let _ = available_tx.try_send(context);
        }
        tracing::debug!(pool = id, capacity, "created context pool");
        Self {
            id,
            capacity,
            available_tx,
            available_rx,
            drain: Mutex::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of contexts the pool owns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of contexts not currently lent.
    pub fn available(&self) -> usize {
        self.available_rx.len()
    }

    /// Take a context, blocking until one is available.
    pub fn borrow(&self) -> Result<ContextHandle, PoolError> {
        let handle = self.available_rx.recv().map_err(|_| PoolError::Closed)?;
        handle.mark_lent();
        tracing::trace!(pool = self.id, context = handle.id(), "borrowed context");
        Ok(handle)
    }

    /// Give a borrowed context back.
    pub fn return_context(&self, handle: ContextHandle) -> Result<(), PoolError> {
        if handle.pool_id() != self.id {
            let err = PoolError::ForeignContext {
                context: handle.id(),
                owner: handle.pool_id(),
                pool: self.id,
            };
            tracing::error!(%err, "ownership violation");
            return Err(err);
        }
        if !handle.mark_returned() {
            let err = PoolError::NotLeased {
                context: handle.id(),
            };
            tracing::error!(%err, "ownership violation");
            return Err(err);
        }
        let context = handle.id();
        match self.available_tx.try_send(handle) {
            Ok(()) => {
                tracing::trace!(pool = self.id, context, "returned context");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(PoolError::NotLeased { context }),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Closed),
        }
    }

    /// Take every context the pool owns, blocking until all are returned.
    pub fn borrow_all(&self) -> Result<Vec<ContextHandle>, PoolError> {
        let _drain = self.drain.lock();
        let mut handles = Vec::with_capacity(self.capacity);
        for _ in 0..self.capacity {
            handles.push(self.borrow()?);
        }
        tracing::debug!(pool = self.id, contexts = handles.len(), "drained pool");
        Ok(handles)
    }

    /// Return every handle, reporting the first failure.
    pub fn return_all(&self, handles: impl IntoIterator<Item = ContextHandle>) -> Result<(), PoolError> {
        let mut first = None;
        for handle in handles {
            if let Err(err) = self.return_context(handle) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPool")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
