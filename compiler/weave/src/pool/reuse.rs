//! Per-scope context reuse.
//!
//! [`ReusingPool`] hands a scope the context it already holds instead of
//! taking a second one from the inner pool. A depth counter per scope
//! decides when the context really goes back.

use std::thread::ThreadId;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::ContextPool;
use crate::context::ContextHandle;
use crate::error::PoolError;

/// Key of one execution scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Thread(ThreadId),
    Task(u64),
}

/// Anything that can name the scope a borrow happens in.
pub trait ExecutionScope {
    fn scope_key(&self) -> ScopeKey;
}

/// The calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct CurrentThread;

impl ExecutionScope for CurrentThread {
    fn scope_key(&self) -> ScopeKey {
        ScopeKey::Thread(std::thread::current().id())
    }
}

/// A caller-chosen scope, for tasks that migrate between threads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskScope(pub u64);

impl ExecutionScope for TaskScope {
    fn scope_key(&self) -> ScopeKey {
        ScopeKey::Task(self.0)
    }
}

struct Lease {
    handle: ContextHandle,
    /// Borrows not yet returned by the scope.
    depth: usize,
}

pub struct ReusingPool {
    inner: ContextPool,
    /// The context each scope currently holds.
    active: Mutex<FxHashMap<ScopeKey, Lease>>,
}

impl ReusingPool {
    pub fn new(inner: ContextPool) -> Self {
        Self {
            inner,
            active: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn inner(&self) -> &ContextPool {
        &self.inner
    }

    /// Borrow for `scope`. A scope that already holds a context gets the
    /// same one back.
    pub fn borrow(&self, scope: &dyn ExecutionScope) -> Result<ContextHandle, PoolError> {
        let key = scope.scope_key();
        if let Some(lease) = self.active.lock().get_mut(&key) {
            lease.depth += 1;
            tracing::trace!(?key, context = lease.handle.id(), depth = lease.depth, "reusing context");
            return Ok(lease.handle.clone());
        }

        // Only this scope can insert its own key, so blocking outside the
        // lock cannot race with another lease for `key`.
        let handle = self.inner.borrow()?;
        self.active.lock().insert(
            key,
            Lease {
                handle: handle.clone(),
                depth: 1,
            },
        );
        Ok(handle)
    }

    /// Undo one `borrow` by `scope`. The context goes back to the inner
    /// pool when the outermost borrow is undone.
    pub fn return_context(&self, scope: &dyn ExecutionScope, handle: ContextHandle) -> Result<(), PoolError> {
        let key = scope.scope_key();
        let mut active = self.active.lock();
        if let Some(lease) = active.get_mut(&key).filter(|lease| lease.handle == handle) {
            lease.depth -= 1;
            if lease.depth > 0 {
                return Ok(());
            }
            active.remove(&key);
            drop(active);
            return self.inner.return_context(handle);
        }

        let err = if active.values().any(|lease| lease.handle == handle) {
            PoolError::CrossScopeReturn {
                context: handle.id(),
            }
        } else {
            PoolError::NotLeased {
                context: handle.id(),
            }
        };
        tracing::error!(?key, %err, "ownership violation");
        Err(err)
    }

    /// Depth of `scope`'s current lease, 0 when it holds none.
    pub fn depth(&self, scope: &dyn ExecutionScope) -> usize {
        self.active
            .lock()
            .get(&scope.scope_key())
            .map_or(0, |lease| lease.depth)
    }

    /// Borrow every context. Fails instead of blocking when the calling
    /// thread holds one of them, which would never come back.
    pub fn borrow_all(&self) -> Result<Vec<ContextHandle>, PoolError> {
        if let Some(lease) = self.active.lock().get(&CurrentThread.scope_key()) {
            let err = PoolError::DrainWhileHolding {
                context: lease.handle.id(),
            };
            tracing::error!(%err, "ownership violation");
            return Err(err);
        }
        self.inner.borrow_all()
    }

    pub fn return_all(&self, handles: impl IntoIterator<Item = ContextHandle>) -> Result<(), PoolError> {
        self.inner.return_all(handles)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn available(&self) -> usize {
        self.inner.available()
    }
}

impl std::fmt::Debug for ReusingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReusingPool")
            .field("inner", &self.inner)
            .field("leases", &self.active.lock().len())
            .finish()
    }
}
