//! Progress registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Something the worker polls on every progress tick.
pub trait Progress: Send + Sync {
    /// Returns the number of events processed.
    fn progress(&self) -> usize;
}

impl<F> Progress for F
where
    F: Fn() -> usize + Send + Sync,
{
    fn progress(&self) -> usize {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(u64);

#[derive(Default)]
struct WorkerInner {
    callbacks: Mutex<Vec<(ProgressId, Arc<dyn Progress>)>>,
    next_id: AtomicU64,
}

/// Handle to a progress engine. Clones share the same registry.
#[derive(Clone, Default)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress_register(&self, callback: Arc<dyn Progress>) -> ProgressId {
        let id = ProgressId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.callbacks.lock().push((id, callback));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn progress_unregister(&self, id: ProgressId) -> bool {
        let mut callbacks = self.inner.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        callbacks.len() != before
    }

    /// Run every registered callback once.
    pub fn progress(&self) -> usize {
        let snapshot: Vec<Arc<dyn Progress>> = self
            .inner
            .callbacks
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        snapshot.iter().map(|cb| cb.progress()).sum()
    }

    pub fn num_progress_callbacks(&self) -> usize {
        self.inner.callbacks.lock().len()
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("callbacks", &self.num_progress_callbacks())
            .finish()
    }
}
