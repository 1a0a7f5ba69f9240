//! Process-wide activation lock.
//!
//! Device activation and deactivation of every RDMA interface in the process
//! run inside this one critical section.

use parking_lot::{const_mutex, Mutex, MutexGuard};

static ACTIVATION_LOCK: Mutex<()> = const_mutex(());

/// Held for the duration of an activation or deactivation section.
#[must_use = "the section ends when the lock is dropped"]
pub struct ActivationLock {
    _guard: MutexGuard<'static, ()>,
}

impl ActivationLock {
    /// Block until the section is free.
    pub fn acquire() -> Self {
        Self {
            _guard: ACTIVATION_LOCK.lock(),
        }
    }

    pub fn try_acquire() -> Option<Self> {
        ACTIVATION_LOCK.try_lock().map(|guard| Self { _guard: guard })
    }
}

impl std::fmt::Debug for ActivationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActivationLock")
    }
}
