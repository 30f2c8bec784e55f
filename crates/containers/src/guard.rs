//! Same-container creation guard
//!
//! While a deliberate "new tab in this container" creation is in flight the
//! coordinator must not react to the tab it is creating. The flag is held by
//! a token and cleared when the token drops, on success, error or panic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SameContainerGuard {
    active: Arc<AtomicBool>,
}

impl SameContainerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or `None` if another creation holds it
    pub fn try_acquire(&self) -> Option<GuardToken> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardToken {
                active: self.active.clone(),
            })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof of holding the guard
#[derive(Debug)]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    active: Arc<AtomicBool>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
