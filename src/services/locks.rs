//! Per-event lock registry
//!
//! Admission and edit operations on one event run their precondition phase
//! while holding that event's async mutex. Different events never
//! contend. Entries are weak so an idle event costs nothing once swept.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;

const SWEEP_THRESHOLD: usize = 256;

#[derive(Clone, Default)]
pub struct EventLocks {
    inner: Arc<Mutex<HashMap<i64, Weak<tokio::sync::Mutex<()>>>>>,
}

/// Holds an event's lock until dropped
#[must_use = "the event lock is released as soon as the guard is dropped"]
pub struct EventGuard {
    _guard: OwnedMutexGuard<()>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, event_id: i64) -> EventGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

            let mutex = map.get(&event_id).and_then(Weak::upgrade).unwrap_or_else(|| {
                let fresh = Arc::new(tokio::sync::Mutex::new(()));
                map.insert(event_id, Arc::downgrade(&fresh));
                fresh
            });

            if map.len() > SWEEP_THRESHOLD {
                map.retain(|_, weak| weak.strong_count() > 0);
            }
            mutex
        };

        EventGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of events with a live lock entry
    pub fn tracked(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl std::fmt::Debug for EventLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLocks").field("tracked", &self.tracked()).finish()
    }
}
