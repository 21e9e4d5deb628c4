use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;
use url::Url;

/// An acquired per-id lock. Dropping it releases the lock.
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle {
    _held: Box<dyn Send>,
}

impl LockHandle {
    /// Wrap any guard whose drop releases the underlying lock.
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self {
            _held: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockHandle")
    }
}

type Slots = DashMap<String, Arc<Mutex<()>>>;

/// In-process table of per-id mutexes.
///
/// Entries exist only while someone holds or waits for the lock.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    slots: Arc<Slots>,
}

impl LockTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock on `id`.
    pub async fn acquire(&self, id: &Url) -> LockHandle {
        let key = id.as_str().to_string();
        let slot = self.slots.entry(key.clone()).or_default().clone();
        let guard = slot.lock_owned().await;
        trace!(id = %key, "lock acquired");
        LockHandle::new(TableGuard {
            guard: Some(guard),
            key,
            slots: Arc::clone(&self.slots),
        })
    }

    /// Number of ids currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no lock is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

struct TableGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    slots: Arc<Slots>,
}

impl Drop for TableGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table's own reference left: nobody holds or waits.
        self.slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
        trace!(id = %self.key, "lock released");
    }
}
