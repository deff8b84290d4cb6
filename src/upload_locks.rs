use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// One async mutex per photo id. Entries exist only while someone holds or
/// waits for them.
#[derive(Clone, Default)]
pub struct UploadLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl UploadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `photo_id` is active.
    pub async fn acquire(&self, photo_id: Uuid) -> UploadLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(photo_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        // Declared before the acquire future so a cancelled waiter gives back
        // its reference first, then clears the entry if nobody else uses it
        let _waiting = Waiting {
            photo_id,
            locks: self.locks.clone(),
        };
        let acquire = lock.lock_owned();
        let guard = acquire.await;

        UploadLockGuard {
            photo_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of ids currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn remove_if_unused(locks: &Mutex<LockMap>, photo_id: Uuid) {
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    let unused = locks
        .get(&photo_id)
        .map(|lock| Arc::strong_count(lock) == 1)
        .unwrap_or(false);
    if unused {
        locks.remove(&photo_id);
    }
}

struct Waiting {
    photo_id: Uuid,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for Waiting {
    fn drop(&mut self) {
        remove_if_unused(&self.locks, self.photo_id);
    }
}

pub struct UploadLockGuard {
    photo_id: Uuid,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UploadLockGuard {
    fn drop(&mut self) {
        // Release first so the map entry's refcount reflects remaining waiters
        drop(self.guard.take());
        remove_if_unused(&self.locks, self.photo_id);
    }
}
