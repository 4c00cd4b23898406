//! Per-aggregate write exclusion.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateKey;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<AggregateKey, Slot>>>;

struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holder plus waiters.
    users: usize,
}

/// Keyed async mutex map.
///
/// At most one [`KeyGuard`] exists per key at any time. Entries are removed
/// as soon as the last holder or waiter of a key lets go, including waiters
/// whose `lock` future is dropped before it resolves, so the table only holds
/// keys with writes in flight.
#[derive(Clone, Default)]
pub struct KeyLocks {
    slots: Slots,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &AggregateKey) -> KeyGuard {
        let (registration, mutex) = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            let registration = Registration {
                key: key.clone(),
                slots: self.slots.clone(),
            };
            (registration, slot.mutex.clone())
        };
        let guard = mutex.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently locked or waited on.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }
}

/// One holder or waiter of a key; removes the entry when the last one goes.
struct Registration {
    key: AggregateKey,
    slots: Slots,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

/// Exclusive access to one key, released on drop on every exit path.
///
/// Fields drop in order: the key is unlocked before the registration goes.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}
