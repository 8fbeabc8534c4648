//! Per-channel mutual exclusion for lifecycle mutations.
//!
//! Every mutating operation against one order serializes on that channel's
//! async mutex; operations on different channels proceed in parallel. Locks
//! are created on first use and kept for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct ChannelLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key`, waiting behind earlier holders.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("channel lock map poisoned");
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    use super::ChannelLocks;

    #[tokio::test]
    async fn functional_same_key_serializes_critical_sections() {
        let locks = ChannelLocks::new();
        let witness = Arc::new(AsyncMutex::new(Vec::<u32>::new()));
        let mut handles = Vec::new();
        for task in 0..8u32 {
            let locks = locks.clone();
            let witness = witness.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("chan-1").await;
                witness.lock().await.push(task);
                tokio::time::sleep(Duration::from_millis(2)).await;
                witness.lock().await.push(task);
            }));
        }
        for handle in handles {
            handle.await.expect("task should finish");
        }
        let order = witness.lock().await.clone();
        // Entries of the same task must be adjacent: no interleaving occurred.
        for pair in order.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn functional_different_keys_do_not_block_each_other() {
        let locks = ChannelLocks::new();
        let _held = locks.acquire("chan-1").await;
        tokio::time::timeout(Duration::from_millis(100), locks.acquire("chan-2"))
            .await
            .expect("independent channel lock should be immediate");
    }
}
