//! Cancellable deferred actions tied to an order channel.
//!
//! Channel deletion, the payment-confirmation prompt, and auto-deleted
//! notices all run after a pacing delay. Tasks are tracked per channel so a
//! superseding transition can abort whatever is still pending; a fired task
//! must tolerate its target being gone.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Default)]
pub struct DeferredTasks {
    tasks: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `action` after `delay`, tracked under `channel_id`.
    pub fn schedule<F>(&self, channel_id: &str, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        let mut tasks = self.tasks.lock().expect("deferred task map poisoned");
        let entry = tasks.entry(channel_id.to_string()).or_default();
        entry.retain(|handle| !handle.is_finished());
        entry.push(handle);
    }

    /// Aborts every pending task for a channel.
    pub fn cancel_channel(&self, channel_id: &str) {
        let mut tasks = self.tasks.lock().expect("deferred task map poisoned");
        if let Some(handles) = tasks.remove(channel_id) {
            for handle in handles {
                handle.abort();
            }
        }
    }

    /// Pending (not yet finished) task count for a channel.
    pub fn pending_for(&self, channel_id: &str) -> usize {
        let tasks = self.tasks.lock().expect("deferred task map poisoned");
        tasks
            .get(channel_id)
            .map(|handles| {
                handles
                    .iter()
                    .filter(|handle| !handle.is_finished())
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::DeferredTasks;

    #[tokio::test]
    async fn functional_scheduled_task_fires_after_delay() {
        let tasks = DeferredTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let witness = fired.clone();
        tasks.schedule("chan-1", Duration::from_millis(10), async move {
            witness.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tasks.pending_for("chan-1"), 0);
    }

    #[tokio::test]
    async fn functional_cancel_channel_aborts_pending_tasks() {
        let tasks = DeferredTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let witness = fired.clone();
        tasks.schedule("chan-1", Duration::from_millis(30), async move {
            witness.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(tasks.pending_for("chan-1"), 1);
        tasks.cancel_channel("chan-1");
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(tasks.pending_for("chan-1"), 0);
    }

    #[tokio::test]
    async fn unit_cancel_leaves_other_channels_untouched() {
        let tasks = DeferredTasks::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let witness = fired.clone();
        tasks.schedule("chan-2", Duration::from_millis(10), async move {
            witness.fetch_add(1, Ordering::SeqCst);
        });
        tasks.cancel_channel("chan-1");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
