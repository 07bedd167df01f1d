//! Registry of outstanding cancellation timers.
//!
//! # Responsibilities
//! - Arm deadline timers on the Tokio runtime
//! - Track every armed timer until it is cleared
//! - Sweep all remaining timers at shutdown
//!
//! # Design Decisions
//! - One registry per service instance, shared via `Arc` (no global list)
//! - `clear` is idempotent: unknown or already-fired handles are ignored
//! - `ArmedTimer` clears on drop so every exit path releases its timer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Opaque identifier of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

struct Armed {
    handle: TimerHandle,
    task: AbortHandle,
}

/// Ordered set of pending timers.
#[derive(Default)]
pub struct TimerRegistry {
    next_id: AtomicU64,
    armed: Mutex<Vec<Armed>>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_expire` to run after `after` and record the timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm<F>(&self, after: Duration, on_expire: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_expire();
        })
        .abort_handle();

        self.lock().push(Armed { handle, task });
        tracing::trace!(timer = handle.0, after_ms = after.as_millis() as u64, "Timer armed");
        handle
    }

    /// Cancel a timer if it has not fired yet and forget it.
    ///
    /// Clearing an unknown, cleared or fired handle does nothing.
    pub fn clear(&self, handle: TimerHandle) {
        let removed = {
            let mut armed = self.lock();
            armed
                .iter()
                .position(|a| a.handle == handle)
                .map(|idx| armed.remove(idx))
        };

        if let Some(armed) = removed {
            armed.task.abort();
            tracing::trace!(timer = handle.0, "Timer cleared");
        }
    }

    /// Clear every outstanding timer in arming order.
    ///
    /// Returns the number of timers that were still registered.
    pub fn drain_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        let count = drained.len();
        for armed in drained {
            armed.task.abort();
        }
        if count > 0 {
            tracing::debug!(count, "Drained pending timers");
        }
        count
    }

    /// Arm a timer that cancels `token` on expiry.
    ///
    /// The returned guard clears the timer when dropped.
    pub fn deadline(&self, after: Duration, token: CancellationToken) -> ArmedTimer<'_> {
        let handle = self.arm(after, move || token.cancel());
        ArmedTimer {
            registry: self,
            handle,
        }
    }

    /// Whether `handle` is still registered.
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.lock().iter().any(|a| a.handle == handle)
    }

    /// Number of registered timers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Armed>> {
        // A poisoned list is still a valid list of handles.
        self.armed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Scope guard for a timer armed through [`TimerRegistry::deadline`].
pub struct ArmedTimer<'a> {
    registry: &'a TimerRegistry,
    handle: TimerHandle,
}

impl ArmedTimer<'_> {
    pub fn handle(&self) -> TimerHandle {
        self.handle
    }
}

impl Drop for ArmedTimer<'_> {
    fn drop(&mut self) {
        self.registry.clear(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_arm_fires_after_deadline() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();

        let handle = registry.arm(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(registry.contains(handle));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Fired timers stay registered until cleared.
        assert!(registry.contains(handle));
        registry.clear(handle);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_clear_prevents_firing() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();

        let handle = registry.arm(Duration::from_millis(20), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        registry.clear(handle);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_clear_is_noop() {
        let registry = TimerRegistry::new();
        let keep = registry.arm(Duration::from_secs(60), || {});
        let handle = registry.arm(Duration::from_secs(60), || {});

        registry.clear(handle);
        assert_eq!(registry.len(), 1);

        registry.clear(handle);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(keep));
    }

    #[tokio::test]
    async fn test_drain_all_empties_and_silences() {
        let registry = TimerRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let f = fired.clone();
            registry.arm(Duration::from_millis(20), move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(registry.len(), 5);

        assert_eq!(registry.drain_all(), 5);
        assert!(registry.is_empty());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(registry.drain_all(), 0);
    }

    #[tokio::test]
    async fn test_deadline_guard_clears_on_drop() {
        let registry = TimerRegistry::new();
        let token = CancellationToken::new();

        {
            let guard = registry.deadline(Duration::from_secs(60), token.clone());
            assert!(registry.contains(guard.handle()));
        }

        assert!(registry.is_empty());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_cancels_token() {
        let registry = TimerRegistry::new();
        let token = CancellationToken::new();

        let _guard = registry.deadline(Duration::from_millis(5), token.clone());
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("deadline should cancel the token");
    }
}
