//! One-shot timer abstraction.
//!
//! The scheduler depends only on `after`/`cancel`, so the underlying
//! mechanism (one tokio sleep per trade here) is an implementation choice
//! rather than a contract.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a scheduled one-shot timer.
pub struct TimerHandle {
    armed: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the timer.
    ///
    /// Cancellation only takes effect while the timer is still waiting: a
    /// callback that has already fired runs to completion on its own task.
    pub fn cancel(&self) {
        self.armed.abort();
    }

    /// Whether the waiting stage has finished (fired or cancelled).
    pub fn is_finished(&self) -> bool {
        self.armed.is_finished()
    }
}

/// Schedule `task` to run once after `delay`.
///
/// A zero delay fires on the next scheduler tick. The returned handle
/// cancels the wait, never the running callback.
pub fn after<F>(delay: Duration, task: F) -> TimerHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let armed = tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        // Detach the callback so cancelling the timer cannot abort it
        // mid-flight.
        tokio::spawn(task);
    });

    TimerHandle { armed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        after(Duration::from_millis(20), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let handle = after(Duration::from_millis(50), async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_delay_fires_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        after(Duration::ZERO, async move {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
