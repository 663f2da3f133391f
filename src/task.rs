//! Cancellable periodic background tasks.
//!
//! Both the per-plugin update loops and the monitor's orchestration loop are
//! built on [`BackgroundTask`]: spawn a tick closure on the runtime, wait an
//! initial settle delay, then alternate tick and interval sleep until the
//! task is cancelled. Cancellation is cooperative — the current tick runs to
//! completion and receives the token so long-running work can bail early.

use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// A periodically executed task with a cancellation handle.
#[derive(Debug)]
pub struct BackgroundTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Spawn a periodic task.
    ///
    /// The loop sleeps `settle` once before the first tick (staggering
    /// startup cost when many tasks spawn together), then repeats: run one
    /// tick to completion, sleep `interval`. Cancellation is observed during
    /// both sleeps and handed to the tick closure for its own suspension
    /// points.
    pub fn spawn<F, Fut>(settle: Duration, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = loop_token.cancelled() => return,
                _ = tokio::time::sleep(settle) => {}
            }

            loop {
                tick(loop_token.clone()).await;

                tokio::select! {
                    _ = loop_token.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self { token, handle }
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the loop has exited (for any reason).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request cancellation without waiting for the loop to exit.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the loop to exit.
    ///
    /// The `Err` case only surfaces a panicked or aborted task; a loop that
    /// exited through cancellation returns `Ok`.
    pub async fn cancel_and_wait(self) -> Result<(), JoinError> {
        self.token.cancel();
        self.handle.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();

        let task = BackgroundTask::spawn(
            Duration::from_millis(1),
            Duration::from_millis(5),
            move |_token| {
                let count = task_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        task.cancel_and_wait().await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_settle_delay_defers_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();

        let task = BackgroundTask::spawn(
            Duration::from_secs(60),
            Duration::from_millis(1),
            move |_token| {
                let count = task_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        task.cancel_and_wait().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_settle_exits_cleanly() {
        let task = BackgroundTask::spawn(
            Duration::from_secs(60),
            Duration::from_secs(60),
            |_token| async {},
        );

        assert!(!task.is_cancelled());
        task.cancel();
        assert!(task.is_cancelled());
        // The handle resolves promptly even though settle was an hour.
        tokio::time::timeout(Duration::from_secs(1), task.handle)
            .await
            .unwrap()
            .unwrap();
    }
}
