//! Coalescing work queue and retry backoff
//!
//! The queue holds at most one pending trigger. Adding while a trigger is
//! already pending is a no-op, so a burst of watch events collapses into a
//! single reconcile pass.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Producer side of the work queue
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<()>,
}

/// Consumer side of the work queue
#[derive(Debug)]
pub struct WorkReceiver {
    rx: mpsc::Receiver<()>,
}

/// Create a queue with a single pending slot
pub fn work_queue() -> (WorkQueue, WorkReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (WorkQueue { tx }, WorkReceiver { rx })
}

impl WorkQueue {
    /// Request a pass. Returns false if one was already pending.
    pub fn add(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("Work already queued; coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    /// Request a pass after `delay`
    pub fn add_after(&self, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add();
        });
    }
}

impl WorkReceiver {
    /// Wait for the next trigger; `None` once every producer is gone
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Exponential backoff: `base * 2^failures`, capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Delay before the next retry; each call counts one more failure
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures);
        self.failures = self.failures.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_triggers_coalesce() {
        let (queue, mut work) = work_queue();
        assert!(queue.add());
        assert!(!queue.add());
        assert!(!queue.add());

        assert_eq!(work.next().await, Some(()));
        // only one pass was queued
        let pending = tokio::time::timeout(Duration::from_millis(20), work.next()).await;
        assert!(pending.is_err());

        assert!(queue.add());
        assert_eq!(work.next().await, Some(()));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, mut work) = work_queue();
        drop(queue);
        assert_eq!(work.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after() {
        let (queue, mut work) = work_queue();
        queue.add_after(Duration::from_secs(30));

        let early = tokio::time::timeout(Duration::from_secs(10), work.next()).await;
        assert!(early.is_err());
        let late = tokio::time::timeout(Duration::from_secs(60), work.next()).await;
        assert_eq!(late.unwrap(), Some(()));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(5), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.failures(), 24);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_backoff_survives_many_failures() {
        let mut backoff = Backoff::new(Duration::from_millis(5), Duration::from_secs(1000));
        for _ in 0..100 {
            assert!(backoff.next_delay() <= Duration::from_secs(1000));
        }
    }
}
