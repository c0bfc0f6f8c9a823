//! Cancelable timer handles
//!
//! Every autonomous timer in this crate is an explicitly cancelable handle
//! tied to its owner's lifetime, never a bare fire-and-forget callback. A
//! canceled handle's body can never run late; dropping the handle cancels
//! it too.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// One-shot timer. Runs its body once after `delay` unless canceled first.
#[derive(Debug)]
pub struct Deadline {
    handle: Option<JoinHandle<()>>,
}

impl Deadline {
    pub fn schedule<F, Fut>(delay: Duration, body: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            body().await;
        });
        Self { handle: Some(handle) }
    }

    /// Cancel the timer. A no-op if the body already ran.
    pub fn cancel(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    /// Release the timer without aborting it.
    ///
    /// The firing path itself runs inside the timer's task, so it must
    /// disarm rather than cancel: aborting here would kill the body
    /// mid-flight at its next suspension point.
    pub fn disarm(mut self) {
        self.handle = None;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// Repeating timer. Runs its body every `interval` until canceled or dropped.
#[derive(Debug)]
pub struct Repeating {
    handle: JoinHandle<()>,
}

impl Repeating {
    pub fn spawn<F, Fut>(interval: Duration, mut body: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of tokio's interval fires immediately; skip it
            // so the first body run happens after one full interval.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                body().await;
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Repeating {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn deadline_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _deadline = Deadline::schedule(Duration::from_millis(20), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn canceled_deadline_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let deadline = Deadline::schedule(Duration::from_millis(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        deadline.cancel();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropped_deadline_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        {
            let _deadline = Deadline::schedule(Duration::from_millis(30), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeating_stops_on_cancel() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let poller = Repeating::spawn(Duration::from_millis(20), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(110)).await;
        poller.cancel();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected a few ticks, saw {seen}");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen, "tick after cancel");
    }
}
