//! Single-shot cancellable countdown for one open answer window.
//!
//! Arming spawns a task that sleeps for the window and then runs the fire
//! callback; arming again or cancelling aborts the pending task. The fire
//! callback captures the epoch it was armed for and must re-validate it
//! against the session before acting, so a callback that lands late can
//! never act on a superseded question.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct RoundClock {
    handle: Option<JoinHandle<()>>,
}

impl RoundClock {
    /// Start the countdown, cancelling any previous one for this session.
    pub fn arm<F, Fut>(&mut self, duration: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire().await;
        }));
    }

    /// Abort the pending countdown, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Drop the handle without aborting. The fire path calls this on itself
    /// once the timer has gone off, so that a later `cancel` from another
    /// task does not abort the reveal chain mid-flight.
    pub fn disarm(&mut self) {
        self.handle.take();
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RoundClock {
    fn drop(&mut self) {
        self.cancel();
    }
}
