//! One-shot tick timer owned by a session driver

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep_until};

/// A single rearmable deadline. At most one tick is ever outstanding.
#[derive(Debug, Default)]
pub struct TickTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl TickTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer `delay` from now, replacing any pending deadline.
    pub fn arm(&mut self, delay: Duration) {
        let at = Instant::now() + delay;
        match self.deadline.as_mut() {
            Some(sleep) => sleep.as_mut().reset(at),
            None => self.deadline = Some(Box::pin(sleep_until(at))),
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait for the armed deadline. Never completes while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the deadline armed.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let mut timer = TickTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_millis(100));

        timer.fired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_deadline() {
        let mut timer = TickTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_millis(500));
        timer.arm(Duration::from_millis(20));

        timer.fired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_fires() {
        let mut timer = TickTimer::new();
        timer.arm(Duration::from_millis(10));
        timer.cancel();

        let fired = tokio::time::timeout(Duration::from_secs(5), timer.fired()).await;
        assert!(fired.is_err());
    }
}
