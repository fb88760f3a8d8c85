//! Keep-alive scheduling.
//!
//! The connection task owns one [`KeepAlive`]. It arms the timer whenever
//! the command queue drains and disarms it as soon as a command is
//! submitted, so a NOOP never lands between another command's bytes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct KeepAlive {
    interval: Duration,
    max_failures: u32,
    deadline: Option<Instant>,
    failures: u32,
}

impl KeepAlive {
    pub(crate) const fn new(interval: Duration, max_failures: u32) -> Self {
        Self {
            interval,
            max_failures,
            deadline: None,
            failures: 0,
        }
    }

    pub(crate) const fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Arms the timer one interval from `now`.
    pub(crate) fn schedule(&mut self, now: Instant) {
        if self.is_enabled() {
            self.deadline = Some(now + self.interval);
        }
    }

    pub(crate) const fn cancel(&mut self) {
        self.deadline = None;
    }

    pub(crate) const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) const fn failures(&self) -> u32 {
        self.failures
    }

    pub(crate) fn record_success(&mut self) {
        if self.failures > 0 {
            debug!(previous_failures = self.failures, "keep-alive recovered");
        }
        self.failures = 0;
    }

    /// Counts a failed NOOP.
    ///
    /// # Errors
    ///
    /// [`Error::KeepAliveFailed`] once the failures in a row exceed the limit.
    pub(crate) fn record_failure(&mut self, err: &Error) -> Result<()> {
        self.failures += 1;
        warn!(failures = self.failures, error = %err, "keep-alive NOOP failed");
        if self.failures > self.max_failures {
            return Err(Error::KeepAliveFailed(self.failures));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failure() -> Error {
        Error::ServerNo {
            text: "busy".into(),
            code: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_and_cancel() {
        let mut keepalive = KeepAlive::new(Duration::from_secs(60), 3);
        assert!(keepalive.deadline().is_none());
        let now = Instant::now();
        keepalive.schedule(now);
        assert_eq!(keepalive.deadline(), Some(now + Duration::from_secs(60)));
        keepalive.cancel();
        assert!(keepalive.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_never_schedules() {
        let mut keepalive = KeepAlive::new(Duration::ZERO, 3);
        assert!(!keepalive.is_enabled());
        keepalive.schedule(Instant::now());
        assert!(keepalive.deadline().is_none());
    }

    #[test]
    fn fails_after_threshold_is_exceeded() {
        let mut keepalive = KeepAlive::new(Duration::from_secs(1), 3);
        for _ in 0..3 {
            keepalive.record_failure(&failure()).unwrap();
        }
        assert!(matches!(
            keepalive.record_failure(&failure()),
            Err(Error::KeepAliveFailed(4))
        ));
    }

    #[test]
    fn success_resets_the_count() {
        let mut keepalive = KeepAlive::new(Duration::from_secs(1), 1);
        keepalive.record_failure(&failure()).unwrap();
        keepalive.record_success();
        assert_eq!(keepalive.failures(), 0);
        keepalive.record_failure(&failure()).unwrap();
    }
}
