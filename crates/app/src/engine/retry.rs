use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Backoff(Duration),
    /// The attempt cap is spent; stop and report upward.
    GiveUp,
}

/// Linear-multiple backoff over capture-init failures, capped in both
/// delay and attempt count. A success resets the attempt counter so the
/// next episode starts from the base delay.
#[derive(Debug)]
pub struct RetryScheduler {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl RetryScheduler {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        if self.attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        self.attempt += 1;
        let delay = self.base.saturating_mul(self.attempt).min(self.cap);
        RetryDecision::Backoff(delay)
    }

    pub fn record_success(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
