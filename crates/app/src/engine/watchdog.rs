use std::future::pending;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Single-deadline liveness timer guarding a handoff that never resumes.
///
/// Lives on the coordination task, so arming and disarming are plain
/// field updates; the select loop awaits [`Watchdog::expired`]. Re-arming
/// replaces the previous deadline rather than stacking a second one, and
/// each arm cycle can fire at most once because the handler disarms.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed deadline passes; pends forever while
    /// disarmed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn fires_at_the_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.arm();
        timeout(Duration::from_secs(6), watchdog.expired())
            .await
            .expect("armed watchdog should fire");
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_watchdog_never_fires() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.arm();
        watchdog.disarm();
        assert!(timeout(Duration::from_secs(60), watchdog.expired())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(5));
        watchdog.arm();
        advance(Duration::from_secs(3)).await;
        watchdog.arm();

        // The original deadline (t+5) must not fire; only the new one at
        // t+8 counts.
        assert!(timeout(Duration::from_secs(4), watchdog.expired())
            .await
            .is_err());
        timeout(Duration::from_secs(2), watchdog.expired())
            .await
            .expect("replaced deadline should fire");
    }

    #[tokio::test(start_paused = true)]
    async fn unarmed_watchdog_pends() {
        let watchdog = Watchdog::new(Duration::from_secs(1));
        assert!(!watchdog.is_armed());
        assert!(timeout(Duration::from_secs(30), watchdog.expired())
            .await
            .is_err());
    }
}
