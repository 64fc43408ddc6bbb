//! Reconnect back-off.

use std::time::Duration;

/// Linear reconnect back-off.
///
/// The `n`th consecutive failure waits `min(n, cap) * step`, where `cap` is
/// `max_delay / step`. A successful connection resets the count.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pushframe::client::ReconnectBackoff;
///
/// let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(3));
/// let delays: Vec<_> = (0..4).map(|_| backoff.next_delay().as_secs()).collect();
/// assert_eq!(delays, [1, 2, 3, 3]);
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectBackoff {
    step: Duration,
    max_delay: Duration,
    retries: u32,
}

impl ReconnectBackoff {
    /// Create a back-off adding `step` per failure up to `max_delay`.
    #[must_use]
    pub fn new(step: Duration, max_delay: Duration) -> Self {
        let step = step.max(Duration::from_millis(1));
        Self {
            step,
            max_delay: max_delay.max(step),
            retries: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.retries = self.retries.saturating_add(1);
        self.step.saturating_mul(self.retries).min(self.max_delay)
    }

    /// Forget previous failures.
    pub fn reset(&mut self) { self.retries = 0; }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub fn retries(&self) -> u32 { self.retries }
}

impl Default for ReconnectBackoff {
    fn default() -> Self { Self::new(Duration::from_secs(1), Duration::from_secs(15)) }
}
