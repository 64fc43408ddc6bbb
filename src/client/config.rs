//! Connection manager configuration.

use std::{num::NonZeroUsize, time::Duration};

use crate::codec::{MAX_FRAME_LENGTH, clamp_frame_length};

/// Default connection server host.
pub const DEFAULT_HOST: &str = "mtalk.google.com";
/// Default connection server port.
pub const DEFAULT_PORT: u16 = 5228;
/// Default cap on the reconnect delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(15);
/// Default ledger capacity.
pub const DEFAULT_LEDGER_CAPACITY: usize = 10_000;

/// Settings for a [`PushClient`](super::PushClient).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pushframe::client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_endpoint("localhost", 15228)
///     .with_max_backoff(Duration::from_secs(5));
/// assert_eq!(config.host(), "localhost");
/// assert_eq!(config.max_backoff(), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    max_backoff: Duration,
    backoff_step: Duration,
    max_frame_length: usize,
    ledger_capacity: Option<NonZeroUsize>,
    answer_heartbeats: bool,
    keepalive: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_step: Duration::from_secs(1),
            max_frame_length: MAX_FRAME_LENGTH,
            ledger_capacity: NonZeroUsize::new(DEFAULT_LEDGER_CAPACITY),
            answer_heartbeats: true,
            keepalive: Some(Duration::from_secs(60)),
            connect_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Set the server host and port.
    #[must_use]
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Cap the reconnect delay. Values below the step are raised to it.
    #[must_use]
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    /// Set the delay added per consecutive failure.
    ///
    /// A zero step is raised to one millisecond.
    #[must_use]
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step.max(Duration::from_millis(1));
        self
    }

    /// Set the largest accepted frame payload, clamped to the codec limits.
    #[must_use]
    pub fn with_max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = clamp_frame_length(len);
        self
    }

    /// Bound the persistent-id ledger. `None` leaves it unbounded.
    #[must_use]
    pub fn with_ledger_capacity(mut self, capacity: Option<NonZeroUsize>) -> Self {
        self.ledger_capacity = capacity;
        self
    }

    /// Whether server heartbeat pings are acknowledged.
    #[must_use]
    pub fn with_answer_heartbeats(mut self, enabled: bool) -> Self {
        self.answer_heartbeats = enabled;
        self
    }

    /// TCP keepalive interval. `None` disables keepalive.
    #[must_use]
    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive = interval;
        self
    }

    /// Bound the TCP connect and TLS handshake. `None` waits indefinitely.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str { &self.host }

    #[must_use]
    pub fn port(&self) -> u16 { self.port }

    #[must_use]
    pub fn max_backoff(&self) -> Duration { self.max_backoff.max(self.backoff_step) }

    #[must_use]
    pub fn backoff_step(&self) -> Duration { self.backoff_step }

    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    #[must_use]
    pub fn ledger_capacity(&self) -> Option<NonZeroUsize> { self.ledger_capacity }

    #[must_use]
    pub fn answer_heartbeats(&self) -> bool { self.answer_heartbeats }

    #[must_use]
    pub fn keepalive(&self) -> Option<Duration> { self.keepalive }

    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> { self.connect_timeout }
}
