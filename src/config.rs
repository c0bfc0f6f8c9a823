//! Configuration for the call-session core

use std::time::Duration;

use crate::recovery::RetryConfig;

/// Policy for a second incoming call while one session is non-terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlarePolicy {
    /// Decline the new offer with busy; the current session is untouched
    RejectBusy,
}

/// Tunable policy for the store and channel driver
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long a `Ringing` session waits for action before going `Missed`
    /// (or, for outgoing calls, `Canceled` with a timeout reason)
    pub ring_timeout: Duration,
    /// Upper bound on waiting for the channel to acknowledge a send
    pub send_timeout: Duration,
    /// How a concurrent second incoming call is resolved
    pub glare_policy: GlarePolicy,
    /// Backoff schedule for transport reconnection
    pub reconnect_retry: RetryConfig,
    /// Interval for the typing-status poller
    pub typing_poll_interval: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(40),
            send_timeout: Duration::from_secs(10),
            glare_policy: GlarePolicy::RejectBusy,
            reconnect_retry: RetryConfig::slow(),
            typing_poll_interval: Duration::from_secs(4),
        }
    }
}

impl CallConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ring_timeout(mut self, timeout: Duration) -> Self {
        self.ring_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_reconnect_retry(mut self, retry: RetryConfig) -> Self {
        self.reconnect_retry = retry;
        self
    }

    pub fn with_typing_poll_interval(mut self, interval: Duration) -> Self {
        self.typing_poll_interval = interval;
        self
    }
}
