// =============================================================================
// Feed Connection — Lifecycle state machine and retry policy
// =============================================================================
//
//   Disconnected --Connect--> Connecting --Open--> Authenticating --AuthorizeAck--> Subscribed
//                                         \--Open (no credential)-------------------^
//
//   Close / Error from any state -> Disconnected
//   Tick while Authenticating   -> Subscribed (the feed is clearly live)
//
// Transitions are pure; the stream loop feeds events in and logs the result.
// How long to wait before the next Connect is a RetryPolicy decision.
// =============================================================================

use std::time::Duration;

use serde::Serialize;

/// Where the upstream connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Subscribed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Authenticating => write!(f, "Authenticating"),
            Self::Subscribed => write!(f, "Subscribed"),
        }
    }
}

/// Lifecycle events observed on the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    /// Socket opened. `authorize` is true when a credential will be sent.
    Open { authorize: bool },
    AuthorizeAck,
    Tick,
    Close,
    Error,
}

impl ConnectionState {
    /// Next state for `event`. Events that make no sense in the current state
    /// leave it unchanged.
    pub fn on_event(self, event: ConnectionEvent) -> Self {
        use ConnectionEvent as E;
        match (self, event) {
            (_, E::Close) | (_, E::Error) => Self::Disconnected,
            (Self::Disconnected, E::Connect) => Self::Connecting,
            (Self::Connecting, E::Open { authorize: true }) => Self::Authenticating,
            (Self::Connecting, E::Open { authorize: false }) => Self::Subscribed,
            (Self::Authenticating, E::AuthorizeAck) => Self::Subscribed,
            (Self::Authenticating, E::Tick) => Self::Subscribed,
            (state, _) => state,
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Decides the pause before reconnect attempt `attempt` (1-based).
pub trait RetryPolicy: Send {
    fn next_delay(&mut self, attempt: u32) -> Duration;

    /// Called after a session that delivered at least one tick has ended.
    fn reset(&mut self) {}
}

/// Same delay every time, forever.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Growing delay with a ceiling; resets after a healthy session.
///
/// A `factor` below 1 or not finite is treated as 1, and a `max` below
/// `initial` is raised to `initial`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        let factor = if factor.is_finite() && factor >= 1.0 { factor } else { 1.0 };
        Self {
            current: initial,
            initial,
            max: max.max(initial),
            factor,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.factor)
            .map(|next| next.min(self.max))
            .unwrap_or(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}
