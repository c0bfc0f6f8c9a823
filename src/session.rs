//! Call session data model
//!
//! A `CallSession` is the unit of truth for one call attempt, from ring to
//! terminal state. It is owned exclusively by the `CallSessionStore` and
//! mutated only through the store's transition function; every other
//! component reads cloned snapshots.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a call session.
///
/// Assigned by whichever side initiates the call and stable for the lifetime
/// of the attempt. Remote ids are treated as opaque strings; locally
/// initiated sessions generate a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a locally initiated session
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Current state of a call session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallState {
    /// Signaled but not yet answered, declined, or canceled
    Ringing,
    /// Local answer sent, awaiting channel confirmation
    Answering,
    /// Confirmed; media is expected to be flowing
    Active,
    /// Declined locally, by the remote party, or on another device
    Declined,
    /// Caller hung up before the call was answered
    Canceled,
    /// Ring timeout elapsed with no user action
    Missed,
    /// An established call finished
    Ended,
    /// Unrecoverable signaling error
    Failed,
}

impl CallState {
    /// Check if no further transitions are permitted out of this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Declined
                | CallState::Canceled
                | CallState::Missed
                | CallState::Ended
                | CallState::Failed
        )
    }

    /// Check if the session is still in progress
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if the call is established (media may flow)
    pub fn is_active(&self) -> bool {
        matches!(self, CallState::Active)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallState::Ringing => "ringing",
            CallState::Answering => "answering",
            CallState::Active => "active",
            CallState::Declined => "declined",
            CallState::Canceled => "canceled",
            CallState::Missed => "missed",
            CallState::Ended => "ended",
            CallState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a call (from this device's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallDirection {
    /// Received from the network
    Incoming,
    /// Initiated by the local user
    Outgoing,
}

/// Kind of media the call carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallType {
    Voice,
    Video,
}

/// Why a session reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// Remote party (or another local device) declined
    RemoteDeclined,
    /// Caller withdrew the call before it was answered
    RemoteCanceled,
    /// Local user declined
    LocalDeclined,
    /// Local user hung up or canceled their own outgoing call
    LocalHangup,
    /// Remote party hung up an established call
    RemoteHangup,
    /// Ring timeout elapsed
    Timeout,
    /// Channel rejection or unrecoverable signaling error
    Error,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndReason::RemoteDeclined => "remote-declined",
            EndReason::RemoteCanceled => "remote-canceled",
            EndReason::LocalDeclined => "local-declined",
            EndReason::LocalHangup => "local-hangup",
            EndReason::RemoteHangup => "remote-hangup",
            EndReason::Timeout => "timeout",
            EndReason::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One call attempt, uniquely identified, from ring to terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Session identifier assigned by the initiating side
    pub id: SessionId,
    /// Direction from this device's perspective
    pub direction: CallDirection,
    /// Voice or video
    pub call_type: CallType,
    /// Ordered remote participant identities; exactly one for a 1:1 call
    pub participants: Vec<String>,
    /// Identity of the participant who created the session
    pub initiator: String,
    /// Current state; transitions are monotonic with respect to the machine
    pub state: CallState,
    /// When the session was created locally
    pub created_at: DateTime<Utc>,
    /// Set if and only if the session ever reached `Active`
    pub answered_at: Option<DateTime<Utc>>,
    /// Set when a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
    /// Populated on terminal states
    pub end_reason: Option<EndReason>,
    /// Transport-provided extras (display name, subject, ...)
    pub metadata: HashMap<String, String>,
}

impl CallSession {
    /// The remote party of a 1:1 call, or the first group participant
    pub fn remote_party(&self) -> Option<&str> {
        self.participants.first().map(|p| p.as_str())
    }

    /// A group call has more than one remote participant slot
    pub fn is_group(&self) -> bool {
        self.participants.len() > 1
    }

    /// Talk time, once the call has been answered and ended
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.answered_at, self.ended_at) {
            (Some(answered), Some(ended)) => Some(ended - answered),
            _ => None,
        }
    }
}

/// Counters describing store activity since creation
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    /// Sessions created (incoming and outgoing)
    pub total_calls: usize,
    /// Sessions that reached `Active`
    pub answered_calls: usize,
    /// Sessions that timed out ringing
    pub missed_calls: usize,
    /// Sessions declined locally or remotely
    pub declined_calls: usize,
    /// Inbound events dropped by the staleness guard
    pub stale_events_discarded: usize,
}
