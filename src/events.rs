//! Event types for the call-session core
//!
//! Three families live here:
//!
//! - `SignalingEvent` - inbound lifecycle notifications pushed by the
//!   signaling channel. Delivery order is not guaranteed to match causal
//!   order, so every effect is keyed on session id plus target state, never
//!   on event sequence.
//! - `SignalingIntent` - outbound actions the store sends through the
//!   channel. The store's idempotency guards make each logical action send
//!   at most one intent.
//! - `CallEvent` - state-change notifications published to subscribers
//!   (navigation bridge, presentation screens).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CallError;
use crate::session::{CallDirection, CallState, CallType, EndReason, SessionId};

/// Kind of an inbound signaling event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalingEventKind {
    /// A new call is being offered to this device
    Incoming {
        call_type: CallType,
        initiator: String,
        participants: Vec<String>,
        #[serde(default)]
        metadata: HashMap<String, String>,
    },
    /// The remote party accepted our outgoing call
    Answered,
    /// Another device of the local user answered this call
    AnsweredElsewhere,
    /// The remote party declined our outgoing call
    Declined,
    /// Another device of the local user declined this call
    DeclinedElsewhere,
    /// The caller withdrew the call before it was answered
    Canceled,
    /// The established call was terminated
    Ended,
}

/// One inbound lifecycle event, as delivered by the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingEvent {
    pub session_id: SessionId,
    pub kind: SignalingEventKind,
}

impl SignalingEvent {
    pub fn new(session_id: impl Into<SessionId>, kind: SignalingEventKind) -> Self {
        Self { session_id: session_id.into(), kind }
    }

    /// Build an incoming-call event for a 1:1 call
    pub fn incoming(
        session_id: impl Into<SessionId>,
        call_type: CallType,
        initiator: impl Into<String>,
    ) -> Self {
        let initiator = initiator.into();
        Self::new(
            session_id,
            SignalingEventKind::Incoming {
                call_type,
                participants: vec![initiator.clone()],
                initiator,
                metadata: HashMap::new(),
            },
        )
    }

    pub fn canceled(session_id: impl Into<SessionId>) -> Self {
        Self::new(session_id, SignalingEventKind::Canceled)
    }

    pub fn ended(session_id: impl Into<SessionId>) -> Self {
        Self::new(session_id, SignalingEventKind::Ended)
    }
}

/// Outbound intent sent through the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "intent")]
pub enum SignalingIntent {
    /// Offer a new outgoing call
    Invite {
        session_id: SessionId,
        call_type: CallType,
        callee: String,
    },
    /// Accept the current incoming call
    Answer { session_id: SessionId },
    /// Decline the current incoming call
    Decline { session_id: SessionId },
    /// Terminate an established call
    HangUp { session_id: SessionId },
    /// Withdraw our own outgoing call before it is answered
    Cancel { session_id: SessionId },
}

impl SignalingIntent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SignalingIntent::Invite { session_id, .. }
            | SignalingIntent::Answer { session_id }
            | SignalingIntent::Decline { session_id }
            | SignalingIntent::HangUp { session_id }
            | SignalingIntent::Cancel { session_id } => session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalingIntent::Invite { .. } => "invite",
            SignalingIntent::Answer { .. } => "answer",
            SignalingIntent::Decline { .. } => "decline",
            SignalingIntent::HangUp { .. } => "hang-up",
            SignalingIntent::Cancel { .. } => "cancel",
        }
    }
}

/// Event priority levels for subscribers that filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// Information about a newly ringing incoming call
#[derive(Debug, Clone)]
pub struct IncomingCallInfo {
    pub session_id: SessionId,
    /// Identity of the caller
    pub caller: String,
    pub call_type: CallType,
    /// Display name, when the transport provided one
    pub caller_display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Information about a call state change
#[derive(Debug, Clone)]
pub struct CallStatusInfo {
    pub session_id: SessionId,
    pub direction: CallDirection,
    pub new_state: CallState,
    pub previous_state: Option<CallState>,
    pub end_reason: Option<EndReason>,
    /// Human-readable cause, for logs and transient notices
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Notifications published by the store to its subscribers
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// A new incoming session entered `Ringing`
    IncomingCall {
        info: IncomingCallInfo,
        priority: EventPriority,
    },
    /// The current session transitioned
    CallStateChanged {
        info: CallStatusInfo,
        priority: EventPriority,
    },
    /// A reportable error occurred outside any action's return path
    Error {
        error: CallError,
        session_id: Option<SessionId>,
        priority: EventPriority,
    },
}

impl CallEvent {
    pub fn priority(&self) -> EventPriority {
        match self {
            CallEvent::IncomingCall { priority, .. }
            | CallEvent::CallStateChanged { priority, .. }
            | CallEvent::Error { priority, .. } => *priority,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            CallEvent::IncomingCall { info, .. } => Some(&info.session_id),
            CallEvent::CallStateChanged { info, .. } => Some(&info.session_id),
            CallEvent::Error { session_id, .. } => session_id.as_ref(),
        }
    }
}

/// Push-style observer for applications that prefer callbacks over the
/// broadcast subscription. All policy (answer/decline) stays in the store;
/// the handler only observes.
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    /// A new incoming session started ringing
    async fn on_incoming_call(&self, info: IncomingCallInfo);

    /// The current session changed state
    async fn on_call_state_changed(&self, info: CallStatusInfo);

    /// An error occurred outside an action's return path
    async fn on_error(&self, _error: CallError, _session_id: Option<SessionId>) {
        // Default implementation - override for error handling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_carry_their_session_id() {
        let intent = SignalingIntent::Answer { session_id: SessionId::new("c7") };
        assert_eq!(intent.session_id().as_str(), "c7");
        assert_eq!(intent.name(), "answer");
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(EventPriority::Critical > EventPriority::High);
        assert!(EventPriority::Normal > EventPriority::Low);
    }

    #[test]
    fn incoming_event_serializes_with_kebab_tags() {
        let event = SignalingEvent::canceled("c1");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"canceled\""), "unexpected encoding: {json}");
    }
}
