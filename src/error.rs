//! Error types and handling for the call-session core
//!
//! Errors fall into three groups, matching how callers should react:
//!
//! - **State errors** - an action was attempted against a session in the
//!   wrong status, or no session exists. These indicate a UI bug that got
//!   past the idempotency guards and are always reported, never swallowed.
//! - **Channel errors** - the signaling backend rejected an intent or is
//!   unreachable. Rejections surface as a `Failed` terminal transition with
//!   `EndReason::Error`; unavailability is recoverable with backoff.
//! - **System errors** - timeouts and internal invariant breaks.
//!
//! Stale inbound events are *not* errors: `ingest` counts and drops them.

use thiserror::Error;

use crate::session::{CallState, SessionId};

/// Result type alias for call-core operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors reported by call-session operations
#[derive(Error, Debug, Clone)]
pub enum CallError {
    /// Action referenced a session id that is not the current session
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    /// Action requires a session but the slot is empty
    #[error("no active session for operation '{operation}'")]
    NoActiveSession { operation: &'static str },

    /// Action is not valid in the session's current state
    #[error("invalid state for '{operation}' on session {session_id}: {current_state}")]
    InvalidState {
        operation: &'static str,
        session_id: SessionId,
        current_state: CallState,
    },

    /// The backend or remote side rejected an outbound intent
    #[error("channel rejected intent: {reason}")]
    ChannelRejected { reason: String },

    /// The transport is down or unable to deliver
    #[error("signaling channel unavailable: {reason}")]
    ChannelUnavailable { reason: String },

    /// An outbound intent was not acknowledged in time
    #[error("send timed out after {duration_ms}ms")]
    SendTimeout { duration_ms: u64 },

    /// Internal invariant violation
    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl CallError {
    /// Create a channel rejection error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::ChannelRejected { reason: reason.into() }
    }

    /// Create a channel unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ChannelUnavailable { reason: reason.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is worth retrying with backoff.
    ///
    /// Rejections are final: retrying an answer after the backend refused it
    /// has ambiguous semantics, so only transport-level trouble qualifies.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CallError::ChannelUnavailable { .. } | CallError::SendTimeout { .. }
        )
    }

    /// Check if this error indicates a caller-side state bug
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            CallError::SessionNotFound { .. }
                | CallError::NoActiveSession { .. }
                | CallError::InvalidState { .. }
        )
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            CallError::SessionNotFound { .. }
            | CallError::NoActiveSession { .. }
            | CallError::InvalidState { .. } => "state",

            CallError::ChannelRejected { .. }
            | CallError::ChannelUnavailable { .. }
            | CallError::SendTimeout { .. } => "channel",

            CallError::InternalError { .. } => "system",
        }
    }
}
