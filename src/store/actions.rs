//! User-initiated call actions
//!
//! Each action validates against the current session under the store lock,
//! applies its optimistic transition, and only then talks to the channel.
//! In-flight flags are set before the first await so concurrent taps see
//! the pending state instead of racing ahead of it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{CallError, CallResult};
use crate::events::SignalingIntent;
use crate::recovery::with_timeout;
use crate::session::{CallDirection, CallSession, CallState, CallType, EndReason, SessionId};

impl super::CallSessionStore {
    /// Initiate an outgoing call. Creates a `Ringing` session, sends the
    /// invite, and arms the ring timeout.
    pub async fn place_call(
        self: &Arc<Self>,
        caller: impl Into<String>,
        callee: impl Into<String>,
        call_type: CallType,
    ) -> CallResult<SessionId> {
        let caller = caller.into();
        let callee = callee.into();
        let session_id = SessionId::generate();

        let snapshot = {
            let mut inner = self.inner.lock().await;
            if let Some(existing) = &inner.session {
                if existing.state.is_in_progress() {
                    return Err(CallError::InvalidState {
                        operation: "place_call",
                        session_id: existing.id.clone(),
                        current_state: existing.state.clone(),
                    });
                }
            }

            let session = CallSession {
                id: session_id.clone(),
                direction: CallDirection::Outgoing,
                call_type,
                participants: vec![callee.clone()],
                initiator: caller,
                state: CallState::Ringing,
                created_at: Utc::now(),
                answered_at: None,
                ended_at: None,
                end_reason: None,
                metadata: HashMap::new(),
            };
            inner.session = Some(session.clone());
            self.arm_ring_timer(&mut inner, session_id.clone());
            session
        };
        self.notify_created(&snapshot).await;

        let invite = SignalingIntent::Invite {
            session_id: session_id.clone(),
            call_type,
            callee,
        };
        let sent = with_timeout("invite_intent", self.config.send_timeout, async {
            self.channel.send(invite).await
        })
        .await;

        if let Err(e) = sent {
            let settled = {
                let mut inner = self.inner.lock().await;
                let matches = inner
                    .session
                    .as_ref()
                    .map(|s| s.id == session_id && s.state == CallState::Ringing)
                    .unwrap_or(false);
                if matches {
                    self.apply_transition(&mut inner, CallState::Failed, Some(EndReason::Error))
                } else {
                    None
                }
            };
            if let Some((session, previous)) = settled {
                self.notify_transition(&session, previous, Some(format!("invite failed: {e}")))
                    .await;
            }
            return Err(e);
        }
        Ok(session_id)
    }

    /// Answer the current incoming call.
    ///
    /// Moves to `Answering` synchronously so a double tap is a no-op, then
    /// awaits the channel's verdict. A remote terminal event that lands
    /// during the wait wins; the late acknowledgment is discarded.
    pub async fn answer(&self, session_id: &SessionId) -> CallResult<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(CallError::NoActiveSession {
                operation: "answer",
            })?;
            if session.id != *session_id {
                return Err(CallError::SessionNotFound {
                    session_id: session_id.clone(),
                });
            }
            match session.state {
                CallState::Answering if inner.answering => {
                    debug!(session_id = %session_id, "answer already in flight, ignoring");
                    return Ok(());
                }
                CallState::Ringing => {}
                ref state => {
                    return Err(CallError::InvalidState {
                        operation: "answer",
                        session_id: session_id.clone(),
                        current_state: state.clone(),
                    });
                }
            }
            inner.answering = true;
            self.apply_transition(&mut inner, CallState::Answering, None)
        };
        if let Some((session, previous)) = snapshot {
            self.notify_transition(&session, previous, Some("local answer".to_string()))
                .await;
        }

        let verdict = with_timeout("answer_intent", self.config.send_timeout, async {
            self.channel
                .send(SignalingIntent::Answer {
                    session_id: session_id.clone(),
                })
                .await
        })
        .await;

        // Settle: the ingest path may have moved the session on while we
        // were suspended, in which case its outcome stands.
        let settled = {
            let mut inner = self.inner.lock().await;
            inner.answering = false;
            let still_answering = inner
                .session
                .as_ref()
                .map(|s| s.id == *session_id && s.state == CallState::Answering)
                .unwrap_or(false);
            if !still_answering {
                debug!(
                    session_id = %session_id,
                    "answer outcome discarded, session moved on during send"
                );
                None
            } else {
                match &verdict {
                    Ok(()) => {
                        self.apply_transition(&mut inner, CallState::Active, None)
                            .map(|t| (t, "channel confirmed answer".to_string()))
                    }
                    Err(e) => self
                        .apply_transition(&mut inner, CallState::Failed, Some(EndReason::Error))
                        .map(|t| (t, format!("answer rejected: {e}"))),
                }
            }
        };
        if let Some(((session, previous), reason)) = settled {
            self.notify_transition(&session, previous, Some(reason)).await;
        }

        verdict
    }

    /// Decline the current incoming call.
    ///
    /// Declining is unilateral, so the transition is optimistic: the state
    /// settles to `Declined` before the intent is dispatched, and channel
    /// failures are logged rather than surfaced.
    pub async fn decline(&self, session_id: &SessionId) -> CallResult<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(CallError::NoActiveSession {
                operation: "decline",
            })?;
            if session.id != *session_id {
                return Err(CallError::SessionNotFound {
                    session_id: session_id.clone(),
                });
            }
            if inner.declining {
                debug!(session_id = %session_id, "decline already in flight, ignoring");
                return Ok(());
            }
            match session.state {
                CallState::Ringing | CallState::Answering => {}
                ref state => {
                    return Err(CallError::InvalidState {
                        operation: "decline",
                        session_id: session_id.clone(),
                        current_state: state.clone(),
                    });
                }
            }
            inner.declining = true;
            self.apply_transition(&mut inner, CallState::Declined, Some(EndReason::LocalDeclined))
        };
        if let Some((session, previous)) = snapshot {
            self.notify_transition(&session, previous, Some("local decline".to_string()))
                .await;
        }

        let sent = self
            .channel
            .send(SignalingIntent::Decline {
                session_id: session_id.clone(),
            })
            .await;
        if let Err(e) = sent {
            warn!(session_id = %session_id, error = %e, "decline intent failed, state already settled");
        }

        self.inner.lock().await.declining = false;
        Ok(())
    }

    /// Hang up the current established call
    pub async fn hang_up(&self, session_id: &SessionId) -> CallResult<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(CallError::NoActiveSession {
                operation: "hang_up",
            })?;
            if session.id != *session_id {
                return Err(CallError::SessionNotFound {
                    session_id: session_id.clone(),
                });
            }
            if session.state != CallState::Active {
                return Err(CallError::InvalidState {
                    operation: "hang_up",
                    session_id: session_id.clone(),
                    current_state: session.state.clone(),
                });
            }
            self.apply_transition(&mut inner, CallState::Ended, Some(EndReason::LocalHangup))
        };
        if let Some((session, previous)) = snapshot {
            self.notify_transition(&session, previous, Some("local hangup".to_string()))
                .await;
        }

        let sent = self
            .channel
            .send(SignalingIntent::HangUp {
                session_id: session_id.clone(),
            })
            .await;
        if let Err(e) = sent {
            warn!(session_id = %session_id, error = %e, "hang-up intent failed, state already settled");
        }
        Ok(())
    }

    /// Withdraw our own outgoing call before the remote side answers
    pub async fn cancel(&self, session_id: &SessionId) -> CallResult<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(CallError::NoActiveSession {
                operation: "cancel",
            })?;
            if session.id != *session_id {
                return Err(CallError::SessionNotFound {
                    session_id: session_id.clone(),
                });
            }
            if session.direction != CallDirection::Outgoing
                || session.state != CallState::Ringing
            {
                return Err(CallError::InvalidState {
                    operation: "cancel",
                    session_id: session_id.clone(),
                    current_state: session.state.clone(),
                });
            }
            self.apply_transition(&mut inner, CallState::Canceled, Some(EndReason::LocalHangup))
        };
        if let Some((session, previous)) = snapshot {
            self.notify_transition(&session, previous, Some("local cancel".to_string()))
                .await;
        }

        let sent = self
            .channel
            .send(SignalingIntent::Cancel {
                session_id: session_id.clone(),
            })
            .await;
        if let Err(e) = sent {
            warn!(session_id = %session_id, error = %e, "cancel intent failed, state already settled");
        }
        Ok(())
    }
}
