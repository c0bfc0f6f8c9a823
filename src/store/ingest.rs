//! Inbound event ingestion and autonomous transitions
//!
//! Inbound events are idempotent and order-tolerant: every effect is keyed
//! on session id plus current status, never on event sequence or remote
//! timestamps. Events for an unknown or already-terminal session are
//! counted and dropped, which is the primary race-safety guard.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::GlarePolicy;
use crate::events::{SignalingEvent, SignalingEventKind, SignalingIntent};
use crate::session::{CallDirection, CallSession, CallState, EndReason, SessionId};

impl super::CallSessionStore {
    /// Apply one inbound signaling event. Never errors; stale events are
    /// logged no-ops.
    pub async fn ingest(self: &Arc<Self>, event: SignalingEvent) {
        match event.kind {
            SignalingEventKind::Incoming { .. } => self.ingest_incoming(event).await,
            _ => self.ingest_lifecycle(event).await,
        }
    }

    async fn ingest_incoming(self: &Arc<Self>, event: SignalingEvent) {
        let SignalingEventKind::Incoming {
            call_type,
            initiator,
            participants,
            metadata,
        } = event.kind
        else {
            return;
        };
        let session_id = event.session_id;

        // A session that already ran to completion must never re-ring.
        if self.history.contains_key(&session_id) {
            self.record_stale(&session_id, "incoming for completed session").await;
            return;
        }

        enum Outcome {
            Created(CallSession),
            Busy(SessionId),
            Stale(&'static str),
            Conflict(CallSession, CallState),
        }

        let outcome = {
            let mut inner = self.inner.lock().await;
            match &inner.session {
                Some(current) if current.state.is_in_progress() => {
                    if current.id == session_id {
                        if current.initiator != initiator {
                            // Same id, different caller: identity mismatch is
                            // an unrecoverable signaling error.
                            match self.apply_transition(
                                &mut inner,
                                CallState::Failed,
                                Some(EndReason::Error),
                            ) {
                                Some((session, previous)) => Outcome::Conflict(session, previous),
                                None => Outcome::Stale("conflicting re-offer"),
                            }
                        } else {
                            Outcome::Stale("duplicate incoming for current session")
                        }
                    } else {
                        match self.config.glare_policy {
                            // The current session is untouched; the new
                            // offer is declined over the channel.
                            GlarePolicy::RejectBusy => Outcome::Busy(session_id.clone()),
                        }
                    }
                }
                _ => {
                    let session = CallSession {
                        id: session_id.clone(),
                        direction: CallDirection::Incoming,
                        call_type,
                        participants,
                        initiator,
                        state: CallState::Ringing,
                        created_at: Utc::now(),
                        answered_at: None,
                        ended_at: None,
                        end_reason: None,
                        metadata,
                    };
                    inner.session = Some(session.clone());
                    inner.answering = false;
                    inner.declining = false;
                    self.arm_ring_timer(&mut inner, session_id.clone());
                    Outcome::Created(session)
                }
            }
        };

        match outcome {
            Outcome::Created(session) => self.notify_created(&session).await,
            Outcome::Busy(busy_id) => {
                warn!(session_id = %busy_id, "second incoming call while busy, declining");
                let sent = self
                    .channel
                    .send(SignalingIntent::Decline { session_id: busy_id.clone() })
                    .await;
                if let Err(e) = sent {
                    warn!(session_id = %busy_id, error = %e, "busy decline failed");
                }
            }
            Outcome::Stale(detail) => self.record_stale(&session_id, detail).await,
            Outcome::Conflict(session, previous) => {
                self.notify_transition(&session, previous, Some("identity mismatch".to_string()))
                    .await;
            }
        }
    }

    async fn ingest_lifecycle(&self, event: SignalingEvent) {
        let session_id = event.session_id;
        let settled = {
            let mut inner = self.inner.lock().await;
            let Some(session) = inner.session.as_ref() else {
                drop(inner);
                self.record_stale(&session_id, "no current session").await;
                return;
            };
            if session.id != session_id {
                drop(inner);
                self.record_stale(&session_id, "id does not match current session").await;
                return;
            }
            if session.state.is_terminal() {
                drop(inner);
                self.record_stale(&session_id, "current session already terminal").await;
                return;
            }

            let Some((target, end_reason, reason)) =
                lifecycle_transition(&event.kind, &session.state, session.direction)
            else {
                let detail = "event not applicable in current state";
                drop(inner);
                self.record_stale(&session_id, detail).await;
                return;
            };
            self.apply_transition(&mut inner, target, end_reason)
                .map(|t| (t, reason))
        };

        if let Some(((session, previous), reason)) = settled {
            self.notify_transition(&session, previous, Some(reason.to_string())).await;
        }
    }

    /// Ring timeout expiry. The timer was armed on entering `Ringing`; the
    /// state is re-checked here so a firing that lost the cancellation race
    /// can never corrupt a session that already moved on.
    pub(crate) async fn on_ring_timeout(self: &Arc<Self>, session_id: &SessionId) {
        let settled = {
            let mut inner = self.inner.lock().await;
            let still_ringing = inner
                .session
                .as_ref()
                .map(|s| s.id == *session_id && s.state == CallState::Ringing)
                .unwrap_or(false);
            if !still_ringing {
                debug!(session_id = %session_id, "ring timeout fired for moved-on session, ignoring");
                None
            } else {
                // This code runs inside the timer's own task: release the
                // handle instead of letting apply_transition abort it, which
                // would kill this very task before the notify and the
                // outbound cancel run.
                if let Some(timer) = inner.ring_timer.take() {
                    timer.disarm();
                }
                let direction = inner.session.as_ref().map(|s| s.direction);
                match direction {
                    Some(CallDirection::Incoming) => self
                        .apply_transition(&mut inner, CallState::Missed, Some(EndReason::Timeout))
                        .map(|t| (t, false)),
                    Some(CallDirection::Outgoing) => self
                        .apply_transition(&mut inner, CallState::Canceled, Some(EndReason::Timeout))
                        .map(|t| (t, true)),
                    None => None,
                }
            }
        };

        if let Some(((session, previous), withdraw)) = settled {
            self.notify_transition(&session, previous, Some("ring timeout".to_string()))
                .await;
            if withdraw {
                // Tell the remote side we stopped waiting for an answer.
                let sent = self
                    .channel
                    .send(SignalingIntent::Cancel { session_id: session_id.clone() })
                    .await;
                if let Err(e) = sent {
                    warn!(session_id = %session_id, error = %e, "timeout cancel failed");
                }
            }
        }
    }

    /// Post-reconnect reconciliation: a local non-terminal session the
    /// backend no longer knows is force-terminated so nothing is left
    /// ringing forever.
    pub async fn reconcile_after_reconnect(&self, backend_sessions: &[SessionId]) {
        let settled = {
            let mut inner = self.inner.lock().await;
            let stranded = inner
                .session
                .as_ref()
                .filter(|s| s.state.is_in_progress() && !backend_sessions.contains(&s.id))
                .map(|s| s.state.clone());
            match stranded {
                Some(CallState::Active) => self.apply_transition(
                    &mut inner,
                    CallState::Ended,
                    Some(EndReason::RemoteHangup),
                ),
                Some(_) => self.apply_transition(
                    &mut inner,
                    CallState::Canceled,
                    Some(EndReason::RemoteCanceled),
                ),
                None => None,
            }
        };

        if let Some((session, previous)) = settled {
            self.notify_transition(
                &session,
                previous,
                Some("session not found after reconnect".to_string()),
            )
            .await;
        }
    }
}

/// Map an inbound lifecycle event against the current state.
///
/// Returns `None` when the combination is not applicable, which the caller
/// records as a stale discard.
fn lifecycle_transition(
    kind: &SignalingEventKind,
    state: &CallState,
    direction: CallDirection,
) -> Option<(CallState, Option<EndReason>, &'static str)> {
    use SignalingEventKind::*;
    match (kind, state) {
        // An incoming call only becomes active through the local answer
        // confirmation; `Answered` while it is still ringing here means
        // another device took it.
        (Answered, CallState::Ringing) if direction == CallDirection::Outgoing => {
            Some((CallState::Active, None, "remote answered"))
        }
        (Answered, CallState::Ringing) => Some((
            CallState::Canceled,
            Some(EndReason::RemoteCanceled),
            "answered on another device",
        )),
        (Answered, CallState::Answering) => {
            Some((CallState::Active, None, "remote answered"))
        }
        (AnsweredElsewhere, CallState::Ringing) | (AnsweredElsewhere, CallState::Answering) => {
            Some((
                CallState::Canceled,
                Some(EndReason::RemoteCanceled),
                "answered on another device",
            ))
        }
        (Declined, CallState::Ringing) | (Declined, CallState::Answering) => Some((
            CallState::Declined,
            Some(EndReason::RemoteDeclined),
            "remote declined",
        )),
        (DeclinedElsewhere, CallState::Ringing) | (DeclinedElsewhere, CallState::Answering) => {
            Some((
                CallState::Declined,
                Some(EndReason::RemoteDeclined),
                "declined on another device",
            ))
        }
        (Canceled, CallState::Ringing) | (Canceled, CallState::Answering) => Some((
            CallState::Canceled,
            Some(EndReason::RemoteCanceled),
            "caller canceled",
        )),
        (Ended, CallState::Active) => Some((
            CallState::Ended,
            Some(EndReason::RemoteHangup),
            "remote hangup",
        )),
        // A terminal report for a call that never connected locally is
        // reconciliation, not a hangup.
        (Ended, CallState::Ringing) | (Ended, CallState::Answering) => Some((
            CallState::Canceled,
            Some(EndReason::RemoteCanceled),
            "session ended before connect",
        )),
        _ => None,
    }
}
