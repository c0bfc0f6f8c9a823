//! Call session store: the single authority for call state
//!
//! All reads of "is there a call" go through this component, and all
//! transitions are applied by it. One async mutex guards the session slot
//! and the in-flight action flags, so actions and inbound ingestion form a
//! single serialized stream and no two transitions interleave.
//!
//! The store is shared behind `Arc`; constructors return one directly.

pub mod actions;
pub mod ingest;


use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::channel::SignalingChannel;
use crate::config::CallConfig;
use crate::events::{
    CallEvent, CallEventHandler, CallStatusInfo, EventPriority, IncomingCallInfo,
};
use crate::media::MediaSession;
use crate::session::{CallSession, CallState, CallStats, EndReason, SessionId};
use crate::timer::Deadline;

/// Capacity of the broadcast queue feeding subscribers
const EVENT_QUEUE_CAPACITY: usize = 128;

pub(crate) struct StoreInner {
    /// The single session slot; a terminal session stays visible here until
    /// superseded by a new one
    pub(crate) session: Option<CallSession>,
    /// Cancelable ring timeout, armed while the session is `Ringing`
    pub(crate) ring_timer: Option<Deadline>,
    /// True from `answer()` entry until its channel exchange settles
    pub(crate) answering: bool,
    /// True from `decline()` entry until its intent dispatch settles
    pub(crate) declining: bool,
}

/// Owner of the single current `CallSession` and its state machine
pub struct CallSessionStore {
    pub(crate) config: CallConfig,
    pub(crate) channel: Arc<dyn SignalingChannel>,
    pub(crate) inner: Mutex<StoreInner>,
    /// Terminal sessions, kept for history queries
    history: DashMap<SessionId, CallSession>,
    event_tx: broadcast::Sender<CallEvent>,
    handler: RwLock<Option<Arc<dyn CallEventHandler>>>,
    media: RwLock<Option<Arc<dyn MediaSession>>>,
    stats: Mutex<CallStats>,
}

impl CallSessionStore {
    pub fn new(channel: Arc<dyn SignalingChannel>, config: CallConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_QUEUE_CAPACITY);
        Arc::new(Self {
            config,
            channel,
            inner: Mutex::new(StoreInner {
                session: None,
                ring_timer: None,
                answering: false,
                declining: false,
            }),
            history: DashMap::new(),
            event_tx,
            handler: RwLock::new(None),
            media: RwLock::new(None),
            stats: Mutex::new(CallStats::default()),
        })
    }

    /// Subscribe to call events (navigation bridge, presentation screens)
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    /// Install a push-style event handler
    pub async fn set_event_handler(&self, handler: Arc<dyn CallEventHandler>) {
        *self.handler.write().await = Some(handler);
    }

    /// Install the media start/stop capability
    pub async fn set_media_session(&self, media: Arc<dyn MediaSession>) {
        *self.media.write().await = Some(media);
    }

    /// Snapshot of the current session, terminal or not
    pub async fn current_session(&self) -> Option<CallSession> {
        self.inner.lock().await.session.clone()
    }

    /// True while a local answer is awaiting channel confirmation
    pub async fn is_answering_call(&self) -> bool {
        self.inner.lock().await.answering
    }

    /// True while a local decline intent is being dispatched
    pub async fn is_declining_call(&self) -> bool {
        self.inner.lock().await.declining
    }

    /// Activity counters since creation
    pub async fn stats(&self) -> CallStats {
        self.stats.lock().await.clone()
    }

    /// Terminal sessions seen so far, most recent last
    pub fn call_history(&self) -> Vec<CallSession> {
        let mut sessions: Vec<CallSession> =
            self.history.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    // ===== internal transition machinery =====

    /// Apply a state transition to the current session.
    ///
    /// Must be called with the inner lock held. Returns the post-transition
    /// snapshot and the previous state, or `None` when the session is
    /// already terminal (the caller treats that as a stale outcome).
    pub(crate) fn apply_transition(
        &self,
        inner: &mut StoreInner,
        new_state: CallState,
        end_reason: Option<EndReason>,
    ) -> Option<(CallSession, CallState)> {
        let session = inner.session.as_mut()?;
        let previous = session.state.clone();
        if previous.is_terminal() {
            return None;
        }

        session.state = new_state.clone();
        match &new_state {
            CallState::Active => {
                if session.answered_at.is_none() {
                    session.answered_at = Some(Utc::now());
                }
            }
            s if s.is_terminal() => {
                session.ended_at = Some(Utc::now());
                session.end_reason = end_reason;
            }
            _ => {}
        }

        // Leaving `Ringing` disarms the ring timeout; cancellation is
        // explicit so a late firing can never touch the session.
        if previous == CallState::Ringing {
            if let Some(timer) = inner.ring_timer.take() {
                timer.cancel();
            }
        }

        let snapshot = session.clone();
        if snapshot.state.is_terminal() {
            self.history.insert(snapshot.id.clone(), snapshot.clone());
        }
        debug!(
            session_id = %snapshot.id,
            from = %previous,
            to = %snapshot.state,
            "call state transition"
        );
        Some((snapshot, previous))
    }

    /// Publish a transition: stats, media side effects, broadcast, handler.
    ///
    /// Runs without the inner lock; the snapshot is already consistent.
    pub(crate) async fn notify_transition(
        &self,
        session: &CallSession,
        previous: CallState,
        reason: Option<String>,
    ) {
        {
            let mut stats = self.stats.lock().await;
            match session.state {
                CallState::Active => stats.answered_calls += 1,
                CallState::Missed => stats.missed_calls += 1,
                CallState::Declined => stats.declined_calls += 1,
                _ => {}
            }
        }

        if session.state.is_active() {
            if let Some(media) = self.media.read().await.as_ref() {
                if let Err(e) = media.start(session).await {
                    warn!(session_id = %session.id, error = %e, "media start failed");
                }
            }
        } else if previous.is_active() && session.state.is_terminal() {
            if let Some(media) = self.media.read().await.as_ref() {
                media.stop(session).await;
            }
        }

        let info = CallStatusInfo {
            session_id: session.id.clone(),
            direction: session.direction,
            new_state: session.state.clone(),
            previous_state: Some(previous),
            end_reason: session.end_reason,
            reason: reason.clone(),
            timestamp: Utc::now(),
        };
        let priority = if session.state == CallState::Failed {
            EventPriority::Critical
        } else if session.state.is_active() {
            EventPriority::High
        } else {
            EventPriority::Normal
        };
        let _ = self.event_tx.send(CallEvent::CallStateChanged {
            info: info.clone(),
            priority,
        });
        if let Some(handler) = self.handler.read().await.as_ref() {
            handler.on_call_state_changed(info).await;
        }

        info!(
            session_id = %session.id,
            state = %session.state,
            reason = ?reason,
            "call session updated"
        );
    }

    /// Publish the creation of a new ringing session.
    pub(crate) async fn notify_created(&self, session: &CallSession) {
        {
            let mut stats = self.stats.lock().await;
            stats.total_calls += 1;
        }

        let status = CallStatusInfo {
            session_id: session.id.clone(),
            direction: session.direction,
            new_state: session.state.clone(),
            previous_state: None,
            end_reason: None,
            reason: None,
            timestamp: Utc::now(),
        };

        match session.direction {
            crate::session::CallDirection::Incoming => {
                let info = IncomingCallInfo {
                    session_id: session.id.clone(),
                    caller: session.initiator.clone(),
                    call_type: session.call_type,
                    caller_display_name: session.metadata.get("display-name").cloned(),
                    created_at: session.created_at,
                };
                let _ = self.event_tx.send(CallEvent::IncomingCall {
                    info: info.clone(),
                    priority: EventPriority::High,
                });
                if let Some(handler) = self.handler.read().await.as_ref() {
                    handler.on_incoming_call(info).await;
                }
                info!(
                    session_id = %session.id,
                    caller = %session.initiator,
                    call_type = ?session.call_type,
                    "incoming call ringing"
                );
            }
            crate::session::CallDirection::Outgoing => {
                let _ = self.event_tx.send(CallEvent::CallStateChanged {
                    info: status,
                    priority: EventPriority::High,
                });
                info!(
                    session_id = %session.id,
                    callee = ?session.remote_party(),
                    "outgoing call ringing"
                );
            }
        }
    }

    /// Arm the ring timeout for the given session.
    ///
    /// The timer holds a weak reference so it cannot keep the store alive;
    /// the firing path re-checks the session state before acting.
    pub(crate) fn arm_ring_timer(self: &Arc<Self>, inner: &mut StoreInner, session_id: SessionId) {
        let weak = Arc::downgrade(self);
        let delay = self.config.ring_timeout;
        inner.ring_timer = Some(Deadline::schedule(delay, move || async move {
            if let Some(store) = weak.upgrade() {
                store.on_ring_timeout(&session_id).await;
            }
        }));
    }

    /// Count and log a dropped stale event. Never an error.
    pub(crate) async fn record_stale(&self, session_id: &SessionId, detail: &str) {
        let mut stats = self.stats.lock().await;
        stats.stale_events_discarded += 1;
        debug!(session_id = %session_id, detail, "stale signaling event discarded");
    }
}
