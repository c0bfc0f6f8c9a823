//! Navigation bridge: call events to presentation transitions
//!
//! The store knows nothing about screens; this bridge subscribes to its
//! broadcast feed and translates state changes into navigator calls. It
//! tracks which call screen is currently shown so duplicate events (or a
//! re-delivered transition) never stack a second screen.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{CallEvent, CallStatusInfo, IncomingCallInfo};
use crate::session::{CallDirection, CallState, SessionId};

/// Presentation surface the host application implements.
///
/// Implementations are expected to be idempotent at the UI layer too, but
/// the bridge already filters duplicates so each method fires at most once
/// per screen change.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Show the incoming-call (ringing) screen
    async fn present_incoming(&self, info: IncomingCallInfo);

    /// Show or replace with the in-call screen
    async fn present_call(&self, info: CallStatusInfo);

    /// Dismiss whatever call screen is showing
    async fn dismiss_call(&self, info: CallStatusInfo);
}

/// Which call screen the bridge believes is on top
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallScreen {
    None,
    Incoming(SessionId),
    /// Call screen for an outgoing call still waiting to connect
    Outgoing(SessionId),
    InCall(SessionId),
}

impl CallScreen {
    fn is_for(&self, session_id: &SessionId) -> bool {
        match self {
            CallScreen::None => false,
            CallScreen::Incoming(id) | CallScreen::Outgoing(id) | CallScreen::InCall(id) => {
                id == session_id
            }
        }
    }
}

/// Drives a `Navigator` from the store's event feed
pub struct NavigationBridge {
    navigator: Arc<dyn Navigator>,
    events: broadcast::Receiver<CallEvent>,
    shown: CallScreen,
}

impl NavigationBridge {
    pub fn new(navigator: Arc<dyn Navigator>, events: broadcast::Receiver<CallEvent>) -> Self {
        Self { navigator, events, shown: CallScreen::None }
    }

    /// Run the bridge on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume events until the store side closes
    pub async fn run(mut self) {
        loop {
            match self.events.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Dropped events only matter if the final state differs;
                    // the next received event re-synchronizes the screen.
                    warn!(skipped, "navigation bridge lagged behind call events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("navigation bridge event feed closed, stopping");
    }

    async fn handle(&mut self, event: CallEvent) {
        match event {
            CallEvent::IncomingCall { info, .. } => {
                if self.shown == CallScreen::Incoming(info.session_id.clone()) {
                    debug!(session_id = %info.session_id, "incoming screen already shown");
                    return;
                }
                self.shown = CallScreen::Incoming(info.session_id.clone());
                self.navigator.present_incoming(info).await;
            }
            CallEvent::CallStateChanged { info, .. } => {
                if info.new_state.is_active() {
                    if self.shown == CallScreen::InCall(info.session_id.clone()) {
                        return;
                    }
                    self.shown = CallScreen::InCall(info.session_id.clone());
                    self.navigator.present_call(info).await;
                } else if info.new_state == CallState::Ringing
                    && info.direction == CallDirection::Outgoing
                {
                    // An outgoing call shows its screen while dialing.
                    if self.shown == CallScreen::Outgoing(info.session_id.clone()) {
                        return;
                    }
                    self.shown = CallScreen::Outgoing(info.session_id.clone());
                    self.navigator.present_call(info).await;
                } else if info.new_state.is_terminal() {
                    if self.shown.is_for(&info.session_id) {
                        self.shown = CallScreen::None;
                        self.navigator.dismiss_call(info).await;
                    }
                }
                // Incoming ringing and Answering keep whatever is showing.
            }
            CallEvent::Error { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use crate::events::EventPriority;
    use crate::session::{CallDirection, CallState, CallType, EndReason};

    use super::*;

    #[derive(Default)]
    struct RecordingNavigator {
        log: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn present_incoming(&self, info: IncomingCallInfo) {
            self.log.lock().unwrap().push(format!("incoming:{}", info.session_id));
        }

        async fn present_call(&self, info: CallStatusInfo) {
            self.log.lock().unwrap().push(format!("in-call:{}", info.session_id));
        }

        async fn dismiss_call(&self, info: CallStatusInfo) {
            self.log.lock().unwrap().push(format!("dismiss:{}", info.session_id));
        }
    }

    fn incoming_event(id: &str) -> CallEvent {
        CallEvent::IncomingCall {
            info: IncomingCallInfo {
                session_id: SessionId::new(id),
                caller: "alice".to_string(),
                call_type: CallType::Voice,
                caller_display_name: None,
                created_at: Utc::now(),
            },
            priority: EventPriority::High,
        }
    }

    fn state_event(id: &str, state: CallState) -> CallEvent {
        directed_state_event(id, state, CallDirection::Incoming)
    }

    fn directed_state_event(id: &str, state: CallState, direction: CallDirection) -> CallEvent {
        CallEvent::CallStateChanged {
            info: CallStatusInfo {
                session_id: SessionId::new(id),
                direction,
                new_state: state,
                previous_state: Some(CallState::Ringing),
                end_reason: Some(EndReason::RemoteCanceled),
                reason: None,
                timestamp: Utc::now(),
            },
            priority: EventPriority::Normal,
        }
    }

    fn bridge_with(navigator: Arc<RecordingNavigator>) -> NavigationBridge {
        let (_tx, rx) = broadcast::channel(8);
        NavigationBridge::new(navigator, rx)
    }

    #[tokio::test]
    async fn incoming_then_active_then_ended() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge.handle(incoming_event("c1")).await;
        bridge.handle(state_event("c1", CallState::Active)).await;
        bridge.handle(state_event("c1", CallState::Ended)).await;

        assert_eq!(navigator.entries(), vec!["incoming:c1", "in-call:c1", "dismiss:c1"]);
    }

    #[tokio::test]
    async fn duplicate_events_do_not_stack_screens() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge.handle(incoming_event("c1")).await;
        bridge.handle(incoming_event("c1")).await;
        bridge.handle(state_event("c1", CallState::Active)).await;
        bridge.handle(state_event("c1", CallState::Active)).await;

        assert_eq!(navigator.entries(), vec!["incoming:c1", "in-call:c1"]);
    }

    #[tokio::test]
    async fn terminal_without_shown_screen_is_ignored() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge.handle(state_event("c9", CallState::Canceled)).await;

        assert!(navigator.entries().is_empty());
    }

    #[tokio::test]
    async fn outgoing_ringing_shows_call_screen_until_terminal() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge
            .handle(directed_state_event("c1", CallState::Ringing, CallDirection::Outgoing))
            .await;
        bridge
            .handle(directed_state_event("c1", CallState::Canceled, CallDirection::Outgoing))
            .await;

        assert_eq!(navigator.entries(), vec!["in-call:c1", "dismiss:c1"]);
    }

    #[tokio::test]
    async fn incoming_ringing_event_does_not_change_screens() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge.handle(state_event("c1", CallState::Ringing)).await;

        assert!(navigator.entries().is_empty());
    }

    #[tokio::test]
    async fn canceled_while_ringing_dismisses_incoming_screen() {
        let navigator = Arc::new(RecordingNavigator::default());
        let mut bridge = bridge_with(navigator.clone());

        bridge.handle(incoming_event("c1")).await;
        bridge.handle(state_event("c1", CallState::Canceled)).await;

        assert_eq!(navigator.entries(), vec!["incoming:c1", "dismiss:c1"]);
    }
}
