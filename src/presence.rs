//! Short-interval presence polling (typing indicators)
//!
//! Structurally this is the ring timeout's smaller sibling: an autonomous
//! timer tied to an owning handle, canceled rather than merely ignored, so
//! a superseded poll can never publish late.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::error::CallResult;
use crate::timer::Repeating;

/// One observed typing state for a peer
#[derive(Debug, Clone, PartialEq)]
pub struct TypingActivity {
    pub peer: String,
    pub is_typing: bool,
    pub observed_at: DateTime<Utc>,
}

/// Backend the poller asks for a peer's typing state
#[async_trait]
pub trait PresenceSource: Send + Sync {
    async fn typing_state(&self, peer: &str) -> CallResult<bool>;
}

/// Polls a peer's typing state at a fixed interval and publishes snapshots
/// on a watch channel. Dropping or stopping the poller cancels the timer.
pub struct TypingPoller {
    snapshots: watch::Receiver<Option<TypingActivity>>,
    timer: Repeating,
}

impl TypingPoller {
    pub fn start(
        peer: impl Into<String>,
        interval: Duration,
        source: Arc<dyn PresenceSource>,
    ) -> Self {
        let peer = peer.into();
        let (tx, rx) = watch::channel(None);
        let timer = Repeating::spawn(interval, move || {
            let source = Arc::clone(&source);
            let peer = peer.clone();
            let tx = tx.clone();
            async move {
                match source.typing_state(&peer).await {
                    Ok(is_typing) => {
                        let _ = tx.send(Some(TypingActivity {
                            peer,
                            is_typing,
                            observed_at: Utc::now(),
                        }));
                    }
                    Err(e) => {
                        // Presence is best-effort; a failed poll keeps the
                        // previous snapshot.
                        debug!(peer = %peer, error = %e, "typing poll failed");
                    }
                }
            }
        });
        Self { snapshots: rx, timer }
    }

    /// Get a receiver for published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Option<TypingActivity>> {
        self.snapshots.clone()
    }

    /// Stop polling; no snapshot is published after this returns
    pub fn stop(&self) {
        self.timer.cancel();
    }
}
