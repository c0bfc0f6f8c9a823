//! Signaling channel contract and inbound event driver
//!
//! The core depends on an abstract duplex notification source: whatever
//! transport exists (push notification, websocket, polling) implements
//! `SignalingChannel` for the outbound side and feeds inbound traffic into
//! the driver's mpsc queue. The driver pumps events into the store and
//! supervises reconnection with backoff.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::CallResult;
use crate::events::{SignalingEvent, SignalingIntent};
use crate::recovery::{retry_with_backoff, RetryConfig};
use crate::session::SessionId;
use crate::store::CallSessionStore;

/// Transport connectivity notifications
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStatus {
    Connected,
    Disconnected { reason: Option<String> },
}

/// What the transport delivers to the driver's queue
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    Event(SignalingEvent),
    Status(ChannelStatus),
}

/// Abstract duplex signaling transport.
///
/// `send` must report acceptance or rejection by the backend; the store
/// guarantees at most one send per logical action via its idempotency
/// guards, so implementations need not deduplicate.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Deliver an outbound intent and await the backend's verdict
    async fn send(&self, intent: SignalingIntent) -> CallResult<()>;

    /// (Re-)establish the transport connection
    async fn connect(&self) -> CallResult<()>;

    /// Session ids the backend still considers live, used to reconcile
    /// local state after a reconnect
    async fn active_sessions(&self) -> CallResult<Vec<SessionId>>;
}

/// Pumps inbound channel traffic into the store.
///
/// On disconnect it reconnects with backoff, then reconciles: any local
/// non-terminal session the backend no longer knows is force-terminated so
/// no call is left ringing forever.
pub struct ChannelDriver {
    store: Arc<CallSessionStore>,
    channel: Arc<dyn SignalingChannel>,
    inbound: mpsc::Receiver<ChannelMessage>,
    retry: RetryConfig,
}

impl ChannelDriver {
    /// Reconnection backoff comes from the store's `CallConfig`.
    pub fn new(
        store: Arc<CallSessionStore>,
        channel: Arc<dyn SignalingChannel>,
        inbound: mpsc::Receiver<ChannelMessage>,
    ) -> Self {
        let retry = store.config.reconnect_retry.clone();
        Self { store, channel, inbound, retry }
    }

    /// Run the pump on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consume inbound messages until the sender side closes
    pub async fn run(mut self) {
        while let Some(message) = self.inbound.recv().await {
            match message {
                ChannelMessage::Event(event) => {
                    self.store.ingest(event).await;
                }
                ChannelMessage::Status(ChannelStatus::Connected) => {
                    debug!("signaling channel connected");
                }
                ChannelMessage::Status(ChannelStatus::Disconnected { reason }) => {
                    warn!(reason = ?reason, "signaling channel disconnected");
                    self.reconnect_and_reconcile().await;
                }
            }
        }
        debug!("channel driver inbound queue closed, stopping");
    }

    async fn reconnect_and_reconcile(&self) {
        let channel = Arc::clone(&self.channel);
        let reconnected = retry_with_backoff("signaling_reconnect", self.retry.clone(), || {
            let channel = Arc::clone(&channel);
            async move { channel.connect().await }
        })
        .await;

        if let Err(e) = reconnected {
            error!(error = %e, "giving up on signaling reconnect");
            return;
        }
        info!("signaling channel reconnected");

        match self.channel.active_sessions().await {
            Ok(known) => self.store.reconcile_after_reconnect(&known).await,
            Err(e) => warn!(error = %e, "could not fetch live sessions for reconciliation"),
        }
    }
}
