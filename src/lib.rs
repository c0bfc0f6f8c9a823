//! # Ringline Call Core
//!
//! Transport-agnostic call-session signaling and lifecycle management.
//! This library owns exactly one thing: the state of the current call. It
//! accepts user actions (answer, decline, hang up, place, cancel), ingests
//! lifecycle events from an abstract signaling channel, and publishes
//! state changes to subscribers such as a navigation bridge.
//!
//! ## Architecture
//!
//! ```text
//! user actions ──► CallSessionStore ◄── ChannelDriver ◄── SignalingChannel
//!                        │
//!                        ▼ broadcast
//!           NavigationBridge / CallEventHandler
//! ```
//!
//! - [`CallSessionStore`] is the single authority for call state. Every
//!   transition, whether user-initiated or network-driven, is serialized
//!   through one lock, so races resolve deterministically.
//! - [`SignalingChannel`] abstracts the transport. The [`ChannelDriver`]
//!   pumps its inbound traffic into the store and reconnects with backoff.
//! - [`NavigationBridge`] turns state changes into screen transitions for
//!   whatever presentation layer the host application has.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ringline_call_core::{CallConfig, CallSessionStore, SignalingChannel};
//!
//! # async fn example(channel: Arc<dyn SignalingChannel>) -> Result<(), Box<dyn std::error::Error>> {
//! let store = CallSessionStore::new(channel, CallConfig::default());
//! let mut events = store.subscribe();
//!
//! // ... feed inbound events through a ChannelDriver, then:
//! if let Some(session) = store.current_session().await {
//!     store.answer(&session.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod navigation;
pub mod presence;
pub mod recovery;
pub mod session;
pub mod store;
pub mod timer;

pub use channel::{ChannelDriver, ChannelMessage, ChannelStatus, SignalingChannel};
pub use config::{CallConfig, GlarePolicy};
pub use error::{CallError, CallResult};
pub use events::{
    CallEvent, CallEventHandler, CallStatusInfo, EventPriority, IncomingCallInfo, SignalingEvent,
    SignalingEventKind, SignalingIntent,
};
pub use media::MediaSession;
pub use navigation::{NavigationBridge, Navigator};
pub use presence::{PresenceSource, TypingActivity, TypingPoller};
pub use recovery::{retry_with_backoff, with_timeout, RetryConfig};
pub use session::{
    CallDirection, CallSession, CallState, CallStats, CallType, EndReason, SessionId,
};
pub use store::CallSessionStore;
pub use timer::{Deadline, Repeating};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
