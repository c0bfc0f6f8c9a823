//! Consumed media capability
//!
//! The signaling core starts media only after a call reaches `Active` and
//! stops it on leaving that state. It never inspects media internals;
//! capture, peer connection setup, and teardown belong to the implementor.

use async_trait::async_trait;

use crate::error::CallResult;
use crate::session::CallSession;

/// Start/stop hooks invoked by the store on entering and leaving `Active`
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Called once when the session becomes `Active`
    async fn start(&self, session: &CallSession) -> CallResult<()>;

    /// Called once when an `Active` session reaches a terminal state
    async fn stop(&self, session: &CallSession);
}
