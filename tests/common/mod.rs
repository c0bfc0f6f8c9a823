//! Shared test doubles for the integration suite

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use ringline_call_core::{
    CallConfig, CallError, CallResult, CallSession, CallSessionStore, CallStatusInfo,
    ChannelDriver, ChannelMessage, IncomingCallInfo, MediaSession, Navigator, RetryConfig,
    SessionId, SignalingChannel, SignalingIntent,
};

/// Scriptable signaling transport.
///
/// Records every intent it accepts. Sends can be failed wholesale, delayed
/// (to widen race windows), or failed per intent name.
pub struct MockChannel {
    sent: Mutex<Vec<SignalingIntent>>,
    fail_all: AtomicBool,
    fail_intents: Mutex<Vec<&'static str>>,
    send_delay: Mutex<Option<Duration>>,
    connect_failures_left: Mutex<u32>,
    live_sessions: Mutex<Vec<SessionId>>,
}

impl MockChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            fail_intents: Mutex::new(Vec::new()),
            send_delay: Mutex::new(None),
            connect_failures_left: Mutex::new(0),
            live_sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn sent_intents(&self) -> Vec<SignalingIntent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_names(&self) -> Vec<&'static str> {
        self.sent_intents().iter().map(|i| i.name()).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    pub fn fail_intent(&self, name: &'static str) {
        self.fail_intents.lock().unwrap().push(name);
    }

    /// Every subsequent send waits this long before acknowledging
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    /// The next `n` connect attempts fail before one succeeds
    pub fn fail_connects(&self, n: u32) {
        *self.connect_failures_left.lock().unwrap() = n;
    }

    pub fn set_live_sessions(&self, sessions: Vec<SessionId>) {
        *self.live_sessions.lock().unwrap() = sessions;
    }
}

#[async_trait]
impl SignalingChannel for MockChannel {
    async fn send(&self, intent: SignalingIntent) -> CallResult<()> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all.load(Ordering::SeqCst)
            || self.fail_intents.lock().unwrap().contains(&intent.name())
        {
            return Err(CallError::rejected("scripted failure"));
        }
        self.sent.lock().unwrap().push(intent);
        Ok(())
    }

    async fn connect(&self) -> CallResult<()> {
        let mut left = self.connect_failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(CallError::unavailable("scripted connect failure"));
        }
        Ok(())
    }

    async fn active_sessions(&self) -> CallResult<Vec<SessionId>> {
        Ok(self.live_sessions.lock().unwrap().clone())
    }
}

/// Navigator that logs each presentation call as a compact string
#[derive(Default)]
pub struct RecordingNavigator {
    log: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<String> {
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

/// Media capability that counts starts and stops per session
#[derive(Default)]
pub struct CountingMedia {
    started: Mutex<HashMap<String, u32>>,
    stopped: Mutex<HashMap<String, u32>>,
}

impl CountingMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn starts(&self, session_id: &str) -> u32 {
        self.started.lock().unwrap().get(session_id).copied().unwrap_or(0)
    }

    pub fn stops(&self, session_id: &str) -> u32 {
        self.stopped.lock().unwrap().get(session_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MediaSession for CountingMedia {
    async fn start(&self, session: &CallSession) -> CallResult<()> {
        *self
            .started
            .lock()
            .unwrap()
            .entry(session.id.as_str().to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn stop(&self, session: &CallSession) {
        *self
            .stopped
            .lock()
            .unwrap()
            .entry(session.id.as_str().to_string())
            .or_insert(0) += 1;
    }
}

/// Store plus a running channel driver fed by the returned sender
pub fn driven_store(
    channel: Arc<MockChannel>,
    config: CallConfig,
) -> (Arc<CallSessionStore>, mpsc::Sender<ChannelMessage>) {
    let (tx, rx) = mpsc::channel(32);
    let store = CallSessionStore::new(channel.clone(), config);
    ChannelDriver::new(store.clone(), channel, rx).spawn();
    (store, tx)
}

/// Enable log output for a test run (`RUST_LOG=debug cargo test`)
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short timeouts so tests never wait on production durations
pub fn fast_config() -> CallConfig {
    CallConfig::default()
        .with_ring_timeout(Duration::from_millis(200))
        .with_send_timeout(Duration::from_millis(200))
        .with_reconnect_retry(RetryConfig::quick())
}
