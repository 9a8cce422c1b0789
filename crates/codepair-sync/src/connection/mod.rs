//! Connection lifecycle for one session channel.
//!
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected
//! Connecting|Connected --lost--> Reconnecting --timer--> Connecting
//! Reconnecting (attempts exhausted) --> Failed
//! any --disconnect--> Closing --> Disconnected
//! ```
//!
//! Each connect attempt gets a generation number. Events from a driver and
//! backoff timers carry the generation they were started under, and are
//! ignored once a newer attempt or a `disconnect` has superseded it.


use std::sync::{Arc, Mutex};
use std::time::Duration;

use codepair_config::SyncConfig;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::Envelope;
use crate::router::{Listeners, Subscription};
use crate::transport::{Transport, TransportEvent};
use crate::util::lock;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    Closing,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
            ConnectionState::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exponential reconnect schedule: `base`, `2*base`, ... capped at `max`,
/// for at most `max_attempts` retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl From<&SyncConfig> for BackoffPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl BackoffPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

struct Inner {
    state: ConnectionState,
    session_id: Option<String>,
    attempts: u32,
    delay: Duration,
    intentional_close: bool,
    generation: u64,
    retry_timer: Option<JoinHandle<()>>,
}

impl Inner {
    /// Returns the new state if it differs from the old one.
    fn set_state(&mut self, state: ConnectionState) -> Option<ConnectionState> {
        if self.state == state {
            return None;
        }
        debug!(from = %self.state, to = %state, "Connection state change");
        self.state = state;
        Some(state)
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    policy: BackoffPolicy,
    inner: Mutex<Inner>,
    state_listeners: Listeners<ConnectionState>,
    message_listeners: Listeners<Envelope>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns one transport and keeps it connected to a session, retrying with
/// backoff when the channel drops unexpectedly.
///
/// Listener callbacks always run with no internal lock held, so they may
/// call back into the manager.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, policy: BackoffPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                policy,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    session_id: None,
                    attempts: 0,
                    delay: policy.base_delay,
                    intentional_close: false,
                    generation: 0,
                    retry_timer: None,
                }),
                state_listeners: Listeners::new(),
                message_listeners: Listeners::new(),
            }),
        }
    }

    /// Start connecting to `session_id`. A no-op if already connected or
    /// connecting to the same session.
    pub fn connect(&self, session_id: &str) {
        self.shared.connect(session_id);
    }

    /// Close the channel on purpose. No reconnect follows.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Hand `envelope` to the transport. Returns `false` without sending
    /// unless the channel is connected.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let state = self.state();
        if state != ConnectionState::Connected {
            warn!(state = %state, kind = %envelope.message_type(), "Cannot send message: not connected");
            return false;
        }
        self.shared.transport.send(envelope)
    }

    pub fn on_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.shared.state_listeners.subscribe(callback)
    }

    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.shared.message_listeners.subscribe(callback)
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.shared.inner).state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Retries made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.shared.inner).attempts
    }

    /// Delay the next retry will wait.
    pub fn current_delay(&self) -> Duration {
        lock(&self.shared.inner).delay
    }

    pub fn session_id(&self) -> Option<String> {
        lock(&self.shared.inner).session_id.clone()
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.shared.policy
    }

    pub fn is_supported(&self) -> bool {
        self.shared.transport.is_supported()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut inner = lock(&self.shared.inner);
        inner.intentional_close = true;
        inner.generation += 1;
        inner.cancel_retry();
        let live = inner.state != ConnectionState::Disconnected;
        drop(inner);
        if live {
            self.shared.transport.close();
        }
    }
}

impl Shared {
    fn notify_state(&self, changed: Option<ConnectionState>) {
        if let Some(state) = changed {
            self.state_listeners.notify(&state);
        }
    }

    fn connect(self: &Arc<Self>, session_id: &str) {
        let mut inner = lock(&self.inner);
        let same_session = inner.session_id.as_deref() == Some(session_id);
        if same_session
            && matches!(
                inner.state,
                ConnectionState::Connected | ConnectionState::Connecting
            )
        {
            debug!(session_id, state = %inner.state, "Already connected or connecting");
            return;
        }

        let switching = !same_session && inner.session_id.is_some();
        inner.cancel_retry();
        inner.intentional_close = false;
        inner.session_id = Some(session_id.to_string());
        inner.attempts = 0;
        inner.delay = self.policy.base_delay;
        inner.generation += 1;
        let generation = inner.generation;
        let changed = inner.set_state(ConnectionState::Connecting);
        drop(inner);

        if switching {
            self.transport.close();
        }
        info!(session_id, transport = self.transport.name(), "Connecting");
        self.notify_state(changed);
        self.open_transport(session_id, generation);
    }

    fn open_transport(self: &Arc<Self>, session_id: &str, generation: u64) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.transport.connect(session_id, tx);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !shared.handle_event(generation, event) {
                    break;
                }
            }
        });
    }

    /// Apply one driver event. Returns `false` once the attempt is over.
    fn handle_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            return false;
        }

        match event {
            TransportEvent::Opened => {
                if inner.state != ConnectionState::Connecting {
                    return true;
                }
                inner.attempts = 0;
                inner.delay = self.policy.base_delay;
                let changed = inner.set_state(ConnectionState::Connected);
                let session_id = inner.session_id.clone().unwrap_or_default();
                drop(inner);

                info!(session_id = %session_id, "Connected");
                self.notify_state(changed);
                true
            }
            TransportEvent::Message(envelope) => {
                let connected = inner.state == ConnectionState::Connected;
                drop(inner);

                if connected {
                    self.message_listeners.notify(&envelope);
                } else {
                    debug!(kind = %envelope.message_type(), "Dropping message received while not connected");
                }
                true
            }
            TransportEvent::Error(reason) => {
                warn!(reason = %reason, "Transport error");
                true
            }
            TransportEvent::Closed { reason } => {
                if inner.intentional_close
                    || !matches!(
                        inner.state,
                        ConnectionState::Connected | ConnectionState::Connecting
                    )
                {
                    return false;
                }
                info!(reason = %reason, "Connection lost");
                let changed = self.schedule_retry(&mut inner);
                drop(inner);

                self.notify_state(changed);
                false
            }
        }
    }

    /// Decide what follows an unexpected close. Called with the lock held.
    fn schedule_retry(self: &Arc<Self>, inner: &mut Inner) -> Option<ConnectionState> {
        if inner.attempts >= self.policy.max_attempts {
            error!(attempts = inner.attempts, "Max reconnection attempts reached");
            return inner.set_state(ConnectionState::Failed);
        }

        let delay = inner.delay;
        inner.delay = self.policy.next_delay(delay);
        let generation = inner.generation;
        info!(
            delay_ms = delay.as_millis() as u64,
            attempt = inner.attempts + 1,
            max = self.policy.max_attempts,
            "Scheduling reconnect"
        );

        let shared = Arc::clone(self);
        inner.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.retry(generation);
        }));
        inner.set_state(ConnectionState::Reconnecting)
    }

    fn retry(self: &Arc<Self>, generation: u64) {
        let mut inner = lock(&self.inner);
        if inner.generation != generation || inner.state != ConnectionState::Reconnecting {
            return;
        }
        let Some(session_id) = inner.session_id.clone() else {
            return;
        };
        inner.retry_timer = None;
        inner.attempts += 1;
        inner.generation += 1;
        let generation = inner.generation;
        let attempt = inner.attempts;
        let changed = inner.set_state(ConnectionState::Connecting);
        drop(inner);

        info!(session_id = %session_id, attempt, "Reconnecting");
        self.notify_state(changed);
        self.open_transport(&session_id, generation);
    }

    fn disconnect(&self) {
        let mut inner = lock(&self.inner);
        inner.intentional_close = true;
        inner.generation += 1;
        inner.cancel_retry();
        if inner.state == ConnectionState::Disconnected {
            return;
        }
        let closing = inner.set_state(ConnectionState::Closing);
        drop(inner);

        self.notify_state(closing);
        self.transport.close();

        let mut inner = lock(&self.inner);
        let session_id = inner.session_id.take();
        inner.attempts = 0;
        inner.delay = self.policy.base_delay;
        let closed = inner.set_state(ConnectionState::Disconnected);
        drop(inner);

        info!(session_id = ?session_id, "Disconnected");
        self.notify_state(closed);
    }
}
