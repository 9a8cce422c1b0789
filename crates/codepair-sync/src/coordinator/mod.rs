//! Session-scoped collaboration facade.
//!
//! A [`Collaboration`] ties one [`ConnectionManager`] and the message
//! [`Router`] to a session. The UI calls the `broadcast_*` methods on local
//! edits and subscribes per message type for remote ones. Code edits are
//! debounced, and echoes of our own document edits are dropped before they
//! reach subscribers.

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codepair_common::{now_millis, Language, SyncError};
use codepair_config::{CodepairConfig, SyncConfig};
use tracing::{debug, info, warn};

use crate::connection::{BackoffPolicy, ConnectionManager, ConnectionState};
use crate::debounce::Debouncer;
use crate::protocol::{
    CodeChange, CursorPosition, Envelope, JoinedUser, LanguageChange, Message, MessageType,
    UserJoin, UserLeave,
};
use crate::router::{Listeners, Router, Subscription};
use crate::transport::{LocalHub, TransportFactory, TransportKind};
use crate::util::lock;

struct ActiveSession {
    session_id: String,
    manager: Arc<ConnectionManager>,
    inbound: Subscription,
    state_forward: Subscription,
    code_debouncer: Debouncer<String>,
}

/// Live-sync facade for one local participant.
///
/// Lifecycle is explicit: `init` binds a fresh transport and connection to
/// a session; `cleanup` tears them down. Re-initializing always cleans up
/// first. Anything scheduled under an earlier `init` is ignored once a
/// newer one has started.
pub struct Collaboration {
    local_user_id: String,
    factory: Arc<dyn TransportFactory>,
    policy: BackoffPolicy,
    debounce: Duration,
    router: Arc<Router<MessageType, Envelope>>,
    state_listeners: Arc<Listeners<ConnectionState>>,
    epoch: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSession>>,
}

impl Collaboration {
    pub fn new(
        local_user_id: impl Into<String>,
        factory: Arc<dyn TransportFactory>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            factory,
            policy: BackoffPolicy::from(config),
            debounce: Duration::from_millis(config.debounce_ms),
            router: Arc::new(Router::new()),
            state_listeners: Arc::new(Listeners::new()),
            epoch: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Networked collaboration against the relay named in `config`.
    pub fn websocket(local_user_id: impl Into<String>, config: &CodepairConfig) -> Self {
        let kind = TransportKind::WebSocket {
            base_url: config.server.ws_base_url.clone(),
        };
        Self::new(local_user_id, Arc::new(kind), &config.sync)
    }

    /// Same-process collaboration over a shared hub.
    pub fn local(local_user_id: impl Into<String>, hub: LocalHub, config: &SyncConfig) -> Self {
        Self::new(local_user_id, Arc::new(TransportKind::Local(hub)), config)
    }

    // -- lifecycle --------------------------------------------------------

    /// Bind to `session_id` and start connecting. Returns `false` if the
    /// transport cannot run here.
    pub fn init(&self, session_id: &str) -> bool {
        if lock(&self.active).is_some() {
            self.cleanup();
        }

        if !self.factory.is_supported() {
            let err = SyncError::TransportUnavailable("transport not supported".into());
            warn!(error = %err, session_id, "Cannot initialize collaboration");
            return false;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let manager = Arc::new(ConnectionManager::new(self.factory.create(), self.policy));

        let inbound = {
            let router = Arc::clone(&self.router);
            let current = Arc::clone(&self.epoch);
            manager.on_message(move |envelope| {
                if current.load(Ordering::SeqCst) == epoch {
                    router.dispatch(envelope.message_type(), envelope);
                }
            })
        };

        let state_forward = {
            let listeners = Arc::clone(&self.state_listeners);
            let current = Arc::clone(&self.epoch);
            manager.on_state_change(move |state| {
                if current.load(Ordering::SeqCst) == epoch {
                    listeners.notify(state);
                }
            })
        };

        let code_debouncer = {
            let sender = Arc::clone(&manager);
            let current = Arc::clone(&self.epoch);
            let user_id = self.local_user_id.clone();
            Debouncer::new(self.debounce, move |code: String| {
                if current.load(Ordering::SeqCst) != epoch {
                    return;
                }
                let envelope = stamp(
                    Message::CodeChange(CodeChange {
                        code,
                        user_id: user_id.clone(),
                    }),
                    &user_id,
                );
                sender.send(&envelope);
            })
        };

        *lock(&self.active) = Some(ActiveSession {
            session_id: session_id.to_string(),
            manager: Arc::clone(&manager),
            inbound,
            state_forward,
            code_debouncer,
        });

        info!(session_id, user_id = %self.local_user_id, "Collaboration initialized");
        manager.connect(session_id);
        true
    }

    /// Drop every subscription, cancel pending timers, and close the
    /// transport. A no-op when not initialized.
    pub fn cleanup(&self) {
        let Some(active) = lock(&self.active).take() else {
            return;
        };

        active.code_debouncer.cancel();
        active.inbound.unsubscribe();
        active.manager.disconnect();
        active.state_forward.unsubscribe();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.router.clear();

        info!(session_id = %active.session_id, "Collaboration cleaned up");
    }

    // -- outbound ---------------------------------------------------------

    /// Queue the latest document text. Only the last call in a burst is
    /// sent, once the debounce window passes without another call.
    pub fn broadcast_code(&self, code: impl Into<String>) -> bool {
        match lock(&self.active).as_ref() {
            Some(active) => {
                active.code_debouncer.call(code.into());
                true
            }
            None => {
                warn!("broadcast_code called before init");
                false
            }
        }
    }

    pub fn broadcast_language(&self, language: Language) -> bool {
        self.send(Message::LanguageChange(LanguageChange {
            language,
            user_id: self.local_user_id.clone(),
        }))
    }

    pub fn broadcast_join(&self, user: impl Into<JoinedUser>) -> bool {
        self.send(Message::UserJoin(UserJoin { user: user.into() }))
    }

    pub fn broadcast_leave(&self) -> bool {
        self.send(Message::UserLeave(UserLeave {
            user_id: self.local_user_id.clone(),
        }))
    }

    pub fn broadcast_cursor_position(
        &self,
        position: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        self.send(Message::CursorPosition(CursorPosition {
            position,
            user_id: self.local_user_id.clone(),
        }))
    }

    fn send(&self, message: Message) -> bool {
        let Some(manager) = self.manager() else {
            warn!(kind = %message.message_type(), "Cannot broadcast before init");
            return false;
        };
        let envelope = stamp(message, &self.local_user_id);
        manager.send(&envelope)
    }

    // -- inbound ----------------------------------------------------------

    /// Register for one message type. Our own code and language edits are
    /// never delivered back; presence messages always are.
    pub fn subscribe<F>(&self, kind: MessageType, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let local_user_id = self.local_user_id.clone();
        self.router.subscribe(kind, move |envelope: &Envelope| {
            if kind.suppresses_echo() && envelope.sender() == local_user_id {
                debug!(kind = %kind, "Suppressing echo");
                return;
            }
            callback(envelope);
        })
    }

    /// Observe connection state. Survives `cleanup` and re-`init`.
    pub fn on_connection_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.state_listeners.subscribe(callback)
    }

    // -- queries ----------------------------------------------------------

    pub fn connection_state(&self) -> ConnectionState {
        self.manager()
            .map_or(ConnectionState::Disconnected, |m| m.state())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn is_supported(&self) -> bool {
        self.factory.is_supported()
    }

    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        lock(&self.active).as_ref().map(|a| a.session_id.clone())
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    fn manager(&self) -> Option<Arc<ConnectionManager>> {
        lock(&self.active).as_ref().map(|a| Arc::clone(&a.manager))
    }
}

impl Drop for Collaboration {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn stamp(message: Message, sender_id: &str) -> Envelope {
    Envelope::new(message)
        .with_sender(sender_id)
        .with_timestamp(now_millis())
}
