//! Transport drivers: the channel that carries envelopes between
//! coordinators.
//!
//! Two interchangeable strategies implement [`Transport`]:
//! - [`WebSocketTransport`] talks to a relay at `/ws/sessions/{id}`.
//! - [`LocalTransport`] fans frames out to other transports in the same
//!   process through a [`LocalHub`], with no network reach.
//!
//! A driver reports everything it observes through the event sink handed
//! to `connect`: open, each decoded inbound envelope, errors, and the final
//! close. Frames that fail to decode are logged and dropped here, so
//! nothing malformed ever reaches a router.

mod local;
#[cfg(test)]
pub(crate) mod mock;
mod websocket;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::Envelope;
use crate::util::lock;

pub use local::{LocalHub, LocalTransport};
pub use websocket::WebSocketTransport;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Low-level events reported by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The channel is open and `send` will deliver.
    Opened,
    /// A well-formed envelope arrived.
    Message(Envelope),
    /// Something went wrong; a `Closed` follows if the channel is gone.
    Error(String),
    /// The channel is gone.
    Closed { reason: String },
}

pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Event sink shared between a driver handle and its background task, so a
/// reused connection can be pointed at a new listener.
#[derive(Clone, Default)]
pub(crate) struct SharedSink(Arc<Mutex<Option<EventSink>>>);

impl SharedSink {
    pub(crate) fn replace(&self, sink: Option<EventSink>) {
        *lock(&self.0) = sink;
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(sink) = lock(&self.0).as_ref() {
            let _ = sink.send(event);
        }
    }

    /// Decode an inbound text frame and forward it, dropping malformed frames.
    pub(crate) fn emit_frame(&self, text: &str) {
        match Envelope::decode(text) {
            Ok(envelope) => self.emit(TransportEvent::Message(envelope)),
            Err(e) => warn!(error = %e, "Dropping malformed frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// One logical channel per session.
///
/// None of these methods block: `connect` starts opening in the background
/// and `send` either queues the frame or fails immediately.
pub trait Transport: Send + Sync {
    /// Open a channel for `session_id`, reporting progress to `events`.
    /// If a channel for the same session is already open it is reused and
    /// `Opened` is reported again to the new sink.
    fn connect(&self, session_id: &str, events: EventSink);

    /// Queue `envelope` for delivery. Returns `false` if the channel is not
    /// open or the frame could not be encoded.
    fn send(&self, envelope: &Envelope) -> bool;

    /// Tear the channel down. No further events are reported.
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Whether this environment can carry the transport at all.
    fn is_supported(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Factories
// ---------------------------------------------------------------------------

/// Builds a fresh driver for every coordinator `init`.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Transport>;

    fn is_supported(&self) -> bool {
        true
    }
}

impl<F> TransportFactory for F
where
    F: Fn() -> Arc<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Transport> {
        self()
    }
}

/// The two built-in strategies, chosen when the coordinator is built.
#[derive(Clone)]
pub enum TransportKind {
    WebSocket { base_url: String },
    Local(LocalHub),
}

impl TransportFactory for TransportKind {
    fn create(&self) -> Arc<dyn Transport> {
        match self {
            TransportKind::WebSocket { base_url } => Arc::new(WebSocketTransport::new(base_url)),
            TransportKind::Local(hub) => Arc::new(LocalTransport::new(hub.clone())),
        }
    }

    fn is_supported(&self) -> bool {
        match self {
            TransportKind::WebSocket { base_url } => websocket::is_websocket_url(base_url),
            TransportKind::Local(_) => true,
        }
    }
}

impl std::fmt::Debug for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::WebSocket { base_url } => f
                .debug_struct("WebSocket")
                .field("base_url", base_url)
                .finish(),
            TransportKind::Local(_) => f.write_str("Local"),
        }
    }
}
