//! In-process broadcast driver for coordinators sharing one runtime.
//!
//! Every transport connected to the same session subscribes to a named
//! broadcast channel on a shared [`LocalHub`]. Frames carry the origin
//! transport's id so a transport never hears its own sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{EventSink, SharedSink, Transport, TransportEvent};
use crate::protocol::Envelope;
use crate::util::lock;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct LocalFrame {
    origin: u64,
    text: String,
}

/// Registry of named in-process channels. Cheap to clone; clones share
/// the same channels.
#[derive(Clone, Default)]
pub struct LocalHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<LocalFrame>>>>,
    next_origin: Arc<AtomicU64>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_name(session_id: &str) -> String {
        format!("codepair_sync:{session_id}")
    }

    /// Number of transports currently listening on a session's channel.
    pub fn listener_count(&self, session_id: &str) -> usize {
        lock(&self.channels)
            .get(&Self::channel_name(session_id))
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn channel(&self, name: &str) -> broadcast::Sender<LocalFrame> {
        lock(&self.channels)
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn next_origin(&self) -> u64 {
        self.next_origin.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Channel {
    session_id: Option<String>,
    sender: Option<broadcast::Sender<LocalFrame>>,
    task: Option<JoinHandle<()>>,
}

pub struct LocalTransport {
    hub: LocalHub,
    origin: u64,
    open: AtomicBool,
    sink: SharedSink,
    channel: Mutex<Channel>,
}

impl LocalTransport {
    pub fn new(hub: LocalHub) -> Self {
        let origin = hub.next_origin();
        Self {
            hub,
            origin,
            open: AtomicBool::new(false),
            sink: SharedSink::default(),
            channel: Mutex::new(Channel::default()),
        }
    }
}

impl Transport for LocalTransport {
    fn connect(&self, session_id: &str, events: EventSink) {
        let mut channel = lock(&self.channel);
        self.sink.replace(Some(events));

        if self.is_open() && channel.session_id.as_deref() == Some(session_id) {
            debug!(session_id, "Reusing local channel");
            self.sink.emit(TransportEvent::Opened);
            return;
        }

        if let Some(task) = channel.task.take() {
            task.abort();
        }

        let sender = self.hub.channel(&LocalHub::channel_name(session_id));
        let mut receiver = sender.subscribe();
        let origin = self.origin;
        let sink = self.sink.clone();
        channel.task = Some(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(frame) if frame.origin == origin => {}
                    Ok(frame) => sink.emit_frame(&frame.text),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Local channel lagged; frames dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
        channel.session_id = Some(session_id.to_string());
        channel.sender = Some(sender);

        self.open.store(true, Ordering::SeqCst);
        self.sink.emit(TransportEvent::Opened);
    }

    fn send(&self, envelope: &Envelope) -> bool {
        if !self.is_open() {
            return false;
        }
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode envelope");
                return false;
            }
        };
        let channel = lock(&self.channel);
        match channel.sender.as_ref() {
            Some(sender) => {
                // Our own receiver keeps the channel alive, so this only
                // fails if the channel was torn down underneath us.
                sender
                    .send(LocalFrame {
                        origin: self.origin,
                        text,
                    })
                    .is_ok()
            }
            None => false,
        }
    }

    fn close(&self) {
        self.sink.replace(None);
        self.open.store(false, Ordering::SeqCst);
        let mut channel = lock(&self.channel);
        if let Some(task) = channel.task.take() {
            task.abort();
        }
        channel.sender = None;
        channel.session_id = None;
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.close();
    }
}
