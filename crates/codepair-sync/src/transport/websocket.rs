//! WebSocket driver talking to a relay at `{base}/ws/sessions/{id}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::{EventSink, SharedSink, Transport, TransportEvent};
use crate::protocol::Envelope;
use crate::util::lock;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn is_websocket_url(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}

/// Build the per-session endpoint from the configured base URL.
pub(crate) fn session_url(base_url: &str, session_id: &str) -> String {
    format!("{}/ws/sessions/{}", base_url.trim_end_matches('/'), session_id)
}

/// One connection attempt. Its background task owns clones of `open` and
/// `sink`, so once the attempt is retired nothing it reports can reach a
/// later attempt.
struct Attempt {
    session_id: String,
    open: Arc<AtomicBool>,
    sink: SharedSink,
    outgoing: mpsc::UnboundedSender<WsMessage>,
    task: JoinHandle<()>,
}

impl Attempt {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Detach the attempt from its listener and wind the socket down.
    fn retire(self) {
        self.sink.replace(None);
        let was_open = self.open.swap(false, Ordering::SeqCst);
        // Dropping the outgoing queue lets an open socket send its close frame.
        drop(self.outgoing);
        if !was_open {
            self.task.abort();
        }
    }
}

pub struct WebSocketTransport {
    base_url: String,
    current: Mutex<Option<Attempt>>,
}

impl WebSocketTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            current: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, session_id: &str, events: EventSink) {
        let mut current = lock(&self.current);

        if let Some(attempt) = current.as_ref() {
            if attempt.is_open() && attempt.session_id == session_id {
                debug!(session_id, "Reusing open WebSocket");
                attempt.sink.replace(Some(events));
                attempt.sink.emit(TransportEvent::Opened);
                return;
            }
        }

        if let Some(stale) = current.take() {
            stale.retire();
        }

        let open = Arc::new(AtomicBool::new(false));
        let sink = SharedSink::default();
        sink.replace(Some(events));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            session_url(&self.base_url, session_id),
            Arc::clone(&open),
            sink.clone(),
            rx,
        ));
        *current = Some(Attempt {
            session_id: session_id.to_string(),
            open,
            sink,
            outgoing: tx,
            task,
        });
    }

    fn send(&self, envelope: &Envelope) -> bool {
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode envelope");
                return false;
            }
        };
        lock(&self.current)
            .as_ref()
            .filter(|attempt| attempt.is_open())
            .is_some_and(|attempt| attempt.outgoing.send(WsMessage::Text(text.into())).is_ok())
    }

    fn close(&self) {
        if let Some(attempt) = lock(&self.current).take() {
            attempt.retire();
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.current).as_ref().is_some_and(Attempt::is_open)
    }

    fn is_supported(&self) -> bool {
        is_websocket_url(&self.base_url)
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    url: String,
    open: Arc<AtomicBool>,
    sink: SharedSink,
    mut outgoing: mpsc::UnboundedReceiver<WsMessage>,
) {
    info!(url = %url, "Connecting to relay");

    let stream = match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(&url)).await {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to connect to relay");
            sink.emit(TransportEvent::Error(format!("connection failed: {e}")));
            sink.emit(TransportEvent::Closed {
                reason: "connect failed".into(),
            });
            return;
        }
        Err(_elapsed) => {
            warn!("Relay connection timed out after 15s");
            sink.emit(TransportEvent::Error("connection timed out".into()));
            sink.emit(TransportEvent::Closed {
                reason: "connect timed out".into(),
            });
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    sink.emit(TransportEvent::Opened);

    let (mut write, mut read) = stream.split();
    let reason = loop {
        tokio::select! {
            queued = outgoing.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = write.send(frame).await {
                        sink.emit(TransportEvent::Error(format!("send failed: {e}")));
                        break "send failed".to_string();
                    }
                }
                None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break "closed locally".to_string();
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => sink.emit_frame(text.as_str()),
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = write.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.as_str().to_string())
                        .unwrap_or_else(|| "closed by relay".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    sink.emit(TransportEvent::Error(e.to_string()));
                    break "socket error".to_string();
                }
                None => break "stream ended".to_string(),
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    info!(reason = %reason, "Relay connection closed");
    sink.emit(TransportEvent::Closed { reason });
}
