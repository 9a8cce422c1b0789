//! Per-connection handler: route by upgrade path, register, then fan out.

use std::net::SocketAddr;

use codepair_common::now_millis;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::hub::SessionHub;
use crate::protocol::{session_from_path, stamp_frame};

/// Upgrade a raw TCP connection and serve it until either side closes.
pub async fn accept_connection(stream: TcpStream, addr: SocketAddr, hub: SessionHub, capacity: usize) {
    let mut session_id = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match session_from_path(request.uri().path()) {
            Some(id) => {
                session_id = Some(id);
                Ok(response)
            }
            None => {
                tracing::debug!(peer = %addr, path = %request.uri().path(), "Rejecting unknown path");
                let mut rejection = ErrorResponse::new(Some("not found".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
            return;
        }
    };
    let Some(session_id) = session_id else {
        return;
    };

    handle_connection(ws, addr, session_id, hub, capacity).await;
}

async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    addr: SocketAddr,
    session_id: String,
    hub: SessionHub,
    capacity: usize,
) {
    let (mut sink, mut stream) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(capacity);
    let id = hub.register(&session_id, tx).await;
    tracing::info!(peer = %addr, session = %session_id, connection = id, "Client joined session");

    loop {
        tokio::select! {
            Some(frame) = rx.recv() => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match stamp_frame(text.as_str(), now_millis()) {
                        Some(stamped) => {
                            let delivered = hub.broadcast(&session_id, &stamped).await;
                            tracing::trace!(session = %session_id, delivered, "Frame relayed");
                        }
                        None => {
                            tracing::warn!(peer = %addr, session = %session_id, "Dropping non-JSON-object frame");
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!(peer = %addr, "Dropping binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let emptied = hub.unregister(&session_id, id).await;
    tracing::info!(
        peer = %addr,
        session = %session_id,
        connection = id,
        session_closed = emptied,
        "Client left session"
    );
}
