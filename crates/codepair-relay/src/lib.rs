//! codepair-relay: WebSocket fan-out server for live session sync.
//!
//! Clients connect to `/ws/sessions/{id}`. Every JSON text frame a client
//! sends is stamped with the relay's clock and delivered to every
//! connection in the same session, the sender included. Clients drop their
//! own echoes.

mod connection;
pub mod hub;
pub mod protocol;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use hub::SessionHub;

/// Accept connections on `listener` forever.
pub async fn serve(listener: TcpListener, hub: SessionHub, capacity: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let hub = hub.clone();
                tokio::spawn(connection::accept_connection(stream, addr, hub, capacity));
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Run [`serve`] on a background task.
pub fn spawn(listener: TcpListener, hub: SessionHub, capacity: usize) -> JoinHandle<()> {
    tokio::spawn(serve(listener, hub, capacity))
}
