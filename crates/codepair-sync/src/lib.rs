//! Real-time session sync: transports, connection lifecycle, per-type
//! message routing, and the collaboration coordinator the UI talks to.

pub mod connection;
pub mod coordinator;
pub mod debounce;
pub mod protocol;
pub mod router;
pub mod transport;

mod util;

pub use connection::{BackoffPolicy, ConnectionManager, ConnectionState};
pub use coordinator::Collaboration;
pub use debounce::Debouncer;
pub use protocol::{
    CodeChange, CursorPosition, Envelope, JoinedUser, LanguageChange, Message, MessageType,
    UserJoin, UserLeave,
};
pub use router::{Listeners, Router, Subscription};
pub use transport::{
    EventSink, LocalHub, LocalTransport, Transport, TransportEvent, TransportFactory,
    TransportKind, WebSocketTransport,
};
