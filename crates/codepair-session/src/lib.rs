//! Session and participant storage.
//!
//! [`SessionStore`] is the authoritative, request/response side of a
//! collaborative session. Two backends implement it:
//! - [`MemorySessionStore`] keeps sessions in process.
//! - [`HttpSessionStore`] talks to the session REST API.

pub mod http;
pub mod memory;
pub mod store;

pub use http::HttpSessionStore;
pub use memory::{Clock, MemorySessionStore};
pub use store::{ParticipantUpdate, SessionStore, SessionUpdate};

pub use codepair_common::{is_valid_session_id, SessionId};

/// A fresh eight-character hex session id.
pub fn generate_session_id() -> String {
    SessionId::generate().to_string()
}
