pub mod errors;
pub mod id;
pub mod time;
pub mod types;

pub use errors::{CodepairError, ConfigError, StoreError, SyncError};
pub use id::{is_valid_session_id, new_id, SessionId};
pub use time::now_millis;
pub use types::{
    anonymous_name, random_color, Language, Participant, Role, Session, UserInfo,
};

pub type Result<T> = std::result::Result<T, CodepairError>;
