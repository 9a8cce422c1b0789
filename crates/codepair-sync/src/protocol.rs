//! Wire protocol for live-sync envelopes.
//!
//! Every frame is a JSON object `{"type", "data", "timestamp"?, "senderId"?}`.
//! The `type` selects one of a closed set of payload schemas; anything else
//! is rejected at decode time as a malformed message.

use std::fmt;
use std::str::FromStr;

use codepair_common::{Language, Participant, Role, SyncError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    CodeChange,
    LanguageChange,
    UserJoin,
    UserLeave,
    CursorPosition,
}

impl MessageType {
    pub const ALL: [MessageType; 5] = [
        MessageType::CodeChange,
        MessageType::LanguageChange,
        MessageType::UserJoin,
        MessageType::UserLeave,
        MessageType::CursorPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CodeChange => "code_change",
            MessageType::LanguageChange => "language_change",
            MessageType::UserJoin => "user_join",
            MessageType::UserLeave => "user_leave",
            MessageType::CursorPosition => "cursor_position",
        }
    }

    /// Document edits from the local participant are already applied
    /// locally, so their echoes are dropped. Presence events are not.
    pub fn suppresses_echo(&self) -> bool {
        matches!(self, MessageType::CodeChange | MessageType::LanguageChange)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SyncError::Malformed(format!("unknown message type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub code: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageChange {
    pub language: Language,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Roster entry announced when a participant joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedUser {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub color: String,
}

impl From<&Participant> for JoinedUser {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            role: p.role,
            color: p.color.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJoin {
    pub user: JoinedUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLeave {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub position: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// A decoded payload, one variant per message type.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CodeChange(CodeChange),
    LanguageChange(LanguageChange),
    UserJoin(UserJoin),
    UserLeave(UserLeave),
    CursorPosition(CursorPosition),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::CodeChange(_) => MessageType::CodeChange,
            Message::LanguageChange(_) => MessageType::LanguageChange,
            Message::UserJoin(_) => MessageType::UserJoin,
            Message::UserLeave(_) => MessageType::UserLeave,
            Message::CursorPosition(_) => MessageType::CursorPosition,
        }
    }

    /// The participant the payload is about.
    pub fn user_id(&self) -> &str {
        match self {
            Message::CodeChange(m) => &m.user_id,
            Message::LanguageChange(m) => &m.user_id,
            Message::UserJoin(m) => &m.user.id,
            Message::UserLeave(m) => &m.user_id,
            Message::CursorPosition(m) => &m.user_id,
        }
    }

    fn to_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Message::CodeChange(m) => serde_json::to_value(m),
            Message::LanguageChange(m) => serde_json::to_value(m),
            Message::UserJoin(m) => serde_json::to_value(m),
            Message::UserLeave(m) => serde_json::to_value(m),
            Message::CursorPosition(m) => serde_json::to_value(m),
        }
    }

    fn from_data(kind: MessageType, data: serde_json::Value) -> Result<Self, SyncError> {
        let malformed = |e: serde_json::Error| SyncError::Malformed(format!("{kind} payload: {e}"));
        Ok(match kind {
            MessageType::CodeChange => Message::CodeChange(serde_json::from_value(data).map_err(malformed)?),
            MessageType::LanguageChange => {
                Message::LanguageChange(serde_json::from_value(data).map_err(malformed)?)
            }
            MessageType::UserJoin => Message::UserJoin(serde_json::from_value(data).map_err(malformed)?),
            MessageType::UserLeave => Message::UserLeave(serde_json::from_value(data).map_err(malformed)?),
            MessageType::CursorPosition => {
                Message::CursorPosition(serde_json::from_value(data).map_err(malformed)?)
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit of wire communication between coordinators. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub message: Message,
    /// Epoch milliseconds; set by the sender and overwritten by the relay.
    pub timestamp: Option<i64>,
    pub sender_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_millis", skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(rename = "senderId", default, skip_serializing_if = "Option::is_none")]
    sender_id: Option<String>,
}

/// Accept any JSON number as epoch milliseconds, truncating fractions.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))))
}

impl Envelope {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            timestamp: None,
            sender_id: None,
        }
    }

    pub fn with_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Who sent this envelope: the explicit `senderId`, or the payload's
    /// `userId` for peers that do not tag their frames.
    pub fn sender(&self) -> &str {
        self.sender_id
            .as_deref()
            .unwrap_or_else(|| self.message.user_id())
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        let data = self
            .message
            .to_data()
            .map_err(|e| SyncError::Malformed(format!("encode {}: {e}", self.message_type())))?;
        let wire = WireEnvelope {
            kind: self.message_type().as_str().to_string(),
            data,
            timestamp: self.timestamp,
            sender_id: self.sender_id.clone(),
        };
        serde_json::to_string(&wire).map_err(|e| SyncError::Malformed(format!("encode: {e}")))
    }

    pub fn decode(text: &str) -> Result<Self, SyncError> {
        let wire: WireEnvelope = serde_json::from_str(text)
            .map_err(|e| SyncError::Malformed(format!("invalid envelope: {e}")))?;
        let kind: MessageType = wire.kind.parse()?;
        let message = Message::from_data(kind, wire.data)?;
        Ok(Self {
            message,
            timestamp: wire.timestamp,
            sender_id: wire.sender_id,
        })
    }
}
