//! The session store contract shared by the in-memory and HTTP backends.

use async_trait::async_trait;
use codepair_common::{Language, Participant, Session, StoreError, UserInfo};
use serde::{Deserialize, Serialize};

/// Partial update of a session's document. `None` fields are left as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.language.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

/// Authoritative home of sessions and their rosters.
///
/// This is the slow, request/response path: the live-sync layer never
/// goes through it, and clients treat what it returns as eventually
/// consistent with what peers broadcast.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session with `creator` as its first, online interviewer.
    async fn create_session(
        &self,
        creator: &UserInfo,
        code: &str,
        language: Language,
    ) -> Result<Session, StoreError>;

    /// Fails with `Expired` rather than `NotFound` for a session past its
    /// expiry.
    async fn get_session(&self, session_id: &str) -> Result<Session, StoreError>;

    /// Add `user` as a candidate, or bring a returning participant back
    /// online with their current name and color.
    async fn join_session(&self, session_id: &str, user: &UserInfo) -> Result<Session, StoreError>;

    async fn update_session(
        &self,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<Session, StoreError>;

    /// Save a code snapshot.
    async fn update_code(
        &self,
        session_id: &str,
        code: &str,
        language: Language,
    ) -> Result<Session, StoreError> {
        self.update_session(
            session_id,
            SessionUpdate {
                code: Some(code.to_string()),
                language: Some(language),
            },
        )
        .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError>;

    async fn get_participants(&self, session_id: &str) -> Result<Vec<Participant>, StoreError>;

    async fn update_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        update: ParticipantUpdate,
    ) -> Result<Participant, StoreError>;

    async fn remove_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<(), StoreError>;

    /// Graceful leave: the participant stays on the roster, offline.
    async fn leave_session(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Participant, StoreError> {
        self.update_participant(
            session_id,
            participant_id,
            ParticipantUpdate {
                is_online: Some(false),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_update_skips_unset_fields() {
        let update = SessionUpdate {
            code: None,
            language: Some(Language::Python),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"language": "python"})
        );
        assert!(!update.is_empty());
        assert!(SessionUpdate::default().is_empty());
    }

    #[test]
    fn participant_update_wire_shape() {
        let update = ParticipantUpdate {
            is_online: Some(false),
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"is_online":false}"#
        );
    }
}
