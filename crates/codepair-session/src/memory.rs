//! In-process session store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use codepair_common::{
    is_valid_session_id, now_millis, Language, Participant, Role, Session, SessionId, StoreError,
    UserInfo,
};
use codepair_config::SessionConfig;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::store::{ParticipantUpdate, SessionStore, SessionUpdate};

/// Source of "now" in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Sessions held in a map for the lifetime of the process. Used by the
/// relay's tests and by single-machine setups with no session API.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    expiration_ms: i64,
    clock: Clock,
}

impl MemorySessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_clock(config.expiration_ms(), Arc::new(now_millis))
    }

    pub fn with_clock(expiration_ms: i64, clock: Clock) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            expiration_ms,
            clock,
        }
    }

    /// Drop every session past its expiry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "Purged expired sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }
}

fn check_id(session_id: &str) -> Result<(), StoreError> {
    if is_valid_session_id(session_id) {
        Ok(())
    } else {
        Err(StoreError::InvalidSessionId(session_id.to_string()))
    }
}

fn live<'a>(session: Option<&'a Session>, now: i64) -> Result<&'a Session, StoreError> {
    let session = session.ok_or(StoreError::NotFound)?;
    if session.is_expired_at(now) {
        return Err(StoreError::Expired);
    }
    Ok(session)
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        creator: &UserInfo,
        code: &str,
        language: Language,
    ) -> Result<Session, StoreError> {
        let now = self.now();
        let mut sessions = self.sessions.write().await;

        let mut id = SessionId::generate();
        while sessions.contains_key(id.as_str()) {
            id = SessionId::generate();
        }

        let session = Session {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            expires_at: now + self.expiration_ms,
            code: code.to_string(),
            language,
            participants: vec![Participant {
                id: creator.id.clone(),
                name: creator.name.clone(),
                role: Role::Interviewer,
                color: creator.color.clone(),
                joined_at: now,
                is_online: true,
            }],
            creator_id: creator.id.clone(),
        };
        sessions.insert(session.id.clone(), session.clone());

        info!(session_id = %session.id, creator = %creator.id, "Session created");
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, StoreError> {
        check_id(session_id)?;
        let sessions = self.sessions.read().await;
        live(sessions.get(session_id), self.now()).cloned()
    }

    async fn join_session(&self, session_id: &str, user: &UserInfo) -> Result<Session, StoreError> {
        check_id(session_id)?;
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        live(sessions.get(session_id), now)?;
        let session = sessions.get_mut(session_id).ok_or(StoreError::NotFound)?;

        match session.participants.iter_mut().find(|p| p.id == user.id) {
            Some(existing) => {
                existing.name = user.name.clone();
                existing.color = user.color.clone();
                existing.is_online = true;
                debug!(session_id, user = %user.id, "Participant rejoined");
            }
            None => {
                session.participants.push(Participant {
                    id: user.id.clone(),
                    name: user.name.clone(),
                    role: Role::Candidate,
                    color: user.color.clone(),
                    joined_at: now,
                    is_online: true,
                });
                info!(session_id, user = %user.id, "Participant joined");
            }
        }
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn update_session(
        &self,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<Session, StoreError> {
        check_id(session_id)?;
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(StoreError::NotFound)?;

        if let Some(code) = update.code {
            session.code = code;
        }
        if let Some(language) = update.language {
            session.language = language;
        }
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        check_id(session_id)?;
        match self.sessions.write().await.remove(session_id) {
            Some(_) => {
                info!(session_id, "Session deleted");
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn get_participants(&self, session_id: &str) -> Result<Vec<Participant>, StoreError> {
        check_id(session_id)?;
        let sessions = self.sessions.read().await;
        let session = sessions.get(session_id).ok_or(StoreError::NotFound)?;
        Ok(session.participants.clone())
    }

    async fn update_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        update: ParticipantUpdate,
    ) -> Result<Participant, StoreError> {
        check_id(session_id)?;
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(StoreError::NotFound)?;
        let participant = session
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or(StoreError::ParticipantNotFound)?;

        if let Some(online) = update.is_online {
            participant.is_online = online;
        }
        let updated = participant.clone();
        session.updated_at = now;
        Ok(updated)
    }

    async fn remove_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<(), StoreError> {
        check_id(session_id)?;
        let now = self.now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id).ok_or(StoreError::NotFound)?;

        let before = session.participants.len();
        session.participants.retain(|p| p.id != participant_id);
        if session.participants.len() == before {
            return Err(StoreError::ParticipantNotFound);
        }
        session.updated_at = now;
        info!(session_id, participant_id, "Participant removed");
        Ok(())
    }
}
