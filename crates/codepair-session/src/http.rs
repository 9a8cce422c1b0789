//! Session store backed by the REST API under `/api/v1/sessions`.

use std::time::Duration;

use async_trait::async_trait;
use codepair_common::{is_valid_session_id, Language, Participant, Session, StoreError, UserInfo};
use codepair_config::ServerConfig;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{ParticipantUpdate, SessionStore, SessionUpdate};

const API_PREFIX: &str = "/api/v1/sessions";

#[derive(Deserialize)]
struct SessionData {
    data: Session,
}

#[derive(Deserialize)]
struct ParticipantList {
    participants: Vec<Participant>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    creator: &'a UserInfo,
    code: &'a str,
    language: Language,
}

#[derive(Serialize)]
struct JoinRequest<'a> {
    user: &'a UserInfo,
}

#[derive(Serialize)]
struct CodeSnapshot<'a> {
    code: &'a str,
    language: Language,
}

/// HTTP client for a remote session service.
pub struct HttpSessionStore {
    base_url: String,
    http: reqwest::Client,
}

impl HttpSessionStore {
    pub fn new(api_base_url: impl Into<String>) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self {
            base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, StoreError> {
        Self::new(config.api_base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn session_url(&self, session_id: &str, rest: &str) -> Result<String, StoreError> {
        if !is_valid_session_id(session_id) {
            return Err(StoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.url(&format!("/{session_id}{rest}")))
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = error_for_status(status, &body);
        warn!(status = %status, error = %err, "Session API request failed");
        Err(err)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Request(format!("invalid response: {e}")))
    }

    async fn session(&self, request: reqwest::RequestBuilder) -> Result<Session, StoreError> {
        let response = self.execute(request).await?;
        Ok(Self::parse::<SessionData>(response).await?.data)
    }
}

/// Map a failed response to a store error.
///
/// The service reports errors as `{"detail": {"success": false, "error": "..."}}`.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/detail/error")
                .or_else(|| v.get("error"))
                .and_then(|e| e.as_str())
                .map(str::to_string)
        });

    match status {
        StatusCode::NOT_FOUND if message.as_deref() == Some("Participant not found") => {
            StoreError::ParticipantNotFound
        }
        StatusCode::NOT_FOUND => StoreError::NotFound,
        StatusCode::GONE => StoreError::Expired,
        _ => {
            let detail = message.unwrap_or_else(|| body.chars().take(200).collect());
            StoreError::Request(format!("HTTP {status}: {detail}"))
        }
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_session(
        &self,
        creator: &UserInfo,
        code: &str,
        language: Language,
    ) -> Result<Session, StoreError> {
        debug!(creator = %creator.id, "Creating session");
        let body = CreateRequest {
            creator,
            code,
            language,
        };
        self.session(self.http.post(self.url("/")).json(&body)).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, StoreError> {
        let url = self.session_url(session_id, "")?;
        self.session(self.http.get(url)).await
    }

    async fn join_session(&self, session_id: &str, user: &UserInfo) -> Result<Session, StoreError> {
        let url = self.session_url(session_id, "/join")?;
        self.session(self.http.post(url).json(&JoinRequest { user }))
            .await
    }

    async fn update_session(
        &self,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<Session, StoreError> {
        let url = self.session_url(session_id, "")?;
        self.session(self.http.patch(url).json(&update)).await
    }

    async fn update_code(
        &self,
        session_id: &str,
        code: &str,
        language: Language,
    ) -> Result<Session, StoreError> {
        let url = self.session_url(session_id, "/code")?;
        self.session(self.http.put(url).json(&CodeSnapshot { code, language }))
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StoreError> {
        let url = self.session_url(session_id, "")?;
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }

    async fn get_participants(&self, session_id: &str) -> Result<Vec<Participant>, StoreError> {
        let url = self.session_url(session_id, "/participants/")?;
        let response = self.execute(self.http.get(url)).await?;
        Ok(Self::parse::<ParticipantList>(response).await?.participants)
    }

    async fn update_participant(
        &self,
        session_id: &str,
        participant_id: &str,
        update: ParticipantUpdate,
    ) -> Result<Participant, StoreError> {
        let url = self.session_url(session_id, &format!("/participants/{participant_id}"))?;
        let response = self.execute(self.http.patch(url).json(&update)).await?;
        Self::parse(response).await
    }

    async fn remove_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<(), StoreError> {
        let url = self.session_url(session_id, &format!("/participants/{participant_id}"))?;
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response and return the request line.
    async fn one_shot(status: &str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let status = status.to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, handle)
    }

    /// Read headers and any declared body so the client sees a clean close.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, r#"{"detail":{"success":false,"error":"Session not found"}}"#),
            StoreError::NotFound
        );
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, r#"{"detail":{"success":false,"error":"Participant not found"}}"#),
            StoreError::ParticipantNotFound
        );
        assert_eq!(error_for_status(StatusCode::GONE, ""), StoreError::Expired);
        assert_eq!(
            error_for_status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":{"error":"db down"}}"#),
            StoreError::Request("HTTP 500 Internal Server Error: db down".into())
        );
    }

    #[test]
    fn urls_are_rooted_at_api_prefix() {
        let store = HttpSessionStore::new("http://localhost:8000/").unwrap();
        assert_eq!(store.url("/"), "http://localhost:8000/api/v1/sessions/");
        assert_eq!(
            store.session_url("abcd1234", "/join").unwrap(),
            "http://localhost:8000/api/v1/sessions/abcd1234/join"
        );
        assert!(matches!(
            store.session_url("nope", ""),
            Err(StoreError::InvalidSessionId(_))
        ));
    }

    #[tokio::test]
    async fn get_session_parses_envelope() {
        let body = r#"{"success":true,"data":{"id":"abcd1234","created_at":1,"updated_at":2,"expires_at":3,"code":"x","language":"python","participants":[{"id":"u1","name":"Ann","role":"interviewer","color":"red","joined_at":1,"is_online":true}],"creator_id":"u1"}}"#;
        let (base, server) = one_shot("200 OK", body).await;
        let store = HttpSessionStore::new(base).unwrap();

        let session = store.get_session("abcd1234").await.unwrap();
        assert_eq!(session.language, Language::Python);
        assert_eq!(session.participants[0].name, "Ann");
        assert_eq!(
            server.await.unwrap(),
            "GET /api/v1/sessions/abcd1234 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn join_expired_session_maps_gone() {
        let body = r#"{"detail":{"success":false,"error":"Session has expired"}}"#;
        let (base, server) = one_shot("410 Gone", body).await;
        let store = HttpSessionStore::new(base).unwrap();
        let user = UserInfo {
            id: "u2".into(),
            name: "Bob".into(),
            color: "blue".into(),
        };

        let err = store.join_session("deadbeef", &user).await.unwrap_err();
        assert_eq!(err, StoreError::Expired);
        assert_eq!(
            server.await.unwrap(),
            "POST /api/v1/sessions/deadbeef/join HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let store = HttpSessionStore::new(base).unwrap();
        assert!(matches!(
            store.get_session("abcd1234").await,
            Err(StoreError::Request(_))
        ));
    }
}
