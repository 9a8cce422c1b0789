//! The relay only understands two things: which session a connection
//! belongs to, taken from the upgrade path, and that every frame is a JSON
//! object it can stamp with a timestamp. Payloads are otherwise opaque.

const SESSION_PATH_PREFIX: &str = "/ws/sessions/";

/// Extract the session id from `/ws/sessions/{id}`.
pub fn session_from_path(path: &str) -> Option<String> {
    let id = path.strip_prefix(SESSION_PATH_PREFIX)?;
    let id = id.strip_suffix('/').unwrap_or(id);
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id.to_string())
}

/// Set `timestamp` on a JSON object frame. Returns `None` for anything
/// that is not a JSON object.
pub fn stamp_frame(text: &str, now_ms: i64) -> Option<String> {
    let mut value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object_mut()?;
    object.insert("timestamp".to_string(), serde_json::Value::from(now_ms));
    serde_json::to_string(&value).ok()
}
