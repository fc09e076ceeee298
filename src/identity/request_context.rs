use super::SessionId;

/// Per-request values handed explicitly to core calls and log lines.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_id: SessionId,
    pub method: String,
    pub path: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(session_id: SessionId, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            session_id,
            method: method.into(),
            path: path.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}
