use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub type SessionId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(String),
}

/// What the core keeps per client between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_user: Option<String>,
    /// Where to go after a forced login.
    pub pending_redirect: Option<String>,
    pub(crate) flash: Option<String>,
}

impl SessionState {
    pub fn auth_state(&self) -> AuthState {
        match &self.current_user {
            Some(u) => AuthState::Authenticated(u.clone()),
            None => AuthState::Anonymous,
        }
    }

    /// Replace the pending flash message; there is a single slot.
    pub fn set_flash(&mut self, message: impl Into<String>) {
        self.flash = Some(message.into());
    }

    /// Read and clear the flash message.
    pub fn take_flash(&mut self) -> Option<String> {
        self.flash.take()
    }

    pub fn peek_flash(&self) -> Option<&str> {
        self.flash.as_deref()
    }
}

#[derive(Debug)]
struct SessionEntry {
    state: SessionState,
    last_seen: Instant,
}

/// 32 random bytes, URL-safe base64 without padding (43 chars).
fn gen_id() -> AppResult<SessionId> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal(format!("session id: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-memory session table keyed by an opaque random id. Idle sessions expire
/// after `ttl`. Cloning shares the table.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Resume the session named by the client's cookie, or start a new one.
    /// Returns the id to use and whether it was newly issued.
    pub fn open(&self, presented: Option<&str>) -> AppResult<(SessionId, bool)> {
        let now = Instant::now();
        if let Some(sid) = presented {
            let mut map = self.sessions.write();
            if let Some(ent) = map.get_mut(sid) {
                if now.duration_since(ent.last_seen) < self.ttl {
                    ent.last_seen = now;
                    return Ok((sid.to_string(), false));
                }
                map.remove(sid);
                debug!(target: "flatcms::session", "session expired");
            }
        }
        let sid = gen_id()?;
        self.sessions.write().insert(sid.clone(), SessionEntry { state: SessionState::default(), last_seen: now });
        debug!(target: "flatcms::session", "session issued");
        Ok((sid, true))
    }

    /// Run `f` against the session's state. A session swept since `open` is
    /// recreated empty rather than failing the request.
    pub fn with_session<R>(&self, sid: &str, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut map = self.sessions.write();
        let ent = map
            .entry(sid.to_string())
            .or_insert_with(|| SessionEntry { state: SessionState::default(), last_seen: Instant::now() });
        f(&mut ent.state)
    }

    /// Move the state under a freshly issued id and drop the old one.
    pub fn rotate(&self, sid: &str) -> AppResult<SessionId> {
        let new_sid = gen_id()?;
        let mut map = self.sessions.write();
        let state = map.remove(sid).map(|e| e.state).unwrap_or_default();
        map.insert(new_sid.clone(), SessionEntry { state, last_seen: Instant::now() });
        Ok(new_sid)
    }

    pub fn snapshot(&self, sid: &str) -> SessionState {
        self.sessions.read().get(sid).map(|e| e.state.clone()).unwrap_or_default()
    }

    pub fn destroy(&self, sid: &str) -> bool {
        self.sessions.write().remove(sid).is_some()
    }

    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, e| now.duration_since(e.last_seen) < self.ttl);
        before - map.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_is_consumed_once() {
        let mut s = SessionState::default();
        s.set_flash("first");
        s.set_flash("second");
        assert_eq!(s.peek_flash(), Some("second"));
        assert_eq!(s.take_flash().as_deref(), Some("second"));
        assert_eq!(s.take_flash(), None);
    }

    #[test]
    fn generated_ids_are_distinct_and_url_safe() {
        let a = gen_id().unwrap();
        let b = gen_id().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn fresh_sessions_never_share_an_id() {
        let sm = SessionManager::default();
        let (a, _) = sm.open(None).unwrap();
        let (b, _) = sm.open(None).unwrap();
        assert_ne!(a, b);
        assert_eq!(sm.len(), 2);
    }

    #[test]
    fn open_resumes_known_sessions() {
        let sm = SessionManager::default();
        let (sid, fresh) = sm.open(None).unwrap();
        assert!(fresh);
        sm.with_session(&sid, |s| s.current_user = Some("admin".into()));
        let (again, fresh) = sm.open(Some(&sid)).unwrap();
        assert_eq!(again, sid);
        assert!(!fresh);
        assert_eq!(sm.snapshot(&sid).auth_state(), AuthState::Authenticated("admin".into()));
    }

    #[test]
    fn unknown_or_expired_ids_get_a_new_session() {
        let sm = SessionManager::new(Duration::from_millis(0));
        let (sid, _) = sm.open(None).unwrap();
        let (other, fresh) = sm.open(Some(&sid)).unwrap();
        assert!(fresh);
        assert_ne!(other, sid);
        let (_, fresh) = sm.open(Some("forged")).unwrap();
        assert!(fresh);
    }

    #[test]
    fn rotate_keeps_state_under_new_id() {
        let sm = SessionManager::default();
        let (sid, _) = sm.open(None).unwrap();
        sm.with_session(&sid, |s| s.pending_redirect = Some("/new".into()));
        let rotated = sm.rotate(&sid).unwrap();
        assert_ne!(rotated, sid);
        assert_eq!(sm.snapshot(&rotated).pending_redirect.as_deref(), Some("/new"));
        assert_eq!(sm.len(), 1);
    }

    #[test]
    fn sweep_and_destroy() {
        let sm = SessionManager::new(Duration::from_millis(0));
        sm.open(None).unwrap();
        sm.open(None).unwrap();
        assert_eq!(sm.sweep_expired(), 2);
        assert!(sm.is_empty());

        let sm = SessionManager::default();
        let (sid, _) = sm.open(None).unwrap();
        assert!(sm.destroy(&sid));
        assert!(!sm.destroy(&sid));
    }
}
