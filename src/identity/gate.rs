//! Session gate: Anonymous --login--> Authenticated --logout--> Anonymous.

use tracing::info;

use crate::error::AppError;

use super::session::{AuthState, SessionState};

const HOME: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    /// Terminal for the current request.
    RedirectToLogin,
}

/// Let authenticated sessions through. Anonymous ones get the sign-in prompt and
/// remember `requested_path` for after login.
pub fn require_authenticated(session: &mut SessionState, requested_path: &str) -> GateDecision {
    match session.auth_state() {
        AuthState::Authenticated(_) => GateDecision::Proceed,
        AuthState::Anonymous => {
            session.set_flash(AppError::Unauthenticated.to_string());
            session.pending_redirect = Some(requested_path.to_string());
            GateDecision::RedirectToLogin
        }
    }
}

/// Mark the session as signed in and return where to send the user next.
pub fn complete_login(session: &mut SessionState, username: &str) -> String {
    session.current_user = Some(username.to_string());
    info!(target: "flatcms::session", "login user={}", username);
    session.pending_redirect.take().unwrap_or_else(|| HOME.to_string())
}

pub fn logout(session: &mut SessionState) {
    if let Some(user) = session.current_user.take() {
        info!(target: "flatcms::session", "logout user={}", user);
    }
}

/// Login and signup pages bounce signed-in users home.
pub fn redirect_if_authenticated(session: &SessionState) -> Option<&'static str> {
    match session.auth_state() {
        AuthState::Authenticated(_) => Some(HOME),
        AuthState::Anonymous => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_request_is_sent_to_login_and_resumed_after() {
        let mut s = SessionState::default();
        assert_eq!(require_authenticated(&mut s, "/about.md/edit"), GateDecision::RedirectToLogin);
        assert_eq!(s.peek_flash(), Some("Sign in to view and edit files."));
        assert_eq!(s.pending_redirect.as_deref(), Some("/about.md/edit"));

        let next = complete_login(&mut s, "admin");
        assert_eq!(next, "/about.md/edit");
        assert_eq!(s.pending_redirect, None);
        assert_eq!(require_authenticated(&mut s, "/about.md"), GateDecision::Proceed);
    }

    #[test]
    fn login_without_pending_redirect_goes_home() {
        let mut s = SessionState::default();
        assert_eq!(complete_login(&mut s, "admin"), "/");
    }

    #[test]
    fn authenticated_request_leaves_flash_alone() {
        let mut s = SessionState { current_user: Some("admin".into()), ..Default::default() };
        assert_eq!(require_authenticated(&mut s, "/new"), GateDecision::Proceed);
        assert_eq!(s.peek_flash(), None);
        assert_eq!(s.pending_redirect, None);
    }

    #[test]
    fn logout_and_login_page_redirects() {
        let mut s = SessionState::default();
        assert_eq!(redirect_if_authenticated(&s), None);
        complete_login(&mut s, "admin");
        assert_eq!(redirect_if_authenticated(&s), Some("/"));
        logout(&mut s);
        assert_eq!(s.auth_state(), AuthState::Anonymous);
        assert_eq!(redirect_if_authenticated(&s), None);
    }
}
