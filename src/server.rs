//!
//! flatcms HTTP server
//! -------------------
//! Axum routes over the document store and credential store, with server-rendered
//! views and cookie-keyed sessions.
//!
//! Responsibilities:
//! - Session transport: an opaque id in a cookie, state kept in `SessionManager`.
//! - Gating every document route through the session gate, remembering where the
//!   user was headed so login can resume there.
//! - Translating store results into pages, 422 form redisplays, or 302 redirects
//!   carrying a single flash message.

use std::time::Duration;

use anyhow::Context;
use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use maud::Markup;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::documents::{DocumentStore, FsRepository};
use crate::error::{AppError, AppResult};
use crate::identity::{
    complete_login, logout as end_session, redirect_if_authenticated, require_authenticated, GateDecision, RequestContext,
    SessionManager,
};
use crate::security::{normalize_username, CredentialStore};

pub mod views;

const SESSION_COOKIE: &str = "flatcms_session";
const HOME: &str = "/";
const LOGIN_PATH: &str = "/users/login";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentStore,
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(documents: DocumentStore, credentials: CredentialStore, sessions: SessionManager) -> Self {
        Self { documents, credentials, sessions }
    }

    pub fn from_config(cfg: &ServerConfig) -> AppResult<Self> {
        let repo = FsRepository::open(&cfg.data_dir)?;
        Ok(Self {
            documents: DocumentStore::new(std::sync::Arc::new(repo)),
            credentials: CredentialStore::new(&cfg.users_file),
            sessions: SessionManager::new(Duration::from_secs(cfg.session_ttl_secs)),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/new", get(new_document_page).post(create_document))
        .route("/users/login", get(login_page).post(login))
        .route("/users/logout", post(logout))
        .route("/users/signup", get(signup_page).post(signup))
        .route("/{filename}", get(view_document))
        .route("/{filename}/edit", get(edit_page).post(save_edit))
        .route("/{filename}/delete", post(delete_document))
        .route("/{filename}/duplicate", post(duplicate_document))
        .fallback(unknown_route)
        .with_state(state)
}

/// Start the HTTP server. The credential table must already exist; a missing
/// table aborts startup.
pub async fn run(cfg: ServerConfig) -> anyhow::Result<()> {
    info!(
        target: "flatcms::server",
        "flatcms starting: data_dir={:?}, users_file={:?}, session_ttl_secs={}",
        cfg.data_dir, cfg.users_file, cfg.session_ttl_secs
    );
    let state = AppState::from_config(&cfg)
        .with_context(|| format!("Failed to open document directory: {}", cfg.data_dir.display()))?;
    let users = state
        .credentials
        .load_users()
        .with_context(|| format!("While loading credential table: {}", cfg.users_file.display()))?;
    let docs = state.documents.list().context("While listing documents")?;
    info!(target: "flatcms::server", "{} users, {} documents", users.len(), docs.len());

    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let removed = sessions.sweep_expired();
                if removed > 0 { debug!(target: "flatcms::session", removed = removed, "session_sweep"); }
            }
        });
    }

    let app = router(state);
    let addr = cfg.listen_addr();
    info!(target: "flatcms::server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- forms ---

#[derive(Debug, Deserialize)]
struct NewDocumentForm {
    #[serde(default)]
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct EditForm {
    #[serde(default)]
    edited_text: String,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    password_confirm: String,
}

// --- session transport ---

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn session_cookie(sid: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, sid)).ok()
}

/// One request's view of its session.
struct Visit {
    ctx: RequestContext,
    /// The id was issued during this request and the client must be told.
    issue_cookie: bool,
}

impl Visit {
    /// Resume or start the client's session. Failing to mint a session id ends
    /// the request with a 500 and no page.
    fn begin(state: &AppState, headers: &HeaderMap, method: &str, path: &str) -> Result<Self, Response> {
        let presented = parse_cookie(headers, SESSION_COOKIE);
        let (sid, fresh) = state.sessions.open(presented.as_deref()).map_err(|e| {
            error!(target: "flatcms::server", code = e.code_str(), "{} {} failed: {}", method, path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        })?;
        let ctx = RequestContext::new(sid, method, path);
        debug!(target: "flatcms::server", request_id = %ctx.request_id, "{} {}", ctx.method, ctx.path);
        Ok(Self { ctx, issue_cookie: fresh })
    }

    fn sid(&self) -> &str { &self.ctx.session_id }

    fn finish(&self, resp: impl IntoResponse) -> Response {
        let mut resp = resp.into_response();
        if self.issue_cookie {
            if let Some(v) = session_cookie(self.sid()) {
                resp.headers_mut().append(header::SET_COOKIE, v);
            }
        }
        resp
    }

    /// Render a full page. Reading the flash here is what consumes it.
    fn page(&self, state: &AppState, status: StatusCode, title: &str, body: Markup) -> Response {
        let (flash, user) = state.sessions.with_session(self.sid(), |s| (s.take_flash(), s.current_user.clone()));
        let markup = views::layout(title, flash.as_deref(), user.as_deref(), body);
        self.finish((status, Html(markup.into_string())))
    }

    fn redirect(&self, location: &str) -> Response {
        self.finish((StatusCode::FOUND, [(header::LOCATION, location.to_string())]))
    }

    fn redirect_with_flash(&self, state: &AppState, location: &str, message: impl Into<String>) -> Response {
        let message = message.into();
        state.sessions.with_session(self.sid(), |s| s.set_flash(message));
        self.redirect(location)
    }

    /// Run the session gate. `Some` is the login redirect that ends the request.
    fn gate(&self, state: &AppState, resume_path: &str) -> Option<Response> {
        match state.sessions.with_session(self.sid(), |s| require_authenticated(s, resume_path)) {
            GateDecision::Proceed => None,
            GateDecision::RedirectToLogin => {
                info!(target: "flatcms::server", request_id = %self.ctx.request_id, "unauthenticated {} {}", self.ctx.method, self.ctx.path);
                Some(self.redirect(LOGIN_PATH))
            }
        }
    }

    /// Failures of document operations: missing documents and rejected names go
    /// home with a flash; everything else is a 500 with no page.
    fn fail(&self, state: &AppState, err: AppError) -> Response {
        if matches!(err, AppError::NotFound(_)) || err.is_validation() {
            return self.redirect_with_flash(state, HOME, err.to_string());
        }
        self.server_error(err)
    }

    fn server_error(&self, err: AppError) -> Response {
        error!(target: "flatcms::server", request_id = %self.ctx.request_id, code = err.code_str(), "{} {} failed: {}", self.ctx.method, self.ctx.path, err);
        let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.finish((status, "internal server error"))
    }
}

fn document_path(filename: &str) -> String {
    format!("/{}", views::encode_name(filename))
}

// --- documents ---

/// Handlers finish early with `Err` when the session cannot be opened.
type Reply = Result<Response, Response>;

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "GET", HOME)?;
    if state.sessions.snapshot(visit.sid()).current_user.is_none() {
        return Ok(visit.page(&state, StatusCode::OK, "Home", views::anonymous_home()));
    }
    Ok(match state.documents.list() {
        Ok(names) => visit.page(&state, StatusCode::OK, "Documents", views::index(&names)),
        Err(e) => visit.server_error(e),
    })
}

async fn new_document_page(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "GET", "/new")?;
    if let Some(r) = visit.gate(&state, "/new") { return Ok(r); }
    Ok(visit.page(&state, StatusCode::OK, "New document", views::new_document(None, "")))
}

async fn create_document(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<NewDocumentForm>) -> Reply {
    let visit = Visit::begin(&state, &headers, "POST", "/new")?;
    if let Some(r) = visit.gate(&state, "/new") { return Ok(r); }
    let existing = state.documents.list().map_err(|e| visit.server_error(e))?;
    Ok(match state.documents.create(&form.file_name, &existing) {
        Ok(name) => visit.redirect_with_flash(&state, HOME, format!("{} has been created.", name)),
        Err(e) if e.is_validation() => {
            let msg = e.to_string();
            visit.page(&state, StatusCode::UNPROCESSABLE_ENTITY, "New document", views::new_document(Some(&msg), &form.file_name))
        }
        Err(e) => visit.server_error(e),
    })
}

async fn view_document(State(state): State<AppState>, headers: HeaderMap, Path(filename): Path<String>) -> Reply {
    let path = document_path(&filename);
    let visit = Visit::begin(&state, &headers, "GET", &path)?;
    if let Some(r) = visit.gate(&state, &path) { return Ok(r); }
    Ok(match state.documents.read_rendered(&filename) {
        Ok(html) => visit.page(&state, StatusCode::OK, &filename, views::document(&filename, &html)),
        Err(e) => visit.fail(&state, e),
    })
}

async fn edit_page(State(state): State<AppState>, headers: HeaderMap, Path(filename): Path<String>) -> Reply {
    let path = format!("{}/edit", document_path(&filename));
    let visit = Visit::begin(&state, &headers, "GET", &path)?;
    if let Some(r) = visit.gate(&state, &path) { return Ok(r); }
    Ok(match state.documents.read_raw(&filename) {
        Ok(raw) => {
            let text = String::from_utf8_lossy(&raw);
            visit.page(&state, StatusCode::OK, &format!("Edit {}", filename), views::edit_document(&filename, &text))
        }
        Err(e) => visit.fail(&state, e),
    })
}

async fn save_edit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(filename): Path<String>,
    Form(form): Form<EditForm>,
) -> Reply {
    let path = format!("{}/edit", document_path(&filename));
    let visit = Visit::begin(&state, &headers, "POST", &path)?;
    if let Some(r) = visit.gate(&state, &path) { return Ok(r); }
    Ok(match state.documents.write(&filename, form.edited_text.as_bytes()) {
        Ok(()) => visit.redirect_with_flash(&state, HOME, format!("{} has been updated.", filename)),
        Err(e) => visit.fail(&state, e),
    })
}

async fn delete_document(State(state): State<AppState>, headers: HeaderMap, Path(filename): Path<String>) -> Reply {
    let visit = Visit::begin(&state, &headers, "POST", &format!("{}/delete", document_path(&filename)))?;
    if let Some(r) = visit.gate(&state, HOME) { return Ok(r); }
    Ok(match state.documents.delete(&filename) {
        Ok(()) => visit.redirect_with_flash(&state, HOME, format!("{} has been deleted.", filename)),
        Err(e) => visit.fail(&state, e),
    })
}

async fn duplicate_document(State(state): State<AppState>, headers: HeaderMap, Path(filename): Path<String>) -> Reply {
    let visit = Visit::begin(&state, &headers, "POST", &format!("{}/duplicate", document_path(&filename)))?;
    if let Some(r) = visit.gate(&state, HOME) { return Ok(r); }
    Ok(match state.documents.duplicate(&filename) {
        Ok(copy) => visit.redirect_with_flash(&state, HOME, format!("{} has been duplicated as {}.", filename, copy)),
        Err(e) => visit.fail(&state, e),
    })
}

async fn unknown_route(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "ANY", "<unmatched>")?;
    Ok(visit.redirect(HOME))
}

// --- users ---

async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "GET", LOGIN_PATH)?;
    if let Some(home) = redirect_if_authenticated(&state.sessions.snapshot(visit.sid())) {
        return Ok(visit.redirect(home));
    }
    Ok(visit.page(&state, StatusCode::OK, "Sign in", views::login(None, "")))
}

async fn login(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<LoginForm>) -> Reply {
    let mut visit = Visit::begin(&state, &headers, "POST", LOGIN_PATH)?;
    if let Some(home) = redirect_if_authenticated(&state.sessions.snapshot(visit.sid())) {
        return Ok(visit.redirect(home));
    }
    Ok(match state.credentials.verify(&form.username, &form.password) {
        Ok(true) => {
            // New id on privilege change; the old one may have been seen by someone else.
            let sid = state.sessions.rotate(visit.sid()).map_err(|e| visit.server_error(e))?;
            visit.ctx.session_id = sid;
            visit.issue_cookie = true;
            let user = normalize_username(&form.username);
            let next = state.sessions.with_session(visit.sid(), |s| {
                let next = complete_login(s, &user);
                s.set_flash("Welcome!");
                next
            });
            visit.redirect(&next)
        }
        Ok(false) => {
            warn!(target: "flatcms::server", request_id = %visit.ctx.request_id, "invalid credentials for {:?}", form.username);
            visit.page(&state, StatusCode::UNPROCESSABLE_ENTITY, "Sign in", views::login(Some("Invalid credentials."), &form.username))
        }
        Err(e) => visit.server_error(e),
    })
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "POST", "/users/logout")?;
    state.sessions.with_session(visit.sid(), |s| {
        end_session(s);
        s.set_flash("You have been signed out.");
    });
    Ok(visit.redirect(HOME))
}

async fn signup_page(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let visit = Visit::begin(&state, &headers, "GET", "/users/signup")?;
    if let Some(home) = redirect_if_authenticated(&state.sessions.snapshot(visit.sid())) {
        return Ok(visit.redirect(home));
    }
    Ok(visit.page(&state, StatusCode::OK, "Sign up", views::signup(None, "")))
}

async fn signup(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<SignupForm>) -> Reply {
    let visit = Visit::begin(&state, &headers, "POST", "/users/signup")?;
    if let Some(home) = redirect_if_authenticated(&state.sessions.snapshot(visit.sid())) {
        return Ok(visit.redirect(home));
    }
    let checked = state
        .credentials
        .check_signup(&form.username, &form.password, &form.password_confirm)
        .and_then(|()| state.credentials.register(&form.username, &form.password));
    Ok(match checked {
        Ok(()) => {
            let user = normalize_username(&form.username);
            visit.redirect_with_flash(&state, LOGIN_PATH, format!("Account created for {}. Please sign in.", user))
        }
        Err(e) if e.is_validation() => {
            let msg = e.to_string();
            visit.page(&state, StatusCode::UNPROCESSABLE_ENTITY, "Sign up", views::signup(Some(&msg), &form.username))
        }
        Err(e) => visit.server_error(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_parsing_finds_named_value() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; flatcms_session=abc-123; other=1"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE).as_deref(), Some("abc-123"));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn session_cookie_is_http_only() {
        let v = session_cookie("abc").unwrap();
        let s = v.to_str().unwrap();
        assert!(s.starts_with("flatcms_session=abc;"));
        assert!(s.contains("HttpOnly"));
    }

    #[test]
    fn document_paths_are_percent_encoded() {
        assert_eq!(document_path("my notes.md"), "/my%20notes.md");
        assert_eq!(document_path("about.md"), "/about.md");
    }
}
