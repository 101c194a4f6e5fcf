//!
//! quillpress HTTP server
//! ----------------------
//! This module defines the axum-based HTTP application: session cookies,
//! register/login/logout, the post listing and detail pages, comment posting,
//! and the admin-only post mutations.
//!
//! Responsibilities:
//! - Session resolution from the cookie into an explicit principal value.
//! - Guard checks at the top of each handler returning a tagged
//!   Allowed/Unauthorized/Forbidden outcome (no implicit wrapping).
//! - JSON view-models for the rendering collaborator and 303 redirects on
//!   successful mutations; recoverable failures redisplay the form with a
//!   flash-style message.
//!
//! HTML rendering itself is out of scope; a template engine consumes the
//! view-models emitted here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::identity::{
    check_action_allowed, Access, Action, AuthProvider, LocalAuthProvider, LoginRequest,
    Principal, RegisterRequest, SessionManager,
};
use crate::storage::{BlogPost, PostDraft, SharedStore, Store};

const SESSION_COOKIE: &str = "quillpress_session";

static IMG_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").unwrap());

/// Shared server state injected into all handlers.
///
/// Holds the global `SharedStore` handle and the identity service; no other
/// cross-request mutable state exists.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: Arc<LocalAuthProvider>,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        let auth = Arc::new(LocalAuthProvider::new(store.clone(), SessionManager::default()));
        Self { store, auth }
    }
}

/// Start the quillpress HTTP server bound to the given port over the given
/// store root.
pub async fn run_with_port(http_port: u16, db_root: &str) -> anyhow::Result<()> {
    let store = SharedStore::new(db_root)?;
    info!("Store root at {}", store.root_path().display());
    let state = AppState::new(store);
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// Backward-compatible entry that uses defaults
/// Convenience entry point using the default port (5002) and db root "data".
pub async fn run() -> anyhow::Result<()> {
    run_with_port(5002, "data").await
}

/// Mount all routes onto the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/post/{post_id}", get(show_post).post(post_comment))
        .route("/new-post", get(new_post_page).post(new_post))
        .route("/edit-post/{post_id}", get(edit_post_page).post(edit_post))
        .route("/delete/{post_id}", get(delete_post))
        .route("/about", get(about))
        .route("/contact", get(contact))
        .with_state(state)
}

// ---- form payloads ----

#[derive(Debug, Deserialize)]
struct RegisterForm {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PostForm {
    title: String,
    subtitle: String,
    img_url: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    comment: String,
}

// ---- cookie helpers ----

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(token: &str) -> HeaderMap {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    let mut h = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    )) {
        h.insert("Set-Cookie", v);
    }
    h
}

fn clear_session_cookie() -> HeaderMap {
    let mut h = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    )) {
        h.insert("Set-Cookie", v);
    }
    h
}

fn principal_from_headers(state: &AppState, headers: &HeaderMap) -> Option<Principal> {
    let token = parse_cookie(headers, SESSION_COOKIE)?;
    state.auth.current_principal(&token)
}

/// Pre-condition check invoked at the top of each mutating handler. The
/// principal comes exclusively from the validated session cookie; anonymous
/// callers are sent to the login page, authenticated non-admins get a fixed
/// 403 with no redirect.
fn guard(state: &AppState, headers: &HeaderMap, action: Action) -> Result<Principal, Response> {
    let principal = principal_from_headers(state, headers);
    match (check_action_allowed(principal.as_ref(), action), principal) {
        (Access::Allowed, Some(p)) => Ok(p),
        (Access::Forbidden, _) => {
            Err(AppError::forbidden("forbidden", "only the administrator may do this").into_response())
        }
        _ => Err(Redirect::to("/login").into_response()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({
            "status": "error",
            "code": self.code_str(),
            "error": self.message(),
        })))
            .into_response()
    }
}

// ---- view-models ----

fn current_user_json(principal: Option<&Principal>) -> serde_json::Value {
    match principal {
        Some(p) => json!({ "id": p.user_id, "name": p.name, "is_admin": p.is_admin() }),
        None => serde_json::Value::Null,
    }
}

fn post_json(store: &Store, post: &BlogPost) -> AppResult<serde_json::Value> {
    let author = store.get_user(post.author_id)?;
    Ok(json!({
        "id": post.id,
        "title": post.title,
        "subtitle": post.subtitle,
        "body": post.body,
        "img_url": post.img_url,
        "date": post.date,
        "author": author.map(|u| json!({ "id": u.id, "name": u.name })),
    }))
}

/// 200 redisplay of a form page with a flash-style message, used for the
/// recoverable failures (validation, uniqueness, bad credentials).
fn redisplay(page: &str, flash: &str) -> Response {
    (StatusCode::OK, Json(json!({ "page": page, "flash": flash }))).into_response()
}

fn validate_post_form(form: &PostForm) -> AppResult<PostDraft> {
    if form.title.trim().is_empty()
        || form.subtitle.trim().is_empty()
        || form.body.trim().is_empty()
        || form.img_url.trim().is_empty()
    {
        return Err(AppError::validation("missing_field", "all post fields are required"));
    }
    if !IMG_URL_RE.is_match(form.img_url.trim()) {
        return Err(AppError::validation("bad_img_url", "image URL must be a well-formed http(s) URL"));
    }
    Ok(PostDraft {
        title: form.title.trim().to_string(),
        subtitle: form.subtitle.trim().to_string(),
        body: form.body.clone(),
        img_url: form.img_url.trim().to_string(),
    })
}

// ---- handlers ----

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = principal_from_headers(&state, &headers);
    let result = {
        let guard = state.store.0.lock();
        guard.list_posts().and_then(|posts| {
            posts.iter().map(|p| post_json(&guard, p)).collect::<AppResult<Vec<_>>>()
        })
    };
    match result {
        Ok(posts) => Json(json!({
            "page": "index",
            "posts": posts,
            "current_user": current_user_json(principal.as_ref()),
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn register_page() -> impl IntoResponse {
    Json(json!({ "page": "register", "flash": null }))
}

async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let req = RegisterRequest { name: form.name, email: form.email, password: form.password };
    match state.auth.register(&req) {
        Ok(resp) => (set_session_cookie(&resp.session.token), Redirect::to("/")).into_response(),
        Err(e) if e.is_recoverable() => redisplay("register", e.message()),
        Err(e) => e.into_response(),
    }
}

async fn login_page() -> impl IntoResponse {
    Json(json!({ "page": "login", "flash": null }))
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let req = LoginRequest { email: form.email, password: form.password };
    match state.auth.login(&req) {
        Ok(resp) => (set_session_cookie(&resp.session.token), Redirect::to("/")).into_response(),
        Err(e) if e.is_recoverable() => redisplay("login", e.message()),
        Err(e) => e.into_response(),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if principal_from_headers(&state, &headers).is_none() {
        return Redirect::to("/login").into_response();
    }
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        state.auth.logout(&token);
    }
    (clear_session_cookie(), Redirect::to("/login")).into_response()
}

async fn show_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Response {
    let principal = principal_from_headers(&state, &headers);
    let result = {
        let guard = state.store.0.lock();
        guard.get_post(post_id).and_then(|post| {
            let comments = guard
                .list_comments(post_id)?
                .iter()
                .map(|c| {
                    let author = guard.get_user(c.author_id)?;
                    Ok(json!({
                        "id": c.id,
                        "text": c.text,
                        "author": author.map(|u| json!({ "id": u.id, "name": u.name })),
                    }))
                })
                .collect::<AppResult<Vec<_>>>()?;
            Ok((post_json(&guard, &post)?, comments))
        })
    };
    match result {
        Ok((post, comments)) => Json(json!({
            "page": "post",
            "post": post,
            "comments": comments,
            "current_user": current_user_json(principal.as_ref()),
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn post_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    let principal = match guard(&state, &headers, Action::PostComment) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if form.comment.trim().is_empty() {
        return redisplay("post", "comment must not be empty");
    }
    let result = {
        let guard = state.store.0.lock();
        guard.add_comment(post_id, principal.user_id, form.comment.trim())
    };
    match result {
        Ok(_) => Redirect::to(&format!("/post/{}", post_id)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn new_post_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = guard(&state, &headers, Action::CreatePost) {
        return resp;
    }
    Json(json!({ "page": "new_post", "flash": null })).into_response()
}

async fn new_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PostForm>,
) -> Response {
    let principal = match guard(&state, &headers, Action::CreatePost) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let draft = match validate_post_form(&form) {
        Ok(d) => d,
        Err(e) => return redisplay("new_post", e.message()),
    };
    let result = {
        let guard = state.store.0.lock();
        guard.create_post(&draft, principal.user_id)
    };
    match result {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) if e.is_recoverable() => redisplay("new_post", e.message()),
        Err(e) => e.into_response(),
    }
}

async fn edit_post_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Response {
    if let Err(resp) = guard(&state, &headers, Action::EditPost) {
        return resp;
    }
    let result = {
        let guard = state.store.0.lock();
        guard.get_post(post_id).and_then(|post| post_json(&guard, &post))
    };
    match result {
        Ok(post) => Json(json!({ "page": "edit_post", "post": post, "flash": null })).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn edit_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Response {
    // Edit re-stamps the current principal as author; the creation date and
    // id are preserved by the repository.
    let principal = match guard(&state, &headers, Action::EditPost) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let draft = match validate_post_form(&form) {
        Ok(d) => d,
        Err(e) => return redisplay("edit_post", e.message()),
    };
    let result = {
        let guard = state.store.0.lock();
        guard.update_post(post_id, &draft, principal.user_id)
    };
    match result {
        Ok(post) => Redirect::to(&format!("/post/{}", post.id)).into_response(),
        Err(e) if e.is_recoverable() => redisplay("edit_post", e.message()),
        Err(e) => e.into_response(),
    }
}

async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Response {
    if let Err(resp) = guard(&state, &headers, Action::DeletePost) {
        return resp;
    }
    let result = {
        let guard = state.store.0.lock();
        guard.delete_post(post_id)
    };
    match result {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => e.into_response(),
    }
}

async fn about() -> impl IntoResponse {
    Json(json!({ "page": "about" }))
}

async fn contact() -> impl IntoResponse {
    Json(json!({ "page": "contact" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form(img_url: &str) -> PostForm {
        PostForm {
            title: "A title".into(),
            subtitle: "A subtitle".into(),
            img_url: img_url.into(),
            body: "<p>body</p>".into(),
        }
    }

    #[test]
    fn junk_image_url_is_rejected() {
        for junk in ["not a url", "ftp://example.com/x.png", "example.com/x.png", "https:// spaced"] {
            let err = validate_post_form(&post_form(junk)).unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "img_url {:?} must be rejected", junk);
        }
    }

    #[test]
    fn well_formed_image_url_is_accepted() {
        let draft = validate_post_form(&post_form("https://example.com/cover.jpg")).unwrap();
        assert_eq!(draft.img_url, "https://example.com/cover.jpg");
        validate_post_form(&post_form("http://example.com/cover.jpg")).unwrap();
    }

    #[test]
    fn missing_post_fields_are_rejected() {
        let mut form = post_form("https://example.com/x.png");
        form.title = "  ".into();
        let err = validate_post_form(&form).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let mut form = post_form("https://example.com/x.png");
        form.body = "".into();
        let err = validate_post_form(&form).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    fn state_with_store() -> (tempfile::TempDir, AppState) {
        let tmp = tempfile::tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        let state = AppState::new(store);
        (tmp, state)
    }

    fn session_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
        );
        headers
    }

    fn register(state: &AppState, name: &str, email: &str) -> String {
        let resp = state
            .auth
            .register(&RegisterRequest { name: name.into(), email: email.into(), password: "pw".into() })
            .unwrap();
        resp.session.token
    }

    #[test]
    fn guard_redirects_anonymous_to_login() {
        let (_tmp, state) = state_with_store();
        for action in [Action::CreatePost, Action::EditPost, Action::DeletePost, Action::PostComment] {
            let resp = guard(&state, &HeaderMap::new(), action).err().expect("anonymous is rejected");
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
            let location = resp.headers().get("location").and_then(|v| v.to_str().ok());
            assert_eq!(location, Some("/login"));
        }
    }

    #[test]
    fn guard_gives_non_admin_a_fixed_403_not_a_redirect() {
        let (_tmp, state) = state_with_store();
        register(&state, "Ada", "ada@example.com");
        let ben_token = register(&state, "Ben", "ben@example.com");
        let headers = session_headers(&ben_token);
        for action in [Action::CreatePost, Action::EditPost, Action::DeletePost] {
            let resp = guard(&state, &headers, action).err().expect("non-admin is rejected");
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
            assert!(resp.headers().get("location").is_none(), "403 must not redirect");
        }
        // Commenting stays open to any authenticated user
        let principal = guard(&state, &headers, Action::PostComment).expect("comment allowed");
        assert!(!principal.is_admin());
    }

    #[test]
    fn guard_admits_the_admin_to_post_mutations() {
        let (_tmp, state) = state_with_store();
        let ada_token = register(&state, "Ada", "ada@example.com");
        let headers = session_headers(&ada_token);
        for action in [Action::CreatePost, Action::EditPost, Action::DeletePost] {
            let principal = guard(&state, &headers, action).expect("admin allowed");
            assert!(principal.is_admin());
        }
    }

    #[test]
    fn guard_treats_a_forged_token_as_anonymous() {
        let (_tmp, state) = state_with_store();
        register(&state, "Ada", "ada@example.com");
        let headers = session_headers("forged-token");
        let resp = guard(&state, &headers, Action::DeletePost).err().expect("rejected");
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn session_cookies_carry_secure_and_httponly() {
        let set = set_session_cookie("tok");
        let v = set.get("Set-Cookie").and_then(|v| v.to_str().ok()).expect("cookie set");
        assert!(v.contains("HttpOnly"));
        assert!(v.contains("Secure"));
        assert!(v.contains("SameSite=Strict"));

        let clear = clear_session_cookie();
        let v = clear.get("Set-Cookie").and_then(|v| v.to_str().ok()).expect("cookie cleared");
        assert!(v.contains("Expires=Thu, 01 Jan 1970"));
        assert!(v.contains("HttpOnly"));
        assert!(v.contains("Secure"));
    }
}
