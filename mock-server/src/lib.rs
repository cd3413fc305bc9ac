//! In-process fake of the chat platform REST API.
//!
//! Serves the invite and user endpoints under `/api/{version}/...` with a
//! small seeded data set. Knobs on [`MockConfig`] inject rate limits and
//! slow responses; the invite codes in [`FAULT_SERVER_ERROR`] and
//! [`FAULT_MALFORMED_BODY`] trigger broken responses.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, RawQuery, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const DEFAULT_TOKEN: &str = "test-token";

/// The account the default token belongs to (`/users/@me`).
pub const CURRENT_USER_ID: u64 = 80351110224678912;
/// A second account without avatar or banner.
pub const PLAIN_USER_ID: u64 = 175928847299117063;

pub const INVITE_CODE: &str = "discat";
pub const GUILD_ID: u64 = 290926798626357999;
pub const CHANNEL_ID: u64 = 290926798626357250;

/// `GET /invites/server-error` answers 500.
pub const FAULT_SERVER_ERROR: &str = "server-error";
/// `GET /invites/malformed-body` answers 200 with a non-JSON body.
pub const FAULT_MALFORMED_BODY: &str = "malformed-body";

const SUPPORTED_VERSIONS: [&str; 2] = ["v9", "v10"];

const UNKNOWN_INVITE: u32 = 10006;
const UNKNOWN_USER: u32 = 10013;
const INVALID_FORM_BODY: u32 = 50035;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Token accepted as `Authorization: Bot {token}`.
    pub token: String,
    /// Number of leading requests answered with 429.
    pub rate_limited_requests: u32,
    pub retry_after_secs: f64,
    /// Delay applied before every response.
    pub response_delay: Option<Duration>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN.to_string(),
            rate_limited_requests: 0,
            retry_after_secs: 0.05,
            response_delay: None,
        }
    }
}

#[derive(Debug, Clone)]
struct SeededInvite {
    body: Value,
    member_count: u64,
    presence_count: u64,
    expires_at: &'static str,
}

/// Shared server state. Clones share the same data, so tests can keep a
/// handle and inspect what the server saw.
#[derive(Clone)]
pub struct MockState {
    config: Arc<MockConfig>,
    users: Arc<RwLock<HashMap<u64, Value>>>,
    invites: Arc<RwLock<HashMap<String, SeededInvite>>>,
    rate_limit_budget: Arc<AtomicU32>,
    requests: Arc<AtomicU32>,
    audit_reasons: Arc<RwLock<Vec<String>>>,
    queries: Arc<RwLock<Vec<String>>>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        let mut users = HashMap::new();
        users.insert(CURRENT_USER_ID, current_user());
        users.insert(PLAIN_USER_ID, plain_user());

        let mut invites = HashMap::new();
        invites.insert(INVITE_CODE.to_string(), seeded_invite());

        Self {
            rate_limit_budget: Arc::new(AtomicU32::new(config.rate_limited_requests)),
            config: Arc::new(config),
            users: Arc::new(RwLock::new(users)),
            invites: Arc::new(RwLock::new(invites)),
            requests: Arc::new(AtomicU32::new(0)),
            audit_reasons: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Requests received so far, including rate-limited ones.
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// `X-Audit-Log-Reason` values in arrival order, as received.
    pub async fn audit_reasons(&self) -> Vec<String> {
        self.audit_reasons.read().await.clone()
    }

    /// Raw query strings of invite lookups; empty when none was sent.
    pub async fn invite_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    pub async fn user(&self, id: u64) -> Option<Value> {
        self.users.read().await.get(&id).cloned()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bot {}", self.config.token);
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    fn take_rate_limit(&self) -> bool {
        self.rate_limit_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

/// JSON error response in the platform's `{code, message}` shape.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    code: u32,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, code: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, 0, "401: Unauthorized")
    }

    fn not_found(code: u32, message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    fn invalid_form(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, INVALID_FORM_BODY, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.code, "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    router(MockState::default())
}

pub fn router(state: MockState) -> Router {
    Router::new()
        .route(
            "/api/{version}/invites/{code}",
            get(get_invite).delete(delete_invite),
        )
        .route("/api/{version}/users/{id}", get(get_user).patch(modify_user))
        .layer(middleware::from_fn_with_state(state.clone(), throttle))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockState::default()).await
}

pub async fn run_with(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock API listening");
    }
    axum::serve(listener, router(state)).await
}

/// Applies the configured delay and answers 429 while the budget lasts.
async fn throttle(State(state): State<MockState>, request: Request, next: Next) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    debug!(method = %request.method(), uri = %request.uri(), "request");

    if let Some(delay) = state.config.response_delay {
        tokio::time::sleep(delay).await;
    }

    if state.take_rate_limit() {
        let secs = state.config.retry_after_secs;
        let body = json!({
            "message": "You are being rate limited.",
            "retry_after": secs,
            "global": false,
        });
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&secs.ceil().to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

fn check_version(version: &str) -> Result<(), ApiFailure> {
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(ApiFailure::not_found(0, "404: Not Found"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InviteQuery {
    pub with_counts: Option<String>,
    pub with_expiration: Option<String>,
    pub guild_scheduled_event_id: Option<String>,
}

async fn get_invite(
    State(state): State<MockState>,
    Path((version, code)): Path<(String, String)>,
    Query(query): Query<InviteQuery>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiFailure> {
    check_version(&version)?;
    state.queries.write().await.push(raw.unwrap_or_default());

    match code.as_str() {
        FAULT_SERVER_ERROR => {
            return Err(ApiFailure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                0,
                "500: Internal Server Error",
            ))
        }
        FAULT_MALFORMED_BODY => {
            return Ok((StatusCode::OK, "<html>upstream hiccup</html>").into_response())
        }
        _ => {}
    }

    let invites = state.invites.read().await;
    let invite = invites
        .get(&code)
        .ok_or_else(|| ApiFailure::not_found(UNKNOWN_INVITE, "Unknown Invite"))?;

    let mut body = invite.body.clone();
    if let Some(object) = body.as_object_mut() {
        if query.with_counts.as_deref() == Some("true") {
            object.insert("approximate_member_count".into(), invite.member_count.into());
            object.insert(
                "approximate_presence_count".into(),
                invite.presence_count.into(),
            );
        }
        if query.with_expiration.as_deref() == Some("true") {
            object.insert("expires_at".into(), invite.expires_at.into());
        }
    }
    Ok(Json(body).into_response())
}

async fn delete_invite(
    State(state): State<MockState>,
    Path((version, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    check_version(&version)?;
    if !state.authorized(&headers) {
        return Err(ApiFailure::unauthorized());
    }

    if let Some(reason) = headers
        .get("x-audit-log-reason")
        .and_then(|v| v.to_str().ok())
    {
        state.audit_reasons.write().await.push(reason.to_string());
    }

    let removed = state
        .invites
        .write()
        .await
        .remove(&code)
        .ok_or_else(|| ApiFailure::not_found(UNKNOWN_INVITE, "Unknown Invite"))?;
    Ok(Json(removed.body))
}

async fn get_user(
    State(state): State<MockState>,
    Path((version, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    check_version(&version)?;
    if !state.authorized(&headers) {
        return Err(ApiFailure::unauthorized());
    }

    let id = if id == "@me" {
        CURRENT_USER_ID
    } else {
        id.parse()
            .map_err(|_| ApiFailure::not_found(UNKNOWN_USER, "Unknown User"))?
    };

    state
        .users
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::not_found(UNKNOWN_USER, "Unknown User"))
}

/// Takes the body as a raw `Value` so a missing key and an explicit `null`
/// stay distinguishable.
async fn modify_user(
    State(state): State<MockState>,
    Path((version, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(changes): Json<Value>,
) -> Result<Json<Value>, ApiFailure> {
    check_version(&version)?;
    if !state.authorized(&headers) {
        return Err(ApiFailure::unauthorized());
    }
    if id != "@me" {
        return Err(ApiFailure::new(StatusCode::FORBIDDEN, 50001, "Missing Access"));
    }
    let changes = changes
        .as_object()
        .ok_or_else(|| ApiFailure::invalid_form("Invalid Form Body"))?;

    let mut users = state.users.write().await;
    let user = users
        .get_mut(&CURRENT_USER_ID)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ApiFailure::not_found(UNKNOWN_USER, "Unknown User"))?;
    apply_changes(user, changes)?;
    Ok(Json(Value::Object(user.clone())))
}

fn apply_changes(
    user: &mut Map<String, Value>,
    changes: &Map<String, Value>,
) -> Result<(), ApiFailure> {
    if let Some(username) = changes.get("username") {
        match username.as_str() {
            Some(name) if (2..=32).contains(&name.chars().count()) => {
                user.insert("username".into(), name.into());
            }
            _ => return Err(ApiFailure::invalid_form("Invalid Form Body: username")),
        }
    }
    for field in ["avatar", "banner"] {
        match changes.get(field) {
            None => {}
            Some(Value::Null) => {
                user.insert(field.into(), Value::Null);
            }
            Some(Value::String(data)) if data.starts_with("data:image/") => {
                user.insert(field.into(), image_hash(data).into());
            }
            Some(_) => {
                return Err(ApiFailure::invalid_form(&format!(
                    "Invalid Form Body: {field}"
                )))
            }
        }
    }
    Ok(())
}

/// Deterministic stand-in for the CDN hash of an uploaded image. GIF uploads
/// get the animated `a_` prefix.
fn image_hash(data_uri: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data_uri.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let prefix = if data_uri.starts_with("data:image/gif") {
        "a_"
    } else {
        ""
    };
    format!("{prefix}{hash:016x}{:016x}", hash.rotate_left(17))
}

fn current_user() -> Value {
    json!({
        "id": CURRENT_USER_ID.to_string(),
        "username": "Nelly",
        "discriminator": "1337",
        "avatar": "8342729096ea3675442027381ff50dfe",
        "bot": true,
        "mfa_enabled": true,
        "banner": "a_06c16474723fe537c283b8efa61a30c8",
        "accent_color": 16711680,
        "flags": 64,
        "premium_type": 1,
        "public_flags": 64,
    })
}

fn plain_user() -> Value {
    json!({
        "id": PLAIN_USER_ID.to_string(),
        "username": "plain",
        "discriminator": "0042",
        "avatar": null,
    })
}

fn seeded_invite() -> SeededInvite {
    SeededInvite {
        body: json!({
            "code": INVITE_CODE,
            "guild": { "id": GUILD_ID.to_string(), "name": "Discat Lounge" },
            "channel": { "id": CHANNEL_ID.to_string(), "name": "general", "type": 0 },
            "inviter": current_user(),
        }),
        member_count: 120,
        presence_count: 42,
        expires_at: "2030-01-01T00:00:00+00:00",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_keys_leave_fields_alone() {
        let mut user = current_user().as_object().cloned().unwrap();
        let before = user.clone();
        apply_changes(&mut user, &changes(json!({}))).unwrap();
        assert_eq!(user, before);
    }

    #[test]
    fn null_clears_the_avatar() {
        let mut user = current_user().as_object().cloned().unwrap();
        apply_changes(&mut user, &changes(json!({ "avatar": null }))).unwrap();
        assert_eq!(user["avatar"], Value::Null);
        assert_eq!(user["banner"], current_user()["banner"]);
    }

    #[test]
    fn null_username_is_rejected() {
        let mut user = current_user().as_object().cloned().unwrap();
        let err = apply_changes(&mut user, &changes(json!({ "username": null }))).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, INVALID_FORM_BODY);
    }

    #[test]
    fn gif_uploads_hash_as_animated() {
        assert!(image_hash("data:image/gif;base64,R0lG").starts_with("a_"));
        assert!(!image_hash("data:image/png;base64,iVBO").starts_with("a_"));
        assert_eq!(image_hash("data:image/png;base64,x").len(), 32);
    }

    #[test]
    fn rate_limit_budget_runs_out() {
        let state = MockState::new(MockConfig {
            rate_limited_requests: 2,
            ..Default::default()
        });
        assert!(state.take_rate_limit());
        assert!(state.take_rate_limit());
        assert!(!state.take_rate_limit());
    }

    #[test]
    fn authorization_requires_bot_scheme() {
        let state = MockState::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("test-token"));
        assert!(!state.authorized(&headers));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bot test-token"),
        );
        assert!(state.authorized(&headers));
    }
}
