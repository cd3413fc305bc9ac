//! Async HTTP client for the platform REST API.
//!
//! # Design
//! A request goes through three steps. `build_request` turns a `Route` plus
//! `RequestOptions` into an `HttpRequest`. `send` performs the network round
//! trip. `parse_response` classifies the `HttpResponse`. Only `send` does I/O,
//! so the other two are plain functions with unit tests.
//!
//! The connection pool is created eagerly. `close` drops it and the next
//! request (or an explicit `recreate_session`) rebuilds it. The rebuild runs
//! under a write lock with a second check, so racing callers build one pool.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError, ErrorBody};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::route::{ApiVersion, Route};

/// Wait used when a 429 carries no usable retry hint.
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

const REASON_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b' ')
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Per-request options.
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Overrides the configured token for this request.
    pub token: Option<String>,
    /// Encoded as the JSON request body.
    pub json: Option<Value>,
    pub query: Vec<(String, String)>,
    /// Audit-log reason, sent as `X-Audit-Log-Reason`.
    pub reason: Option<String>,
    /// Overrides the configured timeout for this request.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Encodes any serializable payload as the JSON body.
    pub fn with_body<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let json = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.json = Some(json);
        Ok(self)
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A decoded response: the JSON body and the status it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
}

impl ApiResponse {
    pub fn into_parts(self) -> (Value, u16) {
        (self.data, self.status)
    }
}

/// Shared, thread-safe client. Clone the surrounding `Arc` to share it.
pub struct HttpClient {
    config: ClientConfig,
    user_agent: String,
    cdn: Arc<str>,
    session: RwLock<Option<reqwest::Client>>,
    in_flight: Semaphore,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        url::Url::parse(&config.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(config.base_url.clone()))?;
        let session = build_session(&config)?;
        Ok(Self {
            user_agent: default_user_agent(),
            cdn: Arc::from(config.cdn_url.as_str()),
            in_flight: Semaphore::new(config.max_concurrent_requests.max(1)),
            session: RwLock::new(Some(session)),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn api_version(&self) -> ApiVersion {
        self.config.api_version
    }

    /// CDN root handed to assets built from this client's responses.
    pub fn cdn(&self) -> Arc<str> {
        Arc::clone(&self.cdn)
    }

    /// A route pinned to the configured API version.
    pub fn route(&self, method: HttpMethod, path: &str) -> Route {
        Route::with_version(method, path, self.config.api_version)
    }

    /// Like [`HttpClient::route`], with `{}` placeholders filled by
    /// single-segment parameters. See [`Route::with_params`].
    pub fn route_with(
        &self,
        method: HttpMethod,
        template: &str,
        params: &[&str],
    ) -> Result<Route, ApiError> {
        Route::with_params(method, template, params, self.config.api_version)
    }

    /// Drops the connection pool. Requests already in flight keep their
    /// handle and complete normally.
    pub async fn close(&self) {
        *self.session.write().await = None;
        debug!("HTTP session closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.session.read().await.is_none()
    }

    /// Rebuilds the pool if it was closed. Returns whether a new one was built.
    pub async fn recreate_session(&self) -> Result<bool, ApiError> {
        let mut guard = self.session.write().await;
        if guard.is_some() {
            return Ok(false);
        }
        *guard = Some(build_session(&self.config)?);
        debug!("HTTP session recreated");
        Ok(true)
    }

    async fn session(&self) -> Result<reqwest::Client, ApiError> {
        if let Some(http) = self.session.read().await.as_ref() {
            return Ok(http.clone());
        }
        let mut guard = self.session.write().await;
        if let Some(http) = guard.as_ref() {
            return Ok(http.clone());
        }
        let http = build_session(&self.config)?;
        *guard = Some(http.clone());
        debug!("HTTP session recreated on demand");
        Ok(http)
    }

    pub fn build_request(
        &self,
        route: &Route,
        options: &RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut url = url::Url::parse(&route.url_on(&self.config.base_url))
            .map_err(|_| ConfigError::InvalidBaseUrl(self.config.base_url.clone()))?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(options.query.iter());
        }

        let mut headers = vec![("User-Agent".to_string(), self.user_agent.clone())];

        if let Some(token) = options.token.as_ref().or(self.config.token.as_ref()) {
            let value = format!("Bot {token}");
            reqwest::header::HeaderValue::from_str(&value)
                .map_err(|_| ConfigError::InvalidHeader("Authorization"))?;
            headers.push(("Authorization".to_string(), value));
        }

        if let Some(reason) = &options.reason {
            headers.push((
                "X-Audit-Log-Reason".to_string(),
                utf8_percent_encode(reason, REASON_ENCODE_SET).to_string(),
            ));
        }

        let body = match &options.json {
            Some(json) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(json).map_err(|e| ApiError::Encode(e.to_string()))?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: route.method(),
            url: url.into(),
            headers,
            body,
        })
    }

    /// Performs the network round trip. Any status is returned as data.
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let http = self.session().await?;

        let mut builder = http.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(ApiError::from_reqwest)?;
        debug!(status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Maps a response to its decoded body or the matching error.
    ///
    /// Empty 2xx bodies decode to `Value::Null`. Non-2xx statuses outside
    /// 4xx/5xx are reported as client errors.
    pub fn parse_response(response: HttpResponse) -> Result<ApiResponse, ApiError> {
        let status = response.status;
        match status {
            200..=299 => {
                let data = if response.body.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&response.body).map_err(ApiError::decode)?
                };
                Ok(ApiResponse { data, status })
            }
            429 => Err(rate_limit_error(&response)),
            404 => Err(ApiError::NotFound {
                body: ErrorBody::parse(&response.body),
            }),
            500..=599 => Err(ApiError::Server {
                status,
                body: ErrorBody::parse(&response.body),
            }),
            _ => Err(ApiError::Client {
                status,
                body: ErrorBody::parse(&response.body),
            }),
        }
    }

    /// Executes one API call and returns the decoded `(data, status)` pair.
    ///
    /// 429 responses are retried after the advertised delay, within the
    /// configured limits. Dropping the future cancels the request.
    #[instrument(skip(self, route, options), fields(route = %route))]
    pub async fn request(
        &self,
        route: &Route,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let request = self.build_request(route, &options)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| ApiError::Transport {
                message: "client is shut down".to_string(),
                source: None,
            })?;

        let mut attempt = 0;
        loop {
            let response = tokio::time::timeout(timeout, self.send(&request))
                .await
                .map_err(|_| ApiError::Timeout)??;

            match Self::parse_response(response) {
                Err(ApiError::RateLimited {
                    retry_after,
                    global,
                    ..
                }) if attempt < self.config.max_rate_limit_retries
                    && retry_after <= self.config.max_retry_after =>
                {
                    attempt += 1;
                    warn!(?retry_after, global, attempt, "rate limited, backing off");
                    tokio::time::sleep(retry_after).await;
                }
                other => return other,
            }
        }
    }
}

fn build_session(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(config.timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(ConfigError::Http)
}

/// Compiler and transport versions come from `build.rs`.
fn default_user_agent() -> String {
    format!(
        "DiscordBot ({}, {}) Rust/{} reqwest/{}",
        env!("CARGO_PKG_REPOSITORY"),
        env!("CARGO_PKG_VERSION"),
        env!("DISCAT_RUSTC_VERSION"),
        env!("DISCAT_REQWEST_VERSION"),
    )
}

fn rate_limit_error(response: &HttpResponse) -> ApiError {
    let body = ErrorBody::parse(&response.body);
    let json: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);

    let retry_after = json
        .get("retry_after")
        .and_then(Value::as_f64)
        .or_else(|| {
            response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<f64>().ok())
        })
        .map(|secs| match Duration::try_from_secs_f64(secs) {
            Ok(wait) => wait,
            // Too large to represent: never worth waiting for.
            Err(_) if secs > 0.0 => Duration::MAX,
            Err(_) => FALLBACK_RETRY_AFTER,
        })
        .unwrap_or(FALLBACK_RETRY_AFTER);

    let global = json
        .get("global")
        .and_then(Value::as_bool)
        .or_else(|| {
            response
                .header("X-RateLimit-Global")
                .map(|v| v.eq_ignore_ascii_case("true"))
        })
        .unwrap_or(false);

    ApiError::RateLimited {
        retry_after,
        global,
        body,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> HttpClient {
        HttpClient::new(
            ClientConfig::default()
                .with_base_url("http://localhost:3000/api")
                .with_api_version(ApiVersion::V10),
        )
        .unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn user_agent_names_library_runtime_and_transport() {
        let ua = client().user_agent().to_string();
        assert!(ua.starts_with("DiscordBot ("), "{ua}");
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.contains(concat!(" Rust/", env!("DISCAT_RUSTC_VERSION"), " ")));
        assert!(ua.ends_with(concat!("reqwest/", env!("DISCAT_REQWEST_VERSION"))));
        // The compiler's full version, not the declared minimum.
        let rustc = env!("DISCAT_RUSTC_VERSION");
        assert_eq!(rustc.split('.').count(), 3, "{rustc}");
    }

    #[test]
    fn build_request_without_options_sets_only_user_agent() {
        let c = client();
        let route = c.route(HttpMethod::Get, "/users/80");
        let req = c.build_request(&route, &RequestOptions::new()).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/v10/users/80");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("user-agent"), Some(c.user_agent()));
        assert!(req.body.is_none());
    }

    #[test]
    fn build_request_adds_bot_authorization() {
        let c = client();
        let route = c.route(HttpMethod::Get, "/users/@me");
        let req = c
            .build_request(&route, &RequestOptions::new().with_token("abc.def"))
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("Bot abc.def"));
    }

    #[test]
    fn request_token_overrides_configured_token() {
        let c = HttpClient::new(ClientConfig::default().with_token("configured")).unwrap();
        let route = c.route(HttpMethod::Get, "/users/@me");

        let req = c.build_request(&route, &RequestOptions::new()).unwrap();
        assert_eq!(req.header("Authorization"), Some("Bot configured"));

        let req = c
            .build_request(&route, &RequestOptions::new().with_token("override"))
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("Bot override"));
    }

    #[test]
    fn token_with_control_characters_is_rejected() {
        let c = client();
        let route = c.route(HttpMethod::Get, "/users/@me");
        let err = c
            .build_request(&route, &RequestOptions::new().with_token("bad\ntoken"))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Config(ConfigError::InvalidHeader("Authorization"))
        ));
    }

    #[test]
    fn build_request_encodes_json_body() {
        let c = client();
        let route = c.route(HttpMethod::Patch, "/users/@me");
        let req = c
            .build_request(
                &route,
                &RequestOptions::new().with_json(json!({ "username": "nelly", "avatar": null })),
            )
            .unwrap();
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({ "username": "nelly", "avatar": null }));
    }

    #[test]
    fn build_request_appends_query_and_reason() {
        let c = client();
        let route = c.route(HttpMethod::Delete, "/invites/abc");
        let options = RequestOptions::new()
            .with_query(vec![("with_counts".to_string(), "true".to_string())])
            .with_reason(Some("spam & abuse".to_string()));
        let req = c.build_request(&route, &options).unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/api/v10/invites/abc?with_counts=true"
        );
        assert_eq!(req.header("X-Audit-Log-Reason"), Some("spam %26 abuse"));
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HttpClient::new(ClientConfig::default().with_base_url("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::Config(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn parse_success_returns_data_and_status() {
        let parsed = HttpClient::parse_response(response(200, r#"{"id":"80"}"#)).unwrap();
        assert_eq!(parsed.into_parts(), (json!({ "id": "80" }), 200));
    }

    #[test]
    fn parse_empty_success_is_null() {
        let parsed = HttpClient::parse_response(response(204, "")).unwrap();
        assert_eq!(parsed.data, Value::Null);
        assert_eq!(parsed.status, 204);
    }

    #[test]
    fn parse_invalid_json_is_decode_error() {
        let err = HttpClient::parse_response(response(200, "<html>")).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn parse_not_found() {
        let err = HttpClient::parse_response(response(
            404,
            r#"{"message":"Unknown Invite","code":10006}"#,
        ))
        .unwrap_err();
        match err {
            ApiError::NotFound { body } => assert_eq!(body.code, Some(10006)),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn parse_client_and_server_errors() {
        let err = HttpClient::parse_response(response(403, r#"{"message":"Missing Access","code":50001}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Client { status: 403, .. }));
        assert!(!err.is_retryable());

        let err = HttpClient::parse_response(response(502, "bad gateway")).unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn parse_rate_limit_from_body() {
        let err = HttpClient::parse_response(response(
            429,
            r#"{"message":"You are being rate limited.","retry_after":0.25,"global":true}"#,
        ))
        .unwrap_err();
        match err {
            ApiError::RateLimited {
                retry_after,
                global,
                ..
            } => {
                assert_eq!(retry_after, Duration::from_millis(250));
                assert!(global);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn huge_retry_after_saturates_and_negative_uses_fallback() {
        let cases = [
            (r#"{"retry_after":1e30,"global":false}"#, Duration::MAX),
            (r#"{"retry_after":-3,"global":false}"#, FALLBACK_RETRY_AFTER),
        ];
        for (body, expected) in cases {
            match HttpClient::parse_response(response(429, body)).unwrap_err() {
                ApiError::RateLimited { retry_after, .. } => {
                    assert_eq!(retry_after, expected, "{body}");
                }
                other => panic!("expected RateLimited, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_rate_limit_falls_back_to_headers() {
        let resp = HttpResponse {
            status: 429,
            headers: vec![
                ("retry-after".to_string(), "2".to_string()),
                ("x-ratelimit-global".to_string(), "true".to_string()),
            ],
            body: String::new(),
        };
        match HttpClient::parse_response(resp).unwrap_err() {
            ApiError::RateLimited {
                retry_after,
                global,
                ..
            } => {
                assert_eq!(retry_after, Duration::from_secs(2));
                assert!(global);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn body_round_trips_through_the_wire_format() {
        let c = client();
        let original = json!({
            "username": "nelly",
            "flags": 0,
            "bot": false,
            "nested": { "list": [1, 2, 3], "none": null }
        });
        let route = c.route(HttpMethod::Patch, "/users/@me");
        let req = c
            .build_request(&route, &RequestOptions::new().with_json(original.clone()))
            .unwrap();
        let echoed = HttpClient::parse_response(response(200, req.body.as_deref().unwrap()))
            .unwrap();
        assert_eq!(echoed.data, original);
    }

    #[tokio::test]
    async fn close_and_recreate_session() {
        let c = client();
        assert!(!c.is_closed().await);
        assert!(!c.recreate_session().await.unwrap());

        c.close().await;
        assert!(c.is_closed().await);
        assert!(c.recreate_session().await.unwrap());
        assert!(!c.is_closed().await);
    }
}
