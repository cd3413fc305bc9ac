//! Versioned API routes.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{ApiError, ConfigError};
use crate::http::HttpMethod;

/// Public API host. Routes render against `{BASE_URL}/v{N}`.
pub const BASE_URL: &str = "https://discord.com/api";

/// Characters left untouched in a route path: unreserved characters, `/`
/// and `@` (as in `/users/@me`).
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'@')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters left untouched in a single path parameter. Unlike
/// `PATH_ENCODE_SET`, `/` is encoded so a parameter cannot add segments.
const SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'@')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encodes one path parameter so it stays a single segment.
///
/// Empty values and dot segments (`.`, `..`) are rejected: URL parsers
/// resolve them even when percent-encoded.
pub fn encode_segment(raw: &str) -> Result<String, ApiError> {
    if raw.is_empty() || raw == "." || raw == ".." {
        return Err(ApiError::InvalidArgument(format!(
            "{raw:?} is not a valid path parameter"
        )));
    }
    Ok(utf8_percent_encode(raw, SEGMENT_ENCODE_SET).to_string())
}

/// Supported API versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApiVersion {
    #[default]
    V9,
    V10,
}

impl ApiVersion {
    pub fn number(self) -> u8 {
        match self {
            ApiVersion::V9 => 9,
            ApiVersion::V10 => 10,
        }
    }
}

impl TryFrom<u64> for ApiVersion {
    type Error = ConfigError;

    /// `0` selects the default version.
    fn try_from(version: u64) -> Result<Self, Self::Error> {
        match version {
            0 | 9 => Ok(ApiVersion::V9),
            10 => Ok(ApiVersion::V10),
            v if v > 10 => Err(ConfigError::VersionTooNew(v)),
            v => Err(ConfigError::VersionDiscontinued(v)),
        }
    }
}

impl TryFrom<u8> for ApiVersion {
    type Error = ConfigError;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        ApiVersion::try_from(u64::from(version))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// One API call: method, encoded path and pinned version.
///
/// Immutable once built, so a single `Route` can be shared across concurrent
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    method: HttpMethod,
    path: String,
    api_version: ApiVersion,
    url: String,
}

impl Route {
    /// Builds a route from a raw version number.
    ///
    /// Fails for versions above 10 and for 1 through 8. `0` resolves to 9.
    pub fn new(method: HttpMethod, path: &str, api_version: u8) -> Result<Self, ConfigError> {
        Ok(Self::with_version(
            method,
            path,
            ApiVersion::try_from(api_version)?,
        ))
    }

    pub fn with_version(method: HttpMethod, path: &str, api_version: ApiVersion) -> Self {
        let path = utf8_percent_encode(path, PATH_ENCODE_SET).to_string();
        Self::from_encoded(method, path, api_version)
    }

    /// Builds a route from a template whose `{}` placeholders are filled,
    /// in order, with `params` encoded by [`encode_segment`].
    ///
    /// `with_params(Get, "/invites/{}", &["a/b"], v)` targets
    /// `/invites/a%2Fb`, never a nested resource.
    pub fn with_params(
        method: HttpMethod,
        template: &str,
        params: &[&str],
        api_version: ApiVersion,
    ) -> Result<Self, ApiError> {
        let pieces: Vec<&str> = template.split("{}").collect();
        if pieces.len() != params.len() + 1 {
            return Err(ApiError::InvalidArgument(format!(
                "route template {template:?} expects {} parameter(s), got {}",
                pieces.len() - 1,
                params.len()
            )));
        }

        let mut path = utf8_percent_encode(pieces[0], PATH_ENCODE_SET).to_string();
        for (param, literal) in params.iter().zip(&pieces[1..]) {
            path.push_str(&encode_segment(param)?);
            path.extend(utf8_percent_encode(literal, PATH_ENCODE_SET));
        }
        Ok(Self::from_encoded(method, path, api_version))
    }

    fn from_encoded(method: HttpMethod, path: String, api_version: ApiVersion) -> Self {
        let url = render_url(BASE_URL, api_version, &path);
        Self {
            method,
            path,
            api_version,
            url,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The percent-encoded path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// The fully qualified URL against the public API host.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The same route rendered against another API root, e.g. a local fake.
    pub fn url_on(&self, base: &str) -> String {
        render_url(base, self.api_version, &self.path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn render_url(base: &str, version: ApiVersion, path: &str) -> String {
    format!("{}/{}{}", base.trim_end_matches('/'), version, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_versions_render_into_url() {
        for v in [9u8, 10] {
            let route = Route::new(HttpMethod::Get, "/users/1", v).unwrap();
            assert!(route.url().contains(&format!("/v{v}/")), "{}", route.url());
        }
    }

    #[test]
    fn zero_resolves_to_default() {
        let zero = Route::new(HttpMethod::Get, "/gateway", 0).unwrap();
        let nine = Route::new(HttpMethod::Get, "/gateway", 9).unwrap();
        assert_eq!(zero, nine);
        assert_eq!(zero.api_version(), ApiVersion::V9);
    }

    #[test]
    fn newer_versions_are_rejected() {
        for v in [11u8, 12, 255] {
            let err = Route::new(HttpMethod::Get, "/gateway", v).unwrap_err();
            assert!(matches!(err, ConfigError::VersionTooNew(n) if n == u64::from(v)));
        }
    }

    #[test]
    fn discontinued_versions_are_rejected() {
        for v in 1u8..=8 {
            let err = Route::new(HttpMethod::Get, "/gateway", v).unwrap_err();
            assert!(matches!(err, ConfigError::VersionDiscontinued(n) if n == u64::from(v)));
        }
    }

    #[test]
    fn reserved_characters_are_encoded() {
        let route = Route::new(HttpMethod::Get, "/invites/some code?x#y", 10).unwrap();
        assert_eq!(route.path(), "/invites/some%20code%3Fx%23y");
        assert_eq!(
            route.url(),
            "https://discord.com/api/v10/invites/some%20code%3Fx%23y"
        );
    }

    #[test]
    fn unreserved_characters_survive() {
        let route = Route::new(HttpMethod::Delete, "/invites/a-b_c.d~e", 9).unwrap();
        assert_eq!(route.path(), "/invites/a-b_c.d~e");
    }

    #[test]
    fn at_sign_is_kept() {
        let route = Route::new(HttpMethod::Get, "/users/@me", 10).unwrap();
        assert_eq!(route.url(), "https://discord.com/api/v10/users/@me");
    }

    #[test]
    fn params_cannot_escape_their_segment() {
        let route = Route::with_params(
            HttpMethod::Delete,
            "/invites/{}",
            &["../users/@me"],
            ApiVersion::V9,
        )
        .unwrap();
        assert_eq!(route.path(), "/invites/..%2Fusers%2F@me");
        let parsed = url::Url::parse(route.url()).unwrap();
        assert_eq!(parsed.path(), "/api/v9/invites/..%2Fusers%2F@me");
    }

    #[test]
    fn params_encode_reserved_and_unicode() {
        let route =
            Route::with_params(HttpMethod::Get, "/invites/{}", &["a b?#%é"], ApiVersion::V10)
                .unwrap();
        assert_eq!(route.path(), "/invites/a%20b%3F%23%25%C3%A9");
    }

    #[test]
    fn dot_and_empty_params_are_rejected() {
        for raw in ["", ".", ".."] {
            let err = Route::with_params(HttpMethod::Get, "/invites/{}", &[raw], ApiVersion::V9)
                .unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)), "{raw:?}");
        }
    }

    #[test]
    fn placeholder_count_must_match() {
        let err =
            Route::with_params(HttpMethod::Get, "/users/{}/{}", &["1"], ApiVersion::V9).unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn url_on_swaps_the_host() {
        let route = Route::new(HttpMethod::Get, "/users/42", 10).unwrap();
        assert_eq!(
            route.url_on("http://127.0.0.1:3000/api/"),
            "http://127.0.0.1:3000/api/v10/users/42"
        );
    }
}
