//! OAuth2 core primitives: Client, Arguments and the boundary error type.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Response type of the implicit flow.
pub const RESPONSE_TYPE_TOKEN: &str = "token";
/// Response type of the authorization code flow.
pub const RESPONSE_TYPE_CODE: &str = "code";

pub const GRANT_TYPE_IMPLICIT: &str = "implicit";
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";
pub const GRANT_TYPE_PASSWORD: &str = "password";
pub const GRANT_TYPE_REFRESH_TOKEN: &str = "refresh_token";

/// Token type tag placed in every token response.
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// An ordered list of protocol arguments (scopes, response types, grant types).
///
/// Input order and duplicates are preserved; callers that need set semantics
/// go through [`Arguments::append_unique`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Vec<String>);

impl Arguments {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Splits a space delimited form value such as `scope` or `response_type`.
    pub fn from_space_delimited(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_owned).collect())
    }

    /// True if `item` is one of the arguments.
    pub fn has(&self, item: &str) -> bool {
        self.0.iter().any(|a| a == item)
    }

    /// True if every item of `items` is present.
    pub fn has_all<'a>(&self, items: impl IntoIterator<Item = &'a str>) -> bool {
        items.into_iter().all(|item| self.has(item))
    }

    /// True if the arguments consist of exactly one entry equal to `item`.
    pub fn exact(&self, item: &str) -> bool {
        self.0.len() == 1 && self.0[0] == item
    }

    pub fn push(&mut self, item: impl Into<String>) {
        self.0.push(item.into());
    }

    /// Appends `item` unless it is already present.
    pub fn append_unique(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.has(&item) {
            self.0.push(item);
        }
    }

    pub fn extend_from(&mut self, other: &Arguments) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Arguments {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Represents a registered OAuth 2.0 client application.
///
/// Clients are owned by the client store and are read-only while a request
/// moves through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier.
    pub id: String,
    /// Hashed client secret. Only the client store interprets it.
    #[serde(default)]
    pub hashed_secret: Option<String>,
    /// Allowed redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Response types the client may request at the authorize endpoint.
    #[serde(default)]
    pub response_types: Arguments,
    /// Grant types the client may use.
    #[serde(default)]
    pub grant_types: Arguments,
    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: Arguments,
    /// Public clients cannot keep a secret and authenticate by id only.
    #[serde(default)]
    pub public: bool,
}

impl Client {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_secret_hash(mut self, hashed_secret: impl Into<String>) -> Self {
        self.hashed_secret = Some(hashed_secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    pub fn with_response_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.response_types = types.into_iter().collect();
        self
    }

    pub fn with_grant_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.grant_types = types.into_iter().collect();
        self
    }

    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

/// OAuth2 errors surfaced at the boundary.
///
/// Every variant maps to exactly one RFC 6749 error code. The `String`
/// payloads carry internal detail that is logged, and for client-input
/// errors also used as the human readable description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_client: {0}")]
    InvalidClient(String),
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),
    #[error("invalid_scope: {0}")]
    InvalidScope(String),
    #[error("server_error: {0}")]
    ServerError(String),
    /// The host cancelled the request between two handler invocations.
    #[error("request cancelled")]
    Cancelled,
}

impl OAuthError {
    /// The RFC 6749 error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::InvalidClient(_) => "invalid_client",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::UnauthorizedClient(_) => "unauthorized_client",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::ServerError(_) | OAuthError::Cancelled => "server_error",
        }
    }

    /// HTTP status the host should answer with when the error is returned from
    /// the token endpoint.
    pub fn status_code(&self) -> u16 {
        match self {
            OAuthError::InvalidClient(_) => 401,
            OAuthError::ServerError(_) | OAuthError::Cancelled => 500,
            _ => 400,
        }
    }

    /// Human readable description. Server side detail is never exposed.
    pub fn description(&self) -> String {
        match self {
            OAuthError::ServerError(_) => "The authorization server encountered an unexpected condition".to_string(),
            OAuthError::Cancelled => "The request was cancelled".to_string(),
            OAuthError::InvalidClient(_) => "Client authentication failed".to_string(),
            OAuthError::InvalidRequest(d)
            | OAuthError::InvalidGrant(d)
            | OAuthError::UnauthorizedClient(d)
            | OAuthError::UnsupportedGrantType(d)
            | OAuthError::UnsupportedResponseType(d)
            | OAuthError::InvalidScope(d) => d.clone(),
        }
    }

    /// Renders the error as the JSON body of a token endpoint error response.
    pub fn to_json(&self) -> Value {
        json!({ "error": self.error_code(), "error_description": self.description() })
    }

    /// Key/value pairs for delivering the error through a redirect.
    pub fn to_query_pairs(&self, state: Option<&str>) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("error".to_string(), self.error_code().to_string()),
            ("error_description".to_string(), self.description()),
        ];
        if let Some(state) = state.filter(|s| !s.is_empty()) {
            pairs.push(("state".to_string(), state.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_single_match() {
        let args = Arguments::from_space_delimited("token");
        assert!(args.exact("token"));
        let args = Arguments::from_space_delimited("token id_token");
        assert!(!args.exact("token"));
        assert!(args.has("id_token"));
        assert!(!Arguments::new().exact("token"));
    }

    #[test]
    fn append_unique_skips_duplicates() {
        let mut args = Arguments::new();
        args.append_unique("read");
        args.append_unique("read");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn server_error_hides_detail() {
        let err = OAuthError::ServerError("db connection refused".into());
        let body = err.to_json();
        assert_eq!(body["error"], "server_error");
        assert!(!body["error_description"].as_str().unwrap().contains("db"));
    }
}
