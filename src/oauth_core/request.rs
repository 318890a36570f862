//! The mutable request carrier that flows through the grant handler pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::types::{Arguments, Client};

/// Multi-valued, string keyed form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Form(HashMap<String, Vec<String>>);

impl Form {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Builds a form from decoded key/value pairs, keeping repeated keys.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = Self::new();
        for (k, v) in pairs {
            form.add(k, v);
        }
        form
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// First non-empty value for `key`.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces every value for `key`.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Host owned session payload.
///
/// The pipeline carries, stores and merges it but never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(Vec<u8>);

impl Session {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Encodes a host session value as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(Self)
    }

    /// Decodes a session previously built with [`Session::from_json`].
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-call carrier of client, scope and session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub requested_at: DateTime<Utc>,
    pub client: Client,
    pub scopes: Arguments,
    pub granted_scopes: Arguments,
    pub form: Form,
    pub session: Session,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// A fresh request with empty scopes and a placeholder client.
    pub fn new() -> Self {
        Self {
            requested_at: Utc::now(),
            client: Client::default(),
            scopes: Arguments::new(),
            granted_scopes: Arguments::new(),
            form: Form::new(),
            session: Session::empty(),
        }
    }

    pub fn set_scopes(&mut self, scopes: Arguments) {
        self.scopes = scopes;
    }

    /// Grants `scope`. Granting an already granted scope is a no-op.
    pub fn grant_scope(&mut self, scope: impl Into<String>) {
        self.granted_scopes.append_unique(scope);
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Folds `other` into this request.
    ///
    /// Scopes and granted scopes are appended as-is, timestamp, client and
    /// session are taken from `other`, and form entries of `other` replace
    /// entries with the same key.
    pub fn merge(&mut self, other: &Request) {
        self.scopes.extend_from(&other.scopes);
        self.granted_scopes.extend_from(&other.granted_scopes);
        self.requested_at = other.requested_at;
        self.client = other.client.clone();
        self.session = other.session.clone();
        for (key, values) in other.form.iter() {
            self.form.set(key.clone(), values.clone());
        }
    }

    /// Storage-agnostic record of this request, keyed by a token signature.
    pub fn to_record(&self, signature: impl Into<String>) -> RequestRecord {
        RequestRecord {
            signature: signature.into(),
            requested_at: self.requested_at,
            client_id: self.client.id.clone(),
            scopes: self.scopes.clone(),
            granted_scopes: self.granted_scopes.clone(),
            form: self.form.clone(),
            session: self.session.clone(),
        }
    }
}

/// Persisted shape of a token or code session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub signature: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    pub scopes: Arguments,
    pub granted_scopes: Arguments,
    pub form: Form,
    pub session: Session,
}

impl RequestRecord {
    /// Rebuilds the request with the client looked up by `client_id`.
    pub fn into_request(self, client: Client) -> Request {
        Request {
            requested_at: self.requested_at,
            client,
            scopes: self.scopes,
            granted_scopes: self.granted_scopes,
            form: self.form,
            session: self.session,
        }
    }
}

/// An authorize endpoint request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeRequest {
    pub request: Request,
    pub response_types: Arguments,
    pub redirect_uri: Option<Url>,
    pub state: String,
    handled_response_types: Arguments,
}

impl AuthorizeRequest {
    pub fn new(request: Request, response_types: Arguments) -> Self {
        Self {
            request,
            response_types,
            redirect_uri: None,
            state: String::new(),
            handled_response_types: Arguments::new(),
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_redirect_uri(mut self, uri: Url) -> Self {
        self.redirect_uri = Some(uri);
        self
    }

    pub fn set_response_type_handled(&mut self, response_type: &str) {
        self.handled_response_types.append_unique(response_type);
    }

    pub fn did_handle_all_response_types(&self) -> bool {
        self.handled_response_types.has_all(self.response_types.iter())
    }

    /// First declared response type nobody marked handled.
    pub fn unhandled_response_type(&self) -> Option<&str> {
        self.response_types.iter().find(|rt| !self.handled_response_types.has(rt))
    }
}

/// A token endpoint request.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    pub request: Request,
    pub grant_types: Arguments,
    handled_grant_types: Arguments,
    redeemed_signature: Option<String>,
}

impl AccessRequest {
    pub fn new(request: Request, grant_types: Arguments) -> Self {
        Self { request, grant_types, handled_grant_types: Arguments::new(), redeemed_signature: None }
    }

    /// Records the signature of the code or refresh token this request redeems.
    ///
    /// Set during validation, before the stored session is merged in, so the
    /// populate pass revokes exactly the token that was presented.
    pub fn set_redeemed_signature(&mut self, signature: impl Into<String>) {
        self.redeemed_signature = Some(signature.into());
    }

    pub fn redeemed_signature(&self) -> Option<&str> {
        self.redeemed_signature.as_deref()
    }

    pub fn set_grant_type_handled(&mut self, grant_type: &str) {
        self.handled_grant_types.append_unique(grant_type);
    }

    pub fn did_handle_all_grant_types(&self) -> bool {
        self.handled_grant_types.has_all(self.grant_types.iter())
    }

    pub fn unhandled_grant_type(&self) -> Option<&str> {
        self.grant_types.iter().find(|gt| !self.handled_grant_types.has(gt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_keeps_repeated_values() {
        let form = Form::from_pairs([("scope", "a"), ("scope", "b"), ("state", "")]);
        assert_eq!(form.get("scope"), Some("a"));
        assert_eq!(form.get_all("scope").len(), 2);
        assert_eq!(form.get_non_empty("state"), None);
    }

    #[test]
    fn session_is_carried_opaquely() {
        let session = Session::from_json(&serde_json::json!({"sub": "alice"})).unwrap();
        let value: serde_json::Value = session.to_json().unwrap();
        assert_eq!(value["sub"], "alice");
    }

    #[test]
    fn record_round_trip_rebuilds_request() {
        let mut req = Request::new();
        req.client = Client::new("c1");
        req.grant_scope("read");
        let record = req.to_record("sig");
        assert_eq!(record.client_id, "c1");
        let rebuilt = record.into_request(Client::new("c1"));
        assert_eq!(rebuilt, req);
    }

    #[test]
    fn unhandled_types_are_reported() {
        let mut ar = AuthorizeRequest::new(Request::new(), Arguments::from_space_delimited("code token"));
        ar.set_response_type_handled("code");
        assert!(!ar.did_handle_all_response_types());
        assert_eq!(ar.unhandled_response_type(), Some("token"));
    }
}
