//! Response accumulators filled in by the grant handlers.

use serde_json::{Map, Value};
use url::Url;

/// Output of the authorize endpoint.
///
/// Implicit flows write to the fragment channel, code flows to the query
/// channel. Both keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizeResponse {
    fragment: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

fn upsert(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => pairs.push((key, value)),
    }
}

impl AuthorizeResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fragment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        upsert(&mut self.fragment, key.into(), value.into());
    }

    pub fn add_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        upsert(&mut self.query, key.into(), value.into());
    }

    pub fn fragment(&self) -> &[(String, String)] {
        &self.fragment
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn get_fragment(&self, key: &str) -> Option<&str> {
        self.fragment.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Renders both channels onto the client's redirect URI.
    pub fn redirect_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        if !self.fragment.is_empty() {
            let fragment = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.fragment.iter())
                .finish();
            url.set_fragment(Some(&fragment));
        }
        url
    }
}

/// Output of the token endpoint, rendered as a JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessResponse {
    body: Vec<(String, Value)>,
}

impl AccessResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.body.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.body.push((key, value)),
        }
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.set_extra("access_token", token.into());
    }

    pub fn set_token_type(&mut self, token_type: impl Into<String>) {
        self.set_extra("token_type", token_type.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token").and_then(Value::as_str)
    }

    pub fn token_type(&self) -> Option<&str> {
        self.get("token_type").and_then(Value::as_str)
    }

    pub fn body(&self) -> &[(String, Value)] {
        &self.body
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.body.iter().cloned().collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_keeps_insertion_order() {
        let mut resp = AuthorizeResponse::new();
        resp.add_fragment("b", "1");
        resp.add_fragment("a", "2");
        resp.add_fragment("b", "3");
        let keys: Vec<_> = resp.fragment().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(resp.get_fragment("b"), Some("3"));
    }

    #[test]
    fn redirect_url_places_channels() {
        let mut resp = AuthorizeResponse::new();
        resp.add_query("code", "abc");
        resp.add_fragment("access_token", "t");
        let url = resp.redirect_url(&Url::parse("https://app.local/cb?x=1").unwrap());
        assert_eq!(url.query(), Some("x=1&code=abc"));
        assert_eq!(url.fragment(), Some("access_token=t"));
    }
}
