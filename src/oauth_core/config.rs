//! Provider configuration: token lifespans and grant policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the grant handlers.
///
/// Lifespans are (de)serialized as whole seconds so hosts can load this from
/// any serde format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    #[serde(with = "duration_secs")]
    pub access_token_lifespan: Duration,
    #[serde(with = "duration_secs")]
    pub authorize_code_lifespan: Duration,
    /// `None` disables refresh token expiry.
    #[serde(with = "opt_duration_secs")]
    pub refresh_token_lifespan: Option<Duration>,
    /// Mint a new refresh token on every refresh and delete the old one.
    pub rotate_refresh_tokens: bool,
    /// Scope that must be granted before a refresh token is issued.
    pub refresh_token_scope: String,
    /// Public clients must send a PKCE challenge with authorization code requests.
    pub enforce_pkce: bool,
    /// Value of the `iss` claim for JWT tokens.
    pub issuer: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            access_token_lifespan: Duration::from_secs(3600),
            authorize_code_lifespan: Duration::from_secs(600),
            refresh_token_lifespan: Some(Duration::from_secs(30 * 24 * 3600)),
            rotate_refresh_tokens: true,
            refresh_token_scope: "offline".to_string(),
            enforce_pkce: true,
            issuer: None,
        }
    }
}

impl OAuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token_lifespan(mut self, lifespan: Duration) -> Self {
        self.access_token_lifespan = lifespan;
        self
    }

    pub fn authorize_code_lifespan(mut self, lifespan: Duration) -> Self {
        self.authorize_code_lifespan = lifespan;
        self
    }

    pub fn refresh_token_lifespan(mut self, lifespan: Option<Duration>) -> Self {
        self.refresh_token_lifespan = lifespan;
        self
    }

    pub fn rotate_refresh_tokens(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    pub fn refresh_token_scope(mut self, scope: impl Into<String>) -> Self {
        self.refresh_token_scope = scope.into();
        self
    }

    pub fn enforce_pkce(mut self, enforce: bool) -> Self {
        self.enforce_pkce = enforce;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod opt_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let raw = r#"{"access_token_lifespan": 60, "refresh_token_lifespan": null}"#;
        let cfg: OAuthConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.access_token_lifespan, Duration::from_secs(60));
        assert_eq!(cfg.refresh_token_lifespan, None);
        assert_eq!(cfg.authorize_code_lifespan, Duration::from_secs(600));
        assert!(cfg.rotate_refresh_tokens);
    }
}
