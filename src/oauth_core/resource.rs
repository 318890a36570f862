//! Validators for already issued access tokens presented to resource servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::handlers::helper::is_expired;
use super::oauth_provider::AccessTokenStorage;
use super::request::Request;
use super::strategy::{TokenErrorKind, TokenKind, TokenStrategy};
use super::types::OAuthError;

/// Link in the authorized request validator chain.
///
/// `Ok(None)` declines the token so the next validator gets a turn.
#[async_trait]
pub trait AuthorizedRequestValidator: Send + Sync + 'static {
    async fn validate_authorized_request(&self, token: &str) -> Result<Option<Request>, OAuthError>;
}

/// Verifies access tokens minted by a [`TokenStrategy`] and loads their session.
pub struct CoreValidator {
    pub access_token_strategy: Arc<dyn TokenStrategy>,
    pub access_token_storage: Arc<dyn AccessTokenStorage>,
    pub access_token_lifespan: Duration,
}

impl CoreValidator {
    pub fn new(
        strategy: Arc<dyn TokenStrategy>,
        storage: Arc<dyn AccessTokenStorage>,
        access_token_lifespan: Duration,
    ) -> Self {
        Self { access_token_strategy: strategy, access_token_storage: storage, access_token_lifespan }
    }
}

#[async_trait]
impl AuthorizedRequestValidator for CoreValidator {
    #[instrument(skip_all, level = "debug")]
    async fn validate_authorized_request(&self, token: &str) -> Result<Option<Request>, OAuthError> {
        let signature = match self.access_token_strategy.validate(TokenKind::AccessToken, token) {
            Ok(signature) => signature,
            Err(e) if e.kind() == TokenErrorKind::Malformed => {
                debug!("token format not recognized, declining");
                return Ok(None);
            }
            Err(e) => return Err(e.into_presented_error(TokenKind::AccessToken)),
        };

        let session = self
            .access_token_storage
            .get_access_token_session(&signature)
            .await
            .map_err(|e| e.into_lookup_error("access token"))?;
        if is_expired(&session, self.access_token_lifespan) {
            return Err(OAuthError::InvalidGrant("The access token expired".into()));
        }
        Ok(Some(session))
    }
}
