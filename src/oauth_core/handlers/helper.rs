//! Token issuance shared by the token endpoint handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::oauth_core::oauth_provider::{AccessTokenStorage, RefreshTokenStorage, StorageError};
use crate::oauth_core::request::{AccessRequest, Request};
use crate::oauth_core::response::AccessResponse;
use crate::oauth_core::strategy::{TokenError, TokenKind, TokenStrategy};
use crate::oauth_core::types::{OAuthError, GRANT_TYPE_REFRESH_TOKEN, TOKEN_TYPE_BEARER};

/// Copy of `request` stamped with the issuance time, as stored with a new token.
pub(crate) fn issued_now(request: &Request) -> Request {
    let mut session = request.clone();
    session.requested_at = Utc::now();
    session
}

/// True once `requested_at + lifespan` lies in the past.
pub(crate) fn is_expired(request: &Request, lifespan: Duration) -> bool {
    match chrono::Duration::from_std(lifespan) {
        Ok(lifespan) => request.requested_at + lifespan < Utc::now(),
        Err(_) => false,
    }
}

/// Mints access tokens and writes the standard token response fields.
#[derive(Clone)]
pub struct HandleHelper {
    pub strategy: Arc<dyn TokenStrategy>,
    pub access_token_storage: Arc<dyn AccessTokenStorage>,
    pub access_token_lifespan: Duration,
}

impl HandleHelper {
    pub fn new(
        strategy: Arc<dyn TokenStrategy>,
        access_token_storage: Arc<dyn AccessTokenStorage>,
        access_token_lifespan: Duration,
    ) -> Self {
        Self { strategy, access_token_storage, access_token_lifespan }
    }

    /// Generate an access token, persist its signature and fill the response.
    pub async fn issue_access_token(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError> {
        let material = self
            .strategy
            .generate(TokenKind::AccessToken, &request.request)
            .map_err(TokenError::into_generation_error)?;
        self.access_token_storage
            .create_access_token_session(&material.signature, &issued_now(&request.request))
            .await
            .map_err(StorageError::into_server_error)?;

        debug!(client_id = %request.request.client.id, "access token issued");
        response.set_access_token(material.token);
        response.set_token_type(TOKEN_TYPE_BEARER);
        response.set_extra("expires_in", self.access_token_lifespan.as_secs());
        response.set_extra("scope", request.request.granted_scopes.join(" "));
        Ok(())
    }
}

/// Mints refresh tokens next to access tokens.
#[derive(Clone)]
pub struct RefreshIssuer {
    pub strategy: Arc<dyn TokenStrategy>,
    pub refresh_token_storage: Arc<dyn RefreshTokenStorage>,
    /// Scope that must be granted before a refresh token is handed out.
    pub refresh_token_scope: String,
}

impl RefreshIssuer {
    pub fn new(
        strategy: Arc<dyn TokenStrategy>,
        refresh_token_storage: Arc<dyn RefreshTokenStorage>,
        refresh_token_scope: impl Into<String>,
    ) -> Self {
        Self { strategy, refresh_token_storage, refresh_token_scope: refresh_token_scope.into() }
    }

    /// The client may refresh and the refresh scope was granted.
    pub fn should_issue(&self, request: &Request) -> bool {
        request.client.grant_types.has(GRANT_TYPE_REFRESH_TOKEN)
            && request.granted_scopes.has(&self.refresh_token_scope)
    }

    pub async fn issue(&self, request: &Request, response: &mut AccessResponse) -> Result<(), OAuthError> {
        let material = self
            .strategy
            .generate(TokenKind::RefreshToken, request)
            .map_err(TokenError::into_generation_error)?;
        self.refresh_token_storage
            .create_refresh_token_session(&material.signature, &issued_now(request))
            .await
            .map_err(StorageError::into_server_error)?;

        debug!(client_id = %request.client.id, "refresh token issued");
        response.set_extra("refresh_token", material.token);
        Ok(())
    }
}
