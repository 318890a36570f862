//! Refresh token grant (RFC 6749 section 6).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::helper::{is_expired, HandleHelper, RefreshIssuer};
use super::TokenEndpointHandler;
use crate::oauth_core::config::OAuthConfig;
use crate::oauth_core::oauth_provider::{AccessTokenStorage, RefreshTokenStorage};
use crate::oauth_core::request::AccessRequest;
use crate::oauth_core::response::AccessResponse;
use crate::oauth_core::strategy::{TokenKind, TokenStrategy};
use crate::oauth_core::types::{Arguments, OAuthError, GRANT_TYPE_REFRESH_TOKEN};
use crate::oauth_core::validators::require_grant_type;

pub struct RefreshTokenGrantHandler {
    pub refresh_token_strategy: Arc<dyn TokenStrategy>,
    pub refresh_token_storage: Arc<dyn RefreshTokenStorage>,
    pub refresh_token_lifespan: Option<Duration>,
    pub rotate_refresh_tokens: bool,
    pub helper: HandleHelper,
    pub issuer: RefreshIssuer,
}

impl RefreshTokenGrantHandler {
    pub fn new(
        strategy: Arc<dyn TokenStrategy>,
        refresh_storage: Arc<dyn RefreshTokenStorage>,
        access_storage: Arc<dyn AccessTokenStorage>,
        config: &OAuthConfig,
    ) -> Self {
        Self {
            refresh_token_strategy: strategy.clone(),
            refresh_token_storage: refresh_storage.clone(),
            refresh_token_lifespan: config.refresh_token_lifespan,
            rotate_refresh_tokens: config.rotate_refresh_tokens,
            helper: HandleHelper::new(strategy.clone(), access_storage, config.access_token_lifespan),
            issuer: RefreshIssuer::new(strategy, refresh_storage, config.refresh_token_scope.clone()),
        }
    }

    fn presented_token<'a>(&self, request: &'a AccessRequest) -> Result<&'a str, OAuthError> {
        request
            .request
            .form
            .get_non_empty("refresh_token")
            .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh_token".into()))
    }
}

#[async_trait]
impl TokenEndpointHandler for RefreshTokenGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_REFRESH_TOKEN) {
            return Ok(());
        }

        require_grant_type(&request.request, GRANT_TYPE_REFRESH_TOKEN)?;

        let token = self.presented_token(request)?;
        let signature = self
            .refresh_token_strategy
            .validate(TokenKind::RefreshToken, token)
            .map_err(|e| e.into_presented_error(TokenKind::RefreshToken))?;
        let stored = self
            .refresh_token_storage
            .get_refresh_token_session(&signature)
            .await
            .map_err(|e| e.into_lookup_error("refresh token"))?;

        if stored.client.id != request.request.client.id {
            return Err(OAuthError::InvalidGrant("The refresh token was issued to another client".into()));
        }
        if let Some(lifespan) = self.refresh_token_lifespan {
            if is_expired(&stored, lifespan) {
                return Err(OAuthError::InvalidGrant("The refresh token expired".into()));
            }
        }
        // A refresh may narrow the original grant but never widen it.
        if let Some(scope) = request.request.scopes.iter().find(|s| !stored.granted_scopes.has(s)) {
            return Err(OAuthError::InvalidScope(format!("Scope {scope} was not part of the original grant")));
        }

        let narrowed = request.request.scopes.clone();
        request.set_redeemed_signature(signature);
        request.request.merge(&stored);
        if !narrowed.is_empty() {
            // The new access token carries only the requested subset.
            let mut granted = Arguments::new();
            for scope in narrowed.iter() {
                granted.append_unique(scope);
            }
            request.request.granted_scopes = granted;
            request.request.scopes = narrowed;
        }
        request.set_grant_type_handled(GRANT_TYPE_REFRESH_TOKEN);
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_REFRESH_TOKEN) {
            return Ok(());
        }

        let original = if self.rotate_refresh_tokens {
            let signature = request
                .redeemed_signature()
                .ok_or_else(|| OAuthError::ServerError("Refresh token signature was not recorded".into()))?;
            let original = self
                .refresh_token_storage
                .get_refresh_token_session(signature)
                .await
                .map_err(|e| e.into_lookup_error("refresh token"))?;
            // Deleting first makes a replayed token fail its lookup.
            self.refresh_token_storage
                .delete_refresh_token_session(signature)
                .await
                .map_err(|e| e.into_lookup_error("refresh token"))?;
            debug!("refresh token rotated");
            Some(original)
        } else {
            None
        };

        self.helper.issue_access_token(request, response).await?;
        if let Some(original) = original {
            // The rotated token keeps the scope of the token it replaces (RFC 6749 section 6).
            let mut rotated = request.request.clone();
            rotated.scopes = original.scopes;
            rotated.granted_scopes = original.granted_scopes;
            self.issuer.issue(&rotated, response).await?;
        }
        Ok(())
    }
}
