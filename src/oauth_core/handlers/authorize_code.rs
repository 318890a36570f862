//! Authorization code grant (RFC 6749 section 4.1) with PKCE (RFC 7636).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::helper::{is_expired, issued_now, HandleHelper, RefreshIssuer};
use super::{AuthorizeEndpointHandler, TokenEndpointHandler};
use crate::oauth_core::config::OAuthConfig;
use crate::oauth_core::crypto::{pkce_verify, PKCE_METHOD_PLAIN, PKCE_METHOD_S256};
use crate::oauth_core::oauth_provider::{AccessTokenStorage, AuthorizeCodeStorage, RefreshTokenStorage, StorageError};
use crate::oauth_core::request::{AccessRequest, AuthorizeRequest};
use crate::oauth_core::response::{AccessResponse, AuthorizeResponse};
use crate::oauth_core::strategy::{TokenError, TokenKind, TokenStrategy};
use crate::oauth_core::types::{OAuthError, GRANT_TYPE_AUTHORIZATION_CODE, RESPONSE_TYPE_CODE};
use crate::oauth_core::validators::{
    client_allows_grant_type, client_allows_response_type, require_grant_type, require_scopes,
};

/// Issues codes at the authorize endpoint and exchanges them at the token endpoint.
pub struct AuthorizeExplicitGrantHandler {
    pub authorize_code_strategy: Arc<dyn TokenStrategy>,
    pub authorize_code_storage: Arc<dyn AuthorizeCodeStorage>,
    pub authorize_code_lifespan: Duration,
    pub enforce_pkce: bool,
    pub helper: HandleHelper,
    pub refresh: Option<RefreshIssuer>,
}

impl AuthorizeExplicitGrantHandler {
    pub fn new(
        strategy: Arc<dyn TokenStrategy>,
        code_storage: Arc<dyn AuthorizeCodeStorage>,
        access_storage: Arc<dyn AccessTokenStorage>,
        refresh_storage: Arc<dyn RefreshTokenStorage>,
        config: &OAuthConfig,
    ) -> Self {
        Self {
            authorize_code_strategy: strategy.clone(),
            authorize_code_storage: code_storage,
            authorize_code_lifespan: config.authorize_code_lifespan,
            enforce_pkce: config.enforce_pkce,
            helper: HandleHelper::new(strategy.clone(), access_storage, config.access_token_lifespan),
            refresh: Some(RefreshIssuer::new(strategy, refresh_storage, config.refresh_token_scope.clone())),
        }
    }

    fn check_pkce_request(&self, request: &AuthorizeRequest) -> Result<(), OAuthError> {
        let form = &request.request.form;
        match form.get_non_empty("code_challenge") {
            Some(_) => match form.get_non_empty("code_challenge_method").unwrap_or(PKCE_METHOD_PLAIN) {
                PKCE_METHOD_PLAIN | PKCE_METHOD_S256 => Ok(()),
                other => Err(OAuthError::InvalidRequest(format!("Unsupported code_challenge_method {other}"))),
            },
            None if self.enforce_pkce && request.request.client.public => {
                Err(OAuthError::InvalidRequest("Public clients must send a PKCE code_challenge".into()))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthorizeEndpointHandler for AuthorizeExplicitGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_authorize_endpoint_request(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuthError> {
        if !request.response_types.exact(RESPONSE_TYPE_CODE) {
            return Ok(());
        }

        if !client_allows_response_type(&request.request, RESPONSE_TYPE_CODE) {
            return Err(OAuthError::InvalidGrant("The client is not allowed to request response type code".into()));
        }
        if !client_allows_grant_type(&request.request, GRANT_TYPE_AUTHORIZATION_CODE) {
            return Err(OAuthError::InvalidGrant(
                "The client is not allowed to use the authorization_code grant type".into(),
            ));
        }
        require_scopes(&request.request)?;
        self.check_pkce_request(request)?;

        let material = self
            .authorize_code_strategy
            .generate(TokenKind::AuthorizeCode, &request.request)
            .map_err(TokenError::into_generation_error)?;
        self.authorize_code_storage
            .create_authorize_code_session(&material.signature, &issued_now(&request.request))
            .await
            .map_err(StorageError::into_server_error)?;

        response.add_query("code", material.token);
        response.add_query("state", request.state.clone());
        response.add_query("scope", request.request.granted_scopes.join("+"));
        request.set_response_type_handled(RESPONSE_TYPE_CODE);
        Ok(())
    }
}

#[async_trait]
impl TokenEndpointHandler for AuthorizeExplicitGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_AUTHORIZATION_CODE) {
            return Ok(());
        }

        require_grant_type(&request.request, GRANT_TYPE_AUTHORIZATION_CODE)?;

        let form = &request.request.form;
        let code = form
            .get_non_empty("code")
            .ok_or_else(|| OAuthError::InvalidRequest("Missing authorization code".into()))?;
        let signature = self
            .authorize_code_strategy
            .validate(TokenKind::AuthorizeCode, code)
            .map_err(|e| e.into_presented_error(TokenKind::AuthorizeCode))?;
        let stored = self
            .authorize_code_storage
            .get_authorize_code_session(&signature)
            .await
            .map_err(|e| e.into_lookup_error("authorization code"))?;

        if stored.client.id != request.request.client.id {
            return Err(OAuthError::InvalidGrant("The authorization code was issued to another client".into()));
        }
        if is_expired(&stored, self.authorize_code_lifespan) {
            return Err(OAuthError::InvalidGrant("The authorization code expired".into()));
        }
        if let Some(original) = stored.form.get_non_empty("redirect_uri") {
            if form.get("redirect_uri") != Some(original) {
                return Err(OAuthError::InvalidGrant(
                    "The redirect_uri does not match the authorization request".into(),
                ));
            }
        }
        if let Some(challenge) = stored.form.get_non_empty("code_challenge") {
            let method = stored.form.get_non_empty("code_challenge_method").unwrap_or(PKCE_METHOD_PLAIN);
            let verifier = form
                .get_non_empty("code_verifier")
                .ok_or_else(|| OAuthError::InvalidGrant("Missing PKCE code_verifier".into()))?;
            if !pkce_verify(method, challenge, verifier) {
                return Err(OAuthError::InvalidGrant("The PKCE code_verifier does not match".into()));
            }
        }

        request.set_redeemed_signature(signature);
        request.request.merge(&stored);
        request.set_grant_type_handled(GRANT_TYPE_AUTHORIZATION_CODE);
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_AUTHORIZATION_CODE) {
            return Ok(());
        }

        let signature = request
            .redeemed_signature()
            .ok_or_else(|| OAuthError::ServerError("Authorization code signature was not recorded".into()))?;

        // Codes are single use; a concurrent redemption loses here.
        self.authorize_code_storage
            .delete_authorize_code_session(signature)
            .await
            .map_err(|e| e.into_lookup_error("authorization code"))?;
        debug!("authorization code redeemed");

        self.helper.issue_access_token(request, response).await?;
        if let Some(refresh) = &self.refresh {
            if refresh.should_issue(&request.request) {
                refresh.issue(&request.request, response).await?;
            }
        }
        Ok(())
    }
}
