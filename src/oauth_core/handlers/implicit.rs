//! Implicit grant (RFC 6749 section 4.2).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use super::helper::issued_now;
use super::AuthorizeEndpointHandler;
use crate::oauth_core::config::OAuthConfig;
use crate::oauth_core::oauth_provider::{AccessTokenStorage, StorageError};
use crate::oauth_core::request::AuthorizeRequest;
use crate::oauth_core::response::AuthorizeResponse;
use crate::oauth_core::strategy::{TokenError, TokenKind, TokenStrategy};
use crate::oauth_core::types::{OAuthError, GRANT_TYPE_IMPLICIT, RESPONSE_TYPE_TOKEN, TOKEN_TYPE_BEARER};
use crate::oauth_core::validators::{client_allows_grant_type, client_allows_response_type};

/// Issues access tokens straight from the authorize endpoint via the URI fragment.
pub struct AuthorizeImplicitGrantHandler {
    pub access_token_strategy: Arc<dyn TokenStrategy>,
    pub access_token_storage: Arc<dyn AccessTokenStorage>,
    pub access_token_lifespan: Duration,
}

impl AuthorizeImplicitGrantHandler {
    pub fn new(strategy: Arc<dyn TokenStrategy>, storage: Arc<dyn AccessTokenStorage>, config: &OAuthConfig) -> Self {
        Self {
            access_token_strategy: strategy,
            access_token_storage: storage,
            access_token_lifespan: config.access_token_lifespan,
        }
    }

    async fn issue_implicit_access_token(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuthError> {
        let material = self
            .access_token_strategy
            .generate(TokenKind::AccessToken, &request.request)
            .map_err(TokenError::into_generation_error)?;
        self.access_token_storage
            .create_access_token_session(&material.signature, &issued_now(&request.request))
            .await
            .map_err(StorageError::into_server_error)?;

        response.add_fragment("access_token", material.token);
        response.add_fragment("expires_in", self.access_token_lifespan.as_secs().to_string());
        response.add_fragment("token_type", TOKEN_TYPE_BEARER);
        response.add_fragment("state", request.state.clone());
        response.add_fragment("scope", request.request.granted_scopes.join("+"));
        request.set_response_type_handled(RESPONSE_TYPE_TOKEN);
        Ok(())
    }
}

#[async_trait]
impl AuthorizeEndpointHandler for AuthorizeImplicitGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_authorize_endpoint_request(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuthError> {
        // Leaves room for combined response types such as "token id_token".
        if !request.response_types.exact(RESPONSE_TYPE_TOKEN) {
            return Ok(());
        }

        if !client_allows_response_type(&request.request, RESPONSE_TYPE_TOKEN) {
            return Err(OAuthError::InvalidGrant("The client is not allowed to request response type token".into()));
        }
        if !client_allows_grant_type(&request.request, GRANT_TYPE_IMPLICIT) {
            return Err(OAuthError::InvalidGrant("The client is not allowed to use the implicit grant type".into()));
        }

        // No transport check: the implicit flow carries no client secret (RFC 6819 section 4.4.2).
        self.issue_implicit_access_token(request, response).await
    }
}
