//! Client credentials grant (RFC 6749 section 4.4).

use async_trait::async_trait;
use tracing::instrument;

use super::helper::HandleHelper;
use super::TokenEndpointHandler;
use crate::oauth_core::request::AccessRequest;
use crate::oauth_core::response::AccessResponse;
use crate::oauth_core::types::{OAuthError, GRANT_TYPE_CLIENT_CREDENTIALS};
use crate::oauth_core::validators::{require_grant_type, require_scopes};

/// Issues access tokens to an authenticated confidential client acting on its own behalf.
pub struct ClientCredentialsGrantHandler {
    pub helper: HandleHelper,
}

impl ClientCredentialsGrantHandler {
    pub fn new(helper: HandleHelper) -> Self {
        Self { helper }
    }
}

#[async_trait]
impl TokenEndpointHandler for ClientCredentialsGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_CLIENT_CREDENTIALS) {
            return Ok(());
        }

        if request.request.client.public {
            return Err(OAuthError::UnauthorizedClient(
                "Public clients cannot use the client_credentials grant type".into(),
            ));
        }
        require_grant_type(&request.request, GRANT_TYPE_CLIENT_CREDENTIALS)?;
        require_scopes(&request.request)?;

        // No resource owner to consent: every pre-approved requested scope is granted.
        let scopes = request.request.scopes.clone();
        for scope in scopes.iter() {
            request.request.grant_scope(scope);
        }
        request.set_grant_type_handled(GRANT_TYPE_CLIENT_CREDENTIALS);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_CLIENT_CREDENTIALS) {
            return Ok(());
        }
        self.helper.issue_access_token(request, response).await
    }
}
