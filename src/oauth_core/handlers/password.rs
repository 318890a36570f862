//! Resource owner password credentials grant (RFC 6749 section 4.3).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::helper::{HandleHelper, RefreshIssuer};
use super::TokenEndpointHandler;
use crate::oauth_core::oauth_provider::{AuthenticationError, UserAuthenticator};
use crate::oauth_core::request::AccessRequest;
use crate::oauth_core::response::AccessResponse;
use crate::oauth_core::types::{OAuthError, GRANT_TYPE_PASSWORD};
use crate::oauth_core::validators::{require_grant_type, require_scopes};

pub struct ResourceOwnerPasswordCredentialsGrantHandler {
    pub authenticator: Arc<dyn UserAuthenticator>,
    pub helper: HandleHelper,
    pub refresh: Option<RefreshIssuer>,
}

impl ResourceOwnerPasswordCredentialsGrantHandler {
    pub fn new(
        authenticator: Arc<dyn UserAuthenticator>,
        helper: HandleHelper,
        refresh: Option<RefreshIssuer>,
    ) -> Self {
        Self { authenticator, helper, refresh }
    }
}

#[async_trait]
impl TokenEndpointHandler for ResourceOwnerPasswordCredentialsGrantHandler {
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_PASSWORD) {
            return Ok(());
        }

        require_grant_type(&request.request, GRANT_TYPE_PASSWORD)?;
        require_scopes(&request.request)?;

        let form = &request.request.form;
        let (Some(username), Some(password)) = (form.get_non_empty("username"), form.get_non_empty("password")) else {
            return Err(OAuthError::InvalidRequest("Missing username or password".into()));
        };
        match self.authenticator.authenticate(username, password).await {
            Ok(()) => {}
            Err(AuthenticationError::InvalidCredentials) => {
                return Err(OAuthError::InvalidGrant("Unable to authenticate the resource owner".into()));
            }
            Err(AuthenticationError::Backend(detail)) => {
                warn!(%detail, "user authenticator failed");
                return Err(OAuthError::ServerError(detail));
            }
        }

        let scopes = request.request.scopes.clone();
        for scope in scopes.iter() {
            request.request.grant_scope(scope);
        }
        request.set_grant_type_handled(GRANT_TYPE_PASSWORD);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError> {
        if !request.grant_types.exact(GRANT_TYPE_PASSWORD) {
            return Ok(());
        }

        self.helper.issue_access_token(request, response).await?;
        if let Some(refresh) = &self.refresh {
            if refresh.should_issue(&request.request) {
                refresh.issue(&request.request, response).await?;
            }
        }
        Ok(())
    }
}
