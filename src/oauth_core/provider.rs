//! The pipeline dispatcher: builds requests from form data and runs them
//! through the registered handler chains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::OAuthConfig;
use super::handlers::{
    AuthorizeEndpointHandler, AuthorizeExplicitGrantHandler, AuthorizeImplicitGrantHandler,
    ClientCredentialsGrantHandler, HandleHelper, RefreshIssuer, RefreshTokenGrantHandler,
    ResourceOwnerPasswordCredentialsGrantHandler, TokenEndpointHandler,
};
use super::oauth_provider::{
    AccessTokenStorage, AuthorizeCodeStorage, ClientStore, RefreshTokenStorage, StorageError, UserAuthenticator,
};
use super::request::{AccessRequest, AuthorizeRequest, Form, Request, Session};
use super::resource::{AuthorizedRequestValidator, CoreValidator};
use super::response::{AccessResponse, AuthorizeResponse};
use super::strategy::TokenStrategy;
use super::types::{Arguments, Client, OAuthError};

/// Cancellation flag set by the host and observed between handler invocations.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn check(&self) -> Result<(), OAuthError> {
        if self.is_cancelled() {
            return Err(OAuthError::Cancelled);
        }
        Ok(())
    }
}

/// Ordered handler chains for the authorize and token endpoints plus the
/// validator chain for issued tokens.
///
/// Holds no per-request state, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct OAuthProvider {
    client_store: Arc<dyn ClientStore>,
    authorize_handlers: Vec<Arc<dyn AuthorizeEndpointHandler>>,
    token_handlers: Vec<Arc<dyn TokenEndpointHandler>>,
    authorized_request_validators: Vec<Arc<dyn AuthorizedRequestValidator>>,
}

impl OAuthProvider {
    /// Creates a provider with empty handler chains.
    pub fn new(client_store: Arc<dyn ClientStore>) -> Self {
        OAuthProvider {
            client_store,
            authorize_handlers: Vec::new(),
            token_handlers: Vec::new(),
            authorized_request_validators: Vec::new(),
        }
    }

    /// Appends an authorize endpoint handler.
    pub fn authorize_handler(mut self, handler: Arc<dyn AuthorizeEndpointHandler>) -> Self {
        self.authorize_handlers.push(handler);
        self
    }

    /// Appends a token endpoint handler.
    pub fn token_handler(mut self, handler: Arc<dyn TokenEndpointHandler>) -> Self {
        self.token_handlers.push(handler);
        self
    }

    /// Appends a validator for issued tokens.
    pub fn authorized_request_validator(mut self, validator: Arc<dyn AuthorizedRequestValidator>) -> Self {
        self.authorized_request_validators.push(validator);
        self
    }

    /// Registers every grant handler sharing one strategy and one storage.
    ///
    /// The password grant is only registered when an authenticator is given.
    pub fn compose<S>(
        config: &OAuthConfig,
        client_store: Arc<dyn ClientStore>,
        strategy: Arc<dyn TokenStrategy>,
        storage: Arc<S>,
        authenticator: Option<Arc<dyn UserAuthenticator>>,
    ) -> Self
    where
        S: AccessTokenStorage + AuthorizeCodeStorage + RefreshTokenStorage,
    {
        let helper = HandleHelper::new(strategy.clone(), storage.clone(), config.access_token_lifespan);
        let refresh = RefreshIssuer::new(strategy.clone(), storage.clone(), config.refresh_token_scope.clone());

        let implicit = Arc::new(AuthorizeImplicitGrantHandler::new(strategy.clone(), storage.clone(), config));
        let explicit = Arc::new(AuthorizeExplicitGrantHandler::new(
            strategy.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
            config,
        ));
        let client_credentials = Arc::new(ClientCredentialsGrantHandler::new(helper.clone()));
        let refresh_grant =
            Arc::new(RefreshTokenGrantHandler::new(strategy.clone(), storage.clone(), storage.clone(), config));
        let validator = Arc::new(CoreValidator::new(strategy, storage, config.access_token_lifespan));

        let mut provider = OAuthProvider::new(client_store)
            .authorize_handler(implicit)
            .authorize_handler(explicit.clone())
            .token_handler(explicit)
            .token_handler(client_credentials)
            .token_handler(refresh_grant)
            .authorized_request_validator(validator);
        if let Some(authenticator) = authenticator {
            provider = provider.token_handler(Arc::new(ResourceOwnerPasswordCredentialsGrantHandler::new(
                authenticator,
                helper,
                Some(refresh),
            )));
        }
        provider
    }

    /// Build an authorize request from decoded authorize endpoint parameters.
    #[instrument(skip_all, level = "debug")]
    pub async fn new_authorize_request(
        &self,
        cancel: &CancelSignal,
        form: Form,
        session: Session,
    ) -> Result<AuthorizeRequest, OAuthError> {
        cancel.check()?;
        let client_id = form
            .get_non_empty("client_id")
            .ok_or_else(|| OAuthError::InvalidRequest("Missing client_id".into()))?;
        let client = self.client_store.get_client(client_id).await.map_err(|e| match e {
            StorageError::NotFound => OAuthError::InvalidClient(format!("Unknown client {client_id}")),
            other => other.into_server_error(),
        })?;

        let response_types = Arguments::from_space_delimited(form.get("response_type").unwrap_or_default());
        if response_types.is_empty() {
            return Err(OAuthError::InvalidRequest("Missing response_type".into()));
        }
        let redirect_uri = resolve_redirect_uri(&client, form.get_non_empty("redirect_uri"))?;
        let state = form.get("state").unwrap_or_default().to_string();

        let mut request = Request::new();
        request.set_scopes(Arguments::from_space_delimited(form.get("scope").unwrap_or_default()));
        request.client = client;
        request.form = form;
        request.set_session(session);

        let mut authorize = AuthorizeRequest::new(request, response_types).with_state(state);
        authorize.redirect_uri = redirect_uri;
        Ok(authorize)
    }

    /// Offer `request` to every authorize handler in order.
    ///
    /// Fails with `unsupported_response_type` when a declared response type
    /// is left unhandled after the full pass.
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    pub async fn new_authorize_response(
        &self,
        cancel: &CancelSignal,
        request: &mut AuthorizeRequest,
    ) -> Result<AuthorizeResponse, OAuthError> {
        if request.response_types.is_empty() {
            return Err(OAuthError::InvalidRequest("Missing response_type".into()));
        }

        let mut response = AuthorizeResponse::new();
        for handler in &self.authorize_handlers {
            cancel.check()?;
            handler
                .handle_authorize_endpoint_request(request, &mut response)
                .await
                .inspect_err(|e| warn!(error = %e, error_code = e.error_code(), "authorize handler failed"))?;
        }

        if let Some(unhandled) = request.unhandled_response_type() {
            return Err(OAuthError::UnsupportedResponseType(format!(
                "The response type {unhandled} is not supported"
            )));
        }
        debug!(response_types = %request.response_types.join(" "), "authorize request handled");
        Ok(response)
    }

    /// Authenticate the client and run the validation pass of every token handler.
    #[instrument(skip_all, level = "debug", fields(client_id = %client_id))]
    pub async fn new_access_request(
        &self,
        cancel: &CancelSignal,
        client_id: &str,
        client_secret: Option<&str>,
        form: Form,
        session: Session,
    ) -> Result<AccessRequest, OAuthError> {
        cancel.check()?;
        let client = self
            .client_store
            .authenticate_client(client_id, client_secret)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => {
                    OAuthError::InvalidClient(format!("Client {client_id} failed to authenticate"))
                }
                other => other.into_server_error(),
            })?;

        let grant_types = Arguments::from_space_delimited(form.get("grant_type").unwrap_or_default());
        if grant_types.is_empty() {
            return Err(OAuthError::InvalidRequest("Missing grant_type".into()));
        }

        let mut request = Request::new();
        request.set_scopes(Arguments::from_space_delimited(form.get("scope").unwrap_or_default()));
        request.client = client;
        request.form = form;
        request.set_session(session);
        let mut access = AccessRequest::new(request, grant_types);

        for handler in &self.token_handlers {
            cancel.check()?;
            handler
                .handle_token_endpoint_request(&mut access)
                .await
                .inspect_err(|e| warn!(error = %e, error_code = e.error_code(), "token handler rejected request"))?;
        }

        if let Some(unhandled) = access.unhandled_grant_type() {
            return Err(OAuthError::UnsupportedGrantType(format!("The grant type {unhandled} is not supported")));
        }
        Ok(access)
    }

    /// Run the populate pass of every token handler and return the token response.
    #[instrument(skip_all, level = "debug", fields(client_id = %request.request.client.id))]
    pub async fn new_access_response(
        &self,
        cancel: &CancelSignal,
        request: &AccessRequest,
    ) -> Result<AccessResponse, OAuthError> {
        if !request.did_handle_all_grant_types() {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "The grant type {} is not supported",
                request.grant_types.join(" ")
            )));
        }

        let mut response = AccessResponse::new();
        for handler in &self.token_handlers {
            cancel.check()?;
            handler
                .populate_token_endpoint_response(request, &mut response)
                .await
                .inspect_err(|e| {
                    warn!(error = %e, error_code = e.error_code(), "token handler failed to populate response")
                })?;
        }

        if response.access_token().is_none() || response.token_type().is_none() {
            return Err(OAuthError::ServerError("No handler issued an access token".into()));
        }
        Ok(response)
    }

    /// Validate an access token presented to a resource server.
    ///
    /// Returns the stored request the token was issued for. Every scope in
    /// `required_scopes` must have been granted.
    #[instrument(skip_all, level = "debug")]
    pub async fn validate_authorized_request(
        &self,
        cancel: &CancelSignal,
        token: &str,
        required_scopes: &[&str],
    ) -> Result<Request, OAuthError> {
        for validator in &self.authorized_request_validators {
            cancel.check()?;
            if let Some(request) = validator.validate_authorized_request(token).await? {
                if let Some(missing) = required_scopes.iter().find(|s| !request.granted_scopes.has(s)) {
                    return Err(OAuthError::InvalidScope(format!("The token was not granted scope {missing}")));
                }
                return Ok(request);
            }
        }
        Err(OAuthError::InvalidGrant("The access token could not be validated".into()))
    }
}

fn resolve_redirect_uri(client: &Client, raw: Option<&str>) -> Result<Option<Url>, OAuthError> {
    match raw {
        Some(raw) => {
            let url = Url::parse(raw).map_err(|e| OAuthError::InvalidRequest(format!("Invalid redirect_uri: {e}")))?;
            if url.fragment().is_some() {
                return Err(OAuthError::InvalidRequest("The redirect_uri must not contain a fragment".into()));
            }
            if !client.redirect_uris.iter().any(|registered| registered == raw) {
                return Err(OAuthError::InvalidRequest("The redirect_uri is not registered for this client".into()));
            }
            Ok(Some(url))
        }
        None => match client.redirect_uris.as_slice() {
            [] => Ok(None),
            [only] => Url::parse(only)
                .map(Some)
                .map_err(|e| OAuthError::ServerError(format!("Registered redirect_uri is invalid: {e}"))),
            _ => Err(OAuthError::InvalidRequest("A redirect_uri is required for this client".into())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_must_be_registered() {
        let client = Client::new("c").with_redirect_uri("https://app.local/cb");
        assert!(resolve_redirect_uri(&client, Some("https://app.local/cb")).unwrap().is_some());
        let err = resolve_redirect_uri(&client, Some("https://evil.local/cb")).unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
        let err = resolve_redirect_uri(&client, Some("https://app.local/cb#x")).unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[test]
    fn single_registered_uri_is_the_default() {
        let client = Client::new("c").with_redirect_uri("https://app.local/cb");
        let url = resolve_redirect_uri(&client, None).unwrap().unwrap();
        assert_eq!(url.as_str(), "https://app.local/cb");

        let many = client.with_redirect_uri("https://app.local/other");
        assert!(resolve_redirect_uri(&many, None).is_err());
    }

    #[test]
    fn cancel_signal_is_shared_between_clones() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        clone.cancel();
        assert_eq!(signal.check(), Err(OAuthError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_resolves_for_waiters() {
        let signal = CancelSignal::new();
        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        tokio::task::yield_now().await;
        signal.cancel();
        waiter.await.unwrap();
        // Already cancelled signals resolve immediately.
        signal.cancelled().await;
    }
}
