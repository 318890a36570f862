//! Stateless capability checks against a request's client.

use super::request::Request;
use super::types::{Arguments, OAuthError};

/// Does the client's response type set contain `response_type`.
pub fn client_allows_response_type(request: &Request, response_type: &str) -> bool {
    request.client.response_types.has(response_type)
}

/// Does the client's grant type set contain `grant_type`.
pub fn client_allows_grant_type(request: &Request, grant_type: &str) -> bool {
    request.client.grant_types.has(grant_type)
}

/// Does the client's scope set contain every scope in `scopes`.
pub fn client_allows_scopes(request: &Request, scopes: &Arguments) -> bool {
    request.client.scopes.has_all(scopes.iter())
}

/// Token endpoint guard: the client must be registered for `grant_type`.
pub fn require_grant_type(request: &Request, grant_type: &str) -> Result<(), OAuthError> {
    if client_allows_grant_type(request, grant_type) {
        Ok(())
    } else {
        Err(OAuthError::UnauthorizedClient(format!(
            "The client is not allowed to use the {grant_type} grant type"
        )))
    }
}

/// Every requested scope must be registered for the client.
pub fn require_scopes(request: &Request) -> Result<(), OAuthError> {
    match request.scopes.iter().find(|s| !request.client.scopes.has(s)) {
        None => Ok(()),
        Some(scope) => Err(OAuthError::InvalidScope(format!(
            "The client is not allowed to request scope {scope}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth_core::types::Client;

    fn request_for(client: Client, scopes: &str) -> Request {
        let mut req = Request::new();
        req.client = client;
        req.set_scopes(Arguments::from_space_delimited(scopes));
        req
    }

    #[test]
    fn scope_check_requires_every_scope() {
        let client = Client::new("c").with_scopes(["read", "write"]);
        assert!(require_scopes(&request_for(client.clone(), "read write")).is_ok());
        let err = require_scopes(&request_for(client, "read admin")).unwrap_err();
        assert_eq!(err.error_code(), "invalid_scope");
    }

    #[test]
    fn grant_type_check_is_unauthorized_client() {
        let req = request_for(Client::new("c").with_grant_types(["implicit"]), "");
        assert!(client_allows_grant_type(&req, "implicit"));
        let err = require_grant_type(&req, "client_credentials").unwrap_err();
        assert_eq!(err.error_code(), "unauthorized_client");
    }

    #[test]
    fn response_type_check() {
        let req = request_for(Client::new("c").with_response_types(["code"]), "");
        assert!(client_allows_response_type(&req, "code"));
        assert!(!client_allows_response_type(&req, "token"));
    }
}
