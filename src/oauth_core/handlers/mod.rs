//! Grant handlers.
//!
//! Each handler owns one response or grant type. It declines requests that
//! do not declare exactly that type by returning `Ok(())` untouched, fails
//! hard when the client may not use the type, and otherwise does the work
//! and marks the type handled.

use async_trait::async_trait;

use super::request::{AccessRequest, AuthorizeRequest};
use super::response::{AccessResponse, AuthorizeResponse};
use super::types::OAuthError;

pub mod authorize_code;
pub mod client_credentials;
pub mod helper;
pub mod implicit;
pub mod password;
pub mod refresh;

pub use authorize_code::AuthorizeExplicitGrantHandler;
pub use client_credentials::ClientCredentialsGrantHandler;
pub use helper::{HandleHelper, RefreshIssuer};
pub use implicit::AuthorizeImplicitGrantHandler;
pub use password::ResourceOwnerPasswordCredentialsGrantHandler;
pub use refresh::RefreshTokenGrantHandler;

/// A handler taking part in the authorize endpoint pass.
#[async_trait]
pub trait AuthorizeEndpointHandler: Send + Sync + 'static {
    async fn handle_authorize_endpoint_request(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> Result<(), OAuthError>;
}

/// A handler taking part in the token endpoint passes.
///
/// `handle_token_endpoint_request` validates and loads state for every
/// handler before `populate_token_endpoint_response` mints anything.
#[async_trait]
pub trait TokenEndpointHandler: Send + Sync + 'static {
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest) -> Result<(), OAuthError>;

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> Result<(), OAuthError>;
}
