//! OAuth2 authorization server core for Starberry.
//!
//! Authorize and token endpoint requests pass through an ordered chain of
//! grant handlers. Each handler owns one response or grant type, checks the
//! client's registered capabilities and mints tokens through a pluggable
//! [`TokenStrategy`]. Transport, persistence and consent are left to the host.

pub mod oauth_core;

pub use oauth_core::config::OAuthConfig;
pub use oauth_core::handlers::{
    AuthorizeEndpointHandler, AuthorizeExplicitGrantHandler, AuthorizeImplicitGrantHandler,
    ClientCredentialsGrantHandler, HandleHelper, RefreshIssuer, RefreshTokenGrantHandler,
    ResourceOwnerPasswordCredentialsGrantHandler, TokenEndpointHandler,
};
pub use oauth_core::hmac::HmacStrategy;
pub use oauth_core::jwt::{JwtStrategy, Rs256Signer};
pub use oauth_core::memory::{InMemoryClientStore, InMemoryTokenStorage, InMemoryUserAuthenticator};
pub use oauth_core::oauth_provider::{
    AccessTokenStorage, AuthenticationError, AuthorizeCodeStorage, ClientStore, RefreshTokenStorage, StorageError,
    UserAuthenticator,
};
pub use oauth_core::provider::{CancelSignal, OAuthProvider};
pub use oauth_core::request::{AccessRequest, AuthorizeRequest, Form, Request, RequestRecord, Session};
pub use oauth_core::resource::{AuthorizedRequestValidator, CoreValidator};
pub use oauth_core::response::{AccessResponse, AuthorizeResponse};
pub use oauth_core::strategy::{TokenError, TokenErrorKind, TokenKind, TokenMaterial, TokenStrategy};
pub use oauth_core::types::{Arguments, Client, OAuthError};
