//! Collaborator traits implemented outside the core: client lookup, token
//! session storage and resource owner authentication.

use async_trait::async_trait;
use thiserror::Error;

use super::request::Request;
use super::types::{Client, OAuthError};

/// Storage failures. `NotFound` and `AlreadyExists` are distinct from
/// backend failures so handlers can classify them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Any storage failure not explicitly handled by the caller is a server error.
    pub fn into_server_error(self) -> OAuthError {
        OAuthError::ServerError(self.to_string())
    }

    /// Lookup of a presented token or code: a miss means the grant is invalid.
    pub fn into_lookup_error(self, what: &str) -> OAuthError {
        match self {
            StorageError::NotFound => OAuthError::InvalidGrant(format!("The {what} could not be found")),
            other => other.into_server_error(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authenticator backend error: {0}")]
    Backend(String),
}

/// Trait for retrieving and authenticating OAuth2 clients.
#[async_trait]
pub trait ClientStore: Send + Sync + 'static {
    /// Retrieves a client by its identifier.
    async fn get_client(&self, id: &str) -> Result<Client, StorageError>;

    /// Retrieves a client and checks the presented secret.
    ///
    /// A wrong secret is reported as [`StorageError::NotFound`] so callers
    /// cannot tell unknown clients from bad secrets.
    async fn authenticate_client(&self, id: &str, secret: Option<&str>) -> Result<Client, StorageError>;
}

/// Access token sessions keyed by token signature.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync + 'static {
    async fn create_access_token_session(&self, signature: &str, request: &Request) -> Result<(), StorageError>;

    async fn get_access_token_session(&self, signature: &str) -> Result<Request, StorageError>;

    async fn delete_access_token_session(&self, signature: &str) -> Result<(), StorageError>;
}

/// Authorization code sessions keyed by code signature.
#[async_trait]
pub trait AuthorizeCodeStorage: Send + Sync + 'static {
    async fn create_authorize_code_session(&self, signature: &str, request: &Request) -> Result<(), StorageError>;

    async fn get_authorize_code_session(&self, signature: &str) -> Result<Request, StorageError>;

    async fn delete_authorize_code_session(&self, signature: &str) -> Result<(), StorageError>;
}

/// Refresh token sessions keyed by token signature.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync + 'static {
    async fn create_refresh_token_session(&self, signature: &str, request: &Request) -> Result<(), StorageError>;

    async fn get_refresh_token_session(&self, signature: &str) -> Result<Request, StorageError>;

    async fn delete_refresh_token_session(&self, signature: &str) -> Result<(), StorageError>;
}

/// Verifies resource owner credentials for the password grant.
#[async_trait]
pub trait UserAuthenticator: Send + Sync + 'static {
    async fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthenticationError>;
}
