//! Token strategy abstraction shared by the HMAC and JWT implementations.

use std::fmt;

use thiserror::Error;

use super::request::Request;
use super::types::OAuthError;

/// What a generated token is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
    AuthorizeCode,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::AccessToken => "access_token",
            TokenKind::RefreshToken => "refresh_token",
            TokenKind::AuthorizeCode => "authorize_code",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly minted bearer value and the storage-safe signature derived from it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenMaterial {
    pub token: String,
    pub signature: String,
}

impl fmt::Debug for TokenMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMaterial")
            .field("token", &"<redacted>")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Coarse classification of a [`TokenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// The token does not have the expected structure.
    Malformed,
    /// Signature or algorithm checks failed.
    Cryptographic,
    /// Well formed and correctly signed but unusable (expired, wrong use).
    Invalid,
    /// Key material or entropy problem on our side.
    Internal,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("unexpected signing method: expected {expected}, found {found}")]
    AlgorithmMismatch { expected: String, found: String },
    #[error("token is expired")]
    Expired,
    #[error("token is invalid: {0}")]
    Invalid(String),
    #[error("token generation failed: {0}")]
    Generation(String),
    #[error("invalid key material: {0}")]
    Key(String),
}

impl TokenError {
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            TokenError::Malformed(_) => TokenErrorKind::Malformed,
            TokenError::InvalidSignature | TokenError::AlgorithmMismatch { .. } => TokenErrorKind::Cryptographic,
            TokenError::Expired | TokenError::Invalid(_) => TokenErrorKind::Invalid,
            TokenError::Generation(_) | TokenError::Key(_) => TokenErrorKind::Internal,
        }
    }

    /// Maps a failure on a client-presented token to the boundary taxonomy.
    pub fn into_presented_error(self, kind: TokenKind) -> OAuthError {
        match self.kind() {
            TokenErrorKind::Internal => OAuthError::ServerError(self.to_string()),
            _ => OAuthError::InvalidGrant(format!("The {kind} is invalid: {self}")),
        }
    }

    /// Maps a failure while minting a token to the boundary taxonomy.
    pub fn into_generation_error(self) -> OAuthError {
        OAuthError::ServerError(self.to_string())
    }
}

/// Generates and validates the tokens and codes that flow through the pipeline.
///
/// Validation never consults storage: it verifies the presented value and
/// returns the signature the storage layer is keyed by.
pub trait TokenStrategy: Send + Sync + 'static {
    /// Mint a new token of `kind` for `request`.
    fn generate(&self, kind: TokenKind, request: &Request) -> Result<TokenMaterial, TokenError>;

    /// Verify a presented token and return its signature.
    fn validate(&self, kind: TokenKind, token: &str) -> Result<String, TokenError>;

    /// Extract the signature without verifying the token.
    fn signature(&self, token: &str) -> Result<String, TokenError>;
}
