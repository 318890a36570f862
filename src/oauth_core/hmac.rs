//! HMAC-SHA256 signed opaque tokens.
//!
//! A token is `<key>.<signature>` where `key` is 32 random bytes and
//! `signature` is the HMAC of the key under the server secret, both base64url
//! encoded. Storage only ever sees the signature.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::crypto::{hmac_sign, hmac_verify, random_bytes};
use super::request::Request;
use super::strategy::{TokenError, TokenKind, TokenMaterial, TokenStrategy};

/// Minimum length of the server secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;
const TOKEN_ENTROPY: usize = 32;

/// Opaque token strategy backed by a shared secret.
pub struct HmacStrategy {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacStrategy").finish_non_exhaustive()
    }
}

impl HmacStrategy {
    /// Secrets shorter than [`MIN_SECRET_LEN`] are rejected here rather than at first use.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::Key(format!(
                "HMAC secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self { secret })
    }

    /// Generate a new opaque token and its signature.
    pub fn generate_token(&self) -> Result<TokenMaterial, TokenError> {
        let key = random_bytes(TOKEN_ENTROPY)
            .map_err(|_| TokenError::Generation("system random source failed".into()))?;
        let encoded_key = URL_SAFE_NO_PAD.encode(&key);
        let signature = URL_SAFE_NO_PAD.encode(hmac_sign(&self.secret, encoded_key.as_bytes()));
        Ok(TokenMaterial { token: format!("{encoded_key}.{signature}"), signature })
    }

    /// Recompute the HMAC of the presented token and compare it to its signature part.
    pub fn validate_token(&self, token: &str) -> Result<String, TokenError> {
        let (key, signature) = split(token)?;
        let tag = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::InvalidSignature)?;
        if !hmac_verify(&self.secret, key.as_bytes(), &tag) {
            return Err(TokenError::InvalidSignature);
        }
        Ok(signature.to_string())
    }
}

fn split(token: &str) -> Result<(&str, &str), TokenError> {
    match token.split_once('.') {
        Some((key, sig)) if !key.is_empty() && !sig.is_empty() && !sig.contains('.') => Ok((key, sig)),
        _ => Err(TokenError::Malformed("expected <key>.<signature>".into())),
    }
}

impl TokenStrategy for HmacStrategy {
    fn generate(&self, _kind: TokenKind, _request: &Request) -> Result<TokenMaterial, TokenError> {
        self.generate_token()
    }

    fn validate(&self, _kind: TokenKind, token: &str) -> Result<String, TokenError> {
        self.validate_token(token)
    }

    fn signature(&self, token: &str) -> Result<String, TokenError> {
        split(token).map(|(_, sig)| sig.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth_core::strategy::TokenErrorKind;

    fn strategy() -> HmacStrategy {
        HmacStrategy::new(b"some-super-cool-secret-that-nobody-knows".to_vec()).unwrap()
    }

    #[test]
    fn generated_token_validates() {
        let s = strategy();
        let material = s.generate_token().unwrap();
        assert!(material.token.len() >= 64);
        assert_eq!(s.validate_token(&material.token).unwrap(), material.signature);
        assert_eq!(s.signature(&material.token).unwrap(), material.signature);
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = HmacStrategy::new(b"short".to_vec()).unwrap_err();
        assert_eq!(err.kind(), TokenErrorKind::Internal);
    }

    #[test]
    fn foreign_secret_fails_cryptographically() {
        let material = strategy().generate_token().unwrap();
        let other = HmacStrategy::new(vec![7u8; 32]).unwrap();
        let err = other.validate_token(&material.token).unwrap_err();
        assert_eq!(err.kind(), TokenErrorKind::Cryptographic);
    }

    #[test]
    fn tampered_key_fails_cryptographically() {
        let s = strategy();
        let material = s.generate_token().unwrap();
        let mut bytes = material.token.into_bytes();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let err = s.validate_token(&String::from_utf8(bytes).unwrap()).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn missing_delimiter_is_malformed() {
        let err = strategy().validate_token("nodelimiter").unwrap_err();
        assert_eq!(err.kind(), TokenErrorKind::Malformed);
        assert_eq!(strategy().signature("a.b.c").unwrap_err().kind(), TokenErrorKind::Malformed);
    }
}
