//! RS256 signed JSON Web Tokens.
//!
//! [`Rs256Signer`] signs and verifies caller supplied claims and headers.
//! [`JwtStrategy`] builds on it to issue self-contained access tokens,
//! refresh tokens and authorization codes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use ring::digest;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::config::OAuthConfig;
use super::request::Request;
use super::strategy::{TokenError, TokenKind, TokenMaterial, TokenStrategy};

/// The only signing method accepted on decode.
pub const SIGNING_METHOD: &str = "RS256";
const KEY_CHECK_MESSAGE: &[u8] = b"starberry-authz-key-check";

pub type Claims = Map<String, Value>;
pub type JwtHeader = Map<String, Value>;

/// A verified token split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJwt {
    pub header: JwtHeader,
    pub claims: Claims,
    pub signature: String,
}

/// Signs and verifies RS256 tokens with a fixed key pair.
pub struct Rs256Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for Rs256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rs256Signer").finish_non_exhaustive()
    }
}

impl Rs256Signer {
    /// Parse the PEM key pair and check that it can sign and verify.
    ///
    /// Keys smaller than 2048 bits and mismatched pairs fail here.
    pub fn from_pem(private_key_pem: &[u8], public_key_pem: &[u8]) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| TokenError::Key(format!("invalid private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| TokenError::Key(format!("invalid public key: {e}")))?;
        let signature = jsonwebtoken::crypto::sign(KEY_CHECK_MESSAGE, &encoding_key, Algorithm::RS256)
            .map_err(|e| TokenError::Key(format!("private key cannot sign: {e}")))?;
        let matches = jsonwebtoken::crypto::verify(&signature, KEY_CHECK_MESSAGE, &decoding_key, Algorithm::RS256)
            .map_err(|e| TokenError::Key(format!("public key cannot verify: {e}")))?;
        if !matches {
            return Err(TokenError::Key("public key does not match private key".into()));
        }
        Ok(Self { encoding_key, decoding_key })
    }

    /// Sign `claims` under `header`, returning the token and its signature segment.
    ///
    /// Both maps are required. Header entries never override `alg` or `typ`.
    pub fn generate(
        &self,
        claims: Option<&Claims>,
        header: Option<&JwtHeader>,
    ) -> Result<(String, String), TokenError> {
        let (Some(claims), Some(header)) = (claims, header) else {
            return Err(TokenError::Generation("either claims or header is missing".into()));
        };

        let mut full_header = JwtHeader::new();
        full_header.insert("alg".into(), Value::from(SIGNING_METHOD));
        full_header.insert("typ".into(), Value::from("JWT"));
        for (k, v) in header {
            full_header.entry(k.clone()).or_insert_with(|| v.clone());
        }

        let header_json = serde_json::to_vec(&full_header).map_err(|e| TokenError::Generation(e.to_string()))?;
        let claims_json = serde_json::to_vec(claims).map_err(|e| TokenError::Generation(e.to_string()))?;
        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header_json), URL_SAFE_NO_PAD.encode(claims_json));
        let signature = jsonwebtoken::crypto::sign(signing_input.as_bytes(), &self.encoding_key, Algorithm::RS256)
            .map_err(|e| TokenError::Generation(e.to_string()))?;

        Ok((format!("{signing_input}.{signature}"), signature))
    }

    /// Parse and verify a token.
    ///
    /// Checks run in order: segment count, header decoding, signing method,
    /// signature, claims decoding, then `exp`/`nbf`.
    pub fn decode(&self, token: &str) -> Result<DecodedJwt, TokenError> {
        let parts = segments(token)?;
        let header: JwtHeader = decode_segment(parts[0], "header")?;

        match header.get("alg").and_then(Value::as_str) {
            Some(SIGNING_METHOD) => {}
            found => {
                return Err(TokenError::AlgorithmMismatch {
                    expected: SIGNING_METHOD.to_string(),
                    found: found.unwrap_or("none").to_string(),
                });
            }
        }

        let signing_input = &token[..parts[0].len() + 1 + parts[1].len()];
        let verified =
            jsonwebtoken::crypto::verify(parts[2], signing_input.as_bytes(), &self.decoding_key, Algorithm::RS256)
                .map_err(|_| TokenError::InvalidSignature)?;
        if !verified {
            return Err(TokenError::InvalidSignature);
        }

        let claims: Claims = decode_segment(parts[1], "claims")?;
        check_time_claims(&claims)?;

        Ok(DecodedJwt { header, claims, signature: parts[2].to_string() })
    }

    /// Verify `token` and return its signature segment.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token).map(|decoded| decoded.signature)
    }

    /// The signature segment, without verification.
    pub fn signature(&self, token: &str) -> Result<String, TokenError> {
        segments(token).map(|parts| parts[2].to_string())
    }

    /// The digest underlying the signing method (SHA-256).
    pub fn hash(&self, input: &[u8]) -> Vec<u8> {
        digest::digest(&digest::SHA256, input).as_ref().to_vec()
    }

    /// Output length in bytes of [`Rs256Signer::hash`].
    pub fn signing_method_length(&self) -> usize {
        digest::SHA256.output_len()
    }
}

fn segments(token: &str) -> Result<Vec<&str>, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed("header, body and signature must all be set".into()));
    }
    Ok(parts)
}

fn decode_segment(segment: &str, what: &str) -> Result<Map<String, Value>, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed(format!("{what} is not base64url")))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed(format!("{what} is not a JSON object")))
}

fn check_time_claims(claims: &Claims) -> Result<(), TokenError> {
    let now = Utc::now().timestamp();
    if let Some(exp) = claims.get("exp") {
        let exp = exp.as_i64().ok_or_else(|| TokenError::Invalid("exp is not a number".into()))?;
        if exp <= now {
            return Err(TokenError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf") {
        let nbf = nbf.as_i64().ok_or_else(|| TokenError::Invalid("nbf is not a number".into()))?;
        if nbf > now {
            return Err(TokenError::Invalid("token is not valid yet".into()));
        }
    }
    Ok(())
}

/// Token strategy issuing RS256 JWTs for every token kind.
#[derive(Debug)]
pub struct JwtStrategy {
    signer: Rs256Signer,
    config: OAuthConfig,
}

impl JwtStrategy {
    pub fn new(signer: Rs256Signer, config: OAuthConfig) -> Self {
        Self { signer, config }
    }

    pub fn signer(&self) -> &Rs256Signer {
        &self.signer
    }

    fn lifespan_secs(&self, kind: TokenKind) -> Option<i64> {
        let lifespan = match kind {
            TokenKind::AccessToken => Some(self.config.access_token_lifespan),
            TokenKind::AuthorizeCode => Some(self.config.authorize_code_lifespan),
            TokenKind::RefreshToken => self.config.refresh_token_lifespan,
        };
        lifespan.map(|d| d.as_secs() as i64)
    }
}

impl TokenStrategy for JwtStrategy {
    fn generate(&self, kind: TokenKind, request: &Request) -> Result<TokenMaterial, TokenError> {
        let now = Utc::now().timestamp();
        let mut claims = Claims::new();
        claims.insert("jti".into(), Value::from(Uuid::new_v4().to_string()));
        claims.insert("sub".into(), Value::from(request.client.id.clone()));
        claims.insert("client_id".into(), Value::from(request.client.id.clone()));
        claims.insert("scope".into(), Value::from(request.granted_scopes.join(" ")));
        claims.insert("token_use".into(), Value::from(kind.as_str()));
        claims.insert("iat".into(), Value::from(now));
        if let Some(secs) = self.lifespan_secs(kind) {
            claims.insert("exp".into(), Value::from(now + secs));
        }
        if let Some(issuer) = &self.config.issuer {
            claims.insert("iss".into(), Value::from(issuer.clone()));
        }

        let (token, signature) = self.signer.generate(Some(&claims), Some(&JwtHeader::new()))?;
        debug!(kind = %kind, client_id = %request.client.id, "issued JWT");
        Ok(TokenMaterial { token, signature })
    }

    fn validate(&self, kind: TokenKind, token: &str) -> Result<String, TokenError> {
        let decoded = self.signer.decode(token)?;
        match decoded.claims.get("token_use").and_then(Value::as_str) {
            Some(used) if used == kind.as_str() => Ok(decoded.signature),
            _ => Err(TokenError::Invalid(format!("token is not an {kind}"))),
        }
    }

    fn signature(&self, token: &str) -> Result<String, TokenError> {
        self.signer.signature(token)
    }
}
