//! Cryptographic utilities (PKCE, HMAC, secret hashing, entropy) using `ring`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, error::Unspecified, hmac};

/// PKCE method that sends the verifier as-is.
pub const PKCE_METHOD_PLAIN: &str = "plain";
/// PKCE method that sends the SHA-256 of the verifier.
pub const PKCE_METHOD_S256: &str = "S256";

/// Generate a PKCE code challenge from the given verifier using SHA-256 and base64url (no padding).
pub fn pkce_code_challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

/// Check a PKCE verifier against the challenge stored at authorize time.
pub fn pkce_verify(method: &str, challenge: &str, verifier: &str) -> bool {
    let computed = match method {
        PKCE_METHOD_S256 => pkce_code_challenge(verifier),
        PKCE_METHOD_PLAIN => verifier.to_string(),
        _ => return false,
    };
    constant_time_eq(computed.as_bytes(), challenge.as_bytes())
}

/// Create an HMAC-SHA256 tag for the given data using the provided secret key.
pub fn hmac_sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let s_key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&s_key, data);
    tag.as_ref().to_vec()
}

/// Verify an HMAC-SHA256 tag for the given data and key.
pub fn hmac_verify(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    let s_key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&s_key, data, tag).is_ok()
}

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

/// Fill `len` bytes from the system CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, Unspecified> {
    let mut buf = vec![0u8; len];
    SystemRandom::new().fill(&mut buf)?;
    Ok(buf)
}

/// Hash a client secret for storage (SHA-256, base64url).
pub fn hash_secret(secret: &str) -> String {
    URL_SAFE_NO_PAD.encode(sha256(secret.as_bytes()))
}

/// Compare a presented secret against a hash produced by [`hash_secret`].
pub fn verify_secret(hashed: &str, presented: &str) -> bool {
    constant_time_eq(hashed.as_bytes(), hash_secret(presented).as_bytes())
}

/// Compares through an HMAC under a fresh random key, so timing reveals nothing about `a` or `b`.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let Ok(key) = hmac::Key::generate(hmac::HMAC_SHA256, &SystemRandom::new()) else {
        return false;
    };
    let tag = hmac::sign(&key, a);
    hmac::verify(&key, b, tag.as_ref()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_s256_matches_rfc7636_example() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(pkce_code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert!(pkce_verify(PKCE_METHOD_S256, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM", verifier));
        assert!(!pkce_verify("S512", "x", "x"));
    }

    #[test]
    fn hmac_round_trip() {
        let tag = hmac_sign(b"key", b"data");
        assert!(hmac_verify(b"key", b"data", &tag));
        assert!(!hmac_verify(b"other", b"data", &tag));
    }

    #[test]
    fn constant_time_eq_compares_contents() {
        assert!(constant_time_eq(b"same-bytes", b"same-bytes"));
        assert!(!constant_time_eq(b"same-bytes", b"same-bytez"));
        assert!(!constant_time_eq(b"short", b"shorter"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn secret_hash_verifies() {
        let hashed = hash_secret("foobar");
        assert!(verify_secret(&hashed, "foobar"));
        assert!(!verify_secret(&hashed, "foobar-wrong"));
    }
}
