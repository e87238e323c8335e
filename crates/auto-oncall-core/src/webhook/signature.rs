//! HMAC-SHA1 verification of the `X-Hub-Signature` header.

use crate::SecretString;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Prefix GitHub puts in front of the hex digest
pub const SIGNATURE_PREFIX: &str = "sha1=";

/// Exact length of a well-formed header: the prefix plus 40 hex digits
pub const SIGNATURE_HEADER_LENGTH: usize = 45;

/// Verifies webhook deliveries against the shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Check `signature_header` against the HMAC-SHA1 of `payload`.
    pub fn verify(&self, signature_header: &str, payload: &[u8]) -> bool {
        verify_signature(self.secret.expose_bytes(), signature_header, payload)
    }
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Verify a `sha1=<hex>` header for `payload` signed with `secret`.
///
/// Returns `false` without computing the HMAC when the header is not exactly
/// [`SIGNATURE_HEADER_LENGTH`] characters, lacks the `sha1=` prefix or is not
/// hex. The digest comparison itself is constant time.
pub fn verify_signature(secret: &[u8], signature_header: &str, payload: &[u8]) -> bool {
    if signature_header.len() != SIGNATURE_HEADER_LENGTH {
        return false;
    }

    let Some(hex_digest) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    let Ok(provided) = hex::decode(hex_digest) else {
        return false;
    };

    let Some(expected) = compute_digest(secret, payload) else {
        return false;
    };

    if expected.len() != provided.len() {
        return false;
    }

    expected.ct_eq(&provided).into()
}

/// Produce the `X-Hub-Signature` value GitHub would send for `payload`.
pub fn compute_signature_header(secret: &[u8], payload: &[u8]) -> Option<String> {
    compute_digest(secret, payload)
        .map(|digest| format!("{}{}", SIGNATURE_PREFIX, hex::encode(digest)))
}

fn compute_digest(secret: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha1::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
