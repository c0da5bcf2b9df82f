//! # Webhook Signature Verification
//!
//! HMAC helpers shared by the provider connectors. Every comparison is
//! constant-time and every malformed input yields `false`; nothing here panics
//! or returns an error.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

/// Lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
pub fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Base64 HMAC-SHA1 of `payload` keyed by `secret`.
pub fn hmac_sha1_base64(secret: &str, payload: &[u8]) -> String {
    let mut mac = match HmacSha1::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a hex HMAC-SHA256 signature (HubSpot, Bigin).
///
/// Accepts an optional `sha256=` prefix and is case-insensitive on the hex
/// digits. A signature of the wrong length is a mismatch.
pub fn verify_hmac_sha256_hex(payload: &[u8], signature: &str, secret: &str) -> bool {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let Ok(provided) = hex::decode(signature) else {
        debug!("Webhook signature is not valid hex");
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    constant_time_eq(expected.as_slice(), &provided)
}

/// Verify a base64 HMAC-SHA1 signature (Trello).
pub fn verify_hmac_sha1_base64(payload: &[u8], signature: &str, secret: &str) -> bool {
    let expected = hmac_sha1_base64(secret, payload);
    constant_time_eq(expected.as_bytes(), signature.trim().as_bytes())
}

/// Unequal lengths are a mismatch, never an error.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected.ct_eq(provided).into()
}
