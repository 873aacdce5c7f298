//! HMAC-SHA256 request signing
//!
//! The vendor uses two signing layouts. Token endpoints sign
//! `client_id ++ t ++ nonce` and expect the raw digest base64-encoded;
//! resource endpoints sign `access_token ++ t` and expect upper-case hex.
//! Mixing the two is rejected by the vendor as an authentication failure.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Value of the `sign_method` header sent alongside every signature
pub const SIGN_METHOD: &str = "HMAC-SHA256";

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}

/// Sign a device (resource) request.
///
/// `client_id` is carried in its own header and is not part of the canonical string.
pub fn sign_device_request(
    _client_id: &str,
    access_token: &str,
    client_secret: &str,
    timestamp_ms: &str,
) -> String {
    let string_to_sign = format!("{}{}", access_token, timestamp_ms);
    hex::encode_upper(hmac_sha256(
        client_secret.as_bytes(),
        string_to_sign.as_bytes(),
    ))
}

/// Sign a token (obtain or refresh) request
pub fn sign_token_request(
    client_id: &str,
    client_secret: &str,
    timestamp_ms: &str,
    nonce: &str,
) -> String {
    let string_to_sign = format!("{}{}{}", client_id, timestamp_ms, nonce);
    STANDARD.encode(hmac_sha256(
        client_secret.as_bytes(),
        string_to_sign.as_bytes(),
    ))
}

/// Generate a single-use nonce for token requests
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}
