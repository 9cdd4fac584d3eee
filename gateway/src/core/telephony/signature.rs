//! Webhook request signatures.
//!
//! The provider signs each webhook with HMAC-SHA256 keyed by the account auth
//! token, over the full request URL followed by every form parameter as
//! `key` + `value`, sorted by key. The base64 digest arrives in a header.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-telephony-signature";

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature for a webhook request.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut payload = String::from(url);
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }

    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(auth_token.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Check a provided signature in constant time.
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    provided: &str,
) -> bool {
    let expected = compute_signature(auth_token, url, params);
    if expected.is_empty() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.trim().as_bytes()).into()
}
