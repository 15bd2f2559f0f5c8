//! Keyed-hash proofs over access tokens and webhook payloads.
//!
//! Secured Graph API calls carry an `appsecret_proof` query parameter: the
//! hex HMAC-SHA256 of the access token keyed with the app secret. Inbound
//! webhook and Flow requests are signed the same way over the raw body and
//! delivered in the `X-Hub-Signature-256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature on inbound requests.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors produced while signing or verifying.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("access token is empty, cannot compute appsecret_proof")]
    EmptyAccessToken,
    #[error("app secret is empty, cannot compute appsecret_proof")]
    EmptyAppSecret,
    #[error("missing payload signature")]
    MissingSignature,
    #[error("malformed payload signature")]
    MalformedSignature,
    #[error("payload signature mismatch")]
    SignatureMismatch,
}

fn mac(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    <HmacSha256 as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!())
}

/// Compute the `appsecret_proof` for an access token.
///
/// # Example
///
/// ```
/// let proof = wacloud_core::app_secret_proof("tok", "sec").unwrap();
/// assert_eq!(proof.len(), 64);
/// ```
pub fn app_secret_proof(access_token: &str, app_secret: &str) -> Result<String, SignError> {
    if access_token.is_empty() {
        return Err(SignError::EmptyAccessToken);
    }
    if app_secret.is_empty() {
        return Err(SignError::EmptyAppSecret);
    }
    let mut mac = mac(app_secret.as_bytes());
    mac.update(access_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Sign a raw payload, producing the `X-Hub-Signature-256` header value.
pub fn sign_payload(app_secret: &str, body: &[u8]) -> String {
    let mut mac = mac(app_secret.as_bytes());
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Hub-Signature-256` header against the raw payload.
///
/// The comparison runs in constant time.
pub fn verify_signature(app_secret: &str, header: Option<&str>, body: &[u8]) -> Result<(), SignError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty());
    let header = header.ok_or(SignError::MissingSignature)?;
    let digest = header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or(SignError::MalformedSignature)?;
    let expected = hex::decode(digest).map_err(|_| SignError::MalformedSignature)?;

    let mut mac = mac(app_secret.as_bytes());
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignError::SignatureMismatch)
}
