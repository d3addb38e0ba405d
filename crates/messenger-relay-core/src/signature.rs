//! `X-Hub-Signature` verification for inbound webhook deliveries.
//!
//! The platform signs every POST body with HMAC-SHA1 keyed by the app secret
//! and sends the digest as `sha1=<hex>`. Anything that does not match that
//! shape, names another algorithm or carries a different digest is rejected.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::debug;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";
const ALGORITHM: &str = "sha1";

type HmacSha1 = Hmac<Sha1>;

/// Returns `true` only when `header` is `sha1=<hex>` and the digest matches
/// the HMAC-SHA1 of `body` under `secret`.
pub fn verify_signature(body: &[u8], header: &str, secret: &[u8]) -> bool {
    let mut parts = header.split('=');
    let (algorithm, digest) = match (parts.next(), parts.next(), parts.next()) {
        (Some(algorithm), Some(digest), None) => (algorithm, digest),
        _ => {
            debug!("signature header does not have the expected format");
            return false;
        }
    };
    if algorithm != ALGORITHM {
        debug!(algorithm, "signature algorithm not supported");
        return false;
    }
    let expected = match hex::decode(digest) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => {
            debug!("signature digest is not valid hex");
            return false;
        }
    };
    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the header value the platform would send for `body`.
pub fn sign_payload(body: &[u8], secret: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    format!("{ALGORITHM}={}", hex::encode(digest))
}
