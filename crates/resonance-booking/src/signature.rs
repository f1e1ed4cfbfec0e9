//! Webhook signature verification.
//!
//! Two trust boundaries, both HMAC-SHA256 over the raw request body and
//! both verified before any parsing:
//!
//! - Form submissions: `typeform-signature: sha256=<base64 digest>`.
//! - Scheduling provider: `calendly-webhook-signature: t=<unix>,v1=<hex>`,
//!   signing payload `"{t}.{raw_body}"`, with a replay-tolerance window
//!   on `t`.
//!
//! Comparison is constant-time via [`hmac::Mac::verify_slice`].

use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

pub const FORM_SIGNATURE_HEADER: &str = "typeform-signature";
pub const PROVIDER_SIGNATURE_HEADER: &str = "calendly-webhook-signature";

/// Provider timestamps older than this are rejected even with a valid
/// signature (replay protection).
pub const PROVIDER_TOLERANCE_SECS: i64 = 3 * 60;

fn mac_for(secret: &str) -> Result<HmacSha256, Error> {
  HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::Unauthorized)
}

/// Verify a form-submission signature: `sha256=<base64(hmac(secret, body))>`.
pub fn verify_form_signature(
  headers: &HeaderMap,
  body: &[u8],
  secret: &str,
) -> Result<(), Error> {
  let value = headers
    .get(FORM_SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  // Split at the first '=' only; the base64 payload may end in padding.
  let (scheme, signature) = value.split_once('=').ok_or(Error::Unauthorized)?;
  if scheme != "sha256" {
    return Err(Error::Unauthorized);
  }

  let expected = B64.decode(signature).map_err(|_| Error::Unauthorized)?;

  let mut mac = mac_for(secret)?;
  mac.update(body);
  mac.verify_slice(&expected).map_err(|_| Error::Unauthorized)
}

/// Verify a scheduling-provider signature: `t=<unix>,v1=<hex hmac>` over
/// the payload `"{t}.{body}"`, then enforce the replay window against
/// `now`.
pub fn verify_provider_signature(
  headers: &HeaderMap,
  body: &[u8],
  signing_key: &str,
  now: DateTime<Utc>,
) -> Result<(), Error> {
  let value = headers
    .get(PROVIDER_SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let mut timestamp = None;
  let mut signature = None;
  for part in value.split(',') {
    match part.trim().split_once('=') {
      Some(("t", v)) => timestamp = Some(v),
      Some(("v1", v)) => signature = Some(v),
      _ => {}
    }
  }
  let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
    return Err(Error::Unauthorized);
  };

  let expected = hex::decode(signature).map_err(|_| Error::Unauthorized)?;

  let mut mac = mac_for(signing_key)?;
  mac.update(timestamp.as_bytes());
  mac.update(b".");
  mac.update(body);
  mac.verify_slice(&expected).map_err(|_| Error::Unauthorized)?;

  // Replay window, checked only after the signature holds.
  let seconds: i64 = timestamp.parse().map_err(|_| Error::Unauthorized)?;
  let signed_at =
    DateTime::from_timestamp(seconds, 0).ok_or(Error::Unauthorized)?;
  if signed_at < now - Duration::seconds(PROVIDER_TOLERANCE_SECS) {
    return Err(Error::Unauthorized);
  }

  Ok(())
}
