//! Error type for `resonance-scheduling`.
//!
//! Everything here is an `ExternalProviderError` in the system taxonomy:
//! retryable by the background-job layer, never a reason to leave local
//! rows half-written.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("provider returned {status}: {body}")]
  Api { status: u16, body: String },

  #[error("malformed provider response: {0}")]
  Malformed(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
