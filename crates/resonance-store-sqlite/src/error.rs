//! Error type for `resonance-store-sqlite`.
//!
//! Domain rejections (conflicts, policy violations) never appear here —
//! they travel as [`resonance_core::store::StoreError::Domain`]. This type
//! is the backend half only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {kind} code in database: {value:?}")]
  UnknownCode { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
