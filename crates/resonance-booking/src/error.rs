//! Error types and axum `IntoResponse` implementation.
//!
//! Authentication failures are deliberately information-free: the caller
//! learns only that the request was rejected, never why. Policy
//! violations carry their message — they are operator-facing.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use resonance_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found")]
  NotFound,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("policy violation: {0}")]
  Policy(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("blob storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("scheduling provider error: {0}")]
  Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Map a store failure onto the HTTP error taxonomy.
  pub fn from_store<E>(e: StoreError<E>) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    match e {
      StoreError::Domain(d) if d.is_not_found() => Self::NotFound,
      StoreError::Domain(d) if d.is_conflict() => Self::Conflict(d.to_string()),
      StoreError::Domain(d) if d.is_policy_violation() => {
        Self::Policy(d.to_string())
      }
      StoreError::Domain(d) => Self::BadRequest(d.to_string()),
      StoreError::Backend(e) => Self::Store(Box::new(e)),
    }
  }

  pub fn from_provider<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Provider(Box::new(e))
  }

  pub fn from_storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  pub fn from_job(e: resonance_jobs::Error) -> Self {
    match e {
      resonance_jobs::Error::AlreadyRunning(name) => {
        Self::Conflict(format!("job {name:?} is already running"))
      }
      resonance_jobs::Error::Provider(e) => Self::Provider(e),
      resonance_jobs::Error::Storage(e) => Self::Storage(e),
      other => Self::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      Error::Unauthorized => {
        // Generic rejection, no detail leaked.
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
      }
      Error::NotFound => (StatusCode::NOT_FOUND, "not found".to_owned()),
      Error::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      Error::Conflict(m) => (StatusCode::CONFLICT, m),
      Error::Policy(m) => (StatusCode::CONFLICT, m),
      Error::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
      Error::Storage(e) => {
        tracing::error!(error = %e, "blob storage failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
      Error::Provider(e) => {
        tracing::error!(error = %e, "scheduling provider failure");
        (StatusCode::BAD_GATEWAY, "scheduling provider unavailable".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
