//! Error type for `resonance-jobs`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Another instance of the named job is running; the trigger is
  /// rejected, not queued.
  #[error("job {0:?} is already running")]
  AlreadyRunning(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("blob storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("scheduling provider error: {0}")]
  Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("bundle error: {0}")]
  Bundle(#[from] resonance_bundle::Error),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  pub(crate) fn provider<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Provider(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
