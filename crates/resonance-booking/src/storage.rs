//! [`FsBlobStore`] — local-disk implementation of [`BlobStore`].
//!
//! Keys map directly onto paths under the configured root. Keys are
//! validated so a reference can never escape the root directory.

use std::path::{Component, Path, PathBuf};

use resonance_core::blob::{BlobRef, BlobStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsBlobError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid blob key: {0:?}")]
  InvalidKey(String),

  #[error("blob not found: {0}")]
  NotFound(String),
}

#[derive(Clone)]
pub struct FsBlobStore {
  root: PathBuf,
}

impl FsBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Resolve a key to its on-disk path. Only plain relative components
  /// are accepted.
  fn path_for(&self, key: &str) -> Result<PathBuf, FsBlobError> {
    let path = Path::new(key);
    let plain = !key.is_empty()
      && path.is_relative()
      && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
      return Err(FsBlobError::InvalidKey(key.to_owned()));
    }
    Ok(self.root.join(path))
  }
}

impl BlobStore for FsBlobStore {
  type Error = FsBlobError;

  async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<BlobRef, FsBlobError> {
    let path = self.path_for(key)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, bytes).await?;
    Ok(BlobRef::new(key))
  }

  async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, FsBlobError> {
    let path = self.path_for(&blob.key)?;
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(bytes),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        Err(FsBlobError::NotFound(blob.key.clone()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn delete(&self, blob: &BlobRef) -> Result<(), FsBlobError> {
    let path = self.path_for(&blob.key)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      // Idempotent: a missing blob is already deleted.
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  async fn exists(&self, key: &str) -> Result<bool, FsBlobError> {
    let path = self.path_for(key)?;
    Ok(tokio::fs::try_exists(&path).await?)
  }
}
