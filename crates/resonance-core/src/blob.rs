//! Blob storage seam.
//!
//! Release forms, recordings, and archive bundles live in a key-addressed
//! blob store behind this trait. Row lifecycles drive blob lifecycles:
//! whoever clears or deletes a row holding a [`BlobRef`] must delete the
//! underlying blob. Storage failures on that path are logged, never fatal.

use std::{
  collections::HashMap,
  future::Future,
  sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reference to a stored blob. The key doubles as the storage path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef {
  pub key: String,
}

impl BlobRef {
  pub fn new(key: impl Into<String>) -> Self { Self { key: key.into() } }
}

impl std::fmt::Display for BlobRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.key)
  }
}

/// Abstraction over durable blob storage.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `bytes` under `key`, overwriting any existing blob.
  fn put<'a>(
    &'a self,
    key: &'a str,
    bytes: Vec<u8>,
  ) -> impl Future<Output = Result<BlobRef, Self::Error>> + Send + 'a;

  /// Fetch a blob's contents. Missing blobs are an error.
  fn get<'a>(
    &'a self,
    blob: &'a BlobRef,
  ) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send + 'a;

  /// Delete a blob. Idempotent: deleting a missing key is not an error.
  fn delete<'a>(
    &'a self,
    blob: &'a BlobRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// `true` if a blob exists under `key`.
  fn exists<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── In-memory implementation ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryBlobError {
  #[error("blob not found: {0}")]
  NotFound(String),
}

/// In-process blob store used by tests across the workspace.
///
/// Cloning is cheap — clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
  blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
  pub fn new() -> Self { Self::default() }

  /// Number of blobs currently stored.
  pub fn len(&self) -> usize { self.blobs.lock().unwrap().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl BlobStore for MemoryBlobStore {
  type Error = MemoryBlobError;

  async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<BlobRef, MemoryBlobError> {
    self.blobs.lock().unwrap().insert(key.to_owned(), bytes);
    Ok(BlobRef::new(key))
  }

  async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, MemoryBlobError> {
    self
      .blobs
      .lock()
      .unwrap()
      .get(&blob.key)
      .cloned()
      .ok_or_else(|| MemoryBlobError::NotFound(blob.key.clone()))
  }

  async fn delete(&self, blob: &BlobRef) -> Result<(), MemoryBlobError> {
    self.blobs.lock().unwrap().remove(&blob.key);
    Ok(())
  }

  async fn exists(&self, key: &str) -> Result<bool, MemoryBlobError> {
    Ok(self.blobs.lock().unwrap().contains_key(key))
  }
}
