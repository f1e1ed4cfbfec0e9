//! Archive — an immutable record of one exported bundle.
//!
//! Created exactly once per (time-window, language) combination by the
//! packaging job. Sessions acquire their archive reference exactly once,
//! permanently; archives are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::BlobRef;

/// A persisted export bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
  pub archive_id:       i64,
  /// The full bundle name, e.g.
  /// `ARCHIVE/2024/Resonance Speech Database [EN] 2024-01-03 - 2024-01-29.zip`.
  /// Part of the external contract; also the idempotency key.
  pub name:             String,
  pub file:             BlobRef,
  pub description_name: String,
  pub location:         String,
  pub equipment:        String,
  pub created_at:       DateTime<Utc>,
}

/// Input to [`crate::store::StudioStore::create_archive`].
#[derive(Debug, Clone)]
pub struct NewArchive {
  pub name:             String,
  pub file:             BlobRef,
  pub description_name: String,
  pub location:         String,
  pub equipment:        String,
}

/// Free-text documentation block rendered into the bundle's `DOC/` entry:
/// studio name, location, and equipment description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
  pub name:      String,
  pub location:  String,
  pub equipment: String,
}
