//! Archive linkage audit.
//!
//! The packaging job writes the bundle blob before the archive row, so a
//! crash in between can leave an archive row whose sessions were never
//! linked (or, historically, a blob with no row at all). This sweep
//! surfaces archive rows with zero linked sessions for manual repair.

use resonance_core::{archive::Archive, store::StudioStore};

use crate::{Error, Result};

pub async fn audit_archives<S: StudioStore>(store: &S) -> Result<Vec<Archive>> {
  let orphans = store.unlinked_archives().await.map_err(Error::store)?;
  for archive in &orphans {
    tracing::warn!(
      archive = %archive.name,
      "archive row has no linked sessions"
    );
  }
  Ok(orphans)
}
