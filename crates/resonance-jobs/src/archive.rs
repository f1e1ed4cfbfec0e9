//! The archive packaging job.
//!
//! Selects eligible completed sessions for a window and language, builds
//! the export bundle, persists it, and links the contributing sessions to
//! the new archive row — exactly once. Idempotent under re-delivery: a
//! second trigger with the same parameters computes the same bundle name,
//! finds the existing blob, and aborts without touching anything.

use chrono::{DateTime, Utc};
use serde::Serialize;

use resonance_bundle::{PromptBundle, SessionBundle, naming};
use resonance_core::{
  archive::{Description, NewArchive},
  blob::BlobStore,
  job::JobRun,
  store::{ArchiveCandidate, StudioStore},
};

use crate::{Error, Result};

/// Job-lock name; at most one packaging run at a time.
pub const ARCHIVE_JOB: &str = "create-archive";

#[derive(Debug, Clone)]
pub struct ArchiveParams {
  pub start:    DateTime<Utc>,
  pub end:      DateTime<Utc>,
  pub language: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
  /// Nothing matched the selection; no side effects.
  NoEligibleSessions,
  /// A bundle with the computed name already exists; no side effects.
  BundleExists { name: String },
  Created { name: String, sessions_archived: usize },
}

impl ArchiveOutcome {
  /// Label recorded on the job run.
  pub fn label(&self) -> &'static str {
    match self {
      Self::NoEligibleSessions => "no-eligible-sessions",
      Self::BundleExists { .. } => "bundle-exists",
      Self::Created { .. } => "created",
    }
  }
}

/// Acquire the job lock, package, release. Rejects a concurrent run with
/// [`Error::AlreadyRunning`] instead of queueing behind it.
pub async fn create_archive<S, B>(
  store: &S,
  blobs: &B,
  description: &Description,
  params: &ArchiveParams,
) -> Result<ArchiveOutcome>
where
  S: StudioStore,
  B: BlobStore,
{
  let run = store
    .begin_job(ARCHIVE_JOB)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::AlreadyRunning(ARCHIVE_JOB.to_owned()))?;

  run_with_lock(run, store, blobs, description, params).await
}

/// Package under an already-acquired job run and record the outcome on it.
/// Split out so a trigger endpoint can acquire the lock synchronously and
/// run the build in a spawned task.
pub async fn run_with_lock<S, B>(
  run: JobRun,
  store: &S,
  blobs: &B,
  description: &Description,
  params: &ArchiveParams,
) -> Result<ArchiveOutcome>
where
  S: StudioStore,
  B: BlobStore,
{
  let result = package(store, blobs, description, params).await;

  let label = match &result {
    Ok(outcome) => outcome.label(),
    Err(_) => "failed",
  };
  if let Err(e) = store.finish_job(run.job_run_id, label).await {
    tracing::warn!(job = ARCHIVE_JOB, error = %e, "failed to record job outcome");
  }

  result
}

async fn package<S, B>(
  store: &S,
  blobs: &B,
  description: &Description,
  params: &ArchiveParams,
) -> Result<ArchiveOutcome>
where
  S: StudioStore,
  B: BlobStore,
{
  // 1. Selection: contained-by the window, matching language, at least one
  //    recording, not yet archived. Ordered by session start.
  let candidates = store
    .archive_candidates(params.start, params.end, &params.language)
    .await
    .map_err(Error::store)?;

  // 2. Empty selection short-circuits with zero side effects.
  if candidates.is_empty() {
    return Ok(ArchiveOutcome::NoEligibleSessions);
  }

  // 3. Deterministic name; an existing blob means this window was already
  //    packaged — abort before any write.
  let first_date = candidates[0].session.range.start().date_naive();
  let last_date = candidates[candidates.len() - 1]
    .session
    .range
    .start()
    .date_naive();
  let name = naming::archive_name(&params.language, first_date, last_date);

  let row_exists = store
    .find_archive_by_name(&name)
    .await
    .map_err(Error::store)?
    .is_some();
  if row_exists || blobs.exists(&name).await.map_err(Error::storage)? {
    tracing::info!(bundle = %name, "bundle already exists, aborting");
    return Ok(ArchiveOutcome::BundleExists { name });
  }

  // 4. Assemble in memory: fetch every recording, render the bundle.
  let mut sessions = Vec::with_capacity(candidates.len());
  for candidate in &candidates {
    sessions.push(session_bundle(blobs, candidate).await?);
  }
  let bytes = resonance_bundle::build(description, &params.language, &sessions)?;

  // 5. Persist the bundle. A failed write must not produce an archive row.
  let file = blobs.put(&name, bytes).await.map_err(Error::storage)?;

  // 6. Archive row + session linkage, one transaction.
  let session_ids: Vec<i64> =
    candidates.iter().map(|c| c.session.session_id).collect();
  let sessions_archived = session_ids.len();
  store
    .create_archive(
      NewArchive {
        name:             name.clone(),
        file,
        description_name: description.name.clone(),
        location:         description.location.clone(),
        equipment:        description.equipment.clone(),
      },
      session_ids,
    )
    .await
    .map_err(Error::store)?;

  tracing::info!(bundle = %name, sessions = sessions_archived, "archive created");
  Ok(ArchiveOutcome::Created { name, sessions_archived })
}

async fn session_bundle<B: BlobStore>(
  blobs: &B,
  candidate: &ArchiveCandidate,
) -> Result<SessionBundle> {
  let start = candidate.session.range.start();

  let mut prompts = Vec::with_capacity(candidate.prompts.len());
  for prompt in &candidate.prompts {
    let Some(recording) = &prompt.recording else { continue };
    let wave = blobs.get(recording).await.map_err(Error::storage)?;
    prompts.push(PromptBundle {
      prompt_id: prompt.prompt_id,
      mediaitem: prompt.mediaitem.clone(),
      instruction: prompt.instruction,
      wave,
    });
  }

  Ok(SessionBundle {
    speaker_id: candidate.speaker.speaker_id,
    sex: candidate.speaker.sex,
    age: candidate.speaker.age_at(start.date_naive()),
    accent: candidate.speaker.accent.clone(),
    start,
    end: candidate.session.range.end(),
    prompts,
  })
}

#[cfg(test)]
mod tests {
  use std::io::{Cursor, Read as _};

  use chrono::TimeZone;
  use resonance_core::blob::{BlobRef, MemoryBlobStore};
  use resonance_store_sqlite::SqliteStore;
  use zip::ZipArchive;

  use super::*;
  use crate::testutil::{description, seed_recorded_session, store};

  fn params() -> ArchiveParams {
    ArchiveParams {
      start:    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      end:      Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
      language: "en".to_owned(),
    }
  }

  async fn seeded() -> (SqliteStore, MemoryBlobStore) {
    let s = store().await;
    let blobs = MemoryBlobStore::new();
    // Three eligible English sessions in January, two prompts each.
    seed_recorded_session(&s, &blobs, 3, "Alice", 2).await;
    seed_recorded_session(&s, &blobs, 4, "Bob", 2).await;
    seed_recorded_session(&s, &blobs, 5, "Carol", 2).await;
    (s, blobs)
  }

  #[tokio::test]
  async fn january_window_packages_three_sessions() {
    let (s, blobs) = seeded().await;

    let outcome = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    let ArchiveOutcome::Created { name, sessions_archived } = outcome else {
      panic!("expected Created, got {outcome:?}");
    };
    assert_eq!(sessions_archived, 3);
    assert_eq!(
      name,
      "ARCHIVE/2024/Resonance Speech Database [EN] 2024-01-03 - 2024-01-05.zip"
    );

    // Exactly those three sessions now carry the archive reference.
    let sessions = s.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 3);
    assert!(sessions.iter().all(|x| x.archive_id.is_some()));

    // The bundle holds 3 speaker rows, one script file per session, one
    // wave per recorded prompt.
    let bytes = blobs.get(&BlobRef::new(&name)).await.unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let mut table = String::new();
    archive
      .by_name("TABLE/SPEAKER.TXT")
      .unwrap()
      .read_to_string(&mut table)
      .unwrap();
    assert_eq!(table.lines().count(), 4); // header + 3 rows

    let names: Vec<String> = (0..archive.len())
      .map(|i| archive.by_index(i).unwrap().name().to_owned())
      .collect();
    assert_eq!(
      names.iter().filter(|n| n.starts_with("DATA/CHANNEL0/SCRIPT/")).count(),
      3
    );
    assert_eq!(
      names.iter().filter(|n| n.ends_with(".wav")).count(),
      6
    );
  }

  #[tokio::test]
  async fn rerun_with_identical_parameters_is_a_no_op() {
    let (s, blobs) = seeded().await;

    create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    let blobs_after_first = blobs.len();

    // The archived sessions drop out of the selection, so a literal rerun
    // short-circuits at step 1 already.
    let outcome = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    assert!(matches!(outcome, ArchiveOutcome::NoEligibleSessions));
    assert_eq!(s.list_archives().await.unwrap().len(), 1);
    assert_eq!(blobs.len(), blobs_after_first);
  }

  #[tokio::test]
  async fn existing_bundle_name_aborts_before_any_write() {
    // A redelivered trigger after a crash between blob write and row
    // creation: the blob exists under the computed name, but no archive
    // row does. The job must detect the blob and touch nothing.
    let (s, blobs) = seeded().await;
    blobs
      .put(
        "ARCHIVE/2024/Resonance Speech Database [EN] 2024-01-03 - 2024-01-05.zip",
        vec![0u8],
      )
      .await
      .unwrap();
    let blobs_before = blobs.len();

    let outcome = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    assert!(matches!(outcome, ArchiveOutcome::BundleExists { .. }));

    // No archive row, no re-marked sessions, no new blobs.
    assert!(s.list_archives().await.unwrap().is_empty());
    assert_eq!(blobs.len(), blobs_before);
    let sessions = s.list_sessions().await.unwrap();
    assert!(sessions.iter().all(|x| x.archive_id.is_none()));
  }

  #[tokio::test]
  async fn empty_selection_has_no_side_effects() {
    let s = store().await;
    let blobs = MemoryBlobStore::new();

    let outcome = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    assert!(matches!(outcome, ArchiveOutcome::NoEligibleSessions));
    assert!(blobs.is_empty());
    assert!(s.list_archives().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn concurrent_trigger_is_rejected() {
    let (s, blobs) = seeded().await;

    let held = s.begin_job(ARCHIVE_JOB).await.unwrap().unwrap();
    let err = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning(_)));

    // Releasing the lock lets the job run.
    s.finish_job(held.job_run_id, "interrupted").await.unwrap();
    let outcome = create_archive(&s, &blobs, &description(), &params())
      .await
      .unwrap();
    assert!(matches!(outcome, ArchiveOutcome::Created { .. }));
  }

  #[tokio::test]
  async fn failed_bundle_write_leaves_no_archive_row() {
    use resonance_core::blob::{BlobRef, BlobStore};

    #[derive(Debug, thiserror::Error)]
    #[error("storage offline")]
    struct Offline;

    /// Blob store whose writes always fail; reads delegate to an inner
    /// store holding the recordings.
    struct FailingPut(MemoryBlobStore);

    impl BlobStore for FailingPut {
      type Error = Offline;

      async fn put(&self, _key: &str, _bytes: Vec<u8>) -> Result<BlobRef, Offline> {
        Err(Offline)
      }
      async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, Offline> {
        self.0.get(blob).await.map_err(|_| Offline)
      }
      async fn delete(&self, _blob: &BlobRef) -> Result<(), Offline> { Ok(()) }
      async fn exists(&self, key: &str) -> Result<bool, Offline> {
        self.0.exists(key).await.map_err(|_| Offline)
      }
    }

    let (s, blobs) = seeded().await;
    let failing = FailingPut(blobs);

    let err = create_archive(&s, &failing, &description(), &params())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    assert!(s.list_archives().await.unwrap().is_empty());
    let runs = s.job_runs(ARCHIVE_JOB).await.unwrap();
    assert_eq!(runs[0].outcome.as_deref(), Some("failed"));
  }
}
