//! The `StudioStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g.
//! `resonance-store-sqlite`). Higher layers (webhook handlers, background
//! jobs) depend on this abstraction, not on any concrete backend.
//!
//! Domain failures (overlap conflicts, lifecycle policy violations) are
//! part of the contract and surface as [`StoreError::Domain`]; backend
//! failures (I/O, corruption) surface through the associated error type.

use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use crate::{
  archive::{Archive, NewArchive},
  blob::BlobRef,
  job::JobRun,
  range::SessionRange,
  script::{NewPrompt, RecPrompt, Script},
  session::{NewSession, Session},
  speaker::{NewSpeaker, Speaker},
};

// ─── Error ───────────────────────────────────────────────────────────────────

/// Store failure: either a domain rule rejected the write, or the backend
/// itself failed.
#[derive(Debug, Error)]
pub enum StoreError<E> {
  #[error(transparent)]
  Domain(#[from] crate::Error),

  #[error("backend error: {0}")]
  Backend(E),
}

pub type StoreResult<T, E> = Result<T, StoreError<E>>;

// ─── Result types ────────────────────────────────────────────────────────────

/// A confirmed booking: the session plus its exclusively-owned speaker,
/// created atomically.
#[derive(Debug, Clone)]
pub struct Booking {
  pub session: Session,
  pub speaker: Speaker,
}

/// The result of deleting (cancelling) a session. The rows are gone; the
/// caller owes the blob store one delete per orphaned reference.
#[derive(Debug, Clone)]
pub struct DeletedSession {
  pub session_id:     i64,
  pub speaker_id:     i64,
  pub orphaned_blobs: Vec<BlobRef>,
}

/// One session eligible for archiving, with everything the packaging job
/// needs: the owning speaker, the assigned script, and the recorded
/// prompts only, ordered by prompt id.
#[derive(Debug, Clone)]
pub struct ArchiveCandidate {
  pub session: Session,
  pub speaker: Speaker,
  pub script:  Script,
  pub prompts: Vec<RecPrompt>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the studio's storage backend.
///
/// Implementations must make every check-then-write sequence atomic: the
/// overlap exclusion check, the script pool claim, and the archive linkage
/// each run inside one transaction so concurrent callers cannot interleave.
pub trait StudioStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Bookings ──────────────────────────────────────────────────────────

  /// Create a speaker and its session atomically.
  ///
  /// Fails with [`crate::Error::OverlappingSession`] if the range
  /// intersects any existing session's range; in that case neither row is
  /// written.
  fn create_booking(
    &self,
    speaker: NewSpeaker,
    session: NewSession,
  ) -> impl Future<Output = StoreResult<Booking, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<Option<Session>, Self::Error>> + Send + '_;

  fn list_sessions(
    &self,
  ) -> impl Future<Output = StoreResult<Vec<Session>, Self::Error>> + Send + '_;

  fn get_speaker(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<Option<Speaker>, Self::Error>> + Send + '_;

  /// Find the session whose range matches `range` exactly. Webhook
  /// handlers re-derive their target this way, which is what makes
  /// duplicate event delivery a no-op.
  fn find_session_by_range(
    &self,
    range: SessionRange,
  ) -> impl Future<Output = StoreResult<Option<Session>, Self::Error>> + Send + '_;

  /// Move a session to a new range, enforcing the overlap exclusion
  /// invariant (excluding the session itself) and the recordings-freeze
  /// policy. On conflict the original range is left untouched.
  fn reschedule_session(
    &self,
    id: i64,
    range: SessionRange,
  ) -> impl Future<Output = StoreResult<Session, Self::Error>> + Send + '_;

  /// Mark a session as a no-show, returning its script to the pool.
  /// Rejected with [`crate::Error::NoShowWithRecordings`] once any prompt
  /// has a recording.
  fn mark_no_show(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<Session, Self::Error>> + Send + '_;

  /// Delete a session and its speaker (booking canceled). Rejected with
  /// [`crate::Error::SessionHasRecordings`] once recordings exist — the
  /// caller decides whether that is an error or a silent no-op.
  fn delete_session(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<DeletedSession, Self::Error>> + Send + '_;

  /// Replace the release form reference. Always permitted, regardless of
  /// lifecycle stage. Returns the previous reference so the caller can
  /// delete the underlying blob.
  fn set_release_form(
    &self,
    id: i64,
    form: Option<BlobRef>,
  ) -> impl Future<Output = StoreResult<Option<BlobRef>, Self::Error>> + Send + '_;

  // ── Scripts ───────────────────────────────────────────────────────────

  /// Provision a script and its prompts into the pool.
  fn add_script<'a>(
    &'a self,
    language: &'a str,
    prompts: Vec<NewPrompt>,
  ) -> impl Future<Output = StoreResult<Script, Self::Error>> + Send + 'a;

  fn get_script(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<Option<Script>, Self::Error>> + Send + '_;

  /// Claim the first unassigned script of `language` that has no
  /// recordings, and assign it to the session. Atomic: two sessions can
  /// never claim the same script.
  fn claim_script<'a>(
    &'a self,
    session_id: i64,
    language: &'a str,
  ) -> impl Future<Output = StoreResult<Script, Self::Error>> + Send + 'a;

  /// Return a session's script to the pool. Only legal while the script
  /// has no recordings.
  fn release_script(
    &self,
    session_id: i64,
  ) -> impl Future<Output = StoreResult<(), Self::Error>> + Send + '_;

  fn script_for_session(
    &self,
    session_id: i64,
  ) -> impl Future<Output = StoreResult<Option<Script>, Self::Error>> + Send + '_;

  fn prompts_for_script(
    &self,
    script_id: i64,
  ) -> impl Future<Output = StoreResult<Vec<RecPrompt>, Self::Error>> + Send + '_;

  fn get_prompt(
    &self,
    id: i64,
  ) -> impl Future<Output = StoreResult<Option<RecPrompt>, Self::Error>> + Send + '_;

  /// The session currently holding `script_id`, if any.
  fn session_for_script(
    &self,
    script_id: i64,
  ) -> impl Future<Output = StoreResult<Option<Session>, Self::Error>> + Send + '_;

  /// Distribute performance-instruction tags over a quarter of the
  /// prompts of every unassigned, untagged script of `language`, cycling
  /// [`crate::script::Instruction::ALL`]. Returns the number of scripts
  /// touched.
  fn assign_instructions<'a>(
    &'a self,
    language: &'a str,
  ) -> impl Future<Output = StoreResult<usize, Self::Error>> + Send + 'a;

  // ── Recordings ────────────────────────────────────────────────────────

  /// Attach a recording to a prompt, caching its byte size. Returns the
  /// previous reference (if any) so the caller can delete the old blob.
  fn attach_recording(
    &self,
    prompt_id: i64,
    recording: BlobRef,
    filesize: u64,
  ) -> impl Future<Output = StoreResult<Option<BlobRef>, Self::Error>> + Send + '_;

  /// Clear a prompt's recording, returning the removed reference.
  fn clear_recording(
    &self,
    prompt_id: i64,
  ) -> impl Future<Output = StoreResult<Option<BlobRef>, Self::Error>> + Send + '_;

  /// `true` if any prompt of the session's script has a recording.
  fn has_recordings(
    &self,
    session_id: i64,
  ) -> impl Future<Output = StoreResult<bool, Self::Error>> + Send + '_;

  // ── Archives ──────────────────────────────────────────────────────────

  /// Sessions whose range lies entirely within `[start, end)`, whose
  /// script matches `language` and has at least one recording, and which
  /// are not yet archived. Ordered by session start.
  fn archive_candidates<'a>(
    &'a self,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
    language: &'a str,
  ) -> impl Future<Output = StoreResult<Vec<ArchiveCandidate>, Self::Error>> + Send + 'a;

  fn find_archive_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = StoreResult<Option<Archive>, Self::Error>> + Send + 'a;

  /// Create the archive row and link every session in `session_ids` to it,
  /// in one transaction. Fails with [`crate::Error::AlreadyArchived`] if
  /// any of the sessions acquired an archive reference in the meantime —
  /// in that case nothing is written.
  fn create_archive(
    &self,
    archive: NewArchive,
    session_ids: Vec<i64>,
  ) -> impl Future<Output = StoreResult<Archive, Self::Error>> + Send + '_;

  fn list_archives(
    &self,
  ) -> impl Future<Output = StoreResult<Vec<Archive>, Self::Error>> + Send + '_;

  /// Archive rows with no linked sessions — the drift the packaging job's
  /// linkage step can leave behind and the audit job reports.
  fn unlinked_archives(
    &self,
  ) -> impl Future<Output = StoreResult<Vec<Archive>, Self::Error>> + Send + '_;

  // ── Job runs ──────────────────────────────────────────────────────────

  /// Acquire the named-run lock: insert a running job-run row, or return
  /// `None` if one is already running under `name`.
  fn begin_job<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = StoreResult<Option<JobRun>, Self::Error>> + Send + 'a;

  /// Release a run acquired with [`StudioStore::begin_job`], recording an
  /// outcome label.
  fn finish_job<'a>(
    &'a self,
    job_run_id: Uuid,
    outcome: &'a str,
  ) -> impl Future<Output = StoreResult<(), Self::Error>> + Send + 'a;
}
