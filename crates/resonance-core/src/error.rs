//! Error types for `resonance-core`.
//!
//! Two families matter to callers: *conflicts* (another booking holds the
//! resource; the write is rejected and may be retried with different
//! parameters by a human) and *policy violations* (the mutation is illegal
//! for this session's lifecycle state and must surface to an operator).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("session not found: {0}")]
  SessionNotFound(i64),

  #[error("speaker not found: {0}")]
  SpeakerNotFound(i64),

  #[error("script not found: {0}")]
  ScriptNotFound(i64),

  #[error("prompt not found: {0}")]
  PromptNotFound(i64),

  #[error("an existing session overlaps the requested range")]
  OverlappingSession,

  #[error("session range must end after it starts")]
  EmptyRange,

  #[error("no unassigned {0} script is available")]
  ScriptUnavailable(String),

  #[error("session {0} already has a script assigned")]
  ScriptAlreadyAssigned(i64),

  #[error("can't change a session if there are recordings")]
  SessionHasRecordings,

  #[error("can't mark a session no-show once recordings exist")]
  NoShowWithRecordings,

  #[error("session {0} is already archived")]
  AlreadyArchived(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// A rejected write caused by another booking holding the resource.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::OverlappingSession | Self::ScriptUnavailable(_)
    )
  }

  /// An operation that is illegal for the session's lifecycle state.
  pub fn is_policy_violation(&self) -> bool {
    matches!(
      self,
      Self::SessionHasRecordings
        | Self::NoShowWithRecordings
        | Self::ScriptAlreadyAssigned(_)
        | Self::AlreadyArchived(_)
    )
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::SessionNotFound(_)
        | Self::SpeakerNotFound(_)
        | Self::ScriptNotFound(_)
        | Self::PromptNotFound(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
