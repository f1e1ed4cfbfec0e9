//! Session lifecycle stage — computed, never stored.
//!
//! `Unscripted → Scripted → Recording → Completed → Archived`, with
//! `NoShow` as a terminal side-exit. Cancellation deletes the session
//! outright, so it has no stage of its own.

use serde::{Deserialize, Serialize};

use crate::{script::RecPrompt, session::Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
  Unscripted,
  Scripted,
  Recording,
  Completed,
  NoShow,
  Archived,
}

/// Derive the stage from a session row and its script's prompts.
///
/// `prompts` must be the full prompt list of the assigned script (empty
/// slice when no script is assigned).
pub fn stage_of(session: &Session, prompts: &[RecPrompt]) -> SessionStage {
  if session.archive_id.is_some() {
    return SessionStage::Archived;
  }
  if session.no_show {
    return SessionStage::NoShow;
  }
  if session.script_id.is_none() {
    return SessionStage::Unscripted;
  }

  let recorded = prompts.iter().filter(|p| p.is_recorded()).count();
  if recorded == 0 {
    SessionStage::Scripted
  } else if recorded == prompts.len() {
    SessionStage::Completed
  } else {
    SessionStage::Recording
  }
}
