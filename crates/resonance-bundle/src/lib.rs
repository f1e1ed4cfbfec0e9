//! The Resonance export bundle format.
//!
//! A bundle is a zip with a fixed internal layout that downstream
//! consumers depend on; path structure, field names, and tab/newline
//! conventions are part of the external contract and must not change
//! without a version bump:
//!
//! ```text
//! TABLE/SPEAKER.TXT                          speaker table
//! DATA/CHANNEL0/SCRIPT/0_<spk>_0.TXT         one script file per session
//! DATA/CHANNEL0/WAVE/SPEAKER<spk>/<name>.wav one wave file per recording
//! DOC/<description name>.TXT                 documentation block
//! ```
//!
//! Everything here is pure: input in, bytes out. Fetching recordings and
//! persisting the finished zip belong to the packaging job.

pub mod error;
pub mod layout;
pub mod naming;
pub mod zip_build;

pub use error::{Error, Result};
pub use zip_build::build;

use chrono::{DateTime, Utc};
use resonance_core::{script::Instruction, speaker::Sex};

/// One session's share of a bundle: speaker metadata plus the recorded
/// prompts with their audio bytes already fetched.
#[derive(Debug, Clone)]
pub struct SessionBundle {
  pub speaker_id: i64,
  pub sex:        Sex,
  /// Age at the session date; empty column when unknown.
  pub age:        Option<i32>,
  pub accent:     String,
  pub start:      DateTime<Utc>,
  pub end:        DateTime<Utc>,
  pub prompts:    Vec<PromptBundle>,
}

/// One recorded prompt inside a [`SessionBundle`].
#[derive(Debug, Clone)]
pub struct PromptBundle {
  pub prompt_id:   i64,
  pub mediaitem:   String,
  pub instruction: Option<Instruction>,
  pub wave:        Vec<u8>,
}
