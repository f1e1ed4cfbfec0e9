//! Scripts and their recordable line items.
//!
//! Scripts are pre-provisioned in a pool per language. A session claims
//! the first unassigned, unrecorded script of its language; unassignment
//! returns the script to the pool and is only legal while it has no
//! recordings.

use serde::{Deserialize, Serialize};

use crate::blob::BlobRef;

/// A reusable prompt list in one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
  pub script_id: i64,
  /// Lowercase language code, e.g. `"en"`.
  pub language:  String,
}

/// Performance instruction attached to a prompt, rendered into the
/// exported script file so the downstream tool can display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
  Whispered,
  Shouted,
  Fast,
  Slow,
}

impl Instruction {
  /// Upper-case label used in the export format and the database column.
  pub fn label(self) -> &'static str {
    match self {
      Self::Whispered => "WHISPERED",
      Self::Shouted => "SHOUTED",
      Self::Fast => "FAST",
      Self::Slow => "SLOW",
    }
  }

  pub fn from_label(s: &str) -> Option<Self> {
    match s {
      "WHISPERED" => Some(Self::Whispered),
      "SHOUTED" => Some(Self::Shouted),
      "FAST" => Some(Self::Fast),
      "SLOW" => Some(Self::Slow),
      _ => None,
    }
  }

  /// The full tag cycle, in assignment order.
  pub const ALL: [Instruction; 4] =
    [Self::Whispered, Self::Shouted, Self::Fast, Self::Slow];
}

/// One recordable line item of a script.
///
/// Once `recording` is non-empty the owning session/script pair becomes
/// immutable except for release-form changes and the
/// no-show-without-recordings transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecPrompt {
  pub prompt_id:   i64,
  pub script_id:   i64,
  pub mediaitem:   String,
  pub recording:   Option<BlobRef>,
  /// Byte size of the recording, cached when it is attached.
  pub filesize:    Option<u64>,
  pub instruction: Option<Instruction>,
}

impl RecPrompt {
  pub fn is_recorded(&self) -> bool { self.recording.is_some() }
}

/// Input for provisioning a prompt into a new script.
#[derive(Debug, Clone)]
pub struct NewPrompt {
  pub mediaitem:   String,
  pub instruction: Option<Instruction>,
}

impl NewPrompt {
  pub fn new(mediaitem: impl Into<String>) -> Self {
    Self { mediaitem: mediaitem.into(), instruction: None }
  }
}
