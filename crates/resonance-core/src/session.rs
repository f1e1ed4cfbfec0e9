//! Session — one booked recording appointment.
//!
//! A session owns its speaker exclusively and holds at most one script
//! claimed from the pool. The time range is guarded system-wide by the
//! overlap exclusion invariant enforced in the storage layer.

use serde::{Deserialize, Serialize};

use crate::{blob::BlobRef, range::SessionRange};

/// The booking record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:      i64,
  pub range:           SessionRange,
  pub speaker_id:      i64,
  /// `None` until a script is claimed from the pool.
  pub script_id:       Option<i64>,
  pub recording_mixer: Option<String>,
  pub playback_mixer:  Option<String>,
  pub no_show:         bool,
  pub private:         bool,
  /// Signed release form, if one has been uploaded.
  pub release_form:    Option<BlobRef>,
  /// Set exactly once by the archive packaging job, permanently.
  pub archive_id:      Option<i64>,
}

impl Session {
  /// Storage key for this session's release form.
  ///
  /// Each entity type that owns uploads derives its own key from the
  /// session date and id, so layout decisions live with the owner rather
  /// than in a shared dispatch on entity kind.
  pub fn release_form_key(&self, speaker_name: &str) -> String {
    format!("{}/{speaker_name} release form.pdf", self.upload_prefix())
  }

  /// Storage key for a recording of prompt `prompt_id` in this session.
  pub fn recording_key(&self, prompt_id: i64) -> String {
    format!("{}/{prompt_id}.wav", self.upload_prefix())
  }

  fn upload_prefix(&self) -> String {
    format!(
      "{}/SESSION_{}",
      self.range.start().format("%Y/%m/%d"),
      self.session_id
    )
  }
}

/// Input to [`crate::store::StudioStore::create_booking`].
#[derive(Debug, Clone)]
pub struct NewSession {
  pub range:           SessionRange,
  pub recording_mixer: Option<String>,
  pub playback_mixer:  Option<String>,
  pub private:         bool,
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;

  #[test]
  fn upload_keys_are_namespaced_by_session_date_and_id() {
    let range = SessionRange::new(
      Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
      Utc.with_ymd_and_hms(2024, 3, 5, 11, 0, 0).unwrap(),
    )
    .unwrap();
    let session = Session {
      session_id: 42,
      range,
      speaker_id: 7,
      script_id: None,
      recording_mixer: None,
      playback_mixer: None,
      no_show: false,
      private: false,
      release_form: None,
      archive_id: None,
    };

    assert_eq!(
      session.release_form_key("Alice"),
      "2024/03/05/SESSION_42/Alice release form.pdf"
    );
    assert_eq!(
      session.recording_key(9),
      "2024/03/05/SESSION_42/9.wav"
    );
  }
}
