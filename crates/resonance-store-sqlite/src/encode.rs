//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width UTC strings
//! (`2024-01-15T10:00:00.000000Z`) so that lexicographic comparison in SQL
//! matches instant ordering — the overlap and containment predicates
//! depend on this. Dates are `%Y-%m-%d`. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use resonance_core::{
  archive::Archive,
  blob::BlobRef,
  job::JobRun,
  range::SessionRange,
  script::{Instruction, RecPrompt},
  session::Session,
  speaker::{Sex, Speaker},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// Fixed-width canonical timestamp; the only format ever written to
/// timestamp columns.
pub fn encode_ts(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_ts(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_sex(s: Sex) -> &'static str { s.code() }

pub fn decode_sex(s: &str) -> Result<Sex> {
  Sex::from_code(s).ok_or_else(|| Error::UnknownCode {
    kind:  "sex",
    value: s.to_owned(),
  })
}

pub fn encode_instruction(i: Instruction) -> &'static str { i.label() }

pub fn decode_instruction(s: &str) -> Result<Instruction> {
  Instruction::from_label(s).ok_or_else(|| Error::UnknownCode {
    kind:  "instruction",
    value: s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:      i64,
  pub start_at:        String,
  pub end_at:          String,
  pub speaker_id:      i64,
  pub script_id:       Option<i64>,
  pub recording_mixer: Option<String>,
  pub playback_mixer:  Option<String>,
  pub no_show:         bool,
  pub private:         bool,
  pub release_form:    Option<String>,
  pub archive_id:      Option<i64>,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    let start = decode_ts(&self.start_at)?;
    let end   = decode_ts(&self.end_at)?;
    let range = SessionRange::new(start, end)
      .map_err(|e| Error::DateParse(e.to_string()))?;

    Ok(Session {
      session_id: self.session_id,
      range,
      speaker_id: self.speaker_id,
      script_id: self.script_id,
      recording_mixer: self.recording_mixer,
      playback_mixer: self.playback_mixer,
      no_show: self.no_show,
      private: self.private,
      release_form: self.release_form.map(BlobRef::new),
      archive_id: self.archive_id,
    })
  }
}

/// Raw values read directly from a `speakers` row.
pub struct RawSpeaker {
  pub speaker_id:    i64,
  pub uuid:          String,
  pub name:          String,
  pub email:         String,
  pub date_of_birth: Option<String>,
  pub sex:           String,
  pub accent:        String,
  pub code:          String,
  pub registered:    String,
}

impl RawSpeaker {
  pub fn into_speaker(self) -> Result<Speaker> {
    Ok(Speaker {
      speaker_id:    self.speaker_id,
      uuid:          decode_uuid(&self.uuid)?,
      name:          self.name,
      email:         self.email,
      date_of_birth: self.date_of_birth.as_deref().map(decode_date).transpose()?,
      sex:           decode_sex(&self.sex)?,
      accent:        self.accent,
      code:          self.code,
      registered:    decode_ts(&self.registered)?,
    })
  }
}

/// Raw values read directly from a `rec_prompts` row.
pub struct RawPrompt {
  pub prompt_id:   i64,
  pub script_id:   i64,
  pub mediaitem:   String,
  pub recording:   Option<String>,
  pub filesize:    Option<i64>,
  pub instruction: Option<String>,
}

impl RawPrompt {
  pub fn into_prompt(self) -> Result<RecPrompt> {
    Ok(RecPrompt {
      prompt_id:   self.prompt_id,
      script_id:   self.script_id,
      mediaitem:   self.mediaitem,
      recording:   self.recording.map(BlobRef::new),
      filesize:    self.filesize.map(|n| n as u64),
      instruction: self
        .instruction
        .as_deref()
        .map(decode_instruction)
        .transpose()?,
    })
  }
}

/// Raw values read directly from an `archives` row.
pub struct RawArchive {
  pub archive_id:       i64,
  pub name:             String,
  pub file:             String,
  pub description_name: String,
  pub location:         String,
  pub equipment:        String,
  pub created_at:       String,
}

impl RawArchive {
  pub fn into_archive(self) -> Result<Archive> {
    Ok(Archive {
      archive_id:       self.archive_id,
      name:             self.name,
      file:             BlobRef::new(self.file),
      description_name: self.description_name,
      location:         self.location,
      equipment:        self.equipment,
      created_at:       decode_ts(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `job_runs` row.
pub struct RawJobRun {
  pub job_run_id:  String,
  pub name:        String,
  pub started_at:  String,
  pub finished_at: Option<String>,
  pub outcome:     Option<String>,
}

impl RawJobRun {
  pub fn into_job_run(self) -> Result<JobRun> {
    Ok(JobRun {
      job_run_id:  decode_uuid(&self.job_run_id)?,
      name:        self.name,
      started_at:  decode_ts(&self.started_at)?,
      finished_at: self.finished_at.as_deref().map(decode_ts).transpose()?,
      outcome:     self.outcome,
    })
  }
}
