//! Naming conventions of the bundle format.
//!
//! The archive name is the idempotency key of the packaging job: a
//! re-trigger computes the same name and finds the existing blob. It must
//! therefore be reproduced byte-for-byte.

use chrono::NaiveDate;
use resonance_core::speaker::Sex;

/// Bundle name for a (window, language) selection:
/// `ARCHIVE/<year>/Resonance Speech Database [<LANG>] <first> - <last>.zip`,
/// where `<first>`/`<last>` are the dates of the first and last sessions in
/// the selection and `<year>` is the first session's year.
pub fn archive_name(language: &str, first: NaiveDate, last: NaiveDate) -> String {
  format!(
    "ARCHIVE/{}/Resonance Speech Database [{}] {} - {}.zip",
    first.format("%Y"),
    language.to_uppercase(),
    first.format("%Y-%m-%d"),
    last.format("%Y-%m-%d"),
  )
}

/// Fixed-width item code used in the per-session script file:
/// `0_<speaker>_<prompt>` with the prompt id zero-padded to three digits.
pub fn item_code(speaker_id: i64, prompt_id: i64) -> String {
  format!("0_{speaker_id}_{prompt_id:03}")
}

/// Entry path of a session's script file.
pub fn script_entry(speaker_id: i64) -> String {
  format!("DATA/CHANNEL0/SCRIPT/0_{speaker_id}_0.TXT")
}

/// Entry path of one recorded prompt's audio. The filename encodes the
/// language code, speaker id, sex, and prompt id.
pub fn wave_entry(
  language: &str,
  speaker_id: i64,
  sex: Sex,
  prompt_id: i64,
) -> String {
  format!(
    "DATA/CHANNEL0/WAVE/SPEAKER{speaker_id}/{}_{speaker_id}_{}_{prompt_id:03}.wav",
    language.to_uppercase(),
    sex.code(),
  )
}

/// Entry path of the documentation block.
pub fn doc_entry(description_name: &str) -> String {
  format!("DOC/{description_name}.TXT")
}
