//! Zip assembly for export bundles.

use std::io::{Cursor, Write as _};

use resonance_core::archive::Description;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
  Error, Result, SessionBundle,
  layout::{doc_block, script_block, speaker_table},
  naming::{doc_entry, script_entry, wave_entry},
};

/// Build a complete bundle in memory.
///
/// `sessions` must be ordered by session start and `language` must be the
/// language of every contributing script; both are the packaging job's
/// responsibility. Output is deterministic for a fixed input.
pub fn build(
  description: &Description,
  language: &str,
  sessions: &[SessionBundle],
) -> Result<Vec<u8>> {
  if sessions.is_empty() {
    return Err(Error::EmptyBundle);
  }

  let mut zf = ZipWriter::new(Cursor::new(Vec::new()));
  let text_opts =
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  // Wave entries go in uncompressed.
  let wave_opts =
    SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

  zf.start_file("TABLE/SPEAKER.TXT", text_opts)?;
  zf.write_all(speaker_table(sessions).as_bytes())?;

  for session in sessions {
    zf.start_file(script_entry(session.speaker_id), text_opts)?;
    zf.write_all(script_block(session).as_bytes())?;

    for prompt in &session.prompts {
      zf.start_file(
        wave_entry(language, session.speaker_id, session.sex, prompt.prompt_id),
        wave_opts,
      )?;
      zf.write_all(&prompt.wave)?;
    }
  }

  zf.start_file(doc_entry(&description.name), text_opts)?;
  zf.write_all(doc_block(description, sessions).as_bytes())?;

  Ok(zf.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
  use std::io::Read as _;

  use chrono::{TimeZone, Utc};
  use resonance_core::speaker::Sex;
  use zip::ZipArchive;

  use super::*;
  use crate::PromptBundle;

  fn description() -> Description {
    Description {
      name:      "Studio A".into(),
      location:  "Dresden".into(),
      equipment: "Neumann U87".into(),
    }
  }

  fn sessions() -> Vec<SessionBundle> {
    (0..2)
      .map(|i| SessionBundle {
        speaker_id: 10 + i,
        sex: Sex::Female,
        age: Some(30),
        accent: "scottish".into(),
        start: Utc.with_ymd_and_hms(2024, 1, 3 + i as u32, 10, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 1, 3 + i as u32, 11, 0, 0).unwrap(),
        prompts: vec![PromptBundle {
          prompt_id:   1,
          mediaitem:   "Hello world".into(),
          instruction: None,
          wave:        vec![0x52, 0x49, 0x46, 0x46],
        }],
      })
      .collect()
  }

  fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    (0..archive.len())
      .map(|i| archive.by_index(i).unwrap().name().to_owned())
      .collect()
  }

  #[test]
  fn bundle_has_the_fixed_layout() {
    let bytes = build(&description(), "en", &sessions()).unwrap();
    let names = entry_names(&bytes);

    assert_eq!(
      names,
      vec![
        "TABLE/SPEAKER.TXT",
        "DATA/CHANNEL0/SCRIPT/0_10_0.TXT",
        "DATA/CHANNEL0/WAVE/SPEAKER10/EN_10_F_001.wav",
        "DATA/CHANNEL0/SCRIPT/0_11_0.TXT",
        "DATA/CHANNEL0/WAVE/SPEAKER11/EN_11_F_001.wav",
        "DOC/Studio A.TXT",
      ]
    );
  }

  #[test]
  fn wave_bytes_roundtrip() {
    let bytes = build(&description(), "en", &sessions()).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let mut wave = Vec::new();
    archive
      .by_name("DATA/CHANNEL0/WAVE/SPEAKER10/EN_10_F_001.wav")
      .unwrap()
      .read_to_end(&mut wave)
      .unwrap();
    assert_eq!(wave, vec![0x52, 0x49, 0x46, 0x46]);
  }

  #[test]
  fn speaker_table_has_one_row_per_session() {
    let bytes = build(&description(), "en", &sessions()).unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

    let mut table = String::new();
    archive
      .by_name("TABLE/SPEAKER.TXT")
      .unwrap()
      .read_to_string(&mut table)
      .unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "10\tF\t30\tscottish");
  }

  #[test]
  fn output_is_deterministic() {
    let a = build(&description(), "en", &sessions()).unwrap();
    let b = build(&description(), "en", &sessions()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn empty_selection_is_rejected() {
    assert!(matches!(
      build(&description(), "en", &[]),
      Err(Error::EmptyBundle)
    ));
  }
}
