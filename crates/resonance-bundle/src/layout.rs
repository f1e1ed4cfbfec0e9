//! Text rendering for the bundle's table, script, and documentation
//! entries. Tab-separated columns, `\n` line endings.

use resonance_core::archive::Description;

use crate::{SessionBundle, naming::item_code};

/// `TABLE/SPEAKER.TXT`: header `SCD\tSEX\tAGE\tACC`, one row per session.
/// An unknown age renders as an empty column.
pub fn speaker_table(sessions: &[SessionBundle]) -> String {
  let mut out = String::from("SCD\tSEX\tAGE\tACC\n");
  for session in sessions {
    let age = session.age.map(|a| a.to_string()).unwrap_or_default();
    out.push_str(&format!(
      "{}\t{}\t{}\t{}\n",
      session.speaker_id,
      session.sex.code(),
      age,
      session.accent,
    ));
  }
  out
}

/// One session's script file: per recorded prompt, the item code line,
/// the instruction label (tab-indented, when present), the tab-indented
/// media item, and a blank separator line.
pub fn script_block(session: &SessionBundle) -> String {
  let mut out = String::new();
  for prompt in &session.prompts {
    out.push_str(&item_code(session.speaker_id, prompt.prompt_id));
    out.push('\n');
    if let Some(instruction) = prompt.instruction {
      out.push('\t');
      out.push_str(instruction.label());
      out.push('\n');
    }
    out.push('\t');
    out.push_str(&prompt.mediaitem);
    out.push_str("\n\n");
  }
  out
}

/// `DOC/<name>.TXT`: free-text documentation plus the covered date range.
pub fn doc_block(description: &Description, sessions: &[SessionBundle]) -> String {
  let mut out = String::new();
  out.push_str(&format!("{}\n\n", description.name));
  out.push_str("Location:\n\n");
  out.push_str(&format!("{}\n\n", description.location));
  out.push_str("Equipment:\n\n");
  out.push_str(&format!("{}\n\n", description.equipment));
  out.push_str("Date range:\n\n");
  if let (Some(first), Some(last)) = (sessions.first(), sessions.last()) {
    out.push_str(&format!(
      "{} to {}\n",
      first.start.to_rfc3339(),
      last.end.to_rfc3339(),
    ));
  }
  out
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use resonance_core::{script::Instruction, speaker::Sex};

  use super::*;
  use crate::PromptBundle;

  fn session(speaker_id: i64, age: Option<i32>) -> SessionBundle {
    SessionBundle {
      speaker_id,
      sex: Sex::Male,
      age,
      accent: "welsh".into(),
      start: Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap(),
      end: Utc.with_ymd_and_hms(2024, 1, 3, 11, 0, 0).unwrap(),
      prompts: vec![
        PromptBundle {
          prompt_id:   7,
          mediaitem:   "The quick brown fox".into(),
          instruction: None,
          wave:        vec![],
        },
        PromptBundle {
          prompt_id:   12,
          mediaitem:   "jumps over the lazy dog".into(),
          instruction: Some(Instruction::Whispered),
          wave:        vec![],
        },
      ],
    }
  }

  #[test]
  fn speaker_table_rows() {
    let table = speaker_table(&[session(17, Some(34)), session(18, None)]);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "SCD\tSEX\tAGE\tACC");
    assert_eq!(lines[1], "17\tM\t34\twelsh");
    assert_eq!(lines[2], "18\tM\t\twelsh");
  }

  #[test]
  fn script_block_layout() {
    let block = script_block(&session(17, Some(34)));
    assert_eq!(
      block,
      "0_17_007\n\tThe quick brown fox\n\n\
       0_17_012\n\tWHISPERED\n\tjumps over the lazy dog\n\n"
    );
  }

  #[test]
  fn doc_block_covers_the_selection_range() {
    let description = Description {
      name:      "Studio A".into(),
      location:  "Dresden".into(),
      equipment: "Neumann U87".into(),
    };
    let doc = doc_block(&description, &[session(17, Some(34))]);
    assert!(doc.starts_with("Studio A\n\n"));
    assert!(doc.contains("Location:\n\nDresden\n\n"));
    assert!(doc.contains("Equipment:\n\nNeumann U87\n\n"));
    assert!(doc.contains("2024-01-03T10:00:00+00:00 to 2024-01-03T11:00:00+00:00"));
  }
}
