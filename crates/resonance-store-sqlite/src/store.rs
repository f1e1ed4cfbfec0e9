//! [`SqliteStore`] — the SQLite implementation of [`StudioStore`].
//!
//! Every check-then-write sequence (overlap exclusion, script claim,
//! policy guards, archive linkage) runs inside one rusqlite transaction
//! within one `conn.call` closure. tokio-rusqlite serializes all access
//! through a single connection thread, so no concurrent request can
//! interleave between a check and its write.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use resonance_core::{
  archive::{Archive, NewArchive},
  blob::BlobRef,
  job::JobRun,
  range::SessionRange,
  script::{Instruction, NewPrompt, RecPrompt, Script},
  session::{NewSession, Session},
  speaker::{NewSpeaker, Speaker},
  store::{
    ArchiveCandidate, Booking, DeletedSession, StoreError, StudioStore,
  },
};

use crate::{
  Error,
  encode::{
    RawArchive, RawJobRun, RawPrompt, RawSession, RawSpeaker, encode_date,
    encode_instruction, encode_sex, encode_ts, encode_uuid,
  },
  schema::SCHEMA,
};

type SResult<T> = Result<T, StoreError<Error>>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Resonance studio store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> crate::Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> crate::Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Domain denial plumbing ──────────────────────────────────────────────────

/// Denial reasons decided inside a transaction closure. Mapped to
/// [`resonance_core::Error`] at the trait boundary.
enum Denied {
  SessionNotFound(i64),
  PromptNotFound(i64),
  Overlap,
  HasRecordings,
  NoShowWithRecordings,
  ScriptUnavailable(String),
  ScriptAlreadyAssigned(i64),
  AlreadyArchived(i64),
}

impl From<Denied> for resonance_core::Error {
  fn from(d: Denied) -> Self {
    match d {
      Denied::SessionNotFound(id) => Self::SessionNotFound(id),
      Denied::PromptNotFound(id) => Self::PromptNotFound(id),
      Denied::Overlap => Self::OverlappingSession,
      Denied::HasRecordings => Self::SessionHasRecordings,
      Denied::NoShowWithRecordings => Self::NoShowWithRecordings,
      Denied::ScriptUnavailable(lang) => Self::ScriptUnavailable(lang),
      Denied::ScriptAlreadyAssigned(id) => Self::ScriptAlreadyAssigned(id),
      Denied::AlreadyArchived(id) => Self::AlreadyArchived(id),
    }
  }
}

fn db(e: tokio_rusqlite::Error) -> StoreError<Error> {
  StoreError::Backend(Error::Database(e))
}

fn decode(e: Error) -> StoreError<Error> { StoreError::Backend(e) }

fn denied(d: Denied) -> StoreError<Error> {
  StoreError::Domain(d.into())
}

/// Unwrap the `Result<T, Denied>` a transaction closure produced.
fn settle<T>(r: Result<T, Denied>) -> SResult<T> {
  r.map_err(denied)
}

// ─── Row mapping helpers ─────────────────────────────────────────────────────

const SESSION_COLS: &str = "session_id, start_at, end_at, speaker_id, \
   script_id, recording_mixer, playback_mixer, no_show, private, \
   release_form, archive_id";

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:      row.get(0)?,
    start_at:        row.get(1)?,
    end_at:          row.get(2)?,
    speaker_id:      row.get(3)?,
    script_id:       row.get(4)?,
    recording_mixer: row.get(5)?,
    playback_mixer:  row.get(6)?,
    no_show:         row.get(7)?,
    private:         row.get(8)?,
    release_form:    row.get(9)?,
    archive_id:      row.get(10)?,
  })
}

const SPEAKER_COLS: &str =
  "speaker_id, uuid, name, email, date_of_birth, sex, accent, code, registered";

fn speaker_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSpeaker> {
  Ok(RawSpeaker {
    speaker_id:    row.get(0)?,
    uuid:          row.get(1)?,
    name:          row.get(2)?,
    email:         row.get(3)?,
    date_of_birth: row.get(4)?,
    sex:           row.get(5)?,
    accent:        row.get(6)?,
    code:          row.get(7)?,
    registered:    row.get(8)?,
  })
}

const PROMPT_COLS: &str =
  "prompt_id, script_id, mediaitem, recording, filesize, instruction";

fn prompt_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPrompt> {
  Ok(RawPrompt {
    prompt_id:   row.get(0)?,
    script_id:   row.get(1)?,
    mediaitem:   row.get(2)?,
    recording:   row.get(3)?,
    filesize:    row.get(4)?,
    instruction: row.get(5)?,
  })
}

const ARCHIVE_COLS: &str =
  "archive_id, name, file, description_name, location, equipment, created_at";

fn archive_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawArchive> {
  Ok(RawArchive {
    archive_id:       row.get(0)?,
    name:             row.get(1)?,
    file:             row.get(2)?,
    description_name: row.get(3)?,
    location:         row.get(4)?,
    equipment:        row.get(5)?,
    created_at:       row.get(6)?,
  })
}

// ─── In-transaction helpers ──────────────────────────────────────────────────

/// Does any session's range intersect `[start, end)`? Half-open: the SQL
/// predicate mirrors `start1 < end2 AND start2 < end1`.
fn overlapping_exists(
  conn: &rusqlite::Connection,
  start: &str,
  end: &str,
  exclude: Option<i64>,
) -> rusqlite::Result<bool> {
  let hit: Option<i64> = conn
    .query_row(
      "SELECT session_id FROM sessions
        WHERE start_at < ?1 AND end_at > ?2
          AND (?3 IS NULL OR session_id != ?3)
        LIMIT 1",
      rusqlite::params![end, start, exclude],
      |r| r.get(0),
    )
    .optional()?;
  Ok(hit.is_some())
}

fn load_session(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawSession>> {
  conn
    .query_row(
      &format!("SELECT {SESSION_COLS} FROM sessions WHERE session_id = ?1"),
      rusqlite::params![id],
      session_row,
    )
    .optional()
}

/// Does any prompt of the session's assigned script have a recording?
fn session_has_recordings(
  conn: &rusqlite::Connection,
  session_id: i64,
) -> rusqlite::Result<bool> {
  let hit: Option<i64> = conn
    .query_row(
      "SELECT p.prompt_id
         FROM rec_prompts p
         JOIN sessions s ON p.script_id = s.script_id
        WHERE s.session_id = ?1 AND p.recording IS NOT NULL
        LIMIT 1",
      rusqlite::params![session_id],
      |r| r.get(0),
    )
    .optional()?;
  Ok(hit.is_some())
}

fn recorded_prompts(
  conn: &rusqlite::Connection,
  script_id: i64,
) -> rusqlite::Result<Vec<RawPrompt>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PROMPT_COLS} FROM rec_prompts
      WHERE script_id = ?1 AND recording IS NOT NULL
      ORDER BY prompt_id"
  ))?;
  stmt
    .query_map(rusqlite::params![script_id], prompt_row)?
    .collect()
}

// ─── StudioStore impl ────────────────────────────────────────────────────────

impl StudioStore for SqliteStore {
  type Error = Error;

  // ── Bookings ──────────────────────────────────────────────────────────────

  async fn create_booking(
    &self,
    speaker: NewSpeaker,
    session: NewSession,
  ) -> SResult<Booking> {
    let uuid       = Uuid::new_v4();
    let registered = Utc::now();

    let uuid_str  = encode_uuid(uuid);
    let reg_str   = encode_ts(registered);
    let dob_str   = speaker.date_of_birth.map(encode_date);
    let sex_str   = encode_sex(speaker.sex).to_owned();
    let start_str = encode_ts(session.range.start());
    let end_str   = encode_ts(session.range.end());

    let sp = speaker.clone();
    let se = session.clone();

    let ids = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if overlapping_exists(&tx, &start_str, &end_str, None)? {
          return Ok(Err(Denied::Overlap));
        }

        tx.execute(
          "INSERT INTO speakers
             (uuid, name, email, date_of_birth, sex, accent, code, registered)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            uuid_str, sp.name, sp.email, dob_str, sex_str, sp.accent, sp.code,
            reg_str,
          ],
        )?;
        let speaker_id = tx.last_insert_rowid();

        tx.execute(
          "INSERT INTO sessions
             (start_at, end_at, speaker_id, recording_mixer, playback_mixer,
              no_show, private)
           VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
          rusqlite::params![
            start_str, end_str, speaker_id, se.recording_mixer,
            se.playback_mixer, se.private,
          ],
        )?;
        let session_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(Ok((speaker_id, session_id)))
      })
      .await
      .map_err(db)?;
    let (speaker_id, session_id) = settle(ids)?;

    Ok(Booking {
      session: Session {
        session_id,
        range: session.range,
        speaker_id,
        script_id: None,
        recording_mixer: session.recording_mixer,
        playback_mixer: session.playback_mixer,
        no_show: false,
        private: session.private,
        release_form: None,
        archive_id: None,
      },
      speaker: Speaker {
        speaker_id,
        uuid,
        name: speaker.name,
        email: speaker.email,
        date_of_birth: speaker.date_of_birth,
        sex: speaker.sex,
        accent: speaker.accent,
        code: speaker.code,
        registered,
      },
    })
  }

  async fn get_session(&self, id: i64) -> SResult<Option<Session>> {
    let raw = self
      .conn
      .call(move |conn| Ok(load_session(conn, id)?))
      .await
      .map_err(db)?;
    raw
      .map(|r| r.into_session())
      .transpose()
      .map_err(decode)
  }

  async fn list_sessions(&self) -> SResult<Vec<Session>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SESSION_COLS} FROM sessions ORDER BY start_at"
        ))?;
        let rows = stmt
          .query_map([], session_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawSession::into_session)
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }

  async fn get_speaker(&self, id: i64) -> SResult<Option<Speaker>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SPEAKER_COLS} FROM speakers WHERE speaker_id = ?1"),
              rusqlite::params![id],
              speaker_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;
    raw
      .map(|r| r.into_speaker())
      .transpose()
      .map_err(decode)
  }

  async fn find_session_by_range(
    &self,
    range: SessionRange,
  ) -> SResult<Option<Session>> {
    let start_str = encode_ts(range.start());
    let end_str   = encode_ts(range.end());

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLS} FROM sessions
                  WHERE start_at = ?1 AND end_at = ?2"
              ),
              rusqlite::params![start_str, end_str],
              session_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;
    raw
      .map(|r| r.into_session())
      .transpose()
      .map_err(decode)
  }

  async fn reschedule_session(
    &self,
    id: i64,
    range: SessionRange,
  ) -> SResult<Session> {
    let start_str = encode_ts(range.start());
    let end_str   = encode_ts(range.end());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if load_session(&tx, id)?.is_none() {
          return Ok(Err(Denied::SessionNotFound(id)));
        }
        if session_has_recordings(&tx, id)? {
          return Ok(Err(Denied::HasRecordings));
        }
        if overlapping_exists(&tx, &start_str, &end_str, Some(id))? {
          return Ok(Err(Denied::Overlap));
        }

        tx.execute(
          "UPDATE sessions SET start_at = ?1, end_at = ?2 WHERE session_id = ?3",
          rusqlite::params![start_str, end_str, id],
        )?;

        let Some(raw) = load_session(&tx, id)? else {
          return Ok(Err(Denied::SessionNotFound(id)));
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await
      .map_err(db)?;

    settle(raw)?.into_session().map_err(decode)
  }

  async fn mark_no_show(&self, id: i64) -> SResult<Session> {
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if load_session(&tx, id)?.is_none() {
          return Ok(Err(Denied::SessionNotFound(id)));
        }
        if session_has_recordings(&tx, id)? {
          return Ok(Err(Denied::NoShowWithRecordings));
        }

        tx.execute(
          "UPDATE sessions SET no_show = 1, script_id = NULL WHERE session_id = ?1",
          rusqlite::params![id],
        )?;

        let Some(raw) = load_session(&tx, id)? else {
          return Ok(Err(Denied::SessionNotFound(id)));
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await
      .map_err(db)?;

    settle(raw)?.into_session().map_err(decode)
  }

  async fn delete_session(&self, id: i64) -> SResult<DeletedSession> {
    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(session) = load_session(&tx, id)? else {
          return Ok(Err(Denied::SessionNotFound(id)));
        };
        if session_has_recordings(&tx, id)? {
          return Ok(Err(Denied::HasRecordings));
        }

        // The script (if any) returns to the pool with the session row
        // gone; only the release form blob is orphaned by this delete.
        let orphaned: Vec<String> =
          session.release_form.clone().into_iter().collect();

        tx.execute(
          "DELETE FROM sessions WHERE session_id = ?1",
          rusqlite::params![id],
        )?;
        tx.execute(
          "DELETE FROM speakers WHERE speaker_id = ?1",
          rusqlite::params![session.speaker_id],
        )?;

        tx.commit()?;
        Ok(Ok((session.speaker_id, orphaned)))
      })
      .await
      .map_err(db)?;

    let (speaker_id, orphaned) = settle(result)?;
    Ok(DeletedSession {
      session_id: id,
      speaker_id,
      orphaned_blobs: orphaned.into_iter().map(BlobRef::new).collect(),
    })
  }

  async fn set_release_form(
    &self,
    id: i64,
    form: Option<BlobRef>,
  ) -> SResult<Option<BlobRef>> {
    let new_key = form.map(|b| b.key);

    let old = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(session) = load_session(&tx, id)? else {
          return Ok(Err(Denied::SessionNotFound(id)));
        };

        tx.execute(
          "UPDATE sessions SET release_form = ?1 WHERE session_id = ?2",
          rusqlite::params![new_key, id],
        )?;

        tx.commit()?;
        Ok(Ok(session.release_form))
      })
      .await
      .map_err(db)?;

    Ok(settle(old)?.map(BlobRef::new))
  }

  // ── Scripts ───────────────────────────────────────────────────────────────

  async fn add_script(
    &self,
    language: &str,
    prompts: Vec<NewPrompt>,
  ) -> SResult<Script> {
    let language = language.to_owned();
    let lang = language.clone();

    let script_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO scripts (language) VALUES (?1)",
          rusqlite::params![lang],
        )?;
        let script_id = tx.last_insert_rowid();

        for prompt in &prompts {
          tx.execute(
            "INSERT INTO rec_prompts (script_id, mediaitem, instruction)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
              script_id,
              prompt.mediaitem,
              prompt.instruction.map(encode_instruction),
            ],
          )?;
        }

        tx.commit()?;
        Ok(script_id)
      })
      .await
      .map_err(db)?;

    Ok(Script { script_id, language })
  }

  async fn get_script(&self, id: i64) -> SResult<Option<Script>> {
    self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT script_id, language FROM scripts WHERE script_id = ?1",
              rusqlite::params![id],
              |r| {
                Ok(Script { script_id: r.get(0)?, language: r.get(1)? })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)
  }

  async fn claim_script(
    &self,
    session_id: i64,
    language: &str,
  ) -> SResult<Script> {
    let lang = language.to_owned();

    let claimed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(session) = load_session(&tx, session_id)? else {
          return Ok(Err(Denied::SessionNotFound(session_id)));
        };
        if session.script_id.is_some() {
          return Ok(Err(Denied::ScriptAlreadyAssigned(session_id)));
        }

        // First unassigned script of the language with zero recordings.
        let candidate: Option<i64> = tx
          .query_row(
            "SELECT s.script_id FROM scripts s
              WHERE s.language = ?1
                AND NOT EXISTS
                  (SELECT 1 FROM sessions ss WHERE ss.script_id = s.script_id)
                AND NOT EXISTS
                  (SELECT 1 FROM rec_prompts p
                    WHERE p.script_id = s.script_id
                      AND p.recording IS NOT NULL)
              ORDER BY s.script_id
              LIMIT 1",
            rusqlite::params![lang],
            |r| r.get(0),
          )
          .optional()?;

        let Some(script_id) = candidate else {
          return Ok(Err(Denied::ScriptUnavailable(lang)));
        };

        tx.execute(
          "UPDATE sessions SET script_id = ?1 WHERE session_id = ?2",
          rusqlite::params![script_id, session_id],
        )?;

        tx.commit()?;
        Ok(Ok((script_id, lang)))
      })
      .await
      .map_err(db)?;

    let (script_id, language) = settle(claimed)?;
    Ok(Script { script_id, language })
  }

  async fn release_script(&self, session_id: i64) -> SResult<()> {
    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let Some(session) = load_session(&tx, session_id)? else {
          return Ok(Err(Denied::SessionNotFound(session_id)));
        };
        if session.script_id.is_none() {
          return Ok(Ok(()));
        }
        if session_has_recordings(&tx, session_id)? {
          return Ok(Err(Denied::HasRecordings));
        }

        tx.execute(
          "UPDATE sessions SET script_id = NULL WHERE session_id = ?1",
          rusqlite::params![session_id],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(db)?;

    settle(result)
  }

  async fn script_for_session(&self, session_id: i64) -> SResult<Option<Script>> {
    self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT sc.script_id, sc.language
                 FROM scripts sc
                 JOIN sessions s ON s.script_id = sc.script_id
                WHERE s.session_id = ?1",
              rusqlite::params![session_id],
              |r| {
                Ok(Script { script_id: r.get(0)?, language: r.get(1)? })
              },
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)
  }

  async fn prompts_for_script(&self, script_id: i64) -> SResult<Vec<RecPrompt>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROMPT_COLS} FROM rec_prompts
            WHERE script_id = ?1 ORDER BY prompt_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![script_id], prompt_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawPrompt::into_prompt)
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }

  async fn get_prompt(&self, id: i64) -> SResult<Option<RecPrompt>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROMPT_COLS} FROM rec_prompts WHERE prompt_id = ?1"),
              rusqlite::params![id],
              prompt_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;
    raw.map(|r| r.into_prompt()).transpose().map_err(decode)
  }

  async fn session_for_script(&self, script_id: i64) -> SResult<Option<Session>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SESSION_COLS} FROM sessions WHERE script_id = ?1"
              ),
              rusqlite::params![script_id],
              session_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;
    raw.map(|r| r.into_session()).transpose().map_err(decode)
  }

  async fn assign_instructions(&self, language: &str) -> SResult<usize> {
    let lang = language.to_owned();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Unassigned scripts of the language with no tags yet.
        let script_ids: Vec<i64> = {
          let mut stmt = tx.prepare(
            "SELECT s.script_id FROM scripts s
              WHERE s.language = ?1
                AND NOT EXISTS
                  (SELECT 1 FROM sessions ss WHERE ss.script_id = s.script_id)
                AND NOT EXISTS
                  (SELECT 1 FROM rec_prompts p
                    WHERE p.script_id = s.script_id
                      AND p.instruction IS NOT NULL)
              ORDER BY s.script_id",
          )?;
          stmt
            .query_map(rusqlite::params![lang], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        for &script_id in &script_ids {
          let prompt_ids: Vec<i64> = {
            let mut stmt = tx.prepare(
              "SELECT prompt_id FROM rec_prompts
                WHERE script_id = ?1 ORDER BY prompt_id",
            )?;
            stmt
              .query_map(rusqlite::params![script_id], |r| r.get(0))?
              .collect::<rusqlite::Result<Vec<_>>>()?
          };

          // Tag a quarter of the prompts (rounded up), cycling the tags.
          let quarter = prompt_ids.len().div_ceil(4);
          for (index, prompt_id) in prompt_ids.iter().take(quarter).enumerate() {
            let tag = Instruction::ALL[index % Instruction::ALL.len()];
            tx.execute(
              "UPDATE rec_prompts SET instruction = ?1 WHERE prompt_id = ?2",
              rusqlite::params![encode_instruction(tag), prompt_id],
            )?;
          }
        }

        tx.commit()?;
        Ok(script_ids.len())
      })
      .await
      .map_err(db)
  }

  // ── Recordings ────────────────────────────────────────────────────────────

  async fn attach_recording(
    &self,
    prompt_id: i64,
    recording: BlobRef,
    filesize: u64,
  ) -> SResult<Option<BlobRef>> {
    let key  = recording.key;
    let size = filesize as i64;

    let old = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let old: Option<Option<String>> = tx
          .query_row(
            "SELECT recording FROM rec_prompts WHERE prompt_id = ?1",
            rusqlite::params![prompt_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(old) = old else {
          return Ok(Err(Denied::PromptNotFound(prompt_id)));
        };

        tx.execute(
          "UPDATE rec_prompts SET recording = ?1, filesize = ?2
            WHERE prompt_id = ?3",
          rusqlite::params![key, size, prompt_id],
        )?;

        tx.commit()?;
        Ok(Ok(old))
      })
      .await
      .map_err(db)?;

    Ok(settle(old)?.map(BlobRef::new))
  }

  async fn clear_recording(&self, prompt_id: i64) -> SResult<Option<BlobRef>> {
    let old = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let old: Option<Option<String>> = tx
          .query_row(
            "SELECT recording FROM rec_prompts WHERE prompt_id = ?1",
            rusqlite::params![prompt_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(old) = old else {
          return Ok(Err(Denied::PromptNotFound(prompt_id)));
        };

        tx.execute(
          "UPDATE rec_prompts SET recording = NULL, filesize = NULL
            WHERE prompt_id = ?1",
          rusqlite::params![prompt_id],
        )?;

        tx.commit()?;
        Ok(Ok(old))
      })
      .await
      .map_err(db)?;

    Ok(settle(old)?.map(BlobRef::new))
  }

  async fn has_recordings(&self, session_id: i64) -> SResult<bool> {
    self
      .conn
      .call(move |conn| Ok(session_has_recordings(conn, session_id)?))
      .await
      .map_err(db)
  }

  // ── Archives ──────────────────────────────────────────────────────────────

  async fn archive_candidates(
    &self,
    start: chrono::DateTime<Utc>,
    end: chrono::DateTime<Utc>,
    language: &str,
  ) -> SResult<Vec<ArchiveCandidate>> {
    let start_str = encode_ts(start);
    let end_str   = encode_ts(end);
    let lang      = language.to_owned();

    type RawCandidate = (RawSession, RawSpeaker, Script, Vec<RawPrompt>);

    let raws: Vec<RawCandidate> = self
      .conn
      .call(move |conn| {
        // Contained-by, not merely overlapping: the whole range must lie
        // within the window.
        let sessions: Vec<RawSession> = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLS} FROM sessions s
              WHERE s.start_at >= ?1 AND s.end_at <= ?2
                AND s.archive_id IS NULL
                AND s.script_id IS NOT NULL
                AND EXISTS
                  (SELECT 1 FROM scripts sc
                    WHERE sc.script_id = s.script_id AND sc.language = ?3)
                AND EXISTS
                  (SELECT 1 FROM rec_prompts p
                    WHERE p.script_id = s.script_id
                      AND p.recording IS NOT NULL)
              ORDER BY s.start_at"
          ))?;
          stmt
            .query_map(
              rusqlite::params![start_str, end_str, lang],
              session_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut candidates = Vec::with_capacity(sessions.len());
        for session in sessions {
          let speaker = conn.query_row(
            &format!("SELECT {SPEAKER_COLS} FROM speakers WHERE speaker_id = ?1"),
            rusqlite::params![session.speaker_id],
            speaker_row,
          )?;
          let Some(script_id) = session.script_id else { continue };
          let script = conn.query_row(
            "SELECT script_id, language FROM scripts WHERE script_id = ?1",
            rusqlite::params![script_id],
            |r| Ok(Script { script_id: r.get(0)?, language: r.get(1)? }),
          )?;
          let prompts = recorded_prompts(conn, script_id)?;
          candidates.push((session, speaker, script, prompts));
        }
        Ok(candidates)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(|(session, speaker, script, prompts)| {
        Ok(ArchiveCandidate {
          session: session.into_session()?,
          speaker: speaker.into_speaker()?,
          script,
          prompts: prompts
            .into_iter()
            .map(RawPrompt::into_prompt)
            .collect::<crate::Result<_>>()?,
        })
      })
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }

  async fn find_archive_by_name(&self, name: &str) -> SResult<Option<Archive>> {
    let name = name.to_owned();
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ARCHIVE_COLS} FROM archives WHERE name = ?1"),
              rusqlite::params![name],
              archive_row,
            )
            .optional()?,
        )
      })
      .await
      .map_err(db)?;
    raw.map(|r| r.into_archive()).transpose().map_err(decode)
  }

  async fn create_archive(
    &self,
    archive: NewArchive,
    session_ids: Vec<i64>,
  ) -> SResult<Archive> {
    let created_at = Utc::now();
    let created_str = encode_ts(created_at);
    let a = archive.clone();

    let archive_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        tx.execute(
          "INSERT INTO archives
             (name, file, description_name, location, equipment, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            a.name, a.file.key, a.description_name, a.location, a.equipment,
            created_str,
          ],
        )?;
        let archive_id = tx.last_insert_rowid();

        // Linking is guarded: a session that acquired an archive reference
        // since selection aborts the whole transaction.
        for &session_id in &session_ids {
          let changed = tx.execute(
            "UPDATE sessions SET archive_id = ?1
              WHERE session_id = ?2 AND archive_id IS NULL",
            rusqlite::params![archive_id, session_id],
          )?;
          if changed == 0 {
            return Ok(Err(Denied::AlreadyArchived(session_id)));
          }
        }

        tx.commit()?;
        Ok(Ok(archive_id))
      })
      .await
      .map_err(db)?;
    let archive_id = settle(archive_id)?;

    Ok(Archive {
      archive_id,
      name: archive.name,
      file: archive.file,
      description_name: archive.description_name,
      location: archive.location,
      equipment: archive.equipment,
      created_at,
    })
  }

  async fn list_archives(&self) -> SResult<Vec<Archive>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ARCHIVE_COLS} FROM archives ORDER BY archive_id"
        ))?;
        let rows = stmt
          .query_map([], archive_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawArchive::into_archive)
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }

  async fn unlinked_archives(&self) -> SResult<Vec<Archive>> {
    let raws = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ARCHIVE_COLS} FROM archives a
            WHERE NOT EXISTS
              (SELECT 1 FROM sessions s WHERE s.archive_id = a.archive_id)
            ORDER BY a.archive_id"
        ))?;
        let rows = stmt
          .query_map([], archive_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawArchive::into_archive)
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }

  // ── Job runs ──────────────────────────────────────────────────────────────

  async fn begin_job(&self, name: &str) -> SResult<Option<JobRun>> {
    let job_run_id = Uuid::new_v4();
    let started_at = Utc::now();

    let id_str   = encode_uuid(job_run_id);
    let name_str = name.to_owned();
    let at_str   = encode_ts(started_at);
    let run_name = name_str.clone();

    let acquired = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO job_runs (job_run_id, name, started_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name_str, at_str],
        );
        match result {
          Ok(_) => Ok(true),
          // The partial unique index rejects a second running instance.
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await
      .map_err(db)?;

    Ok(acquired.then(|| JobRun {
      job_run_id,
      name: run_name,
      started_at,
      finished_at: None,
      outcome: None,
    }))
  }

  async fn finish_job(&self, job_run_id: Uuid, outcome: &str) -> SResult<()> {
    let id_str      = encode_uuid(job_run_id);
    let at_str      = encode_ts(Utc::now());
    let outcome_str = outcome.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE job_runs SET finished_at = ?1, outcome = ?2
            WHERE job_run_id = ?3",
          rusqlite::params![at_str, outcome_str, id_str],
        )?;
        Ok(())
      })
      .await
      .map_err(db)
  }
}

// ─── Extra queries (not part of the trait) ───────────────────────────────────

impl SqliteStore {
  /// Job-run history for a name, newest first. Used by tests and ops.
  pub async fn job_runs(&self, name: &str) -> SResult<Vec<JobRun>> {
    let name = name.to_owned();
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT job_run_id, name, started_at, finished_at, outcome
             FROM job_runs WHERE name = ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![name], |row| {
            Ok(RawJobRun {
              job_run_id:  row.get(0)?,
              name:        row.get(1)?,
              started_at:  row.get(2)?,
              finished_at: row.get(3)?,
              outcome:     row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(db)?;

    raws
      .into_iter()
      .map(RawJobRun::into_job_run)
      .collect::<crate::Result<_>>()
      .map_err(decode)
  }
}
