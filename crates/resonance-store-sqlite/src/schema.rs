//! SQL schema for the Resonance SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// SQLite has no range exclusion constraints, so the no-overlapping-sessions
/// invariant is enforced by [`crate::SqliteStore`] with a range-overlap
/// predicate inside the same transaction as every insert/update of
/// `sessions.start_at`/`end_at`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS speakers (
    speaker_id    INTEGER PRIMARY KEY,
    uuid          TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL,
    date_of_birth TEXT,             -- ISO 8601 date; NULL when unknown
    sex           TEXT NOT NULL,    -- 'M' | 'F' | 'O'
    accent        TEXT NOT NULL DEFAULT '',
    code          TEXT NOT NULL DEFAULT '',
    registered    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scripts (
    script_id INTEGER PRIMARY KEY,
    language  TEXT NOT NULL         -- lowercase code, e.g. 'en'
);

CREATE TABLE IF NOT EXISTS archives (
    archive_id       INTEGER PRIMARY KEY,
    name             TEXT NOT NULL UNIQUE,
    file             TEXT NOT NULL, -- blob key
    description_name TEXT NOT NULL,
    location         TEXT NOT NULL,
    equipment        TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

-- Timestamps are fixed-width UTC strings (see encode.rs) so the range
-- predicates below compare correctly as text.
CREATE TABLE IF NOT EXISTS sessions (
    session_id      INTEGER PRIMARY KEY,
    start_at        TEXT NOT NULL,  -- half-open [start_at, end_at)
    end_at          TEXT NOT NULL,
    speaker_id      INTEGER NOT NULL UNIQUE REFERENCES speakers(speaker_id),
    script_id       INTEGER UNIQUE REFERENCES scripts(script_id),
    recording_mixer TEXT,
    playback_mixer  TEXT,
    no_show         INTEGER NOT NULL DEFAULT 0,
    private         INTEGER NOT NULL DEFAULT 0,
    release_form    TEXT,           -- blob key
    archive_id      INTEGER REFERENCES archives(archive_id),
    CHECK (start_at < end_at)
);

CREATE INDEX IF NOT EXISTS sessions_range_idx ON sessions(start_at, end_at);

CREATE TABLE IF NOT EXISTS rec_prompts (
    prompt_id   INTEGER PRIMARY KEY,
    script_id   INTEGER NOT NULL REFERENCES scripts(script_id),
    mediaitem   TEXT NOT NULL UNIQUE,
    recording   TEXT,               -- blob key; NULL until recorded
    filesize    INTEGER,            -- byte size cache, set with recording
    instruction TEXT                -- performance tag label or NULL
);

CREATE INDEX IF NOT EXISTS rec_prompts_script_idx ON rec_prompts(script_id);

CREATE TABLE IF NOT EXISTS job_runs (
    job_run_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    outcome     TEXT
);

-- At most one unfinished run per job name: the INSERT is the lock
-- acquisition, finishing the run releases it.
CREATE UNIQUE INDEX IF NOT EXISTS job_runs_active_idx
    ON job_runs(name) WHERE finished_at IS NULL;

PRAGMA user_version = 1;
";
