//! Named-task mutual exclusion.
//!
//! Background jobs that must not run twice concurrently acquire a job-run
//! row before doing any work. The storage layer guarantees at most one
//! unfinished run per name; finishing (with any outcome) releases the
//! name. This replaces polling the task broker for active tasks by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One acquired run of a named background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
  pub job_run_id:  Uuid,
  pub name:        String,
  pub started_at:  DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  /// Short outcome label recorded on completion, e.g. `"created"`,
  /// `"no-eligible-sessions"`, `"failed"`.
  pub outcome:     Option<String>,
}

impl JobRun {
  pub fn is_running(&self) -> bool { self.finished_at.is_none() }
}
