//! Session time ranges.
//!
//! A range is half-open: `[start, end)`. Two ranges overlap iff
//! `start1 < end2 && start2 < end1`, so back-to-back sessions sharing a
//! boundary instant do not conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The booked time slot of a session. Always timezone-aware, stored UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRange {
  start: DateTime<Utc>,
  end:   DateTime<Utc>,
}

impl SessionRange {
  /// Build a range, rejecting empty or inverted slots.
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
    if start >= end {
      return Err(Error::EmptyRange);
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> DateTime<Utc> { self.start }

  pub fn end(&self) -> DateTime<Utc> { self.end }

  /// Half-open overlap test.
  pub fn overlaps(&self, other: &SessionRange) -> bool {
    self.start < other.end && other.start < self.end
  }

  /// `true` if this range lies entirely within `[start, end)`.
  ///
  /// Archive selection uses contained-by, not mere overlap: a session
  /// straddling a window boundary belongs to neither window.
  pub fn contained_by(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    self.start >= start && self.end <= end
  }
}

impl std::fmt::Display for SessionRange {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
  }
}
