//! Speaker — the person booked for a recording session.
//!
//! A speaker is owned exclusively by one session and is created together
//! with it when a booking is confirmed; it is never shared or re-used.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sex category as recorded in the speaker table of export bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
  Male,
  Female,
  Other,
}

impl Sex {
  /// Single-letter code used in the database column and the export format.
  pub fn code(self) -> &'static str {
    match self {
      Self::Male => "M",
      Self::Female => "F",
      Self::Other => "O",
    }
  }

  pub fn from_code(s: &str) -> Option<Self> {
    match s {
      "M" => Some(Self::Male),
      "F" => Some(Self::Female),
      "O" => Some(Self::Other),
      _ => None,
    }
  }

  /// Parse a human-facing label ("MALE", "Female", …) as submitted by
  /// booking forms. Anything unrecognised maps to `Other`.
  pub fn from_label(label: &str) -> Self {
    match label.to_ascii_uppercase().as_str() {
      "M" | "MALE" => Self::Male,
      "F" | "FEMALE" => Self::Female,
      _ => Self::Other,
    }
  }
}

/// A person booked for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
  pub speaker_id:    i64,
  /// Stable correlation id for external systems; never reused.
  pub uuid:          Uuid,
  pub name:          String,
  pub email:         String,
  /// Unknown for provider-created bookings that carry no form data.
  pub date_of_birth: Option<NaiveDate>,
  pub sex:           Sex,
  pub accent:        String,
  pub code:          String,
  pub registered:    DateTime<Utc>,
}

impl Speaker {
  /// The speaker's age on `date`, as a calendar-year difference adjusted
  /// by a month/day comparison — not elapsed-days division. `None` when
  /// the date of birth is unknown.
  pub fn age_at(&self, date: NaiveDate) -> Option<i32> {
    let dob = self.date_of_birth?;
    let mut years = date.year() - dob.year();
    if (date.month(), date.day()) < (dob.month(), dob.day()) {
      years -= 1;
    }
    Some(years)
  }
}

/// Input to [`crate::store::StudioStore::create_booking`]. Identity fields
/// only; `speaker_id`, `uuid` and `registered` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSpeaker {
  pub name:          String,
  pub email:         String,
  pub date_of_birth: Option<NaiveDate>,
  pub sex:           Sex,
  pub accent:        String,
  pub code:          String,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn speaker(dob: Option<NaiveDate>) -> Speaker {
    Speaker {
      speaker_id: 1,
      uuid: Uuid::new_v4(),
      name: "Alice".into(),
      email: "alice@example.com".into(),
      date_of_birth: dob,
      sex: Sex::Female,
      accent: "scottish".into(),
      code: String::new(),
      registered: Utc::now(),
    }
  }

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn age_before_birthday_in_year() {
    let s = speaker(Some(d(1990, 6, 15)));
    assert_eq!(s.age_at(d(2024, 6, 14)), Some(33));
  }

  #[test]
  fn age_on_birthday() {
    let s = speaker(Some(d(1990, 6, 15)));
    assert_eq!(s.age_at(d(2024, 6, 15)), Some(34));
  }

  #[test]
  fn age_after_birthday_in_year() {
    let s = speaker(Some(d(1990, 6, 15)));
    assert_eq!(s.age_at(d(2024, 12, 1)), Some(34));
  }

  #[test]
  fn age_unknown_without_dob() {
    assert_eq!(speaker(None).age_at(d(2024, 1, 1)), None);
  }

  #[test]
  fn sex_label_parsing() {
    assert_eq!(Sex::from_label("MALE"), Sex::Male);
    assert_eq!(Sex::from_label("Female"), Sex::Female);
    assert_eq!(Sex::from_label("nonbinary"), Sex::Other);
  }
}
