//! The missing-booking reconciliation job.
//!
//! Pages through the provider's upcoming, non-canceled events and reports
//! every event with no exactly-matching local session. Report-only: this
//! job never mutates state; drift is handed to a human.

use chrono::{DateTime, Utc};
use serde::Serialize;

use resonance_core::{
  provider::SchedulingProvider, range::SessionRange, store::StudioStore,
};

use crate::{Error, Result};

/// One upstream booking with no local counterpart.
#[derive(Debug, Clone, Serialize)]
pub struct MissingBooking {
  pub start_time: DateTime<Utc>,
  pub name:       String,
  pub email:      String,
}

/// Sweep the provider's upcoming events (from `now`) against local
/// sessions. Pagination stops on a missing *or empty* next-page token —
/// an empty page alone is not the end of the listing.
pub async fn check_missing_bookings<S, P>(
  store: &S,
  provider: &P,
  now: DateTime<Utc>,
) -> Result<Vec<MissingBooking>>
where
  S: StudioStore,
  P: SchedulingProvider,
{
  let mut missing = Vec::new();
  let mut token: Option<String> = None;

  loop {
    let page = provider
      .list_events(now, token.as_deref())
      .await
      .map_err(Error::provider)?;

    for event in &page.events {
      if event.canceled {
        continue;
      }
      let range = match SessionRange::new(event.start_time, event.end_time) {
        Ok(range) => range,
        Err(_) => {
          tracing::warn!(event = %event.uri, "provider event has an empty range");
          continue;
        }
      };

      let local = store
        .find_session_by_range(range)
        .await
        .map_err(Error::store)?;
      if local.is_some() {
        continue;
      }

      let invitees = provider
        .list_invitees(&event.uri)
        .await
        .map_err(Error::provider)?;
      let (name, email) = invitees
        .into_iter()
        .next()
        .map(|i| (i.name, i.email))
        .unwrap_or_default();
      missing.push(MissingBooking { start_time: event.start_time, name, email });
    }

    match page.next_page_token {
      Some(next) if !next.is_empty() => token = Some(next),
      _ => break,
    }
  }

  if !missing.is_empty() {
    tracing::warn!(count = missing.len(), "bookings missing locally");
  }
  Ok(missing)
}
