//! Scheduling-provider seam.
//!
//! The external calendar is the source of truth for bookings; this trait
//! is the thin typed surface the webhook handlers and the reconciliation
//! job consume. Implementations live elsewhere (`resonance-scheduling`
//! for the REST client); tests substitute their own.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled event on the provider's calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
  pub uri:        String,
  pub start_time: DateTime<Utc>,
  pub end_time:   DateTime<Utc>,
  pub canceled:   bool,
}

/// One invitee of a scheduled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInvitee {
  pub uri:       String,
  pub name:      String,
  pub email:     String,
  /// URI of the event this invitee belongs to.
  pub event_uri: String,
  pub no_show:   bool,
}

/// One page of a cursor-paginated event listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
  pub events:          Vec<ProviderEvent>,
  /// Cursor for the next page. `None` or empty means the listing is
  /// exhausted — callers must treat both as the stop signal.
  pub next_page_token: Option<String>,
}

/// Abstraction over the scheduling provider's REST API.
pub trait SchedulingProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve an invitee resource by URI.
  fn get_invitee<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<ProviderInvitee, Self::Error>> + Send + 'a;

  /// Resolve a scheduled event by URI.
  fn get_event<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<ProviderEvent, Self::Error>> + Send + 'a;

  /// List non-past events starting at or after `min_start`, one page at a
  /// time. Pass the previous page's token to continue.
  fn list_events<'a>(
    &'a self,
    min_start: DateTime<Utc>,
    page_token: Option<&'a str>,
  ) -> impl Future<Output = Result<EventPage, Self::Error>> + Send + 'a;

  /// Events starting exactly at `start` — used to find the provider-side
  /// counterpart of a local session.
  fn events_at<'a>(
    &'a self,
    start: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<ProviderEvent>, Self::Error>> + Send + 'a;

  /// List the invitees of an event.
  fn list_invitees<'a>(
    &'a self,
    event_uri: &'a str,
  ) -> impl Future<Output = Result<Vec<ProviderInvitee>, Self::Error>> + Send + 'a;

  /// Cancel an invitee's booking upstream.
  fn cancel_invitee<'a>(
    &'a self,
    uri: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Report an invitee as a no-show upstream.
  fn report_no_show<'a>(
    &'a self,
    invitee_uri: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
