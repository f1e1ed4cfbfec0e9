//! Wire-payload types for the scheduling provider's inbound webhooks.
//!
//! The provider delivers `invitee.created`, `invitee.canceled`, and
//! `invitee_no_show.created`. A reschedule arrives as a cancellation with
//! `rescheduled = true` plus a `new_invitee` reference to follow.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum WebhookEventKind {
  #[serde(rename = "invitee.created")]
  InviteeCreated,
  #[serde(rename = "invitee.canceled")]
  InviteeCanceled,
  #[serde(rename = "invitee_no_show.created")]
  NoShowCreated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
  pub event:   WebhookEventKind,
  pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
  /// Invitee display name (`invitee.*` events).
  #[serde(default)]
  pub name:            Option<String>,
  #[serde(default)]
  pub email:           Option<String>,
  /// Invitee resource URI (`invitee.*` events).
  #[serde(default)]
  pub uri:             Option<String>,
  /// Invitee resource URI (`invitee_no_show.created` events).
  #[serde(default)]
  pub invitee:         Option<String>,
  #[serde(default)]
  pub rescheduled:     bool,
  /// URI of the replacement invitee when `rescheduled` is set.
  #[serde(default)]
  pub new_invitee:     Option<String>,
  #[serde(default)]
  pub scheduled_event: Option<ScheduledEventPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledEventPayload {
  #[serde(default)]
  pub uri:        Option<String>,
  pub start_time: DateTime<Utc>,
  pub end_time:   DateTime<Utc>,
}
