//! Scheduling-provider webhook.
//!
//! Maps provider events onto local session transitions. The target
//! session is always re-derived from the event's time range rather than a
//! sequence number, which is what makes duplicate delivery harmless.
//!
//! | Event                      | Effect                                     |
//! |----------------------------|--------------------------------------------|
//! | `invitee.created`          | create speaker + session, claim script     |
//! | `invitee.canceled`         | delete, unless recordings exist (no-op)    |
//! | `invitee.canceled` + rescheduled | move the session to the new range    |
//! | `invitee_no_show.created`  | unassign script, set no-show; recordings ⇒ operator error |

use axum::{
  extract::{Request, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::Utc;

use resonance_core::{
  Error as CoreError,
  blob::BlobStore,
  provider::SchedulingProvider,
  range::SessionRange,
  speaker::{NewSpeaker, Sex},
  store::{StoreError, StudioStore},
};
use resonance_scheduling::webhook::{
  ScheduledEventPayload, WebhookEnvelope, WebhookEventKind, WebhookPayload,
};

use crate::{
  AppState,
  error::Error,
  hooks::{collect_body, create_booking_idempotent, delete_orphaned_blobs},
  signature::verify_provider_signature,
};

/// `POST /hooks/scheduling`
pub async fn handler<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  req: Request,
) -> Response
where
  S: StudioStore + 'static,
  B: BlobStore + 'static,
  P: SchedulingProvider + 'static,
{
  let (parts, bytes) = match collect_body(req).await {
    Ok(collected) => collected,
    Err(response) => return response,
  };

  if let Err(e) = verify_provider_signature(
    &parts.headers,
    &bytes,
    &state.config.provider_signing_key,
    Utc::now(),
  ) {
    return e.into_response();
  }

  let envelope: WebhookEnvelope = match serde_json::from_slice(&bytes) {
    Ok(envelope) => envelope,
    Err(e) => {
      return Error::BadRequest(format!("malformed webhook payload: {e}"))
        .into_response();
    }
  };

  let result = match envelope.event {
    WebhookEventKind::InviteeCreated => created(&state, envelope.payload).await,
    WebhookEventKind::InviteeCanceled if envelope.payload.rescheduled => {
      rescheduled(&state, envelope.payload).await
    }
    WebhookEventKind::InviteeCanceled => canceled(&state, envelope.payload).await,
    WebhookEventKind::NoShowCreated => no_show(&state, envelope.payload).await,
  };

  match result {
    Ok(()) => StatusCode::OK.into_response(),
    Err(e) => e.into_response(),
  }
}

fn event_range(event: Option<&ScheduledEventPayload>) -> Result<SessionRange, Error> {
  let event = event.ok_or_else(|| {
    Error::BadRequest("payload carries no scheduled_event".to_owned())
  })?;
  SessionRange::new(event.start_time, event.end_time)
    .map_err(|e| Error::BadRequest(e.to_string()))
}

async fn created<S, B, P>(
  state: &AppState<S, B, P>,
  payload: WebhookPayload,
) -> Result<(), Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let range = event_range(payload.scheduled_event.as_ref())?;

  // Provider bookings carry no form answers; identity only.
  let speaker = NewSpeaker {
    name: payload.name.unwrap_or_default(),
    email: payload.email.unwrap_or_default(),
    date_of_birth: None,
    sex: Sex::Other,
    accent: String::new(),
    code: String::new(),
  };

  create_booking_idempotent(state, range, speaker).await?;
  Ok(())
}

async fn canceled<S, B, P>(
  state: &AppState<S, B, P>,
  payload: WebhookPayload,
) -> Result<(), Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let range = event_range(payload.scheduled_event.as_ref())?;

  let Some(session) = state
    .store
    .find_session_by_range(range)
    .await
    .map_err(Error::from_store)?
  else {
    // Unknown or already-deleted booking; duplicate deliveries land here.
    return Ok(());
  };

  // Recorded media must be preserved: cancel becomes a deliberate no-op.
  if state
    .store
    .has_recordings(session.session_id)
    .await
    .map_err(Error::from_store)?
  {
    tracing::warn!(
      session = session.session_id,
      "cancellation ignored, session has recordings"
    );
    return Ok(());
  }

  match state.store.delete_session(session.session_id).await {
    Ok(deleted) => {
      delete_orphaned_blobs(state.blobs.as_ref(), &deleted.orphaned_blobs).await;
      tracing::info!(session = session.session_id, "booking canceled, session deleted");
      Ok(())
    }
    // A recording landed between the check and the delete; same no-op.
    Err(StoreError::Domain(CoreError::SessionHasRecordings)) => Ok(()),
    Err(e) => Err(Error::from_store(e)),
  }
}

async fn rescheduled<S, B, P>(
  state: &AppState<S, B, P>,
  payload: WebhookPayload,
) -> Result<(), Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let old_range = event_range(payload.scheduled_event.as_ref())?;

  let Some(session) = state
    .store
    .find_session_by_range(old_range)
    .await
    .map_err(Error::from_store)?
  else {
    return Ok(());
  };

  let Some(new_invitee) = payload.new_invitee else {
    return Err(Error::BadRequest(
      "rescheduled event carries no new_invitee".to_owned(),
    ));
  };

  // Resolve the replacement booking upstream before touching the session.
  let invitee = state
    .provider
    .get_invitee(&new_invitee)
    .await
    .map_err(Error::from_provider)?;
  let event = state
    .provider
    .get_event(&invitee.event_uri)
    .await
    .map_err(Error::from_provider)?;
  let new_range = SessionRange::new(event.start_time, event.end_time)
    .map_err(|e| Error::BadRequest(e.to_string()))?;

  state
    .store
    .reschedule_session(session.session_id, new_range)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(
    session = session.session_id,
    from = %old_range,
    to = %new_range,
    "session rescheduled"
  );
  Ok(())
}

async fn no_show<S, B, P>(
  state: &AppState<S, B, P>,
  payload: WebhookPayload,
) -> Result<(), Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let Some(invitee_uri) = payload.invitee else {
    return Err(Error::BadRequest(
      "no-show event carries no invitee reference".to_owned(),
    ));
  };

  let invitee = state
    .provider
    .get_invitee(&invitee_uri)
    .await
    .map_err(Error::from_provider)?;
  let event = state
    .provider
    .get_event(&invitee.event_uri)
    .await
    .map_err(Error::from_provider)?;
  let range = SessionRange::new(event.start_time, event.end_time)
    .map_err(|e| Error::BadRequest(e.to_string()))?;

  let Some(session) = state
    .store
    .find_session_by_range(range)
    .await
    .map_err(Error::from_store)?
  else {
    return Ok(());
  };

  // Recordings turn this into an operator problem; the 409 is deliberate.
  state
    .store
    .mark_no_show(session.session_id)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(session = session.session_id, "session marked no-show");
  Ok(())
}
