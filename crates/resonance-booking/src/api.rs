//! JSON admin API.
//!
//! The administrative surface: everything here runs under the same
//! invariants as the webhook paths — the store enforces them, these
//! handlers only translate errors into responses.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use resonance_core::{
  blob::BlobStore,
  provider::SchedulingProvider,
  script::{Instruction, NewPrompt, RecPrompt, Script},
  session::Session,
  stage::{SessionStage, stage_of},
  store::StudioStore,
};
use resonance_jobs::{ARCHIVE_JOB, ArchiveParams};

use crate::{AppState, error::Error, hooks::delete_orphaned_blobs};

// ─── Sessions ────────────────────────────────────────────────────────────────

/// `GET /api/sessions`
pub async fn list_sessions<S, B, P>(
  State(state): State<AppState<S, B, P>>,
) -> Result<Json<Vec<Session>>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let sessions = state
    .store
    .list_sessions()
    .await
    .map_err(Error::from_store)?;
  Ok(Json(sessions))
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
  pub session: Session,
  pub stage:   SessionStage,
  pub script:  Option<Script>,
  pub prompts: Vec<RecPrompt>,
}

/// `GET /api/sessions/{id}`
pub async fn get_session<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<Json<SessionDetail>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let session = state
    .store
    .get_session(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;

  let script = state
    .store
    .script_for_session(id)
    .await
    .map_err(Error::from_store)?;
  let prompts = match &script {
    Some(script) => state
      .store
      .prompts_for_script(script.script_id)
      .await
      .map_err(Error::from_store)?,
    None => Vec::new(),
  };

  let stage = stage_of(&session, &prompts);
  Ok(Json(SessionDetail { session, stage, script, prompts }))
}

/// `DELETE /api/sessions/{id}` — cancel a booking from the admin side.
/// Unlike the webhook path, a recorded session surfaces the policy error.
pub async fn cancel_session<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let session = state
    .store
    .get_session(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;

  let deleted = state
    .store
    .delete_session(id)
    .await
    .map_err(Error::from_store)?;
  delete_orphaned_blobs(state.blobs.as_ref(), &deleted.orphaned_blobs).await;

  // Best-effort upstream cancellation; local state is already settled.
  cancel_upstream(&state, &session).await;

  Ok(StatusCode::NO_CONTENT)
}

async fn cancel_upstream<S, B, P>(state: &AppState<S, B, P>, session: &Session)
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let start = session.range.start();
  let events = match state.provider.events_at(start).await {
    Ok(events) => events,
    Err(e) => {
      tracing::warn!(error = %e, "could not look up upstream event");
      return;
    }
  };
  let Some(event) = events.iter().find(|e| !e.canceled) else { return };

  let invitees = match state.provider.list_invitees(&event.uri).await {
    Ok(invitees) => invitees,
    Err(e) => {
      tracing::warn!(error = %e, "could not list upstream invitees");
      return;
    }
  };
  let Some(invitee) = invitees.first() else { return };

  if let Err(e) = state.provider.cancel_invitee(&invitee.uri).await {
    tracing::warn!(error = %e, "upstream cancellation failed");
  }
}

/// `POST /api/sessions/{id}/no-show`
pub async fn mark_no_show<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<Json<Session>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let session = state
    .store
    .mark_no_show(id)
    .await
    .map_err(Error::from_store)?;

  // Report upstream after the local transition commits; never the other
  // way around, and never fatally.
  report_no_show_upstream(&state, &session).await;

  Ok(Json(session))
}

async fn report_no_show_upstream<S, B, P>(
  state: &AppState<S, B, P>,
  session: &Session,
) where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let events = match state.provider.events_at(session.range.start()).await {
    Ok(events) => events,
    Err(e) => {
      tracing::warn!(error = %e, "could not look up upstream event");
      return;
    }
  };
  if events.len() != 1 {
    return;
  }

  let invitees = match state.provider.list_invitees(&events[0].uri).await {
    Ok(invitees) => invitees,
    Err(e) => {
      tracing::warn!(error = %e, "could not list upstream invitees");
      return;
    }
  };
  let Some(invitee) = invitees.first() else { return };

  if !invitee.no_show
    && let Err(e) = state.provider.report_no_show(&invitee.uri).await
  {
    tracing::warn!(error = %e, "upstream no-show report failed");
  }
}

// ─── Uploads ─────────────────────────────────────────────────────────────────

/// `PUT /api/sessions/{id}/release-form` — always permitted, even once
/// recordings exist. Replacing a form deletes the previous blob.
pub async fn put_release_form<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
  body: Bytes,
) -> Result<Json<serde_json::Value>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let session = state
    .store
    .get_session(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;
  let speaker = state
    .store
    .get_speaker(session.speaker_id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;

  let key = session.release_form_key(&speaker.name);
  let blob = state
    .blobs
    .put(&key, body.to_vec())
    .await
    .map_err(Error::from_storage)?;

  let previous = state
    .store
    .set_release_form(id, Some(blob.clone()))
    .await
    .map_err(Error::from_store)?;
  if let Some(previous) = previous
    && previous != blob
  {
    delete_orphaned_blobs(state.blobs.as_ref(), &[previous]).await;
  }

  Ok(Json(json!({ "release_form": key })))
}

/// `PUT /api/prompts/{id}/recording`
pub async fn put_recording<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
  body: Bytes,
) -> Result<Json<serde_json::Value>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let prompt = state
    .store
    .get_prompt(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;
  let session = state
    .store
    .session_for_script(prompt.script_id)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| {
      Error::BadRequest("script is not assigned to a session".to_owned())
    })?;

  let key = session.recording_key(id);
  let filesize = body.len() as u64;
  let blob = state
    .blobs
    .put(&key, body.to_vec())
    .await
    .map_err(Error::from_storage)?;

  let previous = state
    .store
    .attach_recording(id, blob.clone(), filesize)
    .await
    .map_err(Error::from_store)?;
  if let Some(previous) = previous
    && previous != blob
  {
    delete_orphaned_blobs(state.blobs.as_ref(), &[previous]).await;
  }

  Ok(Json(json!({ "recording": key, "filesize": filesize })))
}

/// `DELETE /api/prompts/{id}/recording` — clear a recording; the cleared
/// blob is deleted from storage.
pub async fn delete_recording<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let removed = state
    .store
    .clear_recording(id)
    .await
    .map_err(Error::from_store)?;
  if let Some(removed) = removed {
    delete_orphaned_blobs(state.blobs.as_ref(), &[removed]).await;
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Scripts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScriptDetail {
  pub script:           Script,
  pub assigned_session: Option<i64>,
  pub prompts:          Vec<RecPrompt>,
}

/// `GET /api/scripts/{id}`
pub async fn get_script<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<Json<ScriptDetail>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let script = state
    .store
    .get_script(id)
    .await
    .map_err(Error::from_store)?
    .ok_or(Error::NotFound)?;
  let prompts = state
    .store
    .prompts_for_script(id)
    .await
    .map_err(Error::from_store)?;
  let assigned_session = state
    .store
    .session_for_script(id)
    .await
    .map_err(Error::from_store)?
    .map(|s| s.session_id);

  Ok(Json(ScriptDetail { script, assigned_session, prompts }))
}

/// `DELETE /api/sessions/{id}/script` — return the script to the pool.
/// Rejected once recordings exist.
pub async fn release_script<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  state
    .store
    .release_script(id)
    .await
    .map_err(Error::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct NewScriptBody {
  pub language: String,
  pub prompts:  Vec<NewPromptBody>,
}

#[derive(Debug, Deserialize)]
pub struct NewPromptBody {
  pub mediaitem:   String,
  #[serde(default)]
  pub instruction: Option<Instruction>,
}

/// `POST /api/scripts` — provision a script into the pool.
pub async fn add_script<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Json(body): Json<NewScriptBody>,
) -> Result<impl IntoResponse, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let prompts = body
    .prompts
    .into_iter()
    .map(|p| NewPrompt { mediaitem: p.mediaitem, instruction: p.instruction })
    .collect();
  let script = state
    .store
    .add_script(&body.language, prompts)
    .await
    .map_err(Error::from_store)?;
  Ok((StatusCode::CREATED, Json(script)))
}

#[derive(Debug, Deserialize)]
pub struct AssignInstructionsBody {
  pub language: String,
}

/// `POST /api/scripts/assign-instructions`
pub async fn assign_instructions<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Json(body): Json<AssignInstructionsBody>,
) -> Result<Json<serde_json::Value>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let touched = state
    .store
    .assign_instructions(&body.language)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(json!({ "scripts_updated": touched })))
}

// ─── Archives & jobs ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TriggerArchiveBody {
  pub start:    DateTime<Utc>,
  pub end:      DateTime<Utc>,
  pub language: String,
}

/// `POST /api/archives` — trigger the packaging job.
///
/// The job lock is acquired here, synchronously, so a concurrent run is
/// rejected with a visible 409 instead of queueing; the build itself runs
/// detached.
pub async fn trigger_archive<S, B, P>(
  State(state): State<AppState<S, B, P>>,
  Json(body): Json<TriggerArchiveBody>,
) -> Result<impl IntoResponse, Error>
where
  S: StudioStore + 'static,
  B: BlobStore + 'static,
  P: SchedulingProvider + 'static,
{
  if body.start >= body.end {
    return Err(Error::BadRequest(
      "start date must be less than end date".to_owned(),
    ));
  }

  let Some(run) = state
    .store
    .begin_job(ARCHIVE_JOB)
    .await
    .map_err(Error::from_store)?
  else {
    return Err(Error::Conflict(
      "an archive job is already running".to_owned(),
    ));
  };

  let params = ArchiveParams {
    start:    body.start,
    end:      body.end,
    language: body.language,
  };
  let store = state.store.clone();
  let blobs = state.blobs.clone();
  let description = state.config.description.clone();

  tokio::spawn(async move {
    match resonance_jobs::archive::run_with_lock(
      run,
      store.as_ref(),
      blobs.as_ref(),
      &description,
      &params,
    )
    .await
    {
      Ok(outcome) => tracing::info!(?outcome, "archive job finished"),
      Err(e) => tracing::error!(error = %e, "archive job failed"),
    }
  });

  Ok((StatusCode::ACCEPTED, Json(json!({ "job": ARCHIVE_JOB }))))
}

/// `GET /api/archives`
pub async fn list_archives<S, B, P>(
  State(state): State<AppState<S, B, P>>,
) -> Result<Json<Vec<resonance_core::archive::Archive>>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let archives = state
    .store
    .list_archives()
    .await
    .map_err(Error::from_store)?;
  Ok(Json(archives))
}

/// `GET /api/archives/audit` — archive rows with no linked sessions.
pub async fn audit_archives<S, B, P>(
  State(state): State<AppState<S, B, P>>,
) -> Result<Json<Vec<resonance_core::archive::Archive>>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let orphans = resonance_jobs::audit_archives(state.store.as_ref())
    .await
    .map_err(Error::from_job)?;
  Ok(Json(orphans))
}

/// `POST /api/reconcile` — run the missing-booking sweep and return the
/// report.
pub async fn reconcile<S, B, P>(
  State(state): State<AppState<S, B, P>>,
) -> Result<Json<Vec<resonance_jobs::MissingBooking>>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let missing = resonance_jobs::check_missing_bookings(
    state.store.as_ref(),
    state.provider.as_ref(),
    Utc::now(),
  )
  .await
  .map_err(Error::from_job)?;
  Ok(Json(missing))
}
