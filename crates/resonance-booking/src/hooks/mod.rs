//! Inbound webhook handlers.
//!
//! Both endpoints verify the signature over the raw body before touching
//! it, fetch whatever provider data they need, and only then write
//! locally — a failing provider call never leaves a half-created booking.

pub mod forms;
pub mod scheduling;

use axum::{body::Body, extract::Request, http::StatusCode, response::Response};
use bytes::Bytes;

use resonance_core::{
  Error as CoreError,
  blob::{BlobRef, BlobStore},
  provider::SchedulingProvider,
  range::SessionRange,
  session::NewSession,
  speaker::NewSpeaker,
  store::{Booking, StoreError, StudioStore},
};

use crate::{AppState, error::Error};

const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub(crate) async fn collect_body(req: Request) -> Result<(axum::http::request::Parts, Bytes), Response> {
  let (parts, body) = req.into_parts();
  match axum::body::to_bytes(body, BODY_LIMIT).await {
    Ok(bytes) => Ok((parts, bytes)),
    Err(_) => Err(
      Response::builder()
        .status(StatusCode::PAYLOAD_TOO_LARGE)
        .body(Body::from("request body too large"))
        .unwrap_or_default(),
    ),
  }
}

/// Create a booking for `range` unless one already exists there.
///
/// Returns `None` on duplicate delivery — the same event re-derives the
/// same range and finds the session it created the first time. A claim
/// failure (empty script pool) leaves the session unscripted; the booking
/// itself stands.
pub(crate) async fn create_booking_idempotent<S, B, P>(
  state: &AppState<S, B, P>,
  range: SessionRange,
  speaker: NewSpeaker,
) -> Result<Option<Booking>, Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  if state
    .store
    .find_session_by_range(range)
    .await
    .map_err(Error::from_store)?
    .is_some()
  {
    tracing::info!(%range, "booking already exists, ignoring duplicate");
    return Ok(None);
  }

  let session = NewSession {
    range,
    recording_mixer: state.config.recording_mixer.clone(),
    playback_mixer:  state.config.playback_mixer.clone(),
    private:         state.config.form_private,
  };

  let booking = match state.store.create_booking(speaker, session).await {
    Ok(booking) => booking,
    Err(StoreError::Domain(CoreError::OverlappingSession)) => {
      // Lost a race against the duplicate delivery of this very event:
      // if the winner sits at exactly our range, this is a no-op.
      if state
        .store
        .find_session_by_range(range)
        .await
        .map_err(Error::from_store)?
        .is_some()
      {
        return Ok(None);
      }
      return Err(Error::Conflict(
        CoreError::OverlappingSession.to_string(),
      ));
    }
    Err(e) => return Err(Error::from_store(e)),
  };

  match state
    .store
    .claim_script(booking.session.session_id, &state.config.form_language)
    .await
  {
    Ok(script) => {
      tracing::info!(
        session = booking.session.session_id,
        script = script.script_id,
        "script claimed"
      );
    }
    Err(StoreError::Domain(CoreError::ScriptUnavailable(lang))) => {
      tracing::warn!(
        session = booking.session.session_id,
        language = %lang,
        "no unassigned script available, session stays unscripted"
      );
    }
    Err(e) => return Err(Error::from_store(e)),
  }

  Ok(Some(booking))
}

/// Issue the blob deletes a row deletion left behind. Storage failures are
/// logged and swallowed: an orphaned blob is reconciled out-of-band, a
/// blocked deletion is not.
pub(crate) async fn delete_orphaned_blobs<B: BlobStore>(
  blobs: &B,
  orphaned: &[BlobRef],
) {
  for blob in orphaned {
    if let Err(e) = blobs.delete(blob).await {
      tracing::warn!(blob = %blob, error = %e, "failed to delete orphaned blob");
    }
  }
}
