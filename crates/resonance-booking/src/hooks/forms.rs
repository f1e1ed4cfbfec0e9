//! Form-submission webhook.
//!
//! The form provider posts an answer list keyed by opaque per-field ids;
//! the mapping to semantic fields lives in configuration. The invitee
//! answer carries a URL into the scheduling provider, which is where the
//! speaker identity and the booked time range come from.

use axum::{
  extract::{Request, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use resonance_core::{
  blob::BlobStore,
  provider::SchedulingProvider,
  range::SessionRange,
  speaker::{NewSpeaker, Sex},
  store::StudioStore,
};

use crate::{
  AppState,
  error::Error,
  hooks::{collect_body, create_booking_idempotent},
  signature::verify_form_signature,
};

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FormPayload {
  pub event_type:    String,
  #[serde(default)]
  pub form_response: Option<FormResponse>,
}

#[derive(Debug, Deserialize)]
pub struct FormResponse {
  #[serde(default)]
  pub answers: Vec<FormAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct FormAnswer {
  pub field:  FormField,
  #[serde(default)]
  pub choice: Option<FormChoice>,
  #[serde(default)]
  pub date:   Option<NaiveDate>,
  #[serde(default)]
  pub url:    Option<String>,
  #[serde(default)]
  pub text:   Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormField {
  pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct FormChoice {
  pub label: String,
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// `POST /hooks/forms`
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

  // Authenticate before parsing a single byte of the body.
  if let Err(e) =
    verify_form_signature(&parts.headers, &bytes, &state.config.form_secret)
  {
    return e.into_response();
  }

  match process(&state, &bytes).await {
    Ok(()) => StatusCode::OK.into_response(),
    Err(e) => e.into_response(),
  }
}

async fn process<S, B, P>(
  state: &AppState<S, B, P>,
  bytes: &[u8],
) -> Result<(), Error>
where
  S: StudioStore,
  B: BlobStore,
  P: SchedulingProvider,
{
  let payload: FormPayload = serde_json::from_slice(bytes)
    .map_err(|e| Error::BadRequest(format!("malformed form payload: {e}")))?;

  if payload.event_type != "form_response" {
    return Ok(());
  }
  let Some(response) = payload.form_response else {
    return Ok(());
  };

  let fields = &state.config.form_fields;
  let mut sex = Sex::Other;
  let mut date_of_birth = None;
  let mut accent = String::new();
  let mut invitee_url = None;

  for answer in &response.answers {
    let id = answer.field.id.as_str();
    if id == fields.sex {
      if let Some(choice) = &answer.choice {
        sex = Sex::from_label(&choice.label);
      }
    } else if id == fields.date_of_birth {
      date_of_birth = answer.date;
    } else if id == fields.accent {
      if let Some(choice) = &answer.choice {
        accent = choice.label.clone();
      } else if let Some(text) = &answer.text {
        accent = text.clone();
      }
    } else if id == fields.invitee {
      invitee_url = answer.url.clone();
    }
  }

  let Some(url) = invitee_url else {
    return Err(Error::BadRequest(
      "form carries no invitee reference".to_owned(),
    ));
  };

  // Fetch everything from the provider first, write locally second.
  let invitee = state
    .provider
    .get_invitee(&url)
    .await
    .map_err(Error::from_provider)?;
  let event = state
    .provider
    .get_event(&invitee.event_uri)
    .await
    .map_err(Error::from_provider)?;
  let range = SessionRange::new(event.start_time, event.end_time)
    .map_err(|e| Error::BadRequest(e.to_string()))?;

  let speaker = NewSpeaker {
    name: invitee.name,
    email: invitee.email,
    date_of_birth,
    sex,
    accent,
    code: String::new(),
  };

  create_booking_idempotent(state, range, speaker).await?;
  Ok(())
}
