//! Booking and webhook server for the Resonance studio.
//!
//! Exposes an axum [`Router`] with the two signed webhook endpoints and
//! the JSON admin API, generic over the storage, blob, and scheduling
//! seams so tests can substitute any of them.

pub mod api;
pub mod error;
pub mod hooks;
pub mod signature;
pub mod storage;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use resonance_core::{
  archive::Description, blob::BlobStore, provider::SchedulingProvider,
  store::StudioStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Mapping from the form provider's opaque per-field identifiers to the
/// semantic speaker fields.
#[derive(Debug, Clone, Deserialize)]
pub struct FormFieldMap {
  pub sex:           String,
  pub date_of_birth: String,
  pub accent:        String,
  pub invitee:       String,
}

impl Default for FormFieldMap {
  fn default() -> Self {
    Self {
      sex:           "LwvCDF97Z3oh".to_owned(),
      date_of_birth: "BFHvuavpm2QD".to_owned(),
      accent:        "R3boiK7GwVaq".to_owned(),
      invitee:       "ntwEuuLyrVpH".to_owned(),
    }
  }
}

/// Runtime server configuration, deserialised from `config.toml` plus
/// `RESONANCE_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub blob_dir:   PathBuf,

  /// Shared secret for form-submission webhook signatures.
  pub form_secret:          String,
  /// Signing key for scheduling-provider webhook signatures.
  pub provider_signing_key: String,
  /// Bearer token for outbound provider calls.
  pub provider_token:       String,
  #[serde(default = "defaults::provider_base_url")]
  pub provider_base_url:    String,

  #[serde(default = "defaults::language")]
  pub form_language: String,
  #[serde(default)]
  pub form_private:  bool,
  #[serde(default)]
  pub form_fields:   FormFieldMap,

  #[serde(default)]
  pub recording_mixer: Option<String>,
  #[serde(default)]
  pub playback_mixer:  Option<String>,

  #[serde(default = "defaults::reconcile_interval_secs")]
  pub reconcile_interval_secs: u64,

  /// Documentation block rendered into every archive bundle.
  pub description: Description,
}

mod defaults {
  pub fn provider_base_url() -> String { "https://api.calendly.com".to_owned() }
  pub fn language() -> String { "en".to_owned() }
  pub fn reconcile_interval_secs() -> u64 { 900 }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, B, P> {
  pub store:    Arc<S>,
  pub blobs:    Arc<B>,
  pub provider: Arc<P>,
  pub config:   Arc<ServerConfig>,
}

impl<S, B, P> Clone for AppState<S, B, P> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      blobs:    self.blobs.clone(),
      provider: self.provider.clone(),
      config:   self.config.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the booking server.
pub fn router<S, B, P>(state: AppState<S, B, P>) -> Router
where
  S: StudioStore + 'static,
  B: BlobStore + 'static,
  P: SchedulingProvider + 'static,
{
  Router::new()
    // Webhooks
    .route("/hooks/forms",      post(hooks::forms::handler::<S, B, P>))
    .route("/hooks/scheduling", post(hooks::scheduling::handler::<S, B, P>))
    // Admin API
    .route("/api/sessions",     get(api::list_sessions::<S, B, P>))
    .route(
      "/api/sessions/{id}",
      get(api::get_session::<S, B, P>).delete(api::cancel_session::<S, B, P>),
    )
    .route(
      "/api/sessions/{id}/release-form",
      put(api::put_release_form::<S, B, P>),
    )
    .route(
      "/api/sessions/{id}/no-show",
      post(api::mark_no_show::<S, B, P>),
    )
    .route(
      "/api/sessions/{id}/script",
      axum::routing::delete(api::release_script::<S, B, P>),
    )
    .route(
      "/api/prompts/{id}/recording",
      put(api::put_recording::<S, B, P>)
        .delete(api::delete_recording::<S, B, P>),
    )
    .route("/api/scripts", post(api::add_script::<S, B, P>))
    .route("/api/scripts/{id}", get(api::get_script::<S, B, P>))
    .route(
      "/api/scripts/assign-instructions",
      post(api::assign_instructions::<S, B, P>),
    )
    .route(
      "/api/archives",
      get(api::list_archives::<S, B, P>).post(api::trigger_archive::<S, B, P>),
    )
    .route("/api/archives/audit", get(api::audit_archives::<S, B, P>))
    .route("/api/reconcile", post(api::reconcile::<S, B, P>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use chrono::{DateTime, TimeZone, Utc};
  use hmac::{Hmac, Mac as _};
  use resonance_core::{
    blob::{BlobStore as _, MemoryBlobStore},
    provider::{EventPage, ProviderEvent, ProviderInvitee, SchedulingProvider},
    script::NewPrompt,
    speaker::Sex,
    store::StudioStore as _,
  };
  use resonance_store_sqlite::SqliteStore;
  use sha2::Sha256;
  use tower::ServiceExt as _;

  use super::*;

  const SECRET: &str = "s3cr3t";

  // Byte-identical to the body hashed for FORM_SIG.
  const FORM_BODY: &str = r#"{"event_type":"form_response","form_response":{"answers":[{"field":{"id":"LwvCDF97Z3oh"},"choice":{"label":"FEMALE"}},{"field":{"id":"BFHvuavpm2QD"},"date":"1990-06-15"},{"field":{"id":"R3boiK7GwVaq"},"choice":{"label":"Scottish"}},{"field":{"id":"ntwEuuLyrVpH"},"url":"https://api.example.com/invitees/1"}]}}"#;
  // base64(HMAC-SHA256("s3cr3t", FORM_BODY)) — precomputed.
  const FORM_SIG: &str = "sha256=OD7HbvkvICQq813vSZqG1URHlXxcqyIURqz4p5uhFzg=";

  // ── Stub provider ───────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("stub provider has no answer for {0}")]
  struct StubError(String);

  /// Three invitees: /1 books June 10, /2 is /1's reschedule target on
  /// June 11, /3 books June 10 (used to force reschedule conflicts).
  struct StubProvider;

  fn hour(day: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, h, 0, 0).unwrap()
  }

  impl SchedulingProvider for StubProvider {
    type Error = StubError;

    async fn get_invitee(&self, url: &str) -> Result<ProviderInvitee, StubError> {
      let event_uri = match url {
        "https://api.example.com/invitees/1" => "https://api.example.com/events/9",
        "https://api.example.com/invitees/2" => "https://api.example.com/events/10",
        "https://api.example.com/invitees/3" => "https://api.example.com/events/11",
        other => return Err(StubError(other.to_owned())),
      };
      Ok(ProviderInvitee {
        uri:       url.to_owned(),
        name:      "Alice Liddell".to_owned(),
        email:     "alice@example.com".to_owned(),
        event_uri: event_uri.to_owned(),
        no_show:   false,
      })
    }

    async fn get_event(&self, url: &str) -> Result<ProviderEvent, StubError> {
      let (start, end) = match url {
        "https://api.example.com/events/9" => (hour(10, 9), hour(10, 10)),
        "https://api.example.com/events/10" => (hour(11, 9), hour(11, 10)),
        "https://api.example.com/events/11" => (hour(10, 9), hour(10, 10)),
        other => return Err(StubError(other.to_owned())),
      };
      Ok(ProviderEvent {
        uri: url.to_owned(),
        start_time: start,
        end_time: end,
        canceled: false,
      })
    }

    async fn list_events(
      &self,
      _min_start: DateTime<Utc>,
      _page_token: Option<&str>,
    ) -> Result<EventPage, StubError> {
      Ok(EventPage { events: vec![], next_page_token: None })
    }

    async fn events_at(
      &self,
      _start: DateTime<Utc>,
    ) -> Result<Vec<ProviderEvent>, StubError> {
      Ok(vec![])
    }

    async fn list_invitees(
      &self,
      _event_uri: &str,
    ) -> Result<Vec<ProviderInvitee>, StubError> {
      Ok(vec![])
    }

    async fn cancel_invitee(&self, _uri: &str) -> Result<(), StubError> {
      Ok(())
    }

    async fn report_no_show(&self, _invitee_uri: &str) -> Result<(), StubError> {
      Ok(())
    }
  }

  // ── Fixtures ────────────────────────────────────────────────────────────

  type TestState = AppState<SqliteStore, MemoryBlobStore, StubProvider>;

  async fn make_state() -> TestState {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:    Arc::new(store),
      blobs:    Arc::new(MemoryBlobStore::new()),
      provider: Arc::new(StubProvider),
      config:   Arc::new(ServerConfig {
        host:                    "127.0.0.1".to_owned(),
        port:                    8080,
        store_path:              PathBuf::from(":memory:"),
        blob_dir:                PathBuf::from("/tmp/resonance-test"),
        form_secret:             SECRET.to_owned(),
        provider_signing_key:    SECRET.to_owned(),
        provider_token:          "token".to_owned(),
        provider_base_url:       "https://api.example.com".to_owned(),
        form_language:           "en".to_owned(),
        form_private:            false,
        form_fields:             FormFieldMap::default(),
        recording_mixer:         Some("Scarlett 2i2".to_owned()),
        playback_mixer:          None,
        reconcile_interval_secs: 900,
        description:             Description {
          name:      "Studio A".to_owned(),
          location:  "Dresden".to_owned(),
          equipment: "Neumann U87".to_owned(),
        },
      }),
    }
  }

  async fn provision_script(state: &TestState, language: &str, prompts: usize) {
    let items = (0..prompts)
      .map(|i| NewPrompt::new(format!("{language} prompt {i}")))
      .collect();
    state.store.add_script(language, items).await.unwrap();
  }

  async fn send(
    state: &TestState,
    method: &str,
    uri: &str,
    headers: Vec<(&str, String)>,
    body: impl Into<Body>,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
      builder = builder.header(name, value);
    }
    let req = builder.body(body.into()).unwrap();
    router(state.clone()).oneshot(req).await.unwrap()
  }

  fn provider_sig(body: &str, t: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{t}.{body}").as_bytes());
    format!("t={t},v1={}", hex::encode(mac.finalize().into_bytes()))
  }

  async fn post_scheduling(state: &TestState, body: &str) -> axum::response::Response {
    let sig = provider_sig(body, Utc::now().timestamp());
    send(
      state,
      "POST",
      "/hooks/scheduling",
      vec![("calendly-webhook-signature", sig)],
      body.to_owned(),
    )
    .await
  }

  async fn post_form(state: &TestState) -> axum::response::Response {
    send(
      state,
      "POST",
      "/hooks/forms",
      vec![("typeform-signature", FORM_SIG.to_owned())],
      FORM_BODY,
    )
    .await
  }

  fn created_body(day: u32) -> String {
    format!(
      r#"{{"event":"invitee.created","payload":{{"name":"Bob","email":"bob@example.com","uri":"https://api.example.com/invitees/9","rescheduled":false,"scheduled_event":{{"uri":"https://api.example.com/events/99","start_time":"2024-06-{day:02}T09:00:00Z","end_time":"2024-06-{day:02}T10:00:00Z"}}}}}}"#
    )
  }

  async fn only_session(state: &TestState) -> resonance_core::session::Session {
    let sessions = state.store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    sessions.into_iter().next().unwrap()
  }

  /// Record the first prompt of the session's script through the API.
  async fn record_first_prompt(state: &TestState) {
    let session = only_session(state).await;
    let script = state
      .store
      .script_for_session(session.session_id)
      .await
      .unwrap()
      .unwrap();
    let prompts = state
      .store
      .prompts_for_script(script.script_id)
      .await
      .unwrap();
    let response = send(
      state,
      "PUT",
      &format!("/api/prompts/{}/recording", prompts[0].prompt_id),
      vec![],
      Body::from(vec![0x52u8, 0x49, 0x46, 0x46]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
  }

  // ── Form webhook ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn signed_form_submission_creates_a_booking() {
    let state = make_state().await;
    provision_script(&state, "en", 2).await;

    let response = post_form(&state).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = only_session(&state).await;
    assert_eq!(session.range.start(), hour(10, 9));
    assert!(session.script_id.is_some(), "script should be claimed");
    assert_eq!(session.recording_mixer.as_deref(), Some("Scarlett 2i2"));

    let speaker = state
      .store
      .get_speaker(session.speaker_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(speaker.name, "Alice Liddell");
    assert_eq!(speaker.sex, Sex::Female);
    assert_eq!(speaker.accent, "Scottish");
    assert_eq!(
      speaker.date_of_birth,
      chrono::NaiveDate::from_ymd_opt(1990, 6, 15)
    );
  }

  #[tokio::test]
  async fn duplicate_form_delivery_creates_exactly_one_booking() {
    let state = make_state().await;
    provision_script(&state, "en", 2).await;

    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);

    assert_eq!(state.store.list_sessions().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn unsigned_form_submission_is_rejected_before_parsing() {
    let state = make_state().await;

    let missing = send(&state, "POST", "/hooks/forms", vec![], FORM_BODY).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = send(
      &state,
      "POST",
      "/hooks/forms",
      vec![("typeform-signature", "sha256=AAAA".to_owned())],
      FORM_BODY,
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let bad_scheme = send(
      &state,
      "POST",
      "/hooks/forms",
      vec![("typeform-signature", FORM_SIG.replace("sha256", "sha1"))],
      FORM_BODY,
    )
    .await;
    assert_eq!(bad_scheme.status(), StatusCode::UNAUTHORIZED);

    assert!(state.store.list_sessions().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn form_booking_without_scripts_stays_unscripted() {
    let state = make_state().await;

    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    let session = only_session(&state).await;
    assert!(session.script_id.is_none());
  }

  // ── Scheduling webhook ──────────────────────────────────────────────────

  #[tokio::test]
  async fn provider_created_event_books_a_session() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;

    let response = post_scheduling(&state, &created_body(12)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = only_session(&state).await;
    assert_eq!(session.range.start(), hour(12, 9));
    let speaker = state
      .store
      .get_speaker(session.speaker_id)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(speaker.name, "Bob");
  }

  #[tokio::test]
  async fn stale_provider_timestamp_is_rejected_despite_valid_signature() {
    let state = make_state().await;
    let body = created_body(12);
    let stale = (Utc::now() - chrono::Duration::minutes(10)).timestamp();

    let response = send(
      &state,
      "POST",
      "/hooks/scheduling",
      vec![("calendly-webhook-signature", provider_sig(&body, stale))],
      body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(state.store.list_sessions().await.unwrap().is_empty());
  }

  fn canceled_body(day: u32) -> String {
    format!(
      r#"{{"event":"invitee.canceled","payload":{{"rescheduled":false,"scheduled_event":{{"start_time":"2024-06-{day:02}T09:00:00Z","end_time":"2024-06-{day:02}T10:00:00Z"}}}}}}"#
    )
  }

  #[tokio::test]
  async fn cancellation_deletes_session_speaker_and_release_form() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);

    let session = only_session(&state).await;
    let upload = send(
      &state,
      "PUT",
      &format!("/api/sessions/{}/release-form", session.session_id),
      vec![],
      Body::from("pdf bytes"),
    )
    .await;
    assert_eq!(upload.status(), StatusCode::OK);
    assert_eq!(state.blobs.len(), 1);

    let response = post_scheduling(&state, &canceled_body(10)).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state.store.list_sessions().await.unwrap().is_empty());
    assert!(
      state
        .store
        .get_speaker(session.speaker_id)
        .await
        .unwrap()
        .is_none()
    );
    assert_eq!(state.blobs.len(), 0, "release form blob should be deleted");
  }

  #[tokio::test]
  async fn cancellation_with_recordings_is_a_silent_no_op() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let response = post_scheduling(&state, &canceled_body(10)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Recorded media is preserved: the session survives the cancel.
    assert_eq!(state.store.list_sessions().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn cancellation_of_unknown_booking_is_a_no_op() {
    let state = make_state().await;
    let response = post_scheduling(&state, &canceled_body(27)).await;
    assert_eq!(response.status(), StatusCode::OK);
  }

  fn no_show_body() -> String {
    r#"{"event":"invitee_no_show.created","payload":{"invitee":"https://api.example.com/invitees/1"}}"#
      .to_owned()
  }

  #[tokio::test]
  async fn no_show_event_unassigns_script_and_flags_session() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);

    let response = post_scheduling(&state, &no_show_body()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = only_session(&state).await;
    assert!(session.no_show);
    assert!(session.script_id.is_none());
  }

  #[tokio::test]
  async fn no_show_with_recordings_demands_operator_intervention() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let response = post_scheduling(&state, &no_show_body()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let session = only_session(&state).await;
    assert!(!session.no_show);
  }

  fn rescheduled_body(day: u32, new_invitee: &str) -> String {
    format!(
      r#"{{"event":"invitee.canceled","payload":{{"rescheduled":true,"new_invitee":"https://api.example.com/invitees/{new_invitee}","scheduled_event":{{"start_time":"2024-06-{day:02}T09:00:00Z","end_time":"2024-06-{day:02}T10:00:00Z"}}}}}}"#
    )
  }

  #[tokio::test]
  async fn reschedule_moves_the_session_to_the_new_range() {
    let state = make_state().await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);

    // Invitee 2 resolves to the June 11 event.
    let response = post_scheduling(&state, &rescheduled_body(10, "2")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = only_session(&state).await;
    assert_eq!(session.range.start(), hour(11, 9));
  }

  #[tokio::test]
  async fn reschedule_into_a_conflict_keeps_the_original_range() {
    let state = make_state().await;
    // Alice holds June 10 09:00.
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    // Bob books June 12.
    assert_eq!(
      post_scheduling(&state, &created_body(12)).await.status(),
      StatusCode::OK
    );

    // Bob reschedules onto June 10 09:00 (invitee 3) — conflict.
    let response = post_scheduling(&state, &rescheduled_body(12, "3")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let sessions = state.store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().any(|s| s.range.start() == hour(12, 9)));
  }

  // ── Admin API ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn release_form_survives_recordings_and_replaces_cleanly() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let session = only_session(&state).await;
    let uri = format!("/api/sessions/{}/release-form", session.session_id);

    let first = send(&state, "PUT", &uri, vec![], Body::from("v1")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = send(&state, "PUT", &uri, vec![], Body::from("v2")).await;
    assert_eq!(second.status(), StatusCode::OK);

    // One recording + exactly one release-form blob (the replacement).
    assert_eq!(state.blobs.len(), 2);
    let session = only_session(&state).await;
    let form = session.release_form.unwrap();
    assert_eq!(
      state.blobs.get(&form).await.unwrap(),
      b"v2".to_vec()
    );
  }

  #[tokio::test]
  async fn archive_trigger_packages_in_the_background() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let body = r#"{"start":"2024-06-01T00:00:00Z","end":"2024-07-01T00:00:00Z","language":"en"}"#;
    let response = send(
      &state,
      "POST",
      "/api/archives",
      vec![("content-type", "application/json".to_owned())],
      body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The job runs detached; wait for it to land.
    let mut archives = Vec::new();
    for _ in 0..100 {
      archives = state.store.list_archives().await.unwrap();
      if !archives.is_empty() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(archives.len(), 1);
    assert!(state.blobs.exists(&archives[0].name).await.unwrap());
    assert!(only_session(&state).await.archive_id.is_some());
  }

  #[tokio::test]
  async fn archive_trigger_is_rejected_while_a_run_is_active() {
    let state = make_state().await;
    state
      .store
      .begin_job(resonance_jobs::ARCHIVE_JOB)
      .await
      .unwrap()
      .unwrap();

    let body = r#"{"start":"2024-06-01T00:00:00Z","end":"2024-07-01T00:00:00Z","language":"en"}"#;
    let response = send(
      &state,
      "POST",
      "/api/archives",
      vec![("content-type", "application/json".to_owned())],
      body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn archive_trigger_validates_the_window() {
    let state = make_state().await;
    let body = r#"{"start":"2024-07-01T00:00:00Z","end":"2024-06-01T00:00:00Z","language":"en"}"#;
    let response = send(
      &state,
      "POST",
      "/api/archives",
      vec![("content-type", "application/json".to_owned())],
      body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn admin_cancel_of_recorded_session_surfaces_the_policy_error() {
    let state = make_state().await;
    provision_script(&state, "en", 1).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let session = only_session(&state).await;
    let response = send(
      &state,
      "DELETE",
      &format!("/api/sessions/{}", session.session_id),
      vec![],
      Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn session_detail_reports_the_stage() {
    let state = make_state().await;
    provision_script(&state, "en", 2).await;
    assert_eq!(post_form(&state).await.status(), StatusCode::OK);
    record_first_prompt(&state).await;

    let session = only_session(&state).await;
    let response = send(
      &state,
      "GET",
      &format!("/api/sessions/{}", session.session_id),
      vec![],
      Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let detail: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(detail["stage"], "recording");
    assert_eq!(detail["prompts"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn reconcile_endpoint_reports_drift() {
    let state = make_state().await;
    let response = send(&state, "POST", "/api/reconcile", vec![], Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    let missing: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(missing.as_array().unwrap().len(), 0);
  }
}
