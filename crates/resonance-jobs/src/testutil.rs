//! Shared fixtures for job tests: an in-memory store seeded with recorded
//! sessions, and a canned scheduling provider.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use resonance_core::{
  archive::Description,
  blob::{BlobStore as _, MemoryBlobStore},
  provider::{EventPage, ProviderEvent, ProviderInvitee, SchedulingProvider},
  range::SessionRange,
  script::NewPrompt,
  session::NewSession,
  speaker::{NewSpeaker, Sex},
  store::StudioStore as _,
};
use resonance_store_sqlite::SqliteStore;

pub async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

pub fn description() -> Description {
  Description {
    name:      "Studio A".into(),
    location:  "Dresden".into(),
    equipment: "Neumann U87".into(),
  }
}

/// Book a one-hour session on 2024-01-`day`, claim a fresh English script
/// with `prompts` items, and record every prompt into `blobs`.
pub async fn seed_recorded_session(
  store: &SqliteStore,
  blobs: &MemoryBlobStore,
  day: u32,
  name: &str,
  prompts: usize,
) -> i64 {
  let range = SessionRange::new(
    Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap(),
    Utc.with_ymd_and_hms(2024, 1, day, 11, 0, 0).unwrap(),
  )
  .unwrap();

  let booking = store
    .create_booking(
      NewSpeaker {
        name:          name.to_owned(),
        email:         format!("{}@example.com", name.to_lowercase()),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15),
        sex:           Sex::Female,
        accent:        "scottish".to_owned(),
        code:          String::new(),
      },
      NewSession {
        range,
        recording_mixer: None,
        playback_mixer:  None,
        private:         false,
      },
    )
    .await
    .unwrap();
  let session_id = booking.session.session_id;

  let items = (0..prompts)
    .map(|i| NewPrompt::new(format!("{name} prompt {i}")))
    .collect();
  let script = store.add_script("en", items).await.unwrap();
  store.claim_script(session_id, "en").await.unwrap();

  for prompt in store.prompts_for_script(script.script_id).await.unwrap() {
    let key = booking.session.recording_key(prompt.prompt_id);
    let blob = blobs.put(&key, vec![0x52, 0x49, 0x46, 0x46]).await.unwrap();
    store
      .attach_recording(prompt.prompt_id, blob, 4)
      .await
      .unwrap();
  }

  session_id
}

// ─── Canned provider ─────────────────────────────────────────────────────────

/// Scripted [`SchedulingProvider`]: serves pre-built event pages in order
/// and canned invitee lists per event URI.
pub struct CannedProvider {
  pages:    Mutex<Vec<EventPage>>,
  invitees: Vec<(String, Vec<ProviderInvitee>)>,
}

impl CannedProvider {
  pub fn new(pages: Vec<EventPage>) -> Self {
    Self { pages: Mutex::new(pages), invitees: Vec::new() }
  }

  pub fn with_invitees(
    mut self,
    event_uri: &str,
    invitees: Vec<ProviderInvitee>,
  ) -> Self {
    self.invitees.push((event_uri.to_owned(), invitees));
    self
  }
}

#[derive(Debug, thiserror::Error)]
#[error("canned provider has no answer for {0}")]
pub struct NoAnswer(String);

impl SchedulingProvider for CannedProvider {
  type Error = NoAnswer;

  async fn get_invitee(&self, url: &str) -> Result<ProviderInvitee, NoAnswer> {
    self
      .invitees
      .iter()
      .flat_map(|(_, list)| list)
      .find(|i| i.uri == url)
      .cloned()
      .ok_or_else(|| NoAnswer(url.to_owned()))
  }

  async fn get_event(&self, url: &str) -> Result<ProviderEvent, NoAnswer> {
    Err(NoAnswer(url.to_owned()))
  }

  async fn list_events(
    &self,
    _min_start: DateTime<Utc>,
    _page_token: Option<&str>,
  ) -> Result<EventPage, NoAnswer> {
    let mut pages = self.pages.lock().unwrap();
    if pages.is_empty() {
      return Ok(EventPage { events: vec![], next_page_token: None });
    }
    Ok(pages.remove(0))
  }

  async fn events_at(
    &self,
    _start: DateTime<Utc>,
  ) -> Result<Vec<ProviderEvent>, NoAnswer> {
    Ok(vec![])
  }

  async fn list_invitees(
    &self,
    event_uri: &str,
  ) -> Result<Vec<ProviderInvitee>, NoAnswer> {
    self
      .invitees
      .iter()
      .find(|(uri, _)| uri == event_uri)
      .map(|(_, list)| list.clone())
      .ok_or_else(|| NoAnswer(event_uri.to_owned()))
  }

  async fn cancel_invitee(&self, _uri: &str) -> Result<(), NoAnswer> { Ok(()) }

  async fn report_no_show(&self, _invitee_uri: &str) -> Result<(), NoAnswer> {
    Ok(())
  }
}
