//! REST client for the scheduling provider.
//!
//! A thin typed layer over the provider's API: bearer-token auth, a
//! request timeout on every call, and cursor pagination surfaced as
//! [`EventPage`]. Resource URIs arriving in webhook payloads may be
//! absolute; they are re-rooted onto the configured base URL so a
//! compromised payload cannot redirect requests elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, de::DeserializeOwned};

use resonance_core::provider::{
  EventPage, ProviderEvent, ProviderInvitee, SchedulingProvider,
};

use crate::{Error, Result};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Resource<T> {
  resource: T,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
  collection: Vec<T>,
  #[serde(default)]
  pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
  #[serde(default)]
  next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResource {
  uri:                  String,
  current_organization: String,
}

#[derive(Debug, Deserialize)]
struct EventResource {
  uri:          String,
  start_time:   DateTime<Utc>,
  end_time:     DateTime<Utc>,
  #[serde(default)]
  cancellation: Option<serde_json::Value>,
}

impl From<EventResource> for ProviderEvent {
  fn from(e: EventResource) -> Self {
    ProviderEvent {
      uri:        e.uri,
      start_time: e.start_time,
      end_time:   e.end_time,
      canceled:   e.cancellation.is_some(),
    }
  }
}

#[derive(Debug, Deserialize)]
struct InviteeResource {
  uri:     String,
  name:    String,
  email:   String,
  event:   String,
  #[serde(default)]
  no_show: Option<serde_json::Value>,
}

impl From<InviteeResource> for ProviderInvitee {
  fn from(i: InviteeResource) -> Self {
    ProviderInvitee {
      uri:       i.uri,
      name:      i.name,
      email:     i.email,
      event_uri: i.event,
      no_show:   !matches!(
        i.no_show,
        None | Some(serde_json::Value::Null)
      ),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Typed client over the scheduling provider's REST API.
pub struct RestSchedulingClient {
  http:         reqwest::Client,
  base_url:     String,
  token:        String,
  user:         String,
  organization: String,
}

impl RestSchedulingClient {
  /// Build a client and resolve the authenticated user's organization,
  /// which event listings are scoped to.
  pub async fn connect(base_url: &str, token: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()?;

    let mut client = Self {
      http,
      base_url: base_url.trim_end_matches('/').to_owned(),
      token: token.to_owned(),
      user: String::new(),
      organization: String::new(),
    };

    let me: Resource<UserResource> = client.get_json("users/me", &[]).await?;
    client.user = me.resource.uri;
    client.organization = me.resource.current_organization;
    Ok(client)
  }

  /// Re-root a possibly-absolute resource URI onto the configured base.
  fn normalize(&self, path: &str) -> String {
    let path = match reqwest::Url::parse(path) {
      Ok(url) => url.path().to_owned(),
      Err(_) => path.to_owned(),
    };
    format!("{}/{}", self.base_url, path.trim_start_matches('/'))
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T> {
    let response = self
      .http
      .get(self.normalize(path))
      .bearer_auth(&self.token)
      .query(params)
      .send()
      .await?;
    Self::decode(response).await
  }

  async fn post_json<T: DeserializeOwned>(
    &self,
    path: &str,
    body: serde_json::Value,
  ) -> Result<T> {
    let response = self
      .http
      .post(self.normalize(path))
      .bearer_auth(&self.token)
      .json(&body)
      .send()
      .await?;
    Self::decode(response).await
  }

  async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      tracing::debug!(status = status.as_u16(), "provider request failed");
      return Err(Error::Api { status: status.as_u16(), body });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
      .map_err(|e| Error::Malformed(e.to_string()))
  }

  fn min_start_param(start: DateTime<Utc>) -> String {
    start.format("%Y-%m-%dT%H:%M:%S.000000Z").to_string()
  }
}

impl SchedulingProvider for RestSchedulingClient {
  type Error = Error;

  async fn get_invitee(&self, url: &str) -> Result<ProviderInvitee> {
    let invitee: Resource<InviteeResource> = self.get_json(url, &[]).await?;
    Ok(invitee.resource.into())
  }

  async fn get_event(&self, url: &str) -> Result<ProviderEvent> {
    let event: Resource<EventResource> = self.get_json(url, &[]).await?;
    Ok(event.resource.into())
  }

  async fn list_events(
    &self,
    min_start: DateTime<Utc>,
    page_token: Option<&str>,
  ) -> Result<EventPage> {
    let mut params = vec![
      ("min_start_time", Self::min_start_param(min_start)),
      ("organization", self.organization.clone()),
    ];
    if let Some(token) = page_token {
      params.push(("page_token", token.to_owned()));
    }

    let page: Collection<EventResource> =
      self.get_json("scheduled_events", &params).await?;
    Ok(EventPage {
      events:          page.collection.into_iter().map(Into::into).collect(),
      next_page_token: page.pagination.and_then(|p| p.next_page_token),
    })
  }

  async fn events_at(&self, start: DateTime<Utc>) -> Result<Vec<ProviderEvent>> {
    let stamp = Self::min_start_param(start);
    let params = vec![
      ("user", self.user.clone()),
      ("organization", self.organization.clone()),
      ("min_start_time", stamp.clone()),
      ("max_start_time", stamp),
    ];

    let page: Collection<EventResource> =
      self.get_json("scheduled_events", &params).await?;
    Ok(page.collection.into_iter().map(Into::into).collect())
  }

  async fn list_invitees(&self, event_uri: &str) -> Result<Vec<ProviderInvitee>> {
    let path = format!("{}/invitees", event_uri.trim_end_matches('/'));
    let page: Collection<InviteeResource> = self.get_json(&path, &[]).await?;
    Ok(page.collection.into_iter().map(Into::into).collect())
  }

  async fn cancel_invitee(&self, uri: &str) -> Result<()> {
    let path = format!("{}/cancellation", uri.trim_end_matches('/'));
    let _: serde_json::Value = self
      .post_json(&path, serde_json::json!({ "reason": "canceled by studio" }))
      .await?;
    Ok(())
  }

  async fn report_no_show(&self, invitee_uri: &str) -> Result<()> {
    let _: serde_json::Value = self
      .post_json(
        "invitee_no_shows",
        serde_json::json!({ "invitee": invitee_uri }),
      )
      .await?;
    Ok(())
  }
}
