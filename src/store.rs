//! Story store gateway: a PostgREST-style HTTP client for the `stories` table.
//!
//! The gateway performs no authorization itself; the HTTP layer decides who
//! may list whose stories. Calls use a short timeout so an unreachable store
//! degrades a request instead of hanging it.

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::StoredStory;

const STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("store HTTP {status}: {body}")]
  Http { status: u16, body: String },
  #[error("story {0} not found")]
  NotFound(Uuid),
  #[error("store returned no row for insert")]
  EmptyInsert,
}

#[derive(Clone)]
pub struct StoryStore {
  client: reqwest::Client,
  base_url: String,
  service_key: String,
}

impl StoryStore {
  pub fn new(cfg: &Config) -> Result<Self, StoreError> {
    let client = reqwest::Client::builder().timeout(STORE_TIMEOUT).build()?;
    Ok(Self {
      client,
      base_url: cfg.auth_service_url.clone(),
      service_key: cfg.auth_service_key.clone(),
    })
  }

  fn table_url(&self) -> String {
    format!("{}/rest/v1/stories", self.base_url)
  }

  fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("apikey", &self.service_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
  }

  async fn fail_on_status(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if res.status().is_success() {
      return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(StoreError::Http { status, body })
  }

  /// Atomic single-row insert. Returns the id of the stored row.
  #[instrument(level = "info", skip(self, story), fields(user_id = %story.user_id, is_anonymous = story.is_anonymous))]
  pub async fn insert(&self, story: &StoredStory) -> Result<Uuid, StoreError> {
    #[derive(Deserialize)]
    struct InsertedRow {
      id: Uuid,
    }

    let res = self
      .request(self.client.post(self.table_url()))
      .header("Prefer", "return=representation")
      .json(&[story])
      .send()
      .await?;
    let res = Self::fail_on_status(res).await?;
    let rows: Vec<InsertedRow> = res.json().await?;
    rows.first().map(|r| r.id).ok_or(StoreError::EmptyInsert)
  }

  /// Stories for one user, newest first. Anonymous listings additionally
  /// filter on `is_anonymous` so an authenticated id can never collide with
  /// an anonymous one.
  #[instrument(level = "info", skip(self), fields(%user_id, is_anonymous))]
  pub async fn list_by_user(
    &self,
    user_id: &str,
    is_anonymous: bool,
  ) -> Result<Vec<StoredStory>, StoreError> {
    let mut query = vec![
      ("user_id".to_string(), format!("eq.{user_id}")),
      ("order".to_string(), "created_at.desc".to_string()),
    ];
    if is_anonymous {
      query.push(("is_anonymous".to_string(), "eq.true".to_string()));
    }

    let res = self
      .request(self.client.get(self.table_url()).query(&query))
      .send()
      .await?;
    let res = Self::fail_on_status(res).await?;
    Ok(res.json().await?)
  }

  #[allow(dead_code)]
  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn get_by_id(&self, id: Uuid) -> Result<StoredStory, StoreError> {
    let res = self
      .request(
        self
          .client
          .get(self.table_url())
          .query(&[("id", format!("eq.{id}"))]),
      )
      .send()
      .await?;
    let res = Self::fail_on_status(res).await?;
    let rows: Vec<StoredStory> = res.json().await?;
    rows.into_iter().next().ok_or(StoreError::NotFound(id))
  }

  #[allow(dead_code)]
  #[instrument(level = "info", skip(self), fields(%id))]
  pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
    let res = self
      .request(
        self
          .client
          .delete(self.table_url())
          .query(&[("id", format!("eq.{id}"))]),
      )
      .send()
      .await?;
    Self::fail_on_status(res).await?;
    Ok(())
  }
}
