//! Identity resolution: authenticated, pseudonymous, or freshly-anonymous.
//!
//! Priority order:
//!   1. bearer token validated against the auth provider
//!   2. client-supplied anonymous id (`X-Anonymous-Id` header or
//!      `anonymous_id` body field) matching `anon-<alphanumeric>`
//!   3. a freshly minted `anon-...` id
//!
//! A bearer token that fails validation is NOT fatal: generation is open to
//! anonymous users, so the resolver falls through to 2/3 with a warning.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::config::Config;
use crate::domain::Identity;
use crate::error::ApiError;
use std::time::Duration;

const ANON_PREFIX: &str = "anon-";
const MINTED_ID_LEN: usize = 16;

/// A validated user as reported by the auth provider.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthUser {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

/// Thin client for the auth provider's token-validation endpoint.
#[derive(Clone)]
pub struct AuthClient {
  client: reqwest::Client,
  base_url: String,
  service_key: String,
}

impl AuthClient {
  pub fn new(cfg: &Config) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()
      .map_err(|e| ApiError::Internal(format!("failed to build auth http client: {e}")))?;
    Ok(Self {
      client,
      base_url: cfg.auth_service_url.clone(),
      service_key: cfg.auth_service_key.clone(),
    })
  }

  /// Validate a bearer token; returns the user it belongs to.
  /// The service key goes in `apikey`, the user token in `Authorization`.
  #[instrument(level = "info", skip_all)]
  pub async fn validate_token(&self, bearer: &str) -> Result<AuthUser, ApiError> {
    let url = format!("{}/auth/v1/user", self.base_url);
    let res = self
      .client
      .get(&url)
      .header("apikey", &self.service_key)
      .header(AUTHORIZATION, format!("Bearer {bearer}"))
      .send()
      .await
      .map_err(|e| ApiError::Unauthorized(format!("token validation unavailable: {e}")))?;

    if !res.status().is_success() {
      return Err(ApiError::Unauthorized(format!(
        "token rejected by auth provider (HTTP {})",
        res.status()
      )));
    }

    let user = res
      .json::<AuthUser>()
      .await
      .map_err(|e| ApiError::Unauthorized(format!("undecodable auth response: {e}")))?;
    // Log presence only; the address itself is PII.
    tracing::debug!(target: "fabula_backend", email_present = user.email.is_some(), "token validated");
    Ok(user)
  }
}

/// `anon-` followed by at least one alphanumeric character, nothing else.
pub fn is_valid_anonymous_id(s: &str) -> bool {
  match s.strip_prefix(ANON_PREFIX) {
    Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()),
    None => false,
  }
}

pub fn mint_anonymous_id() -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(MINTED_ID_LEN)
    .map(char::from)
    .collect();
  format!("{ANON_PREFIX}{suffix}")
}

/// Resolve the identity a request acts under. Never fails.
#[instrument(level = "info", skip_all, fields(has_bearer = bearer.is_some(), has_anon = supplied_anon.is_some()))]
pub async fn resolve_identity(
  auth: &AuthClient,
  bearer: Option<&str>,
  supplied_anon: Option<&str>,
) -> Identity {
  if let Some(token) = bearer {
    match auth.validate_token(token).await {
      Ok(user) => return Identity::authenticated(user.id),
      Err(e) => {
        warn!(target: "fabula_backend", error = %e, "bearer token invalid; falling back to anonymous");
      }
    }
  }

  if let Some(anon) = supplied_anon {
    if is_valid_anonymous_id(anon) {
      return Identity::anonymous(anon);
    }
    warn!(target: "fabula_backend", "supplied anonymous id does not match anon-<alphanumeric>; minting a fresh one");
  }

  Identity::anonymous(mint_anonymous_id())
}
