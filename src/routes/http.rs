//! HTTP endpoint handlers. These are thin wrappers that normalize inputs,
//! enforce listing authorization, and forward to the orchestrator.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::identity::is_valid_anonymous_id;
use crate::orchestrator;
use crate::protocol::{
  ContinueData, ContinueMeta, ContinueStoryIn, ContinueStoryOut, GenerateStoryIn,
  GenerateStoryOut, HealthOut, UserStoriesOut,
};
use crate::state::AppState;

/// Token from the Authorization header, without the `Bearer ` prefix.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get(AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

fn anonymous_id_header(headers: &HeaderMap) -> Option<String> {
  headers
    .get("x-anonymous-id")
    .and_then(|v| v.to_str().ok())
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
}

#[instrument(level = "info", skip_all)]
pub async fn generate_story(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(mut body): Json<GenerateStoryIn>,
) -> Result<Json<GenerateStoryOut>, ApiError> {
  let bearer = bearer_token(&headers);
  // Header takes precedence over the body field when both are supplied.
  let supplied_anon = anonymous_id_header(&headers).or_else(|| body.anonymous_id.take());

  let request = body.normalize()?;
  let outcome =
    orchestrator::generate_story(&state, request, bearer.as_deref(), supplied_anon.as_deref())
      .await?;

  info!(
    target: "generate",
    user_id = %outcome.identity.user_id,
    saved = outcome.story_id.is_some(),
    "generate-story served"
  );
  Ok(Json(GenerateStoryOut::new(
    outcome.artifact,
    outcome.identity,
    outcome.story_id,
    outcome.save_error,
  )))
}

#[instrument(level = "info", skip_all)]
pub async fn continue_story(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ContinueStoryIn>,
) -> Result<Json<ContinueStoryOut>, ApiError> {
  let request = body.normalize()?;
  let outcome = orchestrator::continue_story(&state, request).await?;

  info!(
    target: "generate",
    model = %outcome.model,
    words = outcome.artifact.word_count_observed,
    "continue-story served"
  );
  Ok(Json(ContinueStoryOut {
    data: ContinueData { continuation: outcome.artifact },
    meta: ContinueMeta {
      model: outcome.model,
      processing_time_seconds: outcome.processing_time_seconds,
    },
  }))
}

/// Listing authorization: anonymous ids need no auth; any other id requires a
/// valid bearer whose subject matches the requested user.
#[instrument(level = "info", skip(state, headers), fields(%user_id))]
pub async fn user_stories(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
  headers: HeaderMap,
) -> Result<Json<UserStoriesOut>, ApiError> {
  let is_anonymous = is_valid_anonymous_id(&user_id);
  if !is_anonymous {
    let bearer = bearer_token(&headers).ok_or_else(|| {
      ApiError::Unauthorized("bearer token required to list a non-anonymous user".into())
    })?;
    let user = state.auth.validate_token(&bearer).await?;
    if user.id != user_id {
      return Err(ApiError::Forbidden(
        "authenticated user does not match requested user".into(),
      ));
    }
  }

  let stories = state
    .store
    .list_by_user(&user_id, is_anonymous)
    .await
    .map_err(|e| ApiError::Internal(format!("story listing failed: {e}")))?;

  info!(target: "fabula_backend", count = stories.len(), "user-stories served");
  Ok(Json(UserStoriesOut { stories }))
}

#[instrument(level = "info")]
pub async fn health() -> Json<HealthOut> {
  Json(HealthOut { status: "ok" })
}
