//! The per-request generation flow.
//!
//! Initial generation walks a strict sequence: build prompt, call the model,
//! validate/repair the output, resolve the identity, then persist. Only the
//! persistence step is best-effort: a store failure is folded into the
//! success payload as `saved=false` + `save_error`, because the user should
//! still receive the artifact they paid a model call for.

use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
  ContinuationArtifact, ContinuationRequest, GeneratedArtifact, GenerationRequest, Identity,
  StoredStory,
};
use crate::error::ApiError;
use crate::identity::resolve_identity;
use crate::prompt::{build_continuation_prompt, build_generation_prompt};
use crate::state::AppState;
use crate::util::{count_words, trunc_for_log};
use crate::validator::validate_artifact;

/// Everything a successful generation produced.
pub struct GenerationOutcome {
  pub artifact: GeneratedArtifact,
  pub identity: Identity,
  pub story_id: Option<Uuid>,
  pub save_error: Option<String>,
}

/// Everything a successful continuation produced.
pub struct ContinuationOutcome {
  pub artifact: ContinuationArtifact,
  pub model: String,
  pub processing_time_seconds: f64,
}

/// validated -> prompting -> calling -> parsing -> identifying -> persisting.
#[instrument(level = "info", skip_all, fields(subject = %request.subject, grade = %request.academic_grade, word_count = request.word_count))]
pub async fn generate_story(
  state: &AppState,
  request: GenerationRequest,
  bearer: Option<&str>,
  supplied_anon: Option<&str>,
) -> Result<GenerationOutcome, ApiError> {
  let prompt = build_generation_prompt(&state.prompts, &request);

  let outcome = state.model.chat(&prompt).await?;
  info!(
    target: "generate",
    model = %outcome.model,
    response_len = outcome.text.len(),
    "model response received"
  );

  let validated = validate_artifact(&outcome.text, &request.subject)?;
  if !validated.warnings.is_empty() {
    warn!(
      target: "generate",
      repairs = validated.warnings.len(),
      "artifact accepted after repair"
    );
  }

  // Identity resolution cannot fail; invalid bearers degrade to anonymous.
  let identity = resolve_identity(&state.auth, bearer, supplied_anon).await;

  let row = StoredStory::from_generation(&request, &validated.artifact, &identity);
  let (story_id, save_error) = match state.store.insert(&row).await {
    Ok(id) => {
      info!(target: "generate", story_id = %id, user_id = %identity.user_id, "story persisted");
      (Some(id), None)
    }
    Err(e) => {
      error!(target: "generate", error = %e, "story persistence failed; returning artifact unsaved");
      (None, Some(e.to_string()))
    }
  };

  Ok(GenerationOutcome { artifact: validated.artifact, identity, story_id, save_error })
}

/// Continuation skips artifact validation: the model returns plain prose,
/// and the response wraps it with observed word count + provider timestamp.
#[instrument(level = "info", skip_all, fields(word_count = request.word_count, difficulty = ?request.difficulty))]
pub async fn continue_story(
  state: &AppState,
  request: ContinuationRequest,
) -> Result<ContinuationOutcome, ApiError> {
  let prompt = build_continuation_prompt(&state.prompts, &request);

  let start = Instant::now();
  let outcome = state.model.chat(&prompt).await?;
  let processing_time_seconds = start.elapsed().as_secs_f64();

  let content = outcome.text.trim().to_string();
  info!(
    target: "generate",
    model = %outcome.model,
    words = count_words(&content),
    preview = %trunc_for_log(&content, 80),
    "continuation received"
  );

  Ok(ContinuationOutcome {
    artifact: ContinuationArtifact {
      word_count_observed: count_words(&content),
      content,
      original_story: request.original_story,
      timestamp: outcome.created,
    },
    model: outcome.model,
    processing_time_seconds,
  })
}
