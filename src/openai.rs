//! Minimal chat-completions client for the LLM provider.
//!
//! A single `chat` call: send system + user messages with decoding parameters,
//! get the raw completion text back. Non-2xx responses surface as typed
//! upstream errors carrying the provider-reported message. No retries here;
//! the orchestrator decides what a failure means.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::ApiError;
use crate::prompt::BuiltPrompt;

#[derive(Clone)]
pub struct ModelClient {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  pub model: String,
}

/// What one completion produced, beyond the text itself.
#[derive(Clone, Debug)]
pub struct ChatOutcome {
  pub text: String,
  /// Model identifier the provider reports (may differ from the requested one).
  pub model: String,
  /// Provider-reported creation time, epoch seconds.
  pub created: i64,
}

impl ModelClient {
  pub fn new(cfg: &Config) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(cfg.llm_timeout)
      .build()
      .map_err(|e| ApiError::Internal(format!("failed to build LLM http client: {e}")))?;

    Ok(Self {
      client,
      api_key: cfg.llm_api_key.clone(),
      base_url: cfg.llm_base_url.clone(),
      model: cfg.llm_model.clone(),
    })
  }

  /// One chat completion. Returns the raw text; parsing is the caller's job.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, max_tokens = prompt.max_tokens))]
  pub async fn chat(&self, prompt: &BuiltPrompt) -> Result<ChatOutcome, ApiError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompt.system.clone() },
        ChatMessageReq { role: "user".into(), content: prompt.user.clone() },
      ],
      temperature: prompt.temperature,
      max_tokens: Some(prompt.max_tokens),
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "fabula-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_provider_error(&body).unwrap_or(body);
      return Err(ApiError::upstream(
        Some(status.as_u16()),
        format!("LLM HTTP {}: {}", status, msg),
      ));
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| ApiError::upstream(None, format!("undecodable LLM response: {e}")))?;

    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        elapsed = ?start.elapsed(),
        "LLM usage"
      );
    }

    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();
    if text.is_empty() {
      return Err(ApiError::upstream(None, "LLM returned an empty completion"));
    }

    Ok(ChatOutcome {
      text,
      model: body.model.unwrap_or_else(|| self.model.clone()),
      created: body.created.unwrap_or_else(|| chrono::Utc::now().timestamp()),
    })
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] model: Option<String>,
  #[serde(default)] created: Option<i64>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from a provider error body.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_error_body_is_unwrapped() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"rate_limit"}}"#;
    assert_eq!(extract_provider_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_provider_error("plain text"), None);
  }

  #[test]
  fn completion_response_tolerates_missing_metadata() {
    let body: ChatCompletionResponse = serde_json::from_str(
      r#"{"choices":[{"message":{"content":"hi"}}]}"#,
    )
    .unwrap();
    assert_eq!(body.choices[0].message.content.as_deref(), Some("hi"));
    assert!(body.model.is_none());
    assert!(body.created.is_none());
  }
}
