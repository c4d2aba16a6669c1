//! Process configuration (environment) and prompt templates (optional TOML).
//!
//! Required env variables — startup is fatal if any is missing:
//!   AUTH_SERVICE_URL : base URL of the auth + story-store backend
//!   AUTH_SERVICE_KEY : service key for that backend
//!   LLM_API_KEY      : key for the LLM provider
//!   PORT             : listen port (u16)
//!
//! Optional:
//!   LLM_BASE_URL       : default "https://api.openai.com/v1"
//!   LLM_MODEL          : default "gpt-4o-mini"
//!   LLM_TIMEOUT_SECS   : default 90
//!   ASSET_ORIGIN       : extra origin allowed by the CSP header
//!   PROMPT_CONFIG_PATH : TOML file overriding prompt templates

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("missing required configuration: {0}")]
  Missing(String),
  #[error("invalid configuration value for {name}: {value}")]
  Invalid { name: &'static str, value: String },
}

/// Immutable process configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct Config {
  pub port: u16,
  pub auth_service_url: String,
  pub auth_service_key: String,
  pub llm_api_key: String,
  pub llm_base_url: String,
  pub llm_model: String,
  pub llm_timeout: Duration,
  pub asset_origin: Option<String>,
}

impl Config {
  /// Read configuration from the environment. All four required variables are
  /// checked before returning so the startup error lists every missing one.
  pub fn from_env() -> Result<Self, ConfigError> {
    let mut missing = Vec::new();
    let required = |missing: &mut Vec<&str>, name: &'static str| -> String {
      match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
          missing.push(name);
          String::new()
        }
      }
    };

    let auth_service_url = required(&mut missing, "AUTH_SERVICE_URL");
    let auth_service_key = required(&mut missing, "AUTH_SERVICE_KEY");
    let llm_api_key = required(&mut missing, "LLM_API_KEY");
    let port_raw = required(&mut missing, "PORT");

    if !missing.is_empty() {
      return Err(ConfigError::Missing(missing.join(", ")));
    }

    let port = port_raw
      .parse::<u16>()
      .map_err(|_| ConfigError::Invalid { name: "PORT", value: port_raw.clone() })?;

    let llm_base_url =
      std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let llm_model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let llm_timeout_secs = match std::env::var("LLM_TIMEOUT_SECS") {
      Ok(v) => v
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid { name: "LLM_TIMEOUT_SECS", value: v })?,
      Err(_) => 90,
    };
    let asset_origin = std::env::var("ASSET_ORIGIN").ok().filter(|s| !s.trim().is_empty());

    let cfg = Self {
      port,
      auth_service_url: auth_service_url.trim_end_matches('/').to_string(),
      auth_service_key,
      llm_api_key,
      llm_base_url: llm_base_url.trim_end_matches('/').to_string(),
      llm_model,
      llm_timeout: Duration::from_secs(llm_timeout_secs),
      asset_origin,
    };

    // Assert presence at startup without ever logging secret values.
    info!(
      target: "fabula_backend",
      port = cfg.port,
      auth_service_url = %cfg.auth_service_url,
      llm_base_url = %cfg.llm_base_url,
      llm_model = %cfg.llm_model,
      llm_timeout_secs = cfg.llm_timeout.as_secs(),
      auth_key_present = !cfg.auth_service_key.is_empty(),
      llm_key_present = !cfg.llm_api_key.is_empty(),
      "Configuration loaded"
    );

    Ok(cfg)
  }
}

/// Wrapper schema for the optional prompt TOML file.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates used by the generation pipeline. Defaults are the
/// production prompts; override any subset in TOML if you need to tune tone
/// or structure — unset fields keep their defaults. The generation user
/// template declares the output JSON schema in-band — keep the field names
/// intact when editing.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  #[serde(default = "default_generation_system")]
  pub generation_system: String,
  #[serde(default = "default_generation_user_template")]
  pub generation_user_template: String,
  #[serde(default = "default_continuation_system")]
  pub continuation_system: String,
  #[serde(default = "default_continuation_user_template")]
  pub continuation_user_template: String,
}

fn default_generation_system() -> String {
  Prompts::default().generation_system
}
fn default_generation_user_template() -> String {
  Prompts::default().generation_user_template
}
fn default_continuation_system() -> String {
  Prompts::default().continuation_system
}
fn default_continuation_user_template() -> String {
  Prompts::default().continuation_user_template
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are an educational storyteller. You write engaging, age-appropriate stories that teach. Respond ONLY with a single JSON object. No prose before or after it, no markdown code fences, no acknowledgements of these instructions.".into(),
      generation_user_template: r#"Write an educational story about {subject} for {academic_grade} level students, in {language}, approximately {word_count} words.
Setting: {setting}
Main character: {main_character}
Subject details: {subject_specification}
{vocabulary_emphasis}{summary_emphasis}
The story must start with a clear, short title on its own line, then the story text with proper paragraph breaks.

Return ONLY a JSON object with exactly these fields:
{
  "content": "<title then story text>",
  "learning_objectives": ["<what the reader should learn>", ...],
  "vocabulary": [{"word": "...", "definition": "...", "example": "...", "part_of_speech": "..."}, ...],
  "quiz": [{"question": "...", "options": ["...", "...", "...", "..."], "correctAnswer": 0}, ...],
  "summary": "<2-3 sentence summary>"
}

The quiz must contain exactly 3 questions, each with exactly 4 options and "correctAnswer" as an integer between 0 and 3. Every field must be written in {language}."#.into(),
      continuation_system: "You are an educational storyteller continuing an existing story. Match its tone, characters and world. Respond ONLY with the continuation text: no preamble, no commentary, no repetition of the original story.".into(),
      continuation_user_template: r#"Continue the following story in {language} with approximately {word_count} more words{grade_clause}.{direction}

Original story:
{original_story}

Write ONLY the continuation text."#.into(),
    }
  }
}

/// Attempt to load prompt overrides from PROMPT_CONFIG_PATH.
/// On any parsing/IO error, falls back to the defaults.
pub fn load_prompts_from_env() -> Prompts {
  let Some(path) = std::env::var("PROMPT_CONFIG_PATH").ok() else {
    return Prompts::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<PromptConfig>(&s) {
      Ok(cfg) => {
        info!(target: "fabula_backend", %path, "Loaded prompt config (TOML)");
        cfg.prompts
      }
      Err(e) => {
        error!(target: "fabula_backend", %path, error = %e, "Failed to parse prompt TOML; using defaults");
        Prompts::default()
      }
    },
    Err(e) => {
      error!(target: "fabula_backend", %path, error = %e, "Failed to read prompt TOML; using defaults");
      Prompts::default()
    }
  }
}
