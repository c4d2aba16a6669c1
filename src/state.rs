//! Shared application state: configuration, prompts, the three outbound
//! clients (model, auth, store) and the rate-limit counters.
//!
//! Everything here is built once at startup and shared concurrently behind an
//! `Arc`; all members are safe for concurrent use without extra locking.

use tracing::{info, instrument};

use crate::config::{load_prompts_from_env, Config, Prompts};
use crate::error::ApiError;
use crate::identity::AuthClient;
use crate::openai::ModelClient;
use crate::rate_limit::RateLimits;
use crate::store::StoryStore;

pub struct AppState {
    pub config: Config,
    pub prompts: Prompts,
    pub model: ModelClient,
    pub auth: AuthClient,
    pub store: StoryStore,
    pub limits: RateLimits,
}

impl AppState {
    /// Build state from validated configuration: prompt overrides, the
    /// outbound clients, and the limiter state.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let prompts = load_prompts_from_env();
        let model = ModelClient::new(&config)?;
        let auth = AuthClient::new(&config)?;
        let store = StoryStore::new(&config)
            .map_err(|e| ApiError::Internal(format!("failed to build store client: {e}")))?;

        info!(
            target: "fabula_backend",
            model = %model.model,
            "application state initialized"
        );

        Ok(Self {
            config,
            prompts,
            model,
            auth,
            store,
            limits: RateLimits::new(),
        })
    }
}
