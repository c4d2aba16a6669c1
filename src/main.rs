//! Fabula · Educational Story Backend
//!
//! - Axum HTTP API: generate, continue, list-by-user, health
//! - LLM-driven story generation with strict artifact validation
//! - Best-effort persistence to a user-scoped story store
//!
//! Required env variables (startup is fatal without them):
//!   AUTH_SERVICE_URL : auth + story-store backend base URL
//!   AUTH_SERVICE_KEY : service key for that backend
//!   LLM_API_KEY      : key for the LLM provider
//!   PORT             : listen port
//!
//! Optional: LLM_BASE_URL, LLM_MODEL, LLM_TIMEOUT_SECS, ASSET_ORIGIN,
//!           PROMPT_CONFIG_PATH, LOG_LEVEL, LOG_FORMAT.

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod prompt;
mod openai;
mod validator;
mod identity;
mod store;
mod orchestrator;
mod protocol;
mod rate_limit;
mod state;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Missing or malformed configuration is fatal.
  let config = match Config::from_env() {
    Ok(c) => c,
    Err(e) => {
      error!(target: "fabula_backend", error = %e, "refusing to start");
      return Err(e.into());
    }
  };

  // Build shared application state (prompts, clients, limiters).
  let state = Arc::new(AppState::new(config)?);

  // Build the HTTP router with rate limiting, CORS, CSP and tracing layers.
  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "fabula_backend", %addr, "HTTP server listening");
  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await?;
  Ok(())
}
