//! Router assembly: endpoints, rate limiting, CORS, CSP, and HTTP tracing.

use std::sync::Arc;

use axum::http::header::{HeaderValue, CONTENT_SECURITY_POLICY};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;
use crate::rate_limit;
use crate::state::AppState;

pub mod http;

/// Build the application router:
/// - three API routes behind the 10/min per-IP limiter
/// - `/health` behind only the global 100/15min limiter
/// - CORS (allow any origin/method/headers), CSP, per-request trace spans
pub fn build_router(state: Arc<AppState>) -> Router {
    let csp = csp_header(&state.config);

    Router::new()
        .route("/generate-story", post(http::generate_story))
        .route("/continue-story", post(http::continue_story))
        .route("/user-stories/:user_id", get(http::user_stories))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::api_rate_limit,
        ))
        .route("/health", get(http::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::global_rate_limit,
        ))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(SetResponseHeaderLayer::overriding(CONTENT_SECURITY_POLICY, csp))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Strict CSP: self, plus the configured auth/LLM origins (and the asset
/// origin, when set) for client-side connections.
fn csp_header(cfg: &Config) -> HeaderValue {
    let mut connect = format!("'self' {} {}", cfg.auth_service_url, cfg.llm_base_url);
    if let Some(asset) = &cfg.asset_origin {
        connect.push(' ');
        connect.push_str(asset);
    }
    let policy = format!("default-src 'self'; connect-src {connect}");
    HeaderValue::from_str(&policy)
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn csp_lists_the_configured_origins() {
        let cfg = Config {
            port: 3000,
            auth_service_url: "https://auth.example.com".into(),
            auth_service_key: "k".into(),
            llm_api_key: "k".into(),
            llm_base_url: "https://api.openai.com/v1".into(),
            llm_model: "gpt-4o-mini".into(),
            llm_timeout: Duration::from_secs(90),
            asset_origin: Some("https://cdn.example.com".into()),
        };
        let v = csp_header(&cfg);
        let s = v.to_str().unwrap();
        assert!(s.starts_with("default-src 'self'"));
        assert!(s.contains("https://auth.example.com"));
        assert!(s.contains("https://api.openai.com/v1"));
        assert!(s.contains("https://cdn.example.com"));
    }
}
