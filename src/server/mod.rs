//! JSON REST API over the fit and formula services.
//!
//! # Endpoints
//!
//! - `POST /api/fitting/fit`     : FitRequest → FitResult
//! - `POST /api/fitting/batch`   : FitRequest[] → per-request results
//! - `POST /api/formula/evaluate`: expression + values → value ± uncertainty
//! - `POST /api/nsigma/calculate`: two measurements → n-sigma
//! - `POST /api/integrate/1d`    : function + [a, b] → integral, divergence flag
//! - `POST /api/integrate/multi` : function + box (+ condition) → Monte Carlo integral
//! - `GET  /api/integrate/methods`: available integration methods
//! - `GET  /api/health`          : status, version, uptime

pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::FitOptions;
use state::AppState;

pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in MiB.
    pub max_body_mb: usize,
    /// Allowed browser origins; `*` allows any.
    pub cors_origins: Vec<String>,
    pub fit_options: FitOptions,
}

/// Router with state, CORS, body limit and request tracing.
pub fn build_app(config: &ServerConfig) -> anyhow::Result<Router> {
    let state = Arc::new(AppState::new(config.fit_options));
    Ok(Router::new()
        .merge(routes::router())
        .layer(DefaultBodyLimit::max(mb_to_bytes(config.max_body_mb)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins)?)
        .with_state(state))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin: {o}")))
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024).saturating_mul(1024)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let app = build_app(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    tracing::info!(
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        max_evaluations = config.fit_options.max_evaluations,
        "labfit server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        assert!(cors_layer(&["*".to_string()]).is_ok());
        let defaults: Vec<String> = DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect();
        assert!(cors_layer(&defaults).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn body_limit_saturates() {
        assert_eq!(mb_to_bytes(2), 2 * 1024 * 1024);
        assert_eq!(mb_to_bytes(usize::MAX), usize::MAX);
    }
}
