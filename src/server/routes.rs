//! HTTP route handlers.
//!
//! All endpoints live under `/api/` and accept/return JSON. Failures are
//! `{ "error": message }` with 400 for bad input and 500 for internal faults.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::domain::{FitRequest, FitResult};
use crate::error::FitError;
use crate::fit::{fit_batch, fit_curve};
use crate::formula::{
    FormulaError, FormulaRequest, FormulaResult, NSigmaRequest, NSigmaResult, compare, evaluate_formula,
};
use crate::integrate::{
    Integral1dRequest, Integral1dResult, IntegralMultiRequest, IntegralMultiResult, IntegrateError,
    QuadratureMethod, integrate_1d, integrate_multi,
};
use crate::server::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/fitting/fit", post(fit_handler))
        .route("/api/fitting/batch", post(batch_handler))
        .route("/api/formula/evaluate", post(formula_handler))
        .route("/api/nsigma/calculate", post(nsigma_handler))
        .route("/api/integrate/1d", post(integrate_1d_handler))
        .route("/api/integrate/multi", post(integrate_multi_handler))
        .route("/api/integrate/methods", get(integrate_methods_handler))
        .route("/api/health", get(health_handler))
        .fallback(not_found)
}

// ---------------------------------------------------------------------------
// POST /api/fitting/fit
// ---------------------------------------------------------------------------

/// Successful fit body: every `FitResult` field plus `error: null`.
#[derive(Debug, Serialize)]
struct FitResponse {
    #[serde(flatten)]
    result: FitResult,
    error: Option<String>,
}

impl From<FitResult> for FitResponse {
    fn from(result: FitResult) -> Self {
        Self { result, error: None }
    }
}

async fn fit_handler(
    State(state): State<SharedState>,
    payload: Result<Json<FitRequest>, JsonRejection>,
) -> Result<Json<FitResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(req) = payload?;

    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);

    let options = state.fit_options;
    let result = tokio::task::spawn_blocking(move || fit_curve(&req, &options))
        .await
        .map_err(|e| ApiError::internal(format!("task panicked: {e}")))??;

    Ok(Json(result.into()))
}

// ---------------------------------------------------------------------------
// POST /api/fitting/batch
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BatchEntry {
    Fit(FitResponse),
    Failed { error: String },
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    results: Vec<BatchEntry>,
    error: Option<String>,
}

async fn batch_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Vec<FitRequest>>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(requests) = payload?;

    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);

    let options = state.fit_options;
    let outcomes = tokio::task::spawn_blocking(move || fit_batch(&requests, &options))
        .await
        .map_err(|e| ApiError::internal(format!("task panicked: {e}")))?;

    let results = outcomes
        .into_iter()
        .map(|outcome| match outcome {
            Ok(result) => BatchEntry::Fit(result.into()),
            Err(err) => BatchEntry::Failed {
                error: err.to_string(),
            },
        })
        .collect();
    Ok(Json(BatchResponse { results, error: None }))
}

// ---------------------------------------------------------------------------
// POST /api/formula/evaluate, POST /api/nsigma/calculate
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct FormulaResponse {
    #[serde(flatten)]
    result: FormulaResult,
    error: Option<String>,
}

async fn formula_handler(
    State(state): State<SharedState>,
    payload: Result<Json<FormulaRequest>, JsonRejection>,
) -> Result<Json<FormulaResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(req) = payload?;
    let result = evaluate_formula(&req)?;
    Ok(Json(FormulaResponse { result, error: None }))
}

#[derive(Debug, Serialize)]
struct NSigmaResponse {
    #[serde(flatten)]
    result: NSigmaResult,
    error: Option<String>,
}

async fn nsigma_handler(
    State(state): State<SharedState>,
    payload: Result<Json<NSigmaRequest>, JsonRejection>,
) -> Result<Json<NSigmaResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(req) = payload?;
    let result = compare(&req)?;
    Ok(Json(NSigmaResponse { result, error: None }))
}

// ---------------------------------------------------------------------------
// POST /api/integrate/1d, POST /api/integrate/multi, GET /api/integrate/methods
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Integral1dResponse {
    #[serde(flatten)]
    result: Integral1dResult,
    error: Option<String>,
}

async fn integrate_1d_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Integral1dRequest>, JsonRejection>,
) -> Result<Json<Integral1dResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(req) = payload?;

    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);

    let result = tokio::task::spawn_blocking(move || integrate_1d(&req))
        .await
        .map_err(|e| ApiError::internal(format!("task panicked: {e}")))??;
    Ok(Json(Integral1dResponse { result, error: None }))
}

#[derive(Debug, Serialize)]
struct IntegralMultiResponse {
    #[serde(flatten)]
    result: IntegralMultiResult,
    error: Option<String>,
}

async fn integrate_multi_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IntegralMultiRequest>, JsonRejection>,
) -> Result<Json<IntegralMultiResponse>, ApiError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);
    let Json(req) = payload?;

    state.inflight.fetch_add(1, Ordering::Relaxed);
    let _dec = DecrementOnDrop(&state.inflight);

    let result = tokio::task::spawn_blocking(move || integrate_multi(&req))
        .await
        .map_err(|e| ApiError::internal(format!("task panicked: {e}")))??;
    Ok(Json(IntegralMultiResponse { result, error: None }))
}

#[derive(Debug, Serialize)]
struct MethodInfo {
    name: &'static str,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct MethodsResponse {
    #[serde(rename = "1d_methods")]
    one_d: Vec<MethodInfo>,
    multi_methods: Vec<MethodInfo>,
}

async fn integrate_methods_handler() -> Json<MethodsResponse> {
    Json(MethodsResponse {
        one_d: QuadratureMethod::ALL
            .into_iter()
            .map(|m| MethodInfo {
                name: m.id(),
                description: m.description(),
            })
            .collect(),
        multi_methods: vec![MethodInfo {
            name: "monte_carlo",
            description: "Monte Carlo integration (2 to 6 dimensions)",
        }],
    })
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_s: f64,
    inflight: u64,
    total_requests: u64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_s: state.started_at.elapsed().as_secs_f64(),
        inflight: state.inflight.load(Ordering::Relaxed),
        total_requests: state.total_requests.load(Ordering::Relaxed),
    })
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Structured JSON error response.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<FitError> for ApiError {
    fn from(err: FitError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<FormulaError> for ApiError {
    fn from(err: FormulaError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<IntegrateError> for ApiError {
    fn from(err: IntegrateError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// RAII guard to decrement an atomic counter on drop.
struct DecrementOnDrop<'a>(&'a AtomicU64);

impl Drop for DecrementOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
