//! Shared state for request handlers.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use crate::domain::FitOptions;

/// Counters only; fits themselves share nothing.
pub struct AppState {
    /// Server start time (for uptime reporting).
    pub started_at: Instant,
    pub fit_options: FitOptions,
    /// In-flight fit requests.
    pub inflight: AtomicU64,
    /// Total requests served (for /api/health).
    pub total_requests: AtomicU64,
}

impl AppState {
    pub fn new(fit_options: FitOptions) -> Self {
        Self {
            started_at: Instant::now(),
            fit_options,
            inflight: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
        }
    }
}

pub type SharedState = Arc<AppState>;
