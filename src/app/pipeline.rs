//! Shared "fit pipeline" logic for the `fit` command.
//!
//! Input resolution (JSON document or CSV + flags) -> fit service -> outcomes.
//! Presentation stays in `app`.

use tracing::{info, warn};

use crate::cli::FitArgs;
use crate::domain::{FitOptions, FitRequest, FitResult};
use crate::error::{AppError, EXIT_INPUT, FitError};
use crate::fit::{fit_batch, fit_curve};
use crate::io::{load_csv, load_requests};

/// Requests to fit, and whether they came in as a batch.
#[derive(Debug, Clone)]
pub struct FitInput {
    pub requests: Vec<FitRequest>,
    pub batch: bool,
}

/// One request and its outcome.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub request: FitRequest,
    pub outcome: Result<FitResult, FitError>,
}

/// Resolve the command-line source into fit requests.
pub fn load_input(args: &FitArgs) -> Result<FitInput, AppError> {
    if let Some(path) = &args.input {
        let (requests, batch) = load_requests(path)?;
        info!(path = %path.display(), requests = requests.len(), batch, "loaded fit requests");
        return Ok(FitInput { requests, batch });
    }

    let path = args
        .csv
        .as_ref()
        .ok_or_else(|| AppError::new(EXIT_INPUT, "Either a JSON request or --csv is required."))?;
    let data = load_csv(path)?;
    for e in &data.row_errors {
        warn!(line = e.line, message = %e.message, "skipped CSV row");
    }
    info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.x.len(),
        weighted = data.y_err.is_some(),
        "loaded CSV"
    );

    let request = FitRequest {
        x_data: data.x,
        y_data: data.y,
        y_errors: data.y_err,
        model: args.model.clone().unwrap_or_else(|| {
            if args.expr.is_some() { "custom" } else { "linear" }.to_string()
        }),
        custom_expr: args.expr.clone(),
        initial_guess: args.guess.clone(),
    };
    Ok(FitInput {
        requests: vec![request],
        batch: false,
    })
}

/// Fit every request; batches run in parallel.
pub fn run_fits(input: FitInput, options: &FitOptions) -> Vec<RunOutput> {
    let outcomes = if input.batch {
        fit_batch(&input.requests, options)
    } else {
        input.requests.iter().map(|r| fit_curve(r, options)).collect()
    };
    input
        .requests
        .into_iter()
        .zip(outcomes)
        .map(|(request, outcome)| RunOutput { request, outcome })
        .collect()
}
