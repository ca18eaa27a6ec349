//! Export fit results.
//!
//! - JSON: a small envelope with tool metadata, the request and the result
//! - CSV: per-point residuals, easy to consume in spreadsheets

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::{Value, json};

use crate::domain::{FitRequest, FitResult};
use crate::error::{AppError, EXIT_INPUT, FitError};

/// JSON for a fit outcome: the result, or `{"error": ...}`.
pub fn outcome_json(outcome: &Result<FitResult, FitError>) -> Value {
    match outcome {
        Ok(result) => serde_json::to_value(result).unwrap_or(Value::Null),
        Err(err) => json!({ "error": err.to_string() }),
    }
}

pub fn write_result_json(path: &Path, request: &FitRequest, result: &FitResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    write_result_json_to(file, request, result)
}

pub fn write_result_json_to<W: Write>(writer: W, request: &FitRequest, result: &FitResult) -> Result<(), AppError> {
    let envelope = json!({
        "tool": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "generated_at": Utc::now().to_rfc3339(),
        "request": request,
        "result": result,
    });
    serde_json::to_writer_pretty(writer, &envelope)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write result JSON: {e}")))
}

pub fn write_residuals_csv(path: &Path, request: &FitRequest, result: &FitResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals_csv_to(file, request, result)
}

/// Columns: `x,y_obs,y_fit,residual[,y_err]`.
pub fn write_residuals_csv_to<W: Write>(writer: W, request: &FitRequest, result: &FitResult) -> Result<(), AppError> {
    let csv_err = |e: csv::Error| AppError::new(EXIT_INPUT, format!("Failed to write export CSV: {e}"));
    let errors = request.y_errors.as_deref().filter(|e| !e.is_empty());

    let mut w = csv::Writer::from_writer(writer);
    let mut header = vec!["x", "y_obs", "y_fit", "residual"];
    if errors.is_some() {
        header.push("y_err");
    }
    w.write_record(&header).map_err(csv_err)?;

    for (i, ((&x, &y), &r)) in request
        .x_data
        .iter()
        .zip(&request.y_data)
        .zip(&result.residuals)
        .enumerate()
    {
        let mut row = vec![x.to_string(), y.to_string(), (y - r).to_string(), r.to_string()];
        if let Some(errs) = errors {
            row.push(errs.get(i).map(|e| e.to_string()).unwrap_or_default());
        }
        w.write_record(&row).map_err(csv_err)?;
    }

    w.flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write export CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitOptions;
    use crate::fit::fit_curve;
    use crate::models::BuiltinModel;

    fn line_request() -> FitRequest {
        FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0, 2.0], vec![1.0, 3.0, 5.0])
            .with_errors(vec![0.5, 0.5, 0.5])
    }

    #[test]
    fn residuals_csv_has_error_column_when_weighted() {
        let req = line_request();
        let fit = fit_curve(&req, &FitOptions::default()).unwrap();
        let mut buf = Vec::new();
        write_residuals_csv_to(&mut buf, &req, &fit).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("x,y_obs,y_fit,residual,y_err"));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn result_json_wraps_request_and_result() {
        let req = line_request();
        let fit = fit_curve(&req, &FitOptions::default()).unwrap();
        let mut buf = Vec::new();
        write_result_json_to(&mut buf, &req, &fit).unwrap();
        let v: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["tool"], "labfit");
        assert_eq!(v["request"]["model"], "linear");
        assert_eq!(v["result"]["n_params"], 2);
        assert!(v["generated_at"].is_string());
    }

    #[test]
    fn failed_outcomes_render_as_error_objects() {
        let outcome: Result<FitResult, FitError> = Err(FitError::validation("At least 2 data points are required"));
        assert_eq!(outcome_json(&outcome), json!({"error": "At least 2 data points are required"}));
    }
}
