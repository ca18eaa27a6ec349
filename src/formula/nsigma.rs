//! Significance of the difference between two measurements.

use serde::{Deserialize, Serialize};

use crate::formula::FormulaError;
use crate::formula::format::round_to;

/// Fields are optional on the wire so that a missing one is a domain error,
/// not a decode failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NSigmaRequest {
    pub value1: Option<f64>,
    pub uncertainty1: Option<f64>,
    pub value2: Option<f64>,
    pub uncertainty2: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NSigmaResult {
    /// Rounded to three decimals.
    pub n_sigma: f64,
    pub interpretation: &'static str,
}

/// `|v1 - v2| / sqrt(u1² + u2²)`.
pub fn n_sigma(v1: f64, u1: f64, v2: f64, u2: f64) -> Result<f64, FormulaError> {
    if !(u1 > 0.0 && u2 > 0.0) {
        return Err(FormulaError::NonPositiveUncertainty);
    }
    let combined = u1.hypot(u2);
    if combined == 0.0 {
        return Err(FormulaError::ZeroCombinedUncertainty);
    }
    Ok((v1 - v2).abs() / combined)
}

pub fn interpret(n: f64) -> &'static str {
    if n < 1.0 {
        "Consistent (< 1σ)"
    } else if n < 2.0 {
        "Marginally significant (1-2σ)"
    } else if n < 3.0 {
        "Significant (2-3σ)"
    } else {
        "Highly significant (≥ 3σ)"
    }
}

pub fn compare(request: &NSigmaRequest) -> Result<NSigmaResult, FormulaError> {
    let (Some(v1), Some(u1), Some(v2), Some(u2)) = (
        request.value1,
        request.uncertainty1,
        request.value2,
        request.uncertainty2,
    ) else {
        return Err(FormulaError::MissingMeasurement);
    };
    let n = n_sigma(v1, u1, v2, u2)?;
    Ok(NSigmaResult {
        n_sigma: round_to(n, 3),
        interpretation: interpret(n),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(v1: f64, u1: f64, v2: f64, u2: f64) -> NSigmaRequest {
        NSigmaRequest {
            value1: Some(v1),
            uncertainty1: Some(u1),
            value2: Some(v2),
            uncertainty2: Some(u2),
        }
    }

    #[test]
    fn compares_two_measurements() {
        let r = compare(&req(10.5, 0.3, 11.2, 0.4)).unwrap();
        assert_eq!(r.n_sigma, 1.4);
        assert_eq!(r.interpretation, "Marginally significant (1-2σ)");
    }

    #[test]
    fn interpretation_thresholds() {
        assert_eq!(interpret(0.99), "Consistent (< 1σ)");
        assert_eq!(interpret(2.0), "Significant (2-3σ)");
        assert_eq!(interpret(3.0), "Highly significant (≥ 3σ)");
    }

    #[test]
    fn rejects_missing_and_non_positive_inputs() {
        assert_eq!(
            compare(&NSigmaRequest::default()).unwrap_err(),
            FormulaError::MissingMeasurement
        );
        assert_eq!(
            compare(&req(1.0, 0.0, 2.0, 0.1)).unwrap_err(),
            FormulaError::NonPositiveUncertainty
        );
    }
}
