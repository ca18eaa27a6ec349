//! Goodness-of-fit metrics.
//!
//! Degenerate cases are signalled by sentinel values, never errors:
//! - `SS_tot == 0` gives `R² = 0`
//! - `dof ≤ 0` gives `+inf` reduced chi-squared and no p-value
//! - a negative covariance diagonal gives a `NaN` uncertainty

use nalgebra::DMatrix;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::models::CompiledModel;

#[derive(Debug, Clone, PartialEq)]
pub struct FitQuality {
    pub uncertainties: Vec<f64>,
    pub predicted: Vec<f64>,
    /// `y_i - ŷ_i`
    pub residuals: Vec<f64>,
    pub r_squared: f64,
    pub chi_squared: f64,
    pub reduced_chi_squared: f64,
    pub p_value: Option<f64>,
    pub dof: i64,
}

/// Compute quality metrics for fitted `params`.
pub fn evaluate_quality(
    model: &CompiledModel,
    x: &[f64],
    y: &[f64],
    sigma: Option<&[f64]>,
    params: &[f64],
    covariance: &DMatrix<f64>,
) -> FitQuality {
    // sqrt of a negative number is NaN, which is what we want to report.
    let uncertainties = covariance.diagonal().iter().map(|v| v.sqrt()).collect();

    let predicted = model.eval_many(x, params);
    let residuals: Vec<f64> = y.iter().zip(&predicted).map(|(yi, fi)| yi - fi).collect();

    let n = y.len();
    let mean = y.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let ss_tot: f64 = y.iter().map(|yi| (yi - mean).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    let dof = n as i64 - params.len() as i64;

    let chi_squared = match sigma {
        Some(s) => residuals.iter().zip(s).map(|(r, si)| (r / si).powi(2)).sum(),
        None => ss_res,
    };
    let reduced_chi_squared = if dof > 0 {
        chi_squared / dof as f64
    } else {
        f64::INFINITY
    };

    let p_value = match sigma {
        Some(_) if dof > 0 => chi_squared_sf(chi_squared, dof as f64),
        _ => None,
    };

    FitQuality {
        uncertainties,
        predicted,
        residuals,
        r_squared,
        chi_squared,
        reduced_chi_squared,
        p_value,
        dof,
    }
}

/// Upper-tail probability `P(X ≥ chi2)` for `X ~ χ²(dof)`.
fn chi_squared_sf(chi2: f64, dof: f64) -> Option<f64> {
    ChiSquared::new(dof).ok().map(|dist| dist.sf(chi2))
}
