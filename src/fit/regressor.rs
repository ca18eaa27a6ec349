//! Weighted nonlinear least squares.
//!
//! We minimize `Σ ((f(x_i; p) - y_i) / σ_i)²` with Levenberg–Marquardt and
//! estimate the parameter covariance from the Jacobian at the solution.
//!
//! Weighting modes:
//! - absolute sigma (uncertainties supplied): covariance is `(JᵀJ)⁻¹` as is
//! - relative sigma (no uncertainties, `σ_i = 1`): covariance is scaled by the
//!   residual variance `SS_res / dof`; with `dof ≤ 0` it is all `+inf`
//!
//! Custom expressions are differentiated exactly with dual numbers; built-in
//! models (and any point where an exact derivative is not finite) fall back
//! to a forward difference.

use std::cell::RefCell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{DMatrix, DVector, Dyn, storage::Owned};

use crate::error::FitError;
use crate::math::covariance_from_jacobian;
use crate::models::CompiledModel;

/// Relative tolerances on the sum of squares and on the parameter step.
const TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Raw optimizer output, before quality metrics.
#[derive(Debug, Clone)]
pub struct Regression {
    pub parameters: Vec<f64>,
    /// `k × k`, symmetric.
    pub covariance: DMatrix<f64>,
    pub evaluations: usize,
}

struct CurveProblem<'a> {
    model: &'a CompiledModel,
    x: &'a [f64],
    y: &'a [f64],
    sigma: Option<&'a [f64]>,
    params: DVector<f64>,
    /// First evaluation failure, reported instead of the optimizer's reason.
    failure: RefCell<Option<String>>,
}

impl CurveProblem<'_> {
    fn weighted(&self, params: &[f64]) -> Result<Vec<f64>, String> {
        let f = self.model.eval_many(self.x, params);
        let mut out = Vec::with_capacity(f.len());
        for (i, (fi, yi)) in f.iter().zip(self.y).enumerate() {
            let sigma = self.sigma.map_or(1.0, |s| s[i]);
            let r = (fi - yi) / sigma;
            if !r.is_finite() {
                return Err(format!(
                    "model evaluation is not finite at x = {} with parameters {:?}",
                    self.x[i], params
                ));
            }
            out.push(r);
        }
        Ok(out)
    }

    /// `∂r_i/∂p_j = (∂f/∂p_j)(x_i) / σ_i`, when every entry is finite.
    fn exact_jacobian(&self) -> Option<DMatrix<f64>> {
        let columns = self.model.parameter_gradients(self.x, self.params.as_slice())?;
        let mut jac = DMatrix::zeros(self.x.len(), columns.len());
        for (j, column) in columns.iter().enumerate() {
            for (i, d) in column.iter().enumerate() {
                let v = d / self.sigma.map_or(1.0, |s| s[i]);
                if !v.is_finite() {
                    return None;
                }
                jac[(i, j)] = v;
            }
        }
        Some(jac)
    }

    fn record(&self, message: String) {
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(message);
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for CurveProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, p: &DVector<f64>) {
        self.params.copy_from(p);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        match self.weighted(self.params.as_slice()) {
            Ok(r) => Some(DVector::from_vec(r)),
            Err(message) => {
                self.record(message);
                None
            }
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        if let Some(jac) = self.exact_jacobian() {
            return Some(jac);
        }
        let base = match self.weighted(self.params.as_slice()) {
            Ok(r) => r,
            Err(message) => {
                self.record(message);
                return None;
            }
        };

        let h_base = f64::EPSILON.sqrt();
        let mut shifted: Vec<f64> = self.params.iter().copied().collect();
        let mut jac = DMatrix::zeros(base.len(), shifted.len());
        for j in 0..shifted.len() {
            let pj = shifted[j];
            let h = if pj == 0.0 { h_base } else { h_base * pj.abs() };
            shifted[j] = pj + h;
            let moved = self.weighted(&shifted);
            shifted[j] = pj;
            match moved {
                Ok(r) => {
                    for (i, (ri, r0)) in r.iter().zip(&base).enumerate() {
                        jac[(i, j)] = (ri - r0) / h;
                    }
                }
                Err(message) => {
                    self.record(message);
                    return None;
                }
            }
        }
        Some(jac)
    }
}

fn describe(reason: &TerminationReason, max_evaluations: usize) -> String {
    match reason {
        TerminationReason::LostPatience => {
            format!("optimal parameters not found: number of evaluations exceeded {max_evaluations}")
        }
        other => format!("optimizer stopped: {other:?}"),
    }
}

/// Fit `model` to `(x, y)` starting from `p0`.
///
/// `sigma`, when given, holds strictly positive absolute uncertainties of `y`.
/// Lengths are validated by the caller.
pub fn regress(
    model: &CompiledModel,
    x: &[f64],
    y: &[f64],
    sigma: Option<&[f64]>,
    p0: &[f64],
    max_evaluations: usize,
) -> Result<Regression, FitError> {
    let m = x.len();
    let k = p0.len();
    if m < k {
        return Err(FitError::convergence(format!(
            "improper input: {m} data points for {k} parameters"
        )));
    }

    let problem = CurveProblem {
        model,
        x,
        y,
        sigma,
        params: DVector::from_column_slice(p0),
        failure: RefCell::new(None),
    };

    // The optimizer budgets `patience · (k + 1)` residual evaluations.
    let patience = (max_evaluations / (k + 1)).max(1);
    let (problem, report) = LevenbergMarquardt::new()
        .with_patience(patience)
        .with_ftol(TOLERANCE)
        .with_xtol(TOLERANCE)
        .minimize(problem);

    if let Some(message) = problem.failure.borrow_mut().take() {
        return Err(FitError::convergence(message));
    }
    if !report.termination.was_successful() {
        return Err(FitError::convergence(describe(&report.termination, max_evaluations)));
    }

    let parameters: Vec<f64> = problem.params.iter().copied().collect();
    if !parameters.iter().all(|p| p.is_finite()) {
        return Err(FitError::convergence("optimizer produced non-finite parameters"));
    }

    let residuals = problem
        .weighted(&parameters)
        .map_err(FitError::convergence)?;
    let jacobian = problem.jacobian().ok_or_else(|| {
        FitError::convergence("Jacobian could not be evaluated at the solution")
    })?;
    let mut covariance = covariance_from_jacobian(&jacobian).ok_or_else(|| {
        FitError::convergence("singular Jacobian at the solution; covariance cannot be estimated")
    })?;

    if sigma.is_none() {
        let dof = m as i64 - k as i64;
        if dof > 0 {
            let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
            covariance *= ss_res / dof as f64;
        } else {
            covariance.fill(f64::INFINITY);
        }
    }

    Ok(Regression {
        parameters,
        covariance,
        evaluations: report.number_of_evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuiltinModel;

    fn line() -> CompiledModel {
        CompiledModel::builtin(BuiltinModel::Linear)
    }

    #[test]
    fn recovers_an_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = regress(&line(), &x, &y, None, &[1.0, 1.0], 2000).unwrap();
        assert!((fit.parameters[0] - 2.0).abs() < 1e-6);
        assert!((fit.parameters[1] - 1.0).abs() < 1e-6);
        assert!(fit.evaluations > 0);
    }

    #[test]
    fn absolute_sigma_covariance_is_not_rescaled() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.1, 2.1, 3.8, 6.2, 7.9];
        let sigma = [0.5; 5];
        let fit = regress(&line(), &x, &y, Some(&sigma), &[1.0, 1.0], 2000).unwrap();

        // (JᵀJ)⁻¹ with J = design / σ: var(a) = σ² / Σ(x - x̄)².
        let expected_var_a = 0.25 / 10.0;
        assert!((fit.covariance[(0, 0)] - expected_var_a).abs() < 1e-6);
    }

    #[test]
    fn relative_sigma_without_dof_is_infinite() {
        let fit = regress(&line(), &[0.0, 1.0], &[5.0, 5.0], None, &[1.0, 1.0], 2000).unwrap();
        assert!(fit.covariance.iter().all(|v| *v == f64::INFINITY));
        assert!(fit.parameters[0].abs() < 1e-6);
        assert!((fit.parameters[1] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_points_is_a_convergence_error() {
        let cubic = CompiledModel::builtin(BuiltinModel::Cubic);
        let err = regress(&cubic, &[0.0, 1.0], &[0.0, 1.0], None, &[1.0; 4], 2000).unwrap_err();
        assert!(matches!(err, FitError::FitConvergence(_)));
    }

    #[test]
    fn custom_models_use_exact_derivatives() {
        let model = CompiledModel::custom("A*exp(-k*x)").unwrap();
        let x: Vec<f64> = (0..12).map(|i| i as f64 / 3.0).collect();
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * (-1.2 * v).exp()).collect();
        let fit = regress(&model, &x, &y, None, &[2.0, 1.0], 2000).unwrap();
        assert!((fit.parameters[0] - 3.0).abs() < 1e-8);
        assert!((fit.parameters[1] - 1.2).abs() < 1e-8);

        let degenerate = CompiledModel::custom("a*b*x").unwrap();
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * v).collect();
        let err = regress(&degenerate, &x, &y, None, &[1.0, 2.0], 2000).unwrap_err();
        assert!(matches!(err, FitError::FitConvergence(_)));
    }

    #[test]
    fn non_finite_evaluation_is_reported() {
        let model = CompiledModel::custom("a*log(x) + b").unwrap();
        let err = regress(&model, &[-1.0, 1.0, 2.0], &[0.0, 1.0, 2.0], None, &[1.0, 1.0], 2000)
            .unwrap_err();
        match err {
            FitError::FitConvergence(message) => assert!(message.contains("not finite")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
