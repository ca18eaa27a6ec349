//! One fit request, end to end.
//!
//! `Validate → Compile → Guess → Regress → Evaluate → Respond`. Each stage
//! either hands its output to the next or ends the request with a `FitError`;
//! no partial result ever leaves this module.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{FitOptions, FitRequest, FitResult, ModelSelector};
use crate::error::FitError;
use crate::fit::quality::evaluate_quality;
use crate::fit::regressor::regress;
use crate::math::{linspace, range};
use crate::models::{CompiledModel, initial_guess, resolve_start};

/// Fit a single request.
pub fn fit_curve(request: &FitRequest, options: &FitOptions) -> Result<FitResult, FitError> {
    fit_inner(request, options).inspect_err(|err| {
        warn!(kind = err.kind(), model = %request.model, error = %err, "fit failed");
    })
}

/// Fit every request independently, in parallel. Output order matches input.
pub fn fit_batch(requests: &[FitRequest], options: &FitOptions) -> Vec<Result<FitResult, FitError>> {
    requests
        .par_iter()
        .map(|request| fit_curve(request, options))
        .collect()
}

fn fit_inner(request: &FitRequest, options: &FitOptions) -> Result<FitResult, FitError> {
    let (selector, sigma) = validate(request)?;
    let x = request.x_data.as_slice();
    let y = request.y_data.as_slice();
    debug!(model = %request.model, n = x.len(), weighted = sigma.is_some(), "validated");

    let model = CompiledModel::compile(selector, request.custom_expr.as_deref())?;
    let k = model.param_count();
    if k == 0 {
        return Err(FitError::validation("Model must have at least one free parameter"));
    }
    debug!(model = model.display_name(), params = ?model.parameter_names(), "compiled");

    let user_guess = request.initial_guess.as_deref().filter(|g| !g.is_empty());
    if let (ModelSelector::Custom, Some(guess)) = (selector, user_guess) {
        if guess.len() != k {
            return Err(FitError::validation(format!(
                "initial_guess has {} values but the model has {} parameters ({})",
                guess.len(),
                k,
                model.parameter_names().join(", ")
            )));
        }
        if !guess.iter().all(|g| g.is_finite()) {
            return Err(FitError::validation("initial_guess must contain finite numbers"));
        }
    }
    let p0 = resolve_start(initial_guess(&model, x, y, user_guess), k);
    debug!(?p0, "initial guess");

    let regression = regress(&model, x, y, sigma, &p0, options.max_evaluations)?;
    debug!(evaluations = regression.evaluations, params = ?regression.parameters, "regressed");

    let quality = evaluate_quality(&model, x, y, sigma, &regression.parameters, &regression.covariance);

    let (x_min, x_max) = range(x);
    let x_fit = linspace(x_min, x_max, options.curve_points);
    let y_fit = model.eval_many(&x_fit, &regression.parameters);

    let covariance = regression
        .covariance
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect();

    Ok(FitResult {
        parameters: regression.parameters,
        uncertainties: quality.uncertainties,
        parameter_names: model.parameter_names().to_vec(),
        covariance,
        r_squared: quality.r_squared,
        chi_squared: quality.chi_squared,
        reduced_chi_squared: quality.reduced_chi_squared,
        p_value: quality.p_value,
        dof: quality.dof,
        n_data: x.len(),
        n_params: k,
        model_name: model.display_name().to_string(),
        x_fit,
        y_fit,
        residuals: quality.residuals,
    })
}

/// Request-level checks. Returns the parsed selector and the effective sigma.
fn validate(request: &FitRequest) -> Result<(ModelSelector, Option<&[f64]>), FitError> {
    let n = request.x_data.len();
    if n != request.y_data.len() {
        return Err(FitError::validation("x_data and y_data must have the same length"));
    }
    if n < 2 {
        return Err(FitError::validation("At least 2 data points are required"));
    }
    if !request.x_data.iter().chain(&request.y_data).all(|v| v.is_finite()) {
        return Err(FitError::validation("x_data and y_data must contain finite numbers"));
    }

    let selector = ModelSelector::parse(&request.model)
        .ok_or_else(|| FitError::validation(format!("Unknown model type: {}", request.model)))?;
    if selector == ModelSelector::Custom
        && request.custom_expr.as_deref().is_none_or(|e| e.trim().is_empty())
    {
        return Err(FitError::validation("custom_expr is required for custom model"));
    }

    let sigma = match request.y_errors.as_deref() {
        None | Some([]) => None,
        Some(errors) => {
            if errors.len() != n {
                return Err(FitError::validation(format!(
                    "y_errors must have the same length as y_data (got {} and {})",
                    errors.len(),
                    n
                )));
            }
            if !errors.iter().all(|e| e.is_finite() && *e > 0.0) {
                return Err(FitError::validation("All y_errors must be positive"));
            }
            Some(errors)
        }
    };

    Ok((selector, sigma))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::{BuiltinModel, predict};

    fn opts() -> FitOptions {
        FitOptions::default()
    }

    fn synthetic(model: BuiltinModel, truth: &[f64], x: &[f64]) -> FitRequest {
        let y = x.iter().map(|&xi| predict(model, xi, truth)).collect();
        FitRequest::builtin(model, x.to_vec(), y)
    }

    fn grid(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        linspace(lo, hi, n)
    }

    #[test]
    fn zero_noise_recovers_every_builtin() {
        let cases: [(BuiltinModel, Vec<f64>, Vec<f64>); 6] = [
            (BuiltinModel::Linear, vec![-1.5, 4.0], grid(0.0, 10.0, 15)),
            (BuiltinModel::Quadratic, vec![0.5, -2.0, 3.0], grid(-3.0, 3.0, 15)),
            (BuiltinModel::Cubic, vec![0.2, -0.5, 1.0, 2.0], grid(-2.0, 2.0, 20)),
            (BuiltinModel::Power, vec![2.5, 1.7], grid(1.0, 5.0, 15)),
            (BuiltinModel::Exponential, vec![1.5, 0.3], grid(0.0, 5.0, 15)),
            (BuiltinModel::Sinusoidal, vec![2.0, 0.65, 0.2, 1.0], grid(0.0, 10.0, 41)),
        ];
        for (model, truth, x) in cases {
            let result = fit_curve(&synthetic(model, &truth, &x), &opts())
                .unwrap_or_else(|e| panic!("{model:?}: {e}"));
            for (fitted, expected) in result.parameters.iter().zip(&truth) {
                assert!(
                    (fitted - expected).abs() < 1e-5,
                    "{model:?}: fitted {:?}, expected {truth:?}",
                    result.parameters
                );
            }
            assert!(result.r_squared > 1.0 - 1e-9, "{model:?}: R² = {}", result.r_squared);
        }
    }

    #[test]
    fn exact_line_fit() {
        let req = FitRequest::builtin(
            BuiltinModel::Linear,
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 3.0, 5.0, 7.0],
        );
        let r = fit_curve(&req, &opts()).unwrap();
        assert_relative_eq!(r.parameters[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(r.parameters[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(r.r_squared, 1.0, epsilon = 1e-12);
        assert!(r.chi_squared < 1e-12);
        assert_eq!(r.parameter_names, ["a", "b"]);
        assert_eq!(r.dof, 2);
        assert_eq!((r.n_data, r.n_params), (4, 2));
        assert_eq!(r.model_name, "y = a·x + b");
        assert_eq!(r.x_fit.len(), 200);
        assert_eq!(r.y_fit.len(), 200);
        assert_eq!(r.x_fit[0], 0.0);
        assert_eq!(r.x_fit[199], 3.0);
        assert_eq!(r.p_value, None);
    }

    #[test]
    fn custom_parameter_order_is_lexicographic() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![1.0, 3.0, 5.0, 7.0];
        let r = fit_curve(&FitRequest::custom("b + a*x", x, y), &opts()).unwrap();
        assert_eq!(r.parameter_names, ["a", "b"]);
        assert_relative_eq!(r.parameters[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(r.parameters[1], 1.0, epsilon = 1e-6);
        assert_eq!(r.model_name, "y = b + a*x");
    }

    #[test]
    fn uniform_sigma_changes_statistics_but_not_parameters() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![0.9, 3.2, 4.8, 7.1, 9.0, 11.2];
        let plain = FitRequest::builtin(BuiltinModel::Linear, x.clone(), y.clone());
        let weighted = plain.clone().with_errors(vec![0.3; 6]);

        let a = fit_curve(&plain, &opts()).unwrap();
        let b = fit_curve(&weighted, &opts()).unwrap();
        for (pa, pb) in a.parameters.iter().zip(&b.parameters) {
            assert_relative_eq!(*pa, *pb, epsilon = 1e-6);
        }
        assert!((a.reduced_chi_squared - b.reduced_chi_squared).abs() > 1e-3);
        assert!(a.p_value.is_none());
        let p = b.p_value.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn constant_data_has_zero_r_squared() {
        let req = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0], vec![5.0, 5.0]);
        let r = fit_curve(&req, &opts()).unwrap();
        assert_eq!(r.r_squared, 0.0);
        assert_eq!(r.dof, 0);
        assert_eq!(r.reduced_chi_squared, f64::INFINITY);
    }

    #[test]
    fn custom_without_expression_is_a_validation_error() {
        let mut req = FitRequest::custom("", vec![0.0, 1.0], vec![0.0, 1.0]);
        req.custom_expr = None;
        assert_eq!(
            fit_curve(&req, &opts()).unwrap_err(),
            FitError::validation("custom_expr is required for custom model")
        );
    }

    #[test]
    fn expression_without_x_is_rejected() {
        let req = FitRequest::custom("a*y+b", vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]);
        assert!(matches!(
            fit_curve(&req, &opts()).unwrap_err(),
            FitError::MissingIndependentVariable { .. }
        ));
    }

    #[test]
    fn repeated_fits_are_bit_identical() {
        let x = grid(0.0, 10.0, 25);
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * (0.7 * v + 0.1).sin() + 0.3 + 0.01 * v.cos()).collect();
        let req = FitRequest::builtin(BuiltinModel::Sinusoidal, x, y);
        let a = fit_curve(&req, &opts()).unwrap();
        let b = fit_curve(&req, &opts()).unwrap();
        let bits = |v: &[f64]| v.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a.parameters), bits(&b.parameters));
        assert_eq!(bits(&a.uncertainties), bits(&b.uncertainties));
        assert_eq!(bits(&a.residuals), bits(&b.residuals));
    }

    #[test]
    fn validation_rejects_malformed_requests() {
        let bad_len = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0], vec![0.0]);
        assert!(matches!(fit_curve(&bad_len, &opts()), Err(FitError::Validation(_))));

        let one_point = FitRequest::builtin(BuiltinModel::Linear, vec![0.0], vec![0.0]);
        assert_eq!(
            fit_curve(&one_point, &opts()).unwrap_err().to_string(),
            "At least 2 data points are required"
        );

        let mut unknown = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0], vec![0.0, 1.0]);
        unknown.model = "logistic".into();
        assert_eq!(fit_curve(&unknown, &opts()).unwrap_err().to_string(), "Unknown model type: logistic");

        let neg_sigma = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0], vec![0.0, 1.0])
            .with_errors(vec![0.1, 0.0]);
        assert!(matches!(fit_curve(&neg_sigma, &opts()), Err(FitError::Validation(_))));

        let short_sigma = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0], vec![0.0, 1.0])
            .with_errors(vec![0.1]);
        assert!(matches!(fit_curve(&short_sigma, &opts()), Err(FitError::Validation(_))));
    }

    #[test]
    fn empty_error_list_means_unweighted() {
        let req = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.1])
            .with_errors(vec![]);
        assert!(fit_curve(&req, &opts()).unwrap().p_value.is_none());
    }

    #[test]
    fn custom_guess_length_must_match() {
        let req = FitRequest::custom("A*exp(-k*x)", vec![0.0, 1.0, 2.0], vec![3.0, 1.1, 0.4])
            .with_initial_guess(vec![3.0]);
        let err = fit_curve(&req, &opts()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "initial_guess has 1 values but the model has 2 parameters (A, k)"
        );
    }

    #[test]
    fn custom_guess_is_used_in_sorted_order() {
        let x = grid(0.0, 4.0, 12);
        let y: Vec<f64> = x.iter().map(|&v| 3.0 * (-1.2 * v).exp()).collect();
        let req = FitRequest::custom("A*exp(-k*x)", x, y).with_initial_guess(vec![2.0, 1.0]);
        let r = fit_curve(&req, &opts()).unwrap();
        assert_relative_eq!(r.parameters[0], 3.0, epsilon = 1e-5);
        assert_relative_eq!(r.parameters[1], 1.2, epsilon = 1e-5);
    }

    #[test]
    fn redundant_parameters_fail_to_converge() {
        // Only the product a·b is identifiable, so the Jacobian has rank one.
        let x = grid(0.0, 4.0, 10);
        let y: Vec<f64> = x.iter().map(|&v| 2.0 * v).collect();
        let at_solution = FitRequest::custom("a*b*x", x.clone(), y).with_initial_guess(vec![1.0, 2.0]);
        assert!(matches!(
            fit_curve(&at_solution, &opts()).unwrap_err(),
            FitError::FitConvergence(_)
        ));

        let noisy: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &v)| 2.0 * v + if i % 2 == 0 { 0.05 } else { -0.05 })
            .collect();
        let err = fit_curve(&FitRequest::custom("a*b*x", x, noisy), &opts()).unwrap_err();
        assert_eq!(err.kind(), "fit_convergence");
    }

    #[test]
    fn evaluation_budget_is_enforced() {
        let x = grid(0.0, 10.0, 30);
        let y: Vec<f64> = x.iter().map(|&v| (3.0 * v).sin()).collect();
        let req = FitRequest::custom("sin(w*x)", x, y).with_initial_guess(vec![0.5]);
        let tight = FitOptions {
            max_evaluations: 2,
            ..FitOptions::default()
        };
        assert!(matches!(fit_curve(&req, &tight), Err(FitError::FitConvergence(_))));
    }

    #[test]
    fn batch_preserves_order_and_isolates_failures() {
        let good = FitRequest::builtin(BuiltinModel::Linear, vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]);
        let bad = FitRequest::builtin(BuiltinModel::Linear, vec![0.0], vec![1.0]);
        let out = fit_batch(&[good.clone(), bad, good], &opts());
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
        assert!(out[2].is_ok());
    }
}
