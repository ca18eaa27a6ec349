//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - decoded straight from request JSON (CLI files, HTTP bodies)
//! - returned as response JSON
//! - exported for later inspection

use serde::{Deserialize, Serialize};

use crate::models::BuiltinModel;

/// Default evaluation ceiling for the optimizer.
pub const DEFAULT_MAX_EVALUATIONS: usize = 2000;

/// Default sample count of the dense `x_fit` / `y_fit` curve.
pub const DEFAULT_CURVE_POINTS: usize = 200;

/// Name of the independent variable in every model.
pub const INDEPENDENT_VARIABLE: &str = "x";

/// A single curve-fit request.
///
/// Validation happens in the fit service, not at decode time, so malformed
/// requests produce the same structured errors regardless of the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRequest {
    #[serde(default)]
    pub x_data: Vec<f64>,
    #[serde(default)]
    pub y_data: Vec<f64>,
    /// Per-point absolute uncertainties of `y_data`. An empty list means "none".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_errors: Option<Vec<f64>>,
    /// Built-in model name or `"custom"`.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_expr: Option<String>,
    /// Starting parameters for custom models, in compiled (sorted) parameter order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_guess: Option<Vec<f64>>,
}

fn default_model() -> String {
    BuiltinModel::Linear.id().to_string()
}

impl FitRequest {
    /// Convenience constructor for an unweighted built-in fit.
    pub fn builtin(model: BuiltinModel, x_data: Vec<f64>, y_data: Vec<f64>) -> Self {
        Self {
            x_data,
            y_data,
            y_errors: None,
            model: model.id().to_string(),
            custom_expr: None,
            initial_guess: None,
        }
    }

    /// Convenience constructor for an unweighted custom-expression fit.
    pub fn custom(expr: impl Into<String>, x_data: Vec<f64>, y_data: Vec<f64>) -> Self {
        Self {
            x_data,
            y_data,
            y_errors: None,
            model: ModelSelector::CUSTOM.to_string(),
            custom_expr: Some(expr.into()),
            initial_guess: None,
        }
    }

    pub fn with_errors(mut self, y_errors: Vec<f64>) -> Self {
        self.y_errors = Some(y_errors);
        self
    }

    pub fn with_initial_guess(mut self, guess: Vec<f64>) -> Self {
        self.initial_guess = Some(guess);
        self
    }
}

/// Which model a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSelector {
    Builtin(BuiltinModel),
    Custom,
}

impl ModelSelector {
    pub const CUSTOM: &'static str = "custom";

    /// Case-insensitive lookup of a model selector.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        if name == Self::CUSTOM {
            return Some(ModelSelector::Custom);
        }
        BuiltinModel::from_id(&name).map(ModelSelector::Builtin)
    }
}

/// Output of a successful fit.
///
/// Non-finite values (`+inf` reduced chi-squared, `NaN` uncertainties) are kept
/// as-is in memory; `serde_json` renders them as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    /// Fitted parameters, aligned with `parameter_names`.
    pub parameters: Vec<f64>,
    /// Standard errors (square root of the covariance diagonal).
    pub uncertainties: Vec<f64>,
    pub parameter_names: Vec<String>,
    /// Row-major `n_params × n_params` covariance matrix.
    pub covariance: Vec<Vec<f64>>,
    pub r_squared: f64,
    pub chi_squared: f64,
    pub reduced_chi_squared: f64,
    /// Only defined for weighted fits with positive degrees of freedom.
    pub p_value: Option<f64>,
    pub dof: i64,
    pub n_data: usize,
    pub n_params: usize,
    pub model_name: String,
    pub x_fit: Vec<f64>,
    pub y_fit: Vec<f64>,
    /// `y_i - f(x_i)`, same order as the input.
    pub residuals: Vec<f64>,
}

/// Tunables for the fit service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Ceiling on residual evaluations performed by the optimizer.
    pub max_evaluations: usize,
    /// Number of samples in the dense evaluation curve.
    pub curve_points: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            curve_points: DEFAULT_CURVE_POINTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_is_case_insensitive() {
        assert_eq!(
            ModelSelector::parse(" Linear "),
            Some(ModelSelector::Builtin(BuiltinModel::Linear))
        );
        assert_eq!(ModelSelector::parse("CUSTOM"), Some(ModelSelector::Custom));
        assert_eq!(ModelSelector::parse("logistic"), None);
    }

    #[test]
    fn request_defaults_follow_the_wire_format() {
        let req: FitRequest = serde_json::from_str(r#"{"x_data":[1,2],"y_data":[3,4]}"#).unwrap();
        assert_eq!(req.model, "linear");
        assert!(req.y_errors.is_none());
        assert!(req.custom_expr.is_none());
        assert!(req.initial_guess.is_none());

        let empty: FitRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.x_data.is_empty());
    }

    #[test]
    fn non_finite_metrics_serialize_as_null() {
        let result = FitResult {
            parameters: vec![0.0, 5.0],
            uncertainties: vec![f64::INFINITY, f64::NAN],
            parameter_names: vec!["a".into(), "b".into()],
            covariance: vec![vec![f64::INFINITY; 2]; 2],
            r_squared: 0.0,
            chi_squared: 0.0,
            reduced_chi_squared: f64::INFINITY,
            p_value: None,
            dof: 0,
            n_data: 2,
            n_params: 2,
            model_name: "y = a·x + b".into(),
            x_fit: vec![],
            y_fit: vec![],
            residuals: vec![0.0, 0.0],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["reduced_chi_squared"].is_null());
        assert!(json["p_value"].is_null());
        assert!(json["uncertainties"][1].is_null());
        assert_eq!(json["dof"], 0);
    }
}
