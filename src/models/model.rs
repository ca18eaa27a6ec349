//! Built-in model table and evaluation.
//!
//! The table is a closed enumeration: parameter lists and display forms are
//! compile-time constants, shared read-only by every request.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinModel {
    Linear,
    Quadratic,
    Cubic,
    Power,
    Exponential,
    Sinusoidal,
}

impl BuiltinModel {
    pub const ALL: [BuiltinModel; 6] = [
        BuiltinModel::Linear,
        BuiltinModel::Quadratic,
        BuiltinModel::Cubic,
        BuiltinModel::Power,
        BuiltinModel::Exponential,
        BuiltinModel::Sinusoidal,
    ];

    /// Selector used in requests.
    pub fn id(self) -> &'static str {
        match self {
            BuiltinModel::Linear => "linear",
            BuiltinModel::Quadratic => "quadratic",
            BuiltinModel::Cubic => "cubic",
            BuiltinModel::Power => "power",
            BuiltinModel::Exponential => "exponential",
            BuiltinModel::Sinusoidal => "sinusoidal",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    /// Human-readable model form.
    pub fn display_name(self) -> &'static str {
        match self {
            BuiltinModel::Linear => "y = a·x + b",
            BuiltinModel::Quadratic => "y = a·x² + b·x + c",
            BuiltinModel::Cubic => "y = a·x³ + b·x² + c·x + d",
            BuiltinModel::Power => "y = a·x^b",
            BuiltinModel::Exponential => "y = a·exp(b·x)",
            BuiltinModel::Sinusoidal => "y = A·sin(ω·x + φ) + D",
        }
    }

    /// Parameter names in binding order.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            BuiltinModel::Linear => &["a", "b"],
            BuiltinModel::Quadratic => &["a", "b", "c"],
            BuiltinModel::Cubic => &["a", "b", "c", "d"],
            BuiltinModel::Power => &["a", "b"],
            BuiltinModel::Exponential => &["a", "b"],
            BuiltinModel::Sinusoidal => &["A", "ω", "φ", "D"],
        }
    }

    pub fn param_count(self) -> usize {
        self.parameter_names().len()
    }
}

/// Evaluate a built-in model at `x`.
///
/// # Panics
/// Panics if `p` is shorter than `model.param_count()`.
pub fn predict(model: BuiltinModel, x: f64, p: &[f64]) -> f64 {
    match model {
        BuiltinModel::Linear => p[0] * x + p[1],
        BuiltinModel::Quadratic => p[0] * x * x + p[1] * x + p[2],
        BuiltinModel::Cubic => p[0] * x.powi(3) + p[1] * x * x + p[2] * x + p[3],
        BuiltinModel::Power => p[0] * x.powf(p[1]),
        BuiltinModel::Exponential => p[0] * (p[1] * x).exp(),
        BuiltinModel::Sinusoidal => p[0] * (p[1] * x + p[2]).sin() + p[3],
    }
}
