//! Starting points for the optimizer.
//!
//! Least squares on these families is only locally convergent, so the start
//! matters more than the solver for power, exponential and sinusoidal data.

use std::f64::consts::TAU;

use crate::math::range;
use crate::models::compiled::CompiledModel;
use crate::models::model::BuiltinModel;

/// Starting parameter vector for `model`.
///
/// `None` means "all ones". Custom models use `user_guess` when given; its
/// length is checked by the caller.
pub fn initial_guess(
    model: &CompiledModel,
    x: &[f64],
    y: &[f64],
    user_guess: Option<&[f64]>,
) -> Option<Vec<f64>> {
    match model.builtin_kind() {
        None => user_guess.map(<[f64]>::to_vec),
        Some(BuiltinModel::Linear | BuiltinModel::Quadratic | BuiltinModel::Cubic) => None,
        Some(BuiltinModel::Power) => Some(vec![1.0, 1.0]),
        Some(BuiltinModel::Exponential) => Some(vec![1.0, 0.1]),
        Some(BuiltinModel::Sinusoidal) => Some(sinusoidal_guess(x, y)),
    }
}

/// `[amplitude, angular frequency, phase, offset]` from the data envelope.
fn sinusoidal_guess(x: &[f64], y: &[f64]) -> Vec<f64> {
    let (y_min, y_max) = range(y);
    let (x_min, x_max) = range(x);
    let span = x_max - x_min;
    let omega = if span > 0.0 { TAU / span } else { 1.0 };
    let mean = if y.is_empty() {
        0.0
    } else {
        y.iter().sum::<f64>() / y.len() as f64
    };
    vec![(y_max - y_min) / 2.0, omega, 0.0, mean]
}

/// Resolve an optional guess to a concrete vector of length `k`.
pub fn resolve_start(guess: Option<Vec<f64>>, k: usize) -> Vec<f64> {
    guess.unwrap_or_else(|| vec![1.0; k])
}
