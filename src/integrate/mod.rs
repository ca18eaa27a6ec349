//! Numerical integration of user expressions.
//!
//! One-dimensional integrals use deterministic rules over `x`
//! (`quadrature`); two to six dimensions use seeded Monte Carlo sampling
//! over `x, y, z, w, v, u`, optionally restricted by a comparison condition
//! (`monte_carlo`).

pub mod monte_carlo;
pub mod quadrature;

pub use monte_carlo::*;
pub use quadrature::*;

use crate::expr::{self, ExprError, Program};

/// Variable names by dimension.
pub const VARIABLES: [&str; 6] = ["x", "y", "z", "w", "v", "u"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrateError {
    #[error("function is required")]
    MissingFunction,

    #[error("bounds must be [a, b]")]
    BadBounds,

    #[error("bounds are required")]
    MissingBounds,

    #[error("Integration bounds must be finite")]
    NonFiniteBounds,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid function syntax: {0}")]
    Expression(#[from] ExprError),

    #[error("Invalid condition syntax: {0}")]
    Condition(ExprError),

    #[error("Unknown variable '{name}' (expected one of: {allowed})")]
    UnknownVariable { name: String, allowed: String },

    #[error("Use /1d endpoint for 1D integration")]
    UseOneDimensional,

    #[error("At most {max} dimensions are supported")]
    TooManyDimensions { max: usize },

    #[error("num_samples must be between 1 and {max}")]
    SampleCount { max: usize },

    #[error("No samples satisfy the condition")]
    EmptyRegion,

    #[error("Integrand is infinite or undefined at sampled points")]
    NotFinite,
}

/// Parse `src` and bind its symbols to `variables` in order.
///
/// Syntax errors go through `wrap`; symbols outside `variables` are rejected
/// by name.
fn compile_in(
    src: &str,
    variables: &[&str],
    wrap: fn(ExprError) -> IntegrateError,
) -> Result<Program, IntegrateError> {
    let ast = expr::parse(src).map_err(wrap)?;
    if let Some(name) = ast
        .free_symbols()
        .into_iter()
        .find(|s| !variables.contains(&s.as_str()))
    {
        return Err(IntegrateError::UnknownVariable {
            name,
            allowed: variables.join(", "),
        });
    }
    Program::compile(&ast, variables).map_err(wrap)
}

/// A compiled single-output function with a reusable evaluation stack.
struct Integrand {
    program: Program,
    stack: Vec<f64>,
}

impl Integrand {
    fn new(program: Program) -> Self {
        Self {
            program,
            stack: Vec::new(),
        }
    }

    fn at(&mut self, point: &[f64]) -> f64 {
        self.program.eval_with(point, &mut self.stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stray_symbols_are_named() {
        let err = compile_in("x*k", &["x"], IntegrateError::Expression).unwrap_err();
        assert_eq!(err.to_string(), "Unknown variable 'k' (expected one of: x)");
    }

    #[test]
    fn syntax_errors_keep_their_source() {
        assert!(matches!(
            compile_in("x +", &["x"], IntegrateError::Expression),
            Err(IntegrateError::Expression(_))
        ));
        assert!(matches!(
            compile_in("x <", &["x", "y"], IntegrateError::Condition),
            Err(IntegrateError::Condition(_))
        ));
    }

    #[test]
    fn constants_are_not_variables() {
        let p = compile_in("E*sin(pi*x)", &["x"], IntegrateError::Expression).unwrap();
        let mut f = Integrand::new(p);
        assert!((f.at(&[0.5]) - std::f64::consts::E).abs() < 1e-12);
    }
}
