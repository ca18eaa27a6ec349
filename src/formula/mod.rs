//! Formula evaluation with uncertainty propagation, and n-sigma comparison.
//!
//! Both share the expression language of custom fit models.

pub mod format;
pub mod normalize;
pub mod nsigma;
pub mod propagate;

pub use format::{format_general, round_to, scientific_round};
pub use normalize::normalize;
pub use nsigma::*;
pub use propagate::*;

use crate::expr::ExprError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("Expression is required")]
    MissingExpression,

    #[error("Invalid expression: {0}")]
    Expression(#[from] ExprError),

    #[error("Missing value for variable: {0}")]
    MissingVariable(String),

    #[error("Expression does not evaluate to a finite number")]
    NotFinite,

    #[error("All values and uncertainties are required")]
    MissingMeasurement,

    #[error("Uncertainties must be positive")]
    NonPositiveUncertainty,

    #[error("Combined uncertainty is zero")]
    ZeroCombinedUncertainty,
}
