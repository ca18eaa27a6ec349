use crate::expr::ExprError;
use crate::formula::FormulaError;
use crate::integrate::IntegrateError;

/// Exit code for server and runtime failures.
pub const EXIT_SERVER: u8 = 1;

/// Exit code for bad input, IO and request errors.
pub const EXIT_INPUT: u8 = 2;

/// Exit code for numerical failures.
pub const EXIT_FIT: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::FitConvergence(_) => EXIT_FIT,
            _ => EXIT_INPUT,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<FormulaError> for AppError {
    fn from(err: FormulaError) -> Self {
        AppError::new(EXIT_INPUT, err.to_string())
    }
}

impl From<IntegrateError> for AppError {
    fn from(err: IntegrateError) -> Self {
        let code = match err {
            IntegrateError::NotFinite | IntegrateError::EmptyRegion => EXIT_FIT,
            _ => EXIT_INPUT,
        };
        AppError::new(code, err.to_string())
    }
}

/// Failure of a curve-fit request.
///
/// Every variant is terminal for the request; nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Malformed or inconsistent request. The fit is never attempted.
    #[error("{0}")]
    Validation(String),

    /// The custom expression does not parse or does not resolve.
    #[error("Invalid custom expression: {message}")]
    InvalidExpression { message: String },

    /// The custom expression does not mention the independent variable.
    #[error("Custom expression must contain variable '{variable}'")]
    MissingIndependentVariable { variable: String },

    /// Optimizer failure, singular Jacobian or non-finite model evaluation.
    #[error("Fitting failed: {0}")]
    FitConvergence(String),
}

impl FitError {
    pub fn validation(message: impl Into<String>) -> Self {
        FitError::Validation(message.into())
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        FitError::FitConvergence(message.into())
    }

    /// Stable machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FitError::Validation(_) => "validation",
            FitError::InvalidExpression { .. } => "invalid_expression",
            FitError::MissingIndependentVariable { .. } => "missing_independent_variable",
            FitError::FitConvergence(_) => "fit_convergence",
        }
    }
}

impl From<ExprError> for FitError {
    fn from(err: ExprError) -> Self {
        FitError::InvalidExpression {
            message: err.to_string(),
        }
    }
}
