//! Command-line parsing for the `labfit` tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting/formula code; `app` does the dispatch.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::domain::{DEFAULT_CURVE_POINTS, DEFAULT_MAX_EVALUATIONS, FitOptions};
use crate::integrate::{DEFAULT_SAMPLES, QuadratureMethod};
use crate::models::BuiltinModel;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "labfit", version, about = "Curve fitting and uncertainty tools for lab data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a model to data from a JSON request (single or batch) or a CSV file.
    Fit(FitArgs),
    /// Generate a synthetic data set from a built-in model as a JSON request.
    Sample(SampleArgs),
    /// Evaluate a formula and propagate uncertainties.
    Formula(FormulaArgs),
    /// Compare two measurements: |v1 - v2| / sqrt(u1² + u2²).
    Nsigma(NsigmaArgs),
    /// Integrate a function over an interval (1D) or a box (Monte Carlo).
    Integrate(IntegrateArgs),
    /// Run the JSON HTTP API.
    Serve(ServeArgs),
}

/// Optimizer knobs shared by `fit` and `serve`.
#[derive(Debug, Args, Clone)]
pub struct FitTuning {
    /// Ceiling on model evaluations per fit.
    #[arg(long, env = "LABFIT_MAX_EVALS", default_value_t = DEFAULT_MAX_EVALUATIONS)]
    pub max_evals: usize,

    /// Samples in the dense fitted curve (`x_fit`/`y_fit`).
    #[arg(long, default_value_t = DEFAULT_CURVE_POINTS)]
    pub curve_points: usize,
}

impl FitTuning {
    pub fn options(&self) -> FitOptions {
        FitOptions {
            max_evaluations: self.max_evals,
            curve_points: self.curve_points,
        }
    }
}

#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "csv"])))]
pub struct FitArgs {
    /// JSON request file (object or array); `-` reads stdin.
    pub input: Option<PathBuf>,

    /// CSV with `x`, `y` and optional `y_err`/`sigma` columns.
    #[arg(long, value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Model for CSV input: a built-in name or `custom`.
    #[arg(long, requires = "csv")]
    pub model: Option<String>,

    /// Custom model expression in `x`, e.g. `A*exp(-k*x) + c`.
    #[arg(long, requires = "csv")]
    pub expr: Option<String>,

    /// Starting values for a custom model, in sorted parameter order.
    #[arg(long, requires = "csv", value_delimiter = ',', allow_hyphen_values = true)]
    pub guess: Option<Vec<f64>>,

    /// Print the raw JSON result instead of the text summary.
    #[arg(long)]
    pub json: bool,

    /// Render an ASCII plot of data and fitted curve.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Print the per-point residual table.
    #[arg(long)]
    pub residuals: bool,

    /// Write request + result as JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Write per-point residuals as CSV.
    #[arg(long = "export-residuals", value_name = "CSV")]
    pub export_residuals: Option<PathBuf>,

    #[command(flatten)]
    pub tuning: FitTuning,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Model to sample from.
    #[arg(value_enum)]
    pub model: BuiltinModel,

    /// True parameters, comma-separated, in model order.
    #[arg(long, required = true, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Vec<f64>,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub x_min: f64,

    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    pub x_max: f64,

    /// Number of points.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,

    /// Gaussian noise standard deviation.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Include `y_errors` equal to the noise level.
    #[arg(long)]
    pub with_errors: bool,

    /// Output file (stdout if omitted).
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FormulaArgs {
    /// Expression to evaluate, e.g. `a*b/c`.
    pub expression: String,

    /// Treat the expression as LaTeX (`\frac{a}{b}`, `\sqrt{x}`, ...).
    #[arg(long)]
    pub latex: bool,

    /// Variable value, `name=value`. Repeatable.
    #[arg(long = "var", value_parser = parse_assignment, allow_hyphen_values = true)]
    pub vars: Vec<(String, f64)>,

    /// Variable uncertainty, `name=sigma`. Repeatable.
    #[arg(long = "sigma", value_parser = parse_assignment)]
    pub sigmas: Vec<(String, f64)>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct NsigmaArgs {
    #[arg(allow_negative_numbers = true)]
    pub value1: f64,
    pub uncertainty1: f64,
    #[arg(allow_negative_numbers = true)]
    pub value2: f64,
    pub uncertainty2: f64,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct IntegrateArgs {
    /// Integrand in `x` (1D) or `x, y, z, w, v, u`.
    pub function: String,

    /// Interval `MIN,MAX`. Repeat once per dimension.
    #[arg(long = "bounds", required = true, value_parser = parse_interval, allow_hyphen_values = true)]
    pub bounds: Vec<(f64, f64)>,

    /// Rule for 1D integrals.
    #[arg(long, value_enum, default_value_t = QuadratureMethod::Quad)]
    pub method: QuadratureMethod,

    /// Region restriction for Monte Carlo, e.g. `x^2 + y^2 < 1`.
    #[arg(long)]
    pub condition: Option<String>,

    /// Monte Carlo sample count.
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: usize,

    /// Monte Carlo seed (random if omitted).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "LABFIT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Worker threads for batch fits (0 = one per core).
    #[arg(long, env = "LABFIT_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Maximum request body size in MiB.
    #[arg(long, env = "LABFIT_MAX_BODY_MB", default_value_t = 16)]
    pub max_body_mb: usize,

    /// Allowed CORS origins, comma-separated; `*` allows any.
    #[arg(
        long,
        env = "LABFIT_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173,http://localhost:3000"
    )]
    pub cors_origins: Vec<String>,

    #[command(flatten)]
    pub tuning: FitTuning,
}

/// Parse `name=value`.
fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{s}'"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number in '{s}'"))?;
    Ok((name.to_string(), value))
}

/// Parse `min,max`.
fn parse_interval(s: &str) -> Result<(f64, f64), String> {
    let (lo, hi) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid number in '{s}'"))
    };
    Ok((parse(lo)?, parse(hi)?))
}
