//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (snapshot-style tests below)

use crate::domain::FitResult;
use crate::formula::format::DEFAULT_SIG_DIGITS;
use crate::formula::{FormulaResult, NSigmaResult, format_general, scientific_round};
use crate::integrate::{Integral1dResult, IntegralMultiResult, QuadratureMethod};

/// Model, parameter estimates and goodness-of-fit block.
pub fn format_fit_summary(fit: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== labfit - curve fit ===\n");
    out.push_str(&format!("Model: {}\n", fit.model_name));
    out.push_str(&format!(
        "Points: n={} | params={} | dof={}\n",
        fit.n_data, fit.n_params, fit.dof
    ));

    out.push_str("\nParameters:\n");
    let name_width = fit
        .parameter_names
        .iter()
        .map(|n| n.chars().count())
        .max()
        .unwrap_or(1)
        .max(4);
    for ((name, value), sigma) in fit
        .parameter_names
        .iter()
        .zip(&fit.parameters)
        .zip(&fit.uncertainties)
    {
        out.push_str(&format!(
            "  {:<w$} = {:>14} ± {:<12} ({})\n",
            name,
            fmt_num(*value),
            fmt_num(*sigma),
            scientific_round(*value, *sigma, DEFAULT_SIG_DIGITS),
            w = name_width,
        ));
    }

    out.push_str("\nGoodness of fit:\n");
    out.push_str(&format!("  R²        = {}\n", fmt_num(fit.r_squared)));
    out.push_str(&format!("  χ²        = {}\n", fmt_num(fit.chi_squared)));
    out.push_str(&format!("  χ²/dof    = {}\n", fmt_num(fit.reduced_chi_squared)));
    match fit.p_value {
        Some(p) => out.push_str(&format!("  p-value   = {}\n", fmt_num(p))),
        None => out.push_str("  p-value   = n/a (unweighted)\n"),
    }

    out
}

/// Per-point table of observed vs fitted values.
pub fn format_residual_table(x: &[f64], y: &[f64], fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(
        format!("{:>12} {:>14} {:>14} {:>14}\n", "x", "y_obs", "y_fit", "residual").trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<14} {:-<14} {:-<14}\n", "", "", "", "").trim_end());
    out.push('\n');

    for ((&xi, &yi), &r) in x.iter().zip(y).zip(&fit.residuals) {
        out.push_str(
            format!(
                "{:>12} {:>14} {:>14} {:>14}\n",
                fmt_num(xi),
                fmt_num(yi),
                fmt_num(yi - r),
                fmt_num(r),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

pub fn format_formula_result(expression: &str, result: &FormulaResult) -> String {
    format!(
        "{expression}\n  value       = {}\n  uncertainty = {}\n  result      = {}\n",
        format_general(result.value, 10),
        format_general(result.uncertainty, 10),
        result.formatted,
    )
}

pub fn format_nsigma_result(result: &NSigmaResult) -> String {
    format!("n_sigma = {:.3}\n{}\n", result.n_sigma, result.interpretation)
}

pub fn format_integral_1d(function: &str, method: QuadratureMethod, result: &Integral1dResult) -> String {
    let mut out = format!("∫ {function} dx  [{}]\n", method.id());
    match result.result {
        Some(v) => out.push_str(&format!("  result         = {}\n", format_general(v, 10))),
        None => out.push_str("  result         = undefined\n"),
    }
    if let Some(err) = result.error_estimate {
        out.push_str(&format!("  error estimate = {}\n", format_general(err, 3)));
    }
    if let Some(warning) = &result.warning {
        out.push_str(&format!("  warning: {warning}\n"));
    }
    out
}

pub fn format_integral_multi(function: &str, result: &IntegralMultiResult) -> String {
    // A constant integrand has no sampling spread; show the value in full.
    let value = if result.error_estimate > 0.0 {
        scientific_round(result.result, result.error_estimate, DEFAULT_SIG_DIGITS)
    } else {
        format_general(result.result, 10)
    };
    format!(
        "∫ {function}  [{}, seed {}]\n  result = {value}\n  volume = {}\n",
        result.method,
        result.seed,
        fmt_num(result.volume),
    )
}

fn fmt_num(v: f64) -> String {
    format_general(v, 6)
}
