//! First-order propagation of independent uncertainties.
//!
//! `σ_f = sqrt(Σ (∂f/∂v · σ_v)²)`, with each partial derivative evaluated
//! exactly by running the compiled expression over dual numbers.

use std::collections::BTreeMap;

use hyperdual::Hyperdual;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::expr::{self, Program};
use crate::formula::FormulaError;
use crate::formula::format::{DEFAULT_SIG_DIGITS, scientific_round};
use crate::formula::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaRequest {
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub is_latex: bool,
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
    /// Missing entries count as exact values.
    #[serde(default)]
    pub uncertainties: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaResult {
    pub value: f64,
    pub uncertainty: f64,
    pub formatted: String,
}

pub fn evaluate_formula(request: &FormulaRequest) -> Result<FormulaResult, FormulaError> {
    if request.expression.trim().is_empty() {
        return Err(FormulaError::MissingExpression);
    }
    let normalized = normalize(&request.expression, request.is_latex);
    debug!(%normalized, "normalized formula");

    let ast = expr::parse(&normalized)?;
    let names: Vec<String> = ast.free_symbols().into_iter().collect();
    let mut values = Vec::with_capacity(names.len());
    for name in &names {
        let v = request
            .variables
            .get(name)
            .ok_or_else(|| FormulaError::MissingVariable(name.clone()))?;
        values.push(*v);
    }
    let slots: Vec<&str> = names.iter().map(String::as_str).collect();
    let program = Program::compile(&ast, &slots)?;

    let value = program.eval(&values);
    if !value.is_finite() {
        return Err(FormulaError::NotFinite);
    }

    let mut args: Vec<Hyperdual<f64, 2>> = values.iter().map(|&v| Hyperdual::from_real(v)).collect();
    let mut variance = 0.0;
    for (j, name) in names.iter().enumerate() {
        let sigma = request.uncertainties.get(name).copied().unwrap_or(0.0);
        if sigma == 0.0 {
            continue;
        }
        args[j][1] = 1.0;
        let partial = program.eval(&args)[1];
        args[j][1] = 0.0;
        variance += (partial * sigma).powi(2);
    }
    let uncertainty = variance.sqrt();

    Ok(FormulaResult {
        value,
        uncertainty,
        formatted: scientific_round(value, uncertainty, DEFAULT_SIG_DIGITS),
    })
}
