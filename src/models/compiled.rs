//! Model compilation: selector + optional expression -> `CompiledModel`.

use hyperdual::Hyperdual;

use crate::domain::{INDEPENDENT_VARIABLE, ModelSelector};
use crate::error::FitError;
use crate::expr::{self, Program};
use crate::models::model::{BuiltinModel, predict};

#[derive(Debug, Clone, PartialEq)]
enum ModelFunction {
    Builtin(BuiltinModel),
    /// Slot 0 is the independent variable, slots `1..=k` the parameters.
    Custom(Program),
}

/// An evaluable `f(x; p1..pk)` plus its parameter names and display form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
    function: ModelFunction,
    parameter_names: Vec<String>,
    display_name: String,
}

impl CompiledModel {
    pub fn builtin(model: BuiltinModel) -> Self {
        Self {
            function: ModelFunction::Builtin(model),
            parameter_names: model.parameter_names().iter().map(|s| s.to_string()).collect(),
            display_name: model.display_name().to_string(),
        }
    }

    /// Compile a free-form expression in `x`.
    ///
    /// Parameters are the remaining free symbols in lexicographic order, which
    /// fixes their positional binding (including for user-supplied guesses).
    pub fn custom(source: &str) -> Result<Self, FitError> {
        let ast = expr::parse(source)?;
        let mut symbols = ast.free_symbols();
        if !symbols.remove(INDEPENDENT_VARIABLE) {
            return Err(FitError::MissingIndependentVariable {
                variable: INDEPENDENT_VARIABLE.to_string(),
            });
        }
        let parameter_names: Vec<String> = symbols.into_iter().collect();

        let mut slots: Vec<&str> = Vec::with_capacity(parameter_names.len() + 1);
        slots.push(INDEPENDENT_VARIABLE);
        slots.extend(parameter_names.iter().map(String::as_str));
        let program = Program::compile(&ast, &slots)?;

        Ok(Self {
            function: ModelFunction::Custom(program),
            parameter_names,
            display_name: format!("y = {}", source.trim()),
        })
    }

    /// Resolve a request's model selector.
    pub fn compile(selector: ModelSelector, custom_expr: Option<&str>) -> Result<Self, FitError> {
        match selector {
            ModelSelector::Builtin(model) => Ok(Self::builtin(model)),
            ModelSelector::Custom => {
                let source = custom_expr
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| FitError::validation("custom_expr is required for custom model"))?;
                Self::custom(source)
            }
        }
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn param_count(&self) -> usize {
        self.parameter_names.len()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The built-in family, if any.
    pub fn builtin_kind(&self) -> Option<BuiltinModel> {
        match self.function {
            ModelFunction::Builtin(m) => Some(m),
            ModelFunction::Custom(_) => None,
        }
    }

    /// Evaluate at a single point.
    pub fn eval(&self, x: f64, params: &[f64]) -> f64 {
        match &self.function {
            ModelFunction::Builtin(m) => predict(*m, x, params),
            ModelFunction::Custom(program) => {
                let mut args = Vec::with_capacity(params.len() + 1);
                args.push(x);
                args.extend_from_slice(params);
                program.eval(&args)
            }
        }
    }

    /// Evaluate over every element of `xs`.
    pub fn eval_many(&self, xs: &[f64], params: &[f64]) -> Vec<f64> {
        match &self.function {
            ModelFunction::Builtin(m) => xs.iter().map(|&x| predict(*m, x, params)).collect(),
            ModelFunction::Custom(program) => {
                let mut args = Vec::with_capacity(params.len() + 1);
                args.push(0.0);
                args.extend_from_slice(params);
                let mut stack = Vec::new();
                xs.iter()
                    .map(|&x| {
                        args[0] = x;
                        program.eval_with(&args, &mut stack)
                    })
                    .collect()
            }
        }
    }

    /// Exact `∂f/∂p_j` at every `x`, one column per parameter.
    ///
    /// Only custom models carry a program to differentiate; built-ins return
    /// `None`.
    pub fn parameter_gradients(&self, xs: &[f64], params: &[f64]) -> Option<Vec<Vec<f64>>> {
        let ModelFunction::Custom(program) = &self.function else {
            return None;
        };
        let mut args: Vec<Hyperdual<f64, 2>> = std::iter::once(0.0)
            .chain(params.iter().copied())
            .map(Hyperdual::from_real)
            .collect();
        let mut stack = Vec::new();
        let mut columns = Vec::with_capacity(params.len());
        for j in 1..args.len() {
            args[j][1] = 1.0;
            let column = xs
                .iter()
                .map(|&x| {
                    args[0] = Hyperdual::from_real(x);
                    program.eval_with(&args, &mut stack)[1]
                })
                .collect();
            args[j][1] = 0.0;
            columns.push(column);
        }
        Some(columns)
    }
}
