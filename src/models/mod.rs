//! Model definitions: the built-in table, custom-expression compilation and
//! initial guesses.
//!
//! Models are pure functions of `(x, params)` so the regressor can stay generic.

pub mod compiled;
pub mod guess;
pub mod model;

pub use compiled::CompiledModel;
pub use guess::{initial_guess, resolve_start};
pub use model::*;
