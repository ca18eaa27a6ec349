//! Reporting utilities: fit summaries, residual tables, and formula output.

pub mod format;

pub use format::*;
