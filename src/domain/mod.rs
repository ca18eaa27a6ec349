//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the request model (`FitRequest`, `ModelSelector`)
//! - fit outputs (`FitResult`)
//! - service tunables (`FitOptions`)

pub mod types;

pub use types::*;
