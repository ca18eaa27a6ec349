//! Curve fitting.
//!
//! Responsibilities:
//!
//! - run weighted nonlinear least squares (`regressor`)
//! - derive goodness-of-fit metrics (`quality`)
//! - validate and orchestrate a request, or a batch of them (`service`)

pub mod quality;
pub mod regressor;
pub mod service;

pub use quality::*;
pub use regressor::*;
pub use service::*;
