//! Numerical utilities: evaluation grids and least-squares covariance.

pub mod covariance;
pub mod grid;

pub use covariance::*;
pub use grid::*;
