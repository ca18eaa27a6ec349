//! `labfit` library crate.
//!
//! Curve fitting with uncertainties, formula error propagation, n-sigma
//! comparison and numerical integration for lab measurements. The binary (`labfit`) and the HTTP API
//! are thin wrappers around this library so that:
//!
//! - core logic is testable without spawning processes or sockets
//! - the CLI and the server share one fit service

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod expr;
pub mod fit;
pub mod formula;
pub mod integrate;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod server;
