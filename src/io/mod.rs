//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - JSON fit requests, single or batch (`request`)
//! - result exports (CSV/JSON) (`export`)

pub mod export;
pub mod ingest;
pub mod request;

pub use export::*;
pub use ingest::*;
pub use request::*;
