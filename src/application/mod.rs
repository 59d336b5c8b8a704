//! Application Layer - Use cases and application services
//!
//! Orchestrates the source gateways, the pure normalizers and the domain
//! scoring rules into single, bulk and keyword analyses.

pub mod errors;
pub mod normalizers;
pub mod services;


pub use errors::*;
pub use normalizers::NormalizedNvd;
pub use services::*;
