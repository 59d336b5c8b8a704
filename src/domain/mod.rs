//! Domain layer
//!
//! Identifiers, records and the pure scoring rules of CVE risk analysis.
//! Nothing in here performs I/O.

pub mod entities;
pub mod errors;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use services::*;
pub use value_objects::*;
