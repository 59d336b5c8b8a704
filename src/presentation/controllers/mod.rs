//! HTTP controllers for handling requests

pub mod analysis;
pub mod health;

pub use analysis::*;
pub use health::*;
