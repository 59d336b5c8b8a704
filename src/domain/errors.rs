//! Domain-specific error types

use thiserror::Error;

/// Domain-level errors raised before any upstream source is contacted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid CVE identifier '{input}'. Expected format: CVE-YYYY-NNNN")]
    InvalidFormat { input: String },

    #[error("Invalid input for field {field}: {message}")]
    InvalidInput { field: String, message: String },
}
