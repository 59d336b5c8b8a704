//! Pure transformations from raw source payloads into domain values.
//!
//! Normalizers never perform I/O and never fail: malformed or missing input
//! degrades to absent values or empty lists.

pub mod cvss;
pub mod cwe;
pub mod nvd;
pub mod products;

pub use cvss::{derive_impact, normalize_cvss};
pub use cwe::normalize_weaknesses;
pub use nvd::{NormalizedNvd, normalize_nvd, parse_nvd_timestamp};
pub use products::normalize_affected_products;
