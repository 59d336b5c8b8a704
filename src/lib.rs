//! cve-radar - vulnerability intelligence for CVE identifiers
//!
//! Aggregates the NIST NVD record, the FIRST EPSS exploit probability and the
//! CISA KEV catalog status of a CVE into a single record with a derived risk
//! score. Also offers bulk analysis and keyword threat summaries. Layered the
//! DDD way: `domain` holds pure types and rules, `application` orchestrates,
//! `infrastructure` talks to upstream sources and the cache, `presentation`
//! exposes the HTTP API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod presentation;

pub use config::Config;
pub use logging::init_tracing;
