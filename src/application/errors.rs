//! Application layer error types

use crate::domain::DomainError;
use thiserror::Error;

/// Errors surfaced to callers of the analysis services
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// Input rejected before any source was contacted
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error(
        "{resource} {id} was not found. The upstream source may be busy, please try again later"
    )]
    NotFound { resource: String, id: String },

    #[error("No CVEs found for keyword '{keyword}' in the selected period")]
    NoResults { keyword: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Failures talking to NVD, EPSS or KEV
#[derive(Error, Debug)]
pub enum VulnerabilityError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rate limit exceeded for {api}")]
    RateLimit { api: String },

    /// A single attempt ran past its deadline
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("API key rejected by {api}")]
    Authentication { api: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_message_shows_expected_shape() {
        let error = ApplicationError::from(DomainError::InvalidFormat {
            input: "CVE-12".to_string(),
        });
        let message = error.to_string();
        assert!(message.contains("CVE-12"));
        assert!(message.contains("CVE-YYYY-NNNN"));
    }

    #[test]
    fn test_not_found_mentions_busy_source() {
        let error = ApplicationError::NotFound {
            resource: "CVE".to_string(),
            id: "CVE-2099-0001".to_string(),
        };
        assert!(error.to_string().contains("may be busy"));
    }
}
