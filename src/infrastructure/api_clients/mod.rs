//! API clients for external vulnerability intelligence sources

pub mod epss;
pub mod kev;
pub mod nvd;
pub mod traits;

pub use epss::*;
pub use kev::*;
pub use nvd::*;
pub use traits::*;

use reqwest::Client;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::application::errors::VulnerabilityError;
use crate::infrastructure::resilience::{RetryConfig, retry_with_backoff};

/// Shared reqwest client setup for all gateways. Per-attempt deadlines come
/// from the retry executor, not from the client.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("cve-radar/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        })
}

/// Run `attempt` through the retry executor under a child of `cancellation`.
/// An attempt whose token fires is dropped and reported as cancelled.
pub(crate) async fn send_with_retry<F, Fut, T>(
    retry: &RetryConfig,
    cancellation: &CancellationToken,
    mut attempt: F,
) -> Result<T, VulnerabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VulnerabilityError>>,
{
    let parent = cancellation.child_token();
    retry_with_backoff(retry, &parent, |token| {
        let request = attempt();
        async move {
            tokio::select! {
                _ = token.cancelled() => Err(VulnerabilityError::Cancelled),
                result = request => result,
            }
        }
    })
    .await
}
