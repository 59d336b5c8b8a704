//! FIRST EPSS client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::traits::{EpssGateway, deserialize_lenient_f64};
use crate::application::errors::{ApiError, VulnerabilityError};
use crate::domain::{CveId, ExploitProbability};
use crate::infrastructure::resilience::RetryConfig;

#[derive(Debug, Deserialize)]
struct EpssResponse {
    #[serde(default)]
    data: Vec<EpssEntry>,
}

/// FIRST encodes both numbers as strings
#[derive(Debug, Deserialize)]
struct EpssEntry {
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    epss: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    percentile: Option<f64>,
    #[serde(default)]
    date: Option<String>,
}

/// Client for `https://api.first.org/data/v1/epss`. Requests are retried;
/// once retries are exhausted the failure degrades to "no score".
pub struct EpssClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
    cancellation: CancellationToken,
}

impl EpssClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: super::http_client(),
            base_url,
            retry: RetryConfig::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn request(&self, id: &CveId) -> RequestBuilder {
        self.client
            .get(&self.base_url)
            .query(&[("cve", id.as_str())])
    }

    async fn fetch(&self, id: &CveId) -> Result<Option<ExploitProbability>, VulnerabilityError> {
        super::send_with_retry(&self.retry, &self.cancellation, || {
            Self::execute(self.request(id), id)
        })
        .await
    }

    async fn execute(
        request: RequestBuilder,
        id: &CveId,
    ) -> Result<Option<ExploitProbability>, VulnerabilityError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(VulnerabilityError::Api(ApiError::Http {
                status: status.as_u16(),
                message: "EPSS request failed".to_string(),
            }));
        }

        let body: EpssResponse = response.json().await?;
        let Some(entry) = body.data.into_iter().next() else {
            tracing::debug!(cve = %id, "EPSS has no score for CVE");
            return Ok(None);
        };

        Ok(entry.epss.map(|score| ExploitProbability {
            score,
            percentile: entry.percentile.unwrap_or(0.0),
            date: entry.date,
        }))
    }
}

#[async_trait]
impl EpssGateway for EpssClient {
    async fn get_score(
        &self,
        id: &CveId,
    ) -> Result<Option<ExploitProbability>, VulnerabilityError> {
        match self.fetch(id).await {
            Ok(score) => Ok(score),
            Err(e) => {
                tracing::warn!(cve = %id, error = %e, "Failed to fetch EPSS score");
                Ok(None)
            }
        }
    }
}
