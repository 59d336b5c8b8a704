//! NVD CVE API 2.0 client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio_util::sync::CancellationToken;

use super::traits::{NvdGateway, RawNvdCve, RawNvdResponse};
use crate::application::errors::{ApiError, VulnerabilityError};
use crate::domain::{CveId, PublicationWindow};
use crate::infrastructure::resilience::RetryConfig;

/// Longest publication range NVD accepts for one keyword query
pub const MAX_WINDOW_DAYS: i64 = 120;

const NVD_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Client for the NVD REST API, every request goes through the retry executor
pub struct NvdClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    window_days: i64,
    cancellation: CancellationToken,
}

impl NvdClient {
    /// Create a client against `base_url` (e.g. `https://services.nvd.nist.gov/rest/json`)
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());

        tracing::info!(
            base_url = %base_url,
            has_api_key = api_key.is_some(),
            "Initialized NvdClient"
        );

        Self {
            client: super::http_client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: RetryConfig::default(),
            window_days: MAX_WINDOW_DAYS,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days.clamp(1, MAX_WINDOW_DAYS);
        self
    }

    /// Tie every request to `token`; cancelling it aborts in-flight retries
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    fn request(&self, query: &[(&str, String)]) -> RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}/cves/2.0", self.base_url))
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }
        request
    }

    /// Send `query` with retries and decode the envelope
    async fn fetch(&self, query: Vec<(&str, String)>) -> Result<RawNvdResponse, VulnerabilityError> {
        super::send_with_retry(&self.retry, &self.cancellation, || {
            Self::execute(self.request(&query))
        })
        .await
    }

    async fn execute(request: RequestBuilder) -> Result<RawNvdResponse, VulnerabilityError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VulnerabilityError::RateLimit {
                api: "NVD".to_string(),
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(VulnerabilityError::Api(ApiError::Authentication {
                api: "NVD".to_string(),
            }));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VulnerabilityError::Api(ApiError::Http {
                status: status.as_u16(),
                message: format!("NVD API error: {}", error_text),
            }));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn keyword_query(
        keyword: &str,
        page_size: u32,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("keywordSearch", keyword.to_string()),
            ("resultsPerPage", page_size.to_string()),
        ];
        if let Some(start) = start {
            query.push(("pubStartDate", start.format(NVD_DATE_FORMAT).to_string()));
        }
        if let Some(end) = end {
            query.push(("pubEndDate", end.format(NVD_DATE_FORMAT).to_string()));
        }
        query
    }
}

#[async_trait]
impl NvdGateway for NvdClient {
    #[tracing::instrument(skip(self), fields(cve = %id))]
    async fn get_raw_data(&self, id: &CveId) -> Result<Option<RawNvdCve>, VulnerabilityError> {
        tracing::debug!("Fetching CVE from NVD");
        let response = self.fetch(vec![("cveId", id.to_string())]).await?;
        Ok(response.vulnerabilities.into_iter().next().map(|item| item.cve))
    }

    #[tracing::instrument(skip(self))]
    async fn search_by_keyword(
        &self,
        keyword: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> Result<Vec<RawNvdCve>, VulnerabilityError> {
        let windows: Vec<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = match (start, end) {
            (Some(start), Some(end)) => PublicationWindow::new(start, end)
                .map_err(|e| {
                    VulnerabilityError::Api(ApiError::Http {
                        status: 400,
                        message: e.to_string(),
                    })
                })?
                .split(self.window_days)
                .into_iter()
                .map(|w| (Some(w.start), Some(w.end)))
                .collect(),
            other => vec![other],
        };

        if windows.len() > 1 {
            tracing::debug!(windows = windows.len(), "Splitting keyword search into windows");
        }

        // A failed window contributes nothing; the search fails only when every window did
        let total = windows.len();
        let mut failed = 0;
        let mut last_error = None;
        let mut results = Vec::new();
        for (index, (window_start, window_end)) in windows.into_iter().enumerate() {
            match self
                .fetch(Self::keyword_query(keyword, page_size, window_start, window_end))
                .await
            {
                Ok(response) => {
                    results.extend(response.vulnerabilities.into_iter().map(|item| item.cve))
                }
                Err(VulnerabilityError::Cancelled) => return Err(VulnerabilityError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        window = index + 1,
                        windows = total,
                        error = %e,
                        "Keyword search window failed, skipping"
                    );
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if failed == total {
            if let Some(error) = last_error {
                return Err(error);
            }
        }

        tracing::debug!(count = results.len(), failed, "Keyword search complete");
        Ok(results)
    }
}
