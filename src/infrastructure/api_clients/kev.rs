//! CISA Known Exploited Vulnerabilities catalog client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::traits::KevGateway;
use crate::application::errors::{ApiError, VulnerabilityError};
use crate::domain::{CveId, KevDetails};
use crate::infrastructure::resilience::RetryConfig;

#[derive(Debug, Deserialize)]
struct KevCatalog {
    #[serde(default)]
    vulnerabilities: Vec<KevEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KevEntry {
    #[serde(rename = "cveID")]
    cve_id: String,
    #[serde(default)]
    vendor_project: String,
    #[serde(default)]
    product: String,
    vulnerability_name: Option<String>,
    date_added: Option<String>,
    due_date: Option<String>,
    required_action: Option<String>,
    notes: Option<String>,
    known_ransomware_campaign_use: Option<String>,
}

impl From<KevEntry> for KevDetails {
    fn from(entry: KevEntry) -> Self {
        Self {
            vendor: entry.vendor_project,
            product: entry.product,
            vulnerability_name: entry.vulnerability_name,
            date_added: entry.date_added,
            due_date: entry.due_date,
            required_action: entry.required_action,
            notes: entry.notes.filter(|n| !n.is_empty()),
            known_ransomware_use: entry.known_ransomware_campaign_use,
        }
    }
}

/// Downloads the full catalog per lookup and scans it for the identifier.
/// A download that still fails after retries is reported as "not listed".
pub struct KevClient {
    client: Client,
    catalog_url: String,
    retry: RetryConfig,
    cancellation: CancellationToken,
}

impl KevClient {
    pub fn new(catalog_url: String) -> Self {
        Self {
            client: super::http_client(),
            catalog_url,
            retry: RetryConfig {
                attempt_timeout: std::time::Duration::from_secs(30),
                ..RetryConfig::default()
            },
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

    async fn fetch_catalog(&self) -> Result<KevCatalog, VulnerabilityError> {
        super::send_with_retry(&self.retry, &self.cancellation, || {
            Self::download(self.client.get(&self.catalog_url))
        })
        .await
    }

    async fn download(request: RequestBuilder) -> Result<KevCatalog, VulnerabilityError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(VulnerabilityError::Api(ApiError::Http {
                status: response.status().as_u16(),
                message: "KEV catalog unavailable".to_string(),
            }));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl KevGateway for KevClient {
    async fn get_status(&self, id: &CveId) -> Result<Option<KevDetails>, VulnerabilityError> {
        let catalog = match self.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(cve = %id, error = %e, "Failed to fetch KEV catalog");
                return Ok(None);
            }
        };

        tracing::debug!(entries = catalog.vulnerabilities.len(), "Scanning KEV catalog");

        Ok(catalog
            .vulnerabilities
            .into_iter()
            .find(|entry| entry.cve_id == id.as_str())
            .map(KevDetails::from))
    }
}
