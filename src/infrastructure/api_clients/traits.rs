//! Traits and raw response types for vulnerability source clients

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::application::errors::VulnerabilityError;
use crate::domain::{CveId, ExploitProbability, KevDetails};

/// Envelope returned by the NVD CVE API 2.0
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNvdResponse {
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub vulnerabilities: Vec<RawNvdItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNvdItem {
    pub cve: RawNvdCve,
}

/// One CVE record as published by NVD
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNvdCve {
    pub id: String,
    /// Local timestamp without offset, e.g. `2021-12-10T10:15:09.143`
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<RawLangString>,
    #[serde(default)]
    pub metrics: RawCvssMetrics,
    #[serde(default)]
    pub weaknesses: Vec<RawWeakness>,
    #[serde(default)]
    pub configurations: Vec<RawConfiguration>,
    #[serde(default)]
    pub references: Vec<RawReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLangString {
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCvssMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    pub v31: Vec<RawCvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    pub v30: Vec<RawCvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    pub v2: Vec<RawCvssMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCvssMetric {
    #[serde(default)]
    pub cvss_data: RawCvssData,
    /// CVSS v2 carries its severity label at this level
    #[serde(default)]
    pub base_severity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCvssData {
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub base_score: Option<f64>,
    #[serde(default)]
    pub vector_string: Option<String>,
    #[serde(default)]
    pub base_severity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWeakness {
    #[serde(default)]
    pub description: Vec<RawLangString>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawConfiguration {
    #[serde(default)]
    pub nodes: Vec<RawConfigurationNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfigurationNode {
    #[serde(default)]
    pub cpe_match: Vec<RawCpeMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCpeMatch {
    #[serde(default)]
    pub vulnerable: bool,
    #[serde(default)]
    pub criteria: String,
    #[serde(default)]
    pub version_end_including: Option<String>,
    #[serde(default)]
    pub version_end_excluding: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReference {
    #[serde(default)]
    pub url: String,
}

/// Accept a number, a numeric string or null
pub(crate) fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    Ok(
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(NumberOrString::Number(n)) => Some(n),
            Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().ok(),
            None => None,
        }
        .filter(|n| n.is_finite()),
    )
}

/// Technical vulnerability details (NVD)
#[async_trait]
pub trait NvdGateway: Send + Sync {
    /// Fetch one CVE record; `Ok(None)` when the source has no such record
    async fn get_raw_data(&self, id: &CveId) -> Result<Option<RawNvdCve>, VulnerabilityError>;

    /// Keyword search restricted to an optional publication window
    async fn search_by_keyword(
        &self,
        keyword: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> Result<Vec<RawNvdCve>, VulnerabilityError>;
}

/// Exploit prediction scores (FIRST EPSS)
#[async_trait]
pub trait EpssGateway: Send + Sync {
    async fn get_score(&self, id: &CveId)
    -> Result<Option<ExploitProbability>, VulnerabilityError>;
}

/// Known exploited vulnerabilities (CISA KEV)
#[async_trait]
pub trait KevGateway: Send + Sync {
    async fn get_status(&self, id: &CveId) -> Result<Option<KevDetails>, VulnerabilityError>;
}
