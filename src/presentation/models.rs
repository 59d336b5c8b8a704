//! API request and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    AffectedProduct, BulkAnalysisEntry, BulkAnalysisResult, CveSummaryRow, CvssAssessment,
    ExploitProbability, KevDetails, KeywordSummary, VulnerabilityRecord, WeaknessFrequency,
    WeaknessRef,
};

/// Full analysis of one CVE
#[derive(Debug, Serialize, ToSchema)]
pub struct VulnerabilityDto {
    /// Canonical CVE identifier
    #[schema(example = "CVE-2021-44228")]
    pub id: String,

    #[schema(example = "Apache Log4j2 JNDI features do not protect against attacker controlled LDAP endpoints.")]
    pub description: String,

    #[schema(example = "2021-12-10T10:15:09Z")]
    pub published: Option<DateTime<Utc>>,

    pub last_modified: Option<DateTime<Utc>>,

    /// Highest-version CVSS metric reported by NVD
    pub cvss: Option<CvssDto>,

    /// At most five CWE references
    pub weaknesses: Vec<WeaknessDto>,

    /// At most ten products parsed from CPE configurations
    pub affected_products: Vec<AffectedProductDto>,

    pub references: Vec<String>,

    /// FIRST EPSS probability, absent when not scored or unavailable
    pub epss: Option<EpssDto>,

    pub exploitation: ExploitationDto,

    pub risk: RiskDto,

    #[schema(example = "https://nvd.nist.gov/vuln/detail/CVE-2021-44228")]
    pub nvd_url: String,
}

/// DTO for the selected CVSS metric
#[derive(Debug, Serialize, ToSchema)]
pub struct CvssDto {
    #[schema(example = "3.1")]
    pub version: String,
    #[schema(example = 10.0)]
    pub base_score: Option<f64>,
    #[schema(example = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:C/C:H/I:H/A:H")]
    pub vector: Option<String>,
    #[schema(example = "CRITICAL")]
    pub severity: String,
    #[schema(example = "High")]
    pub impact: String,
    #[schema(example = "High")]
    pub exploitability: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeaknessDto {
    #[schema(example = "CWE-79")]
    pub id: String,
    #[schema(example = "Cross-site Scripting")]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AffectedProductDto {
    #[schema(example = "apache")]
    pub vendor: String,
    #[schema(example = "log4j")]
    pub product: String,
    #[schema(example = "all versions")]
    pub version: String,
    #[schema(example = " (up to 2.15.0)")]
    pub version_range: Option<String>,
    #[schema(example = "apache:log4j (up to 2.15.0)")]
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EpssDto {
    #[schema(example = 0.97)]
    pub score: f64,
    #[schema(example = 0.999)]
    pub percentile: f64,
    #[schema(example = "2024-05-01")]
    pub date: Option<String>,
}

/// DTO for KEV catalog status
#[derive(Debug, Serialize, ToSchema)]
pub struct ExploitationDto {
    /// Whether the CVE is listed in the CISA KEV catalog
    pub exploited: bool,
    pub details: Option<KevDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KevDto {
    #[schema(example = "Apache")]
    pub vendor: String,
    #[schema(example = "Log4j2")]
    pub product: String,
    pub vulnerability_name: Option<String>,
    #[schema(example = "2021-12-10")]
    pub date_added: Option<String>,
    pub due_date: Option<String>,
    pub required_action: Option<String>,
    pub notes: Option<String>,
    #[schema(example = "Known")]
    pub known_ransomware_use: Option<String>,
}

/// Derived 0-10 risk score
#[derive(Debug, Serialize, ToSchema)]
pub struct RiskDto {
    #[schema(example = 10, minimum = 0, maximum = 10)]
    pub score: u8,
    #[schema(example = "Critical")]
    pub level: String,
}

/// Request model for bulk analysis. Either `identifiers` or a free-form `input` list.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAnalysisRequest {
    /// Identifiers analysed as given; malformed entries produce per-item errors
    #[schema(example = r#"["CVE-2021-44228", "CVE-2023-4966"]"#)]
    pub identifiers: Option<Vec<String>>,

    /// Comma or whitespace separated list; malformed tokens are dropped
    #[schema(example = "CVE-2021-44228, CVE-2023-4966")]
    pub input: Option<String>,

    /// Worker count, defaults to the server setting
    #[schema(example = 5, minimum = 1)]
    pub concurrency: Option<usize>,
}

/// Outcome for one requested identifier
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkEntryDto {
    #[schema(example = "CVE-2021-44228")]
    pub identifier: String,
    pub result: Option<VulnerabilityDto>,
    pub error: Option<String>,
}

/// Response model for bulk analysis, entries in request order
#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAnalysisResponse {
    pub entries: Vec<BulkEntryDto>,
    #[schema(example = 2)]
    pub total: usize,
    #[schema(example = 2)]
    pub succeeded: usize,
    #[schema(example = 0)]
    pub failed: usize,
    /// Successful analyses listed in the KEV catalog
    #[schema(example = 1)]
    pub exploited: usize,
}

/// Query parameters for keyword threat analysis
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ThreatQuery {
    /// Product or technology keyword
    #[param(example = "openssl")]
    pub keyword: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to the configured number of days before `end`
    #[param(example = "2024-01-01")]
    pub start: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; defaults to now
    #[param(example = "2024-06-30")]
    pub end: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CveSummaryDto {
    #[schema(example = "CVE-2024-0001")]
    pub id: String,
    #[schema(example = 9.8)]
    pub cvss: f64,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    #[schema(example = "CWE-79")]
    pub cwe: Option<String>,
    #[schema(example = 0.42)]
    pub epss: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeaknessFrequencyDto {
    #[schema(example = "CWE-79")]
    pub cwe: String,
    #[schema(example = 12)]
    pub count: usize,
}

/// Keyword threat summary
#[derive(Debug, Serialize, ToSchema)]
pub struct ThreatSummaryResponse {
    #[schema(example = "openssl")]
    pub keyword: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[schema(example = 42)]
    pub total_cves: usize,
    /// Ten highest CVSS scores, enriched with EPSS
    pub top_by_cvss: Vec<CveSummaryDto>,
    pub top_by_epss: Vec<CveSummaryDto>,
    #[schema(example = 7.4)]
    pub average_cvss: f64,
    #[schema(example = 0.031)]
    pub average_epss: f64,
    pub top_weaknesses: Vec<WeaknessFrequencyDto>,
    #[schema(example = 0)]
    pub kev_count: usize,
    pub all_cves: Vec<CveSummaryDto>,
}

/// Identifier syntax check
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationResponse {
    #[schema(example = "cve-2021-44228")]
    pub identifier: String,
    pub valid: bool,
    /// Canonical form when valid
    #[schema(example = "CVE-2021-44228")]
    pub normalized: Option<String>,
}

/// Error response model
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code
    #[schema(example = "INVALID_FORMAT")]
    pub code: String,

    /// Human-readable error message
    #[schema(example = "Invalid CVE identifier 'CVE-21-1'. Expected format: CVE-YYYY-NNNN")]
    pub message: String,

    /// Additional error context
    pub details: Option<serde_json::Value>,

    /// Unique request identifier for tracking and support
    pub request_id: Uuid,

    #[schema(example = "2024-01-15T10:30:00Z")]
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,

    #[schema(example = "0.1.0")]
    pub version: String,

    pub timestamp: DateTime<Utc>,

    /// Build and cache details
    pub details: Option<serde_json::Value>,
}

impl From<&CvssAssessment> for CvssDto {
    fn from(cvss: &CvssAssessment) -> Self {
        Self {
            version: cvss.version.to_string(),
            base_score: cvss.base_score,
            vector: cvss.vector.clone(),
            severity: cvss.severity.to_string(),
            impact: cvss.impact.impact.to_string(),
            exploitability: cvss.impact.exploitability.to_string(),
        }
    }
}

impl From<&WeaknessRef> for WeaknessDto {
    fn from(weakness: &WeaknessRef) -> Self {
        Self {
            id: weakness.id.clone(),
            name: weakness.name.clone(),
        }
    }
}

impl From<&AffectedProduct> for AffectedProductDto {
    fn from(product: &AffectedProduct) -> Self {
        Self {
            vendor: product.vendor.clone(),
            product: product.product.clone(),
            version: product.version.clone(),
            version_range: product.version_range.clone(),
            display_name: product.display_name(),
        }
    }
}

impl From<&ExploitProbability> for EpssDto {
    fn from(epss: &ExploitProbability) -> Self {
        Self {
            score: epss.score,
            percentile: epss.percentile,
            date: epss.date.clone(),
        }
    }
}

impl From<&KevDetails> for KevDto {
    fn from(kev: &KevDetails) -> Self {
        Self {
            vendor: kev.vendor.clone(),
            product: kev.product.clone(),
            vulnerability_name: kev.vulnerability_name.clone(),
            date_added: kev.date_added.clone(),
            due_date: kev.due_date.clone(),
            required_action: kev.required_action.clone(),
            notes: kev.notes.clone(),
            known_ransomware_use: kev.known_ransomware_use.clone(),
        }
    }
}

impl From<&VulnerabilityRecord> for VulnerabilityDto {
    fn from(record: &VulnerabilityRecord) -> Self {
        Self {
            id: record.id.to_string(),
            description: record.description.clone(),
            published: record.published,
            last_modified: record.last_modified,
            cvss: record.cvss.as_ref().map(CvssDto::from),
            weaknesses: record.weaknesses.iter().map(WeaknessDto::from).collect(),
            affected_products: record
                .affected_products
                .iter()
                .map(AffectedProductDto::from)
                .collect(),
            references: record.references.clone(),
            epss: record.epss.as_ref().map(EpssDto::from),
            exploitation: ExploitationDto {
                exploited: record.exploitation.exploited,
                details: record.exploitation.details.as_ref().map(KevDto::from),
            },
            risk: RiskDto {
                score: record.risk.score,
                level: record.risk.level.to_string(),
            },
            nvd_url: record.nvd_url.clone(),
        }
    }
}

impl From<&BulkAnalysisEntry> for BulkEntryDto {
    fn from(entry: &BulkAnalysisEntry) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            result: entry.record.as_ref().map(VulnerabilityDto::from),
            error: entry.error.clone(),
        }
    }
}

impl From<&BulkAnalysisResult> for BulkAnalysisResponse {
    fn from(result: &BulkAnalysisResult) -> Self {
        Self {
            entries: result.entries.iter().map(BulkEntryDto::from).collect(),
            total: result.len(),
            succeeded: result.succeeded(),
            failed: result.failed(),
            exploited: result.exploited(),
        }
    }
}

impl From<&CveSummaryRow> for CveSummaryDto {
    fn from(row: &CveSummaryRow) -> Self {
        Self {
            id: row.id.clone(),
            cvss: row.cvss,
            description: row.description.clone(),
            published: row.published,
            cwe: row.cwe.clone(),
            epss: row.epss,
        }
    }
}

impl From<&WeaknessFrequency> for WeaknessFrequencyDto {
    fn from(frequency: &WeaknessFrequency) -> Self {
        Self {
            cwe: frequency.cwe.clone(),
            count: frequency.count,
        }
    }
}

impl From<&KeywordSummary> for ThreatSummaryResponse {
    fn from(summary: &KeywordSummary) -> Self {
        let rows = |rows: &[CveSummaryRow]| -> Vec<CveSummaryDto> {
            rows.iter().map(CveSummaryDto::from).collect()
        };
        Self {
            keyword: summary.keyword.clone(),
            start: summary.window.start,
            end: summary.window.end,
            total_cves: summary.total_cves,
            top_by_cvss: rows(&summary.top_by_cvss),
            top_by_epss: rows(&summary.top_by_epss),
            average_cvss: summary.average_cvss,
            average_epss: summary.average_epss,
            top_weaknesses: summary
                .top_weaknesses
                .iter()
                .map(WeaknessFrequencyDto::from)
                .collect(),
            kev_count: summary.kev_count,
            all_cves: rows(&summary.all_cves),
        }
    }
}
