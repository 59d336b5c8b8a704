//! Domain entities representing core business concepts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::*;

/// Impact and exploitability derived from a CVSS vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    pub impact: ImpactLevel,
    pub exploitability: ImpactLevel,
}

impl ImpactSummary {
    pub fn unknown() -> Self {
        Self {
            impact: ImpactLevel::Unknown,
            exploitability: ImpactLevel::Unknown,
        }
    }
}

/// The single CVSS metric block selected for a vulnerability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvssAssessment {
    /// Base score in 0.0-10.0, absent when the source value is not a finite number
    pub base_score: Option<f64>,
    pub vector: Option<String>,
    pub severity: CvssSeverity,
    pub version: CvssVersion,
    pub impact: ImpactSummary,
}

/// Reference to a CWE weakness class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaknessRef {
    pub id: String,
    pub name: String,
}

/// Product affected by a vulnerability, parsed from a CPE match string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedProduct {
    pub vendor: String,
    pub product: String,
    pub version: String,
    /// Human readable upper bound such as `" (up to 2.15.0)"`
    pub version_range: Option<String>,
    /// Raw CPE string the product was parsed from
    pub source_identifier: String,
}

impl AffectedProduct {
    /// Compact `vendor:product[:version][ (up to X)]` label
    pub fn display_name(&self) -> String {
        let mut name = format!("{}:{}", self.vendor, self.product);
        if self.version != "all versions" && !self.version.is_empty() {
            name.push(':');
            name.push_str(&self.version);
        }
        if let Some(range) = &self.version_range {
            name.push_str(range);
        }
        name
    }
}

/// FIRST EPSS exploitation probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploitProbability {
    /// Probability of exploitation in the next 30 days (0.0-1.0)
    pub score: f64,
    /// Rank relative to all scored CVEs (0.0-1.0)
    pub percentile: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// CISA KEV catalog entry for an actively exploited vulnerability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KevDetails {
    pub vendor: String,
    pub product: String,
    pub vulnerability_name: Option<String>,
    pub date_added: Option<String>,
    pub due_date: Option<String>,
    pub required_action: Option<String>,
    pub notes: Option<String>,
    pub known_ransomware_use: Option<String>,
}

/// Active exploitation status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitationStatus {
    pub exploited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<KevDetails>,
}

impl ExploitationStatus {
    pub fn from_catalog(entry: Option<KevDetails>) -> Self {
        Self {
            exploited: entry.is_some(),
            details: entry,
        }
    }
}

/// Derived risk assessment, recomputed from its inputs on every analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub level: RiskLevel,
}

/// Canonical analysis output for a single CVE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: CveId,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub cvss: Option<CvssAssessment>,
    pub weaknesses: Vec<WeaknessRef>,
    pub affected_products: Vec<AffectedProduct>,
    pub references: Vec<String>,
    pub epss: Option<ExploitProbability>,
    pub exploitation: ExploitationStatus,
    pub risk: RiskAssessment,
    pub nvd_url: String,
}

impl VulnerabilityRecord {
    pub fn base_score(&self) -> Option<f64> {
        self.cvss.as_ref().and_then(|c| c.base_score)
    }

    pub fn severity(&self) -> CvssSeverity {
        self.cvss
            .as_ref()
            .map(|c| c.severity)
            .unwrap_or(CvssSeverity::Unknown)
    }

    pub fn is_actively_exploited(&self) -> bool {
        self.exploitation.exploited
    }
}

/// Outcome for one identifier of a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAnalysisEntry {
    /// Identifier exactly as requested
    pub identifier: String,
    pub record: Option<VulnerabilityRecord>,
    pub error: Option<String>,
}

impl BulkAnalysisEntry {
    pub fn success(identifier: String, record: VulnerabilityRecord) -> Self {
        Self {
            identifier,
            record: Some(record),
            error: None,
        }
    }

    pub fn failure(identifier: String, error: impl Into<String>) -> Self {
        Self {
            identifier,
            record: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.record.is_some()
    }
}

/// Ordered bulk result, one entry per requested identifier
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkAnalysisResult {
    pub entries: Vec<BulkAnalysisEntry>,
}

impl BulkAnalysisResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    /// Number of successfully analysed CVEs listed in the KEV catalog
    pub fn exploited(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|e| e.record.as_ref())
            .filter(|r| r.is_actively_exploited())
            .count()
    }
}

/// One row of a keyword search, reduced to the fields used for ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveSummaryRow {
    pub id: String,
    /// CVSS base score, 0.0 when the record has none
    pub cvss: f64,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    /// First weakness id, `None` when the record lists none
    pub cwe: Option<String>,
    pub epss: Option<f64>,
}

/// Frequency of a weakness across a result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaknessFrequency {
    pub cwe: String,
    pub count: usize,
}

/// Aggregated threat picture for a keyword over a publication window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSummary {
    pub keyword: String,
    pub window: PublicationWindow,
    pub total_cves: usize,
    /// Highest CVSS rows (at most 10), enriched with EPSS
    pub top_by_cvss: Vec<CveSummaryRow>,
    /// The enriched slice re-ranked by EPSS
    pub top_by_epss: Vec<CveSummaryRow>,
    pub average_cvss: f64,
    pub average_epss: f64,
    pub top_weaknesses: Vec<WeaknessFrequency>,
    /// KEV is not consulted in keyword mode, kept for collaborators expecting the field
    pub kev_count: usize,
    pub all_cves: Vec<CveSummaryRow>,
}
