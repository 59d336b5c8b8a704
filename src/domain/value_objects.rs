//! Domain value objects representing immutable concepts

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::errors::DomainError;

static CVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^CVE-[0-9]{4}-[0-9]{4,}$").unwrap());

/// Canonical CVE identifier (`CVE-YYYY-NNNN+`), always trimmed and uppercase.
///
/// The only way to build one is through [`CveId::parse`], so any id handed to a
/// gateway has already passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CveId(String);

impl CveId {
    /// Validate and canonicalize a user supplied identifier
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        if !CVE_PATTERN.is_match(trimmed) {
            return Err(DomainError::InvalidFormat {
                input: input.to_string(),
            });
        }
        Ok(CveId(trimmed.to_uppercase()))
    }

    /// Check whether a string would be accepted by [`CveId::parse`]
    pub fn is_valid(input: &str) -> bool {
        CVE_PATTERN.is_match(input.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Publication year encoded in the identifier
    pub fn year(&self) -> u16 {
        self.0[4..8].parse().unwrap_or_default()
    }

    /// Deep link to the public NVD record
    pub fn nvd_url(&self) -> String {
        format!("https://nvd.nist.gov/vuln/detail/{}", self.0)
    }
}

impl fmt::Display for CveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CveId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CveId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CveId> for String {
    fn from(id: CveId) -> Self {
        id.0
    }
}

/// CVSS specification version of the chosen metric block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CvssVersion {
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
}

impl fmt::Display for CvssVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvssVersion::V2_0 => write!(f, "2.0"),
            CvssVersion::V3_0 => write!(f, "3.0"),
            CvssVersion::V3_1 => write!(f, "3.1"),
        }
    }
}

/// Qualitative severity label reported alongside a CVSS base score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CvssSeverity {
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl CvssSeverity {
    /// Parse a vendor label, falling back to `Unknown`
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_uppercase()).as_deref() {
            Some("LOW") => CvssSeverity::Low,
            Some("MEDIUM") => CvssSeverity::Medium,
            Some("HIGH") => CvssSeverity::High,
            Some("CRITICAL") => CvssSeverity::Critical,
            _ => CvssSeverity::Unknown,
        }
    }

    /// Severity band of a numeric base score
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 9.0 => CvssSeverity::Critical,
            Some(s) if s >= 7.0 => CvssSeverity::High,
            Some(s) if s >= 4.0 => CvssSeverity::Medium,
            Some(_) => CvssSeverity::Low,
            None => CvssSeverity::Unknown,
        }
    }
}

impl fmt::Display for CvssSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CvssSeverity::Low => write!(f, "LOW"),
            CvssSeverity::Medium => write!(f, "MEDIUM"),
            CvssSeverity::High => write!(f, "HIGH"),
            CvssSeverity::Critical => write!(f, "CRITICAL"),
            CvssSeverity::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Coarse level used for the impact and exploitability summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactLevel::Low => write!(f, "Low"),
            ImpactLevel::Medium => write!(f, "Medium"),
            ImpactLevel::High => write!(f, "High"),
            ImpactLevel::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Derived risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a normalized 0-10 score onto a level
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 8 => RiskLevel::Critical,
            s if s >= 6 => RiskLevel::High,
            s if s >= 4 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Closed publication-date interval used by keyword searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PublicationWindow {
    /// Create a window, rejecting reversed bounds
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidInput {
                field: "start".to_string(),
                message: format!("start date {} is after end date {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    /// Window covering the last `days` days up to `end`
    pub fn last_days(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(0)),
            end,
        }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Split into consecutive sub-windows no longer than `max_days` each.
    ///
    /// Sub-windows are returned in chronological order and never overlap: each
    /// one starts one second after the previous one ended, clamped to `end`,
    /// so the last sub-window may be the single instant `[end, end]`. A window
    /// that already fits is returned unchanged.
    pub fn split(&self, max_days: i64) -> Vec<PublicationWindow> {
        let max_span = Duration::days(max_days.max(1));
        if self.span() <= max_span {
            return vec![*self];
        }

        let mut windows = Vec::new();
        let mut current_start = self.start;
        loop {
            let current_end = (current_start + max_span).min(self.end);
            windows.push(PublicationWindow {
                start: current_start,
                end: current_end,
            });
            if current_end >= self.end {
                break;
            }
            current_start = (current_end + Duration::seconds(1)).min(self.end);
        }
        windows
    }
}

impl fmt::Display for PublicationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
