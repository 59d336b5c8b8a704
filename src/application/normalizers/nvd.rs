//! Full NVD record normalization

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_affected_products, normalize_cvss, normalize_weaknesses};
use crate::domain::{AffectedProduct, CvssAssessment, WeaknessRef};
use crate::infrastructure::api_clients::{RawLangString, RawNvdCve};

pub const NO_DESCRIPTION: &str = "No description available.";

/// Technical part of a vulnerability record, as derived from one NVD entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNvd {
    pub id: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub cvss: Option<CvssAssessment>,
    pub weaknesses: Vec<WeaknessRef>,
    pub affected_products: Vec<AffectedProduct>,
    pub references: Vec<String>,
}

/// Compose every normalizer over a raw NVD entry; absent input stays absent
pub fn normalize_nvd(raw: Option<&RawNvdCve>) -> Option<NormalizedNvd> {
    let raw = raw?;

    Some(NormalizedNvd {
        id: raw.id.clone(),
        description: pick_description(&raw.descriptions),
        published: raw.published.as_deref().and_then(parse_nvd_timestamp),
        last_modified: raw.last_modified.as_deref().and_then(parse_nvd_timestamp),
        cvss: normalize_cvss(&raw.metrics),
        weaknesses: normalize_weaknesses(&raw.weaknesses),
        affected_products: normalize_affected_products(&raw.configurations),
        references: raw
            .references
            .iter()
            .map(|r| r.url.clone())
            .filter(|url| !url.is_empty())
            .collect(),
    })
}

/// English text first, then whatever comes first, then a placeholder
fn pick_description(descriptions: &[RawLangString]) -> String {
    descriptions
        .iter()
        .find(|d| d.lang.eq_ignore_ascii_case("en") && !d.value.trim().is_empty())
        .or_else(|| descriptions.iter().find(|d| !d.value.trim().is_empty()))
        .map(|d| d.value.trim().to_string())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string())
}

/// NVD timestamps carry no offset and are UTC; RFC 3339 is accepted too
pub fn parse_nvd_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
