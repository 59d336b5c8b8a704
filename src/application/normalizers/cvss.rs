//! CVSS metric selection and vector interpretation

use crate::domain::{CvssAssessment, CvssSeverity, CvssVersion, ImpactLevel, ImpactSummary};
use crate::infrastructure::api_clients::{RawCvssMetric, RawCvssMetrics};

/// Pick the newest available metric block (3.1, then 3.0, then 2.0) and normalize it
pub fn normalize_cvss(metrics: &RawCvssMetrics) -> Option<CvssAssessment> {
    let (metric, version) = pick_metric(metrics)?;
    let data = &metric.cvss_data;

    let base_score = data.base_score.filter(|s| s.is_finite());
    let label = data
        .base_severity
        .as_deref()
        .or(metric.base_severity.as_deref());
    let severity = match CvssSeverity::from_label(label) {
        CvssSeverity::Unknown => CvssSeverity::from_score(base_score),
        severity => severity,
    };
    let vector = data.vector_string.clone().filter(|v| !v.trim().is_empty());

    Some(CvssAssessment {
        base_score,
        impact: derive_impact(vector.as_deref()),
        vector,
        severity,
        version,
    })
}

fn pick_metric(metrics: &RawCvssMetrics) -> Option<(&RawCvssMetric, CvssVersion)> {
    metrics
        .v31
        .first()
        .map(|m| (m, CvssVersion::V3_1))
        .or_else(|| metrics.v30.first().map(|m| (m, CvssVersion::V3_0)))
        .or_else(|| metrics.v2.first().map(|m| (m, CvssVersion::V2_0)))
}

/// Coarse impact and exploitability levels from a CVSS vector string.
///
/// The first `/` segment is the version prefix and is skipped. This holds for
/// v2 vectors too, so their `AV` is never read and they rate Medium.
/// C/I/A contribute 1 for `H` and 0.5 for `L`; v2 `C`/`P` values score 0.
/// A sum of at least 2.5 is High, at least 1.5 Medium, anything else Low.
/// `AV:N` is High exploitability, `AV:A` Low, every other vector Medium.
pub fn derive_impact(vector: Option<&str>) -> ImpactSummary {
    let Some(vector) = vector else {
        return ImpactSummary::unknown();
    };

    let mut attack_vector = None;
    let mut impact_sum = 0.0;
    for segment in vector.split('/').skip(1) {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        match key {
            "AV" => attack_vector = Some(value),
            "C" | "I" | "A" => {
                impact_sum += match value {
                    "H" => 1.0,
                    "L" => 0.5,
                    _ => 0.0,
                }
            }
            _ => {}
        }
    }

    let impact = if impact_sum >= 2.5 {
        ImpactLevel::High
    } else if impact_sum >= 1.5 {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    };

    let exploitability = match attack_vector {
        Some("N") => ImpactLevel::High,
        Some("A") => ImpactLevel::Low,
        _ => ImpactLevel::Medium,
    };

    ImpactSummary {
        impact,
        exploitability,
    }
}
