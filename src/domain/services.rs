//! Domain services containing business logic

use super::{CveSummaryRow, ExploitProbability, RiskAssessment, RiskLevel, WeaknessFrequency};

/// Weighted-sum risk model combining CVSS, EPSS and KEV signals
pub struct RiskCalculator;

impl RiskCalculator {
    const EPSS_WEIGHT: f64 = 5.0;
    const KEV_BONUS: f64 = 3.0;
    const MAX_RAW: f64 = 12.0;

    pub fn new() -> Self {
        Self
    }

    /// Compute the 0-10 risk score and its level.
    ///
    /// raw = cvss + epss * 5 + (3 if exploited); score = round(min(10, raw / 12 * 10)).
    pub fn calculate(
        &self,
        base_score: Option<f64>,
        epss: Option<&ExploitProbability>,
        exploited: bool,
    ) -> RiskAssessment {
        let mut raw = 0.0;

        if let Some(score) = base_score.filter(|s| s.is_finite()) {
            raw += score;
        }
        if let Some(probability) = epss.map(|e| e.score).filter(|s| s.is_finite()) {
            raw += probability * Self::EPSS_WEIGHT;
        }
        if exploited {
            raw += Self::KEV_BONUS;
        }

        let normalized = (raw / Self::MAX_RAW * 10.0).min(10.0).round().clamp(0.0, 10.0) as u8;

        RiskAssessment {
            score: normalized,
            level: RiskLevel::from_score(normalized),
        }
    }
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-record statistics for keyword threat summaries
pub struct ThreatStatistics;

impl ThreatStatistics {
    pub fn new() -> Self {
        Self
    }

    /// Mean CVSS (one decimal) and mean EPSS (three decimals); absent EPSS counts as 0
    pub fn averages(&self, rows: &[CveSummaryRow]) -> (f64, f64) {
        if rows.is_empty() {
            return (0.0, 0.0);
        }
        let count = rows.len() as f64;
        let cvss = rows.iter().map(|r| r.cvss).sum::<f64>() / count;
        let epss = rows.iter().map(|r| r.epss.unwrap_or(0.0)).sum::<f64>() / count;
        (round_to(cvss, 1), round_to(epss, 3))
    }

    /// Most frequent weaknesses, ties keep first-seen order
    pub fn top_weaknesses(&self, rows: &[CveSummaryRow], limit: usize) -> Vec<WeaknessFrequency> {
        let mut frequencies: Vec<WeaknessFrequency> = Vec::new();
        for cwe in rows.iter().filter_map(|r| r.cwe.as_deref()) {
            match frequencies.iter_mut().find(|f| f.cwe == cwe) {
                Some(existing) => existing.count += 1,
                None => frequencies.push(WeaknessFrequency {
                    cwe: cwe.to_string(),
                    count: 1,
                }),
            }
        }
        frequencies.sort_by(|a, b| b.count.cmp(&a.count));
        frequencies.truncate(limit);
        frequencies
    }

    /// Stable descending sort by CVSS, optionally truncated
    pub fn sort_by_cvss(&self, rows: &[CveSummaryRow], limit: Option<usize>) -> Vec<CveSummaryRow> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| b.cvss.total_cmp(&a.cvss));
        if let Some(limit) = limit {
            sorted.truncate(limit);
        }
        sorted
    }

    /// Stable descending sort by EPSS; rows without a score rank as 0
    pub fn sort_by_epss(&self, rows: &[CveSummaryRow]) -> Vec<CveSummaryRow> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| b.epss.unwrap_or(0.0).total_cmp(&a.epss.unwrap_or(0.0)));
        sorted
    }
}

impl Default for ThreatStatistics {
    fn default() -> Self {
        Self::new()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epss(score: f64) -> ExploitProbability {
        ExploitProbability {
            score,
            percentile: 0.5,
            date: None,
        }
    }

    fn row(id: &str, cvss: f64, cwe: Option<&str>, epss: Option<f64>) -> CveSummaryRow {
        CveSummaryRow {
            id: id.to_string(),
            cvss,
            description: String::new(),
            published: None,
            cwe: cwe.map(str::to_string),
            epss,
        }
    }

    #[test]
    fn test_risk_maximum_inputs_cap_at_ten() {
        let risk = RiskCalculator::new().calculate(Some(10.0), Some(&epss(1.0)), true);
        assert_eq!(risk.score, 10);
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn test_risk_zero_inputs() {
        let risk = RiskCalculator::new().calculate(Some(0.0), Some(&epss(0.0)), false);
        assert_eq!(risk.score, 0);
        assert_eq!(risk.level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_medium_cvss_only() {
        let risk = RiskCalculator::new().calculate(Some(5.0), Some(&epss(0.0)), false);
        assert_eq!(risk.score, 4);
        assert_eq!(risk.level, RiskLevel::Medium);
    }

    #[test]
    fn test_risk_absent_inputs_count_as_zero() {
        let risk = RiskCalculator::new().calculate(None, None, false);
        assert_eq!(risk.score, 0);
        assert_eq!(risk.level, RiskLevel::Low);

        // KEV alone: 3 / 12 * 10 = 2.5 -> 3
        let risk = RiskCalculator::new().calculate(None, None, true);
        assert_eq!(risk.score, 3);
    }

    #[test]
    fn test_risk_high_band() {
        // 7.5 + 0.2 * 5 = 8.5 -> 7.08 -> 7
        let risk = RiskCalculator::new().calculate(Some(7.5), Some(&epss(0.2)), false);
        assert_eq!(risk.score, 7);
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn test_risk_ignores_non_finite_score() {
        let risk = RiskCalculator::new().calculate(Some(f64::NAN), None, false);
        assert_eq!(risk.score, 0);
    }

    #[test]
    fn test_averages() {
        let stats = ThreatStatistics::new();
        let rows = vec![
            row("CVE-2024-0001", 9.8, None, Some(0.9)),
            row("CVE-2024-0002", 5.0, None, None),
            row("CVE-2024-0003", 7.2, None, Some(0.0111)),
        ];
        let (cvss, epss) = stats.averages(&rows);
        assert_eq!(cvss, 7.3);
        assert_eq!(epss, 0.304);
        assert_eq!(stats.averages(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_top_weaknesses_counts_and_ties() {
        let stats = ThreatStatistics::new();
        let rows = vec![
            row("a", 1.0, Some("CWE-79"), None),
            row("b", 1.0, Some("CWE-89"), None),
            row("c", 1.0, Some("CWE-89"), None),
            row("d", 1.0, None, None),
            row("e", 1.0, Some("CWE-20"), None),
            row("f", 1.0, Some("CWE-79"), None),
            row("g", 1.0, Some("CWE-787"), None),
        ];
        let top = stats.top_weaknesses(&rows, 3);
        assert_eq!(
            top,
            vec![
                WeaknessFrequency { cwe: "CWE-79".into(), count: 2 },
                WeaknessFrequency { cwe: "CWE-89".into(), count: 2 },
                WeaknessFrequency { cwe: "CWE-20".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_sort_by_cvss_is_stable() {
        let stats = ThreatStatistics::new();
        let rows = vec![
            row("first", 7.5, None, None),
            row("top", 9.8, None, None),
            row("second", 7.5, None, None),
            row("low", 2.0, None, None),
        ];
        let ids: Vec<String> = stats
            .sort_by_cvss(&rows, Some(3))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_sort_by_epss_treats_missing_as_zero() {
        let stats = ThreatStatistics::new();
        let rows = vec![
            row("none", 9.0, None, None),
            row("high", 5.0, None, Some(0.7)),
            row("low", 5.0, None, Some(0.01)),
        ];
        let ids: Vec<String> = stats.sort_by_epss(&rows).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["high", "low", "none"]);
    }
}
