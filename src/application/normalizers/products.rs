//! Affected product extraction from CPE match criteria

use crate::domain::AffectedProduct;
use crate::infrastructure::api_clients::{RawConfiguration, RawCpeMatch};

pub const MAX_PRODUCTS: usize = 10;

/// Parse every `cpe:2.3:part:vendor:product:version:...` criterion, in source order.
///
/// Criteria with fewer than five colon separated fields are skipped. Duplicates
/// are kept; the list is capped at ten entries.
pub fn normalize_affected_products(configurations: &[RawConfiguration]) -> Vec<AffectedProduct> {
    configurations
        .iter()
        .flat_map(|c| c.nodes.iter())
        .flat_map(|n| n.cpe_match.iter())
        .filter_map(parse_cpe_match)
        .take(MAX_PRODUCTS)
        .collect()
}

fn parse_cpe_match(cpe_match: &RawCpeMatch) -> Option<AffectedProduct> {
    let criteria = cpe_match.criteria.trim();
    let parts: Vec<&str> = criteria.split(':').collect();
    if parts.len() <= 4 {
        return None;
    }

    let version = match parts.get(5).copied().unwrap_or_default() {
        "*" => "all versions".to_string(),
        other => other.to_string(),
    };

    let version_range = cpe_match
        .version_end_including
        .as_deref()
        .or(cpe_match.version_end_excluding.as_deref())
        .filter(|v| !v.is_empty())
        .map(|upper| format!(" (up to {})", upper));

    Some(AffectedProduct {
        vendor: parts[3].to_string(),
        product: parts[4].to_string(),
        version,
        version_range,
        source_identifier: criteria.to_string(),
    })
}
