//! CWE weakness list normalization

use crate::domain::WeaknessRef;
use crate::infrastructure::api_clients::RawWeakness;

pub const MAX_WEAKNESSES: usize = 5;

const UNKNOWN_WEAKNESS: &str = "Unknown Weakness";

/// Short names for a handful of very common weaknesses
fn weakness_name(id: &str) -> &'static str {
    match id {
        "CWE-79" => "Improper Neutralization of Input",
        "CWE-89" => "SQL Injection",
        "CWE-119" => "Buffer Over-read",
        _ => UNKNOWN_WEAKNESS,
    }
}

/// NVD placeholders that carry no weakness information
fn is_sentinel(id: &str) -> bool {
    id.to_ascii_lowercase().contains("noinfo") || id == "NVD-CWE-Other"
}

/// Flatten weakness descriptions in source order, dropping sentinels, capped at five
pub fn normalize_weaknesses(weaknesses: &[RawWeakness]) -> Vec<WeaknessRef> {
    weaknesses
        .iter()
        .flat_map(|w| w.description.iter())
        .map(|d| d.value.trim())
        .filter(|id| !id.is_empty() && !is_sentinel(id))
        .take(MAX_WEAKNESSES)
        .map(|id| WeaknessRef {
            id: id.to_string(),
            name: weakness_name(id).to_string(),
        })
        .collect()
}
