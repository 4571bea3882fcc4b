//! Label selector building
//!
//! Converts a workload's `matchLabels` into the `key=value,key=value`
//! conjunction accepted by pod list calls.

use std::collections::BTreeMap;

/// Builds the wire-format selector string for a label map
///
/// Clauses are emitted in key order so the same map always yields the same
/// string. An empty map yields an empty string, which would match every pod;
/// callers reject empty selectors before getting here.
pub fn build_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a conjunction of equality clauses back into a label map
///
/// Returns `None` if any clause is not of the form `key=value`.
pub fn parse_selector(selector: &str) -> Option<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    if selector.is_empty() {
        return Some(labels);
    }
    for clause in selector.split(',') {
        let (key, value) = clause.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        labels.insert(key.to_string(), value.to_string());
    }
    Some(labels)
}
