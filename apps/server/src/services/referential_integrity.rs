//! Reference collection over resource JSON.
//!
//! Used by the locator to check that a submitted bundle only points at
//! resources that exist.

use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Every `reference` string found in a resource, split by kind
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CollectedRefs {
    /// Bundle-local `urn:...` references
    pub urns: BTreeSet<String>,
    /// Relative references as `(Type, id)`
    pub relative: BTreeSet<(String, String)>,
}

/// Walk the entire JSON tree and collect URN and relative `Type/id` references.
///
/// Skips fragments (`#...`) and absolute URLs.
pub(crate) fn collect_refs(value: &JsonValue, out: &mut CollectedRefs) {
    match value {
        JsonValue::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        JsonValue::Object(obj) => {
            if let Some(ref_str) = obj.get("reference").and_then(|v| v.as_str()) {
                let trimmed = ref_str.trim();
                if trimmed.starts_with("urn:") {
                    out.urns.insert(trimmed.to_string());
                } else if !trimmed.is_empty()
                    && !trimmed.starts_with('#')
                    && !trimmed.contains("://")
                {
                    let parts: Vec<&str> = trimmed.splitn(3, '/').collect();
                    if parts.len() >= 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                        out.relative
                            .insert((parts[0].to_string(), parts[1].to_string()));
                    }
                }
            }
            for child in obj.values() {
                collect_refs(child, out);
            }
        }
        _ => {}
    }
}

/// Rewrite every `reference` string found in `mapping`
pub(crate) fn rewrite_refs(value: &mut JsonValue, mapping: &dyn Fn(&str) -> Option<String>) {
    match value {
        JsonValue::Array(items) => {
            for item in items {
                rewrite_refs(item, mapping);
            }
        }
        JsonValue::Object(obj) => {
            if let Some(JsonValue::String(reference)) = obj.get_mut("reference") {
                if let Some(replacement) = mapping(reference) {
                    *reference = replacement;
                }
            }
            for child in obj.values_mut() {
                rewrite_refs(child, mapping);
            }
        }
        _ => {}
    }
}
