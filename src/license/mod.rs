//! License extraction and risk classification.
//!
//! - [`spdx`]: identifier table and free-text normalization.
//! - [`classifier`]: SPDX expression evaluation into a [`LicenseRisk`](crate::models::LicenseRisk).

pub mod classifier;
pub mod spdx;

use serde_json::Value;

/// License declared by an installed package manifest, in any of its shapes:
/// `"license": "MIT"`, `"license": { "type": "MIT" }`, or a legacy
/// `"licenses": [{ "type": "MIT" }, ...]` list (joined with `OR`).
pub fn extract_license(manifest: &Value) -> Option<String> {
    let single = |v: &Value| -> Option<String> {
        match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(map) => map
                .get("type")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    };

    if let Some(license) = manifest.get("license").and_then(single) {
        return Some(license);
    }
    match manifest.get("licenses") {
        Some(Value::Array(list)) => {
            let ids: Vec<String> = list.iter().filter_map(single).collect();
            if ids.is_empty() {
                None
            } else if ids.len() == 1 {
                ids.into_iter().next()
            } else {
                Some(format!("({})", ids.join(" OR ")))
            }
        }
        Some(other) => single(other),
        None => None,
    }
}
