//! Hashing System - SHA-256 over Canonical Plans
//!
//! Identical briefs must provably produce identical placements, so
//! every render plan is fingerprinted over its canonical JSON form.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::layout::RenderPlan;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of one solved plan: every box, every content payload.
pub fn compute_plan_hash(plan: &RenderPlan) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(plan)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Audit hash binding a batch to its inputs.
/// batch_hash = sha256(canonical_brief + ruleset_version + engine_version)
pub fn compute_batch_hash(
    brief: &impl Serialize,
    ruleset_version: &str,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_brief = canonical_json(brief)?;
    let combined = format!("{}:{}:{}", canonical_brief, ruleset_version, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"plan data";
        let h1 = sha256_hex(data);
        let h2 = sha256_hex(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_batch_hash_sensitive_to_ruleset() {
        let brief = json!({"mainMessage": "Fresh Taste"});
        let h1 = compute_batch_hash(&brief, "1.0.0", "1.0.0").unwrap();
        let h2 = compute_batch_hash(&brief, "1.1.0", "1.0.0").unwrap();
        assert_ne!(h1, h2);
    }
}
