//! Deterministic cache key derivation.
//!
//! A key is the lowercase hex SHA-256 of `"<operation>|<canonical JSON>"`,
//! where the JSON is the bound data arguments with object keys sorted at
//! every depth.

use crate::Result;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(operation: &str, args: &BTreeMap<String, Value>) -> Result<Self> {
        let args: Map<String, Value> = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let json = canonical_json(&Value::Object(args))?;

        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update(b"|");
        hasher.update(json.as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize `value` with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&canonicalize(value))?)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
