//! Attribute maps describing who is acting and on what.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed bag of JSON attributes.
///
/// Subjects and resources are both plain attribute maps, built per request
/// and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

/// The entity attempting an action (e.g. `id`, `role`).
pub type Subject = Attributes;

/// The target of an action (e.g. `owner_id`).
pub type Resource = Attributes;

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` pair.
    ///
    /// The value is read as JSON when it parses (`1`, `true`, `"x"`), and
    /// as a bare string otherwise.
    pub fn parse_pair(pair: &str) -> Result<(String, Value)> {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(Error::Invalid(format!("expected key=value, got '{pair}'")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Invalid(format!("empty attribute name in '{pair}'")));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok((key.to_string(), value))
    }

    /// Build attributes from a list of `key=value` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        pairs
            .into_iter()
            .map(Self::parse_pair)
            .collect::<Result<Vec<_>>>()
            .map(|entries| entries.into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pair_reads_json_values() {
        assert_eq!(Attributes::parse_pair("id=1").unwrap(), ("id".into(), json!(1)));
        assert_eq!(
            Attributes::parse_pair("active=true").unwrap(),
            ("active".into(), json!(true))
        );
        assert_eq!(
            Attributes::parse_pair("role=admin").unwrap(),
            ("role".into(), json!("admin"))
        );
    }

    #[test]
    fn test_parse_pair_rejects_missing_separator() {
        assert!(Attributes::parse_pair("role").is_err());
        assert!(Attributes::parse_pair("=admin").is_err());
    }

    #[test]
    fn test_from_pairs() {
        let attrs = Attributes::from_pairs(["id=2", "role=user"]).unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("id"), Some(&json!(2)));
        assert_eq!(attrs.get_str("role"), Some("user"));
    }
}
