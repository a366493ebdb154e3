//! Declarative rules loaded from TOML.

use crate::{Error, Resource, Result, Subject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which attribute map a condition reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Subject,
    Resource,
}

/// A small interpretable predicate over a subject and a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Always allows.
    Always,

    /// Subject `role` is one of the listed roles.
    Role { any_of: Vec<String> },

    /// Subject attribute equals resource attribute (both present).
    Owner {
        #[serde(default = "default_subject_key")]
        subject_key: String,
        #[serde(default = "default_resource_key")]
        resource_key: String,
    },

    /// A single attribute equals a literal.
    Equals { on: Side, key: String, value: Value },

    /// At least one nested condition holds.
    Any { of: Vec<Condition> },

    /// Every nested condition holds.
    All { of: Vec<Condition> },
}

fn default_subject_key() -> String {
    "id".to_string()
}

fn default_resource_key() -> String {
    "owner_id".to_string()
}

impl Condition {
    pub fn evaluate(&self, subject: &Subject, resource: &Resource) -> bool {
        match self {
            Condition::Always => true,
            Condition::Role { any_of } => subject
                .get_str("role")
                .is_some_and(|role| any_of.iter().any(|r| r == role)),
            Condition::Owner {
                subject_key,
                resource_key,
            } => matches!(
                (subject.get(subject_key), resource.get(resource_key)),
                (Some(a), Some(b)) if a == b
            ),
            Condition::Equals { on, key, value } => {
                let attrs = match on {
                    Side::Subject => subject,
                    Side::Resource => resource,
                };
                attrs.get(key) == Some(value)
            }
            Condition::Any { of } => of.iter().any(|c| c.evaluate(subject, resource)),
            Condition::All { of } => of.iter().all(|c| c.evaluate(subject, resource)),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Condition::Role { any_of } if any_of.is_empty() => {
                Err(Error::Invalid("role condition lists no roles".into()))
            }
            Condition::Any { of } | Condition::All { of } => {
                if of.is_empty() {
                    return Err(Error::Invalid("composite condition is empty".into()));
                }
                of.iter().try_for_each(Condition::validate)
            }
            _ => Ok(()),
        }
    }
}

/// One `[[policies]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: String,
    pub when: Condition,
}

/// A list of declarative rules, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    #[serde(default)]
    pub policies: Vec<Rule>,
}

impl PolicySet {
    /// Parse rules from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let set: Self = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        for rule in &self.policies {
            if rule.action.trim().is_empty() {
                return Err(Error::Invalid("rule has an empty action".into()));
            }
            rule.when.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
