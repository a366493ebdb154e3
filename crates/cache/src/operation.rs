//! Cached operation descriptors and argument binding.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum ParamKind {
    Required,
    Default(Value),
    /// An injected handle (database, client). Never part of the key.
    Collaborator,
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    kind: ParamKind,
}

/// The identity and parameter list of a cacheable read operation.
///
/// ```
/// use cache::Operation;
/// use std::time::Duration;
///
/// let list_books = Operation::new("books::list")
///     .collaborator("db")
///     .param("category")
///     .param_or("page", 1)
///     .ttl(Duration::from_secs(10));
/// assert_eq!(list_books.name(), "books::list");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    name: String,
    params: Vec<Param>,
    ttl: Option<Duration>,
}

impl Operation {
    /// `name` should be fully qualified (`module::function`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ttl: None,
        }
    }

    /// Declare a required parameter.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.declare(name, ParamKind::Required)
    }

    /// Declare a parameter with a default, applied when the call omits it.
    pub fn param_or(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.declare(name, ParamKind::Default(default.into()))
    }

    /// Declare a collaborator parameter that is excluded from the key.
    pub fn collaborator(self, name: impl Into<String>) -> Self {
        self.declare(name, ParamKind::Collaborator)
    }

    /// Override the cache-wide TTL for this operation.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn declare(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        let name = name.into();
        self.params.retain(|p| p.name != name);
        self.params.push(Param { name, kind });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl_override(&self) -> Option<Duration> {
        self.ttl
    }

    /// Bind call arguments to the declared parameters, applying defaults and
    /// keeping only data values.
    pub fn bind(&self, args: &Args) -> Result<BTreeMap<String, Value>> {
        if let Some(name) = args
            .values
            .keys()
            .find(|name| !self.params.iter().any(|p| &p.name == *name))
        {
            return Err(Error::UnexpectedArgument {
                operation: self.name.clone(),
                name: name.clone(),
            });
        }

        let mut bound = BTreeMap::new();
        for param in &self.params {
            let value = match (&param.kind, args.values.get(&param.name)) {
                (ParamKind::Collaborator, _) => continue,
                (_, Some(ArgValue::Opaque(_))) => continue,
                (_, Some(ArgValue::Data(value))) => value.clone(),
                (ParamKind::Default(default), None) => default.clone(),
                (ParamKind::Required, None) => {
                    return Err(Error::MissingArgument {
                        operation: self.name.clone(),
                        name: param.name.clone(),
                    });
                }
            };
            bound.insert(param.name.clone(), value);
        }
        Ok(bound)
    }
}

/// A single call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A JSON-shaped value that contributes to the key.
    Data(Value),
    /// A non-data value; only its type name is recorded.
    Opaque(&'static str),
}

/// Named arguments for one call. Order of insertion is irrelevant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, ArgValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), ArgValue::Data(value.into()));
        self
    }

    /// Add any serializable value as data.
    pub fn with_serialized(mut self, name: impl Into<String>, value: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(value)?;
        self.values.insert(name.into(), ArgValue::Data(value));
        Ok(self)
    }

    /// Add a collaborator such as a store handle.
    pub fn with_opaque<T: ?Sized>(mut self, name: impl Into<String>, _value: &T) -> Self {
        self.values
            .insert(name.into(), ArgValue::Opaque(std::any::type_name::<T>()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_books() -> Operation {
        Operation::new("books::list")
            .collaborator("db")
            .param("category")
            .param_or("page", 1)
    }

    #[test]
    fn test_bind_applies_defaults() {
        let bound = list_books()
            .bind(&Args::new().with("category", "fiction"))
            .unwrap();
        assert_eq!(bound.get("category"), Some(&json!("fiction")));
        assert_eq!(bound.get("page"), Some(&json!(1)));
        assert!(!bound.contains_key("db"));
    }

    #[test]
    fn test_bind_drops_opaque_values() {
        struct Pool;
        let bound = Operation::new("books::get")
            .param("id")
            .param("conn")
            .bind(&Args::new().with("id", 7).with_opaque("conn", &Pool))
            .unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound.get("id"), Some(&json!(7)));
    }

    #[test]
    fn test_bind_ignores_data_for_collaborators() {
        let bound = list_books()
            .bind(&Args::new().with("category", "fiction").with("db", "mongodb://x"))
            .unwrap();
        assert!(!bound.contains_key("db"));
    }

    #[test]
    fn test_bind_missing_required() {
        let err = list_books().bind(&Args::new()).unwrap_err();
        assert!(matches!(err, Error::MissingArgument { name, .. } if name == "category"));
    }

    #[test]
    fn test_bind_unexpected_argument() {
        let err = list_books()
            .bind(&Args::new().with("category", "fiction").with("author", "x"))
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedArgument { name, .. } if name == "author"));
    }

    #[test]
    fn test_redeclaring_param_replaces_it() {
        let op = Operation::new("books::list").param("page").param_or("page", 3);
        let bound = op.bind(&Args::new()).unwrap();
        assert_eq!(bound.get("page"), Some(&json!(3)));
    }

    #[test]
    fn test_with_serialized() {
        #[derive(Serialize)]
        struct Range {
            from: &'static str,
            to: &'static str,
        }
        let args = Args::new()
            .with_serialized("range", &Range { from: "2025-06-19", to: "2025-06-29" })
            .unwrap();
        assert_eq!(
            args.get("range"),
            Some(&ArgValue::Data(json!({"from": "2025-06-19", "to": "2025-06-29"})))
        );
    }
}
