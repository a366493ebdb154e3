//! Result shapes: how a computed result is stored and rebuilt.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Declared return shape of a cached operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// A single model.
    One,
    /// A sequence of models.
    Many,
    /// Any JSON value, returned as stored.
    Raw,
}

/// Describes how results of one shape are checked, stored, and rebuilt.
///
/// Stored payloads are always JSON arrays.
pub trait Shape {
    /// What the wrapped operation produces.
    type Computed;
    /// What the cache hands back.
    type Output;

    const KIND: ResultShape;

    /// `None` when the computed result is empty.
    fn found(computed: Self::Computed) -> Option<Self::Output>;

    /// Flatten into the stored list form.
    fn normalize(output: &Self::Output) -> Result<Vec<Value>>;

    /// Rebuild from a stored payload.
    fn rebuild(payload: Value) -> Result<Self::Output>;
}

/// A single model `T`. The operation returns `Option<T>`.
pub struct One<T>(PhantomData<fn() -> T>);

/// A list of models `T`. An empty list counts as not found.
pub struct Many<T>(PhantomData<fn() -> T>);

/// A plain JSON value. Falsy values (null, false, 0, "", [], {}) count as
/// not found.
pub struct Raw;

impl<T: Serialize + DeserializeOwned> Shape for One<T> {
    type Computed = Option<T>;
    type Output = T;

    const KIND: ResultShape = ResultShape::One;

    fn found(computed: Option<T>) -> Option<T> {
        computed
    }

    fn normalize(output: &T) -> Result<Vec<Value>> {
        Ok(vec![serde_json::to_value(output)?])
    }

    fn rebuild(payload: Value) -> Result<T> {
        let first = into_items(payload)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::CorruptEntry("empty payload for a single model".into()))?;
        Ok(serde_json::from_value(first)?)
    }
}

impl<T: Serialize + DeserializeOwned> Shape for Many<T> {
    type Computed = Vec<T>;
    type Output = Vec<T>;

    const KIND: ResultShape = ResultShape::Many;

    fn found(computed: Vec<T>) -> Option<Vec<T>> {
        (!computed.is_empty()).then_some(computed)
    }

    fn normalize(output: &Vec<T>) -> Result<Vec<Value>> {
        output
            .iter()
            .map(|item| serde_json::to_value(item).map_err(Error::from))
            .collect()
    }

    fn rebuild(payload: Value) -> Result<Vec<T>> {
        into_items(payload)?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect()
    }
}

impl Shape for Raw {
    type Computed = Value;
    type Output = Value;

    const KIND: ResultShape = ResultShape::Raw;

    fn found(computed: Value) -> Option<Value> {
        (!is_falsy(&computed)).then_some(computed)
    }

    fn normalize(output: &Value) -> Result<Vec<Value>> {
        Ok(match output {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
    }

    fn rebuild(payload: Value) -> Result<Value> {
        Ok(payload)
    }
}

fn into_items(payload: Value) -> Result<Vec<Value>> {
    match payload {
        Value::Array(items) => Ok(items),
        other => Err(Error::CorruptEntry(format!(
            "expected a JSON array, found {}",
            json_type(&other)
        ))),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
