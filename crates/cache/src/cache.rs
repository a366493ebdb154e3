//! The memoizing wrapper.

use crate::{Args, CacheKey, Error, Many, One, Operation, Raw, Result, Shape};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use storage::KvStore;

/// Memoizes read operations in a shared [`KvStore`].
///
/// On a hit the stored JSON is rebuilt into the declared shape and the
/// operation is not invoked. On a miss the operation runs, an empty result
/// fails with [`Error::NotFound`], and a non-empty result is stored for the
/// TTL. There is no in-process memo and no locking: concurrent misses on the
/// same key both compute and both write the same value.
///
/// Store failures propagate; the operation is never run as a fallback.
pub struct ResultCache<S> {
    store: S,
    ttl: Duration,
}

impl<S: KvStore> ResultCache<S> {
    /// Create a cache whose entries live for `ttl` unless an operation
    /// overrides it.
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The key a call with these arguments reads and writes.
    pub fn key(&self, operation: &Operation, args: &Args) -> Result<CacheKey> {
        let bound = operation.bind(args)?;
        CacheKey::derive(operation.name(), &bound)
    }

    /// Serve `operation(args)` from the store, or run `op` and store its result.
    ///
    /// `E` is the operation's own error type; cache errors convert into it.
    pub async fn call<Sh, F, Fut, E>(
        &self,
        operation: &Operation,
        args: &Args,
        op: F,
    ) -> std::result::Result<Sh::Output, E>
    where
        Sh: Shape,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Sh::Computed, E>>,
        E: From<Error>,
    {
        let key = self.key(operation, args)?;

        let cached = self.store.get(key.as_str()).await.map_err(Error::from)?;
        if let Some(payload) = cached.filter(|p| !p.is_empty()) {
            tracing::debug!(operation = operation.name(), %key, shape = ?Sh::KIND, "cache hit");
            let payload: Value = serde_json::from_str(&payload).map_err(Error::from)?;
            return Ok(Sh::rebuild(payload)?);
        }

        tracing::debug!(operation = operation.name(), %key, "cache miss");
        let Some(output) = Sh::found(op().await?) else {
            return Err(Error::NotFound {
                operation: operation.name().to_string(),
            }
            .into());
        };

        let payload = serde_json::to_string(&Sh::normalize(&output)?).map_err(Error::from)?;
        let ttl = operation.ttl_override().unwrap_or(self.ttl);
        self.store
            .set(key.as_str(), &payload, ttl)
            .await
            .map_err(Error::from)?;
        tracing::debug!(operation = operation.name(), %key, ttl_secs = ttl.as_secs(), "cached result");

        Ok(output)
    }

    /// [`call`](Self::call) for an operation returning a single model.
    pub async fn one<T, F, Fut, E>(
        &self,
        operation: &Operation,
        args: &Args,
        op: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<Error>,
    {
        self.call::<One<T>, F, Fut, E>(operation, args, op).await
    }

    /// [`call`](Self::call) for an operation returning a list of models.
    pub async fn many<T, F, Fut, E>(
        &self,
        operation: &Operation,
        args: &Args,
        op: F,
    ) -> std::result::Result<Vec<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<T>, E>>,
        E: From<Error>,
    {
        self.call::<Many<T>, F, Fut, E>(operation, args, op).await
    }

    /// [`call`](Self::call) for an operation returning plain JSON.
    ///
    /// A hit returns the stored list form, so a non-list result comes back
    /// wrapped in a one-element array.
    pub async fn raw<F, Fut, E>(
        &self,
        operation: &Operation,
        args: &Args,
        op: F,
    ) -> std::result::Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Value, E>>,
        E: From<Error>,
    {
        self.call::<Raw, F, Fut, E>(operation, args, op).await
    }
}
