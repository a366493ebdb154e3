//! Response caching for idempotent read operations.
//!
//! A [`ResultCache`] wraps a read operation, keyed by the operation's name
//! and its data arguments, and memoizes its result in a shared
//! [`storage::KvStore`] for a TTL.
//!
//! Operations are described explicitly instead of being introspected:
//!
//! - an [`Operation`] names the call and declares its parameters (required,
//!   defaulted, or collaborators excluded from the key);
//! - [`Args`] carries the actual named arguments of one call;
//! - a [`Shape`] ([`One`], [`Many`], [`Raw`]) says how the result is stored
//!   and rebuilt from JSON.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cache::{Args, Operation, ResultCache};
//! use storage::MemoryStore;
//!
//! # async fn example() -> cache::Result<()> {
//! let cache = ResultCache::new(MemoryStore::new(), Duration::from_secs(60));
//! let op = Operation::new("books::titles").param("category");
//! let args = Args::new().with("category", "fiction");
//!
//! let titles: Vec<String> = cache
//!     .many(&op, &args, || async { Ok::<_, cache::Error>(vec!["Dune".to_string()]) })
//!     .await?;
//! assert_eq!(titles, ["Dune"]);
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
mod key;
mod operation;
mod shape;

pub use cache::ResultCache;
pub use error::{Error, Result};
pub use key::{CacheKey, canonical_json};
pub use operation::{ArgValue, Args, Operation};
pub use shape::{Many, One, Raw, ResultShape, Shape};
