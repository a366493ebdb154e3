//! Storage backends for Biblioteca.
//!
//! This crate provides the two persistence surfaces the rest of the workspace
//! consumes:
//!
//! 1. **Key-value store**: the [`KvStore`] trait (async `get` / `set` with a
//!    TTL / `delete`) shared by the result cache and the session table.
//!    [`MemoryStore`] keeps entries in-process; [`SqliteStore`] persists them
//!    so separate processes share one cache.
//!
//! 2. **User repository**: [`UserStore`], a SQLite table of user records
//!    with a unique e-mail index.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use storage::{KvStore, MemoryStore, NewUser, UserStore};
//!
//! # async fn example() -> storage::Result<()> {
//! let cache = MemoryStore::new();
//! cache.set("greeting", "hello", Duration::from_secs(60)).await?;
//! assert_eq!(cache.get("greeting").await?.as_deref(), Some("hello"));
//!
//! let users = UserStore::open("users.db")?;
//! let user = users.add(&NewUser {
//!     first_name: "Ada".into(),
//!     last_name: "Lovelace".into(),
//!     email: "ada@example.com".into(),
//!     hashed_password: "...".into(),
//!     role: "user".into(),
//! })?;
//! println!("registered {}", user.id);
//! # Ok(())
//! # }
//! ```

mod error;
mod kv;
mod sqlite;
mod users;

pub use error::{Error, Result};
pub use kv::{KvStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use users::{NewUser, UserChanges, UserRecord, UserStore};
