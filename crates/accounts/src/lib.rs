//! Biblioteca accounts: registration, sessions and profile management.
//!
//! [`AccountService`] ties the workspace together:
//!
//! - users live in a [`storage::UserStore`];
//! - session tokens are opaque UUIDs whose [`Claims`] are kept in a
//!   [`storage::KvStore`] with the token lifetime as TTL;
//! - every write resolves the caller to an ABAC subject (`id`, `role`) and
//!   asks the [`access::AccessManager`] first;
//! - profile reads are memoized by a [`cache::ResultCache`] sharing the same
//!   key-value store.
//!
//! Every error maps to an HTTP-equivalent status via [`Error::status_code`].

mod error;
mod model;
mod password;
mod service;
mod sessions;

pub use error::{Error, Result};
pub use model::{
    AdminUpdate, Claims, LoginRequest, ProfileUpdate, RegisterRequest, Role, Session, UserProfile,
};
pub use password::{PasswordHasher, SaltedSha256};
pub use service::{AccountService, AccountSettings};
pub use sessions::SessionStore;
