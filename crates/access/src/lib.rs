//! Attribute-based access control.
//!
//! Core principle: **every write is gated by an explicit policy decision.**
//!
//! An [`AccessManager`] holds an ordered list of `(action, predicate)`
//! policies. [`AccessManager::check`] allows an action when any policy
//! registered for it accepts the `(subject, resource)` pair, and denies
//! otherwise. Predicates are arbitrary closures, or declarative
//! [`Condition`]s loaded from TOML.
//!
//! # Example
//!
//! ```
//! use access::{AccessManager, Resource, Subject, USER_EDIT};
//!
//! let manager = AccessManager::with_defaults();
//! let subject = Subject::new().with("id", 1).with("role", "user");
//!
//! assert!(manager.check(USER_EDIT, &subject, &Resource::new().with("owner_id", 1)));
//! assert!(!manager.check(USER_EDIT, &subject, &Resource::new().with("owner_id", 2)));
//! ```

mod attributes;
mod condition;
mod error;
mod manager;

pub use attributes::{Attributes, Resource, Subject};
pub use condition::{Condition, PolicySet, Rule, Side};
pub use error::{Error, Result};
pub use manager::{ADMIN_ROLE, AccessManager, Policy, Predicate, USER_ADMIN_EDIT, USER_EDIT};
