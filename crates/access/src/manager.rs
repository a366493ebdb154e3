//! Policy registration and evaluation.

use crate::{Condition, Error, PolicySet, Resource, Result, Subject};
use std::fmt;

/// Editing a user's own profile.
pub const USER_EDIT: &str = "user:edit";

/// Editing any user by e-mail, including role changes.
pub const USER_ADMIN_EDIT: &str = "user:admin_edit";

/// Role that passes every default policy.
pub const ADMIN_ROLE: &str = "admin";

/// A policy predicate.
pub type Predicate = Box<dyn Fn(&Subject, &Resource) -> bool + Send + Sync>;

/// An `(action, predicate)` pair. Immutable once registered.
pub struct Policy {
    action: String,
    predicate: Predicate,
}

impl Policy {
    pub fn new(
        action: impl Into<String>,
        predicate: impl Fn(&Subject, &Resource) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            action: action.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn allows(&self, subject: &Subject, resource: &Resource) -> bool {
        (self.predicate)(subject, resource)
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Central authorization decision point.
///
/// Policies are scanned in registration order; the first matching policy
/// whose predicate returns true allows the action. No match denies.
#[derive(Debug, Default)]
pub struct AccessManager {
    policies: Vec<Policy>,
}

impl AccessManager {
    /// Create an empty manager (denies everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with the built-in user policies.
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        manager.register(USER_EDIT, |subject, resource| {
            let owner = matches!(
                (subject.get("id"), resource.get("owner_id")),
                (Some(id), Some(owner_id)) if id == owner_id
            );
            owner || subject.get_str("role") == Some(ADMIN_ROLE)
        });
        manager.register(USER_ADMIN_EDIT, |subject, _| {
            subject.get_str("role") == Some(ADMIN_ROLE)
        });
        manager
    }

    /// Append a policy. Several policies may share an action.
    pub fn register(
        &mut self,
        action: impl Into<String>,
        predicate: impl Fn(&Subject, &Resource) -> bool + Send + Sync + 'static,
    ) {
        self.policies.push(Policy::new(action, predicate));
    }

    /// Append a declarative condition as a policy.
    pub fn register_condition(&mut self, action: impl Into<String>, condition: Condition) {
        self.register(action, move |subject, resource| {
            condition.evaluate(subject, resource)
        });
    }

    /// Append every rule of a policy set, in file order.
    pub fn load_rules(&mut self, rules: PolicySet) -> Result<()> {
        rules.validate()?;
        for rule in rules.policies {
            self.register_condition(rule.action, rule.when);
        }
        Ok(())
    }

    /// Decide whether `subject` may perform `action` on `resource`.
    pub fn check(&self, action: &str, subject: &Subject, resource: &Resource) -> bool {
        let allowed = self
            .policies
            .iter()
            .filter(|p| p.action == action)
            .any(|p| p.allows(subject, resource));
        tracing::debug!(action, allowed, "access check");
        allowed
    }

    /// [`check`](Self::check) against an empty resource.
    pub fn check_default(&self, action: &str, subject: &Subject) -> bool {
        self.check(action, subject, &Resource::new())
    }

    /// Like [`check`](Self::check) but returns [`Error::Denied`] on denial.
    pub fn require(&self, action: &str, subject: &Subject, resource: &Resource) -> Result<()> {
        if self.check(action, subject, resource) {
            Ok(())
        } else {
            tracing::warn!(action, "access denied");
            Err(Error::Denied {
                action: action.to_string(),
            })
        }
    }

    /// Number of policies registered for `action`.
    pub fn policies_for(&self, action: &str) -> usize {
        self.policies.iter().filter(|p| p.action == action).count()
    }

    /// Distinct actions, in first-registration order.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = Vec::new();
        for policy in &self.policies {
            if !actions.contains(&policy.action()) {
                actions.push(policy.action());
            }
        }
        actions
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
