//! Policy store boundary
//!
//! [`RuleStore`] is the seam between rule management and the host firewall
//! policy database. The service only ever talks to this trait, so the
//! Windows adapter, the portable JSON store and the in-memory fake are
//! interchangeable.
//!
//! Implementations must report:
//! - [`StoreError::AlreadyExists`] when inserting a name that is present
//! - [`StoreError::NotFound`] when removing or toggling an absent name
//! - [`StoreError::PermissionDenied`] when the host refuses the change
//!
//! even if the underlying host would silently accept the call.

use crate::core::error::StoreError;
use crate::core::rule::Rule;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations a store exposes, used for logging and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum StoreOp {
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "insert")]
    Insert,
    #[strum(serialize = "remove")]
    Remove,
    #[strum(serialize = "set_enabled")]
    SetEnabled,
}

/// Host firewall policy store
pub trait RuleStore: Send {
    /// Snapshot of every rule currently in the store
    fn list_rules(&self) -> StoreResult<Vec<Rule>>;

    /// Adds a rule; its name must not exist yet
    fn insert_rule(&mut self, rule: &Rule) -> StoreResult<()>;

    /// Deletes the rule with this name
    fn remove_rule(&mut self, name: &str) -> StoreResult<()>;

    /// Sets the enabled flag of the rule with this name
    fn set_enabled(&mut self, name: &str, enabled: bool) -> StoreResult<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Looks a rule up by name
    fn find_rule(&self, name: &str) -> StoreResult<Option<Rule>> {
        Ok(self.list_rules()?.into_iter().find(|r| r.name == name))
    }
}

impl<T: RuleStore + ?Sized> RuleStore for Box<T> {
    fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        (**self).list_rules()
    }

    fn insert_rule(&mut self, rule: &Rule) -> StoreResult<()> {
        (**self).insert_rule(rule)
    }

    fn remove_rule(&mut self, name: &str) -> StoreResult<()> {
        (**self).remove_rule(name)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> StoreResult<()> {
        (**self).set_enabled(name, enabled)
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn find_rule(&self, name: &str) -> StoreResult<Option<Rule>> {
        (**self).find_rule(name)
    }
}
