//! Rule management service
//!
//! [`RuleService`] implements the operations the command surface exposes on
//! top of any [`RuleStore`]. It owns the authoritative view of the rules:
//! callers only ever hold snapshots returned by [`RuleService::list_rules`].
//!
//! Calls into the store are serialized by an internal mutex, so a service can
//! be shared (`Arc<RuleService<_>>`) between command handlers. The host store
//! may still be edited by other processes; `AlreadyExists` and `NotFound`
//! coming back from the store are handled as ordinary outcomes.

use crate::core::direction::DirectionChange;
use crate::core::error::{Error, Result, StoreError};
use crate::core::identity::{self, PathCheck};
use crate::core::rule::{Direction, DirectionChoice, Rule};
use crate::core::store::RuleStore;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Which rules `list_rules` returns
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListScope {
    /// Only rules created by this tool (name prefix)
    #[default]
    Owned,
    /// Every rule in the host store
    All,
}

/// What `create` does when the rule it would create already exists
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Report success without touching the store
    #[default]
    Idempotent,
    /// Fail with `AlreadyExists`
    Reject,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    pub scope: ListScope,
    pub duplicates: DuplicatePolicy,
    pub path_check: PathCheck,
}

pub struct RuleService<S: RuleStore> {
    store: Mutex<S>,
    options: ServiceOptions,
}

impl<S: RuleStore> RuleService<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, ServiceOptions::default())
    }

    pub fn with_options(store: S, options: ServiceOptions) -> Self {
        Self {
            store: Mutex::new(store),
            options,
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| Error::Internal("rule store lock poisoned".to_string()))
    }

    /// Rules in scope, sorted by application path (case-insensitive), then
    /// direction (outbound first), then name
    pub fn list_rules(&self) -> Result<Vec<Rule>> {
        let store = self.lock()?;
        let mut rules = store.list_rules().map_err(|e| {
            warn!("Listing rules from {} store failed: {e}", store.backend_name());
            Error::from(e)
        })?;
        drop(store);

        if self.options.scope == ListScope::Owned {
            rules.retain(|r| identity::is_owned(&r.name));
        }
        rules.sort_by_cached_key(|r| (r.app_name.to_lowercase(), r.direction, r.name.clone()));
        Ok(rules)
    }

    /// Builds the default rule `create` would insert
    pub fn default_rule(app_path: &str, direction: Direction) -> Rule {
        Rule::blocking(app_path, direction)
    }

    /// Blocks an application in the requested direction(s)
    ///
    /// "Both" creates the outbound rule first, then the inbound one. The
    /// first failure stops the composite; a rule already created for the
    /// other direction is kept.
    ///
    /// Returns the names of the rules that now block the application.
    ///
    /// # Errors
    ///
    /// `InvalidPath` before any store call, `AlreadyExists` under
    /// [`DuplicatePolicy::Reject`], or the translated store failure.
    pub fn create(&self, app_path: &str, choice: DirectionChoice) -> Result<Vec<String>> {
        identity::validate_app_path(app_path, self.options.path_check)?;

        let mut store = self.lock()?;
        let mut names = Vec::with_capacity(choice.directions().len());
        for &direction in choice.directions() {
            names.push(self.create_one(&mut *store, app_path, direction)?);
        }
        Ok(names)
    }

    /// Single-direction create, the shape of the `create_rule` command
    pub fn create_rule(&self, app_path: &str, is_out: bool) -> Result<String> {
        let direction = Direction::from_is_out(is_out);
        let mut names = self.create(app_path, direction.into())?;
        names
            .pop()
            .ok_or_else(|| Error::Internal("create returned no rule name".to_string()))
    }

    fn create_one(&self, store: &mut S, app_path: &str, direction: Direction) -> Result<String> {
        let rule = Self::default_rule(app_path, direction);
        rule.validate()?;

        if store.find_rule(&rule.name)?.is_some() {
            return match self.options.duplicates {
                DuplicatePolicy::Idempotent => {
                    debug!("Rule '{}' already exists, nothing to do", rule.name);
                    Ok(rule.name)
                }
                DuplicatePolicy::Reject => Err(Error::AlreadyExists(rule.name)),
            };
        }

        match store.insert_rule(&rule) {
            Ok(()) => {
                info!(
                    "Created {} rule '{}' in {} store",
                    direction.label(),
                    rule.name,
                    store.backend_name()
                );
                Ok(rule.name)
            }
            // Created concurrently by someone else between lookup and insert
            Err(StoreError::AlreadyExists(_))
                if self.options.duplicates == DuplicatePolicy::Idempotent =>
            {
                debug!("Rule '{}' appeared concurrently", rule.name);
                Ok(rule.name)
            }
            Err(e) => {
                warn!("Creating rule '{}' failed: {e}", rule.name);
                Err(e.into())
            }
        }
    }

    /// Deletes a rule by name
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut store = self.lock()?;
        store.remove_rule(name).map_err(|e| {
            warn!("Deleting rule '{name}' failed: {e}");
            Error::from(e)
        })?;
        info!("Deleted rule '{name}'");
        Ok(())
    }

    /// Enables a rule; enabling an enabled rule is a no-op
    pub fn enable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    /// Disables a rule; disabling a disabled rule is a no-op
    pub fn disable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut store = self.lock()?;
        store.set_enabled(name, enabled).map_err(|e| {
            warn!("Setting enabled={enabled} on rule '{name}' failed: {e}");
            Error::from(e)
        })?;
        info!(
            "{} rule '{name}'",
            if enabled { "Enabled" } else { "Disabled" }
        );
        Ok(())
    }

    /// Flips a rule to the opposite direction, restoring it if the
    /// replacement cannot be created. Returns the replacement's name.
    pub fn change_direction(&self, name: &str) -> Result<String> {
        let mut store = self.lock()?;
        let original = store
            .find_rule(name)?
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        DirectionChange::new(original).run(&mut *store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::MemoryStore;
    use crate::core::store::StoreOp;
    use crate::core::test_helpers::{FOO_EXE, lexical_service};

    #[test]
    fn test_create_outbound_scenario() {
        let (service, _store) = lexical_service();
        service.create(FOO_EXE, DirectionChoice::Outbound).unwrap();

        let rules = service.list_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].app_name, FOO_EXE);
        assert_eq!(rules[0].direction, Direction::Out);
        assert!(rules[0].enabled);
    }

    #[test]
    fn test_create_both_makes_two_rules() {
        let (service, _store) = lexical_service();
        let names = service.create(FOO_EXE, DirectionChoice::Both).unwrap();
        assert_eq!(names.len(), 2);

        let rules = service.list_rules().unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.app_name == FOO_EXE));
        assert_eq!(rules[0].direction, Direction::Out);
        assert_eq!(rules[1].direction, Direction::In);
    }

    #[test]
    fn test_create_is_idempotent_by_default() {
        let (service, store) = lexical_service();
        service.create_rule(FOO_EXE, true).unwrap();
        service.create_rule(FOO_EXE, true).unwrap();

        assert_eq!(service.list_rules().unwrap().len(), 1);
        assert_eq!(store.call_count(StoreOp::Insert), 1);
    }

    #[test]
    fn test_create_rejects_duplicates_when_configured() {
        let store = MemoryStore::new();
        let service = RuleService::with_options(
            store,
            ServiceOptions {
                duplicates: DuplicatePolicy::Reject,
                path_check: PathCheck::Lexical,
                ..ServiceOptions::default()
            },
        );
        service.create_rule(FOO_EXE, false).unwrap();
        assert!(matches!(
            service.create_rule(FOO_EXE, false),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_concurrent_external_create_is_success() {
        let (service, store) = lexical_service();
        // Another process inserts between our lookup and our insert
        store.inject_failure(
            StoreOp::Insert,
            StoreError::AlreadyExists(crate::core::identity::rule_name(FOO_EXE, Direction::Out)),
        );
        assert!(service.create_rule(FOO_EXE, true).is_ok());
    }

    #[test]
    fn test_invalid_path_never_reaches_store() {
        let (service, store) = lexical_service();
        let err = service.create_rule(r"Apps\foo.exe", true).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        assert_eq!(store.call_count(StoreOp::Insert), 0);
        assert_eq!(store.call_count(StoreOp::List), 0);
    }

    #[test]
    fn test_both_stops_at_first_failure() {
        let (service, store) = lexical_service();
        store.inject_failure(StoreOp::Insert, StoreError::PermissionDenied);

        let err = service.create(FOO_EXE, DirectionChoice::Both).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_unknown_leaves_list_unchanged() {
        let (service, _store) = lexical_service();
        service.create_rule(FOO_EXE, true).unwrap();
        let before = service.list_rules().unwrap();

        let err = service.remove("NetBlockerRule_Outbound_C:\\nope.exe").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(service.list_rules().unwrap(), before);
    }

    #[test]
    fn test_enable_disable_idempotent() {
        let (service, _store) = lexical_service();
        let name = service.create_rule(FOO_EXE, true).unwrap();

        service.disable(&name).unwrap();
        service.disable(&name).unwrap();
        assert!(!service.list_rules().unwrap()[0].enabled);

        service.enable(&name).unwrap();
        service.enable(&name).unwrap();
        assert!(service.list_rules().unwrap()[0].enabled);
    }

    #[test]
    fn test_scope_filters_foreign_rules() {
        let mut foreign = Rule::blocking("/usr/sbin/sshd", Direction::In);
        foreign.name = "OpenSSH Server (sshd)".to_string();
        let store = MemoryStore::with_rules([foreign]);

        let owned = RuleService::with_options(
            store.clone(),
            ServiceOptions {
                path_check: PathCheck::Lexical,
                ..ServiceOptions::default()
            },
        );
        assert!(owned.list_rules().unwrap().is_empty());

        let all = RuleService::with_options(
            store,
            ServiceOptions {
                scope: ListScope::All,
                path_check: PathCheck::Lexical,
                ..ServiceOptions::default()
            },
        );
        assert_eq!(all.list_rules().unwrap().len(), 1);
    }

    #[test]
    fn test_list_sorted_case_insensitively() {
        let (service, _store) = lexical_service();
        service.create_rule("/opt/Zeta", true).unwrap();
        service.create_rule("/opt/alpha", false).unwrap();
        service.create_rule("/opt/alpha", true).unwrap();
        service.create_rule("/opt/Beta", true).unwrap();

        let rules = service.list_rules().unwrap();
        let order: Vec<_> = rules
            .iter()
            .map(|r| (r.app_name.as_str(), r.direction))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/opt/alpha", Direction::Out),
                ("/opt/alpha", Direction::In),
                ("/opt/Beta", Direction::Out),
                ("/opt/Zeta", Direction::Out),
            ]
        );
    }

    #[test]
    fn test_change_direction_unknown_rule() {
        let (service, _store) = lexical_service();
        assert!(matches!(
            service.change_direction("NetBlockerRule_Outbound_/x"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_change_direction_flips() {
        let (service, _store) = lexical_service();
        let name = service.create_rule(FOO_EXE, true).unwrap();
        let new_name = service.change_direction(&name).unwrap();

        let rules = service.list_rules().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, new_name);
        assert_eq!(rules[0].direction, Direction::In);
    }

    #[test]
    fn test_permission_denied_on_every_mutation() {
        let (service, store) = lexical_service();
        let name = service.create_rule(FOO_EXE, true).unwrap();
        store.deny_writes(true);

        assert!(matches!(service.create_rule("/bin/other", true), Err(Error::PermissionDenied)));
        assert!(matches!(service.remove(&name), Err(Error::PermissionDenied)));
        assert!(matches!(service.enable(&name), Err(Error::PermissionDenied)));
        assert!(matches!(service.disable(&name), Err(Error::PermissionDenied)));
        assert!(matches!(service.change_direction(&name), Err(Error::PermissionDenied)));
    }
}
