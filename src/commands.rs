//! Command surface
//!
//! The presentation layer talks to the backend through five named commands.
//! Their argument names and return shapes are the wire contract:
//!
//! | Command        | Arguments                     | Returns                 |
//! |----------------|-------------------------------|-------------------------|
//! | `get_rules`    | none                          | `Vec<Rule>`             |
//! | `create_rule`  | `path: String, is_out: bool`  | `""` or error token     |
//! | `delete_rule`  | `rule_name: String`           | `""` or error token     |
//! | `enable_rule`  | `rule_name: String`           | `""` or error token     |
//! | `disable_rule` | `rule_name: String`           | `""` or error token     |
//!
//! This is the only place structured errors are flattened into tokens (see
//! [`crate::core::translate`]). Each command also has a `try_` form returning
//! the structured [`Error`] for callers that render their own messages, such
//! as the CLI. Store calls are blocking, so each command runs its service
//! call on the blocking thread pool.
//!
//! The caller keeps a [`RuleSnapshot`]: a cached copy of `get_rules` that is
//! replaced after every mutation, never patched optimistically.

use crate::audit::{AuditEvent, AuditLog, EventType};
use crate::core::error::{Error, Result};
use crate::core::rule::{DirectionChoice, Rule};
use crate::core::service::RuleService;
use crate::core::store::RuleStore;
use crate::core::translate::ErrorToken;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

pub struct CommandSurface<S: RuleStore + 'static> {
    service: Arc<RuleService<S>>,
    audit: Option<AuditLog>,
}

impl<S: RuleStore + 'static> CommandSurface<S> {
    pub fn new(service: RuleService<S>) -> Self {
        Self {
            service: Arc::new(service),
            audit: None,
        }
    }

    /// Records every mutating command in `audit`
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn service(&self) -> &RuleService<S> {
        &self.service
    }

    async fn call<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RuleService<S>) -> Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || op(&service))
            .await
            .map_err(|e| Error::Internal(format!("command task failed: {e}")))?
    }

    async fn audited<T>(
        &self,
        event_type: EventType,
        details: serde_json::Value,
        result: Result<T>,
    ) -> Result<T> {
        if let Some(audit) = &self.audit {
            let token = ErrorToken::from_result(&result);
            audit
                .record(AuditEvent::from_token(event_type, details, &token))
                .await;
        }
        result
    }

    /// All rules in scope
    pub async fn list_rules(&self) -> Result<Vec<Rule>> {
        self.call(RuleService::list_rules).await
    }

    /// All rules in scope; empty if the store cannot be read
    pub async fn get_rules(&self) -> Vec<Rule> {
        match self.list_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                error!("get_rules failed: {e}");
                Vec::new()
            }
        }
    }

    pub async fn try_create_rule(&self, path: String, is_out: bool) -> Result<String> {
        let details = serde_json::json!({ "path": path, "is_out": is_out });
        let result = self
            .call(move |service| service.create_rule(&path, is_out))
            .await;
        self.audited(EventType::CreateRule, details, result).await
    }

    pub async fn create_rule(&self, path: String, is_out: bool) -> String {
        ErrorToken::from_result(&self.try_create_rule(path, is_out).await)
    }

    /// Blocks an application in one or both directions in a single call
    pub async fn try_create_rules(
        &self,
        path: String,
        direction: DirectionChoice,
    ) -> Result<Vec<String>> {
        let details = serde_json::json!({ "path": path, "direction": direction });
        let result = self
            .call(move |service| service.create(&path, direction))
            .await;
        self.audited(EventType::CreateRule, details, result).await
    }

    pub async fn create_rules(&self, path: String, direction: DirectionChoice) -> String {
        ErrorToken::from_result(&self.try_create_rules(path, direction).await)
    }

    pub async fn try_delete_rule(&self, rule_name: String) -> Result<()> {
        let details = serde_json::json!({ "rule_name": rule_name });
        let result = self.call(move |service| service.remove(&rule_name)).await;
        self.audited(EventType::DeleteRule, details, result).await
    }

    pub async fn delete_rule(&self, rule_name: String) -> String {
        ErrorToken::from_result(&self.try_delete_rule(rule_name).await)
    }

    pub async fn try_enable_rule(&self, rule_name: String) -> Result<()> {
        let details = serde_json::json!({ "rule_name": rule_name });
        let result = self.call(move |service| service.enable(&rule_name)).await;
        self.audited(EventType::EnableRule, details, result).await
    }

    pub async fn enable_rule(&self, rule_name: String) -> String {
        ErrorToken::from_result(&self.try_enable_rule(rule_name).await)
    }

    pub async fn try_disable_rule(&self, rule_name: String) -> Result<()> {
        let details = serde_json::json!({ "rule_name": rule_name });
        let result = self.call(move |service| service.disable(&rule_name)).await;
        self.audited(EventType::DisableRule, details, result).await
    }

    pub async fn disable_rule(&self, rule_name: String) -> String {
        ErrorToken::from_result(&self.try_disable_rule(rule_name).await)
    }

    /// Flips a rule's direction with compensating restore on failure.
    /// Returns the replacement rule's name.
    pub async fn try_toggle_rule_direction(&self, rule_name: String) -> Result<String> {
        let details = serde_json::json!({ "rule_name": rule_name });
        let result = self
            .call(move |service| service.change_direction(&rule_name))
            .await;
        self.audited(EventType::ChangeDirection, details, result).await
    }

    pub async fn toggle_rule_direction(&self, rule_name: String) -> String {
        ErrorToken::from_result(&self.try_toggle_rule_direction(rule_name).await)
    }
}

/// Caller-side cache of the rule list
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: Vec<Rule>,
}

impl RuleSnapshot {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Replaces the cache with a fresh `get_rules`
    pub async fn refresh<S: RuleStore + 'static>(&mut self, surface: &CommandSurface<S>) {
        self.rules = surface.get_rules().await;
    }

    /// Runs a mutating command, then refreshes whether or not it succeeded.
    /// Returns the command's token.
    pub async fn run<'a, S, F, Fut>(&mut self, surface: &'a CommandSurface<S>, op: F) -> String
    where
        S: RuleStore + 'static,
        F: FnOnce(&'a CommandSurface<S>) -> Fut,
        Fut: Future<Output = String>,
    {
        let token = op(surface).await;
        self.refresh(surface).await;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::memory::MemoryStore;
    use crate::core::rule::Direction;
    use crate::core::store::StoreOp;
    use crate::core::test_helpers::{FOO_EXE, lexical_service};

    fn surface() -> (CommandSurface<MemoryStore>, MemoryStore) {
        let (service, store) = lexical_service();
        (CommandSurface::new(service), store)
    }

    #[tokio::test]
    async fn test_success_is_empty_string() {
        let (surface, _store) = surface();
        assert_eq!(surface.create_rule(FOO_EXE.to_string(), true).await, "");

        let rules = surface.get_rules().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].direction, Direction::Out);

        let name = rules[0].name.clone();
        assert_eq!(surface.disable_rule(name.clone()).await, "");
        assert_eq!(surface.enable_rule(name.clone()).await, "");
        assert_eq!(surface.delete_rule(name).await, "");
        assert!(surface.get_rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_access_denied_token() {
        let (surface, store) = surface();
        store.deny_writes(true);
        assert_eq!(
            surface.create_rule(FOO_EXE.to_string(), false).await,
            "0x80070005"
        );
    }

    #[tokio::test]
    async fn test_get_rules_failure_is_empty() {
        let (surface, store) = surface();
        surface.create_rule(FOO_EXE.to_string(), true).await;
        store.inject_failure(StoreOp::List, StoreError::PermissionDenied);
        assert!(surface.get_rules().await.is_empty());
        assert_eq!(surface.get_rules().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_refreshes_after_failure() {
        let (surface, store) = surface();
        let mut snapshot = RuleSnapshot::default();

        let token = snapshot
            .run(&surface, |s| s.create_rules(FOO_EXE.to_string(), DirectionChoice::Both))
            .await;
        assert_eq!(token, "");
        assert_eq!(snapshot.rules().len(), 2);

        // Another process removes a rule; our failed toggle still resyncs
        let mut other_process = store.clone();
        let outbound = crate::core::identity::rule_name(FOO_EXE, Direction::Out);
        other_process.remove_rule(&outbound).unwrap();
        assert!(snapshot.find(&outbound).is_some());

        let token = snapshot
            .run(&surface, |s| s.disable_rule(outbound.clone()))
            .await;
        assert!(!token.is_empty());
        assert!(snapshot.find(&outbound).is_none());
        assert_eq!(snapshot.rules().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_direction_command() {
        let (surface, _store) = surface();
        surface.create_rule(FOO_EXE.to_string(), true).await;
        let name = surface.get_rules().await[0].name.clone();

        assert_eq!(surface.toggle_rule_direction(name).await, "");
        let rules = surface.get_rules().await;
        assert_eq!(rules[0].direction, Direction::In);
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::at(dir.path().join("audit.log"));
        let (surface, _store) = surface();
        let surface = surface.with_audit(audit.clone());

        surface.create_rule(FOO_EXE.to_string(), true).await;
        surface.delete_rule("NetBlockerRule_Outbound_missing".to_string()).await;

        let events = audit.read_recent(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::DeleteRule);
        assert!(!events[0].success);
        assert!(events[0].error.is_some());
        assert_eq!(events[1].event_type, EventType::CreateRule);
        assert!(events[1].success);
    }
}
