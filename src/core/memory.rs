//! In-memory policy store
//!
//! Stands in for the host policy database in tests and in `--backend memory`
//! runs. Clones share the same underlying state, so one handle can be given
//! to the service while another plays a second process editing the store.
//!
//! Failures can be injected per operation ([`MemoryStore::inject_failure`])
//! or for all mutating calls ([`MemoryStore::deny_writes`]).

use crate::core::error::StoreError;
use crate::core::rule::Rule;
use crate::core::store::{RuleStore, StoreOp, StoreResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    /// Insertion order is preserved
    rules: Vec<Rule>,
    injected: HashMap<StoreOp, VecDeque<StoreError>>,
    deny_writes: bool,
    calls: HashMap<StoreOp, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with rules, in the given order
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.rules.extend(rules);
        }
        store
    }

    /// Queues a one-shot failure for the next call of `op`
    pub fn inject_failure(&self, op: StoreOp, error: StoreError) {
        if let Ok(mut state) = self.state.lock() {
            state.injected.entry(op).or_default().push_back(error);
        }
    }

    /// Makes every insert/remove/set_enabled fail with `PermissionDenied`
    pub fn deny_writes(&self, deny: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.deny_writes = deny;
        }
    }

    /// Number of calls made for `op`, including failed ones
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.state
            .lock()
            .map(|state| state.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.rules.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, op: StoreOp) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::unknown("memory store lock poisoned"))?;

        *state.calls.entry(op).or_default() += 1;

        if let Some(error) = state.injected.get_mut(&op).and_then(VecDeque::pop_front) {
            debug!("Injected {op} failure: {error}");
            return Err(error);
        }
        if state.deny_writes && op != StoreOp::List {
            return Err(StoreError::PermissionDenied);
        }
        Ok(state)
    }
}

impl RuleStore for MemoryStore {
    fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        let state = self.begin(StoreOp::List)?;
        Ok(state.rules.clone())
    }

    fn insert_rule(&mut self, rule: &Rule) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::Insert)?;
        if state.rules.iter().any(|r| r.name == rule.name) {
            return Err(StoreError::AlreadyExists(rule.name.clone()));
        }
        state.rules.push(rule.clone());
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::Remove)?;
        let index = state
            .rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        state.rules.remove(index);
        Ok(())
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> StoreResult<()> {
        let mut state = self.begin(StoreOp::SetEnabled)?;
        let rule = state
            .rules
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
