//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.

use crate::core::identity::PathCheck;
use crate::core::memory::MemoryStore;
use crate::core::rule::{Direction, Rule};
use crate::core::service::{RuleService, ServiceOptions};

/// The canonical Windows application path used across scenarios
pub const FOO_EXE: &str = r"C:\Apps\foo.exe";

/// Creates a service over an empty in-memory store with lexical path checks.
///
/// Returns the service together with a second handle on the same store, so
/// tests can inject failures or inspect call counts after construction.
pub fn lexical_service() -> (RuleService<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    let service = RuleService::with_options(
        store.clone(),
        ServiceOptions {
            path_check: PathCheck::Lexical,
            ..ServiceOptions::default()
        },
    );
    (service, store)
}

/// Creates a test rule that was not made by this tool.
///
/// # Arguments
///
/// * `name` - Host rule name (without the ownership prefix)
/// * `app_path` - Application the rule applies to
pub fn create_foreign_rule(name: &str, app_path: &str) -> Rule {
    let mut rule = Rule::blocking(app_path, Direction::In);
    rule.name = name.to_string();
    rule.description = "Created by the host".to_string();
    rule
}
