//! Integration tests for NetBlocker
//!
//! These tests drive the public API end to end: rule service over the
//! in-memory and JSON stores, the async command surface, and configuration.
//! No host firewall is touched; the Windows backend is only exercised on
//! Windows by manual runs.
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

#![allow(clippy::uninlined_format_args)]

use netblocker::audit::{AuditLog, EventType};
use netblocker::config::{AppConfig, Backend};
use netblocker::core::identity::{self, PathCheck};
use netblocker::core::json_store::JsonFileStore;
use netblocker::core::service::{DuplicatePolicy, ListScope, ServiceOptions};
use netblocker::core::store::StoreOp;
use netblocker::core::translate::ErrorToken;
use netblocker::{
    CommandSurface, Direction, DirectionChoice, Error, MemoryStore, Rule, RuleService,
    RuleSnapshot, RuleStore, StoreError,
};

const FOO_EXE: &str = r"C:\Apps\foo.exe";
const BAR_EXE: &str = r"D:\Tools\Bar.exe";

fn lexical_options() -> ServiceOptions {
    ServiceOptions {
        path_check: PathCheck::Lexical,
        ..ServiceOptions::default()
    }
}

fn memory_service() -> (RuleService<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    (
        RuleService::with_options(store.clone(), lexical_options()),
        store,
    )
}

#[test]
fn test_block_list_unblock_cycle() {
    let (service, _store) = memory_service();

    service.create(FOO_EXE, DirectionChoice::Both).unwrap();
    service.create(BAR_EXE, DirectionChoice::Inbound).unwrap();

    let rules = service.list_rules().unwrap();
    let summary: Vec<(&str, Direction)> = rules
        .iter()
        .map(|r| (r.app_name.as_str(), r.direction))
        .collect();
    assert_eq!(
        summary,
        vec![
            (FOO_EXE, Direction::Out),
            (FOO_EXE, Direction::In),
            (BAR_EXE, Direction::In),
        ]
    );

    for rule in &rules {
        service.remove(&rule.name).unwrap();
    }
    assert!(service.list_rules().unwrap().is_empty());
}

#[test]
fn test_repeated_block_is_idempotent() {
    let (service, store) = memory_service();

    let first = service.create_rule(FOO_EXE, true).unwrap();
    let second = service.create_rule(FOO_EXE, true).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
    assert_eq!(store.call_count(StoreOp::Insert), 1);
}

#[test]
fn test_reject_policy_reports_duplicate() {
    let store = MemoryStore::new();
    let service = RuleService::with_options(
        store,
        ServiceOptions {
            duplicates: DuplicatePolicy::Reject,
            ..lexical_options()
        },
    );

    service.create_rule(FOO_EXE, false).unwrap();
    let err = service.create_rule(FOO_EXE, false).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
    assert!(err.token().starts_with("0x800700B7: "));
}

#[test]
fn test_relative_path_never_reaches_store() {
    let (service, store) = memory_service();

    let err = service.create_rule(r"Apps\foo.exe", true).unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));
    assert_eq!(store.call_count(StoreOp::Insert), 0);
}

#[test]
fn test_foreign_rules_respect_scope() {
    let mut foreign = Rule::blocking(BAR_EXE, Direction::Out);
    foreign.name = "Bar Update Service".to_string();
    let store = MemoryStore::with_rules([foreign]);

    let owned = RuleService::with_options(store.clone(), lexical_options());
    owned.create_rule(FOO_EXE, true).unwrap();
    let names: Vec<String> = owned.list_rules().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec![identity::rule_name(FOO_EXE, Direction::Out)]);

    let all = RuleService::with_options(
        store,
        ServiceOptions {
            scope: ListScope::All,
            ..lexical_options()
        },
    );
    assert_eq!(all.list_rules().unwrap().len(), 2);

    // Mutations work by name regardless of scope
    owned.disable("Bar Update Service").unwrap();
    let foreign = all
        .list_rules()
        .unwrap()
        .into_iter()
        .find(|r| r.name == "Bar Update Service")
        .unwrap();
    assert!(!foreign.enabled);
}

#[test]
fn test_flip_direction_failure_restores_original() {
    let (service, store) = memory_service();
    let name = service.create_rule(FOO_EXE, true).unwrap();

    store.inject_failure(
        StoreOp::Insert,
        StoreError::Unknown {
            code: Some("0x800706BA".to_string()),
            message: "RPC server unavailable".to_string(),
        },
    );
    let err = service.change_direction(&name).unwrap_err();
    assert!(matches!(err, Error::Host { .. }));

    let rules = service.list_rules().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].name, name);
    assert_eq!(rules[0].direction, Direction::Out);
}

#[test]
fn test_flip_direction_unrecoverable_is_partial_failure() {
    let (service, store) = memory_service();
    let name = service.create_rule(FOO_EXE, false).unwrap();

    store.inject_failure(StoreOp::Insert, StoreError::unknown("replacement refused"));
    store.inject_failure(StoreOp::Insert, StoreError::unknown("restore refused"));

    let err = service.change_direction(&name).unwrap_err();
    assert!(matches!(err, Error::PartialFailure { .. }));
    assert!(err.token().starts_with("0x8007054F: "));
    assert!(service.list_rules().unwrap().is_empty());
}

#[test]
fn test_access_denied_token_for_every_mutation() {
    let (service, store) = memory_service();
    let name = service.create_rule(FOO_EXE, true).unwrap();
    store.deny_writes(true);

    let results = [
        ErrorToken::from_result(&service.create_rule(BAR_EXE, true)),
        ErrorToken::from_result(&service.remove(&name)),
        ErrorToken::from_result(&service.enable(&name)),
        ErrorToken::from_result(&service.disable(&name)),
        ErrorToken::from_result(&service.change_direction(&name)),
    ];
    for token in results {
        assert_eq!(token, "0x80070005");
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn test_json_store_sees_external_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.json");

    let service = RuleService::with_options(JsonFileStore::open(&path), lexical_options());
    let name = service.create_rule(FOO_EXE, true).unwrap();

    // Another process removes the rule behind our back
    let mut other = JsonFileStore::open(&path);
    other.remove_rule(&name).unwrap();

    assert!(service.list_rules().unwrap().is_empty());
    let err = service.disable(&name).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.token().starts_with("0x80070490: "));
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("rules.json");

    {
        let service = RuleService::with_options(JsonFileStore::open(&path), lexical_options());
        service.create(FOO_EXE, DirectionChoice::Both).unwrap();
        service
            .disable(&identity::rule_name(FOO_EXE, Direction::In))
            .unwrap();
    }

    let service = RuleService::with_options(JsonFileStore::open(&path), lexical_options());
    let rules = service.list_rules().unwrap();
    assert_eq!(rules.len(), 2);
    assert!(rules[0].enabled);
    assert!(!rules[1].enabled);
}

#[cfg(unix)]
#[test]
fn test_strict_paths_require_executable_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("tool");
    std::fs::write(&program, "#!/bin/sh\n").unwrap();
    let program = program.to_str().unwrap().to_string();

    let service = RuleService::new(MemoryStore::new());
    assert!(matches!(
        service.create_rule(&program, true),
        Err(Error::InvalidPath { .. })
    ));

    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
    service.create_rule(&program, true).unwrap();

    let missing = dir.path().join("missing").to_str().unwrap().to_string();
    assert!(service.create_rule(&missing, true).is_err());
}

#[tokio::test]
async fn test_command_surface_over_json_store() {
    let dir = tempfile::tempdir().unwrap();
    let audit = AuditLog::at(dir.path().join("audit.log"));
    let config = AppConfig {
        backend: Backend::Json,
        store_path: Some(dir.path().join("rules.json")),
        verify_app_paths: false,
        ..AppConfig::default()
    };

    let store = config.open_store().unwrap();
    assert_eq!(store.backend_name(), "json");
    let surface =
        CommandSurface::new(RuleService::with_options(store, config.service_options()))
            .with_audit(audit.clone());
    let mut snapshot = RuleSnapshot::default();

    let token = snapshot
        .run(&surface, |s| s.create_rule(FOO_EXE.to_string(), true))
        .await;
    assert!(ErrorToken::is_success(&token));
    assert_eq!(snapshot.rules().len(), 1);

    let name = snapshot.rules()[0].name.clone();
    let token = snapshot
        .run(&surface, |s| s.toggle_rule_direction(name.clone()))
        .await;
    assert_eq!(token, "");
    assert_eq!(snapshot.rules()[0].direction, Direction::In);

    let token = snapshot
        .run(&surface, |s| s.delete_rule(name.clone()))
        .await;
    assert!(token.starts_with("0x80070490: "));
    assert_eq!(snapshot.rules().len(), 1);

    let events = audit.read_recent(10).await.unwrap();
    let kinds: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::DeleteRule,
            EventType::ChangeDirection,
            EventType::CreateRule
        ]
    );
    assert!(!events[0].success);
}

#[tokio::test]
async fn test_command_surface_reports_access_denied() {
    let (service, store) = memory_service();
    let surface = CommandSurface::new(service);

    store.deny_writes(true);
    let token = surface
        .create_rules(FOO_EXE.to_string(), DirectionChoice::Both)
        .await;
    assert!(ErrorToken::is_access_denied(&token));
    assert!(surface.get_rules().await.is_empty());
}
