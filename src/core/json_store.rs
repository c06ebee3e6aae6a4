//! Portable on-disk policy store
//!
//! Hosts without a native firewall adapter keep rules in a JSON file. The
//! file is the shared resource: it is re-read on every call so edits made by
//! another process are observed, and every write replaces it atomically.
//!
//! # File Format
//!
//! ```json
//! { "version": 1, "rules": [ { "name": "...", ... } ] }
//! ```
//!
//! A `<file>.sha256` sidecar holds the checksum of the last write. A mismatch
//! is logged and tolerated (the file may have been edited by hand).
//!
//! # Concurrency
//!
//! Every load-modify-save runs under an exclusive advisory lock on a
//! `<file>.lock` sidecar, so writers in other processes (or other handles in
//! this one) never overwrite each other's changes. Reads take no lock: the
//! rename keeps the file whole at all times.
//!
//! # Security
//!
//! On Unix the store is written with mode 0o600 before any data lands in it.

use crate::core::error::StoreError;
use crate::core::rule::{MAX_RULES, Rule};
use crate::core::store::{RuleStore, StoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Current on-disk format version
pub const STORE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Opens (without creating) the store at `path`; a missing file is an
    /// empty store
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the application data directory
    pub fn default_location() -> Option<Self> {
        crate::utils::get_data_dir().map(|dir| Self::open(dir.join("rules.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sidecar_path(&self, extension: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(extension);
        PathBuf::from(path)
    }

    fn checksum_path(&self) -> PathBuf {
        self.sidecar_path(".sha256")
    }

    fn lock_path(&self) -> PathBuf {
        self.sidecar_path(".lock")
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Loads the rules, applies `op`, and saves when it asks to, all under
    /// the store's exclusive lock. The lock is released when the file handle
    /// drops.
    fn modify<F>(&self, op: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Vec<Rule>) -> StoreResult<bool>,
    {
        std::fs::create_dir_all(self.dir())?;
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock()?;

        let mut rules = self.load()?;
        if op(&mut rules)? {
            self.save(rules)?;
        }
        Ok(())
    }

    fn load(&self) -> StoreResult<Vec<Rule>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if let Ok(expected) = std::fs::read_to_string(self.checksum_path()) {
            let actual = compute_checksum(&json);
            if expected.trim() != actual {
                warn!(
                    "Rule store {:?} checksum mismatch (expected: {}, got: {})",
                    self.path,
                    expected.trim(),
                    actual
                );
            }
        }

        let file: StoreFile = serde_json::from_str(&json)
            .map_err(|e| StoreError::unknown(format!("Rule store is corrupted: {e}")))?;

        if file.version != STORE_FORMAT_VERSION {
            return Err(StoreError::unknown(format!(
                "Rule store format version mismatch: found v{}, expected v{}",
                file.version, STORE_FORMAT_VERSION
            )));
        }
        if file.rules.len() > MAX_RULES {
            return Err(StoreError::unknown(format!(
                "Rule store contains {} rules (max: {})",
                file.rules.len(),
                MAX_RULES
            )));
        }
        Ok(file.rules)
    }

    /// Writes the full rule list using a temp file + rename so a crash or a
    /// full disk never leaves a truncated store behind.
    fn save(&self, rules: Vec<Rule>) -> StoreResult<()> {
        let dir = self.dir();
        std::fs::create_dir_all(dir)?;

        let file = StoreFile {
            version: STORE_FORMAT_VERSION,
            rules,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StoreError::unknown(format!("Failed to serialize rule store: {e}")))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::from(e.error))?;

        // The rules are committed at this point; a stale sidecar only warns on load
        if let Err(e) = std::fs::write(self.checksum_path(), compute_checksum(&json)) {
            warn!("Failed to write checksum for rule store {:?}: {e}", self.path);
        }
        Ok(())
    }
}

/// SHA-256 of the serialized store, hex encoded
pub fn compute_checksum(json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl RuleStore for JsonFileStore {
    fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        self.load()
    }

    fn insert_rule(&mut self, rule: &Rule) -> StoreResult<()> {
        self.modify(|rules| {
            if rules.iter().any(|r| r.name == rule.name) {
                return Err(StoreError::AlreadyExists(rule.name.clone()));
            }
            if rules.len() >= MAX_RULES {
                return Err(StoreError::unknown(format!(
                    "Rule store is full ({MAX_RULES} rules)"
                )));
            }
            rules.push(rule.clone());
            Ok(true)
        })?;
        info!("Stored rule '{}' in {:?}", rule.name, self.path);
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> StoreResult<()> {
        self.modify(|rules| {
            let before = rules.len();
            rules.retain(|r| r.name != name);
            if rules.len() == before {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Ok(true)
        })
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> StoreResult<()> {
        self.modify(|rules| {
            let rule = rules
                .iter_mut()
                .find(|r| r.name == name)
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            if rule.enabled == enabled {
                return Ok(false);
            }
            rule.enabled = enabled;
            Ok(true)
        })
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}
