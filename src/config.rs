use crate::core::error::{Error, Result};
use crate::core::identity::PathCheck;
use crate::core::json_store::JsonFileStore;
use crate::core::service::{DuplicatePolicy, ListScope, ServiceOptions};
use crate::core::store::RuleStore;
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the configured backend
pub const BACKEND_ENV: &str = "NETBLOCKER_BACKEND";
/// Environment variable overriding the JSON store location
pub const STORE_ENV: &str = "NETBLOCKER_STORE";

/// Policy store backend selection
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
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    /// Windows Firewall on Windows, the JSON store elsewhere
    #[default]
    Auto,
    Json,
    Memory,
    Windows,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Backend,
    /// JSON store location; defaults to `<data_dir>/rules.json`
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Which rules `list` shows (open question: tool-owned rules only by default)
    #[serde(default)]
    pub scope: ListScope,
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
    /// Require blocked paths to be existing executables
    #[serde(default = "default_true")]
    pub verify_app_paths: bool,
    /// Append mutating operations to the audit log
    #[serde(default = "default_true")]
    pub audit_enabled: bool,
    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            store_path: None,
            scope: ListScope::Owned,
            duplicates: DuplicatePolicy::Idempotent,
            verify_app_paths: true,
            audit_enabled: true,
            log_level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Applies `NETBLOCKER_BACKEND` / `NETBLOCKER_STORE` overrides.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup` (keyed by variable name)
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(BACKEND_ENV) {
            match value.trim().parse::<Backend>() {
                Ok(backend) => self.backend = backend,
                Err(_) => tracing::warn!("Ignoring invalid {BACKEND_ENV}='{value}'"),
            }
        }
        if let Some(value) = lookup(STORE_ENV)
            && !value.trim().is_empty()
        {
            self.store_path = Some(PathBuf::from(value));
        }
        self
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            scope: self.scope,
            duplicates: self.duplicates,
            path_check: if self.verify_app_paths {
                PathCheck::Strict
            } else {
                PathCheck::Lexical
            },
        }
    }

    /// Backend that `Auto` resolves to on this host
    pub fn resolved_backend(&self) -> Backend {
        match self.backend {
            Backend::Auto if cfg!(windows) => Backend::Windows,
            Backend::Auto => Backend::Json,
            other => other,
        }
    }

    /// Opens the configured policy store
    ///
    /// # Errors
    ///
    /// Returns `Err` if the Windows backend is requested on another host, or
    /// no location for the JSON store can be determined.
    pub fn open_store(&self) -> Result<Box<dyn RuleStore>> {
        match self.resolved_backend() {
            Backend::Memory => Ok(Box::new(crate::core::memory::MemoryStore::new())),
            Backend::Json => {
                let store = match &self.store_path {
                    Some(path) => JsonFileStore::open(path),
                    None => JsonFileStore::default_location().ok_or_else(|| {
                        Error::Internal("Data directory not available".to_string())
                    })?,
                };
                Ok(Box::new(store))
            }
            #[cfg(windows)]
            Backend::Windows => Ok(Box::new(crate::core::windows::WindowsFirewallStore::new())),
            #[cfg(not(windows))]
            Backend::Windows => Err(Error::Internal(
                "The Windows Firewall backend is only available on Windows".to_string(),
            )),
            Backend::Auto => Err(Error::Internal("backend left unresolved".to_string())),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join("config.json"))
}

/// Saves the app config to `path` using an atomic write pattern.
/// 1. Writes to a temporary file with restrictive permissions (0o600).
/// 2. Atomically renames to the target path.
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn save_config_to(config: &AppConfig, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600) // Set permissions BEFORE any data is written
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(temp_path, path).await
}

/// Saves the app config to the data directory.
pub async fn save_config(config: &AppConfig) -> std::io::Result<()> {
    match config_path() {
        Some(path) => save_config_to(config, &path).await,
        None => Ok(()),
    }
}

/// Loads the app config from `path`, or returns default if missing or invalid.
pub async fn load_config_from(path: &Path) -> AppConfig {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => serde_json::from_str::<AppConfig>(&json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config {:?}: {e}", path);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

/// Loads the app config from the data directory, or returns default if not found.
pub async fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path).await,
        None => AppConfig::default(),
    }
}
