//! NetBlocker - block applications from the network
//!
//! Command-line front end over the rule management library. Every mutating
//! subcommand goes through the same command surface the GUI uses, so the
//! audit log and error tokens are identical.
//!
//! # Usage
//!
//! ```bash
//! netblocker list                                  # Rules created by NetBlocker
//! netblocker list --all --json                     # Every rule in the store, as JSON
//! netblocker block 'C:\Apps\foo.exe'               # Block outbound traffic
//! netblocker block /usr/bin/foo --direction both   # Block both directions
//! netblocker disable NetBlockerRule_Outbound_C:\Apps\foo.exe
//! netblocker flip NetBlockerRule_Outbound_C:\Apps\foo.exe
//! netblocker audit --count 50                      # Recent audit entries
//! ```
//!
//! The backend defaults to the Windows Firewall on Windows and the JSON
//! store elsewhere; override with `--backend` or `NETBLOCKER_BACKEND`.

use clap::{Parser, Subcommand};
use netblocker::audit::AuditLog;
use netblocker::commands::CommandSurface;
use netblocker::config::{self, AppConfig, Backend};
use netblocker::core::service::{ListScope, RuleService};
use netblocker::core::translate::translate;
use netblocker::{DirectionChoice, Error, Rule, utils};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "netblocker")]
#[command(version = build::PKG_VERSION, long_version = build::CLAP_LONG_VERSION)]
#[command(about = "Block applications from the network with host firewall rules", long_about = None)]
struct Cli {
    /// Policy store backend: auto, json, memory or windows
    #[arg(long, global = true, value_name = "BACKEND")]
    backend: Option<Backend>,
    /// Location of the JSON policy store
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List blocking rules
    List {
        /// Include rules not created by NetBlocker
        #[arg(long)]
        all: bool,
        /// Print the rule records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Block an application by absolute path
    Block {
        /// Absolute path to the executable
        path: String,
        /// outbound, inbound or both
        #[arg(short, long, default_value = "outbound")]
        direction: DirectionChoice,
    },
    /// Delete a rule
    Unblock {
        /// Name of the rule
        rule_name: String,
    },
    /// Enable a rule
    Enable {
        /// Name of the rule
        rule_name: String,
    },
    /// Disable a rule without deleting it
    Disable {
        /// Name of the rule
        rule_name: String,
    },
    /// Move a rule to the opposite direction
    Flip {
        /// Name of the rule
        rule_name: String,
    },
    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
}

fn main() -> ExitCode {
    let _ = utils::ensure_dirs();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let mut config = config::load_config().await.apply_env_overrides();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }
    init_logging(&config.log_level);

    match handle_cli(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let translation = translate(&e);
            eprintln!("Error: {}", translation.user_message);
            for suggestion in &translation.suggestions {
                eprintln!("  - {suggestion}");
            }
            eprintln!("({})", e.token());
            ExitCode::FAILURE
        }
    }
}

/// Logs to `<state_dir>/netblocker.log`, or stderr when that is unavailable.
/// `RUST_LOG` overrides the configured level.
fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = utils::get_state_dir().and_then(|mut log_path| {
        log_path.push("netblocker.log");
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

async fn handle_cli(command: Commands, mut config: AppConfig) -> Result<(), Error> {
    if let Commands::Audit { count } = command {
        return print_audit(count).await;
    }
    if let Commands::List { all: true, .. } = command {
        config.scope = ListScope::All;
    }

    let store = config.open_store()?;
    info!("Using {} policy store", store.backend_name());
    let mut surface = CommandSurface::new(RuleService::with_options(
        store,
        config.service_options(),
    ));
    if config.audit_enabled {
        match AuditLog::new() {
            Ok(audit) => surface = surface.with_audit(audit),
            Err(e) => warn!("Audit log unavailable: {e}"),
        }
    }

    match command {
        Commands::List { json, .. } => {
            let rules = surface.list_rules().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else {
                print_rules(&rules);
            }
        }
        Commands::Block { path, direction } => {
            for name in surface.try_create_rules(path, direction).await? {
                println!("✓ Blocking with rule '{name}'");
            }
        }
        Commands::Unblock { rule_name } => {
            surface.try_delete_rule(rule_name.clone()).await?;
            println!("✓ Deleted rule '{rule_name}'");
        }
        Commands::Enable { rule_name } => {
            surface.try_enable_rule(rule_name.clone()).await?;
            println!("✓ Enabled rule '{rule_name}'");
        }
        Commands::Disable { rule_name } => {
            surface.try_disable_rule(rule_name.clone()).await?;
            println!("✓ Disabled rule '{rule_name}'");
        }
        Commands::Flip { rule_name } => {
            let replacement = surface.try_toggle_rule_direction(rule_name.clone()).await?;
            println!("✓ Replaced '{rule_name}' with '{replacement}'");
        }
        Commands::Audit { .. } => {}
    }
    Ok(())
}

fn print_rules(rules: &[Rule]) {
    if rules.is_empty() {
        println!("No rules.");
        return;
    }
    for rule in rules {
        println!(
            "{} {:<8} {:<8} {}",
            if rule.enabled { "●" } else { "○" },
            rule.direction.label(),
            rule.action,
            rule.app_name
        );
        println!("    {}", rule.name);
    }
}

async fn print_audit(count: usize) -> Result<(), Error> {
    let audit = AuditLog::new()?;
    let events = audit.read_recent(count).await?;
    if events.is_empty() {
        println!("Audit log is empty ({})", audit.path().display());
        return Ok(());
    }
    for event in events {
        let outcome = match &event.error {
            None => "ok".to_string(),
            Some(token) => token.clone(),
        };
        println!(
            "{} {:?} {} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            event.details,
            outcome
        );
    }
    Ok(())
}
