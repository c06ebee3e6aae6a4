//! NetBlocker
//!
//! Per-application network blocking on top of a host firewall policy store.
//! A rule is keyed by the application path and a direction; the library owns
//! rule naming, validation, and the flat error tokens the caller sees.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, policy store backends, and the rule service
//! - [`commands`] - The async command surface handed to the presentation layer
//! - [`audit`] - Audit log of every mutating command
//! - [`validators`] - Port/address/description validation
//! - [`config`] - Configuration persistence and backend selection
//! - [`utils`] - Utility functions (data and state directories)
//!
//! # Safety Features
//!
//! - Only absolute paths to executables can be blocked
//! - Direction changes restore the original rule if the replacement fails
//! - Atomic writes and SHA-256 checksums for the portable JSON store
//! - Access denied is reported with a distinct, stable token

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod commands;
pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use commands::{CommandSurface, RuleSnapshot};
pub use core::error::{Error, Result, StoreError};
pub use core::memory::MemoryStore;
pub use core::rule::{Action, Direction, DirectionChoice, Protocol, Rule};
pub use core::service::RuleService;
pub use core::store::RuleStore;
