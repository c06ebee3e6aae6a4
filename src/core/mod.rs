//! Core rule management functionality
//!
//! This module contains the core types and logic for managing per-application
//! firewall rules. It provides:
//!
//! - [`rule`]: The rule record and its enumerations
//! - [`identity`]: Canonical rule names and application path validation
//! - [`store`]: The policy store boundary ([`store::RuleStore`])
//! - [`memory`], [`json_store`]: Store backends available on every host
//! - `windows`: Windows Firewall backend (Windows only)
//! - [`service`]: The rule management service the command surface calls
//! - [`direction`]: Direction change with compensating restore
//! - [`error`], [`translate`]: Error types and their flat token encoding

pub mod direction;
pub mod error;
pub mod identity;
pub mod json_store;
pub mod memory;
pub mod rule;
pub mod service;
pub mod store;
pub mod translate;
#[cfg(windows)]
pub mod windows;

#[cfg(test)]
pub mod test_helpers;
