//! Windows Firewall policy store
//!
//! Adapter over the host's `INetFwPolicy2` rule collection via `winfw`.
//! Host failures surface as HRESULT text and are classified by
//! [`classify_host_code`].
//!
//! The host accepts duplicate rule names and treats removal of an absent name
//! as success, so existence is checked here before every mutating call to
//! keep the [`RuleStore`] contract.

use crate::core::error::StoreError;
use crate::core::rule::{Action, Direction, Protocol, Rule};
use crate::core::store::{RuleStore, StoreResult};
use crate::core::translate::classify_host_code;
use tracing::{error, info};
use winfw::{Actions, Directions, FwRule, Protocols};

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsFirewallStore;

impl WindowsFirewallStore {
    pub fn new() -> Self {
        Self
    }

    fn host_failure(op: &str, name: &str, err: &impl std::fmt::Display) -> StoreError {
        let text = err.to_string();
        error!("Windows Firewall {op} failed for '{name}': {text}");
        classify_host_code(&text, name)
    }

    fn require_exists(&self, name: &str) -> StoreResult<()> {
        if self.find_rule(name)?.is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

fn protocol_from_host(protocol: &Protocols) -> Protocol {
    match protocol {
        Protocols::Tcp => Protocol::Tcp,
        Protocols::Udp => Protocol::Udp,
        Protocols::Icmpv4 => Protocol::Icmpv4,
        Protocols::Icmpv6 => Protocol::Icmpv6,
        #[allow(unreachable_patterns)]
        _ => Protocol::Any,
    }
}

fn protocol_to_host(protocol: Protocol) -> Protocols {
    match protocol {
        Protocol::Tcp => Protocols::Tcp,
        Protocol::Udp => Protocols::Udp,
        Protocol::Icmpv4 => Protocols::Icmpv4,
        Protocol::Icmpv6 => Protocols::Icmpv6,
        Protocol::Any => Protocols::Any,
    }
}

fn rule_from_host(rule: &FwRule) -> Rule {
    Rule {
        name: rule.name.clone(),
        description: rule.description.clone(),
        app_name: rule.app_name.clone(),
        service_name: rule.service_name.clone(),
        protocol: protocol_from_host(&rule.protocol),
        icmp_type: rule.icmp_type.clone(),
        local_ports: rule.local_ports.clone(),
        remote_ports: rule.remote_ports.clone(),
        local_adresses: rule.local_adresses.clone(),
        remote_addresses: rule.remote_addresses.clone(),
        profile1: rule.profile1.clone(),
        profile2: rule.profile2.clone(),
        profile3: rule.profile3.clone(),
        direction: match rule.direction {
            Directions::Out => Direction::Out,
            #[allow(unreachable_patterns)]
            _ => Direction::In,
        },
        action: match rule.action {
            Actions::Allow => Action::Allow,
            #[allow(unreachable_patterns)]
            _ => Action::Block,
        },
        interface_types: rule.interface_types.clone(),
        interfaces: rule.interfaces.clone(),
        enabled: rule.enabled,
        grouping: rule.grouping.clone(),
        edge_traversal: rule.edge_traversal,
    }
}

fn rule_to_host(rule: &Rule) -> FwRule {
    FwRule {
        name: rule.name.clone(),
        description: rule.description.clone(),
        app_name: rule.app_name.clone(),
        service_name: rule.service_name.clone(),
        protocol: protocol_to_host(rule.protocol),
        icmp_type: rule.icmp_type.clone(),
        local_ports: rule.local_ports.clone(),
        remote_ports: rule.remote_ports.clone(),
        local_adresses: rule.local_adresses.clone(),
        remote_addresses: rule.remote_addresses.clone(),
        profile1: rule.profile1.clone(),
        profile2: rule.profile2.clone(),
        profile3: rule.profile3.clone(),
        direction: match rule.direction {
            Direction::Out => Directions::Out,
            Direction::In => Directions::In,
        },
        action: match rule.action {
            Action::Block => Actions::Block,
            Action::Allow => Actions::Allow,
        },
        interface_types: rule.interface_types.clone(),
        interfaces: rule.interfaces.clone(),
        enabled: rule.enabled,
        grouping: rule.grouping.clone(),
        edge_traversal: rule.edge_traversal,
    }
}

impl RuleStore for WindowsFirewallStore {
    fn list_rules(&self) -> StoreResult<Vec<Rule>> {
        let rules = winfw::get_fw_rules().map_err(|e| Self::host_failure("enumerate", "*", &e))?;
        Ok(rules.iter().map(rule_from_host).collect())
    }

    fn insert_rule(&mut self, rule: &Rule) -> StoreResult<()> {
        if self.find_rule(&rule.name)?.is_some() {
            return Err(StoreError::AlreadyExists(rule.name.clone()));
        }
        winfw::new_fw_rule(&rule_to_host(rule))
            .map_err(|e| Self::host_failure("insert", &rule.name, &e))?;
        info!("Added Windows Firewall rule '{}'", rule.name);
        Ok(())
    }

    fn remove_rule(&mut self, name: &str) -> StoreResult<()> {
        self.require_exists(name)?;
        let name = name.to_string();
        winfw::del_fw_rule(&name).map_err(|e| Self::host_failure("remove", &name, &e))
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> StoreResult<()> {
        self.require_exists(name)?;
        let name = name.to_string();
        let result = if enabled {
            winfw::enable_fw_rule(&name)
        } else {
            winfw::disable_fw_rule(&name)
        };
        result.map_err(|e| Self::host_failure("set_enabled", &name, &e))
    }

    fn backend_name(&self) -> &'static str {
        "windows"
    }
}
