//! Firewall rule data structures
//!
//! A [`Rule`] is one host firewall policy entry for one application in one
//! traffic direction. Its field set mirrors the host policy schema and is the
//! record shape the presentation layer receives from `get_rules`, so field
//! names (including the historical `local_adresses` spelling) are part of the
//! wire contract.
//!
//! # Direction
//!
//! Storage is binary ([`Direction::In`] / [`Direction::Out`]). The UI-level
//! "Both" is a [`DirectionChoice`], expanded by the service into two stored
//! rules and never persisted.
//!
//! # Example
//!
//! ```
//! use netblocker::core::rule::{Direction, Rule};
//!
//! let rule = Rule::blocking(r"C:\Apps\foo.exe", Direction::Out);
//! assert_eq!(rule.name, r"NetBlockerRule_Outbound_C:\Apps\foo.exe");
//! assert!(rule.enabled);
//! ```

use serde::{Deserialize, Serialize};

/// Description stamped on every rule this tool creates
pub const DEFAULT_DESCRIPTION: &str = "A NetBlocker Rule";

/// Maximum number of rules a policy store file may contain
///
/// Limit prevents memory exhaustion from malformed store files.
pub const MAX_RULES: usize = 10_000;

/// IP protocol matched by a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Protocol {
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "icmpv4")]
    Icmpv4,
    #[strum(serialize = "icmpv6")]
    Icmpv6,
    /// Match all protocols
    #[default]
    #[strum(serialize = "any")]
    Any,
}

impl Protocol {
    /// Returns display name for CLI rendering
    pub const fn display_name(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Icmpv4 => "ICMPv4",
            Protocol::Icmpv6 => "ICMPv6",
            Protocol::Any => "Any",
        }
    }

    /// Whether port specs are meaningful for this protocol
    pub const fn supports_ports(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

/// Stored traffic direction
///
/// Serialized as `"In"` / `"Out"`; the presentation layer tests
/// `direction === 'Out'`.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Direction {
    #[strum(serialize = "out", serialize = "outbound")]
    Out,
    #[strum(serialize = "in", serialize = "inbound")]
    In,
}

impl Direction {
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }

    /// Word used in rule names and CLI output
    pub const fn label(self) -> &'static str {
        match self {
            Direction::Out => "Outbound",
            Direction::In => "Inbound",
        }
    }

    pub const fn from_is_out(is_out: bool) -> Self {
        if is_out { Direction::Out } else { Direction::In }
    }
}

/// Direction requested by the caller when blocking an application
///
/// `Both` is a composite of two stored rules.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum DirectionChoice {
    #[default]
    #[strum(serialize = "outbound")]
    Outbound,
    #[strum(serialize = "inbound")]
    Inbound,
    #[strum(serialize = "both")]
    Both,
}

impl DirectionChoice {
    /// Stored directions this choice expands to, outbound first
    pub fn directions(self) -> &'static [Direction] {
        match self {
            DirectionChoice::Outbound => &[Direction::Out],
            DirectionChoice::Inbound => &[Direction::In],
            DirectionChoice::Both => &[Direction::Out, Direction::In],
        }
    }
}

impl From<Direction> for DirectionChoice {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Out => DirectionChoice::Outbound,
            Direction::In => DirectionChoice::Inbound,
        }
    }
}

/// What the host does with matching traffic
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Action {
    #[default]
    #[strum(serialize = "block")]
    Block,
    #[strum(serialize = "allow")]
    Allow,
}

/// One firewall policy entry for one application in one direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Unique key within the store
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Application path; immutable after creation
    pub app_name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub icmp_type: String,
    #[serde(default)]
    pub local_ports: String,
    #[serde(default)]
    pub remote_ports: String,
    #[serde(default = "any_address")]
    pub local_adresses: String,
    #[serde(default = "any_address")]
    pub remote_addresses: String,
    #[serde(default)]
    pub profile1: String,
    #[serde(default)]
    pub profile2: String,
    #[serde(default)]
    pub profile3: String,
    pub direction: Direction,
    #[serde(default)]
    pub action: Action,
    #[serde(default = "all_interface_types")]
    pub interface_types: String,
    #[serde(default)]
    pub interfaces: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub grouping: String,
    #[serde(default)]
    pub edge_traversal: bool,
}

fn any_address() -> String {
    "*".to_string()
}

fn all_interface_types() -> String {
    "All".to_string()
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Builds the default blocking rule for an application and direction:
    /// any protocol, any ports and addresses, all interface types, enabled.
    pub fn blocking(app_path: &str, direction: Direction) -> Self {
        Self {
            name: crate::core::identity::rule_name(app_path, direction),
            description: DEFAULT_DESCRIPTION.to_string(),
            app_name: app_path.to_string(),
            service_name: String::new(),
            protocol: Protocol::Any,
            icmp_type: String::new(),
            local_ports: String::new(),
            remote_ports: String::new(),
            local_adresses: any_address(),
            remote_addresses: any_address(),
            profile1: String::new(),
            profile2: String::new(),
            profile3: String::new(),
            direction,
            action: Action::Block,
            interface_types: all_interface_types(),
            interfaces: String::new(),
            enabled: true,
            grouping: String::new(),
            edge_traversal: false,
        }
    }

    /// Copy of this rule body for the opposite direction, renamed accordingly
    pub fn flipped(&self) -> Self {
        let direction = self.direction.opposite();
        Self {
            name: crate::core::identity::rule_name(&self.app_name, direction),
            direction,
            ..self.clone()
        }
    }

    /// Whether both rules match the same traffic the same way: application,
    /// direction, action, protocol, ports and addresses. Name, description,
    /// and enabled state are ignored.
    pub fn same_filter(&self, other: &Rule) -> bool {
        self.app_name == other.app_name
            && self.direction == other.direction
            && self.action == other.action
            && self.protocol == other.protocol
            && self.icmp_type == other.icmp_type
            && self.local_ports == other.local_ports
            && self.remote_ports == other.remote_ports
            && self.local_adresses == other.local_adresses
            && self.remote_addresses == other.remote_addresses
    }

    /// Short executable name for display (`foo.exe` for `C:\Apps\foo.exe`)
    pub fn short_app_name(&self) -> &str {
        self.app_name
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(&self.app_name)
    }

    /// Validates the free-form fields before the rule reaches a store
    ///
    /// # Errors
    ///
    /// Returns `Err` naming the first field that fails validation.
    pub fn validate(&self) -> crate::core::error::Result<()> {
        use crate::core::error::Error;
        use crate::validators;

        let invalid = |field: &str, message: String| Error::InvalidRule {
            field: field.to_string(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name", "Rule name cannot be empty".to_string()));
        }
        validators::validate_description(&self.description)
            .map_err(|m| invalid("description", m))?;

        if !self.protocol.supports_ports()
            && (!validators::is_any(&self.local_ports) || !validators::is_any(&self.remote_ports))
        {
            return Err(invalid(
                "protocol",
                format!("{} rules cannot filter on ports", self.protocol.display_name()),
            ));
        }
        validators::validate_port_spec(&self.local_ports).map_err(|m| invalid("local_ports", m))?;
        validators::validate_port_spec(&self.remote_ports)
            .map_err(|m| invalid("remote_ports", m))?;
        validators::validate_address_spec(&self.local_adresses)
            .map_err(|m| invalid("local_adresses", m))?;
        validators::validate_address_spec(&self.remote_addresses)
            .map_err(|m| invalid("remote_addresses", m))?;
        Ok(())
    }
}
