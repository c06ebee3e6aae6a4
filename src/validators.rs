//! Input validation for rule fields
//!
//! Port and address fields are free-form strings in the host policy schema.
//! These checks keep malformed values out of the store before the host gets
//! a chance to reject them with an opaque code.

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Maximum description length accepted by the host policy store
pub const MAX_DESCRIPTION_LEN: usize = 256;

/// Address keywords understood by the host policy store
const ADDRESS_KEYWORDS: &[&str] = &[
    "LocalSubnet",
    "DNS",
    "DHCP",
    "WINS",
    "DefaultGateway",
    "Intranet",
    "Internet",
];

/// Whether a port/address spec means "any"
pub fn is_any(spec: &str) -> bool {
    let spec = spec.trim();
    spec.is_empty() || spec == "*"
}

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if port is not a number or is 0 (reserved).
pub fn validate_port(port: &str) -> Result<u16, String> {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(format!(
            "'{}' is not a port between 1 and 65535",
            port.trim()
        )),
        Ok(p) => Ok(p),
    }
}

/// Validates a port spec: empty, `*`, a port, a `lo-hi` range, or a comma
/// separated list of those.
///
/// # Examples
///
/// ```
/// use netblocker::validators::validate_port_spec;
///
/// assert!(validate_port_spec("80,443,8000-8080").is_ok());
/// assert!(validate_port_spec("9000-80").is_err());
/// ```
///
/// # Errors
///
/// Returns `Err` describing the first malformed element.
pub fn validate_port_spec(spec: &str) -> Result<(), String> {
    if is_any(spec) {
        return Ok(());
    }

    for part in spec.split(',') {
        if part.trim().is_empty() {
            return Err("Port list contains an empty entry".to_string());
        }
        if let Some((start, end)) = part.split_once('-') {
            let start = validate_port(start)?;
            let end = validate_port(end)?;
            if start > end {
                return Err("Start port must be less than or equal to end port".to_string());
            }
        } else {
            validate_port(part)?;
        }
    }
    Ok(())
}

/// Validates an address spec: empty, `*`, a host keyword, an IP, a CIDR
/// network, an `a-b` IP range of one family, or a comma separated list.
///
/// # Errors
///
/// Returns `Err` describing the first malformed element.
pub fn validate_address_spec(spec: &str) -> Result<(), String> {
    if is_any(spec) {
        return Ok(());
    }

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err("Address list contains an empty entry".to_string());
        }
        if ADDRESS_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(part))
        {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: IpAddr = start
                .trim()
                .parse()
                .map_err(|_| format!("Invalid range start '{}'", start.trim()))?;
            let end: IpAddr = end
                .trim()
                .parse()
                .map_err(|_| format!("Invalid range end '{}'", end.trim()))?;
            if start.is_ipv4() != end.is_ipv4() {
                return Err(format!("Range '{part}' mixes IPv4 and IPv6"));
            }
            if start > end {
                return Err(format!("Range '{part}' is reversed"));
            }
            continue;
        }
        part.parse::<IpNetwork>()
            .map_err(|_| format!("Invalid address or network '{part}'"))?;
    }
    Ok(())
}

/// Validates a rule description.
///
/// # Errors
///
/// Returns `Err` if the description is too long or contains control characters.
pub fn validate_description(input: &str) -> Result<(), String> {
    if input.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(format!(
            "Description too long (max {MAX_DESCRIPTION_LEN} characters)"
        ));
    }
    if input.chars().any(char::is_control) {
        return Err("Description contains control characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_specs() {
        assert!(is_any(""));
        assert!(is_any(" * "));
        assert!(!is_any("80"));
    }

    #[test]
    fn test_port_specs() {
        assert!(validate_port_spec("").is_ok());
        assert!(validate_port_spec("443").is_ok());
        assert!(validate_port_spec("1-65535").is_ok());
        assert!(validate_port_spec("80, 443, 8000-8080").is_ok());

        assert!(validate_port_spec("0").is_err());
        assert!(validate_port_spec("65536").is_err());
        assert!(validate_port_spec("http").is_err());
        assert!(validate_port_spec("80,,443").is_err());
        assert!(validate_port_spec("9000-80").is_err());
    }

    #[test]
    fn test_address_specs() {
        assert!(validate_address_spec("*").is_ok());
        assert!(validate_address_spec("192.168.1.10").is_ok());
        assert!(validate_address_spec("10.0.0.0/8, fe80::/64").is_ok());
        assert!(validate_address_spec("LocalSubnet,dns").is_ok());
        assert!(validate_address_spec("10.0.0.1-10.0.0.20").is_ok());

        assert!(validate_address_spec("10.0.0.300").is_err());
        assert!(validate_address_spec("10.0.0.0/33").is_err());
        assert!(validate_address_spec("10.0.0.20-10.0.0.1").is_err());
        assert!(validate_address_spec("10.0.0.1-::1").is_err());
        assert!(validate_address_spec("example.com").is_err());
    }

    #[test]
    fn test_description() {
        assert!(validate_description("A NetBlocker Rule").is_ok());
        assert!(validate_description("line\nbreak").is_err());
        assert!(validate_description(&"x".repeat(MAX_DESCRIPTION_LEN + 1)).is_err());
    }
}
