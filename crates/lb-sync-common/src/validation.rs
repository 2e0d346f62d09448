use regex::Regex;
use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid DNS label: {0}")]
    InvalidDnsLabel(String),

    #[error("Invalid {setting}: {value} (expected an integer in {min}..={max})")]
    OutOfRange {
        setting: &'static str,
        value: String,
        min: i32,
        max: i32,
    },

    #[error("Invalid port {port}: {reason}")]
    InvalidPort { port: i32, reason: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// TCP idle timeout bounds, minutes
pub const IDLE_TIMEOUT_MINUTES: RangeInclusive<i32> = 4..=30;

/// Health probe interval bounds, seconds
pub const PROBE_INTERVAL_SECONDS: RangeInclusive<i32> = 5..=300;

/// Consecutive probe failures before a backend is pulled
pub const PROBE_COUNT: RangeInclusive<i32> = 2..=10;

// DNS label for public addresses: lowercase, starts with a letter, 3-63 chars
static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{1,61}[a-z0-9]$").expect("valid regex"));

/// Validates an IP address (IPv4 or IPv6)
pub fn validate_ip_address(ip: &str) -> ValidationResult<IpAddr> {
    ip.parse::<IpAddr>()
        .map_err(|_| ValidationError::InvalidIpAddress(ip.to_string()))
}

/// Validates the DNS label attached to a public address
pub fn validate_dns_label(label: &str) -> ValidationResult<String> {
    if DNS_LABEL_REGEX.is_match(label) {
        Ok(label.to_string())
    } else {
        Err(ValidationError::InvalidDnsLabel(label.to_string()))
    }
}

fn parse_bounded(
    setting: &'static str,
    value: &str,
    range: RangeInclusive<i32>,
) -> ValidationResult<i32> {
    let out_of_range = || ValidationError::OutOfRange {
        setting,
        value: value.to_string(),
        min: *range.start(),
        max: *range.end(),
    };

    let parsed = value.trim().parse::<i32>().map_err(|_| out_of_range())?;
    check_bounded(setting, parsed, range)
}

fn check_bounded(
    setting: &'static str,
    value: i32,
    range: RangeInclusive<i32>,
) -> ValidationResult<i32> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            setting,
            value: value.to_string(),
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Parses a TCP idle timeout in minutes
pub fn parse_idle_timeout(value: &str) -> ValidationResult<i32> {
    parse_bounded("idle timeout", value, IDLE_TIMEOUT_MINUTES)
}

/// Checks an already-parsed idle timeout
pub fn validate_idle_timeout(minutes: i32) -> ValidationResult<i32> {
    check_bounded("idle timeout", minutes, IDLE_TIMEOUT_MINUTES)
}

/// Parses a health probe interval in seconds
pub fn parse_probe_interval(value: &str) -> ValidationResult<i32> {
    parse_bounded("probe interval", value, PROBE_INTERVAL_SECONDS)
}

/// Parses the number of probes before a backend is marked down
pub fn parse_probe_count(value: &str) -> ValidationResult<i32> {
    parse_bounded("probe count", value, PROBE_COUNT)
}

/// Validates a frontend or node port number
pub fn validate_port(port: i32) -> ValidationResult<i32> {
    if (1..=65535).contains(&port) {
        Ok(port)
    } else {
        Err(ValidationError::InvalidPort {
            port,
            reason: "must be between 1 and 65535".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ip_addresses() {
        assert!(validate_ip_address("10.0.0.1").is_ok());
        assert!(validate_ip_address("2001:db8::1").is_ok());
    }

    #[test]
    fn test_invalid_ip_addresses() {
        assert!(validate_ip_address("256.1.1.1").is_err());
        assert!(validate_ip_address("lb.example.com").is_err());
        assert!(validate_ip_address("").is_err());
    }

    #[test]
    fn test_idle_timeout_bounds() {
        assert_eq!(parse_idle_timeout("4").unwrap(), 4);
        assert_eq!(parse_idle_timeout(" 30 ").unwrap(), 30);
        assert!(parse_idle_timeout("3").is_err());
        assert!(parse_idle_timeout("31").is_err());
        assert!(parse_idle_timeout("ten").is_err());
        assert_eq!(validate_idle_timeout(15).unwrap(), 15);
        assert!(validate_idle_timeout(45).is_err());
    }

    #[test]
    fn test_idle_timeout_error_message() {
        let err = parse_idle_timeout("90").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("idle timeout"));
        assert!(msg.contains("90"));
        assert!(msg.contains("4..=30"));
    }

    #[test]
    fn test_probe_settings() {
        assert_eq!(parse_probe_interval("15").unwrap(), 15);
        assert!(parse_probe_interval("1").is_err());
        assert_eq!(parse_probe_count("2").unwrap(), 2);
        assert!(parse_probe_count("0").is_err());
        assert!(parse_probe_count("11").is_err());
    }

    #[test]
    fn test_dns_labels() {
        assert!(validate_dns_label("myapp").is_ok());
        assert!(validate_dns_label("my-app-01").is_ok());
        assert!(validate_dns_label("ab").is_err()); // too short
        assert!(validate_dns_label("1app").is_err()); // must start with a letter
        assert!(validate_dns_label("MyApp").is_err()); // lowercase only
        assert!(validate_dns_label("app-").is_err());
        assert!(validate_dns_label(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_ports() {
        assert!(validate_port(80).is_ok());
        assert!(validate_port(65535).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(70000).is_err());
    }
}
