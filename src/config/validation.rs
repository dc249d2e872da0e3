//! Semantic configuration checks, run after serde parsing succeeds.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::MuxdConfig;

/// A single failed semantic check.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates the whole config, collecting every failure rather than
/// stopping at the first.
pub fn validate_config(config: &MuxdConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr("http.bind_address", &config.http.bind_address, &mut errors);
    check_addr("dns.bind_address", &config.dns.bind_address, &mut errors);
    if config.observability.metrics_enabled {
        check_addr(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field,
            message: format!("{value:?} is not a valid socket address"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&MuxdConfig::default()).is_ok());
    }

    #[test]
    fn bad_addresses_are_collected() {
        let mut config = MuxdConfig::default();
        config.http.bind_address = "not-an-address".into();
        config.dns.bind_address = "also bad".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "http.bind_address");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = MuxdConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());
        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
