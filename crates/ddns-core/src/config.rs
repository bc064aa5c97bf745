//! Configuration types for the DDNS system
//!
//! [`DdnsConfig`] is built once at startup by the driver and handed to the
//! scheduler by value. Nothing in the core reads environment variables or
//! global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record name that addresses the zone apex
pub const APEX_NAME: &str = "@";

/// Default poll interval (5 minutes)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// The record this daemon keeps converged
    pub desired: DesiredState,

    /// Scheduler settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a configuration with default engine settings
    pub fn new(desired: DesiredState) -> Self {
        Self {
            desired,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.desired.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Operator-supplied target state
///
/// Immutable for the lifetime of the process. The IP is deliberately not part
/// of it: it is discovered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    /// Record name relative to the zone, or `@` for the apex
    pub name: String,

    /// Zone name (e.g. "example.com")
    pub zone: String,

    /// Whether the record should be proxied by the provider
    #[serde(default)]
    pub proxied: bool,
}

impl DesiredState {
    /// Create a desired state
    pub fn new(name: impl Into<String>, zone: impl Into<String>, proxied: bool) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
            proxied,
        }
    }

    /// Fully-qualified record name (`name.zone`, or the zone itself for `@`)
    pub fn fqdn(&self) -> String {
        if self.is_apex() {
            self.zone.clone()
        } else {
            format!("{}.{}", self.name, self.zone)
        }
    }

    /// Name sent to the provider on create/update
    pub fn record_name(&self) -> &str {
        if self.is_apex() {
            &self.zone
        } else {
            &self.name
        }
    }

    fn is_apex(&self) -> bool {
        self.name == APEX_NAME
    }

    /// Validate name and zone
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.is_empty() {
            return Err(crate::Error::config("zone is required"));
        }
        validate_domain_name(&self.zone)?;

        if self.name.is_empty() {
            return Err(crate::Error::config("record name cannot be empty"));
        }
        if !self.is_apex() {
            validate_domain_name(&self.name)?;
        }
        validate_domain_name(&self.fqdn())
    }
}

/// When the scheduler asks the IP source for the current address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpRefresh {
    /// Discover once at startup and reuse the address for every tick
    #[default]
    Startup,
    /// Discover again at the start of every tick
    EveryTick,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between reconciliations
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Reconcile once and stop
    #[serde(default)]
    pub once: bool,

    /// IP discovery policy
    #[serde(default)]
    pub ip_refresh: IpRefresh,

    /// Decide and log, but never call create/update
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval.is_zero() {
            return Err(crate::Error::config("interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            once: false,
            ip_refresh: IpRefresh::default(),
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_event_channel_capacity() -> usize {
    64
}

/// Validate that a string is a usable DNS name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphen
/// placement. Underscores are accepted since providers allow them in
/// owner names.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() {
        return Err(crate::Error::config("domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "domain name too long: {} chars (max 253): {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "domain label too long: {} chars (max 63): '{}'",
                label.len(),
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "domain label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "domain label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqdn_joins_name_and_zone() {
        let desired = DesiredState::new("home", "example.com", false);
        assert_eq!(desired.fqdn(), "home.example.com");
        assert_eq!(desired.record_name(), "home");
    }

    #[test]
    fn test_apex_name_resolves_to_zone() {
        let desired = DesiredState::new("@", "example.com", true);
        assert_eq!(desired.fqdn(), "example.com");
        assert_eq!(desired.record_name(), "example.com");
        assert!(desired.validate().is_ok());
    }

    #[test]
    fn test_missing_zone_is_rejected() {
        let desired = DesiredState::new("home", "", false);
        let err = desired.validate().unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_invalid_labels_are_rejected() {
        assert!(validate_domain_name("-bad.example.com").is_err());
        assert!(validate_domain_name("bad..example.com").is_err());
        assert!(validate_domain_name("sp ace.example.com").is_err());
        assert!(validate_domain_name(&"a".repeat(64)).is_err());
        assert!(validate_domain_name("example.com.").is_ok());
        assert!(validate_domain_name("_acme.example.com").is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = DdnsConfig::new(DesiredState::new("home", "example.com", false));
        assert!(config.validate().is_ok());

        config.engine.interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.interval, Duration::from_secs(300));
        assert!(!engine.once);
        assert_eq!(engine.ip_refresh, IpRefresh::Startup);
        assert!(!engine.dry_run);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DdnsConfig = serde_json::from_value(serde_json::json!({
            "desired": { "name": "home", "zone": "example.com" }
        }))
        .unwrap();

        assert!(!config.desired.proxied);
        assert_eq!(config.engine.interval, DEFAULT_INTERVAL);
        assert_eq!(config.engine.ip_refresh, IpRefresh::Startup);
    }
}
