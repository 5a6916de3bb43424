// src/config.rs
//! Per-router tuning parameters.

use std::time::Duration;

use rand::Rng;

use crate::data::RouterId;
use crate::error::ConfigError;

/// Configuration for one router instance.
///
/// The hold time has no default and must always be supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub router_id: RouterId,
    pub area: String,
    /// Minimum spacing between two hello broadcasts.
    pub hello_interval: Duration,
    /// Silence after which a neighbor is declared dead.
    pub hold_time: Duration,
    /// Silence after which a remote router's mobile addresses are forgotten.
    pub mobile_addr_max_age: Duration,
}

impl RouterConfig {
    pub const DEFAULT_HELLO_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MOBILE_ADDR_MAX_AGE: Duration = Duration::from_secs(60);

    pub fn new(router_id: impl Into<RouterId>, area: impl Into<String>, hold_time: Duration) -> Self {
        RouterConfig {
            router_id: router_id.into(),
            area: area.into(),
            hello_interval: Self::DEFAULT_HELLO_INTERVAL,
            hold_time,
            mobile_addr_max_age: Self::DEFAULT_MOBILE_ADDR_MAX_AGE,
        }
    }

    /// Create a config with a freshly drawn random router id.
    pub fn with_random_id(area: impl Into<String>, hold_time: Duration) -> Self {
        let raw: u64 = rand::rng().random();
        Self::new(RouterId::new(format!("{raw:016x}")), area, hold_time)
    }

    /// Set the hello interval.
    pub fn hello_interval(mut self, value: Duration) -> Self {
        self.hello_interval = value;
        self
    }

    /// Set the neighbor hold time.
    pub fn hold_time(mut self, value: Duration) -> Self {
        self.hold_time = value;
        self
    }

    pub fn mobile_addr_max_age(mut self, value: Duration) -> Self {
        self.mobile_addr_max_age = value;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router_id.is_empty() {
            return Err(ConfigError::EmptyRouterId);
        }
        if self.area.is_empty() {
            return Err(ConfigError::EmptyArea);
        }
        if self.hello_interval.is_zero() {
            return Err(ConfigError::ZeroHelloInterval);
        }
        if self.hold_time <= self.hello_interval {
            return Err(ConfigError::HoldTimeTooShort {
                hold_ms: self.hold_time.as_millis(),
                hello_ms: self.hello_interval.as_millis(),
            });
        }
        if self.mobile_addr_max_age.is_zero() {
            return Err(ConfigError::ZeroMobileAddrMaxAge);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = RouterConfig::new("R1", "area", Duration::from_secs(3))
            .hello_interval(Duration::from_millis(500))
            .hold_time(Duration::from_secs(2));
        assert_eq!(cfg.router_id, "R1");
        assert_eq!(cfg.mobile_addr_max_age, Duration::from_secs(60));
        assert_eq!(cfg.hello_interval, Duration::from_millis(500));
        assert_eq!(cfg.hold_time, Duration::from_secs(2));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn random_ids_differ() {
        let a = RouterConfig::with_random_id("area", Duration::from_secs(3));
        let b = RouterConfig::with_random_id("area", Duration::from_secs(3));
        assert_eq!(a.router_id.as_str().len(), 16);
        assert_ne!(a.router_id, b.router_id);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let hold = Duration::from_secs(3);
        assert_eq!(
            RouterConfig::new("", "area", hold).validate(),
            Err(ConfigError::EmptyRouterId)
        );
        assert_eq!(
            RouterConfig::new("R1", "", hold).validate(),
            Err(ConfigError::EmptyArea)
        );
        assert_eq!(
            RouterConfig::new("R1", "area", hold)
                .hello_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroHelloInterval)
        );
        assert!(matches!(
            RouterConfig::new("R1", "area", Duration::from_secs(1)).validate(),
            Err(ConfigError::HoldTimeTooShort { .. })
        ));
        assert_eq!(
            RouterConfig::new("R1", "area", hold)
                .mobile_addr_max_age(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroMobileAddrMaxAge)
        );
    }
}
