use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};

use crate::analytics::OccupancyBands;
use crate::engine::AllocatorConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub allocator: AllocatorSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            allocator: AllocatorSettings::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "STOCKPLACE_API_HOST";
    const PORT_VAR: &'static str = "STOCKPLACE_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = load_with_warning(
            Self::PORT_VAR,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Tunables of the placement and analytics engines.
#[derive(Clone, Debug)]
pub struct AllocatorSettings {
    allocator: AllocatorConfig,
}

impl AllocatorSettings {
    const CEILING_VAR: &'static str = "STOCKPLACE_MAX_PLACEABLE_CEILING";
    const LOCK_TIMEOUT_VAR: &'static str = "STOCKPLACE_LOCK_TIMEOUT_MS";
    const COMMIT_RETRIES_VAR: &'static str = "STOCKPLACE_COMMIT_RETRIES";
    const TOP_ITEMS_VAR: &'static str = "STOCKPLACE_TOP_ITEMS";
    const BAND_MOSTLY_EMPTY_VAR: &'static str = "STOCKPLACE_BAND_MOSTLY_EMPTY";
    const BAND_OPTIMAL_VAR: &'static str = "STOCKPLACE_BAND_OPTIMAL";
    const BAND_WELL_FILLED_VAR: &'static str = "STOCKPLACE_BAND_WELL_FILLED";

    fn from_env() -> Self {
        let max_placeable_ceiling = load_with_warning(
            Self::CEILING_VAR,
            AllocatorConfig::DEFAULT_MAX_PLACEABLE_CEILING,
            |value| value > 0,
            "must be greater than 0",
        );

        let lock_timeout_ms = load_with_warning(
            Self::LOCK_TIMEOUT_VAR,
            AllocatorConfig::DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            |value| value > 0,
            "must be greater than 0",
        );

        let commit_retries = load_with_warning(
            Self::COMMIT_RETRIES_VAR,
            AllocatorConfig::DEFAULT_COMMIT_RETRIES,
            |value| value > 0,
            "must be at least 1",
        );

        let top_items = load_with_warning(
            Self::TOP_ITEMS_VAR,
            AllocatorConfig::DEFAULT_TOP_ITEMS,
            |value| value > 0,
            "must be greater than 0",
        );

        let defaults = OccupancyBands::default();
        let percent = |value: f64| (0.0..=100.0).contains(&value);
        let bands = OccupancyBands {
            mostly_empty_below: load_with_warning(
                Self::BAND_MOSTLY_EMPTY_VAR,
                defaults.mostly_empty_below,
                percent,
                "must be between 0 and 100",
            ),
            optimal_below: load_with_warning(
                Self::BAND_OPTIMAL_VAR,
                defaults.optimal_below,
                percent,
                "must be between 0 and 100",
            ),
            well_filled_below: load_with_warning(
                Self::BAND_WELL_FILLED_VAR,
                defaults.well_filled_below,
                percent,
                "must be between 0 and 100",
            ),
        };
        let bands = if bands.is_ordered() {
            bands
        } else {
            warn!(
                "⚠️ Occupancy bands {:?} are not ascending. Using defaults.",
                bands
            );
            defaults
        };

        let allocator = AllocatorConfig::builder()
            .max_placeable_ceiling(max_placeable_ceiling)
            .lock_timeout(Duration::from_millis(lock_timeout_ms))
            .commit_retries(commit_retries)
            .top_items(top_items)
            .occupancy_bands(bands)
            .build();

        Self { allocator }
    }

    /// Returns the configured AllocatorConfig.
    pub fn allocator_config(&self) -> AllocatorConfig {
        self.allocator
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

/// Parses a raw value and checks it, returning `None` (with a warning) when unusable.
fn parse_checked<T>(
    var_name: &str,
    raw: &str,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> Option<T>
where
    T: FromStr + Copy + Display,
    T::Err: Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) if validator(value) => Some(value),
        Ok(_) => {
            warn!(
                "⚠️ {} contains invalid value '{}': {}.",
                var_name, raw, invalid_hint
            );
            None
        }
        Err(err) => {
            warn!("⚠️ Could not parse {} ('{}'): {}.", var_name, raw, err);
            None
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Copy + Display + PartialEq,
    T::Err: Display,
{
    let Some(raw) = env_string(var_name) else {
        return default;
    };
    match parse_checked(var_name, &raw, validator, invalid_hint) {
        Some(value) => {
            if value != default {
                info!("🔧 {} = {} (default {})", var_name, value, default);
            }
            value
        }
        None => {
            warn!("⚠️ Using default {} for {}.", default, var_name);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checked_accepts_valid_numbers() {
        assert_eq!(parse_checked("TEST_VAR", "250", |v: u64| v > 0, "hint"), Some(250));
        assert_eq!(parse_checked("TEST_VAR", " 42 ", |v: u32| v > 0, "hint"), Some(42));
        assert_eq!(
            parse_checked("TEST_VAR", "12.5", |v: f64| v >= 0.0, "hint"),
            Some(12.5)
        );
    }

    #[test]
    fn test_parse_checked_rejects_invalid_values() {
        assert_eq!(parse_checked("TEST_VAR", "0", |v: u64| v > 0, "hint"), None);
        assert_eq!(parse_checked("TEST_VAR", "-1", |v: u32| v > 0, "hint"), None);
        assert_eq!(parse_checked("TEST_VAR", "abc", |v: u16| v > 0, "hint"), None);
        assert_eq!(
            parse_checked("TEST_VAR", "101", |v: f64| (0.0..=100.0).contains(&v), "hint"),
            None
        );
    }

    #[test]
    fn test_missing_variable_falls_back_to_default() {
        let value = load_with_warning(
            "STOCKPLACE_TEST_VARIABLE_THAT_IS_NEVER_SET",
            7u32,
            |v| v > 0,
            "hint",
        );
        assert_eq!(value, 7);
    }

    #[test]
    fn test_default_settings_match_engine_defaults() {
        let config = AllocatorConfig::default();
        assert_eq!(
            config.max_placeable_ceiling,
            AllocatorConfig::DEFAULT_MAX_PLACEABLE_CEILING
        );
        assert_eq!(config.lock_timeout, AllocatorConfig::DEFAULT_LOCK_TIMEOUT);
        assert!(config.occupancy_bands.is_ordered());
    }
}
