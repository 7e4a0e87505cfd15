use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::net::ToSocketAddrs;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;

const MAX_REQUEST_TIMEOUT_SECS: u64 = 60;
const MIN_BODY_BYTES: usize = 64;
const MAX_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Listener
    pub host: String,
    pub port: u16,

    // Per-request limits.
    // The timeout bounds reading the whole request (slow-loris protection).
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            host: get("SLEEPCYCLE_HOST")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: get("SLEEPCYCLE_PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .context("SLEEPCYCLE_PORT must be a valid port number")?,

            request_timeout_secs: get("REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: get("MAX_BODY_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.bind_addr().to_socket_addrs().is_err() {
            errors.push(format!(
                "Cannot resolve SLEEPCYCLE_HOST '{}'. Use an IP address or resolvable name.",
                self.host
            ));
        }

        if self.request_timeout_secs == 0 {
            errors.push("REQUEST_TIMEOUT_SECS must be greater than 0.".to_string());
        } else if self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            errors.push(format!(
                "REQUEST_TIMEOUT_SECS={} seems too long (max recommended: {}).",
                self.request_timeout_secs, MAX_REQUEST_TIMEOUT_SECS
            ));
        }

        if self.max_body_bytes < MIN_BODY_BYTES {
            errors.push(format!(
                "MAX_BODY_BYTES={} is too small to hold a request (min: {}).",
                self.max_body_bytes, MIN_BODY_BYTES
            ));
        } else if self.max_body_bytes > MAX_BODY_LIMIT {
            errors.push(format!(
                "MAX_BODY_BYTES={} seems too large (max: {}).",
                self.max_body_bytes, MAX_BODY_LIMIT
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    /// "host:port" for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config = Config::from_map(&HashMap::new()).expect("empty env should parse");

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8787);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_body_bytes, 16 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_port_and_host() {
        let mut env = HashMap::new();
        env.insert("SLEEPCYCLE_HOST", "127.0.0.1");
        env.insert("SLEEPCYCLE_PORT", "9000");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_blank_host_uses_default() {
        let mut env = HashMap::new();
        env.insert("SLEEPCYCLE_HOST", "  ");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_invalid_port_not_numeric() {
        let mut env = HashMap::new();
        env.insert("SLEEPCYCLE_PORT", "not_a_number");
        let err = Config::from_map(&env).unwrap_err().to_string();
        assert!(err.contains("SLEEPCYCLE_PORT"), "error should mention SLEEPCYCLE_PORT: {}", err);
    }

    #[test]
    fn test_invalid_port_out_of_range() {
        let mut env = HashMap::new();
        env.insert("SLEEPCYCLE_PORT", "99999");
        assert!(Config::from_map(&env).is_err());
    }

    #[test]
    fn test_invalid_limits_use_defaults() {
        let mut env = HashMap::new();
        env.insert("REQUEST_TIMEOUT_SECS", "soon");
        env.insert("MAX_BODY_BYTES", "-1");
        let config = Config::from_map(&env).expect("should parse with defaults");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_request_timeout_duration() {
        let mut env = HashMap::new();
        env.insert("REQUEST_TIMEOUT_SECS", "12");
        let config = Config::from_map(&env).expect("should parse");
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("REQUEST_TIMEOUT_SECS"), "{}", err);
    }

    #[test]
    fn test_validation_excessive_timeout() {
        let config = Config {
            request_timeout_secs: 600,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("too long"), "{}", err);
    }

    #[test]
    fn test_validation_body_limits() {
        let config = Config {
            max_body_bytes: 10,
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("too small"));

        let config = Config {
            max_body_bytes: 10 * 1024 * 1024,
            ..Config::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("too large"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = Config {
            request_timeout_secs: 0,
            max_body_bytes: 1,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("REQUEST_TIMEOUT_SECS"));
        assert!(err.contains("MAX_BODY_BYTES"));
    }
}
