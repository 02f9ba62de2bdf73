// src/config.rs
// Configuration loading and startup validation.

use log::{error, info, warn};
use std::env;
use std::time::Duration;

/// Every knob the coordinator needs, loaded from environment variables.
///
/// Periods and limits fall back to the defaults named in the external
/// interfaces table; everything else has no sane default and is surfaced as
/// a validation error if missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub local_broker_host: String,
    pub local_broker_port: u16,
    pub local_ca_path: String,
    pub local_client_cert_path: String,
    pub local_client_key_path: String,

    pub remote_broker_host: String,
    pub remote_broker_port: u16,
    pub remote_broker_username: String,
    pub remote_broker_password: String,

    pub edge_api_key: String,
    pub origin_base_url: String,
    pub signing_key_path: String,
    pub log_file_path: String,

    pub reconcile_period: Duration,
    pub upload_period: Duration,
    pub heartbeat_period: Duration,
    pub vote_timeout: Duration,
    pub lockout_window: Duration,
    pub publish_limit: usize,
}

impl Config {
    /// Load configuration from the process environment. `.env` (if present)
    /// should already have been merged in via `dotenvy::dotenv()` before
    /// calling this.
    pub fn from_env() -> Self {
        Self {
            local_broker_host: env_or("LOCAL_BROKER_HOST", "localhost"),
            local_broker_port: env_parse_or("LOCAL_BROKER_PORT", 8883),
            local_ca_path: env_or("LOCAL_BROKER_CA_PATH", ""),
            local_client_cert_path: env_or("LOCAL_BROKER_CERT_PATH", ""),
            local_client_key_path: env_or("LOCAL_BROKER_KEY_PATH", ""),

            remote_broker_host: env_or("REMOTE_BROKER_HOST", ""),
            remote_broker_port: env_parse_or("REMOTE_BROKER_PORT", 8883),
            remote_broker_username: env_or("REMOTE_BROKER_USERNAME", ""),
            remote_broker_password: env_or("REMOTE_BROKER_PASSWORD", ""),

            edge_api_key: env_or("EDGE_API_KEY", ""),
            origin_base_url: env_or("ORIGIN_BASE_URL", ""),
            signing_key_path: env_or("SIGNING_KEY_PATH", ""),
            log_file_path: env_or("ACCESS_LOG_PATH", "access_log.csv"),

            reconcile_period: Duration::from_secs(env_parse_or("ACCESS_LIST_PERIOD_SECS", 300)),
            upload_period: Duration::from_secs(env_parse_or("LOGS_PERIOD_SECS", 604_800)),
            heartbeat_period: Duration::from_secs(env_parse_or("HEARTBEAT_PERIOD_SECS", 1_800)),
            vote_timeout: Duration::from_secs(env_parse_or("VOTE_TIMEOUT_SECS", 10)),
            lockout_window: Duration::from_secs(env_parse_or("LOCKOUT_WINDOW_SECS", 10)),
            publish_limit: env_parse_or("PUBLISH_LIMIT", 100),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Accumulated result of a configuration validation pass.
pub struct ConfigValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    fn new() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn add_warning(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    fn add_error(&mut self, msg: String) {
        self.errors.push(msg);
        self.valid = false;
    }

    pub fn print_summary(&self) {
        if !self.warnings.is_empty() {
            warn!("configuration warnings:");
            for w in &self.warnings {
                warn!(" - {}", w);
            }
        }

        if !self.errors.is_empty() {
            error!("configuration errors:");
            for e in &self.errors {
                error!(" - {}", e);
            }
        }

        if self.valid && self.warnings.is_empty() {
            info!("configuration validation passed");
        }
    }
}

/// Validate configuration at startup. Missing periods/limits are never
/// errors (they have defaults); missing credentials and paths are.
pub fn validate_config(config: &Config) -> ConfigValidation {
    let mut validation = ConfigValidation::new();

    if config.signing_key_path.is_empty() {
        validation.add_error("SIGNING_KEY_PATH is not set".into());
    } else if !std::path::Path::new(&config.signing_key_path).exists() {
        validation.add_error(format!(
            "SIGNING_KEY_PATH points to non-existent file: {}",
            config.signing_key_path
        ));
    }

    if config.origin_base_url.is_empty() {
        validation.add_error("ORIGIN_BASE_URL is not set".into());
    }

    if config.edge_api_key.is_empty() {
        validation.add_warning("EDGE_API_KEY is not set - origin will not be able to attribute relayed events".into());
    }

    if config.remote_broker_host.is_empty() {
        validation.add_warning("REMOTE_BROKER_HOST is not set - relay to origin MQTT bus disabled".into());
    }

    if config.local_ca_path.is_empty() || config.local_client_cert_path.is_empty() || config.local_client_key_path.is_empty() {
        validation.add_warning("local broker mTLS materials incomplete - local session will fail to connect".into());
    }

    if config.publish_limit == 0 {
        validation.add_error("PUBLISH_LIMIT must be greater than zero".into());
    }

    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_flags_missing_signing_key() {
        let mut config = Config::from_env();
        config.signing_key_path = String::new();
        config.origin_base_url = "http://origin.example".into();
        let validation = validate_config(&config);
        assert!(!validation.valid);
        assert!(validation
            .errors
            .iter()
            .any(|e| e.contains("SIGNING_KEY_PATH")));
    }

    #[test]
    fn defaults_match_documented_periods() {
        // clear any env contamination from the process for this test
        let config = Config {
            local_broker_host: "localhost".into(),
            local_broker_port: 8883,
            local_ca_path: String::new(),
            local_client_cert_path: String::new(),
            local_client_key_path: String::new(),
            remote_broker_host: String::new(),
            remote_broker_port: 8883,
            remote_broker_username: String::new(),
            remote_broker_password: String::new(),
            edge_api_key: String::new(),
            origin_base_url: String::new(),
            signing_key_path: String::new(),
            log_file_path: "access_log.csv".into(),
            reconcile_period: Duration::from_secs(300),
            upload_period: Duration::from_secs(604_800),
            heartbeat_period: Duration::from_secs(1_800),
            vote_timeout: Duration::from_secs(10),
            lockout_window: Duration::from_secs(10),
            publish_limit: 100,
        };
        assert_eq!(config.reconcile_period, Duration::from_secs(300));
        assert_eq!(config.vote_timeout, Duration::from_secs(10));
        assert_eq!(config.lockout_window, Duration::from_secs(10));
        assert_eq!(config.publish_limit, 100);
    }
}
