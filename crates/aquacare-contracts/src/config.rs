//! Engine Configuration

use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window for "expiring soon" on dashboards and summaries
    pub expiring_soon_days: u32,
    /// Term length when neither plan nor admin supplies one
    pub default_duration_months: u32,
    /// Visit quota for rentals whose plan carries none; 0 keeps the plan's
    pub default_rental_quota: u32,
    /// Attempts for a version-checked write before giving up
    pub max_update_retries: u32,
    /// Period of the background expiry sweep
    pub sweep_interval_secs: u64,
    /// Page size when the caller does not ask for one
    pub default_page_size: u32,
    /// Prefix for tickets mirrored from self-service visits
    pub ticket_prefix: String,
    /// Prefix for tickets entered by an admin
    pub admin_ticket_prefix: String,
    /// JSON dump of both stores to load at startup
    pub snapshot_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: 30,
            default_duration_months: 12,
            default_rental_quota: 0,
            max_update_retries: 32,
            sweep_interval_secs: 3600,
            default_page_size: 10,
            ticket_prefix: "SR".into(),
            admin_ticket_prefix: "TKT".into(),
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when it cannot be read.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path, error = %e, "Config not usable, using defaults");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_duration_months == 0 {
            return Err(ConfigError::Invalid("default_duration_months must be positive".into()));
        }
        if self.max_update_retries == 0 {
            return Err(ConfigError::Invalid("max_update_retries must be positive".into()));
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid("default_page_size must be positive".into()));
        }
        if self.ticket_prefix.trim().is_empty() || self.admin_ticket_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("ticket prefixes cannot be blank".into()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "expiring_soon_days": 14, "ticket_prefix": "SVC" }"#).unwrap();
        assert_eq!(config.expiring_soon_days, 14);
        assert_eq!(config.ticket_prefix, "SVC");
        assert_eq!(config.max_update_retries, 32);
        assert!(config.snapshot_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EngineConfig { max_update_retries: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = EngineConfig::load_or_default("/nonexistent/aquacare.json");
        assert_eq!(config, EngineConfig::default());
    }
}
