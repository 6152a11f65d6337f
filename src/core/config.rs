//! Engine Configuration
//!
//! Retry bound, write validation, system fields and logging settings.

use serde::{Deserialize, Serialize};

use super::error::{CoreError, CoreResult};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive (default: "info"); `RUST_LOG` takes precedence
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum retries per action (default: unbounded)
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Validate documents before create/update (default: true)
    #[serde(default = "default_true")]
    pub validate_writes: bool,

    /// Inject `_id`, `_createdAt`, ... into every model (default: true)
    #[serde(default = "default_true")]
    pub system_fields: bool,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            validate_writes: default_true(),
            system_fields: default_true(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a config with a retry bound
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: Some(max_retries),
            ..Default::default()
        }
    }

    /// Parse a JSON config document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `AEROMODEL_*` environment variables
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("AEROMODEL_MAX_RETRIES") {
            let value = raw.trim().parse::<u32>().map_err(|_| {
                CoreError::invalid_params(format!("AEROMODEL_MAX_RETRIES must be an integer, got '{}'", raw))
            })?;
            config.max_retries = Some(value);
        }
        if let Some(raw) = lookup("AEROMODEL_VALIDATE_WRITES") {
            config.validate_writes = parse_flag("AEROMODEL_VALIDATE_WRITES", &raw)?;
        }
        if let Some(raw) = lookup("AEROMODEL_LOG") {
            config.log.filter = raw;
        }
        if let Some(raw) = lookup("AEROMODEL_LOG_JSON") {
            config.log.json = parse_flag("AEROMODEL_LOG_JSON", &raw)?;
        }

        Ok(config)
    }
}

fn parse_flag(name: &str, raw: &str) -> CoreResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::invalid_params(format!("{} must be a boolean, got '{}'", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, None);
        assert!(config.validate_writes);
        assert!(config.system_fields);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{"max_retries": 3, "log": {"json": true}}"#).unwrap();
        assert_eq!(config.max_retries, Some(3));
        assert!(config.validate_writes);
        assert!(config.log.json);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("AEROMODEL_MAX_RETRIES", "2"),
            ("AEROMODEL_VALIDATE_WRITES", "off"),
            ("AEROMODEL_LOG", "aeromodel=debug"),
        ]
        .into_iter()
        .collect();
        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config, EngineConfig {
            max_retries: Some(2),
            validate_writes: false,
            system_fields: true,
            log: LogConfig {
                filter: "aeromodel=debug".to_string(),
                json: false,
            },
        });
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = EngineConfig::from_lookup(|k| (k == "AEROMODEL_MAX_RETRIES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.message().contains("AEROMODEL_MAX_RETRIES"));
    }
}
