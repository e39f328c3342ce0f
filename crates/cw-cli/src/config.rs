//! Configuration loading for the crew-watch CLI.

use anyhow::{Context, Result};
use cw_core::{AggregatorConfig, ReconcilerConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configured roster providers, keyed by provider id.
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// Refresh scheduling settings.
    #[serde(default)]
    pub refresh: RefreshSettings,

    /// Path of the durable snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            refresh: RefreshSettings::default(),
            snapshot_path: default_snapshot_path(),
            logging: LoggingSettings::default(),
            api: ApiSettings::default(),
        }
    }
}

fn default_snapshot_path() -> String {
    "crew-watch-snapshot.json".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(
        "open-notify".to_string(),
        ProviderConfig {
            kind: "open_notify".to_string(),
            ..ProviderConfig::default()
        },
    );
    providers
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Creates a copy with credentials redacted, for display.
    pub fn redact_secrets(&self) -> Self {
        let mut config = self.clone();
        for provider in config.providers.values_mut() {
            if !provider.api_key.is_empty() {
                provider.api_key = "***REDACTED***".to_string();
            }
        }
        config
    }

    /// Provider ids that are enabled, sorted.
    pub fn enabled_providers(&self) -> Vec<(&String, &ProviderConfig)> {
        let mut enabled: Vec<_> = self
            .providers
            .iter()
            .filter(|(_, p)| p.enabled)
            .collect();
        enabled.sort_by(|a, b| a.0.cmp(b.0));
        enabled
    }

    /// Scheduler settings derived from the config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            steady_interval: Duration::from_secs(self.refresh.steady_interval_secs),
            accelerated_interval: Duration::from_secs(self.refresh.accelerated_interval_secs),
            backoff_floor: Duration::from_secs(self.refresh.backoff_floor_secs),
            backoff_ceiling: Duration::from_secs(self.refresh.backoff_ceiling_secs),
            aggregator: AggregatorConfig {
                per_source_timeout: Duration::from_secs(self.refresh.per_source_timeout_secs),
                grace: Duration::from_secs(self.refresh.timeout_grace_secs),
            },
        }
    }

    /// Reconciler settings derived from the config.
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        let enabled = self.enabled_providers();
        let mut config =
            ReconcilerConfig::new(enabled.iter().map(|(id, _)| id.as_str()));
        for (id, provider) in enabled {
            config.trust_weights.insert(id.clone(), provider.trust_weight);
        }
        config
    }

    /// Validates the configuration; returns human-readable problems.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.enabled_providers().is_empty() {
            report
                .errors
                .push("no enabled providers configured".to_string());
        }
        if self.enabled_providers().len() == 1 {
            report.warnings.push(
                "only one provider enabled; cross-source validation will mark everything partial"
                    .to_string(),
            );
        }

        for (id, provider) in &self.providers {
            match provider.kind.as_str() {
                "open_notify" => {}
                "agency_roster" => {
                    if provider.enabled && provider.base_url.is_empty() {
                        report
                            .errors
                            .push(format!("provider '{}' requires a base_url", id));
                    }
                }
                other => report
                    .errors
                    .push(format!("provider '{}' has unknown kind '{}'", id, other)),
            }
            if provider.trust_weight <= 0.0 {
                report
                    .errors
                    .push(format!("provider '{}' trust_weight must be positive", id));
            }
        }

        if self.refresh.accelerated_interval_secs >= self.refresh.steady_interval_secs {
            report.warnings.push(
                "accelerated interval is not shorter than the steady interval".to_string(),
            );
        }
        if self.refresh.backoff_floor_secs > self.refresh.backoff_ceiling_secs {
            report
                .errors
                .push("backoff floor exceeds backoff ceiling".to_string());
        }

        report
    }
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One provider's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider kind: `open_notify` or `agency_roster`.
    pub kind: String,

    /// Base URL; empty means the provider's default endpoint.
    #[serde(default)]
    pub base_url: String,

    /// Whether this provider participates in refresh cycles.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key / token, if the endpoint needs one.
    #[serde(default)]
    pub api_key: String,

    /// Static trust weight used to break attribute ties.
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_provider_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: String::new(),
            base_url: String::new(),
            enabled: true,
            api_key: String::new(),
            trust_weight: default_trust_weight(),
            timeout_secs: default_provider_timeout(),
            max_retries: default_provider_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_trust_weight() -> f64 {
    1.0
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_provider_retries() -> u32 {
    2
}

/// Refresh scheduling settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_steady_secs")]
    pub steady_interval_secs: u64,
    #[serde(default = "default_accelerated_secs")]
    pub accelerated_interval_secs: u64,
    #[serde(default = "default_per_source_timeout_secs")]
    pub per_source_timeout_secs: u64,
    #[serde(default = "default_timeout_grace_secs")]
    pub timeout_grace_secs: u64,
    #[serde(default = "default_backoff_floor_secs")]
    pub backoff_floor_secs: u64,
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            steady_interval_secs: default_steady_secs(),
            accelerated_interval_secs: default_accelerated_secs(),
            per_source_timeout_secs: default_per_source_timeout_secs(),
            timeout_grace_secs: default_timeout_grace_secs(),
            backoff_floor_secs: default_backoff_floor_secs(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
        }
    }
}

fn default_steady_secs() -> u64 {
    6 * 60 * 60
}

fn default_accelerated_secs() -> u64 {
    2 * 60 * 60
}

fn default_per_source_timeout_secs() -> u64 {
    10
}

fn default_timeout_grace_secs() -> u64 {
    2
}

fn default_backoff_floor_secs() -> u64 {
    5 * 60
}

fn default_backoff_ceiling_secs() -> u64 {
    60 * 60
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to log in JSON format.
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Host to bind.
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Port to bind.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        let report = config.validate();
        assert!(report.is_ok(), "errors: {:?}", report.errors);
        // Single provider should at least warn.
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
providers:
  open-notify:
    kind: open_notify
  agency-roster:
    kind: agency_roster
    base_url: https://manifests.example.org
    api_key: secret-token
    trust_weight: 2.0

refresh:
  steady_interval_secs: 3600
  accelerated_interval_secs: 900

snapshot_path: /var/lib/crew-watch/snapshot.json
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.refresh.steady_interval_secs, 3600);
        assert_eq!(
            config.providers.get("agency-roster").unwrap().trust_weight,
            2.0
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redact_secrets() {
        let yaml = r#"
providers:
  agency-roster:
    kind: agency_roster
    base_url: https://manifests.example.org
    api_key: super-secret
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let redacted = config.redact_secrets();
        assert_eq!(
            redacted.providers.get("agency-roster").unwrap().api_key,
            "***REDACTED***"
        );
        // The original is untouched.
        assert_eq!(
            config.providers.get("agency-roster").unwrap().api_key,
            "super-secret"
        );
    }

    #[test]
    fn test_validation_catches_problems() {
        let yaml = r#"
providers:
  broken:
    kind: mystery
  manifests:
    kind: agency_roster
    trust_weight: -1.0
refresh:
  backoff_floor_secs: 7200
  backoff_ceiling_secs: 60
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let report = config.validate();
        assert!(!report.is_ok());
        assert!(report.errors.iter().any(|e| e.contains("unknown kind")));
        assert!(report.errors.iter().any(|e| e.contains("base_url")));
        assert!(report.errors.iter().any(|e| e.contains("trust_weight")));
        assert!(report.errors.iter().any(|e| e.contains("backoff")));
    }

    #[test]
    fn test_reconciler_config_carries_trust_weights() {
        let yaml = r#"
providers:
  open-notify:
    kind: open_notify
  agency-roster:
    kind: agency_roster
    base_url: https://manifests.example.org
    trust_weight: 2.5
  disabled-one:
    kind: open_notify
    enabled: false
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        let reconciler = config.reconciler_config();
        assert_eq!(reconciler.configured_providers.len(), 2);
        assert_eq!(reconciler.trust_weights.get("agency-roster"), Some(&2.5));
        assert!(!reconciler
            .configured_providers
            .contains(&"disabled-one".to_string()));
    }
}
