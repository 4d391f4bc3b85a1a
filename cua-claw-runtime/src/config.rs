//! Runtime configuration loader.

use crate::compactor::CompactionPolicy;
use crate::enforcer::EnforcerPolicy;
use crate::interfaces::{RuntimeError, Truncation};
use crate::retry::RetryPolicy;
use crate::safety::{SafetyPolicy, DEFAULT_BLOCKED_DOMAINS};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Turn loop, compaction and recovery settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub keep_tail: usize,
    pub keep_images: usize,
    pub pad_pairs: usize,
    pub max_attempts: u32,
    pub max_widenings: u32,
    pub widen_factor: usize,
    pub max_tail: usize,
    pub backoff_base_ms: u64,
    pub backoff_factor: f64,
    pub backoff_max_ms: u64,
    pub full_log_fallback: bool,
    pub max_iterations: usize,
    pub reason_queue_len: usize,
    pub blocked_domains: Vec<String>,
    pub default_instruction: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            keep_tail: 8,
            keep_images: 1,
            pad_pairs: 0,
            max_attempts: 3,
            max_widenings: 2,
            widen_factor: 2,
            max_tail: 64,
            backoff_base_ms: 700,
            backoff_factor: 1.7,
            backoff_max_ms: 20_000,
            full_log_fallback: true,
            max_iterations: 100,
            reason_queue_len: 16,
            blocked_domains: DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            default_instruction: None,
        }
    }
}

impl LoopConfig {
    pub fn compaction_policy(&self) -> CompactionPolicy {
        CompactionPolicy {
            keep_tail: self.keep_tail,
            keep_images: self.keep_images,
        }
    }

    pub fn enforcer_policy(&self) -> EnforcerPolicy {
        EnforcerPolicy {
            pad_pairs: self.pad_pairs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            max_widenings: self.max_widenings,
            widen_factor: self.widen_factor,
            max_tail: self.max_tail,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_factor: self.backoff_factor,
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            full_log_fallback: self.full_log_fallback,
        }
    }

    pub fn safety_policy(&self) -> SafetyPolicy {
        SafetyPolicy::new(self.blocked_domains.iter().cloned())
    }
}

/// Reasoning service connection settings.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub connect_timeout_secs: f64,
    pub read_timeout_secs: f64,
    pub reasoning_effort: String,
    pub reasoning_summary: String,
    pub truncation: Truncation,
    pub store: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "computer-use-preview".to_string(),
            api_key: None,
            organization: None,
            connect_timeout_secs: 20.0,
            read_timeout_secs: 180.0,
            reasoning_effort: "medium".to_string(),
            reasoning_summary: "auto".to_string(),
            truncation: Truncation::Auto,
            store: true,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("organization", &self.organization)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("reasoning_summary", &self.reasoning_summary)
            .field("truncation", &self.truncation)
            .field("store", &self.store)
            .finish()
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub agent: LoopConfig,
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, RuntimeError> {
    value.trim().parse().map_err(|_| {
        RuntimeError::ConfigError(format!("Invalid value for {}: {}", name, value))
    })
}

impl Config {
    /// Apply environment overrides through a lookup function.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.service.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_RESPONSES_URL") {
            let url = url.trim().trim_end_matches('/');
            self.service.base_url = url.strip_suffix("/responses").unwrap_or(url).to_string();
        }
        if let Some(org) = get("OPENAI_ORG") {
            self.service.organization = Some(org);
        }
        if let Some(model) = get("MODEL") {
            self.service.model = model;
        }
        if let Some(v) = get("RESP_CONNECT_TIMEOUT") {
            self.service.connect_timeout_secs = parse_env("RESP_CONNECT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("RESP_READ_TIMEOUT") {
            self.service.read_timeout_secs = parse_env("RESP_READ_TIMEOUT", &v)?;
        }
        if let Some(v) = get("RESP_MAX_RETRIES") {
            self.agent.max_attempts = parse_env("RESP_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("RESP_BACKOFF_BASE") {
            let seconds: f64 = parse_env("RESP_BACKOFF_BASE", &v)?;
            self.agent.backoff_base_ms = (seconds * 1000.0).round().max(0.0) as u64;
        }
        if let Some(effort) = get("REASONING_EFFORT") {
            self.service.reasoning_effort = effort;
        }
        if let Some(summary) = get("REASONING_SUMMARY") {
            self.service.reasoning_summary = summary;
        }
        if let Some(instruction) = get("DEFAULT_INSTRUCTION") {
            self.agent.default_instruction = Some(instruction);
        }

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<(), RuntimeError> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Reject settings the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let fail = |msg: &str| Err(RuntimeError::ConfigError(msg.to_string()));

        if self.service.base_url.trim().is_empty() {
            return fail("service.base_url cannot be empty");
        }
        if self.service.model.trim().is_empty() {
            return fail("service.model cannot be empty");
        }
        if self.service.connect_timeout_secs <= 0.0 || self.service.read_timeout_secs <= 0.0 {
            return fail("service timeouts must be positive");
        }
        if self.agent.keep_tail == 0 {
            return fail("agent.keep_tail must be at least 1");
        }
        if self.agent.max_tail < self.agent.keep_tail {
            return fail("agent.max_tail must be >= agent.keep_tail");
        }
        if self.agent.max_attempts == 0 {
            return fail("agent.max_attempts must be at least 1");
        }
        if self.agent.widen_factor < 2 {
            return fail("agent.widen_factor must be at least 2");
        }
        if self.agent.backoff_factor < 1.0 {
            return fail("agent.backoff_factor must be >= 1.0");
        }
        if self.agent.max_iterations == 0 {
            return fail("agent.max_iterations must be at least 1");
        }
        if self.agent.reason_queue_len == 0 {
            return fail("agent.reason_queue_len must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from a YAML file.
///
/// # Arguments
/// * `config_path` - Path to YAML config file
///
/// # Returns
/// Validated Config; sections and fields left out take their defaults
///
/// # Errors
/// Returns error if the file is missing, empty, not valid YAML, or fails
/// validation
pub fn load_config(config_path: &str) -> Result<Config, RuntimeError> {
    let config_file = Path::new(config_path);

    if !config_file.exists() {
        return Err(RuntimeError::ConfigError(format!(
            "Config file not found: {}",
            config_path
        )));
    }

    let content = std::fs::read_to_string(config_file)?;

    if content.trim().is_empty() {
        return Err(RuntimeError::ConfigError("Config file is empty".to_string()));
    }

    let config: Config = serde_yaml::from_str(&content)
        .map_err(|e| RuntimeError::ConfigError(format!("Invalid YAML: {}", e)))?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cua.yaml");
        fs::write(
            &config_file,
            concat!(
                "service:\n  model: computer-use-preview\n  truncation: disabled\n",
                "agent:\n  keep_tail: 12\n  max_attempts: 5\n",
                "  blocked_domains:\n    - example.org\n",
            ),
        )
        .unwrap();

        let config = load_config(config_file.to_str().unwrap()).unwrap();
        assert_eq!(config.agent.keep_tail, 12);
        assert_eq!(config.agent.max_attempts, 5);
        assert_eq!(config.agent.keep_images, 1);
        assert_eq!(config.agent.blocked_domains, vec!["example.org"]);
        assert_eq!(config.service.truncation, Truncation::Disabled);
        assert_eq!(config.service.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_config_file_not_found() {
        match load_config("/nonexistent/cua.yaml") {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("Config file not found")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_empty_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cua.yaml");
        fs::write(&config_file, "  \n").unwrap();

        match load_config(config_file.to_str().unwrap()) {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cua.yaml");
        fs::write(&config_file, "agent:\n  keep_tail: many\n").unwrap();

        match load_config(config_file.to_str().unwrap()) {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("Invalid YAML")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("cua.yaml");
        fs::write(&config_file, "agent:\n  max_attempts: 0\n").unwrap();

        match load_config(config_file.to_str().unwrap()) {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("max_attempts")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_RESPONSES_URL", "https://proxy.local/v1/responses"),
                ("MODEL", "cua-test"),
                ("RESP_MAX_RETRIES", "5"),
                ("RESP_BACKOFF_BASE", "1.5"),
                ("RESP_READ_TIMEOUT", "30"),
                ("DEFAULT_INSTRUCTION", "open the docs"),
                ("OPENAI_ORG", ""),
            ]))
            .unwrap();

        assert_eq!(config.service.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.service.base_url, "https://proxy.local/v1");
        assert_eq!(config.service.model, "cua-test");
        assert_eq!(config.service.organization, None);
        assert_eq!(config.service.read_timeout_secs, 30.0);
        assert_eq!(config.agent.max_attempts, 5);
        assert_eq!(config.agent.backoff_base_ms, 1500);
        assert_eq!(config.agent.default_instruction.as_deref(), Some("open the docs"));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("RESP_MAX_RETRIES", "lots")]));
        match result {
            Err(RuntimeError::ConfigError(msg)) => assert!(msg.contains("RESP_MAX_RETRIES")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let service = ServiceConfig {
            api_key: Some("sk-secret".to_string()),
            ..ServiceConfig::default()
        };
        let rendered = format!("{:?}", service);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn test_policies_follow_config() {
        let config = LoopConfig {
            keep_tail: 4,
            pad_pairs: 2,
            backoff_base_ms: 0,
            ..LoopConfig::default()
        };
        assert_eq!(config.compaction_policy().keep_tail, 4);
        assert_eq!(config.enforcer_policy().pad_pairs, 2);
        assert_eq!(config.retry_policy().backoff_base, Duration::ZERO);
        assert!(config.safety_policy().is_blocked("https://evilvideos.com"));
    }
}
