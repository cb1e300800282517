use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

// region:        --- Config

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source name to API key.
    pub api_keys: HashMap<String, String>,
    pub default_settings: DefaultSettings,
    pub active_enumeration: ActiveEnumeration,
    pub llm_enumeration: LlmEnumeration,
    pub tracking: Tracking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultSettings {
    /// Per-domain deadline, in minutes.
    pub timeout: u64,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self { timeout: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverBackend {
    Puredns,
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveEnumeration {
    pub enabled: bool,
    pub dsieve_top: usize,
    pub dsieve_factor: usize,
    pub output_dir: PathBuf,
    pub max_candidates: usize,
    pub threads: usize,
    pub permutation_depth: usize,
    pub permutation_threads: usize,
    pub permutation_numbers: u32,
    pub resolver: ResolverBackend,
    pub auto_install: bool,
}

impl Default for ActiveEnumeration {
    fn default() -> Self {
        Self {
            enabled: false,
            dsieve_top: 50,
            dsieve_factor: 4,
            output_dir: PathBuf::from("output"),
            max_candidates: 25_000,
            threads: 100,
            permutation_depth: 1,
            permutation_threads: 10,
            permutation_numbers: 0,
            resolver: ResolverBackend::Puredns,
            auto_install: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmEnumeration {
    pub enabled: bool,
    pub device: String,
    pub num_predictions: usize,
    pub max_recursion: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub run_after_passive: bool,
    pub run_after_active: bool,
    pub python: String,
    pub script: PathBuf,
}

impl Default for LlmEnumeration {
    fn default() -> Self {
        Self {
            enabled: false,
            device: "cpu".to_string(),
            num_predictions: 50,
            max_recursion: 3,
            max_tokens: 10,
            temperature: 0.0,
            run_after_passive: true,
            run_after_active: false,
            python: "python3".to_string(),
            script: PathBuf::from("llm_inference.py"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tracking {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("output/tracking.json"),
        }
    }
}

// endregion:     --- Config

impl Config {
    /// Loads `path`, or the first config found in the default locations.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => find_config_file(),
        };
        debug!("{:12} - {:?}", "CONFIG", path);

        if !path.is_file() {
            return Err(Error::Config(format!(
                "config file not found at {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;

        for source in config.api_keys.keys() {
            if config.api_key(source).is_some() {
                info!("{:12} - {}", "API KEY", source);
            }
        }

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_settings.timeout == 0 {
            return Err(Error::Config("timeout must be greater than 0".into()));
        }
        if self.active_enumeration.threads == 0 || self.active_enumeration.permutation_threads == 0 {
            return Err(Error::Config("thread counts must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_settings.timeout * 60)
    }

    /// Non-empty API key configured for `source`, trimmed.
    pub fn api_key(&self, source: &str) -> Option<&str> {
        self.api_keys
            .get(source)
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }
}

fn find_config_file() -> PathBuf {
    let mut candidates = vec![
        PathBuf::from("config.yaml"),
        PathBuf::from("config/config.yaml"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(Path::new(&home).join(".subscout").join("config.yaml"));
    }

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from("config/config.yaml"))
}

// region:        --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config = Config::from_yaml(
            "api_keys:\n  chaos: abc\n  virustotal: \"\"\ndefault_settings:\n  timeout: 5\nactive_enumeration:\n  enabled: true\n  resolver: builtin\n",
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert!(config.active_enumeration.enabled);
        assert_eq!(config.active_enumeration.resolver, ResolverBackend::Builtin);
        assert_eq!(config.active_enumeration.max_candidates, 25_000);
        assert_eq!(config.api_key("chaos"), Some("abc"));
        assert_eq!(config.api_key("virustotal"), None);
        assert_eq!(config.llm_enumeration.max_recursion, 3);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_yaml("default_settings:\n  timeout: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "tracking:\n  enabled: true\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(config.tracking.enabled);
    }
}

// endregion:     --- Tests
