//! Configuration management for Lucipedia.
//!
//! Configuration is stored in TOML and layered in this order:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. The config file: `$LUCIPEDIA_CONFIG` if set, otherwise `config.toml` in the
//!    platform config directory
//! 3. Environment variable overrides
//!
//! ## Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `LUCIPEDIA_DATA_DIR`, `DB_PATH` | Page store directory |
//! | `SERVER_PORT` | Port of the HTTP bind address |
//! | `LOG_LEVEL` | Default log filter |
//! | `LLM_ENDPOINT` | Base URL of the chat completion API |
//! | `LLM_API_KEY` | Bearer token for the chat completion API |
//! | `LLM_MODELS` | JSON array, or `{"models": [...]}`, in fallback order |
//!
//! ## Example Configuration File
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! shutdown_grace_secs = 10
//!
//! [llm]
//! endpoint = "https://api.openai.com/v1"
//! models = ["gpt-4o-mini", "gpt-4o"]
//! timeout_secs = 60
//!
//! [rate_limit]
//! burst = 10
//! refill_per_second = 5.0
//! idle_ttl_secs = 300
//! ```
//!
//! ```rust
//! use lucipedia_core::Config;
//!
//! let config: Config = toml::from_str("[rate_limit]\nburst = 3\n")?;
//! assert_eq!(config.rate_limit.burst, 3);
//! assert_eq!(config.server.shutdown_grace_secs, 10);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rate_limit::RateLimitSettings;
use crate::{Error, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Upper bound for `llm.timeout_secs` and `server.shutdown_grace_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `rate_limit.idle_ttl_secs`.
pub const MAX_IDLE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Model provider settings
    pub llm: LlmConfig,
    /// Per-client admission control
    pub rate_limit: RateLimitConfig,
    /// File system locations
    pub paths: PathsConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_grace_secs: u64,
    /// Let concurrent requests for the same missing slug share one generation.
    pub coalesce_generations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            shutdown_grace_secs: 10,
            coalesce_generations: false,
        }
    }
}

impl ServerConfig {
    /// Grace period as a [`Duration`].
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Model provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
    pub endpoint: String,

    /// Bearer token. Not written back by [`Config::save`] when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model names tried in order; the next one is used when a call fails
    /// with a transport or server error.
    pub models: Vec<String>,

    /// Sampling temperature for article generation.
    pub generation_temperature: f32,

    /// Sampling temperature for search suggestions.
    pub search_temperature: f32,

    /// Deadline for a single page generation, in seconds.
    pub timeout_secs: u64,

    /// Replaces the built-in article system prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Ask for a JSON payload with declared backlinks instead of bare markup.
    pub structured_output: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            models: vec!["gpt-4o-mini".to_string()],
            generation_temperature: 0.4,
            search_temperature: 0.2,
            timeout_secs: 60,
            system_prompt: None,
            structured_output: false,
        }
    }
}

impl LlmConfig {
    /// Generation deadline as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Token-bucket parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity.
    pub burst: u32,
    /// Tokens added per second.
    pub refill_per_second: f64,
    /// Idle clients are forgotten after this many seconds. `0` disables
    /// eviction.
    pub idle_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 10,
            refill_per_second: 5.0,
            idle_ttl_secs: 300,
        }
    }
}

impl RateLimitConfig {
    /// Convert into limiter settings.
    #[must_use]
    pub fn settings(&self) -> RateLimitSettings {
        RateLimitSettings {
            burst: f64::from(self.burst),
            refill_per_second: self.refill_per_second,
            idle_ttl: Duration::from_secs(self.idle_ttl_secs),
        }
    }
}

/// File system locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the page store.
    ///
    /// Default locations:
    /// - Linux: `~/.local/share/lucipedia`
    /// - macOS: `~/Library/Application Support/dev.lucipedia.lucipedia`
    /// - Windows: `%APPDATA%\lucipedia\lucipedia\data`
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: project_dirs().map_or_else(
                || PathBuf::from("./data"),
                |dirs| dirs.data_dir().to_path_buf(),
            ),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `lucipedia_core=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "lucipedia", "lucipedia")
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but cannot be read or parsed
    /// - An environment override has an invalid value
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML config file without applying environment overrides.
    ///
    /// The parsed values are checked with [`Config::validate`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, detail: String| {
            Err(Error::Config(format!("invalid {field}: {detail}")))
        };

        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > MAX_TIMEOUT_SECS {
            return invalid(
                "llm.timeout_secs",
                format!("{} (expected 1..={MAX_TIMEOUT_SECS})", self.llm.timeout_secs),
            );
        }
        for (field, value) in [
            ("llm.generation_temperature", self.llm.generation_temperature),
            ("llm.search_temperature", self.llm.search_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return invalid(field, format!("{value} (expected 0.0..=2.0)"));
            }
        }
        if self.server.shutdown_grace_secs > MAX_TIMEOUT_SECS {
            return invalid(
                "server.shutdown_grace_secs",
                format!("{} (expected at most {MAX_TIMEOUT_SECS})", self.server.shutdown_grace_secs),
            );
        }
        if self.rate_limit.burst == 0 {
            return invalid("rate_limit.burst", "0 (expected at least 1)".into());
        }
        let refill = self.rate_limit.refill_per_second;
        if !refill.is_finite() || refill < 0.0 {
            return invalid(
                "rate_limit.refill_per_second",
                format!("{refill} (expected a finite rate of at least 0)"),
            );
        }
        if self.rate_limit.idle_ttl_secs > MAX_IDLE_TTL_SECS {
            return invalid(
                "rate_limit.idle_ttl_secs",
                format!("{} (expected at most {MAX_IDLE_TTL_SECS})", self.rate_limit.idle_ttl_secs),
            );
        }
        Ok(())
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Where the config file lives: `$LUCIPEDIA_CONFIG`, else the platform
    /// config directory.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("LUCIPEDIA_CONFIG") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
        let dirs = project_dirs()
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from a variable lookup, then [`Config::validate`] the
    /// result. Blank values are ignored.
    ///
    /// Taking the lookup as a function keeps this testable without touching
    /// the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(dir) = get("LUCIPEDIA_DATA_DIR").or_else(|| get("DB_PATH")) {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = get("SERVER_PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid SERVER_PORT value: {port}")))?;
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map_or("0.0.0.0", |(host, _)| host);
            self.server.bind = format!("{host}:{port}");
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(endpoint) = get("LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(key) = get("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(models) = get("LLM_MODELS") {
            self.llm.models = parse_models(&models)
                .map_err(|e| Error::Config(format!("parsing LLM_MODELS: {e}")))?;
        }
        self.validate()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelList {
    Bare(Vec<String>),
    Wrapped { models: Vec<String> },
}

/// Parse `["a","b"]` or `{"models":["a","b"]}`.
///
/// Blank entries are dropped and an empty result is rejected, since the chat
/// client needs at least one model.
pub fn parse_models(raw: &str) -> Result<Vec<String>> {
    let parsed: ModelList = serde_json::from_str(raw)?;
    let models: Vec<String> = match parsed {
        ModelList::Bare(models) | ModelList::Wrapped { models } => models,
    }
    .into_iter()
    .map(|model| model.trim().to_string())
    .filter(|model| !model.is_empty())
    .collect();

    if models.is_empty() {
        return Err(Error::Config("models list is empty".into()));
    }
    Ok(models)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_values() {
        // Given: Default configuration is requested
        let config = Config::default();

        // Then: Defaults match the documented values
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(config.rate_limit.burst, 10);
        assert!((config.rate_limit.refill_per_second - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.rate_limit.idle_ttl_secs, 300);
        assert_eq!(config.llm.timeout(), Duration::from_secs(60));
        assert_eq!(config.logging.level, "info");
        assert!(!config.paths.data_dir.as_os_str().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        // Given: A file overriding a single field
        let config: Config = toml::from_str("[llm]\nmodels = [\"a\", \"b\"]\n").unwrap();

        // Then: Everything else is defaulted
        assert_eq!(config.llm.models, vec!["a", "b"]);
        assert_eq!(config.llm.endpoint, "https://api.openai.com/v1");
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.rate_limit.burst = 3;
        config.paths.data_dir = PathBuf::from("/srv/lucipedia");

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nbind = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();

        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_env_overrides() {
        // Given: Overrides for most settings
        let mut config = Config::default();
        let lookup = env(&[
            ("DB_PATH", "/var/lib/lucipedia"),
            ("SERVER_PORT", "9090"),
            ("LOG_LEVEL", "debug"),
            ("LLM_ENDPOINT", "http://localhost:11434/v1"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_MODELS", r#"{"models":["m1","m2"]}"#),
        ]);

        // When: Applying them
        config.apply_env(lookup).unwrap();

        // Then: Each one took effect
        assert_eq!(config.paths.data_dir, PathBuf::from("/var/lib/lucipedia"));
        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.llm.endpoint, "http://localhost:11434/v1");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.models, vec!["m1", "m2"]);
    }

    #[test]
    fn test_data_dir_env_wins_over_db_path() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("LUCIPEDIA_DATA_DIR", "/a"), ("DB_PATH", "/b")]))
            .unwrap();

        assert_eq!(config.paths.data_dir, PathBuf::from("/a"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("LOG_LEVEL", "  "), ("SERVER_PORT", "")]))
            .unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("SERVER_PORT", "eighty")]))
            .unwrap_err();

        assert!(err.to_string().contains("invalid SERVER_PORT value: eighty"));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let cases: [(&str, fn(&mut Config)); 8] = [
            ("llm.timeout_secs", |c| c.llm.timeout_secs = u64::MAX),
            ("llm.timeout_secs", |c| c.llm.timeout_secs = 0),
            ("llm.generation_temperature", |c| c.llm.generation_temperature = f32::NAN),
            ("server.shutdown_grace_secs", |c| c.server.shutdown_grace_secs = u64::MAX),
            ("rate_limit.burst", |c| c.rate_limit.burst = 0),
            ("rate_limit.refill_per_second", |c| c.rate_limit.refill_per_second = -1.0),
            ("rate_limit.refill_per_second", |c| c.rate_limit.refill_per_second = f64::NAN),
            ("rate_limit.idle_ttl_secs", |c| c.rate_limit.idle_ttl_secs = u64::MAX),
        ];

        for (field, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);

            let err = config.validate().unwrap_err();

            assert_eq!(err.category(), "config", "{field}");
            assert!(err.to_string().contains(field), "{err}");
        }
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_rejects_huge_timeout() {
        // Given: A file whose timeout would overflow the HTTP client deadline
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\ntimeout_secs = 9223372036854775807\n").unwrap();

        // When: Loading it
        let err = Config::load_from(&path).unwrap_err();

        // Then: It is reported as a configuration error instead of panicking later
        assert!(err.to_string().contains("llm.timeout_secs"));
    }

    #[test]
    fn test_apply_env_validates_result() {
        let mut config = Config::default();
        config.rate_limit.refill_per_second = -2.0;

        let err = config.apply_env(env(&[])).unwrap_err();

        assert!(err.to_string().contains("rate_limit.refill_per_second"));
    }

    #[test]
    fn test_parse_models_forms() {
        assert_eq!(parse_models(r#"["a", " b "]"#).unwrap(), vec!["a", "b"]);
        assert_eq!(parse_models(r#"{"models":["c"]}"#).unwrap(), vec!["c"]);
        assert!(parse_models(r#"{"models":[]}"#).is_err());
        assert!(parse_models("[]").is_err());
        assert!(parse_models("gpt-4o").is_err());
    }

    #[test]
    fn test_rate_limit_settings_conversion() {
        let settings = RateLimitConfig {
            burst: 3,
            refill_per_second: 3.0,
            idle_ttl_secs: 60,
        }
        .settings();

        assert!((settings.burst - 3.0).abs() < f64::EPSILON);
        assert_eq!(settings.idle_ttl, Duration::from_secs(60));
    }
}
