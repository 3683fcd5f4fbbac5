//! Configuration management for aiscout.
//!
//! Supports layered configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`config.toml` in the working directory by default)
//! 3. Environment variable overrides for LLM credentials (`AISCOUT_` prefix)
//!
//! The account sections (`[weixin_accounts]`, `[x_accounts]`,
//! `[youtube_channels]`, `[entity_mapping]`) are free-form tables whose key
//! case is preserved: keys are display names (or canonical entity names),
//! values are feed URLs, handles, channel ids, or alias lists respectively.

mod defaults;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use defaults::*;

/// Top-level configuration for a crawl batch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// LLM endpoint configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline worker and lookback settings.
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Micro-blog sources: display name -> feed URL.
    #[serde(default)]
    pub weixin_accounts: HashMap<String, String>,

    /// X sources: display name -> handle (without @).
    #[serde(default)]
    pub x_accounts: HashMap<String, String>,

    /// Video platform sources: display name -> channel id.
    #[serde(default)]
    pub youtube_channels: HashMap<String, String>,

    /// Legacy RSS bridge, used for X sources only when the direct scraper
    /// has no credentials.
    #[serde(default)]
    pub rsshub: RsshubConfig,

    /// Direct X scraper settings.
    #[serde(default)]
    pub x_scraper: XScraperConfig,

    /// Entity routing: canonical entity name -> comma-separated alias list.
    #[serde(default)]
    pub entity_mapping: HashMap<String, String>,
}

/// LLM endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// API key for the chat-completions endpoint.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default)]
    pub base_url: String,

    /// Model name for organization calls.
    #[serde(default)]
    pub model: String,

    /// Optional cheaper model for subtitle optimization.
    #[serde(default)]
    pub opt_model: Option<String>,

    /// Global cap on in-flight LLM requests, independent of worker count.
    #[serde(default = "default_llm_max_concurrency")]
    pub max_concurrency: usize,

    /// Whether to run LLM cleanup over raw video transcripts.
    #[serde(default)]
    pub enable_subtitle_optimization: bool,

    /// Path to the organizer prompt template file.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            opt_model: None,
            max_concurrency: default_llm_max_concurrency(),
            enable_subtitle_optimization: false,
            prompt_template: default_prompt_template(),
        }
    }
}

/// Pipeline worker and lookback settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Only items published within the last N days are processed.
    #[serde(default = "default_days_lookback")]
    pub days_lookback: i64,

    /// Worker count for the Organize stage.
    #[serde(default = "default_organize_workers")]
    pub organize_workers: usize,

    /// Worker count for the Enrich stage.
    #[serde(default = "default_enrich_workers")]
    pub enrich_workers: usize,

    /// Capacity of each inter-stage queue.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Root directory for batch output.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Minimum inter-source sleep for the serial X lane, seconds.
    #[serde(default = "default_x_request_delay_min")]
    pub x_request_delay_min: u64,

    /// Maximum inter-source sleep for the serial X lane, seconds.
    #[serde(default = "default_x_request_delay_max")]
    pub x_request_delay_max: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            days_lookback: default_days_lookback(),
            organize_workers: default_organize_workers(),
            enrich_workers: default_enrich_workers(),
            channel_capacity: default_channel_capacity(),
            output_dir: default_output_dir(),
            x_request_delay_min: default_x_request_delay_min(),
            x_request_delay_max: default_x_request_delay_max(),
        }
    }
}

/// Legacy RSS bridge configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RsshubConfig {
    /// Bridge base URL, e.g. `http://localhost:1200`.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Direct X scraper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct XScraperConfig {
    /// Inline credential pool: `auth_token:csrf;auth_token:csrf`.
    #[serde(default)]
    pub auth_credentials: String,

    /// Fallback environment credential file (`KEY="VALUE"` lines).
    #[serde(default)]
    pub env_file: Option<String>,

    /// Per-user tweet cap for a sweep.
    #[serde(default = "default_max_tweets_per_user")]
    pub max_tweets_per_user: u32,

    /// Minimum inter-page delay, seconds.
    #[serde(default = "default_request_delay_min")]
    pub request_delay_min: f64,

    /// Maximum inter-page delay, seconds.
    #[serde(default = "default_request_delay_max")]
    pub request_delay_max: f64,

    /// Minimum delay between users, seconds.
    #[serde(default = "default_user_switch_delay_min")]
    pub user_switch_delay_min: f64,

    /// Maximum delay between users, seconds.
    #[serde(default = "default_user_switch_delay_max")]
    pub user_switch_delay_max: f64,

    /// Per-request HTTP timeout, seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Attempts per logical call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether retweets survive the pagination filter.
    #[serde(default)]
    pub include_retweets: bool,

    /// Whether replies (other than self-reply threads) are kept.
    #[serde(default)]
    pub include_replies: bool,

    /// Consecutive failures before the circuit breaker opens.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// How long the breaker stays open, seconds.
    #[serde(default = "default_circuit_breaker_cooldown")]
    pub circuit_breaker_cooldown: u64,

    /// JSON object overriding built-in GraphQL query ids.
    #[serde(default)]
    pub query_ids: Option<String>,

    /// JSON object overriding built-in GraphQL feature flags.
    #[serde(default)]
    pub features: Option<String>,
}

impl Default for XScraperConfig {
    fn default() -> Self {
        Self {
            auth_credentials: String::new(),
            env_file: None,
            max_tweets_per_user: default_max_tweets_per_user(),
            request_delay_min: default_request_delay_min(),
            request_delay_max: default_request_delay_max(),
            user_switch_delay_min: default_user_switch_delay_min(),
            user_switch_delay_max: default_user_switch_delay_max(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            include_retweets: false,
            include_replies: false,
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_cooldown: default_circuit_breaker_cooldown(),
            query_ids: None,
            features: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment overrides.
    ///
    /// The loading sequence:
    /// 1. Determine config file path (argument > `AISCOUT_CONFIG` env var > default)
    /// 2. Parse TOML file (or use defaults if the default path doesn't exist)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::ParseError { source: e })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration and validate it, returning all errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, returning all errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.llm.api_key.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.api_key".to_string(),
            });
        }
        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.base_url".to_string(),
            });
        }
        if self.llm.model.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "llm.model".to_string(),
            });
        }
        if self.llm.max_concurrency == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "llm.max_concurrency".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.crawler.days_lookback < 1 {
            errors.push(ConfigError::InvalidValue {
                field: "crawler.days_lookback".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.crawler.organize_workers == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "crawler.organize_workers".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.crawler.enrich_workers == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "crawler.enrich_workers".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.crawler.channel_capacity == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "crawler.channel_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.crawler.x_request_delay_min > self.crawler.x_request_delay_max {
            errors.push(ConfigError::InvalidValue {
                field: "crawler.x_request_delay_min".to_string(),
                message: "must be less than or equal to x_request_delay_max".to_string(),
            });
        }

        if self.x_scraper.request_delay_min > self.x_scraper.request_delay_max {
            errors.push(ConfigError::InvalidValue {
                field: "x_scraper.request_delay_min".to_string(),
                message: "must be less than or equal to request_delay_max".to_string(),
            });
        }
        if self.x_scraper.user_switch_delay_min > self.x_scraper.user_switch_delay_max {
            errors.push(ConfigError::InvalidValue {
                field: "x_scraper.user_switch_delay_min".to_string(),
                message: "must be less than or equal to user_switch_delay_max".to_string(),
            });
        }
        if self.x_scraper.max_retries == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "x_scraper.max_retries".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if let Some(raw) = &self.x_scraper.query_ids {
            if serde_json::from_str::<HashMap<String, String>>(raw).is_err() {
                errors.push(ConfigError::InvalidValue {
                    field: "x_scraper.query_ids".to_string(),
                    message: "must be a JSON object of operation -> query id".to_string(),
                });
            }
        }
        if let Some(raw) = &self.x_scraper.features {
            if serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw).is_err() {
                errors.push(ConfigError::InvalidValue {
                    field: "x_scraper.features".to_string(),
                    message: "must be a JSON object of feature flags".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Entity alias index: lowercased alias -> canonical entity name.
    ///
    /// The canonical name itself always counts as an alias.
    pub fn entity_alias_index(&self) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for (entity, aliases) in &self.entity_mapping {
            index.insert(entity.to_lowercase(), entity.clone());
            for alias in aliases.split(',') {
                let alias = alias.trim();
                if !alias.is_empty() {
                    index.insert(alias.to_lowercase(), entity.clone());
                }
            }
        }
        index
    }

    /// Canonical entity names joined with ", " for prompt injection.
    pub fn entity_list(&self) -> String {
        let mut names: Vec<&str> = self.entity_mapping.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Read the organizer prompt template from the configured path.
    pub fn load_prompt_template(&self) -> Result<String, ConfigError> {
        let path = expand_tilde(&self.llm.prompt_template);
        std::fs::read_to_string(&path).map_err(|e| ConfigError::PromptTemplate {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve the config file path from arguments, env vars, or default.
    ///
    /// Returns `(path, explicit)` where `explicit` is true if the path was
    /// explicitly provided rather than using the default.
    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(path) = config_path {
            return (expand_tilde(path), true);
        }

        if let Ok(env_path) = env::var("AISCOUT_CONFIG") {
            return (expand_tilde(&env_path), true);
        }

        (PathBuf::from("config.toml"), false)
    }

    /// Apply environment variable overrides for LLM credentials.
    ///
    /// Only the secrets-bearing LLM keys are overridable, so deployments can
    /// keep the API key out of the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("AISCOUT_LLM__API_KEY") {
            self.llm.api_key = val;
        }
        if let Ok(val) = env::var("AISCOUT_LLM__BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = env::var("AISCOUT_LLM__MODEL") {
            self.llm.model = val;
        }
    }
}

/// Expand `~` at the start of a path to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid() -> Config {
        let mut config = Config::default();
        config.llm.api_key = "sk-test".to_string();
        config.llm.base_url = "https://api.example.com/v1".to_string();
        config.llm.model = "test-model".to_string();
        config
    }

    #[test]
    fn load_valid_toml() {
        let toml_str = r#"
[llm]
api_key = "sk-test"
base_url = "https://api.example.com/v1"
model = "deepseek-chat"
max_concurrency = 8

[crawler]
days_lookback = 3
organize_workers = 2

[weixin_accounts]
"AI Frontline" = "https://rss.example.com/weixin/ai-frontline"

[x_accounts]
OpenAI = "openai"

[youtube_channels]
Fireship = "UCsBjURrPoezykLs9EqgamOA"

[entity_mapping]
OpenAI = "openai, sam-altman"
"#;
        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.llm.max_concurrency, 8);
        assert_eq!(config.crawler.days_lookback, 3);
        assert_eq!(config.crawler.organize_workers, 2);
        assert_eq!(
            config.weixin_accounts.get("AI Frontline").map(String::as_str),
            Some("https://rss.example.com/weixin/ai-frontline")
        );
        assert_eq!(config.x_accounts.get("OpenAI").map(String::as_str), Some("openai"));
    }

    #[test]
    fn missing_sections_use_defaults() {
        let toml_str = r#"
[llm]
api_key = "sk-test"
"#;
        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        assert_eq!(config.crawler.days_lookback, 7);
        assert_eq!(config.crawler.organize_workers, 5);
        assert_eq!(config.crawler.enrich_workers, 5);
        assert_eq!(config.crawler.channel_capacity, 1000);
        assert_eq!(config.crawler.x_request_delay_min, 30);
        assert_eq!(config.crawler.x_request_delay_max, 60);
        assert_eq!(config.llm.max_concurrency, 10);
        assert_eq!(config.x_scraper.max_tweets_per_user, 20);
        assert_eq!(config.x_scraper.request_timeout, 30);
        assert_eq!(config.x_scraper.circuit_breaker_threshold, 5);
        assert_eq!(config.x_scraper.circuit_breaker_cooldown, 60);
        assert!(!config.x_scraper.include_retweets);
    }

    #[test]
    fn account_section_keys_preserve_case() {
        let toml_str = r#"
[entity_mapping]
OpenAI = "openai"
DataBricks = "databricks"
"#;
        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        assert!(config.entity_mapping.contains_key("OpenAI"));
        assert!(config.entity_mapping.contains_key("DataBricks"));
        assert!(!config.entity_mapping.contains_key("openai"));
    }

    #[test]
    fn validate_reports_missing_llm_fields() {
        let config = Config::default();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::MissingField { field } if field == "llm.api_key")
        ));
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::MissingField { field } if field == "llm.base_url")
        ));
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::MissingField { field } if field == "llm.model")
        ));
    }

    #[test]
    fn validate_delay_ordering() {
        let mut config = minimal_valid();
        config.crawler.x_request_delay_min = 90;
        config.crawler.x_request_delay_max = 30;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "crawler.x_request_delay_min"
        )));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = minimal_valid();
        config.crawler.organize_workers = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "crawler.organize_workers"
        )));
    }

    #[test]
    fn validate_rejects_malformed_query_ids_json() {
        let mut config = minimal_valid();
        config.x_scraper.query_ids = Some("not json".to_string());
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::InvalidValue { field, .. } if field == "x_scraper.query_ids"
        )));
    }

    #[test]
    fn validate_valid_config_passes() {
        assert!(minimal_valid().validate().is_ok());
    }

    #[test]
    fn entity_alias_index_is_case_insensitive() {
        let mut config = Config::default();
        config
            .entity_mapping
            .insert("OpenAI".to_string(), "openai, sam-altman".to_string());
        let index = config.entity_alias_index();
        assert_eq!(index.get("openai").map(String::as_str), Some("OpenAI"));
        assert_eq!(index.get("sam-altman").map(String::as_str), Some("OpenAI"));
    }

    #[test]
    fn entity_list_is_sorted_and_joined() {
        let mut config = Config::default();
        config
            .entity_mapping
            .insert("OpenAI".to_string(), "openai".to_string());
        config
            .entity_mapping
            .insert("Anthropic".to_string(), "anthropic".to_string());
        assert_eq!(config.entity_list(), "Anthropic, OpenAI");
    }

    #[test]
    fn config_file_not_found_explicit_path() {
        let result = Config::load(Some("/nonexistent/path/config.toml"));
        match result.unwrap_err() {
            ConfigError::FileNotFound { path } => {
                assert_eq!(path, "/nonexistent/path/config.toml");
            }
            other => panic!("expected FileNotFound, got: {other}"),
        }
    }

    #[test]
    fn expand_tilde_works() {
        let expanded = expand_tilde("~/aiscout/config.toml");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}
