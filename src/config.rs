//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.reviewlens.toml` files.

use crate::agent::Provider;
use crate::fetch::{steam, DEFAULT_DAY_RANGE, DEFAULT_PAGE_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".reviewlens.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Review source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Language model settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output file path. Derived from the app id and date when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Review source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Review endpoint; the app id is appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_source_timeout")]
    pub timeout_seconds: u64,

    /// Sort order: all, recent or updated.
    #[serde(default = "default_all")]
    pub filter: String,

    /// Language tag, or "all".
    #[serde(default = "default_all")]
    pub language: String,

    /// all, positive or negative.
    #[serde(default = "default_all")]
    pub review_type: String,

    /// all, steam or non_steam_purchase.
    #[serde(default = "default_all")]
    pub purchase_type: String,

    /// Reviews per page (1-100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Only reviews from the last N days.
    #[serde(default = "default_day_range")]
    pub day_range: u32,

    /// Pages per run. Unset means keep going until the source runs out.
    #[serde(default = "default_max_pages")]
    pub max_pages: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_source_timeout(),
            filter: default_all(),
            language: default_all(),
            review_type: default_all(),
            purchase_type: default_all(),
            per_page: default_per_page(),
            day_range: default_day_range(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_base_url() -> String {
    steam::DEFAULT_BASE_URL.to_string()
}

fn default_source_timeout() -> u64 {
    30
}

fn default_all() -> String {
    "all".to_string()
}

fn default_per_page() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_day_range() -> u32 {
    DEFAULT_DAY_RANGE
}

fn default_max_pages() -> Option<usize> {
    Some(1)
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// openai or anthropic.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key. Prefer the REVIEWLENS_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's default endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,

    /// Reviews sent per analysis request.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            timeout_seconds: default_ai_timeout(),
            sample_size: default_sample_size(),
        }
    }
}

fn default_provider() -> String {
    Provider::OpenAi.as_str().to_string()
}

fn default_model() -> String {
    Provider::OpenAi.default_model().to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_ai_timeout() -> u64 {
    120
}

fn default_sample_size() -> usize {
    crate::agent::DEFAULT_SAMPLE_SIZE
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the review table in Markdown reports.
    #[serde(default = "default_true")]
    pub include_reviews: bool,

    /// Maximum rows in the review table.
    #[serde(default = "default_max_review_rows")]
    pub max_review_rows: usize,

    /// Characters of each review shown in the table.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Languages listed in the distribution table.
    #[serde(default = "default_top_languages")]
    pub top_languages: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_reviews: true,
            max_review_rows: default_max_review_rows(),
            excerpt_chars: default_excerpt_chars(),
            top_languages: default_top_languages(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_review_rows() -> usize {
    50
}

fn default_excerpt_chars() -> usize {
    200
}

fn default_top_languages() -> usize {
    5
}

impl From<&ReportConfig> for crate::report::ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            include_reviews: config.include_reviews,
            max_review_rows: config.max_review_rows,
            excerpt_chars: config.excerpt_chars,
            top_languages: config.top_languages,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.reviewlens.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides an explicit value.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }
        if args.verbose {
            self.general.verbose = true;
        }

        // Source
        if let Some(ref filter) = args.filter {
            self.source.filter = filter.clone();
        }
        if let Some(ref language) = args.language {
            self.source.language = language.clone();
        }
        if let Some(ref review_type) = args.review_type {
            self.source.review_type = review_type.clone();
        }
        if let Some(ref purchase_type) = args.purchase_type {
            self.source.purchase_type = purchase_type.clone();
        }
        if let Some(per_page) = args.per_page {
            self.source.per_page = per_page;
        }
        if let Some(day_range) = args.day_range {
            self.source.day_range = day_range;
        }
        if let Some(timeout) = args.timeout {
            self.source.timeout_seconds = timeout;
        }
        if args.all {
            self.source.max_pages = None;
        } else if let Some(pages) = args.pages {
            self.source.max_pages = Some(pages);
        }

        // AI. A provider switch without an explicit model picks that
        // provider's default model.
        if let Some(ref provider) = args.provider {
            if args.model.is_none() && !provider.eq_ignore_ascii_case(&self.ai.provider) {
                if let Ok(parsed) = provider.parse::<Provider>() {
                    self.ai.model = parsed.default_model().to_string();
                }
            }
            self.ai.provider = provider.clone();
        }
        if let Some(ref model) = args.model {
            self.ai.model = model.clone();
        }
        if let Some(ref key) = args.api_key {
            self.ai.api_key = Some(key.clone());
        }
        if let Some(sample_size) = args.sample_size {
            self.ai.sample_size = sample_size;
        }

        if args.no_reviews {
            self.report.include_reviews = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.per_page, 20);
        assert_eq!(config.source.day_range, 365);
        assert_eq!(config.source.max_pages, Some(1));
        assert_eq!(config.ai.provider, "openai");
        assert_eq!(config.ai.model, "gpt-4o");
        assert_eq!(config.ai.max_tokens, 4096);
        assert_eq!(config.ai.sample_size, 20);
        assert!(config.report.include_reviews);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "reviews.md"
verbose = true

[source]
language = "brazilian"
per_page = 100
max_pages = 5

[ai]
provider = "anthropic"
model = "claude-3-5-haiku-latest"
sample_size = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("reviews.md"));
        assert!(config.general.verbose);
        assert_eq!(config.source.language, "brazilian");
        assert_eq!(config.source.per_page, 100);
        assert_eq!(config.source.max_pages, Some(5));
        assert_eq!(config.source.filter, "all");
        assert_eq!(config.ai.provider, "anthropic");
        assert_eq!(config.ai.sample_size, 10);
        assert_eq!(config.ai.max_tokens, 4096);
        assert_eq!(config.report.top_languages, 5);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[source]"));
        assert!(toml_str.contains("[ai]"));
        assert!(toml_str.contains("[report]"));
        assert!(!toml_str.contains("api_key"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.source.per_page, 20);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[source]\nday_range = 30\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.source.day_range, 30);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[source\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let mut args = Args::for_app("570");
        args.language = Some("german".to_string());
        args.per_page = Some(50);
        args.all = true;
        args.provider = Some("anthropic".to_string());

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.source.language, "german");
        assert_eq!(config.source.per_page, 50);
        assert_eq!(config.source.filter, "all");
        assert_eq!(config.source.max_pages, None);
        assert_eq!(config.ai.provider, "anthropic");
        assert_eq!(config.ai.model, "claude-3-5-sonnet-latest");
    }

    #[test]
    fn test_merge_keeps_explicit_model() {
        let mut args = Args::for_app("570");
        args.provider = Some("anthropic".to_string());
        args.model = Some("claude-3-opus-latest".to_string());
        args.pages = Some(3);

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.ai.model, "claude-3-opus-latest");
        assert_eq!(config.source.max_pages, Some(3));
    }

    #[test]
    fn test_merge_without_flags_keeps_file_values() {
        let mut config: Config = toml::from_str(
            "[general]\nverbose = true\n\n[ai]\nprovider = \"anthropic\"\nmodel = \"claude-3-5-haiku-latest\"\n",
        )
        .unwrap();
        config.merge_with_args(&Args::for_app("570"));

        assert!(config.general.verbose);
        assert_eq!(config.ai.provider, "anthropic");
        assert_eq!(config.ai.model, "claude-3-5-haiku-latest");
        assert_eq!(config.source.max_pages, Some(1));
    }
}
