//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::agent::AnalysisKind;
use clap::Parser;
use std::path::PathBuf;

/// reviewlens - collect and analyze Steam reviews
///
/// Pages through a game's reviews, aggregates them, optionally asks an
/// LLM to analyze a sample, and writes a Markdown or JSON report.
///
/// Examples:
///   reviewlens 570
///   reviewlens 570 --language english --review-type negative --pages 5
///   reviewlens 570 --all --format json -o dota2.json
///   reviewlens 570 --analyze report --provider anthropic
///   reviewlens 570 --analyze review --review-id 171234567
///   reviewlens --check-ai
///   reviewlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Steam app id of the game
    #[arg(
        value_name = "APP_ID",
        required_unless_present_any = ["init_config", "check_ai"]
    )]
    pub app_id: Option<String>,

    /// Sort order: all, recent, updated
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<String>,

    /// Review language (e.g. english, brazilian) or "all"
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<String>,

    /// Review type: all, positive, negative
    #[arg(long, value_name = "TYPE")]
    pub review_type: Option<String>,

    /// Purchase type: all, steam, non_steam_purchase
    #[arg(long, value_name = "TYPE")]
    pub purchase_type: Option<String>,

    /// Reviews per page (1-100)
    #[arg(long, value_name = "COUNT")]
    pub per_page: Option<u32>,

    /// Only include reviews from the last N days
    #[arg(long, value_name = "DAYS")]
    pub day_range: Option<u32>,

    /// Number of pages to fetch
    #[arg(short, long, value_name = "COUNT", conflicts_with = "all")]
    pub pages: Option<usize>,

    /// Fetch pages until the source runs out
    #[arg(long)]
    pub all: bool,

    /// Output file path for the report
    ///
    /// Defaults to steam_reviews_<APP_ID>_<DATE>.<md|json>
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Leave the review table out of Markdown reports
    #[arg(long)]
    pub no_reviews: bool,

    /// Run an AI analysis over a sample of the collected reviews
    #[arg(short, long, value_name = "KIND")]
    pub analyze: Option<AnalyzeMode>,

    /// Review to analyze with --analyze review
    #[arg(long, value_name = "ID", requires = "analyze")]
    pub review_id: Option<u64>,

    /// LLM provider: openai, anthropic
    #[arg(long, env = "REVIEWLENS_PROVIDER")]
    pub provider: Option<String>,

    /// LLM model name
    #[arg(short, long, env = "REVIEWLENS_MODEL")]
    pub model: Option<String>,

    /// LLM API key
    #[arg(long, env = "REVIEWLENS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Reviews sent to the LLM per request
    #[arg(long, value_name = "COUNT")]
    pub sample_size: Option<usize>,

    /// Review source request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .reviewlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Check the configured LLM credentials and exit
    #[arg(long)]
    pub check_ai: bool,

    /// Generate a default .reviewlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Analysis requested with --analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalyzeMode {
    Summary,
    Sentiment,
    Topics,
    Recommendations,
    /// Summary, sentiment and topics
    Report,
    /// One collected review, selected with --review-id
    Review,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the app id (should be validated first).
    pub fn app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or("")
    }

    /// The analysis to run, if any. Call after `validate`.
    pub fn analysis_kind(&self) -> Option<AnalysisKind> {
        let kind = match self.analyze? {
            AnalyzeMode::Summary => AnalysisKind::Summary,
            AnalyzeMode::Sentiment => AnalysisKind::Sentiment,
            AnalyzeMode::Topics => AnalysisKind::Topics,
            AnalyzeMode::Recommendations => AnalysisKind::Recommendations,
            AnalyzeMode::Report => AnalysisKind::Report,
            AnalyzeMode::Review => AnalysisKind::Review(self.review_id?),
        };
        Some(kind)
    }

    /// Validate the parsed arguments.
    ///
    /// Filter values are checked later against the merged configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref app_id) = self.app_id {
            if app_id.is_empty() || !app_id.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("App id must be numeric, got '{}'", app_id));
            }
        }

        if self.pages == Some(0) {
            return Err("Pages must be at least 1".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.sample_size == Some(0) {
            return Err("Sample size must be at least 1".to_string());
        }

        match (self.analyze, self.review_id) {
            (Some(AnalyzeMode::Review), None) => {
                return Err("--analyze review needs --review-id".to_string());
            }
            (Some(mode), Some(_)) if mode != AnalyzeMode::Review => {
                return Err("--review-id only applies to --analyze review".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a config file asking for verbose output.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
impl Args {
    /// Arguments as if only the app id had been given, independent of the
    /// process environment.
    pub(crate) fn for_app(app_id: &str) -> Self {
        Args {
            app_id: Some(app_id.to_string()),
            filter: None,
            language: None,
            review_type: None,
            purchase_type: None,
            per_page: None,
            day_range: None,
            pages: None,
            all: false,
            output: None,
            format: OutputFormat::Markdown,
            no_reviews: false,
            analyze: None,
            review_id: None,
            provider: None,
            model: None,
            api_key: None,
            sample_size: None,
            timeout: None,
            config: None,
            verbose: false,
            quiet: false,
            check_ai: false,
            init_config: false,
        }
    }
}
