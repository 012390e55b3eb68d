//! reviewlens - incremental Steam review collector and analyzer
//!
//! A CLI tool that pages through a game's reviews, aggregates them in
//! memory, optionally asks an LLM to analyze a sample, and writes a
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, source failure, config, LLM, etc.)

mod agent;
mod analysis;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod report;

use agent::{
    AnalysisKind, AnalysisSections, LanguageModelClient, ModelSettings, Provider, ReviewAnalyst,
};
use analysis::Aggregator;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use fetch::{ReviewFilters, SteamFetcher};
use indicatif::{ProgressBar, ProgressStyle};
use report::{ReportMetadata, ReportOptions, ReviewReport};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first so its verbose setting can pick the log level.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("reviewlens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    log_config_source(&args);

    let result = if args.check_ai {
        run_check_ai(&config).await
    } else {
        run_collection(&args, &config).await
    };

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .reviewlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Set REVIEWLENS_API_KEY to enable AI analysis.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Handle --check-ai: send a trivial prompt with the configured provider.
async fn run_check_ai(config: &Config) -> Result<()> {
    let client = build_model_client(config)?;

    println!(
        "🤖 Checking {} ({})...",
        client.provider(),
        client.model()
    );

    let analyst = ReviewAnalyst::new(&client, config.ai.sample_size);
    let reply = analyst
        .check_connection()
        .await
        .context("LLM connection check failed")?;

    println!("✅ Connection OK. Model replied: {}", reply.trim());
    Ok(())
}

/// Collect reviews, run the optional analysis and write the report.
async fn run_collection(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    let app_id = args.app_id().to_string();
    let filters = ReviewFilters::parse(
        &config.source.filter,
        &config.source.language,
        &config.source.review_type,
        &config.source.purchase_type,
        config.source.per_page,
        config.source.day_range,
    )?;

    // Build the LLM client before fetching so bad credentials fail fast.
    let analysis_kind = args.analysis_kind();
    let model_client = match analysis_kind {
        Some(_) => Some(build_model_client(config)?),
        None => None,
    };

    let fetcher = SteamFetcher::new(&config.source.base_url, config.source.timeout_seconds)?;
    let mut aggregator = Aggregator::new(fetcher);
    aggregator.reset(&app_id);

    println!("📥 Collecting reviews for app {}", app_id);
    println!("   Filters: {}", filters);
    if let Some(language) = filters.forced_language() {
        println!("   Only reviews written in {}", language);
    }
    match config.source.max_pages {
        Some(pages) => println!("   Pages: up to {}", pages),
        None => println!("   Pages: all"),
    }

    let spinner = collection_spinner(args.quiet);
    let mut pages_fetched = 0;
    let collected = aggregator
        .collect(&filters, config.source.max_pages, |outcome, total| {
            pages_fetched += 1;
            spinner.set_message(format!(
                "{} reviews collected (+{})",
                total, outcome.records_added
            ));
        })
        .await;
    spinner.finish_and_clear();

    // Pages gathered before a failure are still reported.
    let has_more = match collected {
        Ok(outcome) => outcome.has_more,
        Err(e) if aggregator.records().is_empty() => {
            return Err(e).with_context(|| format!("Failed to fetch reviews for app {}", app_id));
        }
        Err(e) => {
            warn!("Collection stopped early: {}", e);
            eprintln!("⚠️  Collection stopped early: {}", e);
            if e.is_transient() {
                eprintln!("   Reviews gathered so far are kept in the report. Rerun to retry.");
            }
            true
        }
    };

    debug!(
        "Subject {}: state {:?}, cursor {}",
        aggregator.subject().unwrap_or_default(),
        aggregator.state(),
        aggregator.cursor()
    );
    print_collection_summary(&aggregator, config.report.top_languages);

    // Optional AI analysis over a capped sample.
    let mut analysis = AnalysisSections::default();
    if let (Some(kind), Some(client)) = (analysis_kind, &model_client) {
        if aggregator.records().is_empty() {
            warn!("No reviews collected, skipping analysis");
        } else {
            let analyst = ReviewAnalyst::new(client, config.ai.sample_size);
            match kind {
                AnalysisKind::Review(id) => println!(
                    "\n🔬 Analyzing review {} with {}...",
                    id,
                    client.model()
                ),
                _ => println!(
                    "\n🔬 Running {:?} analysis with {} on {} reviews...",
                    kind,
                    client.model(),
                    aggregator.sample(analyst.sample_size()).len()
                ),
            }
            analysis = analyst
                .run(kind, aggregator.records())
                .await
                .context("AI analysis failed")?;
        }
    }

    // Report
    let generated_at = Utc::now();
    let output_path = match config.general.output {
        Some(ref path) => PathBuf::from(path),
        None => PathBuf::from(report::default_file_name(
            &app_id,
            generated_at,
            args.format.extension(),
        )),
    };

    let review_report = ReviewReport {
        metadata: ReportMetadata {
            app_id: app_id.clone(),
            generated_at,
            filters: filters.to_string(),
            pages_fetched,
            has_more,
            model_used: model_client
                .as_ref()
                .filter(|_| !analysis.is_empty())
                .map(|c| c.model().to_string()),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary: aggregator.summary(),
        records: aggregator.records(),
        language_counts: aggregator.language_counts(),
        analysis: &analysis,
    };

    let content = match args.format {
        OutputFormat::Json => report::generate_json_report(&review_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(
            &review_report,
            &ReportOptions::from(&config.report),
        ),
    };

    report::write_report(&content, &output_path)?;

    println!(
        "\n✅ Done in {:.1}s. Report saved to: {}",
        start_time.elapsed().as_secs_f64(),
        output_path.display()
    );

    Ok(())
}

fn collection_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Fetching first page...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_collection_summary(aggregator: &Aggregator<SteamFetcher>, top: usize) {
    let summary = aggregator.summary();
    let local = aggregator.local_stats();

    println!("\n📊 Collection Summary:");
    if !summary.review_score_desc.is_empty() {
        println!("   Score: {}", summary.review_score_desc);
    }
    println!(
        "   All reviews: {} (👍 {} / 👎 {})",
        summary.total_reviews, summary.total_positive, summary.total_negative
    );
    println!(
        "   Collected: {} (👍 {} / 👎 {})",
        local.total, local.positive, local.negative
    );

    let languages = aggregator.top_languages(top);
    if !languages.is_empty() {
        let listed: Vec<String> = languages
            .iter()
            .map(|(lang, count)| format!("{} {}", lang, count))
            .collect();
        println!("   Languages: {}", listed.join(", "));
    }
}

/// Build the LLM client from the merged configuration.
fn build_model_client(config: &Config) -> Result<LanguageModelClient> {
    let provider: Provider = config.ai.provider.parse()?;
    let api_key = config.ai.api_key.clone().unwrap_or_default();

    let settings = ModelSettings {
        provider,
        model: config.ai.model.clone(),
        api_key,
        max_tokens: config.ai.max_tokens,
        timeout_seconds: config.ai.timeout_seconds,
        base_url: config.ai.base_url.clone(),
    };

    LanguageModelClient::from_settings(&settings)
        .with_context(|| format!("Failed to configure {} client", provider))
}

/// Load configuration from file or use defaults, then apply CLI overrides.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("⚠️  Failed to load config, using defaults: {:#}", e);
                Config::default()
            }
        }
    };

    config.merge_with_args(args);
    Ok(config)
}

fn log_config_source(args: &Args) {
    if let Some(ref config_path) = args.config {
        info!("Loaded config from: {}", config_path.display());
    } else if Path::new(CONFIG_FILE_NAME).exists() {
        info!("Loaded default config from {}", CONFIG_FILE_NAME);
    } else {
        debug!("No config file found, using defaults");
    }
}
