//! Markdown and JSON report generation.
//!
//! This module renders a finished collection, plus any AI analysis that
//! ran over it, as a Markdown report or a JSON export.

use crate::agent::AnalysisSections;
use crate::analysis::{rank_languages, LocalStats};
use crate::models::{ReviewRecord, SummaryCounts};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

/// Describes how the collection was gathered.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub app_id: String,
    pub generated_at: DateTime<Utc>,
    /// Human-readable filter set, e.g. "recent/english/all/all/20/365".
    pub filters: String,
    pub pages_fetched: usize,
    /// Whether the source still had pages when collection stopped.
    pub has_more: bool,
    /// Model that produced the analysis sections, if any ran.
    pub model_used: Option<String>,
    pub duration_seconds: f64,
}

/// Rendering options for the Markdown report.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub include_reviews: bool,
    pub max_review_rows: usize,
    pub excerpt_chars: usize,
    pub top_languages: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            include_reviews: true,
            max_review_rows: 50,
            excerpt_chars: 200,
            top_languages: 5,
        }
    }
}

/// Everything a report is rendered from, borrowed from the aggregator.
pub struct ReviewReport<'a> {
    pub metadata: ReportMetadata,
    pub summary: &'a SummaryCounts,
    pub records: &'a [ReviewRecord],
    pub language_counts: &'a HashMap<String, usize>,
    pub analysis: &'a AnalysisSections,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &ReviewReport<'_>, options: &ReportOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Review Report: App {}\n\n", report.metadata.app_id));

    output.push_str(&generate_metadata_section(&report.metadata, report.records.len()));
    output.push_str(&generate_summary_section(
        report.summary,
        &LocalStats::from_records(report.records),
    ));
    output.push_str(&generate_language_section(
        report.language_counts,
        report.records.len(),
        options.top_languages,
    ));
    output.push_str(&generate_analysis_section(report.analysis));

    if options.include_reviews {
        output.push_str(&generate_reviews_section(report.records, options));
    }

    output.push_str("---\n\n*Report generated by reviewlens*\n");

    output
}

fn generate_metadata_section(metadata: &ReportMetadata, collected: usize) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **App ID:** {}\n", metadata.app_id));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Filters:** `{}`\n", metadata.filters));
    section.push_str(&format!("- **Pages Fetched:** {}\n", metadata.pages_fetched));
    section.push_str(&format!("- **Reviews Collected:** {}\n", collected));
    if metadata.has_more {
        section.push_str("- **Complete:** no, more pages were available\n");
    }
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

fn generate_summary_section(summary: &SummaryCounts, local: &LocalStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    if !summary.review_score_desc.is_empty() {
        section.push_str(&format!(
            "**Score:** {} ({}/9)\n\n",
            summary.review_score_desc, summary.review_score
        ));
    }

    section.push_str("| | Positive | Negative | Total | Positive % |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **All reviews** | {} | {} | {} | {} |\n",
        summary.total_positive,
        summary.total_negative,
        summary.total_reviews,
        percent(summary.positive_percentage())
    ));
    section.push_str(&format!(
        "| **Collected** | {} | {} | {} | {} |\n\n",
        local.positive,
        local.negative,
        local.total,
        percent(local.positive_percentage)
    ));

    section
}

fn generate_language_section(
    counts: &HashMap<String, usize>,
    total: usize,
    top: usize,
) -> String {
    let ranked = rank_languages(counts, top);
    if ranked.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Languages\n\n");
    section.push_str("| Language | Reviews | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for (lang, count) in ranked {
        let share = (count as f64 / total.max(1) as f64) * 100.0;
        section.push_str(&format!("| {} | {} | {:.0}% |\n", lang, count, share));
    }
    section.push('\n');

    section
}

fn generate_analysis_section(analysis: &AnalysisSections) -> String {
    if analysis.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## AI Analysis\n\n");

    let parts = [
        ("Summary", &analysis.summary),
        ("Sentiment", &analysis.sentiment),
        ("Topics", &analysis.topics),
        ("Recommendations", &analysis.recommendations),
    ];

    for (title, body) in parts {
        if let Some(text) = body {
            section.push_str(&format!("### {}\n\n{}\n\n", title, text.trim()));
        }
    }

    if let Some(ref review) = analysis.review {
        section.push_str(&format!(
            "### Review {}\n\n{}\n\n",
            review.review_id,
            review.text.trim()
        ));
    }

    section
}

fn generate_reviews_section(records: &[ReviewRecord], options: &ReportOptions) -> String {
    let mut section = String::new();

    section.push_str("## Reviews\n\n");

    if records.is_empty() {
        section.push_str("No reviews were collected.\n\n");
        return section;
    }

    section.push_str("| Date | Recommended | Language | Play Time | Helpful | Review |\n");
    section.push_str("|:---|:---:|:---|:---:|:---:|:---|\n");

    for record in records.iter().take(options.max_review_rows) {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            record.created_at().format("%Y-%m-%d"),
            if record.voted_up { "👍" } else { "👎" },
            record.language,
            record.playtime_display(),
            record.votes_up,
            escape_cell(&record.excerpt(options.excerpt_chars))
        ));
    }

    if records.len() > options.max_review_rows {
        section.push_str(&format!(
            "\n*{} more reviews not shown.*\n",
            records.len() - options.max_review_rows
        ));
    }
    section.push('\n');

    section
}

/// Keeps a review body on one table row.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

fn percent(value: Option<u32>) -> String {
    value.map(|p| format!("{}%", p)).unwrap_or_else(|| "-".to_string())
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    app_id: &'a str,
    export_date: DateTime<Utc>,
    reviews_count: usize,
    summary: &'a SummaryCounts,
    language_counts: BTreeMap<&'a str, usize>,
    #[serde(skip_serializing_if = "no_analysis")]
    analysis: &'a AnalysisSections,
    reviews: Vec<ExportedReview<'a>>,
}

fn no_analysis(analysis: &&AnalysisSections) -> bool {
    analysis.is_empty()
}

#[derive(Serialize)]
struct ExportedReview<'a> {
    id: u64,
    positive: bool,
    language: &'a str,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    playtime: ExportedPlaytime,
    votes: ExportedVotes,
    text: &'a str,
    purchase_info: ExportedPurchase,
    author: ExportedAuthor<'a>,
}

#[derive(Serialize)]
struct ExportedPlaytime {
    total_minutes: u32,
    at_review_minutes: u32,
    last_two_weeks_minutes: u32,
}

#[derive(Serialize)]
struct ExportedVotes {
    helpful: u32,
    funny: u32,
}

#[derive(Serialize)]
struct ExportedPurchase {
    steam_purchase: bool,
    received_for_free: bool,
    written_during_early_access: bool,
}

#[derive(Serialize)]
struct ExportedAuthor<'a> {
    steam_id: &'a str,
    games_owned: u32,
    reviews_count: u32,
}

impl<'a> From<&'a ReviewRecord> for ExportedReview<'a> {
    fn from(record: &'a ReviewRecord) -> Self {
        Self {
            id: record.id,
            positive: record.voted_up,
            language: &record.language,
            created_at: record.created_at(),
            updated_at: record.updated_at(),
            playtime: ExportedPlaytime {
                total_minutes: record.playtime_forever,
                at_review_minutes: record.playtime_at_review,
                last_two_weeks_minutes: record.playtime_last_two_weeks,
            },
            votes: ExportedVotes {
                helpful: record.votes_up,
                funny: record.votes_funny,
            },
            text: &record.text,
            purchase_info: ExportedPurchase {
                steam_purchase: record.steam_purchase,
                received_for_free: record.received_for_free,
                written_during_early_access: record.written_during_early_access,
            },
            author: ExportedAuthor {
                steam_id: &record.author.steam_id,
                games_owned: record.author.games_owned,
                reviews_count: record.author.reviews_count,
            },
        }
    }
}

/// Generate a JSON export of the collection.
pub fn generate_json_report(report: &ReviewReport<'_>) -> Result<String> {
    let document = ExportDocument {
        app_id: &report.metadata.app_id,
        export_date: report.metadata.generated_at,
        reviews_count: report.records.len(),
        summary: report.summary,
        language_counts: report
            .language_counts
            .iter()
            .map(|(lang, count)| (lang.as_str(), *count))
            .collect(),
        analysis: report.analysis,
        reviews: report.records.iter().map(ExportedReview::from).collect(),
    };

    serde_json::to_string_pretty(&document).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

/// Default file name for an export, e.g. `steam_reviews_570_2026-10-16.json`.
pub fn default_file_name(app_id: &str, date: DateTime<Utc>, extension: &str) -> String {
    format!(
        "steam_reviews_{}_{}.{}",
        app_id,
        date.format("%Y-%m-%d"),
        extension
    )
}
