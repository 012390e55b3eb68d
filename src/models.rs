//! Data models for the review pipeline.
//!
//! This module contains the records produced by a page source, the
//! per-page summary snapshot, and the cursor used to walk the pages.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who wrote a review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    /// Account identifier on the store.
    pub steam_id: String,
    /// Number of games the author owns.
    pub games_owned: u32,
    /// Number of reviews the author has written.
    pub reviews_count: u32,
}

/// A single review as returned by the review source.
///
/// Records are immutable once produced; the aggregator owns them after
/// the page has been folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Review identifier, unique within a subject.
    pub id: u64,
    /// Free-text body.
    pub text: String,
    /// Language tag (e.g. "english", "brazilian").
    pub language: String,
    /// Whether the author recommends the game.
    pub voted_up: bool,
    /// Creation time, seconds since epoch.
    pub timestamp_created: i64,
    /// Last update time, seconds since epoch.
    pub timestamp_updated: i64,
    /// Total play time in minutes.
    pub playtime_forever: u32,
    /// Play time in minutes when the review was written.
    pub playtime_at_review: u32,
    /// Play time in minutes over the last two weeks.
    pub playtime_last_two_weeks: u32,
    /// "Helpful" votes.
    pub votes_up: u32,
    /// "Funny" votes.
    pub votes_funny: u32,
    /// Bought on the store itself.
    pub steam_purchase: bool,
    /// Key received for free.
    pub received_for_free: bool,
    /// Written while the game was in early access.
    pub written_during_early_access: bool,
    /// Author details.
    #[serde(default)]
    pub author: ReviewAuthor,
}

impl ReviewRecord {
    /// Creation time as a UTC datetime.
    pub fn created_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.timestamp_created)
    }

    /// Update time as a UTC datetime.
    pub fn updated_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.timestamp_updated)
    }

    /// Formats the total play time as "Xh Ym".
    pub fn playtime_display(&self) -> String {
        format!(
            "{}h {}m",
            self.playtime_forever / 60,
            self.playtime_forever % 60
        )
    }

    /// Returns the body cut to `max_chars` characters, with an ellipsis if cut.
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            return self.text.clone();
        }
        let cut: String = self.text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn epoch_to_utc(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_default()
}

/// Totals reported by the review source alongside a page.
///
/// Always authoritative as of the last fetch; the aggregator replaces
/// its copy on every page instead of summing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    /// Number of positive reviews.
    pub total_positive: u64,
    /// Number of negative reviews.
    pub total_negative: u64,
    /// Number of reviews matching the query.
    pub total_reviews: u64,
    /// Numeric score (0-9) as reported upstream.
    pub review_score: u8,
    /// Textual score descriptor, e.g. "Very Positive".
    pub review_score_desc: String,
}

impl SummaryCounts {
    /// Share of positive reviews, rounded. `None` when there are no reviews.
    pub fn positive_percentage(&self) -> Option<u32> {
        if self.total_reviews == 0 {
            return None;
        }
        let pct = (self.total_positive as f64 / self.total_reviews as f64) * 100.0;
        Some(pct.round() as u32)
    }
}

/// Opaque continuation token.
///
/// `*` asks for the first page; an empty token means there are no more
/// pages. Any other value must have come from a previous fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub const INITIAL: &'static str = "*";

    /// The "first page" sentinel.
    pub fn initial() -> Self {
        Cursor(Self::INITIAL.to_string())
    }

    /// The "no more pages" marker.
    pub fn end() -> Self {
        Cursor(String::new())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }

    pub fn is_end(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end() {
            write!(f, "<end>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One fetch outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Records in upstream order.
    pub records: Vec<ReviewRecord>,
    /// Cursor for the next page; empty when there is none.
    pub cursor: Cursor,
    /// Totals as of this fetch.
    pub summary: SummaryCounts,
}

#[cfg(test)]
pub(crate) fn sample_record(id: u64, language: &str, voted_up: bool) -> ReviewRecord {
    ReviewRecord {
        id,
        text: format!("Review number {}", id),
        language: language.to_string(),
        voted_up,
        timestamp_created: 1_700_000_000,
        timestamp_updated: 1_700_003_600,
        playtime_forever: 125,
        playtime_at_review: 100,
        playtime_last_two_weeks: 30,
        votes_up: 4,
        votes_funny: 1,
        steam_purchase: true,
        received_for_free: false,
        written_during_early_access: false,
        author: ReviewAuthor {
            steam_id: "76561198000000000".to_string(),
            games_owned: 42,
            reviews_count: 3,
        },
    }
}
