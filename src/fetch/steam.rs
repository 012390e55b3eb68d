//! HTTP page source for the store's `appreviews` endpoint.

use super::{validate_subject, PageFetcher, ReviewFilters};
use crate::error::FetchError;
use crate::models::{Cursor, PageResult, ReviewAuthor, ReviewRecord, SummaryCounts};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default endpoint; the subject id is appended to it.
pub const DEFAULT_BASE_URL: &str = "https://store.steampowered.com/appreviews/";

/// Fetches pages of reviews over HTTP.
pub struct SteamFetcher {
    http: reqwest::Client,
    base_url: String,
    timeout_seconds: u64,
    /// Last complete summary per (subject, filters). Later pages come back
    /// without totals and reuse it.
    known_totals: Mutex<HashMap<String, SummaryCounts>>,
}

impl SteamFetcher {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("reviewlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        info!("Review source: {} (timeout {}s)", base_url, timeout_seconds);

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            timeout_seconds,
            known_totals: Mutex::new(HashMap::new()),
        })
    }

    /// Turns a decoded payload into a page.
    fn build_page(
        &self,
        subject_id: &str,
        request_cursor: &Cursor,
        filters: &ReviewFilters,
        body: WireResponse,
    ) -> Result<PageResult, FetchError> {
        if body.success != 1 {
            return Err(FetchError::Upstream(format!(
                "review source reported success={}",
                body.success
            )));
        }

        let summary = self.resolve_summary(subject_id, filters, body.query_summary)?;
        let records: Vec<ReviewRecord> = body.reviews.into_iter().map(ReviewRecord::from).collect();

        // The upstream marks the last page by echoing the cursor back with
        // nothing in it.
        let cursor = match body.cursor {
            Some(next) if next.is_empty() => Cursor::end(),
            Some(next) if records.is_empty() && next == request_cursor.as_str() => Cursor::end(),
            Some(next) => Cursor::new(next),
            None => Cursor::end(),
        };

        Ok(PageResult {
            records,
            cursor,
            summary,
        })
    }

    fn resolve_summary(
        &self,
        subject_id: &str,
        filters: &ReviewFilters,
        wire: Option<WireSummary>,
    ) -> Result<SummaryCounts, FetchError> {
        let key = format!("{}|{}", subject_id, filters);
        let mut known = self
            .known_totals
            .lock()
            .map_err(|_| FetchError::Upstream("summary cache poisoned".to_string()))?;

        match wire.and_then(WireSummary::complete) {
            Some(summary) => {
                known.insert(key, summary.clone());
                Ok(summary)
            }
            None => known.get(&key).cloned().ok_or_else(|| {
                FetchError::Upstream("malformed payload: query_summary has no totals".to_string())
            }),
        }
    }
}

#[async_trait]
impl PageFetcher for SteamFetcher {
    async fn fetch_page(
        &self,
        subject_id: &str,
        cursor: &Cursor,
        filters: &ReviewFilters,
    ) -> Result<PageResult, FetchError> {
        validate_subject(subject_id)?;
        filters.validate()?;

        let url = format!("{}{}", self.base_url, subject_id);
        let mut query: Vec<(&str, String)> = vec![
            ("json", "1".to_string()),
            ("cursor", cursor.as_str().to_string()),
        ];
        query.extend(filters.query_pairs());

        debug!(
            subject = subject_id,
            cursor = %cursor,
            first_page = cursor.is_initial(),
            "Requesting review page"
        );

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Upstream(format!(
                        "request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else {
                    FetchError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Review source answered {}", status);
            return Err(FetchError::Upstream(format!("HTTP {}", status)));
        }

        let body: WireResponse = response.json().await?;
        let page = self.build_page(subject_id, cursor, filters, body)?;

        debug!(
            records = page.records.len(),
            next = %page.cursor,
            "Received review page"
        );

        Ok(page)
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct WireResponse {
    success: i64,
    #[serde(default)]
    query_summary: Option<WireSummary>,
    #[serde(default)]
    reviews: Vec<WireReview>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSummary {
    #[serde(default)]
    #[allow(dead_code)] // Page length, redundant with `reviews`
    num_reviews: Option<u64>,
    #[serde(default)]
    review_score: Option<u8>,
    #[serde(default)]
    review_score_desc: Option<String>,
    #[serde(default)]
    total_positive: Option<u64>,
    #[serde(default)]
    total_negative: Option<u64>,
    #[serde(default)]
    total_reviews: Option<u64>,
}

impl WireSummary {
    /// Returns the counts only if all totals are present.
    fn complete(self) -> Option<SummaryCounts> {
        Some(SummaryCounts {
            total_positive: self.total_positive?,
            total_negative: self.total_negative?,
            total_reviews: self.total_reviews?,
            review_score: self.review_score.unwrap_or(0),
            review_score_desc: self.review_score_desc.unwrap_or_default(),
        })
    }
}

/// Ids arrive as strings from the real endpoint and as numbers elsewhere.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u64),
    Text(String),
}

impl Default for StringOrNumber {
    fn default() -> Self {
        StringOrNumber::Text(String::new())
    }
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Number(n) => n.to_string(),
            StringOrNumber::Text(s) => s,
        }
    }

    fn to_u64(&self) -> u64 {
        match self {
            StringOrNumber::Number(n) => *n,
            StringOrNumber::Text(s) => s.parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAuthor {
    steamid: StringOrNumber,
    num_games_owned: u32,
    num_reviews: u32,
    playtime_forever: u32,
    playtime_last_two_weeks: u32,
    playtime_at_review: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireReview {
    recommendationid: StringOrNumber,
    author: WireAuthor,
    language: String,
    review: String,
    timestamp_created: i64,
    timestamp_updated: i64,
    voted_up: bool,
    votes_up: u32,
    votes_funny: u32,
    steam_purchase: bool,
    received_for_free: bool,
    written_during_early_access: bool,
}

impl From<WireReview> for ReviewRecord {
    fn from(wire: WireReview) -> Self {
        ReviewRecord {
            id: wire.recommendationid.to_u64(),
            text: wire.review,
            language: wire.language,
            voted_up: wire.voted_up,
            timestamp_created: wire.timestamp_created,
            timestamp_updated: wire.timestamp_updated,
            playtime_forever: wire.author.playtime_forever,
            playtime_at_review: wire.author.playtime_at_review,
            playtime_last_two_weeks: wire.author.playtime_last_two_weeks,
            votes_up: wire.votes_up,
            votes_funny: wire.votes_funny,
            steam_purchase: wire.steam_purchase,
            received_for_free: wire.received_for_free,
            written_during_early_access: wire.written_during_early_access,
            author: ReviewAuthor {
                steam_id: wire.author.steamid.into_string(),
                games_owned: wire.author.num_games_owned,
                reviews_count: wire.author.num_reviews,
            },
        }
    }
}
