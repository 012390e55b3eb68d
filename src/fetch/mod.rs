//! Page sources for review data.
//!
//! A page source turns `(subject, cursor, filters)` into one page of
//! reviews. The aggregator only sees the [`PageFetcher`] trait, so it does
//! not know whether it is talking to the HTTP source or to the simulated
//! one used in tests.

pub mod steam;

#[cfg(test)]
pub mod simulated;

pub use steam::SteamFetcher;

use crate::error::FetchError;
use crate::models::{Cursor, PageResult};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Largest page the upstream accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of reviews per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default look-back window in days.
pub const DEFAULT_DAY_RANGE: u32 = 365;

/// Retrieves one page of reviews.
///
/// Implementations must validate their inputs before any I/O and must not
/// hand back partial pages: a call either yields a whole page or an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        subject_id: &str,
        cursor: &Cursor,
        filters: &ReviewFilters,
    ) -> Result<PageResult, FetchError>;
}

/// Checks that a subject id looks like a store app id.
pub fn validate_subject(subject_id: &str) -> Result<(), FetchError> {
    if subject_id.is_empty() || !subject_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(FetchError::InvalidSubject(subject_id.to_string()));
    }
    Ok(())
}

/// Review ordering/selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewFilter {
    #[default]
    All,
    Recent,
    Updated,
}

/// Which recommendations to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewType {
    #[default]
    All,
    Positive,
    Negative,
}

/// Which purchase channels to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurchaseType {
    #[default]
    All,
    Steam,
    NonSteamPurchase,
}

impl ReviewFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewFilter::All => "all",
            ReviewFilter::Recent => "recent",
            ReviewFilter::Updated => "updated",
        }
    }
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::All => "all",
            ReviewType::Positive => "positive",
            ReviewType::Negative => "negative",
        }
    }
}

impl PurchaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseType::All => "all",
            PurchaseType::Steam => "steam",
            PurchaseType::NonSteamPurchase => "non_steam_purchase",
        }
    }
}

impl FromStr for ReviewFilter {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ReviewFilter::All),
            "recent" => Ok(ReviewFilter::Recent),
            "updated" => Ok(ReviewFilter::Updated),
            other => Err(FetchError::invalid_filter("filter", other)),
        }
    }
}

impl FromStr for ReviewType {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ReviewType::All),
            "positive" => Ok(ReviewType::Positive),
            "negative" => Ok(ReviewType::Negative),
            other => Err(FetchError::invalid_filter("review_type", other)),
        }
    }
}

impl FromStr for PurchaseType {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PurchaseType::All),
            "steam" => Ok(PurchaseType::Steam),
            "non_steam_purchase" => Ok(PurchaseType::NonSteamPurchase),
            other => Err(FetchError::invalid_filter("purchase_type", other)),
        }
    }
}

/// Filter set sent with every page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFilters {
    pub filter: ReviewFilter,
    /// "all" or a language tag.
    pub language: String,
    pub review_type: ReviewType,
    pub purchase_type: PurchaseType,
    pub page_size: u32,
    pub day_range: u32,
}

impl Default for ReviewFilters {
    fn default() -> Self {
        Self {
            filter: ReviewFilter::All,
            language: "all".to_string(),
            review_type: ReviewType::All,
            purchase_type: PurchaseType::All,
            page_size: DEFAULT_PAGE_SIZE,
            day_range: DEFAULT_DAY_RANGE,
        }
    }
}

impl ReviewFilters {
    /// Builds a filter set from raw option strings, rejecting anything
    /// unrecognized.
    pub fn parse(
        filter: &str,
        language: &str,
        review_type: &str,
        purchase_type: &str,
        page_size: u32,
        day_range: u32,
    ) -> Result<Self, FetchError> {
        let filters = Self {
            filter: filter.parse()?,
            language: language.to_string(),
            review_type: review_type.parse()?,
            purchase_type: purchase_type.parse()?,
            page_size,
            day_range,
        };
        filters.validate()?;
        Ok(filters)
    }

    /// Checks the free-form options.
    pub fn validate(&self) -> Result<(), FetchError> {
        let language_ok = !self.language.is_empty()
            && self
                .language
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !language_ok {
            return Err(FetchError::invalid_filter("language", &self.language));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(FetchError::invalid_filter(
                "page_size",
                self.page_size.to_string(),
            ));
        }

        if self.day_range == 0 {
            return Err(FetchError::invalid_filter(
                "day_range",
                self.day_range.to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a specific language was requested.
    pub fn forced_language(&self) -> Option<&str> {
        if self.language == "all" {
            None
        } else {
            Some(&self.language)
        }
    }

    /// Query pairs in the upstream's parameter names.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("filter", self.filter.as_str().to_string()),
            ("language", self.language.clone()),
            ("review_type", self.review_type.as_str().to_string()),
            ("purchase_type", self.purchase_type.as_str().to_string()),
            ("num_per_page", self.page_size.to_string()),
            ("day_range", self.day_range.to_string()),
        ]
    }
}

impl fmt::Display for ReviewFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filter={} language={} review_type={} purchase_type={} per_page={} day_range={}",
            self.filter.as_str(),
            self.language,
            self.review_type.as_str(),
            self.purchase_type.as_str(),
            self.page_size,
            self.day_range
        )
    }
}
