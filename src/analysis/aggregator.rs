//! Review collection and derived statistics.
//!
//! The [`Aggregator`] owns everything gathered for the current subject:
//! the records in arrival order, the latest upstream totals, and the
//! per-language counts. Pages are folded in one at a time; a failed fetch
//! leaves every piece of state exactly as it was.

use crate::error::FetchError;
use crate::fetch::{PageFetcher, ReviewFilters};
use crate::models::{Cursor, ReviewRecord, SummaryCounts};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Where the aggregator is in its per-subject lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// No subject selected yet.
    Idle,
    /// Subject selected, more pages may be available.
    Ready,
    /// Every page has been fetched; `advance` is a no-op until `reset`.
    Exhausted,
}

/// Result of one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub records_added: usize,
    pub has_more: bool,
}

/// Result of a multi-page `collect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectOutcome {
    pub pages: usize,
    pub records_added: usize,
    pub has_more: bool,
}

/// Counts computed over the collected records themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LocalStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub positive_percentage: Option<u32>,
}

impl LocalStats {
    pub fn from_records(records: &[ReviewRecord]) -> Self {
        let positive = records.iter().filter(|r| r.voted_up).count();
        let total = records.len();
        let positive_percentage = if total == 0 {
            None
        } else {
            Some(((positive as f64 / total as f64) * 100.0).round() as u32)
        };

        Self {
            total,
            positive,
            negative: total - positive,
            positive_percentage,
        }
    }
}

/// Accumulates pages for one subject at a time.
pub struct Aggregator<F: PageFetcher> {
    fetcher: F,
    subject: Option<String>,
    cursor: Cursor,
    records: Vec<ReviewRecord>,
    summary: SummaryCounts,
    language_counts: HashMap<String, usize>,
    state: CollectionState,
}

impl<F: PageFetcher> Aggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            subject: None,
            cursor: Cursor::initial(),
            records: Vec::new(),
            summary: SummaryCounts::default(),
            language_counts: HashMap::new(),
            state: CollectionState::Idle,
        }
    }

    /// Selects `subject_id` and discards everything collected so far.
    ///
    /// Always succeeds. Export before calling this if the current results
    /// matter.
    pub fn reset(&mut self, subject_id: &str) {
        if !self.records.is_empty() {
            debug!(
                "Discarding {} records for subject {:?}",
                self.records.len(),
                self.subject
            );
        }

        self.subject = Some(subject_id.to_string());
        self.cursor = Cursor::initial();
        self.records.clear();
        self.summary = SummaryCounts::default();
        self.language_counts.clear();
        self.state = CollectionState::Ready;
    }

    /// Fetches the next page and folds it into the collection.
    ///
    /// Errors from the page source are returned as-is and leave the
    /// collection, cursor and totals untouched.
    pub async fn advance(&mut self, filters: &ReviewFilters) -> Result<AdvanceOutcome, FetchError> {
        if self.state == CollectionState::Exhausted {
            debug!("Collection exhausted, nothing to fetch");
            return Ok(AdvanceOutcome {
                records_added: 0,
                has_more: false,
            });
        }

        let subject = match self.subject {
            Some(ref subject) => subject.clone(),
            None => return Err(FetchError::InvalidSubject(String::new())),
        };

        let page = self
            .fetcher
            .fetch_page(&subject, &self.cursor, filters)
            .await?;

        let records_added = page.records.len();
        self.records.extend(page.records);
        self.summary = page.summary;
        self.language_counts = count_languages(&self.records);
        self.cursor = page.cursor;

        let has_more = self.has_more();
        self.state = if has_more {
            CollectionState::Ready
        } else {
            CollectionState::Exhausted
        };

        info!(
            "Subject {}: +{} reviews ({} of {} collected)",
            subject,
            records_added,
            self.records.len(),
            self.summary.total_reviews
        );

        Ok(AdvanceOutcome {
            records_added,
            has_more,
        })
    }

    /// Calls `advance` until the collection is exhausted or `max_pages`
    /// pages have been fetched. `on_page` runs after every page.
    ///
    /// Also stops after a page that added nothing, so a source that keeps
    /// handing out fresh cursors with empty pages cannot keep it looping.
    /// The collection stays Ready in that case.
    ///
    /// Stops at the first error; pages folded in before it stay collected.
    pub async fn collect<P>(
        &mut self,
        filters: &ReviewFilters,
        max_pages: Option<usize>,
        mut on_page: P,
    ) -> Result<CollectOutcome, FetchError>
    where
        P: FnMut(&AdvanceOutcome, usize),
    {
        let mut outcome = CollectOutcome {
            has_more: self.state != CollectionState::Exhausted,
            ..Default::default()
        };

        while outcome.has_more && max_pages.map_or(true, |max| outcome.pages < max) {
            let step = self.advance(filters).await?;
            outcome.pages += 1;
            outcome.records_added += step.records_added;
            outcome.has_more = step.has_more;
            on_page(&step, self.records.len());

            if step.records_added == 0 && step.has_more {
                warn!(
                    "Empty page with {} of {} collected, stopping",
                    self.records.len(),
                    self.summary.total_reviews
                );
                break;
            }
        }

        Ok(outcome)
    }

    fn has_more(&self) -> bool {
        !self.cursor.is_end() && (self.records.len() as u64) < self.summary.total_reviews
    }

    pub fn state(&self) -> CollectionState {
        self.state
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn summary(&self) -> &SummaryCounts {
        &self.summary
    }

    pub fn language_counts(&self) -> &HashMap<String, usize> {
        &self.language_counts
    }

    /// The `n` most common languages, most frequent first.
    pub fn top_languages(&self, n: usize) -> Vec<(&str, usize)> {
        rank_languages(&self.language_counts, n)
    }

    pub fn local_stats(&self) -> LocalStats {
        LocalStats::from_records(&self.records)
    }

    /// The first `n` records, the cap applied before anything is sent to
    /// an LLM.
    pub fn sample(&self, n: usize) -> &[ReviewRecord] {
        &self.records[..n.min(self.records.len())]
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

/// Orders language counts by frequency, ties broken by name, keeping `n`.
pub fn rank_languages(counts: &HashMap<String, usize>, n: usize) -> Vec<(&str, usize)> {
    let mut langs: Vec<(&str, usize)> = counts
        .iter()
        .map(|(lang, count)| (lang.as_str(), *count))
        .collect();

    langs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    langs.truncate(n);
    langs
}

/// Counts records per language tag.
pub fn count_languages(records: &[ReviewRecord]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for record in records {
        *counts.entry(record.language.clone()).or_default() += 1;
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::simulated::SimulatedFetcher;
    use crate::models::{sample_record, PageResult};

    fn filters(page_size: u32) -> ReviewFilters {
        ReviewFilters {
            page_size,
            ..Default::default()
        }
    }

    fn language_total<F: PageFetcher>(agg: &Aggregator<F>) -> usize {
        agg.language_counts().values().sum()
    }

    #[tokio::test]
    async fn test_first_page_scenario() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(42).with_page_limit(3));
        agg.reset("100");
        assert_eq!(agg.state(), CollectionState::Ready);

        let outcome = agg.advance(&filters(20)).await.unwrap();
        assert_eq!(outcome.records_added, 20);
        assert!(outcome.has_more);
        assert_eq!(agg.records().len(), 20);
        assert!(agg.summary().total_reviews > 20);
        assert!(!agg.cursor().is_initial());

        agg.advance(&filters(20)).await.unwrap();
        let last = agg.advance(&filters(20)).await.unwrap();
        assert_eq!(agg.records().len(), 60);
        assert!(!last.has_more);
        assert!(agg.cursor().is_end());
        assert_eq!(agg.state(), CollectionState::Exhausted);
    }

    #[tokio::test]
    async fn test_length_equals_sum_of_records_added() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(9));
        agg.reset("440");

        let mut added = 0;
        for size in [5, 17, 1, 30, 8] {
            let outcome = agg.advance(&filters(size)).await.unwrap();
            added += outcome.records_added;
            assert_eq!(agg.records().len(), added);
            assert_eq!(language_total(&agg), agg.records().len());
            if !outcome.has_more {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_exhausted_advance_is_noop() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(5).with_page_limit(1));
        agg.reset("100");
        agg.advance(&filters(10)).await.unwrap();
        assert_eq!(agg.state(), CollectionState::Exhausted);

        let calls = agg.fetcher().calls();
        let before = agg.records().to_vec();
        let outcome = agg.advance(&filters(10)).await.unwrap();

        assert_eq!(
            outcome,
            AdvanceOutcome {
                records_added: 0,
                has_more: false
            }
        );
        assert_eq!(agg.records(), before.as_slice());
        assert_eq!(agg.fetcher().calls(), calls);
    }

    #[tokio::test]
    async fn test_failure_leaves_state_untouched() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(11));
        agg.reset("100");
        agg.advance(&filters(20)).await.unwrap();

        let records = agg.records().to_vec();
        let cursor = agg.cursor().clone();
        let summary = agg.summary().clone();
        let languages = agg.language_counts().clone();

        agg.fetcher()
            .fail_next(FetchError::Upstream("connection reset".to_string()));
        let err = agg.advance(&filters(20)).await.unwrap_err();

        assert_eq!(err, FetchError::Upstream("connection reset".to_string()));
        assert_eq!(agg.records(), records.as_slice());
        assert_eq!(agg.cursor(), &cursor);
        assert_eq!(agg.summary(), &summary);
        assert_eq!(agg.language_counts(), &languages);
        assert_eq!(agg.state(), CollectionState::Ready);

        // Retry picks up from the same cursor.
        let outcome = agg.advance(&filters(20)).await.unwrap();
        assert_eq!(agg.records().len(), records.len() + outcome.records_added);
    }

    #[tokio::test]
    async fn test_input_errors_propagate_unchanged() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(1));
        agg.reset("not-a-number");
        let err = agg.advance(&filters(20)).await.unwrap_err();
        assert_eq!(err, FetchError::InvalidSubject("not-a-number".to_string()));

        agg.reset("100");
        let err = agg.advance(&filters(0)).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidFilter { option: "page_size", .. }));
        assert!(agg.records().is_empty());
    }

    #[test]
    fn test_advance_without_subject() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(1));
        let err = tokio_test::block_on(agg.advance(&filters(20))).unwrap_err();
        assert!(matches!(err, FetchError::InvalidSubject(_)));
        assert_eq!(agg.state(), CollectionState::Idle);
        assert_eq!(agg.fetcher().calls(), 0);
    }

    #[test]
    fn test_reset_is_idempotent_and_isolates_subjects() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(2));
        agg.reset("100");
        tokio_test::block_on(agg.advance(&filters(20))).unwrap();
        assert!(!agg.records().is_empty());

        agg.reset("200");
        assert!(agg.records().is_empty());
        assert!(agg.language_counts().is_empty());
        assert_eq!(agg.summary(), &SummaryCounts::default());
        assert!(agg.cursor().is_initial());
        assert_eq!(agg.subject(), Some("200"));

        agg.reset("200");
        assert!(agg.records().is_empty());
        assert!(agg.cursor().is_initial());
        assert_eq!(agg.state(), CollectionState::Ready);
    }

    #[test]
    fn test_reset_after_exhaustion_allows_fetching_again() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(8).with_page_limit(1));
        agg.reset("100");
        tokio_test::block_on(agg.advance(&filters(5))).unwrap();
        assert_eq!(agg.state(), CollectionState::Exhausted);

        agg.reset("100");
        assert_eq!(agg.state(), CollectionState::Ready);
        let outcome = tokio_test::block_on(agg.advance(&filters(5))).unwrap();
        assert_eq!(outcome.records_added, 5);
    }

    #[tokio::test]
    async fn test_collect_respects_page_budget() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(4).with_page_limit(10));
        agg.reset("100");

        let mut seen = Vec::new();
        let outcome = agg
            .collect(&filters(10), Some(3), |step, total| {
                seen.push((step.records_added, total))
            })
            .await
            .unwrap();

        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.records_added, 30);
        assert!(outcome.has_more);
        assert_eq!(seen, vec![(10, 10), (10, 20), (10, 30)]);
    }

    #[tokio::test]
    async fn test_collect_until_exhausted() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(4).with_page_limit(4));
        agg.reset("100");

        let outcome = agg.collect(&filters(25), None, |_, _| {}).await.unwrap();
        assert_eq!(outcome.pages, 4);
        assert!(!outcome.has_more);
        assert_eq!(agg.records().len(), 100);
        assert_eq!(agg.state(), CollectionState::Exhausted);
    }

    #[tokio::test]
    async fn test_collect_keeps_pages_before_failure() {
        let mut agg = Aggregator::new(SimulatedFetcher::new(6).with_page_limit(5));
        agg.reset("100");
        agg.advance(&filters(10)).await.unwrap();
        agg.fetcher().fail_next(FetchError::Upstream("timeout".to_string()));

        let result = agg.collect(&filters(10), None, |_, _| {}).await;
        assert!(result.is_err());
        assert_eq!(agg.records().len(), 10);
    }

    /// Hands out a fresh cursor with no records on every call.
    struct EmptyPageFetcher {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PageFetcher for EmptyPageFetcher {
        async fn fetch_page(
            &self,
            _subject_id: &str,
            _cursor: &Cursor,
            _filters: &ReviewFilters,
        ) -> Result<PageResult, FetchError> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(PageResult {
                records: Vec::new(),
                cursor: Cursor::new(format!("c{}", n)),
                summary: SummaryCounts {
                    total_reviews: 100,
                    total_positive: 60,
                    total_negative: 40,
                    ..Default::default()
                },
            })
        }
    }

    #[tokio::test]
    async fn test_collect_stops_on_empty_page() {
        let mut agg = Aggregator::new(EmptyPageFetcher {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        agg.reset("100");

        let outcome = agg.collect(&filters(20), None, |_, _| {}).await.unwrap();

        assert_eq!(outcome.pages, 1);
        assert_eq!(outcome.records_added, 0);
        assert!(outcome.has_more);
        assert!(agg.records().is_empty());
        assert_eq!(agg.state(), CollectionState::Ready);
        assert_eq!(
            agg.fetcher()
                .calls
                .load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn test_count_languages_and_top_languages() {
        let records = vec![
            sample_record(1, "english", true),
            sample_record(2, "german", false),
            sample_record(3, "english", true),
            sample_record(4, "french", true),
            sample_record(5, "german", true),
            sample_record(6, "english", false),
        ];
        let counts = count_languages(&records);
        assert_eq!(counts.get("english"), Some(&3));
        assert_eq!(counts.values().sum::<usize>(), records.len());

        let mut agg = Aggregator::new(SimulatedFetcher::new(0));
        agg.language_counts = counts;
        assert_eq!(
            agg.top_languages(2),
            vec![("english", 3), ("german", 2)]
        );
        assert_eq!(agg.top_languages(10).len(), 3);
    }

    #[test]
    fn test_local_stats_and_sample() {
        let records = vec![
            sample_record(1, "english", true),
            sample_record(2, "english", false),
            sample_record(3, "english", true),
        ];
        let stats = LocalStats::from_records(&records);
        assert_eq!(stats.positive, 2);
        assert_eq!(stats.negative, 1);
        assert_eq!(stats.positive_percentage, Some(67));
        assert_eq!(LocalStats::from_records(&[]).positive_percentage, None);

        let mut agg = Aggregator::new(SimulatedFetcher::new(0));
        agg.records = records;
        assert_eq!(agg.sample(2).len(), 2);
        assert_eq!(agg.sample(20).len(), 3);
        assert_eq!(agg.sample(2)[0].id, 1);
    }
}
