//! Seeded random page source for tests.

use super::{validate_subject, PageFetcher, ReviewFilters, ReviewType};
use crate::error::FetchError;
use crate::models::{Cursor, PageResult, ReviewAuthor, ReviewRecord, SummaryCounts};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const LANGUAGES: [&str; 7] = [
    "english", "brazilian", "spanish", "russian", "german", "french", "italian",
];

const POSITIVE_TEXTS: [(&str, &str); 6] = [
    ("english", "I really enjoy this game! The gameplay is fun and the graphics are beautiful."),
    ("english", "Highly recommended! I've spent hours playing and still find new things to do."),
    ("brazilian", "Estou realmente gostando deste jogo! A jogabilidade é divertida."),
    ("brazilian", "Altamente recomendado! Passei horas jogando e ainda encontro coisas novas."),
    ("spanish", "¡Realmente disfruto este juego! La jugabilidad es divertida."),
    ("spanish", "¡Muy recomendable! He pasado horas jugando."),
];

const NEGATIVE_TEXTS: [(&str, &str); 6] = [
    ("english", "Not worth the price. Too many bugs and the gameplay gets repetitive fast."),
    ("english", "Disappointing experience. The game crashes frequently."),
    ("brazilian", "Não vale o preço. Muitos bugs e a jogabilidade fica repetitiva."),
    ("brazilian", "Experiência decepcionante. O jogo trava frequentemente."),
    ("spanish", "No vale el precio. Demasiados errores."),
    ("spanish", "Experiencia decepcionante. El juego se bloquea con frecuencia."),
];

const NOW: i64 = 1_760_000_000;
const NINETY_DAYS: i64 = 90 * 24 * 60 * 60;

/// Random pages with a scriptable end and scriptable failures.
pub struct SimulatedFetcher {
    rng: Mutex<StdRng>,
    more_pages_probability: f64,
    page_limit: Option<usize>,
    failures: Mutex<VecDeque<FetchError>>,
    calls: AtomicUsize,
    pages_served: AtomicUsize,
}

impl SimulatedFetcher {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            more_pages_probability: 0.7,
            page_limit: None,
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            pages_served: AtomicUsize::new(0),
        }
    }

    /// Ends the cursor chain after exactly `pages` successful pages.
    pub fn with_page_limit(mut self, pages: usize) -> Self {
        self.page_limit = Some(pages);
        self
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: FetchError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Number of `fetch_page` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn generate(&self, cursor: &Cursor, filters: &ReviewFilters) -> PageResult {
        let mut rng = self.rng.lock().unwrap();
        let served = self.pages_served.fetch_add(1, Ordering::SeqCst) + 1;

        let records = (0..filters.page_size)
            .map(|_| random_record(&mut rng, filters))
            .collect();

        let (total_positive, total_negative) = match filters.review_type {
            ReviewType::Positive => (rng.gen_range(500..1500), rng.gen_range(50..250)),
            ReviewType::Negative => (rng.gen_range(200..700), rng.gen_range(100..600)),
            ReviewType::All => (rng.gen_range(500..1500), rng.gen_range(50..350)),
        };

        let has_next = match self.page_limit {
            Some(limit) => served < limit,
            None => cursor.is_initial() || rng.gen_bool(self.more_pages_probability),
        };
        let next = if has_next {
            Cursor::new(format!("nextpage_{}", served))
        } else {
            Cursor::end()
        };

        PageResult {
            records,
            cursor: next,
            summary: SummaryCounts {
                total_positive,
                total_negative,
                total_reviews: total_positive + total_negative,
                review_score: 7,
                review_score_desc: "Mostly Positive".to_string(),
            },
        }
    }
}

fn random_record(rng: &mut StdRng, filters: &ReviewFilters) -> ReviewRecord {
    let voted_up = match filters.review_type {
        ReviewType::Positive => true,
        ReviewType::Negative => false,
        ReviewType::All => rng.gen_bool(0.7),
    };

    let language = match filters.forced_language() {
        Some(tag) => tag.to_string(),
        None => LANGUAGES[rng.gen_range(0..LANGUAGES.len())].to_string(),
    };

    let texts = if voted_up { &POSITIVE_TEXTS } else { &NEGATIVE_TEXTS };
    let candidates: Vec<&str> = texts
        .iter()
        .filter(|(lang, _)| *lang == language)
        .map(|(_, text)| *text)
        .collect();
    let pool = if candidates.is_empty() {
        texts
            .iter()
            .filter(|(lang, _)| *lang == "english")
            .map(|(_, text)| *text)
            .collect()
    } else {
        candidates
    };
    let text = pool[rng.gen_range(0..pool.len())].to_string();

    let created = rng.gen_range(NOW - NINETY_DAYS..NOW);
    let playtime = rng.gen_range(60..6060);

    ReviewRecord {
        id: rng.gen_range(100_000_000..1_100_000_000),
        text,
        language,
        voted_up,
        timestamp_created: created,
        timestamp_updated: created + rng.gen_range(0..86_400),
        playtime_forever: playtime,
        playtime_at_review: playtime * 8 / 10,
        playtime_last_two_weeks: rng.gen_range(0..1200),
        votes_up: rng.gen_range(0..=50),
        votes_funny: rng.gen_range(0..=20),
        steam_purchase: rng.gen_bool(0.9),
        received_for_free: rng.gen_bool(0.1),
        written_during_early_access: rng.gen_bool(0.2),
        author: ReviewAuthor {
            steam_id: rng.gen_range(1_000_000_000u64..2_000_000_000).to_string(),
            games_owned: rng.gen_range(10..210),
            reviews_count: rng.gen_range(1..51),
        },
    }
}

#[async_trait]
impl PageFetcher for SimulatedFetcher {
    async fn fetch_page(
        &self,
        subject_id: &str,
        cursor: &Cursor,
        filters: &ReviewFilters,
    ) -> Result<PageResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        validate_subject(subject_id)?;
        filters.validate()?;

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(self.generate(cursor, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_page_honours_filters() {
        let fetcher = SimulatedFetcher::new(7);
        let filters = ReviewFilters {
            language: "spanish".to_string(),
            review_type: ReviewType::Negative,
            page_size: 15,
            ..Default::default()
        };

        let page = fetcher
            .fetch_page("100", &Cursor::initial(), &filters)
            .await
            .unwrap();

        assert_eq!(page.records.len(), 15);
        assert!(page.records.iter().all(|r| !r.voted_up));
        assert!(page.records.iter().all(|r| r.language == "spanish"));
        assert!(!page.cursor.is_end(), "first page always has a next cursor");
        assert_eq!(
            page.summary.total_reviews,
            page.summary.total_positive + page.summary.total_negative
        );
    }

    #[tokio::test]
    async fn test_page_limit_ends_cursor_chain() {
        let fetcher = SimulatedFetcher::new(1).with_page_limit(2);
        let filters = ReviewFilters::default();

        let first = fetcher
            .fetch_page("100", &Cursor::initial(), &filters)
            .await
            .unwrap();
        let second = fetcher
            .fetch_page("100", &first.cursor, &filters)
            .await
            .unwrap();

        assert!(!first.cursor.is_end());
        assert!(second.cursor.is_end());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_consumed_once() {
        let fetcher = SimulatedFetcher::new(3);
        fetcher.fail_next(FetchError::Upstream("offline".to_string()));

        let filters = ReviewFilters::default();
        assert!(fetcher
            .fetch_page("100", &Cursor::initial(), &filters)
            .await
            .is_err());
        assert!(fetcher
            .fetch_page("100", &Cursor::initial(), &filters)
            .await
            .is_ok());
        assert_eq!(fetcher.calls(), 2);
    }
}
