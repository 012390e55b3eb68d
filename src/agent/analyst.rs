//! LLM analysis tasks over a collected review set.
//!
//! Every task sends a capped sample of the collection, never the whole
//! thing, so payload size stays bounded no matter how many pages were
//! fetched.

use crate::agent::client::LanguageModelClient;
use crate::analysis::LocalStats;
use crate::error::LlmError;
use crate::models::ReviewRecord;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// Records sent per request unless configured otherwise.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// Hard ceiling for the sample size.
pub const MAX_SAMPLE_SIZE: usize = 100;

/// Which analysis to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Summary,
    Sentiment,
    Topics,
    Recommendations,
    /// Summary, sentiment and topics together.
    Report,
    /// One collected review, by id.
    Review(u64),
}

/// Text produced by the analyses that ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewAnalysis>,
}

/// Analysis of a single review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAnalysis {
    pub review_id: u64,
    pub text: String,
}

impl AnalysisSections {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.sentiment.is_none()
            && self.topics.is_none()
            && self.recommendations.is_none()
            && self.review.is_none()
    }
}

const SUMMARY_PROMPT: &str = r#"
Write a summary of the following game reviews.
Identify the strengths and weaknesses mentioned most often.
Highlight what players like most and what they criticize most.
Give specific recommendations to the developers based on this feedback.
Organize the summary in clear sections."#;

const SENTIMENT_PROMPT: &str = r#"
Analyze the sentiment of the following game reviews.
Classify each review into one of these categories:
1. Very Positive
2. Positive
3. Neutral
4. Negative
5. Very Negative

Also list the most common keywords associated with positive and negative sentiment.
Present the results in a structured format with counts for each category."#;

const TOPICS_PROMPT: &str = r#"
Analyze the following game reviews and identify the main topics mentioned.
For each topic (Gameplay, Graphics, Story, Audio, Value, Performance),
count how many reviews mention it positively and how many negatively.

Present the results in a structured format with positive and negative
mention counts for each topic."#;

const RECOMMENDATIONS_PROMPT: &str = r#"
Based on the following game reviews, write specific recommendations for the developers.
Organize the recommendations into three priority groups:
1. High Priority (critical problems that need to be fixed immediately)
2. Medium Priority (important but not critical improvements)
3. Marketing Considerations (communication and strategy suggestions)

For each recommendation, briefly justify it with evidence from the reviews."#;

const CONNECTION_PROMPT: &str = "Reply with the single word OK.";

/// Runs analysis tasks with one configured client.
pub struct ReviewAnalyst<'a> {
    client: &'a LanguageModelClient,
    sample_size: usize,
}

impl<'a> ReviewAnalyst<'a> {
    pub fn new(client: &'a LanguageModelClient, sample_size: usize) -> Self {
        Self {
            client,
            sample_size: sample_size.clamp(1, MAX_SAMPLE_SIZE),
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Runs `kind` and returns the sections it filled in.
    pub async fn run(
        &self,
        kind: AnalysisKind,
        records: &[ReviewRecord],
    ) -> Result<AnalysisSections, LlmError> {
        info!(
            "Running {:?} analysis on {} of {} reviews",
            kind,
            records.len().min(self.sample_size),
            records.len()
        );

        let mut sections = AnalysisSections::default();
        match kind {
            AnalysisKind::Summary => sections.summary = Some(self.summarize(records).await?),
            AnalysisKind::Sentiment => sections.sentiment = Some(self.sentiment(records).await?),
            AnalysisKind::Topics => sections.topics = Some(self.topics(records).await?),
            AnalysisKind::Recommendations => {
                sections.recommendations = Some(self.recommendations(records).await?)
            }
            AnalysisKind::Report => sections = self.full_report(records).await?,
            AnalysisKind::Review(id) => {
                let record = find_review(records, id).ok_or(LlmError::ReviewNotFound(id))?;
                sections.review = Some(ReviewAnalysis {
                    review_id: id,
                    text: self.review(record).await?,
                });
            }
        }

        Ok(sections)
    }

    pub async fn summarize(&self, records: &[ReviewRecord]) -> Result<String, LlmError> {
        self.client
            .send(SUMMARY_PROMPT, &summary_payload(records, self.sample_size))
            .await
    }

    pub async fn sentiment(&self, records: &[ReviewRecord]) -> Result<String, LlmError> {
        self.client
            .send(SENTIMENT_PROMPT, &text_sample(records, self.sample_size))
            .await
    }

    pub async fn topics(&self, records: &[ReviewRecord]) -> Result<String, LlmError> {
        self.client
            .send(TOPICS_PROMPT, &text_sample(records, self.sample_size))
            .await
    }

    pub async fn recommendations(&self, records: &[ReviewRecord]) -> Result<String, LlmError> {
        self.client
            .send(
                RECOMMENDATIONS_PROMPT,
                &recommendations_payload(records, self.sample_size),
            )
            .await
    }

    /// Analyzes a single review on its own.
    pub async fn review(&self, record: &ReviewRecord) -> Result<String, LlmError> {
        self.client.send(&single_review_prompt(record), &Value::Null).await
    }

    /// Summary, sentiment and topics, requested concurrently.
    pub async fn full_report(&self, records: &[ReviewRecord]) -> Result<AnalysisSections, LlmError> {
        let (summary, sentiment, topics) = futures::try_join!(
            self.summarize(records),
            self.sentiment(records),
            self.topics(records)
        )?;

        Ok(AnalysisSections {
            summary: Some(summary),
            sentiment: Some(sentiment),
            topics: Some(topics),
            ..Default::default()
        })
    }

    /// Sends a trivial prompt to validate the credentials and model.
    pub async fn check_connection(&self) -> Result<String, LlmError> {
        self.client.send(CONNECTION_PROMPT, &Value::Null).await
    }
}

/// Looks a review up by id in the collected set.
pub fn find_review(records: &[ReviewRecord], id: u64) -> Option<&ReviewRecord> {
    records.iter().find(|r| r.id == id)
}

/// `{voted_up, text, language}` for the first `limit` records.
pub fn text_sample(records: &[ReviewRecord], limit: usize) -> Value {
    Value::Array(
        records
            .iter()
            .take(limit)
            .map(|r| {
                json!({
                    "voted_up": r.voted_up,
                    "text": r.text,
                    "language": r.language,
                })
            })
            .collect(),
    )
}

/// Local stats over the whole collection plus a text sample.
pub fn summary_payload(records: &[ReviewRecord], limit: usize) -> Value {
    let stats = LocalStats::from_records(records);
    json!({
        "stats": {
            "total": stats.total,
            "positive": stats.positive,
            "negative": stats.negative,
            "positive_percentage": stats.positive_percentage,
        },
        "review_sample": text_sample(records, limit),
    })
}

/// Text sample extended with play time and helpful votes.
pub fn recommendations_payload(records: &[ReviewRecord], limit: usize) -> Value {
    Value::Array(
        records
            .iter()
            .take(limit)
            .map(|r| {
                json!({
                    "voted_up": r.voted_up,
                    "text": r.text,
                    "language": r.language,
                    "playtime": r.playtime_forever,
                    "votes_up": r.votes_up,
                })
            })
            .collect(),
    )
}

fn single_review_prompt(record: &ReviewRecord) -> String {
    format!(
        r#"Analyze the following game review:

Review: "{}"
Recommended: {}
Language: {}
Play time: {} hours

Provide:
1. A sentiment classification (Positive, Neutral or Negative)
2. The main points raised by the player
3. Suggestions for the developers based on this feedback"#,
        record.text,
        if record.voted_up { "Yes" } else { "No" },
        record.language,
        record.playtime_forever / 60
    )
}
