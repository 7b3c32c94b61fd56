//! Second-pass relevance scoring of retrieved candidates.
//!
//! [`ScoringReranker`] is the shared machinery: it asks a [`RelevanceScorer`]
//! for one score per document, sorts best first and drops anything below a
//! threshold. Two scorers are provided:
//!
//! - [`CrossEncoderScorer`]: a relevance model that answers with a bare
//!   0–100 number for a `(query, content)` pair
//! - [`LlmScorer`]: a general completion model prompted through a template,
//!   whose free-text answer is searched for the first integer in 0–100
//!
//! Scorers never fail the rerank. An answer with no usable number scores
//! 0.5 (neutral); a provider error scores 0.0 (demoted).

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::completion::CompletionProvider;
use crate::config::{Parameters, RerankConfig, RerankerKind};
use crate::document::{Document, ScoredDocument};
use crate::error::Result;

/// Score assigned when a response carries no usable number.
pub const NEUTRAL_SCORE: f32 = 0.5;
/// Score assigned when the provider call itself fails.
pub const FAILED_SCORE: f32 = 0.0;

static SCORE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([0-9]|[1-9][0-9]|100)\b")
        .expect("unreachable error: failed to compile score pattern")
});

/// A reranker that re-scores and reorders candidate documents.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Score `documents` against `query` and return them best first.
    ///
    /// `parameters` are merged over the reranker's configured defaults.
    async fn rerank(
        &self,
        documents: Vec<Document>,
        query: &str,
        parameters: &Parameters,
    ) -> Result<Vec<ScoredDocument>>;
}

/// Produces an independent relevance score in `[0, 1]` for one document.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Score a single document. Implementations absorb their own failures.
    async fn score_document(&self, document: &Document, query: &str, parameters: &Parameters)
    -> f32;
}

/// Overlay `overrides` on `defaults`; keys in `overrides` win.
pub fn merge_parameters(defaults: &Parameters, overrides: &Parameters) -> Parameters {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Scores every candidate with a [`RelevanceScorer`], sorts descending and
/// applies a score threshold.
///
/// Only the first `max_documents` candidates are scored; the remainder keep
/// their incoming order behind the scored ones with a score of 0.0.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{LlmScorer, ScoringReranker};
///
/// let reranker = ScoringReranker::new(LlmScorer::new(provider), 0.3);
/// let ranked = reranker.rerank(candidates, "feline behavior", &Parameters::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ScoringReranker<S> {
    scorer: S,
    threshold: f32,
    max_documents: usize,
}

impl<S: RelevanceScorer> ScoringReranker<S> {
    /// Create a reranker; `threshold <= 0` keeps every document.
    pub fn new(scorer: S, threshold: f32) -> Self {
        Self { scorer, threshold, max_documents: usize::MAX }
    }

    /// Cap the number of candidates sent to the scorer.
    pub fn with_max_documents(mut self, max_documents: usize) -> Self {
        self.max_documents = max_documents;
        self
    }

    /// The configured threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn filter_by_threshold(&self, results: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
        if self.threshold <= 0.0 {
            return results;
        }
        results.into_iter().filter(|r| r.score >= self.threshold).collect()
    }
}

#[async_trait]
impl<S: RelevanceScorer> Reranker for ScoringReranker<S> {
    fn name(&self) -> &str {
        self.scorer.name()
    }

    async fn rerank(
        &self,
        mut documents: Vec<Document>,
        query: &str,
        parameters: &Parameters,
    ) -> Result<Vec<ScoredDocument>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let overflow = documents.split_off(documents.len().min(self.max_documents));
        let scores =
            join_all(documents.iter().map(|d| self.scorer.score_document(d, query, parameters)))
                .await;

        let mut results: Vec<ScoredDocument> =
            documents.into_iter().zip(scores).map(|(d, s)| ScoredDocument::new(d, s)).collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.extend(overflow.into_iter().map(|d| ScoredDocument::new(d, 0.0)));

        let candidates = results.len();
        let results = self.filter_by_threshold(results);
        debug!(
            reranker = self.scorer.name(),
            candidates,
            kept = results.len(),
            threshold = self.threshold,
            "reranked documents"
        );
        Ok(results)
    }
}

/// Scores with a relevance model that replies with a bare number 0–100.
///
/// The prompt is the query and the document content separated by a blank
/// line, sent at temperature 0 unless the caller overrides it.
pub struct CrossEncoderScorer {
    provider: Arc<dyn CompletionProvider>,
    defaults: Parameters,
}

impl CrossEncoderScorer {
    /// Create a scorer backed by `provider`.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        let mut defaults = Parameters::new();
        defaults.insert("temperature".to_string(), Value::from(0.0));
        Self { provider, defaults }
    }

    /// Replace the default provider parameters.
    pub fn with_defaults(mut self, defaults: Parameters) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Parse a whole response as a 0–100 number and normalise it to `[0, 1]`.
fn parse_bare_score(response: &str) -> Option<f32> {
    let value: f64 = response.trim().parse().ok()?;
    value.is_finite().then(|| (value / 100.0).clamp(0.0, 1.0) as f32)
}

#[async_trait]
impl RelevanceScorer for CrossEncoderScorer {
    fn name(&self) -> &str {
        "cross-encoder"
    }

    async fn score_document(
        &self,
        document: &Document,
        query: &str,
        parameters: &Parameters,
    ) -> f32 {
        let params = merge_parameters(&self.defaults, parameters);
        let prompt = format!("{query}\n\n{}", document.content);

        match self.provider.generate(&prompt, &params).await {
            Ok(response) => parse_bare_score(&response).unwrap_or_else(|| {
                warn!(document.id = %document.id, %response, "failed to parse relevance score");
                NEUTRAL_SCORE
            }),
            Err(e) => {
                error!(document.id = %document.id, error = %e, "cross-encoder scoring failed");
                FAILED_SCORE
            }
        }
    }
}

/// Scores with a completion model prompted for a relevance rating.
///
/// The template's `{query}` and `{content}` placeholders are filled in and
/// the first integer between 0 and 100 in the reply becomes the score.
pub struct LlmScorer {
    provider: Arc<dyn CompletionProvider>,
    prompt_template: String,
    defaults: Parameters,
}

impl LlmScorer {
    /// Create a scorer with the default prompt and temperature 0.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self::from_config(provider, &RerankConfig::default())
    }

    /// Create a scorer using the prompt and parameters in `config`.
    pub fn from_config(provider: Arc<dyn CompletionProvider>, config: &RerankConfig) -> Self {
        Self {
            provider,
            prompt_template: config.prompt_template.clone(),
            defaults: config.default_parameters(),
        }
    }

    /// Replace the prompt template.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    fn render_prompt(&self, query: &str, content: &str) -> String {
        self.prompt_template.replace("{query}", query).replace("{content}", content)
    }
}

/// Find the first standalone integer in 0–100 and normalise it to `[0, 1]`.
fn extract_score(response: &str) -> Option<f32> {
    let captures = SCORE_PATTERN.captures(response)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    Some(value as f32 / 100.0)
}

#[async_trait]
impl RelevanceScorer for LlmScorer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn score_document(
        &self,
        document: &Document,
        query: &str,
        parameters: &Parameters,
    ) -> f32 {
        let params = merge_parameters(&self.defaults, parameters);
        let prompt = self.render_prompt(query, &document.content);

        match self.provider.generate(&prompt, &params).await {
            Ok(response) => extract_score(&response).unwrap_or_else(|| {
                warn!(document.id = %document.id, %response, "no score found in LLM response");
                NEUTRAL_SCORE
            }),
            Err(e) => {
                error!(document.id = %document.id, error = %e, "LLM scoring failed");
                FAILED_SCORE
            }
        }
    }
}

/// Build the reranker described by `config` on top of `provider`.
pub fn reranker_from_config(
    provider: Arc<dyn CompletionProvider>,
    config: &RerankConfig,
) -> Arc<dyn Reranker> {
    match config.kind {
        RerankerKind::CrossEncoder => {
            let scorer = CrossEncoderScorer::new(provider)
                .with_defaults(config.default_parameters());
            Arc::new(
                ScoringReranker::new(scorer, config.threshold)
                    .with_max_documents(config.max_documents),
            )
        }
        RerankerKind::Llm => Arc::new(
            ScoringReranker::new(LlmScorer::from_config(provider, config), config.threshold)
                .with_max_documents(config.max_documents),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::RagError;

    /// Replies from a table keyed by document content; records parameters.
    struct ScriptedProvider {
        replies: HashMap<&'static str, std::result::Result<&'static str, &'static str>>,
        seen: Mutex<Vec<Parameters>>,
    }

    impl ScriptedProvider {
        fn new(
            replies: &[(&'static str, std::result::Result<&'static str, &'static str>)],
        ) -> Self {
            Self { replies: replies.iter().cloned().collect(), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn generate(&self, prompt: &str, parameters: &Parameters) -> Result<String> {
            self.seen.lock().unwrap().push(parameters.clone());
            // Both prompt formats end with a blank line then the content.
            let tail = prompt.rsplit_once("\n\n").map_or(prompt, |(_, tail)| tail);
            let content = tail.strip_prefix("Document: ").unwrap_or(tail);
            let reply = self.replies.get(content).ok_or_else(|| RagError::CompletionError {
                provider: "scripted".into(),
                message: format!("unknown content {content:?}"),
            })?;
            match *reply {
                Ok(reply) => Ok(reply.to_string()),
                Err(message) => Err(RagError::CompletionError {
                    provider: "scripted".into(),
                    message: message.into(),
                }),
            }
        }
    }

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().enumerate().map(|(i, c)| Document::new(format!("d{i}"), *c)).collect()
    }

    #[test]
    fn extract_score_finds_first_integer_in_range() {
        assert_eq!(extract_score("Score: 85/100"), Some(0.85));
        assert_eq!(extract_score("I'd say 150, no, 42"), Some(0.42));
        assert_eq!(extract_score("100"), Some(1.0));
        assert_eq!(extract_score("no idea"), None);
    }

    #[test]
    fn parse_bare_score_normalises() {
        assert_eq!(parse_bare_score(" 73 "), Some(0.73));
        assert_eq!(parse_bare_score("250"), Some(1.0));
        assert_eq!(parse_bare_score("high"), None);
    }

    #[test]
    fn caller_parameters_win() {
        let mut defaults = Parameters::new();
        defaults.insert("temperature".into(), Value::from(0.0));
        defaults.insert("model".into(), Value::from("small"));
        let mut caller = Parameters::new();
        caller.insert("temperature".into(), Value::from(0.7));

        let merged = merge_parameters(&defaults, &caller);
        assert_eq!(merged["temperature"], Value::from(0.7));
        assert_eq!(merged["model"], Value::from("small"));
    }

    #[tokio::test]
    async fn llm_reranker_orders_and_applies_fallbacks() {
        let provider = Arc::new(ScriptedProvider::new(&[
            ("cats purr", Ok("Relevance: 90")),
            ("dogs bark", Ok("maybe 40?")),
            ("cars honk", Ok("not relevant at all")),
            ("broken", Err("timeout")),
        ]));
        let reranker = ScoringReranker::new(LlmScorer::new(provider.clone()), 0.0);
        let ranked = reranker
            .rerank(
                docs(&["broken", "dogs bark", "cars honk", "cats purr"]),
                "feline",
                &Parameters::new(),
            )
            .await
            .unwrap();

        let scores: Vec<(&str, f32)> =
            ranked.iter().map(|r| (r.document.content.as_str(), r.score)).collect();
        assert_eq!(
            scores,
            vec![("cats purr", 0.9), ("cars honk", 0.5), ("dogs bark", 0.4), ("broken", 0.0)]
        );
        for params in provider.seen.lock().unwrap().iter() {
            assert_eq!(params["temperature"], Value::from(0.0));
        }
    }

    #[tokio::test]
    async fn threshold_drops_low_scores() {
        let provider = Arc::new(ScriptedProvider::new(&[
            ("relevant", Ok("80")),
            ("unclear", Ok("??")),
            ("irrelevant", Ok("10")),
        ]));
        let reranker = ScoringReranker::new(CrossEncoderScorer::new(provider), 0.6);
        let ranked = reranker
            .rerank(docs(&["irrelevant", "unclear", "relevant"]), "q", &Parameters::new())
            .await
            .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].document.content, "relevant");
    }

    #[tokio::test]
    async fn caller_temperature_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(&[("text", Ok("50"))]));
        let reranker = ScoringReranker::new(CrossEncoderScorer::new(provider.clone()), 0.0);
        let mut params = Parameters::new();
        params.insert("temperature".into(), Value::from(0.3));
        reranker.rerank(docs(&["text"]), "q", &params).await.unwrap();

        assert_eq!(provider.seen.lock().unwrap()[0]["temperature"], Value::from(0.3));
    }

    #[tokio::test]
    async fn overflow_candidates_trail_unscored() {
        let provider =
            Arc::new(ScriptedProvider::new(&[("first", Ok("10")), ("second", Ok("90"))]));
        let reranker =
            ScoringReranker::new(CrossEncoderScorer::new(provider), 0.0).with_max_documents(2);
        let ranked = reranker
            .rerank(docs(&["first", "second", "third"]), "q", &Parameters::new())
            .await
            .unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(order, vec!["second", "first", "third"]);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let reranker = reranker_from_config(provider, &RerankConfig::default());
        assert_eq!(reranker.name(), "cross-encoder");
        assert!(reranker.rerank(Vec::new(), "q", &Parameters::new()).await.unwrap().is_empty());
    }
}
