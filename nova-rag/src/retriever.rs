//! Query-time retrieval: embed the query, search the store, filter by score
//! and optionally rerank.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Parameters, RetrievalConfig};
use crate::document::{Document, ScoredDocument};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::metadata::MetadataFilter;
use crate::reranker::Reranker;
use crate::vectorstore::VectorStore;

/// Per-call retrieval options.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Results scoring below this are dropped.
    pub min_score: f32,
    /// Metadata constraints applied inside the store before ranking.
    pub filter: Option<MetadataFilter>,
    /// Rerank the results when a reranker is available.
    pub rerank: bool,
}

impl RetrievalOptions {
    /// Options returning up to `top_k` results with no score floor.
    pub fn new(top_k: usize) -> Self {
        Self { top_k, min_score: f32::NEG_INFINITY, filter: None, rerank: false }
    }

    /// Options taken from the retrieval section of the config.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.minimum_score,
            filter: None,
            rerank: config.rerank,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Finds the stored documents most relevant to a query.
///
/// A failing reranker never fails retrieval: the results come back in
/// similarity order instead.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{Retriever, RetrievalOptions, MetadataFilter};
///
/// let retriever = Retriever::new(embedder, store, RetrievalConfig::default());
/// let docs = retriever.retrieve("how do cats sleep?", 3).await?;
///
/// let options = RetrievalOptions::new(10)
///     .with_min_score(0.2)
///     .with_filter(MetadataFilter::new().require("lang", "en"));
/// let scored = retriever.retrieve_scored("how do cats sleep?", &options).await?;
/// ```
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>, config: RetrievalConfig) -> Self {
        Self { embedder, store, reranker: None, config }
    }

    /// Attach a reranker used when [`RetrievalOptions::rerank`] is set.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Options derived from this retriever's config with `top_k` replaced.
    pub fn default_options(&self, top_k: usize) -> RetrievalOptions {
        RetrievalOptions::from_config(&self.config).with_top_k(top_k)
    }

    /// Retrieve up to `top_k` documents using the configured minimum score.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        self.retrieve_with(query, &self.default_options(top_k)).await
    }

    /// Retrieve documents with explicit options.
    pub async fn retrieve_with(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<Document>> {
        let scored = self.retrieve_scored(query, options).await?;
        Ok(scored.into_iter().map(|r| r.document).collect())
    }

    /// Retrieve documents together with their final scores, best first.
    ///
    /// A blank query returns no results and does not call the embedder.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the store fails.
    pub async fn retrieve_scored(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<ScoredDocument>> {
        if query.trim().is_empty() || options.top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let found = self.store.search(&query_vector, options.top_k, options.filter.as_ref()).await?;
        let found_count = found.len();
        let results: Vec<ScoredDocument> =
            found.into_iter().filter(|r| r.score >= options.min_score).collect();
        debug!(
            found = found_count,
            kept = results.len(),
            min_score = options.min_score,
            "retrieved"
        );

        if !options.rerank || results.is_empty() {
            return Ok(results);
        }
        let Some(reranker) = &self.reranker else {
            debug!("rerank requested but no reranker configured");
            return Ok(results);
        };

        let candidates: Vec<Document> = results.iter().map(|r| r.document.clone()).collect();
        match reranker.rerank(candidates, query, &Parameters::new()).await {
            Ok(mut reranked) => {
                reranked.truncate(options.top_k);
                Ok(reranked)
            }
            Err(e) => {
                warn!(
                    reranker = reranker.name(),
                    error = %e,
                    "reranking failed, keeping retrieval order"
                );
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::error::RagError;
    use crate::inmemory::InMemoryVectorStore;

    /// Two-dimensional embedding: how "cat" vs "dog" a text is.
    struct PetProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for PetProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = text.to_lowercase();
            Ok(vec![text.matches("cat").count() as f32, text.matches("dog").count() as f32])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        fn name(&self) -> &str {
            "failing"
        }

        async fn rerank(
            &self,
            _documents: Vec<Document>,
            _query: &str,
            _parameters: &Parameters,
        ) -> Result<Vec<ScoredDocument>> {
            Err(RagError::RerankerError { reranker: "failing".into(), message: "down".into() })
        }
    }

    struct ReverseReranker;

    #[async_trait]
    impl Reranker for ReverseReranker {
        fn name(&self) -> &str {
            "reverse"
        }

        async fn rerank(
            &self,
            documents: Vec<Document>,
            _query: &str,
            _parameters: &Parameters,
        ) -> Result<Vec<ScoredDocument>> {
            let n = documents.len() as f32;
            Ok(documents
                .into_iter()
                .rev()
                .enumerate()
                .map(|(i, d)| ScoredDocument::new(d, 1.0 - i as f32 / n))
                .collect())
        }
    }

    async fn setup() -> (Arc<PetProvider>, Retriever) {
        let provider = Arc::new(PetProvider { calls: AtomicUsize::new(0) });
        let store = Arc::new(InMemoryVectorStore::new());
        let docs = vec![
            Document::new("cat", "a cat").with_metadata("kind", "feline"),
            Document::new("dog", "a dog").with_metadata("kind", "canine"),
            Document::new("both", "cat and dog").with_metadata("kind", "mixed"),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        store.insert(&docs, &vectors).await.unwrap();
        let retriever =
            Retriever::new(Embedder::new(provider.clone()), store, RetrievalConfig::default());
        (provider, retriever)
    }

    #[tokio::test]
    async fn retrieve_applies_configured_min_score() {
        let (_, retriever) = setup().await;
        let docs = retriever.retrieve("cat", 3).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        // "both" scores ~0.707, just above the 0.7 default.
        assert_eq!(ids, vec!["cat", "both"]);
    }

    #[tokio::test]
    async fn blank_query_skips_embedding() {
        let (provider, retriever) = setup().await;
        assert!(retriever.retrieve("   ", 3).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn filter_is_passed_to_store() {
        let (_, retriever) = setup().await;
        let options =
            RetrievalOptions::new(3).with_filter(MetadataFilter::new().require("kind", "canine"));
        let docs = retriever.retrieve_with("cat", &options).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "dog");
    }

    #[tokio::test]
    async fn rerank_reorders_results() {
        let (_, retriever) = setup().await;
        let retriever = retriever.with_reranker(Arc::new(ReverseReranker));
        let options = RetrievalOptions::new(2).with_rerank(true);
        let docs = retriever.retrieve_with("cat", &options).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["both", "cat"]);
    }

    #[tokio::test]
    async fn rerank_failure_falls_back_to_similarity_order() {
        let (_, retriever) = setup().await;
        let retriever = retriever.with_reranker(Arc::new(FailingReranker));
        let options = RetrievalOptions::new(2).with_rerank(true);
        let scored = retriever.retrieve_scored("cat", &options).await.unwrap();
        assert_eq!(scored[0].document.id, "cat");
        assert!((scored[0].score - 1.0).abs() < 1e-6);
    }
}
