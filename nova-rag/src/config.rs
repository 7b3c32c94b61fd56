//! Configuration for the RAG pipeline.
//!
//! [`RagConfig`] groups the options consumed by each component at
//! construction time. It deserializes from JSON with every field optional,
//! and can be assembled in code through [`RagConfig::builder()`], which
//! validates the combination.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RagError, Result};

/// Caller-supplied parameters passed to providers and templates.
pub type Parameters = Map<String, Value>;

/// Default top-level context template.
pub const DEFAULT_CONTEXT_TEMPLATE: &str =
    "Answer the question based on the following context:\n\n{context}\n\nQuestion: {question}";

/// Default per-document template used when document formatting is enabled.
pub const DEFAULT_DOCUMENT_TEMPLATE: &str = "Document [{index}]: {content}\nSource: {source}";

/// Default prompt for completion-based reranking.
pub const DEFAULT_RERANK_PROMPT: &str = "Evaluate how relevant the following document is to the \
     question \"{query}\" and reply with a relevance score between 0 and 100.\n\nDocument: {content}";

/// Top-level configuration for the RAG pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Document splitting options.
    pub chunking: ChunkingConfig,
    /// Embedding batching and failure policy.
    pub embedding: EmbeddingConfig,
    /// Retrieval defaults.
    pub retrieval: RetrievalConfig,
    /// Reranking options.
    pub rerank: RerankConfig,
    /// Context assembly options.
    pub context: ContextConfig,
}

/// Which splitting strategy to use for ingestion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitterKind {
    /// Sentence-aware greedy packing.
    #[default]
    Sentence,
    /// Recursive separator-based character splitting.
    Character,
}

/// Document splitting options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing characters carried into the next chunk.
    pub chunk_overlap: usize,
    /// Splitting strategy.
    pub splitter: SplitterKind,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, splitter: SplitterKind::Sentence }
    }
}

/// Embedding batching and failure policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Maximum texts per provider call. The provider's own cap also applies.
    pub batch_size: usize,
    /// Raise embedding failures instead of substituting zero vectors.
    pub strict: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { batch_size: 32, strict: false }
    }
}

/// Retrieval defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of results to return.
    pub top_k: usize,
    /// Results scoring below this are dropped.
    pub minimum_score: f32,
    /// Whether retrieval reranks by default.
    pub rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, minimum_score: 0.7, rerank: false }
    }
}

/// Which reranking strategy to build.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RerankerKind {
    /// A relevance model scoring `(query, content)` pairs directly.
    #[default]
    CrossEncoder,
    /// A completion provider prompted for a 0-100 score.
    Llm,
}

/// Reranking options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankConfig {
    /// Whether the pipeline should construct a reranker.
    pub enabled: bool,
    /// Reranking strategy.
    pub kind: RerankerKind,
    /// Scores below this are dropped; `<= 0` disables filtering.
    pub threshold: f32,
    /// Maximum candidates scored per call; the rest keep their order behind.
    pub max_documents: usize,
    /// Prompt template for [`RerankerKind::Llm`] with `{query}` and `{content}`.
    pub prompt_template: String,
    /// Sampling temperature sent to the provider.
    pub temperature: f64,
    /// Extra default provider parameters.
    pub parameters: Parameters,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: RerankerKind::CrossEncoder,
            threshold: 0.0,
            max_documents: 50,
            prompt_template: DEFAULT_RERANK_PROMPT.to_string(),
            temperature: 0.0,
            parameters: Parameters::new(),
        }
    }
}

impl RerankConfig {
    /// Provider parameters implied by this config: `temperature` plus any
    /// configured extras.
    pub fn default_parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("temperature".to_string(), Value::from(self.temperature));
        params.extend(self.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }
}

/// Unit in which the context budget is measured.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetUnit {
    /// Count characters.
    #[default]
    Characters,
    /// Estimate tokens as one per four characters, rounded up.
    EstimatedTokens,
}

/// Context assembly options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Top-level template with `{context}` and `{question}`.
    pub template: String,
    /// Maximum size of the rendered context.
    pub max_tokens: usize,
    /// How `max_tokens` is measured.
    pub budget_unit: BudgetUnit,
    /// Render each document through `document_template`.
    pub format_documents: bool,
    /// Per-document template with `{index}`, `{content}` and `{source}`.
    pub document_template: String,
    /// Metadata key rendered as `{source}`.
    pub source_key: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_CONTEXT_TEMPLATE.to_string(),
            max_tokens: 3500,
            budget_unit: BudgetUnit::Characters,
            format_documents: true,
            document_template: DEFAULT_DOCUMENT_TEMPLATE.to_string(),
            source_key: "source".to_string(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse a JSON document into a validated config. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the JSON is malformed or fails
    /// [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RagError::ConfigError(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunking.chunk_size == 0`
    /// - `retrieval.top_k == 0`
    /// - `embedding.batch_size == 0`
    /// - `context.max_tokens == 0`
    /// - the context template lacks a `{context}` placeholder
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        if self.context.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if !self.context.template.contains("{context}") {
            return Err(RagError::ConfigError(
                "context template must contain a {context} placeholder".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.chunk_overlap = overlap;
        self
    }

    /// Select the splitting strategy.
    pub fn splitter(mut self, splitter: SplitterKind) -> Self {
        self.config.chunking.splitter = splitter;
        self
    }

    /// Set the maximum number of texts per embedding call.
    pub fn embedding_batch_size(mut self, batch_size: usize) -> Self {
        self.config.embedding.batch_size = batch_size;
        self
    }

    /// Raise embedding failures instead of degrading to zero vectors.
    pub fn strict_embedding(mut self, strict: bool) -> Self {
        self.config.embedding.strict = strict;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.retrieval.top_k = k;
        self
    }

    /// Set the minimum similarity score for retrieved results.
    pub fn minimum_score(mut self, score: f32) -> Self {
        self.config.retrieval.minimum_score = score;
        self
    }

    /// Rerank retrieval results by default.
    pub fn rerank(mut self, rerank: bool) -> Self {
        self.config.retrieval.rerank = rerank;
        self
    }

    /// Replace the reranking options.
    pub fn rerank_config(mut self, rerank: RerankConfig) -> Self {
        self.config.rerank = rerank;
        self
    }

    /// Set the rerank score threshold.
    pub fn rerank_threshold(mut self, threshold: f32) -> Self {
        self.config.rerank.threshold = threshold;
        self
    }

    /// Set the maximum context size.
    pub fn context_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.context.max_tokens = max_tokens;
        self
    }

    /// Set the top-level context template.
    pub fn context_template(mut self, template: impl Into<String>) -> Self {
        self.config.context.template = template.into();
        self
    }

    /// Set the per-document template.
    pub fn document_template(mut self, template: impl Into<String>) -> Self {
        self.config.context.document_template = template.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
