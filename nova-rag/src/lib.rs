//! # nova-rag
//!
//! Retrieval-augmented generation core: split documents into overlapping
//! chunks, embed them through a pluggable provider, store the vectors in
//! memory, retrieve the closest chunks for a query, optionally rerank them,
//! and assemble a size-bounded context for a language-model prompt.
//!
//! ## Components
//!
//! - [`Chunker`] with [`SentenceChunker`] and [`RecursiveCharacterChunker`]
//! - [`EmbeddingProvider`], wrapped by [`Embedder`] for batching and
//!   failure handling
//! - [`VectorStore`] with the exact-search [`InMemoryVectorStore`]
//! - [`Retriever`] and [`RetrievalOptions`]
//! - [`Reranker`] via [`ScoringReranker`] over a [`CrossEncoderScorer`] or
//!   [`LlmScorer`], both driven by a [`CompletionProvider`]
//! - [`ContextBuilder`]
//! - [`DocumentLoader`] with [`TextFileLoader`]
//! - [`RagPipeline`], which ties them together
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nova_rag::{Document, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.add_document(Document::new("cats", "Cats purr when content.")).await?;
//! let context = pipeline.generate_context("Why do cats purr?", 3).await?;
//! ```

pub mod chunking;
pub mod completion;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod loader;
pub mod metadata;
pub mod pipeline;
pub mod reranker;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{
    Chunker, MIN_CHUNK_SIZE, RecursiveCharacterChunker, SentenceChunker, chunker_from_config,
};
pub use completion::CompletionProvider;
pub use config::{
    BudgetUnit, ChunkingConfig, ContextConfig, EmbeddingConfig, Parameters, RagConfig,
    RagConfigBuilder, RerankConfig, RerankerKind, RetrievalConfig, SplitterKind,
};
pub use context::ContextBuilder;
pub use document::{CHUNK_INDEX_KEY, Document, PARENT_ID_KEY, ScoredDocument, TOTAL_CHUNKS_KEY};
pub use embedding::{Embedder, EmbeddingHandle, EmbeddingProvider};
pub use error::{RagError, Result};
pub use inmemory::{InMemoryVectorStore, cosine_similarity};
pub use loader::{DocumentLoader, TextFileLoader};
pub use metadata::{Metadata, MetadataFilter, MetadataValue};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use reranker::{
    CrossEncoderScorer, LlmScorer, RelevanceScorer, Reranker, ScoringReranker,
    reranker_from_config,
};
pub use retriever::{RetrievalOptions, Retriever};
pub use vectorstore::VectorStore;
