//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the full ingest-and-query workflow by
//! composing an [`Embedder`], a [`VectorStore`], a [`Chunker`], a
//! [`Retriever`] with an optional [`Reranker`], and a [`ContextBuilder`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nova_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.add_document(document).await?;
//! let context = pipeline.generate_context("search query", 5).await?;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, chunker_from_config};
use crate::completion::CompletionProvider;
use crate::config::{Parameters, RagConfig};
use crate::context::ContextBuilder;
use crate::document::Document;
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::loader::DocumentLoader;
use crate::reranker::{Reranker, reranker_from_config};
use crate::retriever::{RetrievalOptions, Retriever};
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store) and query
/// execution (embed → search → rerank → assemble context). Construct one
/// via [`RagPipeline::builder()`].
///
/// The pipeline remembers which chunk ids each added document produced, so
/// re-adding a document replaces all of its previous chunks and
/// [`remove_document`](Self::remove_document) removes every chunk.
pub struct RagPipeline {
    config: RagConfig,
    embedder: Embedder,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    context_builder: ContextBuilder,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunk_ids: RwLock<HashMap<String, Vec<String>>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedder.
    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// Returns the number of chunks stored. Any chunks left from an earlier
    /// version of the same document id are removed first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or storage fails,
    /// including the document ID in the error message.
    pub async fn add_document(&self, document: Document) -> Result<usize> {
        if document.id.is_empty() {
            return Err(RagError::InvalidInput("document id must not be empty".to_string()));
        }

        // 1. Chunk the document
        let chunks = self.chunker.split(&document);
        if chunks.is_empty() {
            let mut registry = self.chunk_ids.write().await;
            if let Some(previous) = registry.get(&document.id) {
                let stale: Vec<&str> = previous.iter().map(String::as_str).collect();
                self.vector_store.delete(&stale).await.map_err(|e| {
                    RagError::PipelineError(format!(
                        "failed to replace document '{}': {e}",
                        document.id
                    ))
                })?;
            }
            registry.remove(&document.id);
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(0);
        }

        // 2. Generate embeddings for every chunk
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            RagError::PipelineError(format!("embedding failed for document '{}': {e}", document.id))
        })?;

        // 3. Drop stale chunks, then insert
        let mut registry = self.chunk_ids.write().await;
        if let Some(previous) = registry.get(&document.id) {
            let stale: Vec<&str> = previous
                .iter()
                .map(String::as_str)
                .filter(|id| !chunks.iter().any(|c| c.id == *id))
                .collect();
            if !stale.is_empty() {
                self.vector_store.delete(&stale).await.map_err(|e| {
                    RagError::PipelineError(format!(
                        "failed to replace document '{}': {e}",
                        document.id
                    ))
                })?;
            }
        }

        self.vector_store.insert(&chunks, &vectors).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "insert failed during ingestion");
            RagError::PipelineError(format!("insert failed for document '{}': {e}", document.id))
        })?;
        registry.insert(document.id.clone(), chunks.iter().map(|c| c.id.clone()).collect());

        let chunk_count = chunks.len();
        info!(document.id = %document.id, chunk_count, "ingested document");

        Ok(chunk_count)
    }

    /// Ingest multiple documents.
    ///
    /// A failing document is logged and skipped. Returns the number of
    /// documents that were added successfully.
    pub async fn add_documents<I>(&self, documents: I) -> usize
    where
        I: IntoIterator<Item = Document>,
    {
        let mut added = 0;
        let mut failed = 0;
        for document in documents {
            let id = document.id.clone();
            match self.add_document(document).await {
                Ok(_) => added += 1,
                Err(e) => {
                    failed += 1;
                    warn!(document.id = %id, error = %e, "skipping document");
                }
            }
        }
        info!(added, failed, "ingested documents");
        added
    }

    /// Load documents from `path` with the configured loader and ingest them.
    ///
    /// Returns the number of documents added.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no loader is configured, or the
    /// loader's error if `path` cannot be loaded.
    pub async fn load_documents(&self, path: impl AsRef<Path>) -> Result<usize> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| RagError::ConfigError("no document loader configured".to_string()))?;
        let documents = loader.load(path.as_ref()).await?;
        Ok(self.add_documents(documents).await)
    }

    /// Load and ingest several sources. A source that fails to load is
    /// logged and skipped.
    ///
    /// Returns the total number of documents added.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no loader is configured.
    pub async fn load_documents_from<I, P>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        if self.loader.is_none() {
            return Err(RagError::ConfigError("no document loader configured".to_string()));
        }

        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            match self.load_documents(path).await {
                Ok(count) => added += count,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping source"),
            }
        }
        Ok(added)
    }

    /// Retrieve up to `top_k` documents using the configured retrieval defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or search fails.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        self.retrieve_with(query, &self.retriever.default_options(top_k)).await
    }

    /// Retrieve documents with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or search fails.
    pub async fn retrieve_with(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<Vec<Document>> {
        let documents = self.retriever.retrieve_with(query, options).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            RagError::PipelineError(format!("retrieval failed: {e}"))
        })?;
        info!(result_count = documents.len(), "query completed");
        Ok(documents)
    }

    /// Retrieve and render a prompt context for `query`.
    ///
    /// # Errors
    ///
    /// See [`retrieve`](Self::retrieve).
    pub async fn generate_context(&self, query: &str, top_k: usize) -> Result<String> {
        let options = self.retriever.default_options(top_k);
        self.generate_context_with(query, &options, &Parameters::new()).await
    }

    /// Retrieve with `options` and render the context, filling extra
    /// template placeholders from `parameters`.
    ///
    /// # Errors
    ///
    /// See [`retrieve_with`](Self::retrieve_with).
    pub async fn generate_context_with(
        &self,
        query: &str,
        options: &RetrievalOptions,
        parameters: &Parameters,
    ) -> Result<String> {
        let documents = self.retrieve_with(query, options).await?;
        Ok(self.context_builder.build_context(&documents, query, parameters))
    }

    /// Remove a document and all of its chunks.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store fails.
    pub async fn remove_document(&self, id: &str) -> Result<bool> {
        Ok(self.remove_documents(&[id]).await? > 0)
    }

    /// Remove several documents and their chunks.
    ///
    /// Returns the number of stored entries removed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store fails.
    pub async fn remove_documents(&self, ids: &[&str]) -> Result<usize> {
        let mut registry = self.chunk_ids.write().await;
        let mut targets: Vec<String> = Vec::new();
        for id in ids {
            match registry.get(*id) {
                Some(chunk_ids) => targets.extend(chunk_ids.iter().cloned()),
                None => targets.push((*id).to_string()),
            }
        }

        let target_refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let removed = self.vector_store.delete(&target_refs).await.map_err(|e| {
            error!(error = %e, "delete failed");
            RagError::PipelineError(format!("delete failed: {e}"))
        })?;
        for id in ids {
            registry.remove(*id);
        }

        info!(requested = ids.len(), removed, "removed documents");
        Ok(removed)
    }

    /// Remove every stored document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store fails.
    pub async fn clear_all(&self) -> Result<()> {
        let mut registry = self.chunk_ids.write().await;
        self.vector_store.clear().await.map_err(|e| {
            error!(error = %e, "clear failed");
            RagError::PipelineError(format!("clear failed: {e}"))
        })?;
        registry.clear();
        info!("cleared knowledge base");
        Ok(())
    }

    /// Number of entries (chunks) in the vector store.
    pub async fn size(&self) -> usize {
        self.vector_store.size().await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `vector_store` are required. Without a config
/// the defaults are used; without a chunker one is built from the config.
/// A reranker is built from the config's rerank section when it is enabled
/// and a completion provider is given, unless one is set explicitly.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .reranker(Arc::new(reranker))  // optional
///     .loader(Arc::new(TextFileLoader::new()))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    loader: Option<Arc<dyn DocumentLoader>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker built from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set a reranker for post-search result reordering.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the completion provider used to build a reranker from the config.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Set the loader used by [`RagPipeline::load_documents`].
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| chunker_from_config(&config.chunking));

        let reranker = match (self.reranker, self.completion_provider) {
            (Some(reranker), _) => Some(reranker),
            (None, Some(provider)) if config.rerank.enabled => {
                Some(reranker_from_config(provider, &config.rerank))
            }
            _ => None,
        };

        let embedder = Embedder::with_config(embedding_provider, &config.embedding);
        let mut retriever =
            Retriever::new(embedder.clone(), vector_store.clone(), config.retrieval.clone());
        if let Some(reranker) = reranker {
            retriever = retriever.with_reranker(reranker);
        }
        let context_builder = ContextBuilder::new(config.context.clone());

        Ok(RagPipeline {
            config,
            embedder,
            vector_store,
            chunker,
            retriever,
            context_builder,
            loader: self.loader,
            chunk_ids: RwLock::new(HashMap::new()),
        })
    }
}
