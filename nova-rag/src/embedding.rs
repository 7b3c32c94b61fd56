//! Embedding provider trait and the degrading [`Embedder`] built on it.
//!
//! [`EmbeddingProvider`] is the boundary to an external embedding backend.
//! [`Embedder`] is what the rest of the pipeline talks to: it splits
//! oversized batches, validates every returned vector, and substitutes zero
//! vectors for failures so that one bad item makes one chunk unfindable
//! instead of failing a whole ingestion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    ///
    /// Callers never pass more than [`max_batch_size`](EmbeddingProvider::max_batch_size)
    /// texts at once.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// The largest batch the backend accepts in one call.
    fn max_batch_size(&self) -> usize {
        usize::MAX
    }

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "embedding-provider"
    }
}

/// The pipeline-facing embedding service.
///
/// Cheap to clone; clones share the underlying provider.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    strict: bool,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("batch_size", &self.batch_size)
            .field("strict", &self.strict)
            .finish()
    }
}

impl Embedder {
    /// Wrap a provider with the default [`EmbeddingConfig`].
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(provider, &EmbeddingConfig::default())
    }

    /// Wrap a provider with explicit batching and failure policy.
    pub fn with_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        let batch_size = config.batch_size.max(1).min(provider.max_batch_size().max(1));
        Self { provider, batch_size, strict: config.strict }
    }

    /// Dimensionality of every vector this embedder returns.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Effective number of texts sent per provider call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimensions()]
    }

    fn is_valid(&self, vector: &[f32]) -> bool {
        vector.len() == self.dimensions() && vector.iter().all(|v| v.is_finite())
    }

    fn failure(&self, message: String) -> RagError {
        RagError::EmbeddingError { provider: self.provider.name().to_string(), message }
    }

    /// Embed a single text.
    ///
    /// Blank text maps to a zero vector without calling the provider.
    ///
    /// # Errors
    ///
    /// Only in strict mode: returns [`RagError::EmbeddingError`] when the
    /// provider fails or returns a malformed vector. Otherwise failures
    /// degrade to a zero vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(self.zero_vector());
        }

        match self.provider.embed(text).await {
            Ok(vector) if self.is_valid(&vector) => Ok(vector),
            Ok(vector) => {
                let message = format!(
                    "malformed vector: expected {} finite values, got {}",
                    self.dimensions(),
                    vector.len()
                );
                self.degrade(message)
            }
            Err(e) => self.degrade(e.to_string()),
        }
    }

    fn degrade(&self, message: String) -> Result<Vec<f32>> {
        if self.strict {
            error!(provider = self.provider.name(), %message, "embedding failed");
            return Err(self.failure(message));
        }
        warn!(provider = self.provider.name(), %message, "embedding failed, using zero vector");
        Ok(self.zero_vector())
    }

    /// Embed a batch of texts, preserving input order.
    ///
    /// The batch is sent in sub-batches of at most [`batch_size`](Self::batch_size).
    /// A missing, wrongly-sized or non-finite slot becomes a zero vector; a
    /// failed sub-batch becomes zero vectors for all of its items.
    ///
    /// # Errors
    ///
    /// Only in strict mode, on the first failed sub-batch or malformed slot.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(
                provider = self.provider.name(),
                batch_index,
                batch_size = batch.len(),
                "embedding batch"
            );

            let returned = match self.provider.embed_batch(batch).await {
                Ok(returned) => returned,
                Err(e) => {
                    if self.strict {
                        error!(
                            provider = self.provider.name(),
                            batch_index,
                            error = %e,
                            "batch embedding failed"
                        );
                        return Err(self.failure(format!("batch {batch_index} failed: {e}")));
                    }
                    error!(
                        provider = self.provider.name(),
                        batch_index,
                        error = %e,
                        "batch embedding failed, using zero vectors"
                    );
                    vectors.extend(batch.iter().map(|_| self.zero_vector()));
                    continue;
                }
            };

            let mut returned = returned.into_iter();
            for (slot, text) in batch.iter().enumerate() {
                match returned.next() {
                    _ if text.trim().is_empty() => vectors.push(self.zero_vector()),
                    Some(vector) if self.is_valid(&vector) => vectors.push(vector),
                    other => {
                        let message = match other {
                            Some(vector) => format!(
                                "slot {slot} of batch {batch_index}: expected {} finite values, got {}",
                                self.dimensions(),
                                vector.len()
                            ),
                            None => format!("slot {slot} of batch {batch_index}: missing vector"),
                        };
                        vectors.push(self.degrade(message)?);
                    }
                }
            }
        }

        Ok(vectors)
    }

    /// Embed a batch on a separate tokio task.
    ///
    /// Returns immediately; the returned handle resolves to the same result
    /// as [`embed_batch`](Self::embed_batch). Dropping or
    /// [aborting](EmbeddingHandle::abort) the handle before completion has
    /// no effect on any store, since nothing is written until the vectors
    /// are consumed by the caller.
    ///
    /// Must be called from within a tokio runtime.
    pub fn embed_batch_async(&self, texts: Vec<String>) -> EmbeddingHandle {
        let embedder = self.clone();
        let handle = tokio::spawn(async move {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            embedder.embed_batch(&refs).await
        });
        EmbeddingHandle { inner: handle, provider: self.provider.name().to_string() }
    }
}

/// A pending [`Embedder::embed_batch_async`] result.
///
/// Await it to obtain the vectors.
#[derive(Debug)]
pub struct EmbeddingHandle {
    inner: JoinHandle<Result<Vec<Vec<f32>>>>,
    provider: String,
}

impl EmbeddingHandle {
    /// Cancel the embedding task.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Whether the task has completed.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for EmbeddingHandle {
    type Output = Result<Vec<Vec<f32>>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => Poll::Ready(Err(RagError::EmbeddingError {
                provider: self.provider.clone(),
                message: format!("embedding task did not complete: {e}"),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
