//! Vector store trait for storing and searching document embeddings.

use async_trait::async_trait;

use crate::document::{Document, ScoredDocument};
use crate::error::Result;
use crate::metadata::MetadataFilter;

/// A storage backend for `(document, vector)` pairs with similarity search.
///
/// Every vector stored in one instance has the same length; the first
/// stored vector establishes it.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.insert(&documents, &vectors).await?;
/// let results = store.search(&query_vector, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store each `(document, vector)` pair under `document.id`, replacing
    /// any existing entry. Pairs whose document id is empty are skipped.
    ///
    /// Returns the number of pairs stored.
    ///
    /// # Errors
    ///
    /// Fails without storing anything if the slices differ in length or a
    /// vector does not match the store's dimension.
    async fn insert(&self, documents: &[Document], vectors: &[Vec<f32>]) -> Result<usize>;

    /// Return up to `top_k` documents most similar to `query`, best first.
    ///
    /// When `filter` is given, only documents whose metadata matches it are
    /// ranked. `top_k == 0` or an empty query returns no results.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>>;

    /// Remove the given ids. Unknown ids are ignored.
    ///
    /// Returns the number of documents removed.
    async fn delete(&self, ids: &[&str]) -> Result<usize>;

    /// Remove every document.
    async fn clear(&self) -> Result<()>;

    /// Number of stored documents.
    async fn size(&self) -> usize;

    /// Whether the store holds no documents.
    async fn is_empty(&self) -> bool {
        self.size().await == 0
    }
}
