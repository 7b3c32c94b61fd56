//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], an exact linear-scan store
//! backed by two `HashMap`s behind a single `tokio::sync::RwLock`. Searches
//! share the read lock; inserts, deletes and clears take the write lock, so
//! a reader never sees a document without its vector or the reverse.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document::{Document, ScoredDocument, sort_descending};
use crate::error::{RagError, Result};
use crate::metadata::MetadataFilter;
use crate::vectorstore::VectorStore;

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, Document>,
    vectors: HashMap<String, Vec<f32>>,
    /// Established by the first stored vector; kept across `clear()`.
    dimensions: Option<usize>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{Document, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.insert(&[Document::new("d1", "hello world")], &[vec![1.0, 0.0]]).await?;
/// let hits = store.search(&[1.0, 0.0], 1, None).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    state: RwLock<StoreState>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that only accepts vectors of `dimensions` length.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            state: RwLock::new(StoreState { dimensions: Some(dimensions), ..Default::default() }),
        }
    }

    /// The vector length this store accepts, once established.
    pub async fn dimensions(&self) -> Option<usize> {
        self.state.read().await.dimensions
    }

    /// Look up a stored document by id.
    pub async fn get(&self, id: &str) -> Option<Document> {
        self.state.read().await.documents.get(id).cloned()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns `dot(a, b) / (|a| * |b|)`, or 0.0 if either vector has zero
/// magnitude. Vectors of different lengths are compared over the shorter one.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Check an insert batch against the established dimension before anything
/// is written, returning the dimension the batch settles on.
fn validate_insert(
    documents: &[Document],
    vectors: &[Vec<f32>],
    established: Option<usize>,
) -> Result<Option<usize>> {
    if documents.len() != vectors.len() {
        return Err(RagError::InvalidInput(format!(
            "documents and vectors must have the same length ({} vs {})",
            documents.len(),
            vectors.len()
        )));
    }

    let mut dimensions = established;
    for (document, vector) in documents.iter().zip(vectors) {
        if document.id.is_empty() {
            continue;
        }
        if vector.is_empty() {
            return Err(RagError::InvalidInput(format!(
                "vector for document '{}' is empty",
                document.id
            )));
        }
        match dimensions {
            Some(expected) if expected != vector.len() => {
                return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
            }
            Some(_) => {}
            None => dimensions = Some(vector.len()),
        }
    }
    Ok(dimensions)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, documents: &[Document], vectors: &[Vec<f32>]) -> Result<usize> {
        let mut state = self.state.write().await;
        state.dimensions = validate_insert(documents, vectors, state.dimensions)?;

        let mut stored = 0;
        for (document, vector) in documents.iter().zip(vectors) {
            if document.id.is_empty() {
                warn!("skipping document with empty id");
                continue;
            }
            state.documents.insert(document.id.clone(), document.clone());
            state.vectors.insert(document.id.clone(), vector.clone());
            stored += 1;
        }

        debug!(stored, total = state.documents.len(), "inserted documents");
        Ok(stored)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        if let Some(expected) = state.dimensions {
            if expected != query.len() {
                return Err(RagError::DimensionMismatch { expected, actual: query.len() });
            }
        }

        let filter = filter.filter(|f| !f.is_empty());
        let mut scored: Vec<ScoredDocument> = state
            .documents
            .iter()
            .filter(|(_, document)| filter.is_none_or(|f| f.matches(&document.metadata)))
            .filter_map(|(id, document)| {
                let vector = state.vectors.get(id)?;
                Some(ScoredDocument::new(document.clone(), cosine_similarity(query, vector)))
            })
            .collect();

        sort_descending(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, ids: &[&str]) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for id in ids {
            state.vectors.remove(*id);
            if state.documents.remove(*id).is_some() {
                removed += 1;
            }
        }
        debug!(requested = ids.len(), removed, "deleted documents");
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.documents.clear();
        state.vectors.clear();
        Ok(())
    }

    async fn size(&self) -> usize {
        self.state.read().await.documents.len()
    }
}
