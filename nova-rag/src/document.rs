//! Data types for documents and scored search results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::{Metadata, MetadataValue};

/// Metadata key holding the id of the document a chunk was split from.
pub const PARENT_ID_KEY: &str = "parentId";
/// Metadata key holding the zero-based position of a chunk.
pub const CHUNK_INDEX_KEY: &str = "chunkIndex";
/// Metadata key holding the number of chunks the parent was split into.
pub const TOTAL_CHUNKS_KEY: &str = "totalChunks";

/// A unit of text stored in and retrieved from a vector store.
///
/// Source documents and the chunks split from them share this type; a chunk
/// is simply a new `Document` with its own id and provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The text content of the document.
    pub content: String,
    /// Schema-free metadata used for provenance and filtering.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with the given id and content and no metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), title: None, content: content.into(), metadata: Metadata::new() }
    }

    /// Create a document with a freshly generated UUID v4 id.
    pub fn with_generated_id(content: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), content)
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a metadata entry, replacing any previous value for `key`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Number of characters (not bytes) in the content.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// The id of the parent document if this document is a chunk.
    pub fn parent_id(&self) -> Option<&str> {
        self.metadata.get(PARENT_ID_KEY).and_then(MetadataValue::as_str)
    }
}

/// A [`Document`] paired with a relevance score.
///
/// The score is cosine similarity when produced by a vector store search
/// (typically in `[-1, 1]`) or a normalised relevance in `[0, 1]` after
/// reranking. Higher is more relevant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    /// The retrieved document.
    pub document: Document,
    /// The relevance score.
    pub score: f32,
}

impl ScoredDocument {
    /// Pair a document with a score.
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}

/// Sort scored documents by descending score, breaking ties by id so that
/// equal scores come back in a stable order.
pub(crate) fn sort_descending(results: &mut [ScoredDocument]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
}
