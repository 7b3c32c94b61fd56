//! Error types for the `nova-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Only caller mistakes and strict-mode collaborator failures surface as
/// errors. Degraded provider output (a failed embedding, an unparsable
/// rerank score) is absorbed and logged instead.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller passed malformed arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vector does not match the dimension already established by the store.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension established by previously stored vectors.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion provider failed to produce a response.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A document could not be loaded from disk.
    #[error("Document load error ({path}): {message}")]
    DocumentLoadError {
        /// The path that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
