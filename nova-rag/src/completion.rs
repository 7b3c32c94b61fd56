//! Completion provider trait used by completion-backed rerankers.

use async_trait::async_trait;

use crate::config::Parameters;
use crate::error::Result;

/// A text-generation backend: prompt in, text out.
///
/// `parameters` carries provider options such as `temperature`; backends
/// ignore keys they do not understand.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{CompletionProvider, Parameters};
///
/// let mut params = Parameters::new();
/// params.insert("temperature".into(), 0.0.into());
/// let text = provider.generate("Rate this document", &params).await?;
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str, parameters: &Parameters) -> Result<String>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "completion-provider"
    }
}
