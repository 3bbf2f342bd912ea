//! Embedding-provider interface
//!
//! The similarity index treats the provider as an external collaborator:
//! "provider unreachable" and "model not installed" are distinct,
//! user-actionable conditions.

pub mod ollama;

pub use ollama::OllamaClient;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("embedding provider unreachable: {message}")]
    Unavailable { message: String },
    #[error("embedding model not installed: {model}")]
    ModelMissing { model: String },
    #[error("embedding request failed: {message}")]
    RequestFailed { message: String },
    #[error("unexpected provider response: {message}")]
    Parse { message: String },
}

/// A source of text embeddings.
#[allow(async_fn_in_trait)]
pub trait EmbeddingProvider {
    /// Identifier of the model that produces the vectors.
    fn model_name(&self) -> &str;

    /// Cheap reachability probe.
    async fn is_available(&self) -> Result<(), ProviderError>;

    /// Whether the configured model is installed on the provider.
    async fn has_model(&self) -> Result<bool, ProviderError>;

    /// Embed one text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
