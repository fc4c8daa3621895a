pub mod openai;

pub use openai::OpenAiClient;

use anyhow::Result;

/// Default vector width produced by `text-embedding-3-small`.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// An embedding collaborator: text in, fixed-width vector out.
///
/// The parser takes this as an injected dependency so tests can substitute
/// a stub without any network access.
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for a single text input.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Width of the vectors this embedder produces.
    fn dimension(&self) -> usize;
}

/// Fallback vector substituted when an embedding request fails.
#[inline]
pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}
