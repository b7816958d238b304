use std::path::Path;

use crate::error::EmbedError;

/// Embedder converts text into dense float32 vectors.
///
/// Implementations must be deterministic for identical input and safe for
/// concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Return the embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Return embedding vectors for multiple texts, in input order.
    /// Implementations may split large batches into smaller API calls.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}

/// ImageEmbedder turns an image file into a fixed-length feature vector.
///
/// The same file must always produce the same vector.
#[async_trait::async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Return the embedding vector for one image.
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError>;

    /// Return embedding vectors for several images, in input order.
    ///
    /// The default calls [`ImageEmbedder::embed_image`] once per path.
    async fn embed_images(&self, paths: &[&Path]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            out.push(self.embed_image(path).await?);
        }
        Ok(out)
    }

    /// Return the dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
