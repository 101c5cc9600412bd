//! Embedding service abstractions for DocSearch.
//!
//! This module provides the trait and implementations for embedding generation.
//! Embeddings are dense vector representations of text used for semantic search.
//!
//! # Providers
//!
//! - [`ExternalEmbedding`] - For pre-computed embeddings (e.g., a model server)
//! - [`HashingEmbedding`] - Deterministic feature hashing, no model required
//!
//! # Example
//!
//! ```rust
//! use docsearch::embedding::{EmbeddingService, ExternalEmbedding};
//!
//! // External mode - caller provides embeddings
//! let service = ExternalEmbedding::new(384);
//! assert_eq!(service.dimension(), 384);
//!
//! // Validation only - cannot generate embeddings
//! assert!(service.embed("hello").is_err());
//! ```

use crate::config::{Config, EmbeddingProvider};
use crate::error::{DocSearchError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`); the HTTP layer
/// shares one service across request handlers.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use docsearch::embedding::EmbeddingService;
/// use docsearch::{Embedding, Result};
///
/// struct MyEmbeddingService {
///     client: MyApiClient,
///     dimension: usize,
/// }
///
/// impl EmbeddingService for MyEmbeddingService {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         Ok(self.client.get_embedding(text)?)
///     }
///
///     fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
///         Ok(self.client.get_embeddings(texts)?)
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns `DocSearchError::Embedding` if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generates embeddings for multiple texts, in input order.
    ///
    /// # Errors
    ///
    /// Returns `DocSearchError::Embedding` if any embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(ValidationError::dimension_mismatch(expected, actual).into());
        }

        Ok(())
    }
}

/// External embedding provider.
///
/// Used when embeddings are generated outside the engine. It validates
/// embedding dimensions but cannot generate embeddings itself: `embed()`
/// and `embed_batch()` always fail.
///
/// # Example
///
/// ```rust
/// use docsearch::embedding::{EmbeddingService, ExternalEmbedding};
///
/// let service = ExternalEmbedding::new(1536);
/// assert_eq!(service.dimension(), 1536);
/// ```
#[derive(Clone, Debug)]
pub struct ExternalEmbedding {
    dimension: usize,
}

impl ExternalEmbedding {
    /// Creates a new external embedding provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingService for ExternalEmbedding {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Err(DocSearchError::embedding(
            "External embedding mode: embeddings must be provided by the caller",
        ))
    }

    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>> {
        Err(DocSearchError::embedding(
            "External embedding mode: embeddings must be provided by the caller",
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Hashing embedder
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a) to a bucket and a
/// sign; the bucket counts are L2-normalized. Texts sharing words land
/// close under cosine. Text without tokens embeds to the zero vector.
///
/// Not a semantic model. It exists so the full ingest and query path works
/// without a model server, and so tests are reproducible.
///
/// ```rust
/// use docsearch::embedding::{EmbeddingService, HashingEmbedding};
///
/// let service = HashingEmbedding::new(64);
/// let a = service.embed("the quick brown fox").unwrap();
/// let b = service.embed("The quick brown fox!").unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Debug)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    /// Creates a hashing embedder producing vectors of `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(FNV_PRIME)
        })
    }
}

impl EmbeddingService for HashingEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if self.dimension == 0 {
            return Err(DocSearchError::embedding("dimension must be greater than 0"));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = Self::hash(&token.to_lowercase());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = crate::vector::norm(&vector);
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Creates an embedding service based on the configuration.
///
/// # Errors
///
/// Currently infallible; the `Result` leaves room for providers that load
/// models at construction.
pub fn create_embedding_service(config: &Config) -> Result<Box<dyn EmbeddingService>> {
    let dimension = config.dimension();
    match config.embedding_provider {
        EmbeddingProvider::External => Ok(Box::new(ExternalEmbedding::new(dimension))),
        EmbeddingProvider::Hashing => Ok(Box::new(HashingEmbedding::new(dimension))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingDimension;
    use crate::vector::DistanceMetric;

    #[test]
    fn test_external_embedding_dimension() {
        let service = ExternalEmbedding::new(384);
        assert_eq!(service.dimension(), 384);
    }

    #[test]
    fn test_external_embedding_embed_returns_error() {
        let service = ExternalEmbedding::new(384);
        let err = service.embed("hello world").unwrap_err();
        assert!(matches!(err, DocSearchError::Embedding(_)));
        assert!(service.embed_batch(&["hello", "world"]).is_err());
    }

    #[test]
    fn test_validate_embedding() {
        let service = ExternalEmbedding::new(3);
        assert!(service.validate_embedding(&[1.0, 2.0, 3.0]).is_ok());
        let err = service.validate_embedding(&[1.0, 2.0]).unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_hashing_embedding_is_normalized() {
        let service = HashingEmbedding::new(32);
        let v = service.embed("alpha beta gamma").unwrap();
        assert_eq!(v.len(), 32);
        assert!((crate::vector::norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedding_empty_text_is_zero() {
        let service = HashingEmbedding::new(8);
        let v = service.embed("  ...  ").unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_hashing_embedding_shared_words_are_closer() {
        let service = HashingEmbedding::new(256);
        let query = service.embed("rust vector search").unwrap();
        let near = service.embed("vector search in rust").unwrap();
        let far = service.embed("chocolate cake recipe").unwrap();

        let metric = DistanceMetric::Cosine;
        assert!(metric.distance(&query, &near) < metric.distance(&query, &far));
    }

    #[test]
    fn test_hashing_embed_batch_preserves_order() {
        let service = HashingEmbedding::new(16);
        let batch = service.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch[0], service.embed("one").unwrap());
        assert_eq!(batch[1], service.embed("two").unwrap());
    }

    #[test]
    fn test_embedding_services_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExternalEmbedding>();
        assert_send_sync::<HashingEmbedding>();
    }

    #[test]
    fn test_create_embedding_service() {
        let service = create_embedding_service(&Config::default()).unwrap();
        assert_eq!(service.dimension(), 384);
        assert!(service.embed("x").is_err());

        let config = Config::with_hashing_embeddings(EmbeddingDimension::Custom(12));
        let service = create_embedding_service(&config).unwrap();
        assert_eq!(service.embed("x").unwrap().len(), 12);
    }
}
