//! Configuration types for DocSearch.
//!
//! The [`Config`] struct controls engine behavior including:
//! - Embedding provider and dimension (384, 768, or custom)
//! - Distance metric and HNSW tuning parameters
//! - Index naming, tombstone compaction and durability settings
//!
//! # Example
//! ```rust
//! use docsearch::{Config, DistanceMetric, EmbeddingDimension, SyncMode};
//!
//! // Use defaults (External provider, 384 dimensions, cosine)
//! let config = Config::default();
//!
//! // Customize for production
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     metric: DistanceMetric::Dot,
//!     sync_mode: SyncMode::Normal,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::vector::DistanceMetric;

/// Largest embedding dimension accepted by [`Config::validate`].
pub const MAX_DIMENSION: usize = 4096;

/// Engine configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use docsearch::Config;
///
/// let config = Config {
///     compaction_threshold: 0.5,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// How embeddings are generated or provided.
    pub embedding_provider: EmbeddingProvider,

    /// Embedding vector dimension (must match provider output).
    ///
    /// Locked into the index metadata on first open.
    pub embedding_dimension: EmbeddingDimension,

    /// Similarity metric used by the index.
    ///
    /// Locked into the index metadata on first open.
    pub metric: DistanceMetric,

    /// HNSW graph tuning parameters.
    pub hnsw: HnswConfig,

    /// Name of the index inside the database file.
    pub index_name: String,

    /// Prefix prepended to document ids to form storage keys.
    pub key_prefix: String,

    /// Tag assigned to documents ingested through file upload.
    pub default_tag: String,

    /// Fraction of tombstoned nodes that triggers compaction after a delete.
    ///
    /// Must be in `(0.0, 1.0]`. Default: 0.25
    pub compaction_threshold: f32,

    /// Tag partitions at or below this size are searched exhaustively.
    ///
    /// Small partitions are poorly served by graph traversal, and an exact
    /// scan over a few dozen vectors is cheaper anyway. `0` disables it.
    pub exact_search_threshold: usize,

    /// Durability mode for write operations.
    pub sync_mode: SyncMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::External,
            // 384 matches all-MiniLM-L6-v2
            embedding_dimension: EmbeddingDimension::D384,
            metric: DistanceMetric::Cosine,
            hnsw: HnswConfig::default(),
            index_name: "docs".to_string(),
            key_prefix: "doc:".to_string(),
            default_tag: "ST".to_string(),
            compaction_threshold: 0.25,
            exact_search_threshold: 64,
            sync_mode: SyncMode::Normal,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for a given dimension and metric, other settings default.
    ///
    /// # Example
    /// ```rust
    /// use docsearch::{Config, DistanceMetric};
    ///
    /// let config = Config::with_index(3, DistanceMetric::Cosine);
    /// assert_eq!(config.dimension(), 3);
    /// ```
    pub fn with_index(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            embedding_dimension: EmbeddingDimension::from_size(dimension),
            metric,
            ..Default::default()
        }
    }

    /// Creates a Config that embeds text with the deterministic hashing embedder.
    ///
    /// Useful for tests and for deployments without a model server.
    pub fn with_hashing_embeddings(dimension: EmbeddingDimension) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `SearchEngine::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - Custom dimension is 0 or > 4096
    /// - HNSW parameters are out of range
    /// - `compaction_threshold` is outside `(0.0, 1.0]`
    /// - `index_name` or `key_prefix` is empty
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > MAX_DIMENSION {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    format!("custom dimension must not exceed {}", MAX_DIMENSION),
                ));
            }
        }

        self.hnsw.validate()?;

        if !(self.compaction_threshold > 0.0 && self.compaction_threshold <= 1.0) {
            return Err(ValidationError::invalid_field(
                "compaction_threshold",
                format!("must be in (0.0, 1.0], got {}", self.compaction_threshold),
            ));
        }

        if self.index_name.is_empty() {
            return Err(ValidationError::required_field("index_name"));
        }

        if self.key_prefix.is_empty() {
            return Err(ValidationError::required_field("key_prefix"));
        }

        if self.default_tag.is_empty() {
            return Err(ValidationError::required_field("default_tag"));
        }

        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// HNSW graph construction and search parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max neighbors per node on upper layers (`M`). Layer 0 allows `2 * M`.
    pub m: usize,

    /// Beam width while inserting. Higher = better graph, slower inserts.
    pub ef_construction: usize,

    /// Default beam width while searching. Raised to `k` when smaller.
    pub ef_search: usize,

    /// Hard cap on the sampled layer of any node.
    pub max_layer: usize,

    /// Seed for layer sampling. `None` draws a random seed per index.
    pub seed: Option<u64>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            max_layer: 16,
            seed: None,
        }
    }
}

impl HnswConfig {
    /// Validates the graph parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.m < 2 {
            return Err(ValidationError::invalid_field(
                "hnsw.m",
                format!("must be at least 2, got {}", self.m),
            ));
        }
        if self.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Neighbor list capacity for `layer`.
    #[inline]
    pub fn capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// Level multiplier `1 / ln(M)` for layer sampling.
    #[inline]
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }
}

/// Embedding provider configuration.
///
/// Determines how text is turned into vectors by the API layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Caller provides pre-computed embedding vectors.
    ///
    /// Text endpoints need an [`EmbeddingService`](crate::embedding::EmbeddingService)
    /// injected explicitly.
    External,

    /// Deterministic feature-hashing embedder bundled with the crate.
    Hashing,
}

impl EmbeddingProvider {
    /// Returns true if this is the external provider.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }

    /// Returns true if this is the bundled hashing provider.
    pub fn is_hashing(&self) -> bool {
        matches!(self, Self::Hashing)
    }
}

/// Embedding vector dimensions.
///
/// Standard dimensions are provided for common models. Use `Custom` for
/// other embedding services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (all-MiniLM-L6-v2).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5, BERT-base).
    D768,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use docsearch::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::D768.size(), 768);
    /// assert_eq!(EmbeddingDimension::Custom(1536).size(), 1536);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::Custom(n) => *n,
        }
    }

    /// Maps a numeric size onto the matching variant.
    pub const fn from_size(size: usize) -> Self {
        match size {
            384 => Self::D384,
            768 => Self::D768,
            n => Self::Custom(n),
        }
    }
}

/// Durability mode for write operations.
///
/// Controls the trade-off between write performance and crash safety.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Sync to disk on transaction commit.
    #[default]
    Normal,

    /// Async sync (faster writes, may lose recent data on crash).
    Fast,

    /// Sync every write with extra checksum verification.
    Paranoid,
}

impl SyncMode {
    /// Returns true if this mode verifies every write.
    pub fn is_paranoid(&self) -> bool {
        matches!(self, Self::Paranoid)
    }

    /// Returns true if this mode is async (may lose data on crash).
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::Fast)
    }
}
