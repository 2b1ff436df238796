//! Approximate nearest neighbour search over forests of locality-sensitive hash tables.
//!
//! An [`LSHIndex`] partitions a static set of vectors with several independently drawn
//! [`LSHTable`]s. Queries gather the union of the buckets they land in, then rank those
//! candidates by exact similarity. The number of tables and the number of hash functions per
//! table trade recall against the number of similarity evaluations performed.
#![warn(missing_docs)]

/// Synthetic clustered datasets for experiments.
pub mod dataset;
/// Errors raised while building or querying an index.
pub mod error;
/// Exact ground truth, recall, and recall/cost measurements.
pub mod evaluation;
/// Implementations of locality-sensitive hashing indices.
pub mod index;
/// Similarity measures between vectors.
pub mod similarity;

pub use error::{LshError, Result};
pub use index::core::{HashCode, HashFamily, HashFunction, Hyperplane};
pub use index::lsh::{LSHIndex, LSHIndexOptions, Neighbour, QueryResult};
pub use index::table::{LSHTable, Signature};
pub use similarity::SimilarityKind;

/// The numeric type of a single vector component.
pub type EmbeddingPrecision = f32;

/// A vector of features.
pub type Embedding = Vec<EmbeddingPrecision>;

/// The position of a vector within the dataset an index was built from.
pub type VectorId = usize;
