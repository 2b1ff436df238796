use super::core::{HashCode, HashFamily, HashFunction};
use crate::{Embedding, EmbeddingPrecision, LshError, Result, VectorId};
use dashmap::DashMap;
use rand::Rng;
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// The key of a bucket: the codes of every hash function in a table, in function order.
pub struct Signature(Box<[HashCode]>);

impl Signature {
    /// The codes making up this signature.
    pub fn codes(&self) -> &[HashCode] {
        &self.0
    }

    /// The number of codes in this signature.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this signature has no codes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<HashCode>> for Signature {
    fn from(codes: Vec<HashCode>) -> Self {
        Self(codes.into_boxed_slice())
    }
}

impl FromIterator<HashCode> for Signature {
    fn from_iter<I: IntoIterator<Item = HashCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{code}")?;
        }
        Ok(())
    }
}

/// Check that a dataset is non-empty and rectangular.
///
/// # Returns
///
/// The dimensionality shared by every vector in the dataset.
pub(crate) fn dataset_dimensions(dataset: &[Embedding]) -> Result<usize> {
    let dimensions = dataset
        .first()
        .map(|vector| vector.len())
        .ok_or(LshError::InvalidParameter(
            "the dataset must contain at least one vector",
        ))?;
    if dimensions == 0 {
        return Err(LshError::InvalidParameter(
            "vectors must have at least one dimension",
        ));
    }
    match dataset.iter().find(|vector| vector.len() != dimensions) {
        Some(vector) => Err(LshError::DimensionMismatch {
            expected: dimensions,
            got: vector.len(),
        }),
        None => Ok(dimensions),
    }
}

#[derive(Debug, Clone)]
/// One locality-sensitive partition of a dataset.
///
/// Every vector in the dataset lies in exactly one bucket, keyed by the [`Signature`] its hash functions produce.
pub struct LSHTable {
    dimensions: usize,
    functions: Vec<HashFunction>,
    buckets: HashMap<Signature, Vec<VectorId>>,
}

impl LSHTable {
    /// Build a table over a dataset.
    ///
    /// # Arguments
    ///
    /// * `dataset` - The vectors to partition; a vector's ID is its position in the dataset.
    ///
    /// * `functions` - The number of hash functions whose codes make up each bucket key.
    ///
    /// * `family` - The family the hash functions are drawn from.
    ///
    /// * `rng` - The source of randomness for drawing the hash functions.
    ///
    /// # Returns
    ///
    /// An [LSHTable].
    pub fn build<R: Rng>(
        dataset: &[Embedding],
        functions: usize,
        family: HashFamily,
        rng: &mut R,
    ) -> Result<Self> {
        if functions == 0 {
            return Err(LshError::InvalidParameter(
                "a table needs at least one hash function",
            ));
        }
        let dimensions = dataset_dimensions(dataset)?;
        let functions = (0..functions)
            .map(|_| family.draw(dimensions, rng))
            .collect::<Result<Vec<_>>>()?;
        let mut table = Self {
            dimensions,
            functions,
            buckets: HashMap::new(),
        };

        let buckets: DashMap<Signature, Vec<VectorId>> = DashMap::new();
        dataset
            .par_iter()
            .enumerate()
            .try_for_each(|(id, vector)| -> Result<()> {
                buckets.entry(table.signature(vector)?).or_default().push(id);
                Ok(())
            })?;
        // Insertion order depends on scheduling
        table.buckets = buckets
            .into_par_iter()
            .map(|(signature, mut ids)| {
                ids.par_sort_unstable();
                (signature, ids)
            })
            .collect();
        Ok(table)
    }

    /// The dimensionality of the vectors in this table.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The hash functions of this table, in the order their codes appear in a [`Signature`].
    pub fn functions(&self) -> &[HashFunction] {
        &self.functions
    }

    fn check_dimensions(&self, vector: &[EmbeddingPrecision]) -> Result<()> {
        match vector.len() == self.dimensions {
            true => Ok(()),
            false => Err(LshError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            }),
        }
    }

    /// Hash a vector with one of this table's functions.
    ///
    /// # Arguments
    ///
    /// * `vector` - The vector to hash.
    ///
    /// * `function` - The position of the hash function within the table.
    ///
    /// # Returns
    ///
    /// The code the function assigns to the vector.
    pub fn hash(&self, vector: &[EmbeddingPrecision], function: usize) -> Result<HashCode> {
        self.check_dimensions(vector)?;
        self.functions
            .get(function)
            .ok_or(LshError::FunctionOutOfRange {
                function,
                functions: self.functions.len(),
            })?
            .code(vector)
    }

    /// Compute the key of the bucket a vector belongs to.
    ///
    /// For a vector in the dataset, this is the key it was inserted under.
    pub fn signature(&self, vector: &[EmbeddingPrecision]) -> Result<Signature> {
        self.check_dimensions(vector)?;
        self.functions
            .iter()
            .map(|function| function.code(vector))
            .collect()
    }

    /// Find the vectors sharing a bucket with a query.
    ///
    /// # Arguments
    ///
    /// * `vector` - The query vector, which need not be in the dataset.
    ///
    /// # Returns
    ///
    /// The IDs of the vectors in the query's bucket, in ascending order. Empty if no vector in the dataset hashed to the query's key.
    pub fn candidates(&self, vector: &[EmbeddingPrecision]) -> Result<&[VectorId]> {
        Ok(self.bucket(&self.signature(vector)?))
    }

    /// The IDs of the vectors in a bucket, in ascending order.
    pub fn bucket(&self, signature: &Signature) -> &[VectorId] {
        self.buckets
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every non-empty bucket in this table.
    pub fn buckets(&self) -> impl Iterator<Item = (&Signature, &[VectorId])> {
        self.buckets
            .iter()
            .map(|(signature, ids)| (signature, ids.as_slice()))
    }

    /// The number of non-empty buckets in this table.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The number of vectors in the fullest bucket.
    pub fn largest_bucket_len(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or_default()
    }

    /// The number of vectors partitioned by this table.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether this table partitions no vectors.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
