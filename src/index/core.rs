use crate::{similarity::SimilarityKind, Embedding, EmbeddingPrecision, LshError, Result};
use rand::{seq::SliceRandom, Rng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use simsimd::SpatialSimilarity;

/// The discrete output of a single hash function.
pub type HashCode = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A hyperplane through the origin; a hyperplane is a generalisation of a line (which has one dimension) or plane (which has two dimensions).
///
/// It is defined as the set of points whose dot product with a normal vector equals zero.
pub struct Hyperplane {
    /// The unit vector normal to the hyperplane.
    pub coefficients: Embedding,
}

impl Hyperplane {
    /// Draw a hyperplane whose normal vector is distributed uniformly on the unit hypersphere.
    ///
    /// # Arguments
    ///
    /// * `dimensions` - The dimensionality of the space the hyperplane divides.
    ///
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    ///
    /// A random hyperplane through the origin.
    pub fn random<R: Rng>(dimensions: usize, rng: &mut R) -> Self {
        let mut coefficients: Embedding = (0..dimensions)
            .map(|_| StandardNormal.sample(rng))
            .collect();
        let norm = EmbeddingPrecision::dot(&coefficients, &coefficients)
            .unwrap_or_default()
            .sqrt();
        if norm > 0.0 {
            coefficients
                .iter_mut()
                .for_each(|c| *c = (*c as f64 / norm) as EmbeddingPrecision);
        }
        Self { coefficients }
    }

    /// Calculates if a point is 'above' the hyperplane.
    ///
    /// A point is 'above' a hyperplane when it is pointing in the same direction as the hyperplane's normal vector. Points on the hyperplane count as above it.
    ///
    /// # Arguments
    ///
    /// * `point` - The point which may be above, on, or below the hyperplane.
    ///
    /// # Returns
    ///
    /// If the given point is above the hyperplane.
    pub fn point_is_above(&self, point: &[EmbeddingPrecision]) -> bool {
        EmbeddingPrecision::dot(&self.coefficients, point).unwrap_or_default() >= 0.0
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
/// A family of locality-sensitive hash functions.
pub enum HashFamily {
    #[default]
    /// Random hyperplane signs, approximating cosine similarity.
    Cosine,
    /// Sampled sign bits, approximating Hamming similarity.
    Hamming,
    /// Min-hashing over sets of active positions, approximating Jaccard similarity.
    ///
    /// Vectors hashed by this family must only contain zeroes and ones.
    Jaccard,
}

impl HashFamily {
    /// The similarity this family approximates, used to rank candidates exactly.
    pub fn similarity(&self) -> SimilarityKind {
        match self {
            HashFamily::Cosine => SimilarityKind::Cosine,
            HashFamily::Hamming => SimilarityKind::Hamming,
            HashFamily::Jaccard => SimilarityKind::Jaccard,
        }
    }

    /// Draw a hash function from this family.
    ///
    /// # Arguments
    ///
    /// * `dimensions` - The dimensionality of the vectors the function will hash.
    ///
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    ///
    /// A hash function with freshly drawn parameters.
    pub fn draw<R: Rng>(&self, dimensions: usize, rng: &mut R) -> Result<HashFunction> {
        if dimensions == 0 {
            return Err(LshError::InvalidParameter(
                "hash functions need at least one dimension",
            ));
        }
        Ok(match self {
            HashFamily::Cosine => HashFunction::Cosine(Hyperplane::random(dimensions, rng)),
            HashFamily::Hamming => HashFunction::Hamming {
                dimensions,
                position: rng.random_range(0..dimensions),
            },
            HashFamily::Jaccard => {
                let mut permutation: Vec<HashCode> = (0..dimensions as HashCode).collect();
                permutation.shuffle(rng);
                HashFunction::Jaccard { permutation }
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A hash function drawn from a [`HashFamily`].
///
/// The parameters are fixed once drawn, so hashing the same vector always yields the same code.
pub enum HashFunction {
    /// Which side of a random hyperplane a vector lies on.
    Cosine(Hyperplane),
    /// The sign bit of one sampled position.
    Hamming {
        /// The dimensionality of the vectors this function hashes.
        dimensions: usize,
        /// The sampled position.
        position: usize,
    },
    /// The smallest rank, under a random permutation, of any active position.
    Jaccard {
        /// The rank assigned to each position.
        permutation: Vec<HashCode>,
    },
}

impl HashFunction {
    /// The dimensionality of the vectors this function hashes.
    pub fn dimensions(&self) -> usize {
        match self {
            HashFunction::Cosine(hyperplane) => hyperplane.coefficients.len(),
            HashFunction::Hamming { dimensions, .. } => *dimensions,
            HashFunction::Jaccard { permutation } => permutation.len(),
        }
    }

    /// Hash a vector.
    ///
    /// # Arguments
    ///
    /// * `vector` - The vector to hash.
    ///
    /// # Returns
    ///
    /// A bit for the cosine and Hamming families. For the Jaccard family, the minimum rank of the vector's active positions, or the dimensionality if there are none.
    pub fn code(&self, vector: &[EmbeddingPrecision]) -> Result<HashCode> {
        if vector.len() != self.dimensions() {
            return Err(LshError::DimensionMismatch {
                expected: self.dimensions(),
                got: vector.len(),
            });
        }
        match self {
            HashFunction::Cosine(hyperplane) => Ok(hyperplane.point_is_above(vector).into()),
            HashFunction::Hamming { position, .. } => Ok((vector[*position] > 0.0).into()),
            HashFunction::Jaccard { permutation } => {
                let mut minimum = permutation.len() as HashCode;
                for (position, (value, rank)) in vector.iter().zip(permutation).enumerate() {
                    if *value == 1.0 {
                        minimum = minimum.min(*rank);
                    } else if *value != 0.0 {
                        return Err(LshError::InvalidVectorEncoding {
                            position,
                            value: *value,
                        });
                    }
                }
                Ok(minimum)
            }
        }
    }
}
