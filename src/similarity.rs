use crate::EmbeddingPrecision;
use hamming_bitwise_fast::hamming_bitwise_fast;
use serde::{Deserialize, Serialize};
use simsimd::SpatialSimilarity;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A notion of similarity between two vectors.
///
/// Every variant yields larger values for more similar vectors.
pub enum SimilarityKind {
    #[default]
    /// The cosine of the angle between two vectors.
    Cosine,
    /// The fraction of positions whose sign bits agree.
    Hamming,
    /// The Jaccard coefficient of two vectors read as sets of active positions.
    Jaccard,
}

impl SimilarityKind {
    /// Compute the similarity between two vectors of equal length.
    ///
    /// # Arguments
    ///
    /// * `a` - The first vector.
    ///
    /// * `b` - The second vector.
    ///
    /// # Returns
    ///
    /// The similarity of the two vectors; higher is more similar.
    pub fn similarity(&self, a: &[EmbeddingPrecision], b: &[EmbeddingPrecision]) -> f32 {
        match self {
            SimilarityKind::Cosine => cosine_similarity(a, b),
            SimilarityKind::Hamming => hamming_similarity(a, b),
            SimilarityKind::Jaccard => jaccard_similarity(a, b),
        }
    }
}

/// The dot product of two vectors, or zero if their lengths differ.
pub fn dot(a: &[EmbeddingPrecision], b: &[EmbeddingPrecision]) -> f64 {
    EmbeddingPrecision::dot(a, b).unwrap_or_default()
}

/// The cosine similarity of two vectors.
///
/// If either vector has no magnitude, the similarity is zero.
pub fn cosine_similarity(a: &[EmbeddingPrecision], b: &[EmbeddingPrecision]) -> f32 {
    let norms = dot(a, a) * dot(b, b);
    if norms <= 0.0 {
        return 0.0;
    }
    (dot(a, b) / norms.sqrt()).clamp(-1.0, 1.0) as f32
}

/// Pack the sign bits of a vector, least significant bit first.
///
/// A component is set when it is strictly positive.
pub fn sign_bits(vector: &[EmbeddingPrecision]) -> Vec<u8> {
    vector
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, x)| byte | (u8::from(*x > 0.0) << i))
        })
        .collect()
}

/// The fraction of positions at which the sign bits of two vectors agree.
pub fn hamming_similarity(a: &[EmbeddingPrecision], b: &[EmbeddingPrecision]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let differing = hamming_bitwise_fast(&sign_bits(a), &sign_bits(b));
    1.0 - differing as f32 / a.len() as f32
}

/// The Jaccard coefficient of two vectors read as sets of their strictly positive positions.
///
/// If neither vector has an active position, the coefficient is zero.
pub fn jaccard_similarity(a: &[EmbeddingPrecision], b: &[EmbeddingPrecision]) -> f32 {
    let (intersection, union) =
        a.iter()
            .zip(b.iter())
            .fold((0usize, 0usize), |(intersection, union), (x, y)| {
                match (*x > 0.0, *y > 0.0) {
                    (true, true) => (intersection + 1, union + 1),
                    (false, false) => (intersection, union),
                    _ => (intersection, union + 1),
                }
            });
    match union {
        0 => 0.0,
        union => intersection as f32 / union as f32,
    }
}
