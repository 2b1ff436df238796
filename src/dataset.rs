use crate::{Embedding, EmbeddingPrecision, LshError, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// The half-width of the box cluster centres are drawn from.
pub const CENTRE_BOX: EmbeddingPrecision = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Options for generating a clustered dataset.
pub struct SampleOptions {
    /// The number of vectors to index.
    pub samples: usize,
    /// The number of query vectors, drawn from the same clusters.
    pub test_samples: usize,
    /// The dimensionality of every vector.
    pub features: usize,
    /// The number of clusters.
    pub clusters: usize,
    /// The standard deviation of each component around its cluster centre.
    pub cluster_std: EmbeddingPrecision,
    /// Whether to emit 0/1 indicator vectors (a component is 1 when positive) instead of dense ones.
    pub binary: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            samples: 1000,
            test_samples: 100,
            features: 100,
            clusters: 10,
            cluster_std: 1.0,
            binary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A dataset split into vectors to index and vectors to query with.
pub struct Samples {
    /// The vectors to index.
    pub train: Vec<Embedding>,
    /// The query vectors.
    pub test: Vec<Embedding>,
}

/// Generate gaussian clusters of vectors.
///
/// Cluster centres are drawn uniformly from `[-10, 10)` in every dimension; each vector picks a cluster uniformly at random and adds gaussian noise to its centre.
///
/// # Arguments
///
/// * `options` - The shape of the dataset.
///
/// * `rng` - The source of randomness.
///
/// # Returns
///
/// The generated vectors and queries.
pub fn generate_samples<R: Rng>(options: &SampleOptions, rng: &mut R) -> Result<Samples> {
    if options.features == 0 {
        return Err(LshError::InvalidParameter(
            "samples need at least one feature",
        ));
    }
    if options.clusters == 0 {
        return Err(LshError::InvalidParameter(
            "samples need at least one cluster",
        ));
    }
    // Normal::new accepts negative deviations
    if !(options.cluster_std.is_finite() && options.cluster_std >= 0.0) {
        return Err(LshError::InvalidParameter(
            "the cluster standard deviation must be finite and non-negative",
        ));
    }
    let noise = Normal::new(0.0, options.cluster_std).map_err(|_| {
        LshError::InvalidParameter("the cluster standard deviation must be finite and non-negative")
    })?;

    let centres: Vec<Embedding> = (0..options.clusters)
        .map(|_| {
            (0..options.features)
                .map(|_| rng.random_range(-CENTRE_BOX..CENTRE_BOX))
                .collect()
        })
        .collect();
    let sample = |rng: &mut R| -> Embedding {
        let centre = &centres[rng.random_range(0..centres.len())];
        centre
            .iter()
            .map(|c| {
                let x = c + noise.sample(rng);
                match options.binary {
                    true => EmbeddingPrecision::from(u8::from(x > 0.0)),
                    false => x,
                }
            })
            .collect()
    };

    let train = (0..options.samples).map(|_| sample(rng)).collect();
    let test = (0..options.test_samples).map(|_| sample(rng)).collect();
    Ok(Samples { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shapes_follow_options() {
        let options = SampleOptions {
            samples: 50,
            test_samples: 7,
            features: 12,
            ..Default::default()
        };
        let samples = generate_samples(&options, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(samples.train.len(), 50);
        assert_eq!(samples.test.len(), 7);
        assert!(samples
            .train
            .iter()
            .chain(samples.test.iter())
            .all(|v| v.len() == 12));
    }

    #[test]
    fn binary_samples_are_indicator_vectors() {
        let options = SampleOptions {
            samples: 40,
            binary: true,
            ..Default::default()
        };
        let samples = generate_samples(&options, &mut StdRng::seed_from_u64(2)).unwrap();
        assert!(samples
            .train
            .iter()
            .flatten()
            .all(|x| *x == 0.0 || *x == 1.0));
    }

    #[test]
    fn same_seed_same_samples() {
        let options = SampleOptions::default();
        let a = generate_samples(&options, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = generate_samples(&options, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_degenerate_options() {
        let mut rng = StdRng::seed_from_u64(4);
        for options in [
            SampleOptions {
                features: 0,
                ..Default::default()
            },
            SampleOptions {
                clusters: 0,
                ..Default::default()
            },
            SampleOptions {
                cluster_std: -1.0,
                ..Default::default()
            },
            SampleOptions {
                cluster_std: EmbeddingPrecision::NAN,
                ..Default::default()
            },
            SampleOptions {
                cluster_std: EmbeddingPrecision::INFINITY,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                generate_samples(&options, &mut rng),
                Err(LshError::InvalidParameter(_))
            ));
        }
    }
}
