use crate::{
    index::{
        lsh::{LSHIndex, LSHIndexOptions, Neighbour, QueryResult},
        table::dataset_dimensions,
    },
    similarity::SimilarityKind,
    Embedding, LshError, Result, VectorId,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Find the exact *k* nearest neighbours of each query by comparing it with every vector.
///
/// Neighbours are ranked exactly as an [`LSHIndex`] ranks its candidates, so results can be compared by ID.
///
/// # Arguments
///
/// * `train` - The vectors to search.
///
/// * `test` - The query vectors.
///
/// * `k` - The number of neighbours to return per query.
///
/// * `kind` - The similarity to rank by.
///
/// # Returns
///
/// The exact neighbours of each query, in query order.
pub fn find_neighbours_brute(
    train: &[Embedding],
    test: &[Embedding],
    k: usize,
    kind: SimilarityKind,
) -> Result<Vec<QueryResult>> {
    let dimensions = dataset_dimensions(train)?;
    if let Some(query) = test.iter().find(|query| query.len() != dimensions) {
        return Err(LshError::DimensionMismatch {
            expected: dimensions,
            got: query.len(),
        });
    }
    Ok(test
        .par_iter()
        .map(|query| {
            let mut neighbours: Vec<Neighbour> = train
                .iter()
                .enumerate()
                .map(|(id, vector)| Neighbour {
                    id,
                    similarity: kind.similarity(query, vector),
                })
                .collect();
            neighbours.sort_unstable_by(Neighbour::rank);
            neighbours.truncate(k);
            QueryResult {
                neighbours,
                evaluations: train.len(),
            }
        })
        .collect())
}

/// The mean, over queries, of the fraction of the exact top *k* that an approximate search recovered.
///
/// Queries missing from `approximate` count as recovering nothing.
///
/// # Arguments
///
/// * `approximate` - The approximate results, in query order.
///
/// * `exact` - The exact results, in query order.
///
/// * `k` - The number of neighbours per query being evaluated.
///
/// # Returns
///
/// A recall in `[0, 1]`.
pub fn recall(approximate: &[QueryResult], exact: &[QueryResult], k: usize) -> f64 {
    if k == 0 || exact.is_empty() {
        return 0.0;
    }
    let recovered: usize = approximate
        .iter()
        .zip(exact)
        .map(|(approximate, exact)| {
            let truth: HashSet<VectorId> = exact.neighbours.iter().take(k).map(|n| n.id).collect();
            approximate
                .neighbours
                .iter()
                .take(k)
                .filter(|n| truth.contains(&n.id))
                .count()
        })
        .sum();
    recovered as f64 / (k * exact.len()) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// The recall and cost of one index configuration.
pub struct TradeoffPoint {
    /// The number of tables.
    pub tables: usize,
    /// The number of hash functions per table.
    pub functions: usize,
    /// The mean recall over the queries.
    pub recall: f64,
    /// The total number of similarity evaluations over the queries.
    pub evaluations: u64,
    /// The mean number of candidates per query.
    pub mean_candidates: f64,
}

/// Build an index and measure its recall and cost.
///
/// # Arguments
///
/// * `train` - The vectors to index.
///
/// * `test` - The query vectors.
///
/// * `exact` - The exact neighbours of each query.
///
/// * `k` - The number of neighbours per query.
///
/// * `options` - The creation options for the index.
///
/// # Returns
///
/// The measured recall and cost.
pub fn measure(
    train: &[Embedding],
    test: &[Embedding],
    exact: &[QueryResult],
    k: usize,
    options: &LSHIndexOptions,
) -> Result<TradeoffPoint> {
    let index = LSHIndex::build(train.to_vec(), options)?;
    let results = index.find_neighbours(test, k)?;
    let point = TradeoffPoint {
        tables: options.tables,
        functions: options.functions,
        recall: recall(&results, exact, k),
        evaluations: index.similarity_evaluation_count(),
        mean_candidates: index.mean_candidates(test)?,
    };
    debug!(?point, "Measured index.");
    Ok(point)
}

/// Find the fewest tables that reach a target recall.
///
/// Recall cannot fall as tables are added (the first tables of an index do not depend on how many there are), so the search bisects over the number of tables.
///
/// # Arguments
///
/// * `train` - The vectors to index.
///
/// * `test` - The query vectors.
///
/// * `exact` - The exact neighbours of each query.
///
/// * `k` - The number of neighbours per query.
///
/// * `options` - The creation options for the index; the number of tables is searched for.
///
/// * `target` - The recall to reach.
///
/// * `max_tables` - The largest number of tables to try.
///
/// # Returns
///
/// The smallest configuration reaching the target, or `None` if `max_tables` tables do not.
pub fn minimum_tables_for_recall(
    train: &[Embedding],
    test: &[Embedding],
    exact: &[QueryResult],
    k: usize,
    options: &LSHIndexOptions,
    target: f64,
    max_tables: usize,
) -> Result<Option<TradeoffPoint>> {
    if max_tables == 0 {
        return Err(LshError::InvalidParameter(
            "an index needs at least one table",
        ));
    }
    let mut measured = BTreeMap::new();
    let mut measure_tables = |tables: usize| -> Result<TradeoffPoint> {
        let point = measure(
            train,
            test,
            exact,
            k,
            &LSHIndexOptions {
                tables,
                ..options.clone()
            },
        )?;
        measured.insert(tables, point);
        Ok(point)
    };

    if measure_tables(max_tables)?.recall < target {
        info!(max_tables, target, "Target recall is out of reach.");
        return Ok(None);
    }
    let (mut low, mut high) = (1, max_tables);
    while low < high {
        let middle = low + (high - low) / 2;
        match measure_tables(middle)?.recall >= target {
            true => high = middle,
            false => low = middle + 1,
        }
    }
    let found = measured.get(&low).copied();
    info!(tables = low, target, "Found minimum number of tables.");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ids: &[VectorId]) -> QueryResult {
        QueryResult {
            neighbours: ids
                .iter()
                .map(|id| Neighbour {
                    id: *id,
                    similarity: 1.0,
                })
                .collect(),
            evaluations: ids.len(),
        }
    }

    #[test]
    fn recall_counts_shared_ids() {
        let exact = vec![result(&[1, 2, 3, 4]), result(&[5, 6, 7, 8])];
        let approximate = vec![result(&[4, 3, 9, 10]), result(&[5, 6, 7, 8])];
        assert_eq!(recall(&approximate, &exact, 4), 0.75);
        assert_eq!(recall(&approximate, &exact, 0), 0.0);
    }

    #[test]
    fn missing_and_empty_results_recover_nothing() {
        let exact = vec![result(&[1, 2]), result(&[3, 4])];
        assert_eq!(recall(&[result(&[1, 2])], &exact, 2), 0.5);
        assert_eq!(recall(&[result(&[]), result(&[])], &exact, 2), 0.0);
    }

    #[test]
    fn brute_force_ranks_by_similarity() {
        let train = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![-1.0, 0.0],
        ];
        let exact =
            find_neighbours_brute(&train, &[vec![1.0, 0.1]], 3, SimilarityKind::Cosine).unwrap();
        assert_eq!(exact[0].ids(), vec![0, 2, 1]);
        assert_eq!(exact[0].evaluations, 4);
    }

    #[test]
    fn brute_force_checks_dimensions() {
        let train = vec![vec![1.0, 0.0]];
        assert_eq!(
            find_neighbours_brute(&train, &[vec![1.0]], 1, SimilarityKind::Cosine).unwrap_err(),
            LshError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn candidates_are_measured_without_scoring() {
        let train = vec![
            vec![1.0, 0.0, 0.5],
            vec![0.0, 1.0, -0.5],
            vec![1.0, 1.0, 0.0],
            vec![-1.0, 0.2, 0.3],
        ];
        let options = LSHIndexOptions {
            tables: 2,
            functions: 1,
            family: crate::HashFamily::Cosine,
            seed: 5,
        };
        let exact = find_neighbours_brute(&train, &train, 0, SimilarityKind::Cosine).unwrap();
        let point = measure(&train, &train, &exact, 0, &options).unwrap();
        let index = LSHIndex::build(train.clone(), &options).unwrap();
        assert_eq!(point.evaluations, 0);
        assert_eq!(point.mean_candidates, index.mean_candidates(&train).unwrap());
        assert!(point.mean_candidates >= 1.0);
    }
}
