use super::{
    core::{HashCode, HashFamily},
    table::{dataset_dimensions, LSHTable, Signature},
};
use crate::{Embedding, EmbeddingPrecision, LshError, Result, VectorId};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::BTreeSet,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
    time::Instant,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Creation options for an [`LSHIndex`].
pub struct LSHIndexOptions {
    /// The number of independently drawn tables; as the number of tables grows, more candidates are retrieved per query, increasing recall but also the number of similarity evaluations.
    pub tables: usize,
    /// The number of hash functions per table; as the number of functions grows, buckets become smaller, decreasing both recall and the number of similarity evaluations.
    pub functions: usize,
    /// The family the hash functions are drawn from.
    pub family: HashFamily,
    /// The seed for the index's source of randomness.
    pub seed: u64,
}

impl Default for LSHIndexOptions {
    fn default() -> Self {
        Self {
            tables: 10,
            functions: 3,
            family: HashFamily::default(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A vector retrieved for a query.
pub struct Neighbour {
    /// The position of the vector in the indexed dataset.
    pub id: VectorId,
    /// The exact similarity between the vector and the query.
    pub similarity: f32,
}

impl Neighbour {
    /// Order neighbours from most to least similar, breaking ties by ascending ID.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// The approximate nearest neighbours of one query.
pub struct QueryResult {
    /// At most `k` neighbours, from most to least similar.
    pub neighbours: Vec<Neighbour>,
    /// The number of exact similarity evaluations performed to answer the query.
    pub evaluations: usize,
}

impl QueryResult {
    /// The IDs of the neighbours, from most to least similar.
    pub fn ids(&self) -> Vec<VectorId> {
        self.neighbours.iter().map(|neighbour| neighbour.id).collect()
    }

    /// Whether no neighbours were found.
    ///
    /// This is a normal outcome when the query shares a bucket with no vector in any table.
    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }

    /// The number of neighbours found.
    pub fn len(&self) -> usize {
        self.neighbours.len()
    }
}

/// An implementation of [locality-sensitive hashing (LSH)](https://en.wikipedia.org/wiki/Locality-sensitive_hashing) as a forest of independently drawn hash tables.
///
/// The index is built once from a static dataset and is read-only afterwards, so it can be queried from many threads at once.
/// Queries retrieve the union of their buckets across every table, then rank those candidates by exact similarity; the index counts every similarity evaluation it performs.
#[derive(Debug)]
pub struct LSHIndex {
    dataset: Vec<Embedding>,
    dimensions: usize,
    family: HashFamily,
    tables: Vec<LSHTable>,
    evaluations: AtomicU64,
}

impl LSHIndex {
    /// Construct a new [LSHIndex].
    ///
    /// # Arguments
    ///
    /// * `dataset` - The vectors to index; a vector's ID is its position in the dataset.
    ///
    /// * `options` - The creation options for the index.
    ///
    /// # Returns
    ///
    /// An [LSHIndex].
    pub fn build(dataset: Vec<Embedding>, options: &LSHIndexOptions) -> Result<Self> {
        Self::build_with_rng(
            dataset,
            options.tables,
            options.functions,
            options.family,
            &mut StdRng::seed_from_u64(options.seed),
        )
    }

    /// Construct a new [LSHIndex] from an explicit source of randomness.
    ///
    /// Each table is seeded by its own draw from `rng`, in table order, so the first tables of an index are the same whatever the total number of tables; tables are then built in parallel.
    ///
    /// # Arguments
    ///
    /// * `dataset` - The vectors to index; a vector's ID is its position in the dataset.
    ///
    /// * `tables` - The number of tables.
    ///
    /// * `functions` - The number of hash functions per table.
    ///
    /// * `family` - The family the hash functions are drawn from.
    ///
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    ///
    /// An [LSHIndex].
    pub fn build_with_rng<R: Rng>(
        dataset: Vec<Embedding>,
        tables: usize,
        functions: usize,
        family: HashFamily,
        rng: &mut R,
    ) -> Result<Self> {
        if tables == 0 {
            return Err(LshError::InvalidParameter(
                "an index needs at least one table",
            ));
        }
        if functions == 0 {
            return Err(LshError::InvalidParameter(
                "a table needs at least one hash function",
            ));
        }
        let dimensions = dataset_dimensions(&dataset)?;
        let started = Instant::now();
        info!(
            vectors = dataset.len(),
            dimensions,
            tables,
            functions,
            ?family,
            "Building LSH index."
        );

        let seeds: Vec<u64> = (0..tables).map(|_| rng.random()).collect();
        let tables = seeds
            .into_par_iter()
            .map(|seed| {
                LSHTable::build(&dataset, functions, family, &mut StdRng::seed_from_u64(seed))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            buckets = tables.iter().map(LSHTable::bucket_count).sum::<usize>(),
            elapsed = ?started.elapsed(),
            "Built LSH index."
        );
        Ok(Self {
            dataset,
            dimensions,
            family,
            tables,
            evaluations: AtomicU64::new(0),
        })
    }

    /// The indexed vectors, in ID order.
    pub fn dataset(&self) -> &[Embedding] {
        &self.dataset
    }

    /// The number of indexed vectors.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the index holds no vectors; an index is never built without vectors.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// The dimensionality of the indexed vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The family the index's hash functions are drawn from.
    pub fn family(&self) -> HashFamily {
        self.family
    }

    /// The tables of the index.
    pub fn tables(&self) -> &[LSHTable] {
        &self.tables
    }

    /// Get one of the index's tables.
    ///
    /// # Arguments
    ///
    /// * `table` - The position of the table within the index.
    ///
    /// # Returns
    ///
    /// The table, or an error if the index has no such table.
    pub fn table(&self, table: usize) -> Result<&LSHTable> {
        self.tables.get(table).ok_or(LshError::TableOutOfRange {
            table,
            tables: self.tables.len(),
        })
    }

    /// Compute the key of the bucket a vector belongs to in one table.
    pub fn signature(&self, vector: &[EmbeddingPrecision], table: usize) -> Result<Signature> {
        self.table(table)?.signature(vector)
    }

    /// Hash a vector with one function of one table.
    pub fn hash(
        &self,
        vector: &[EmbeddingPrecision],
        table: usize,
        function: usize,
    ) -> Result<HashCode> {
        self.table(table)?.hash(vector, function)
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

    /// Collect the vectors sharing a bucket with a query in any table.
    ///
    /// # Arguments
    ///
    /// * `query` - The query vector.
    ///
    /// # Returns
    ///
    /// The union of the query's candidates across every table.
    pub fn candidates(&self, query: &[EmbeddingPrecision]) -> Result<BTreeSet<VectorId>> {
        self.check_dimensions(query)?;
        let mut candidates = BTreeSet::new();
        for table in &self.tables {
            candidates.extend(table.candidates(query)?.iter().copied());
        }
        Ok(candidates)
    }

    /// The mean number of candidates retrieved per query.
    pub fn mean_candidates(&self, queries: &[Embedding]) -> Result<f64> {
        if queries.is_empty() {
            return Ok(0.0);
        }
        let total = queries
            .par_iter()
            .map(|query| self.candidates(query).map(|candidates| candidates.len()))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .sum::<usize>();
        Ok(total as f64 / queries.len() as f64)
    }

    /// Perform an approximate *k* nearest neighbours search for one query.
    ///
    /// Every candidate is scored exactly once. If no table has a bucket for the query, the result is empty; the index never falls back to a brute-force search.
    ///
    /// # Arguments
    ///
    /// * `query` - The query vector.
    ///
    /// * `k` - The number of approximate neighbours to return.
    ///
    /// # Returns
    ///
    /// Up to `k` neighbours, from most to least similar, ties broken by ascending ID.
    pub fn find_neighbours_for(
        &self,
        query: &[EmbeddingPrecision],
        k: usize,
    ) -> Result<QueryResult> {
        let result = self.rank_candidates(query, k)?;
        self.evaluations
            .fetch_add(result.evaluations as u64, AtomicOrdering::Relaxed);
        Ok(result)
    }

    /// Score and rank a query's candidates without touching the evaluation count.
    fn rank_candidates(&self, query: &[EmbeddingPrecision], k: usize) -> Result<QueryResult> {
        if k == 0 {
            self.check_dimensions(query)?;
            return Ok(QueryResult::default());
        }
        let similarity = self.family.similarity();
        let mut neighbours: Vec<Neighbour> = self
            .candidates(query)?
            .into_iter()
            .map(|id| Neighbour {
                id,
                similarity: similarity.similarity(query, &self.dataset[id]),
            })
            .collect();
        let evaluations = neighbours.len();
        neighbours.sort_unstable_by(Neighbour::rank);
        neighbours.truncate(k);
        Ok(QueryResult {
            neighbours,
            evaluations,
        })
    }

    /// Perform approximate *k* nearest neighbours searches for many queries in parallel.
    ///
    /// # Arguments
    ///
    /// * `queries` - The query vectors; a query's ID is its position in this list.
    ///
    /// * `k` - The number of approximate neighbours to return per query.
    ///
    /// # Returns
    ///
    /// The result of each query, in query ID order. If any query fails, the evaluation count is left unchanged.
    pub fn find_neighbours(&self, queries: &[Embedding], k: usize) -> Result<Vec<QueryResult>> {
        let results = queries
            .par_iter()
            .map(|query| self.rank_candidates(query, k))
            .collect::<Result<Vec<_>>>()?;
        let evaluations = results.iter().map(|result| result.evaluations).sum::<usize>();
        self.evaluations
            .fetch_add(evaluations as u64, AtomicOrdering::Relaxed);
        debug!(
            queries = queries.len(),
            k,
            evaluations,
            empty = results.iter().filter(|result| result.is_empty()).count(),
            "Answered queries."
        );
        Ok(results)
    }

    /// The number of exact similarity evaluations this index has performed since it was built or last reset.
    pub fn similarity_evaluation_count(&self) -> u64 {
        self.evaluations.load(AtomicOrdering::Relaxed)
    }

    /// Reset the similarity evaluation count to zero.
    pub fn reset_similarity_evaluation_count(&self) {
        self.evaluations.store(0, AtomicOrdering::Relaxed);
    }
}
