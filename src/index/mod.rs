/// Locality-sensitive hash families and the functions drawn from them.
pub mod core;
/// A forest of locality-sensitive hash tables answering approximate nearest neighbour queries.
///
/// Follows the classic multi-table construction of [Indyk & Motwani](https://doi.org/10.1145/276698.276876): each table concatenates several hash codes into a bucket key, and a query's candidates are the union of its buckets across tables.
pub mod lsh;
/// A single table partitioning a dataset into buckets.
pub mod table;
