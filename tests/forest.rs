//! End-to-end behaviour of LSH forests over generated clustered datasets.

use lsh_forest::dataset::{generate_samples, SampleOptions, Samples};
use lsh_forest::evaluation::{find_neighbours_brute, measure, minimum_tables_for_recall, recall};
use lsh_forest::{HashFamily, LSHIndex, LSHIndexOptions, Signature};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::HashSet;

fn samples(cluster_std: f32, binary: bool) -> Samples {
    let options = SampleOptions {
        samples: 1000,
        test_samples: 100,
        features: 100,
        clusters: 10,
        cluster_std,
        binary,
    };
    generate_samples(&options, &mut StdRng::seed_from_u64(1234)).unwrap()
}

fn cosine(tables: usize, functions: usize) -> LSHIndexOptions {
    LSHIndexOptions {
        tables,
        functions,
        family: HashFamily::Cosine,
        seed: 7,
    }
}

#[test]
fn single_function_splits_dataset_in_two() {
    let data = samples(1.0, false);
    let index = LSHIndex::build(data.train, &cosine(1, 1)).unwrap();
    let table = index.table(0).unwrap();

    let zero = table.bucket(&Signature::from(vec![0]));
    let one = table.bucket(&Signature::from(vec![1]));
    assert_eq!(zero.len() + one.len(), 1000);
    assert!(table.bucket_count() <= 2);
    for (signature, _) in table.buckets() {
        assert!(["0", "1"].contains(&signature.to_string().as_str()));
    }

    let ids: HashSet<usize> = zero.iter().chain(one).copied().collect();
    assert_eq!(ids.len(), 1000);
}

#[test]
fn three_functions_give_at_most_eight_buckets() {
    let data = samples(1.0, false);
    let index = LSHIndex::build(data.train, &cosine(1, 3)).unwrap();
    let table = index.table(0).unwrap();

    assert!(table.bucket_count() <= 8);
    for (signature, _) in table.buckets() {
        assert_eq!(signature.len(), 3);
        assert!(signature.codes().iter().all(|code| *code <= 1));
    }
    for query in &data.test {
        assert!(table.candidates(query).unwrap().len() <= table.largest_bucket_len());
    }
}

#[test]
fn more_tables_strictly_improve_recall() {
    let data = samples(1.0, false);
    let k = 100;
    let exact =
        find_neighbours_brute(&data.train, &data.test, k, HashFamily::Cosine.similarity()).unwrap();
    let few = measure(&data.train, &data.test, &exact, k, &cosine(3, 3)).unwrap();
    let many = measure(&data.train, &data.test, &exact, k, &cosine(13, 3)).unwrap();
    assert!(many.recall > few.recall, "{many:?} vs {few:?}");
    assert!(many.evaluations >= few.evaluations);
}

#[test]
fn recall_never_falls_as_tables_are_added() {
    let data = samples(5.0, false);
    let k = 10;
    let exact =
        find_neighbours_brute(&data.train, &data.test, k, HashFamily::Cosine.similarity()).unwrap();
    let recalls: Vec<f64> = [1, 2, 4, 8, 16]
        .into_iter()
        .map(|tables| {
            measure(&data.train, &data.test, &exact, k, &cosine(tables, 4))
                .unwrap()
                .recall
        })
        .collect();
    assert!(recalls.windows(2).all(|pair| pair[0] <= pair[1]), "{recalls:?}");
}

#[test]
fn fewer_tables_retrieve_a_subset_of_candidates() {
    let data = samples(5.0, false);
    let small = LSHIndex::build(data.train.clone(), &cosine(3, 3)).unwrap();
    let large = LSHIndex::build(data.train, &cosine(9, 3)).unwrap();
    for query in &data.test {
        let few = small.candidates(query).unwrap();
        let many = large.candidates(query).unwrap();
        assert!(few.is_subset(&many));
    }
}

#[test]
fn more_functions_never_grow_candidate_sets() {
    let data = samples(5.0, false);
    let means: Vec<f64> = (1..=6)
        .map(|functions| {
            LSHIndex::build(data.train.clone(), &cosine(4, functions))
                .unwrap()
                .mean_candidates(&data.test)
                .unwrap()
        })
        .collect();
    assert!(means.windows(2).all(|pair| pair[0] >= pair[1]), "{means:?}");
}

#[test]
fn table_candidates_are_within_the_union() {
    let data = samples(1.0, false);
    let index = LSHIndex::build(data.train, &cosine(5, 4)).unwrap();
    for query in &data.test {
        let union = index.candidates(query).unwrap();
        for table in index.tables() {
            assert!(table
                .candidates(query)
                .unwrap()
                .iter()
                .all(|id| union.contains(id)));
        }
    }
}

#[test]
fn results_are_valid_and_bounded() {
    let data = samples(1.0, false);
    let index = LSHIndex::build(data.train, &cosine(6, 2)).unwrap();
    let results = index.find_neighbours(&data.test, 25).unwrap();
    assert_eq!(results.len(), data.test.len());
    for result in &results {
        assert!(result.len() <= 25);
        assert!(result.evaluations <= index.len());
        assert!(result.neighbours.iter().all(|n| n.id < index.len()));
        assert!(result
            .neighbours
            .windows(2)
            .all(|pair| pair[0].similarity >= pair[1].similarity));
    }
    let total: usize = results.iter().map(|result| result.evaluations).sum();
    assert_eq!(index.similarity_evaluation_count(), total as u64);
}

#[test]
fn signatures_are_reproducible() {
    let data = samples(1.0, false);
    let first = LSHIndex::build(data.train.clone(), &cosine(4, 5)).unwrap();
    let second = LSHIndex::build(data.train.clone(), &cosine(4, 5)).unwrap();
    for table in 0..4 {
        assert_eq!(
            first.table(table).unwrap().functions(),
            second.table(table).unwrap().functions()
        );
        for vector in data.train.iter().chain(&data.test).take(200) {
            let signature = first.signature(vector, table).unwrap();
            assert_eq!(signature, first.signature(vector, table).unwrap());
            assert_eq!(signature, second.signature(vector, table).unwrap());
        }
    }
}

#[test]
fn hashes_compose_into_signatures() {
    let data = samples(1.0, false);
    let index = LSHIndex::build(data.train.clone(), &cosine(3, 6)).unwrap();
    for vector in data.test.iter().take(20) {
        for table in 0..3 {
            let codes: Vec<_> = (0..6)
                .map(|function| index.hash(vector, table, function).unwrap())
                .collect();
            assert_eq!(index.signature(vector, table).unwrap().codes(), codes);
        }
    }
}

#[test]
fn hamming_and_jaccard_forests_find_neighbours() {
    for (family, binary) in [(HashFamily::Hamming, false), (HashFamily::Jaccard, true)] {
        let data = samples(5.0, binary);
        let k = 10;
        let exact =
            find_neighbours_brute(&data.train, &data.test, k, family.similarity()).unwrap();
        let index = LSHIndex::build(
            data.train,
            &LSHIndexOptions {
                tables: 10,
                functions: 4,
                family,
                seed: 3,
            },
        )
        .unwrap();
        let results = index.find_neighbours(&data.test, k).unwrap();
        let measured = recall(&results, &exact, k);
        assert!(measured > 0.3, "{family:?} recall {measured}");
        assert!(index.similarity_evaluation_count() < (index.len() * data.test.len()) as u64);
    }
}

#[test]
fn minimum_tables_reaches_target() {
    let data = samples(5.0, false);
    let k = 10;
    let exact =
        find_neighbours_brute(&data.train, &data.test, k, HashFamily::Cosine.similarity()).unwrap();
    let options = cosine(1, 3);
    let found = minimum_tables_for_recall(&data.train, &data.test, &exact, k, &options, 0.9, 32)
        .unwrap()
        .expect("32 tables of 3 functions reach 0.9 recall");
    assert!(found.recall >= 0.9);
    if found.tables > 1 {
        let fewer = measure(&data.train, &data.test, &exact, k, &cosine(found.tables - 1, 3))
            .unwrap();
        assert!(fewer.recall < 0.9);
    }

    assert!(
        minimum_tables_for_recall(&data.train, &data.test, &exact, k, &options, 1.01, 4)
            .unwrap()
            .is_none()
    );
}
