use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use lsh_forest::dataset::{generate_samples, SampleOptions, Samples};
use lsh_forest::evaluation::{
    find_neighbours_brute, measure, minimum_tables_for_recall, recall, TradeoffPoint,
};
use lsh_forest::{HashFamily, LSHIndex, LSHIndexOptions, QueryResult};
use pretty_duration::pretty_duration;
use rand::{rngs::StdRng, SeedableRng};
use std::io::Write;
use std::io::{stdout, BufWriter};
use ticky::Stopwatch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help(true))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SampleArgs {
    #[arg(long, default_value_t = 1000, help = "Number of vectors to index.")]
    samples: usize,
    #[arg(long, default_value_t = 100, help = "Number of query vectors.")]
    queries: usize,
    #[arg(long, default_value_t = 100, help = "Dimensionality of the vectors.")]
    features: usize,
    #[arg(long, default_value_t = 10, help = "Number of clusters.")]
    clusters: usize,
    #[arg(long, default_value_t = 1.0, help = "Spread of each cluster.")]
    cluster_std: f32,
    #[arg(long, default_value_t = 0, help = "Seed for generating the dataset.")]
    data_seed: u64,
}

#[derive(Args)]
struct IndexArgs {
    #[arg(short, long, default_value_t = 3, help = "Hash functions per table.")]
    functions: usize,
    #[arg(long, value_enum, default_value_t = HashFamily::Cosine)]
    family: HashFamily,
    #[arg(long, default_value_t = 0, help = "Seed for drawing hash functions.")]
    seed: u64,
    #[arg(short, default_value_t = 10, help = "Neighbours to find per query.")]
    k: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Knob {
    Tables,
    Functions,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build an index over a generated dataset and measure its recall and cost.")]
    Query {
        #[command(flatten)]
        samples: SampleArgs,
        #[command(flatten)]
        index: IndexArgs,
        #[arg(short, long, default_value_t = 10, help = "Number of tables.")]
        tables: usize,
    },
    #[command(
        about = "Measure recall and cost while varying the number of tables or functions.",
        arg_required_else_help(true)
    )]
    Sweep {
        #[command(flatten)]
        samples: SampleArgs,
        #[command(flatten)]
        index: IndexArgs,
        #[arg(short, long, default_value_t = 10, help = "Number of tables.")]
        tables: usize,
        #[arg(long, value_enum)]
        vary: Knob,
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
    },
    #[command(about = "Find the fewest tables reaching a target recall.")]
    MinTables {
        #[command(flatten)]
        samples: SampleArgs,
        #[command(flatten)]
        index: IndexArgs,
        #[arg(long, default_value_t = 0.9)]
        target: f64,
        #[arg(long, default_value_t = 100)]
        max_tables: usize,
    },
}

/// Generate a dataset and its exact neighbours.
fn prepare(
    samples: &SampleArgs,
    index: &IndexArgs,
) -> anyhow::Result<(Samples, Vec<QueryResult>)> {
    let options = SampleOptions {
        samples: samples.samples,
        test_samples: samples.queries,
        features: samples.features,
        clusters: samples.clusters,
        cluster_std: samples.cluster_std,
        binary: index.family == HashFamily::Jaccard,
    };
    let data = generate_samples(&options, &mut StdRng::seed_from_u64(samples.data_seed))?;
    let exact = find_neighbours_brute(
        &data.train,
        &data.test,
        index.k,
        index.family.similarity(),
    )?;
    Ok((data, exact))
}

fn write_point<W: Write>(buffer: &mut W, point: &TradeoffPoint) -> std::io::Result<()> {
    writeln!(
        buffer,
        "{}\t{}\t{:.4}\t{}\t{:.1}",
        point.tables, point.functions, point.recall, point.evaluations, point.mean_candidates
    )
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lsh_forest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut sw = Stopwatch::start_new();
    let mut buffer = BufWriter::new(stdout().lock());
    match cli.command {
        Some(Commands::Query {
            samples,
            index,
            tables,
        }) => {
            let (data, exact) = prepare(&samples, &index)?;
            let options = LSHIndexOptions {
                tables,
                functions: index.functions,
                family: index.family,
                seed: index.seed,
            };
            let lsh = LSHIndex::build(data.train, &options)?;
            let results = lsh.find_neighbours(&data.test, index.k)?;
            sw.stop();
            let evaluations = lsh.similarity_evaluation_count();
            let brute_force = (lsh.len() * data.test.len()) as u64;
            writeln!(
                buffer,
                "Queried {} vector(s) against {} in {}.",
                data.test.len(),
                lsh.len(),
                pretty_duration(&sw.elapsed(), None)
            )?;
            writeln!(
                buffer,
                "Recall@{}:\t{:.4}",
                index.k,
                recall(&results, &exact, index.k)
            )?;
            writeln!(
                buffer,
                "Similarity evaluations:\t{} ({:.1}% of brute force)",
                evaluations,
                100.0 * evaluations as f64 / brute_force.max(1) as f64
            )?;
            writeln!(
                buffer,
                "Queries without candidates:\t{}",
                results.iter().filter(|result| result.is_empty()).count()
            )?;
        }
        Some(Commands::Sweep {
            samples,
            index,
            tables,
            vary,
            from,
            to,
        }) => {
            let (data, exact) = prepare(&samples, &index)?;
            let steps = (from..=to).count();
            let progress_bar = ProgressBar::with_draw_target(
                Some(steps.try_into()?),
                ProgressDrawTarget::stderr_with_hz(10),
            )
            .with_style(ProgressStyle::default_bar())
            .with_message(format!("Measuring {} configuration(s).", steps));
            let mut points = Vec::with_capacity(steps);
            for value in from..=to {
                let (tables, functions) = match vary {
                    Knob::Tables => (value, index.functions),
                    Knob::Functions => (tables, value),
                };
                let options = LSHIndexOptions {
                    tables,
                    functions,
                    family: index.family,
                    seed: index.seed,
                };
                points.push(measure(
                    &data.train,
                    &data.test,
                    &exact,
                    index.k,
                    &options,
                )?);
                progress_bar.inc(1);
            }
            progress_bar.finish_and_clear();
            sw.stop();
            writeln!(buffer, "tables\tfunctions\trecall\tevaluations\tcandidates")?;
            for point in &points {
                write_point(&mut buffer, point)?;
            }
            writeln!(
                buffer,
                "Measured {} configuration(s) in {}.",
                steps,
                pretty_duration(&sw.elapsed(), None)
            )?;
        }
        Some(Commands::MinTables {
            samples,
            index,
            target,
            max_tables,
        }) => {
            let (data, exact) = prepare(&samples, &index)?;
            let options = LSHIndexOptions {
                tables: max_tables,
                functions: index.functions,
                family: index.family,
                seed: index.seed,
            };
            let found = minimum_tables_for_recall(
                &data.train,
                &data.test,
                &exact,
                index.k,
                &options,
                target,
                max_tables,
            )?;
            sw.stop();
            match found {
                Some(point) => {
                    writeln!(buffer, "tables\tfunctions\trecall\tevaluations\tcandidates")?;
                    write_point(&mut buffer, &point)?;
                }
                None => writeln!(
                    buffer,
                    "No index with up to {} table(s) reaches a recall of {}.",
                    max_tables, target
                )?,
            }
            writeln!(
                buffer,
                "Searched in {}.",
                pretty_duration(&sw.elapsed(), None)
            )?;
        }
        _ => unreachable!(),
    }
    buffer.flush()?;
    Ok(())
}
