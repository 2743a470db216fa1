use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use probust::coefficients::RawCount;
use probust::{BatchReport, PipelineConfig, ProblemDefinition, RobustBatch};

#[derive(Parser)]
#[command(name = "probust")]
#[command(about = "Scenario reduction and feasibility estimation for interval-uncertain linear programs")]
#[command(version)]
struct Cli {
    /// Problem definition: a JSON file path or an http(s) URL
    #[arg(short, long)]
    problem: String,

    /// Pipeline configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of training scenarios, overriding the problem definition
    #[arg(short, long)]
    scenarios: Option<usize>,

    /// Number of fresh scenarios for the feasibility check
    #[arg(long)]
    fresh_scenarios: Option<usize>,

    /// Cluster count K used for every division
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Seed for the scenario sampler
    #[arg(long)]
    seed: Option<u64>,

    /// Run every stage on the calling thread
    #[arg(long)]
    sequential: bool,

    /// Write the JSON report here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(fresh) = cli.fresh_scenarios {
        config.fresh_scenarios = fresh;
    }
    if let Some(clusters) = cli.clusters {
        config.clusters = clusters;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.sequential {
        config.parallel = false;
    }

    let mut definition = ProblemDefinition::load(&cli.problem)
        .with_context(|| format!("loading problem {}", cli.problem))?;
    if let Some(scenarios) = cli.scenarios {
        let scenarios = i64::try_from(scenarios).context("scenario count out of range")?;
        definition.scenarios = Some(RawCount::Integer(scenarios));
    }

    let mut batch = RobustBatch::new(&definition, config);
    batch.run();
    let report = BatchReport::from_batch(&batch);

    for entry in &report.status {
        println!("{entry}");
    }
    println!();
    println!("Scenarios: {}", report.scenarios);
    println!("Records:   {}", report.records.len());
    if let Some(tree) = &report.tree {
        println!(
            "Tree:      {} nodes, {} leaves, depth {}",
            tree.nodes.len(),
            tree.leaves.len(),
            tree.depth
        );
    }
    if !report.pareto_frontier.is_empty() {
        println!();
        println!("{:>8}  {:>14}  {:>11}", "record", "objective", "φ(x)");
        for id in &report.pareto_frontier {
            if let Some(record) = batch.results().get(*id) {
                println!(
                    "{:>8}  {:>14.4}  {:>11.4}",
                    id.0,
                    record.objective_value().unwrap_or(f64::NAN),
                    record.feasibility_probability.unwrap_or(f64::NAN)
                );
            }
        }
    }

    if let Some(path) = &cli.output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }

    if !report.succeeded {
        std::process::exit(1);
    }
    Ok(())
}
