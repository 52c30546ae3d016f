use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cnpj_pipeline::pipeline::{run_all, run_graph, run_ingest, run_mirror, run_store, run_transform};
use cnpj_pipeline::{EntityKind, PipelineConfig, StatsFacade, Store, transform_entity, verify_all};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "cnpj-pipeline")]
#[command(about = "Build Parquet, SQLite and DuckDB stores from the business registry dumps")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "CNPJ_CONFIG")]
    config: Option<PathBuf>,

    /// Root of every working directory and store
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in order
    Run,
    /// Download and extract the raw files
    Fetch,
    /// Normalize raw files into Parquet
    Transform {
        /// Only this entity (its reference set must already exist)
        #[arg(value_parser = parse_entity)]
        entity: Option<EntityKind>,
    },
    /// Build the indexed SQLite store
    Load {
        /// Replace an existing store
        #[arg(long)]
        rebuild: bool,
    },
    /// Rebuild the DuckDB mirror
    Mirror,
    /// Export the partner graph as bulk-import CSV files
    Graph,
    /// Print aggregate statistics
    Stats,
    /// Search names by leading words
    Search {
        #[arg(value_parser = parse_entity)]
        entity: EntityKind,
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Print a company with its establishments and partners
    Company { root_id: String },
    /// Trace random rows back to the raw files and into the store
    Verify {
        #[arg(short, long, default_value_t = 100)]
        samples: usize,
        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn parse_entity(s: &str) -> Result<EntityKind, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;
    if let Some(dir) = &cli.data_dir {
        config.set_data_dir(dir);
    }
    if cli.quiet {
        config.show_progress = false;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run => print_json(&run_all(&config).await?)?,
        Commands::Fetch => print_json(&run_ingest(&config).await?)?,
        Commands::Transform { entity: None } => print_json(&run_transform(&config).await?)?,
        Commands::Transform { entity: Some(kind) } => {
            print_json(&transform_entity(&config, kind)?)?;
        }
        Commands::Load { rebuild } => {
            config.rebuild_store |= rebuild;
            print_json(&run_store(&config).await?)?;
        }
        Commands::Mirror => print_json(&run_mirror(&config).await?)?,
        Commands::Graph => print_json(&run_graph(&config).await?)?,
        Commands::Stats => {
            let stats = StatsFacade::from_config(&config).statistics()?;
            print_json(&*stats)?;
        }
        Commands::Search { entity, query, limit } => {
            let store = Store::open(&config.sqlite_path)?;
            print_json(&store.search_names(entity, &query, limit)?)?;
        }
        Commands::Company { root_id } => {
            let store = Store::open(&config.sqlite_path)?;
            let Some(company) = store.find_company(&root_id)? else {
                bail!("no company with root identifier {root_id}");
            };
            print_json(&serde_json::json!({
                "company": company,
                "business": store.find_branches(&root_id)?,
                "partners": store.find_partners(&root_id)?,
            }))?;
        }
        Commands::Verify { samples, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let reports = verify_all(&config, samples, &mut rng)?;
            print_json(&reports)?;
            if reports.iter().any(|r| !r.is_consistent()) {
                bail!("sampled rows failed verification");
            }
        }
    }
    Ok(())
}
