use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use movie_catalog::cli::resolve_config;
use movie_catalog::config::PipelineConfig;
use movie_catalog::logging::init_tracing;
use movie_catalog::pipeline;
use movie_catalog::util::env;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "catalog", version, about = "Movie catalog integration CLI")]
struct Cli {
    /// Directory holding the raw source CSVs
    #[arg(long, global = true, env = "CATALOG_RAW_DIR")]
    raw_dir: Option<PathBuf>,
    /// Directory for loader caches and pipeline artifacts
    #[arg(long, global = true, env = "CATALOG_PROCESSED_DIR")]
    processed_dir: Option<PathBuf>,
    /// Map sources one after another instead of on the rayon pool
    #[arg(long, global = true, default_value_t = false)]
    sequential: bool,
    /// Worker threads for parallel mediation (0 = rayon default)
    #[arg(long, global = true, env = "CATALOG_THREADS")]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run every stage and write pipeline_summary.json
    Prep {
        /// Remove artifacts and loader caches before running
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },
    /// Build (or load) the mediated table
    Mediate,
    /// Build (or load) the integrated movies table
    Integrate,
    /// Map MovieLens ratings onto integrated movie ids
    RemapRatings,
    /// Delete artifacts and loader caches
    Clean,
    /// Print catalog size, provenance and rating coverage
    Stats {
        /// Emit JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve free-text titles against the catalog
    Lookup {
        #[arg(required = true)]
        titles: Vec<String>,
    },
}

fn main() -> Result<()> {
    env::init_env();
    init_tracing("info")?;

    if std::env::var_os("CATALOG_LIST_SUBCOMMANDS").is_some() {
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|cmd| cmd.get_name().to_string())
            .collect();
        eprintln!("available subcommands: {:?}", names);
        return Ok(());
    }

    let cli = Cli::parse();
    let mut cfg = resolve_config(cli.raw_dir, cli.processed_dir.clone());
    if cli.sequential {
        cfg.parallel_mediation = false;
    }
    if let Some(threads) = cli.threads {
        cfg.threads = threads;
    }

    match cli.command {
        Commands::Prep { fresh } => {
            cfg.fresh |= fresh;
            let summary = pipeline::run(&cfg).context("prep pipeline failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Mediate => {
            let mediated = pipeline::mediated_stage(&cfg).context("mediation failed")?;
            info!(records = mediated.records.len(), path = %cfg.mediated_path().display(), "mediate: done");
        }
        Commands::Integrate => {
            let movies = integrate(&cfg)?;
            info!(movies = movies.len(), path = %cfg.integrated_movies_path().display(), "integrate: done");
        }
        Commands::RemapRatings => {
            let movies = integrate(&cfg)?;
            let ratings = pipeline::ratings_stage(&cfg, &movies).context("rating remap failed")?;
            info!(ratings = ratings.table.len(), dropped = ?ratings.dropped, path = %cfg.integrated_ratings_path().display(), "remap-ratings: done");
        }
        Commands::Clean => {
            let removed = pipeline::clean(&cfg)?;
            println!("removed {removed} file(s) from {}", cfg.processed_dir.display());
        }
        Commands::Stats { json } => {
            use movie_catalog::cli::catalog_stats::{run, CatalogStatsConfig};
            run(CatalogStatsConfig {
                processed_dir: cli.processed_dir,
                json,
            })?;
        }
        Commands::Lookup { titles } => {
            use movie_catalog::cli::lookup::{run, LookupConfig};
            run(LookupConfig {
                processed_dir: cli.processed_dir,
                titles,
            })?;
        }
    }
    Ok(())
}

fn integrate(cfg: &PipelineConfig) -> Result<Vec<movie_catalog::model::IntegratedMovie>> {
    let mediated = pipeline::mediated_stage(cfg).context("mediation failed")?;
    pipeline::integrated_stage(cfg, &mediated.records).context("integration failed")
}
