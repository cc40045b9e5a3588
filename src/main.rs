use anyhow::{Context, Result};
use movie_catalog::config::PipelineConfig;
use movie_catalog::logging::init_tracing;
use movie_catalog::pipeline;
use movie_catalog::util::env::preflight_check;

fn main() -> Result<()> {
    init_tracing("info")?;
    preflight_check(
        "movie-catalog",
        &[],
        &[
            "CATALOG_RAW_DIR",
            "CATALOG_PROCESSED_DIR",
            "CATALOG_FRESH",
            "CATALOG_PARALLEL_MEDIATION",
            "CATALOG_THREADS",
        ],
    )?;

    let cfg = PipelineConfig::from_env();
    let summary = pipeline::run(&cfg).context("prep pipeline failed")?;
    println!(
        "[prep] {} mediated records -> {} movies ({} multi-source); ratings kept {} / dropped {}",
        summary.mediated_records,
        summary.integrated_movies,
        summary.multi_source_movies,
        summary.ratings.kept,
        summary.ratings.dropped
    );
    println!("[prep] artifacts ready in {}", cfg.processed_dir.display());
    Ok(())
}
