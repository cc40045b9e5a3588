pub mod catalog_stats;
pub mod lookup;

use std::path::PathBuf;

use crate::config::PipelineConfig;

/// Pipeline config from the environment with optional CLI directory overrides.
pub fn resolve_config(raw_dir: Option<PathBuf>, processed_dir: Option<PathBuf>) -> PipelineConfig {
    let mut cfg = PipelineConfig::from_env();
    if let Some(dir) = raw_dir {
        cfg.raw_dir = dir;
    }
    if let Some(dir) = processed_dir {
        cfg.processed_dir = dir;
    }
    cfg
}
