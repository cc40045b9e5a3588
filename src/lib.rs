pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod integration;
pub mod logging;
pub mod mediation;
pub mod model;
pub mod normalization;
pub mod pipeline;
pub mod sources;
pub mod table;
pub mod util;

pub use catalog::Catalog;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use model::{IntegratedMovie, IntegratedRating, MediatedRecord, Source};
