use std::path::PathBuf;

use crate::model::Source;

/// Table-level failures. Field-level problems never surface here; they
/// degrade to unknown values inside the mediator.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("{dataset} source file not found: {}", path.display())]
    MissingSource { dataset: Source, path: PathBuf },

    #[error("{artifact} is missing required column '{column}'")]
    MissingColumn { artifact: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to publish artifact: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn missing_column(artifact: impl Into<String>, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            artifact: artifact.into(),
            column: column.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
