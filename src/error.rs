//! Typed pipeline errors.
//!
//! The pipeline never partially succeeds: any failure inside a stage is
//! re-raised as a single [`PipelineError::Stage`] carrying the stage name,
//! and the caller receives no partial result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from one of the input datasets.
    #[error("required column `{column}` missing from {input} input")]
    MissingColumn {
        column: String,
        input: &'static str,
    },

    /// A pipeline stage failed; the whole run is aborted.
    #[error("processing failed at stage `{stage}`: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn stage(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Stage { stage, source }
    }

    /// Name of the stage that failed, if this is a stage failure.
    pub fn stage_name(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            Self::MissingColumn { .. } => None,
        }
    }
}
