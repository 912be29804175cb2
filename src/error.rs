//! Pipeline error taxonomy.
//!
//! Cell-level parse failures are not errors: they become missing values in
//! the loader and are resolved to concrete numbers by the feature assembler.
//! Everything structural (schema, sample sufficiency, artifact I/O) is fatal
//! and surfaces through these variants.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from an input table. Aborts before any
    /// computation.
    #[error("input schema error: column `{column}` missing from {table}")]
    InputSchema { table: String, column: String },

    /// Too few positive-target rows to fit or cross-validate. The fold count
    /// is never silently reduced to compensate.
    #[error(
        "insufficient training data: {available} positive-target rows, \
         need at least {required}"
    )]
    InsufficientTrainingData { available: usize, required: usize },

    /// An artifact could not be written to the output directory.
    #[error("failed to write artifact {path}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
