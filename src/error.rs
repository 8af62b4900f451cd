use thiserror::Error;

/// Error taxonomy for the enrichment pipeline (spec §7).
///
/// Only `InputUnreadable` and disk-write failures at the final merge are fatal
/// to a job; everything else is recorded on the affected row and the job
/// keeps going.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input file '{path}' could not be decoded or is empty")]
    InputUnreadable { path: String },

    #[error("schema inference failed for '{file}', falling back to heuristic: {source}")]
    InferenceFailure {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("row {original_index} is outside the jurisdiction whitelist")]
    Ineligible { original_index: usize },

    #[error("no results found for row {original_index}")]
    NoResults { original_index: usize },

    #[error("scraper error on row {original_index}: {message}")]
    ScraperError {
        original_index: usize,
        message: String,
    },

    #[error("scraped record for row {original_index:?} could not be attached: {reason}")]
    MergeConflict {
        original_index: Option<usize>,
        reason: String,
    },

    #[error("disk write failed: {0}")]
    DiskWrite(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error must abort the job rather than just being recorded
    /// on the affected row.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::InputUnreadable { .. } | PipelineError::DiskWrite(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
