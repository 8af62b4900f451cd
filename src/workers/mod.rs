//! Concurrency layer (spec §5): a bounded worker pool over browser sessions
//! plus the progress-bar reporting that rides alongside it.

mod progress;
mod workers;

pub use progress::ProgressBars;
pub use workers::{analyze_pool, AnalyzeOutcome};
