//! Downstream projections of an aggregated run
//!
//! JSON report tree, run summary and aggregate persistence.

mod report;
mod storage;
mod summary;

pub use report::{project, FeatureReport};
pub use storage::{ResultsStorage, RunInfo, StoredRun};
pub use summary::RunSummary;
