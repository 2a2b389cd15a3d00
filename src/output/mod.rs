//! Output formatting
//!
//! Usage tables, plans, summaries and stored-run listings in table, JSON
//! or CSV form.

mod formatter;

pub use formatter::{OutputFormat, PlanEntry, ResultFormatter};
