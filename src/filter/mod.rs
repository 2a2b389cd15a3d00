//! Pickle filtering
//!
//! Decides which pickles are accepted for execution.

mod pickle_filter;
mod tag_expression;

pub use pickle_filter::{FilterError, FilterOptions, PickleFilter};
