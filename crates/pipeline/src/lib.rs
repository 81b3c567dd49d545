//! Batch jobs over the dataset collections.
//!
//! - [`batch`]: the LLM enrichment loop ([`BatchRunner`]).
//! - [`tasks`]: the jobs the loop runs (classification and content generation).
//! - [`assign`]: tier-table field assignment (no LLM).
//! - [`reset`] / [`verify`]: maintenance and completeness reporting.
//! - [`cache`] / [`run_log`]: the intermediate results file and per-run logs.

pub mod assign;
pub mod batch;
pub mod cache;
pub mod error;
pub mod prompt;
pub mod reset;
pub mod run_log;
pub mod run_record;
pub mod tasks;
pub mod verify;
pub mod writer;

pub use batch::{BatchOptions, BatchRunner};
pub use error::{CacheError, PipelineError, TaskError};
