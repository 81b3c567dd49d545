//! Domain types and pure logic for the Sparza dataset enrichment jobs.
//!
//! This crate performs no I/O so it can be shared by the database layer, the
//! LLM clients, the pipeline and the worker binary.

pub mod data_type;
pub mod error;
pub mod fields;
pub mod json_extract;
pub mod progress;
pub mod retry;
pub mod store;
pub mod tiers;
pub mod types;
