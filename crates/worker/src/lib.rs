//! `sparza-worker`: command-line entry point for the dataset batch jobs.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod shutdown;
