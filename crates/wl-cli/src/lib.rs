//! Web access log sessionizer CLI library.
//!
//! This crate provides the CLI interface, log ingestion and report output for the
//! sessionizer in `wl-core`.

mod cli;
pub mod commands;
mod config;
pub mod ingest;
pub mod output;

pub use cli::{Cli, Commands};
pub use config::{Config, FieldLayout};
