//! GC log analyzer CLI library.
//!
//! This crate provides the `gcx` command-line interface on top of `gcx-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, GroupByArg};
pub use config::Config;
