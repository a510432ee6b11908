//! CLI subcommand implementations.

pub mod events;
pub mod rules;
pub mod summary;
