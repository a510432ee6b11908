//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use gcx_core::GroupBy;

/// JVM garbage-collection log analyzer.
///
/// Classifies GC log lines, pairs pause start and end markers, and
/// summarizes pause time per trigger or per event kind.
#[derive(Debug, Parser)]
#[command(name = "gcx", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Rule catalogue to use instead of the built-in rules.
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Summarize pause time across one or more log files.
    Summary {
        /// Group pauses by trigger or by event kind.
        #[arg(long, value_enum)]
        group_by: Option<GroupByArg>,

        /// Count pauses that never ended as zero-length pauses.
        #[arg(long)]
        include_incomplete: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// GC log files, analyzed independently.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print classified events of one log file as JSON lines.
    Events {
        /// Print unclassified lines instead.
        #[arg(long)]
        unknown: bool,

        /// GC log file.
        file: PathBuf,
    },

    /// List the active rule catalogue in precedence order.
    Rules {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupByArg {
    Trigger,
    Kind,
}

impl From<GroupByArg> for GroupBy {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::Trigger => Self::Trigger,
            GroupByArg::Kind => Self::Kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_with_options() {
        let cli = Cli::try_parse_from([
            "gcx",
            "-v",
            "summary",
            "--group-by",
            "kind",
            "--json",
            "a.log",
            "b.log",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Summary {
            group_by,
            json,
            files,
            include_incomplete,
        } = cli.command
        else {
            panic!("expected summary");
        };
        assert_eq!(group_by, Some(GroupByArg::Kind));
        assert!(json);
        assert!(!include_incomplete);
        assert_eq!(files, vec![PathBuf::from("a.log"), PathBuf::from("b.log")]);
    }

    #[test]
    fn summary_requires_files() {
        assert!(Cli::try_parse_from(["gcx", "summary"]).is_err());
    }

    #[test]
    fn rules_flag_is_global() {
        let cli = Cli::try_parse_from(["gcx", "rules", "--rules", "custom.toml"]).unwrap();
        assert_eq!(cli.rules, Some(PathBuf::from("custom.toml")));
    }
}
