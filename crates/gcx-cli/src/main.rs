use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gcx_cli::commands::{events, rules, summary};
use gcx_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.rules.is_some() {
        config.rules_path.clone_from(&cli.rules);
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let registry = config.registry().context("failed to load rule catalogue")?;
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::Summary {
            group_by,
            include_incomplete,
            json,
            files,
        } => {
            let mut options = config.analyze_options();
            if let Some(group_by) = group_by {
                options.group_by = (*group_by).into();
            }
            options.include_incomplete |= *include_incomplete;
            summary::run(&mut stdout, &registry, files, &options, *json)?;
        }
        Commands::Events { unknown, file } => {
            events::run(&mut stdout, &registry, file, &config.analyze_options(), *unknown)?;
        }
        Commands::Rules { json } => {
            rules::run(&mut stdout, &registry, *json)?;
        }
    }

    Ok(())
}
