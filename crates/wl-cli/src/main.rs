use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{analyze, sweep};
use wl_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Commands::Analyze {
            log,
            window,
            discover,
            max_window,
            output,
            json,
            no_write,
        }) => {
            if let Some(window) = window {
                config.session_window = window;
                config.discover_window = false;
            } else if discover {
                config.discover_window = true;
            }
            if let Some(max_window) = max_window {
                config.max_window = max_window;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            let options = analyze::AnalyzeOptions {
                json,
                write_reports: !no_write,
            };
            analyze::run(&mut io::stdout().lock(), &config, &log, options)?;
        }
        Some(Commands::Sweep {
            log,
            max_window,
            json,
        }) => {
            if let Some(max_window) = max_window {
                config.max_window = max_window;
            }
            sweep::run(&mut io::stdout().lock(), &config, &log, json)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
