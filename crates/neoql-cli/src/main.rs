//! neoql CLI - check type catalogues and translate requests offline.
//!
//! The library API is for serving layers; the CLI is for schema authors who
//! want to see what a catalogue builds into and what a request compiles to.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Graph query translation tool.
///
/// Validates type catalogues and prints the statement text and parameters
/// a request compiles to.
#[derive(Parser)]
#[command(name = "neoql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress progress and info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Build a catalogue and summarize its types
    Schema {
        /// Path to the catalogue JSON
        catalogue: PathBuf,
    },

    /// Translate one request document
    Translate {
        /// Path to the catalogue JSON
        catalogue: PathBuf,

        /// Path to the request JSON
        request: PathBuf,

        /// Caller context JSON (`authenticated`, `claims`)
        #[arg(long)]
        auth: Option<PathBuf>,

        /// Translator options JSON (`defaultLimit`, `indent`, ...)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Schema { catalogue } => commands::schema::run(&catalogue, cli.format, cli.quiet),
        Commands::Translate {
            catalogue,
            request,
            auth,
            config,
        } => commands::translate::run(
            &commands::translate::Inputs {
                catalogue: &catalogue,
                request: &request,
                auth: auth.as_deref(),
                config: config.as_deref(),
            },
            cli.format,
            cli.quiet,
        ),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
