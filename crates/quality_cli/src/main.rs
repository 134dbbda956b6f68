mod commands;
mod output;
mod sources;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dqe")]
#[command(version, about = "Data Quality Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Report format written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the sources of a suite against its rules
    Validate {
        /// Path to the suite file (YAML or TOML)
        suite: PathBuf,

        /// Override the path of a source or reference (NAME=PATH)
        #[arg(
            short,
            long = "source",
            value_name = "NAME=PATH",
            value_parser = parse_source_override
        )]
        sources: Vec<(String, PathBuf)>,

        /// Rows per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Maximum failure samples kept per rule
        #[arg(short, long)]
        max_samples: Option<usize>,

        /// Stop a source as soon as an error-severity rule fails
        #[arg(long)]
        fail_fast: bool,

        /// Number of sources evaluated in parallel
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Output format: text, json
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a suite and build its rules without reading any data
    Check {
        /// Path to the suite file (YAML or TOML)
        suite: PathBuf,

        /// Output format: text, json
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the registered rule kinds
    Rules,
}

fn parse_source_override(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", raw)),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            suite,
            sources,
            batch_size,
            max_samples,
            fail_fast,
            parallelism,
            format,
            output,
        } => commands::validate::execute(
            &suite,
            commands::validate::Overrides {
                sources,
                batch_size,
                max_samples,
                fail_fast,
                parallelism,
            },
            format,
            output.as_deref(),
        ),

        Commands::Check { suite, format } => commands::check::execute(&suite, format),

        Commands::Rules => commands::rules::execute(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            output::print_error(&format!("Error: {:#}", err));
            ExitCode::from(2)
        }
    }
}
