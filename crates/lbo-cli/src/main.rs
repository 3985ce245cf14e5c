mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::model::ModelArgs;
use commands::sensitivity::SensitivityArgs;

/// LBO projection models from the command line
#[derive(Parser)]
#[command(
    name = "lbo",
    version,
    about = "Multi-year LBO projections with debt schedules and returns",
    long_about = "Builds a complete leveraged buyout model from a JSON input \
                  record: three linked statements, per-tranche debt schedules \
                  with cash sweep, sources & uses, and investor returns. \
                  Sensitivity grids re-run the engine over parameter sweeps."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a full LBO model from an input record
    Model(ModelArgs),
    /// Run a 2-way sensitivity grid over the engine
    Sensitivity(SensitivityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Model(args) => commands::model::run_model(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Version => {
            println!("lbo {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
