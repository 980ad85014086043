use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "smudge",
    about = "Replay field-tracking scenarios and report dirty state",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a scenario and print every report step
    Run(RunArgs),
    /// Validate a scenario without running it
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,
    /// Registry settings (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,
}
