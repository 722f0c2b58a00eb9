use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "case-runner")]
#[command(about = "Case management engine runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Start a case (or resume one from a checkpoint) and apply a command stream to it.
    Run(RunCommand),
    /// Check a case definition without running it.
    Validate(ValidateCommand),
    /// Summarize a checkpoint file.
    Inspect(InspectCommand),
}

#[derive(Debug, Clone, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RunCommand {
    #[arg(long)]
    pub definition: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// JSONL file of command envelopes; `$case` stands for the running case id.
    #[arg(long)]
    pub commands: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub commands_stdin_jsonl: bool,
    /// Continue the case saved in this checkpoint instead of starting a new one.
    #[arg(long)]
    pub resume: Option<PathBuf>,
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Append emitted events as JSONL to this file, or to stdout with `-`.
    #[arg(long)]
    pub events_jsonl: Option<String>,
    #[arg(long)]
    pub business_key: Option<String>,
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ValidateCommand {
    #[arg(long)]
    pub definition: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, clap::Args)]
pub struct InspectCommand {
    #[arg(long)]
    pub checkpoint: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
