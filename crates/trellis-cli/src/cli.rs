use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trellis",
    about = "Trellis: batched requests against a hierarchical graph repository",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (defaults to ./trellis.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a JSON request script against a fresh in-memory repository
    Run(RunArgs),
    /// List every request type with its pinned ordinal
    Types,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct RunArgs {
    pub script: PathBuf,
    #[arg(long, default_value = "bulk")]
    pub mode: RunMode,
    /// User recorded on the execution context in channel mode
    #[arg(long)]
    pub user: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Build one composite request and process it in one go
    Bulk,
    /// Stream requests through a channel to a worker thread
    Channel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_options() {
        let cli = Cli::parse_from([
            "trellis", "run", "ops.json", "--mode", "channel", "--format", "json", "--user", "ann",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(args.script, PathBuf::from("ops.json"));
        assert_eq!(args.mode, RunMode::Channel);
        assert_eq!(args.user.as_deref(), Some("ann"));
    }

    #[test]
    fn run_defaults_to_bulk() {
        let cli = Cli::parse_from(["trellis", "run", "ops.json"]);
        let Command::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(args.mode, RunMode::Bulk);
        assert!(cli.config.is_none());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["trellis", "config", "--config", "other.toml"]);
        assert!(matches!(cli.command, Command::Config));
        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
    }
}
