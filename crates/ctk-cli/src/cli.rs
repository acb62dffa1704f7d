use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ctk",
    about = "Connector tracker toolkit: run a sample session, inspect snapshots",
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

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a sample session: register, flush, detach, sweep
    Demo(DemoArgs),
    /// Print the contents of a tracker snapshot
    Inspect(InspectArgs),
    /// Print the effective tracker configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    /// Hide the second label before sweeping
    #[arg(long)]
    pub hide_label: bool,
    /// Write the final tracker state to this file (`.bin` for bincode, JSON otherwise)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// TOML file with tracker settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot file written by `ctk demo --snapshot`
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML file to load instead of the defaults
    #[arg(long)]
    pub file: Option<PathBuf>,
}
