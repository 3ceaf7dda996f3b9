//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use repodata_hotfixes::output::OutputConfig;

use crate::commands;

/// Repodata Hotfixes - patch channel metadata without rebuilding packages
#[derive(Parser, Debug)]
#[command(name = "repodata-hotfixes")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate patch instructions for a channel
    Gen(commands::gen::GenArgs),
    /// Test hotfix changes against live repodata before deployment
    Test(commands::test::TestArgs),
    /// Report the effective changes of the currently deployed hotfixes
    Report(commands::report::ReportArgs),
    /// Propose numpy <2.0a0 upper bounds for review
    Numpy2(commands::numpy2::Numpy2Args),
    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Gen(args) => commands::gen::execute(args),
            Commands::Test(args) => commands::test::execute(args, &output),
            Commands::Report(args) => commands::report::execute(args, &output),
            Commands::Numpy2(args) => commands::numpy2::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Logging goes to stderr so stdout stays machine-consumable (diffs, JSON).
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
