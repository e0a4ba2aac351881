//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Self-updating host monitoring agent
///
/// Without a subcommand, performs one agent run: install a newer signed
/// build if one is published, then report telemetry, either directly or
/// through the installed build.
#[derive(Parser, Debug)]
#[command(name = "fleetwatch", version)]
pub struct Cli {
    #[command(flatten)]
    pub run: commands::run::RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a signing key pair
    Keygen,

    /// Sign a binary and pack it into a release package
    Package(commands::package::PackageArgs),

    /// Verify a release package
    Verify(commands::verify::VerifyArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn run(self) -> Result<()> {
        match self.command {
            None => commands::run::run(&self.run),
            Some(Command::Keygen) => commands::keygen::run(),
            Some(Command::Package(args)) => commands::package::run(&args),
            Some(Command::Verify(args)) => commands::verify::run(&args),
            Some(Command::Version) => {
                commands::version::run();
                Ok(())
            }
        }
    }
}
