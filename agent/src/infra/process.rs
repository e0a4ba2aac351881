//! `ProcessLauncher` over `std::process::Command`.

use std::path::Path;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};

use crate::application::ports::ProcessLauncher;

/// Runs a program in the foreground, inheriting stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn run(&self, program: &Path, args: &[String]) -> Result<ExitStatus> {
        Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("failed to start {}", program.display()))
    }
}
