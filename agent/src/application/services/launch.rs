//! Application service: decide whether this run reports telemetry itself or
//! hands off to the installed build.
//!
//! One decision per process: update, read the record, then either run the
//! recorded binary or run the embedded logic. A handoff that cannot start
//! falls back to the embedded logic in the same run. Retrying is left to
//! whatever schedules the agent.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::application::ports::{KeyValueStore, ProcessLauncher, UpdateInstaller};
use crate::application::services::update::installed_app;
use crate::domain::UpdateError;

/// What this run should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    /// Run the embedded telemetry logic.
    SelfRun,
    /// Execute the installed binary at this path.
    Delegate(PathBuf),
}

/// How the run ended.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// No usable installed binary; embedded logic ran.
    RanSelf,
    /// The installed binary ran to completion with this status.
    Delegated { program: PathBuf, status: ExitStatus },
    /// The installed binary could not be started; embedded logic ran.
    FellBack { program: PathBuf, error: String },
}

/// Wires the update step, the installed-app record and process handoff.
pub struct LaunchOrchestrator<'a, U, S, L> {
    installer: &'a U,
    store: &'a S,
    launcher: &'a L,
    self_exe: Option<PathBuf>,
}

impl<'a, U, S, L> LaunchOrchestrator<'a, U, S, L>
where
    U: UpdateInstaller,
    S: KeyValueStore,
    L: ProcessLauncher,
{
    #[must_use]
    pub fn new(installer: &'a U, store: &'a S, launcher: &'a L) -> Self {
        Self {
            installer,
            store,
            launcher,
            self_exe: None,
        }
    }

    /// The path of the running executable. A record pointing at it is
    /// treated as [`LaunchState::SelfRun`], so an installed build never
    /// hands off to itself.
    #[must_use]
    pub fn with_self_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.self_exe = Some(path.into());
        self
    }

    /// Attempt an update, then decide between self and delegate.
    ///
    /// Update failures are advisory. A failure to persist the install
    /// record, or to read it back, forces [`LaunchState::SelfRun`].
    pub fn decide(&self, current_tag: &str) -> LaunchState {
        match self.installer.fetch_and_install(current_tag) {
            Ok(_) => {}
            Err(UpdateError::Store(e)) => {
                warn!(error = %e, "could not record installed update, running embedded agent");
                return LaunchState::SelfRun;
            }
            Err(e) if e.is_verification_failure() => {
                warn!(error = %e, "update rejected: package failed verification");
            }
            Err(e) => {
                warn!(error = %format!("{:#}", anyhow::Error::from(e)), "update attempt failed");
            }
        }

        match installed_app(self.store) {
            Ok(Some(path)) if self.is_self(&path) => {
                debug!(path = %path.display(), "installed agent is the running binary");
                LaunchState::SelfRun
            }
            Ok(Some(path)) => LaunchState::Delegate(path),
            Ok(None) => LaunchState::SelfRun,
            Err(e) => {
                warn!(error = %e, "could not read installed application record");
                LaunchState::SelfRun
            }
        }
    }

    fn is_self(&self, path: &Path) -> bool {
        let Some(self_exe) = &self.self_exe else {
            return false;
        };
        let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
        canonical(path) == canonical(self_exe)
    }

    /// Run this process's single launch decision to completion.
    ///
    /// `run_self` is invoked when no installed binary is usable or when
    /// the handoff cannot start.
    ///
    /// # Errors
    ///
    /// Returns whatever `run_self` returns. A failed handoff is not an
    /// error.
    pub fn run(
        &self,
        current_tag: &str,
        handoff_args: &[String],
        run_self: impl FnOnce() -> Result<()>,
    ) -> Result<LaunchOutcome> {
        let program = match self.decide(current_tag) {
            LaunchState::SelfRun => {
                info!("running embedded agent");
                run_self()?;
                return Ok(LaunchOutcome::RanSelf);
            }
            LaunchState::Delegate(program) => program,
        };

        info!(program = %program.display(), "delegating to installed agent");
        match self.launcher.run(&program, handoff_args) {
            Ok(status) => {
                if !status.success() {
                    warn!(program = %program.display(), %status, "installed agent exited unsuccessfully");
                }
                Ok(LaunchOutcome::Delegated { program, status })
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(program = %program.display(), error = %error, "installed agent failed to start, falling back");
                run_self()?;
                Ok(LaunchOutcome::FellBack { program, error })
            }
        }
    }
}
