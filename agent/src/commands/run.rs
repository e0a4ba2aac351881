//! Run command: one agent cycle: update, then report or hand off.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use crate::application::services::launch::LaunchOrchestrator;
use crate::application::services::report::Reporter;
use crate::application::services::update::Updater;
use crate::domain::config::{
    DEFAULT_RELEASE_OWNER, DEFAULT_RELEASE_REPO, current_version_tag, handoff_args,
};
use crate::domain::{AgentPaths, ConnectionParams, UpdateSettings};
use crate::infra::archive::SignedZip;
use crate::infra::github::{GithubReleaseSource, platform_asset_name};
use crate::infra::http::{HttpDownloader, HttpTelemetrySink, download_agent};
use crate::infra::identity::{UdpNetworkProbe, default_providers};
use crate::infra::process::CommandLauncher;
use crate::infra::stats::SysinfoCollector;
use crate::infra::store::DiskStore;
use crate::infra::trust::trust_anchor;

/// Arguments for an agent run.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory holding the cache and installed updates
    #[arg(long, env = "FLEETWATCH_WORKDIR", value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Monitoring token for the reporting endpoint
    #[arg(long, env = "FLEETWATCH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Reporting endpoint URL
    #[arg(long, env = "FLEETWATCH_URL")]
    pub url: Option<String>,

    /// Print the collected report instead of updating and sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Owner of the repository releases are fetched from
    #[arg(long, env = "FLEETWATCH_RELEASE_OWNER", default_value = DEFAULT_RELEASE_OWNER)]
    pub release_owner: String,

    /// Repository releases are fetched from
    #[arg(long, env = "FLEETWATCH_RELEASE_REPO", default_value = DEFAULT_RELEASE_REPO)]
    pub release_repo: String,

    /// Release asset to install [default: derived from the platform]
    #[arg(long, env = "FLEETWATCH_ASSET_NAME")]
    pub asset_name: Option<String>,
}

impl RunArgs {
    /// Work directory layout, defaulting to the user cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no work directory is given and the platform
    /// has no cache directory.
    pub fn paths(&self) -> Result<AgentPaths> {
        let work_dir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .context("cannot determine cache directory; pass --workdir")?
                .join("fleetwatch"),
        };
        Ok(AgentPaths::new(work_dir))
    }

    /// Reporting endpoint parameters.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing argument.
    pub fn connection(&self) -> Result<ConnectionParams> {
        let token = non_empty(self.token.as_deref()).context("--token argument is missing")?;
        let url = non_empty(self.url.as_deref()).context("--url argument is missing")?;
        Ok(ConnectionParams {
            token: token.to_string(),
            url: url.to_string(),
        })
    }

    /// Release feed settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no asset name is given and the platform has no
    /// published build.
    pub fn update_settings(&self) -> Result<UpdateSettings> {
        let asset_name = match &self.asset_name {
            Some(name) => name.clone(),
            None => platform_asset_name()?,
        };
        Ok(UpdateSettings {
            owner: self.release_owner.clone(),
            repo: self.release_repo.clone(),
            asset_name,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Entry point for an agent run.
///
/// # Errors
///
/// Returns an error if arguments are missing, the work directory cannot be
/// prepared, or the embedded report fails. Update and handoff failures are
/// logged and do not fail the run.
pub fn run(args: &RunArgs) -> Result<()> {
    let paths = args.paths()?;
    let version = current_version_tag();

    let store = DiskStore::new(paths.cache_dir());
    let collector = SysinfoCollector;
    let probe = UdpNetworkProbe;
    let providers = default_providers();
    let reporter = Reporter::new(&store, &collector, &probe, &providers);

    if args.dry_run {
        let info = reporter.collect(version)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("serializing report")?
        );
        return Ok(());
    }

    let conn = args.connection()?;
    let settings = args.update_settings()?;
    let updates_dir = paths.updates_dir();
    std::fs::create_dir_all(&updates_dir)
        .with_context(|| format!("creating {}", updates_dir.display()))?;

    let source = GithubReleaseSource::new(download_agent(), &settings);
    let downloader = HttpDownloader::default();
    let format = SignedZip;
    let updater = Updater::new(
        &source,
        &downloader,
        &store,
        &format,
        settings.asset_name.clone(),
        updates_dir,
        trust_anchor()?,
    );

    let launcher = CommandLauncher;
    let mut orchestrator = LaunchOrchestrator::new(&updater, &store, &launcher);
    if let Ok(exe) = std::env::current_exe() {
        orchestrator = orchestrator.with_self_exe(exe);
    }

    let sink = HttpTelemetrySink::new(conn.clone());
    let outcome = orchestrator.run(version, &handoff_args(&paths, &conn, &settings), || {
        reporter.report(version, &sink).map(|_| ())
    })?;
    debug!(?outcome, "run finished");
    Ok(())
}
