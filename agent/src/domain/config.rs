//! Agent configuration values threaded through constructors.

use std::path::{Path, PathBuf};

/// Store key holding the absolute path of the installed application.
pub const CURRENT_APP_KEY: &str = "currentApp";

/// Store key holding the cached instance identity (JSON).
pub const INSTANCE_ID_KEY: &str = "instanceID";

/// Tag reported by builds that were not stamped with a release tag.
pub const UNTAGGED_VERSION: &str = "v0.0.0";

/// Default release feed coordinates.
///
/// # Release
///
/// These name a placeholder feed. Point them at the real release
/// repository together with replacing the embedded key in
/// `infra::trust`; packages from one feed only verify against the key of
/// the pipeline that signed them.
pub const DEFAULT_RELEASE_OWNER: &str = "fleetwatch-public";
pub const DEFAULT_RELEASE_REPO: &str = "fleetwatch-agent";

/// The version tag this binary was built from.
#[must_use]
pub fn current_version_tag() -> &'static str {
    match option_env!("FLEETWATCH_VERSION_TAG") {
        Some(tag) if !tag.is_empty() => tag,
        _ => UNTAGGED_VERSION,
    }
}

/// Directory layout under the agent's work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    work_dir: PathBuf,
}

impl AgentPaths {
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Root of the key-value store.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir.join("cache")
    }

    /// Where downloaded builds are extracted as `<tag>-<name>`.
    #[must_use]
    pub fn updates_dir(&self) -> PathBuf {
        self.work_dir.join("updates")
    }
}

/// Where to look for new builds and which asset to take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub owner: String,
    pub repo: String,
    pub asset_name: String,
}

/// Reporting endpoint parameters, also forwarded to a delegated binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub token: String,
    pub url: String,
}

/// Arguments handed to the installed binary so it runs with the same
/// configuration as this process, release feed included.
#[must_use]
pub fn handoff_args(
    paths: &AgentPaths,
    conn: &ConnectionParams,
    settings: &UpdateSettings,
) -> Vec<String> {
    vec![
        "--workdir".to_string(),
        paths.work_dir().display().to_string(),
        "--token".to_string(),
        conn.token.clone(),
        "--url".to_string(),
        conn.url.clone(),
        "--release-owner".to_string(),
        settings.owner.clone(),
        "--release-repo".to_string(),
        settings.repo.clone(),
        "--asset-name".to_string(),
        settings.asset_name.clone(),
    ]
}
