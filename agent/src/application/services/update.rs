//! Application service: discover, fetch, verify and install newer builds.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O except the final permission fix-up is routed through injected
//! port traits.

use std::path::{Path, PathBuf};

use p256::PublicKey;
use tracing::{debug, info, warn};

use crate::application::ports::{
    Downloader, KeyValueStore, PackageFormat, ReleaseSource, UpdateInstaller,
};
use crate::domain::config::CURRENT_APP_KEY;
use crate::domain::release::{is_path_safe_tag, semver_disagreement};
use crate::domain::{Release, StoreError, UpdateError, UpgradeCandidate, select_upgrade};

/// Download temp files are named with this prefix.
const DOWNLOAD_PREFIX: &str = "fleetwatch-download-";

/// Installs signed builds from a release feed into the updates directory.
pub struct Updater<'a, R, D, S, F> {
    source: &'a R,
    downloader: &'a D,
    store: &'a S,
    format: &'a F,
    asset_name: String,
    updates_dir: PathBuf,
    trust_anchor: PublicKey,
}

impl<'a, R, D, S, F> Updater<'a, R, D, S, F>
where
    R: ReleaseSource,
    D: Downloader,
    S: KeyValueStore,
    F: PackageFormat,
{
    #[must_use]
    pub fn new(
        source: &'a R,
        downloader: &'a D,
        store: &'a S,
        format: &'a F,
        asset_name: impl Into<String>,
        updates_dir: impl Into<PathBuf>,
        trust_anchor: PublicKey,
    ) -> Self {
        Self {
            source,
            downloader,
            store,
            format,
            asset_name: asset_name.into(),
            updates_dir: updates_dir.into(),
            trust_anchor,
        }
    }

    /// Ask the release source for the best upgrade over `current_tag`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ReleaseSource`] if the release list cannot be
    /// fetched. No candidate is not an error.
    pub fn resolve(&self, current_tag: &str) -> Result<Option<UpgradeCandidate>, UpdateError> {
        let releases = self
            .source
            .list_releases()
            .map_err(|e| UpdateError::ReleaseSource(e.into()))?;
        debug!(count = releases.len(), "fetched release list");
        report_order_disagreements(current_tag, &releases);
        Ok(select_upgrade(current_tag, &releases, &self.asset_name))
    }

    fn install(&self, candidate: &UpgradeCandidate) -> Result<PathBuf, UpdateError> {
        if !is_path_safe_tag(&candidate.tag) {
            return Err(UpdateError::UnsafeTag(candidate.tag.clone()));
        }
        std::fs::create_dir_all(&self.updates_dir)?;

        // Removed when dropped, on every return path.
        let download = tempfile::Builder::new()
            .prefix(DOWNLOAD_PREFIX)
            .suffix(".zip")
            .tempfile()?;
        self.downloader
            .download(&candidate.download_url, download.path())
            .map_err(|e| UpdateError::Download {
                url: candidate.download_url.clone(),
                source: e.into(),
            })?;

        let entries = self.format.list_entries(download.path())?;
        if entries.len() != 1 {
            return Err(UpdateError::CorruptPackage(format!(
                "expected exactly one file in package, found {}",
                entries.len()
            )));
        }

        let prefix = format!("{}-", candidate.tag);
        let extracted = self
            .format
            .unpack(download.path(), &self.updates_dir, &prefix)?;
        let [entry] = extracted.as_slice() else {
            return Err(UpdateError::CorruptPackage(format!(
                "expected exactly one extracted file, found {}",
                extracted.len()
            )));
        };

        if let Err(e) = self.format.verify_extracted(entry, &self.trust_anchor) {
            warn!(path = %entry.path.display(), error = %e, "rejecting unverified package");
            return Err(e.into());
        }

        make_executable(&entry.path)?;
        let installed = std::fs::canonicalize(&entry.path)?;
        record_installed_app(self.store, &installed)?;
        Ok(installed)
    }
}

impl<R, D, S, F> UpdateInstaller for Updater<'_, R, D, S, F>
where
    R: ReleaseSource,
    D: Downloader,
    S: KeyValueStore,
    F: PackageFormat,
{
    fn fetch_and_install(&self, current_tag: &str) -> Result<Option<PathBuf>, UpdateError> {
        let Some(candidate) = self.resolve(current_tag)? else {
            info!(current = current_tag, "no update available");
            return Ok(None);
        };
        info!(
            current = current_tag,
            tag = %candidate.tag,
            url = %candidate.download_url,
            "update available"
        );
        let installed = self.install(&candidate)?;
        info!(tag = %candidate.tag, path = %installed.display(), "update installed");
        Ok(Some(installed))
    }
}

// ── Installed application record ──────────────────────────────────────────────

/// Persist `path` as the binary to run next.
///
/// # Errors
///
/// Returns [`StoreError`] if the store write fails.
pub fn record_installed_app(store: &impl KeyValueStore, path: &Path) -> Result<(), StoreError> {
    store.write(CURRENT_APP_KEY, path.to_string_lossy().as_bytes())
}

/// The recorded binary, or `None` when nothing has been installed.
///
/// # Errors
///
/// Returns [`StoreError`] if the record exists but cannot be read.
pub fn installed_app(store: &impl KeyValueStore) -> Result<Option<PathBuf>, StoreError> {
    if !store.has(CURRENT_APP_KEY) {
        return Ok(None);
    }
    let raw = match store.read(CURRENT_APP_KEY) {
        Ok(raw) => raw,
        Err(StoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let path = String::from_utf8_lossy(&raw).trim().to_string();
    Ok((!path.is_empty()).then(|| PathBuf::from(path)))
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn report_order_disagreements(current_tag: &str, releases: &[Release]) {
    for release in releases.iter().filter(|r| !r.prerelease) {
        if let Some(semantic) = semver_disagreement(&release.tag, current_tag) {
            warn!(
                tag = %release.tag,
                current = current_tag,
                semantic = ?semantic,
                "tag order differs between string and semantic comparison; string order is used"
            );
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
