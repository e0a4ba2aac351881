//! Release metadata and upgrade selection.
//!
//! Version tags are ordered as plain strings. `"v1.10.0" < "v1.9.0"` under
//! this ordering; selection keeps that behavior for compatibility with the
//! tags already published, and [`semver_disagreement`] lets callers report
//! pairs where the two orderings diverge.

use std::cmp::Ordering;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

/// One published release, as reported by the release source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub prerelease: bool,
    pub assets: Vec<Asset>,
}

impl Release {
    /// The asset with exactly this name, if attached.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// The release chosen for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    pub tag: String,
    pub download_url: String,
}

/// Pick the release to upgrade to, or `None` when nothing qualifies.
///
/// Single pass in source order: a release replaces the running best only
/// when it is not a prerelease, its tag is greater than `current_tag`, its
/// tag is greater than the running best, and it carries an asset named
/// `asset_name`. A higher tag without the asset never becomes the running
/// best, so a lower tag that has the asset can still win.
#[must_use]
pub fn select_upgrade(
    current_tag: &str,
    releases: &[Release],
    asset_name: &str,
) -> Option<UpgradeCandidate> {
    let mut best: Option<UpgradeCandidate> = None;
    for release in releases {
        if release.prerelease || release.tag.as_str() <= current_tag {
            continue;
        }
        let beats_best = best
            .as_ref()
            .is_none_or(|b| release.tag.as_str() > b.tag.as_str());
        if !beats_best {
            continue;
        }
        if let Some(asset) = release.asset(asset_name) {
            best = Some(UpgradeCandidate {
                tag: release.tag.clone(),
                download_url: asset.download_url.clone(),
            });
        }
    }
    best
}

/// Compare two tags as semantic versions (leading `v` ignored) and return
/// the semver ordering when it differs from the string ordering.
///
/// Returns `None` when either tag is not a semantic version or the two
/// orderings agree.
#[must_use]
pub fn semver_disagreement(a: &str, b: &str) -> Option<Ordering> {
    let parse = |tag: &str| semver::Version::parse(tag.trim_start_matches('v')).ok();
    let (va, vb) = (parse(a)?, parse(b)?);
    let semantic = va.cmp(&vb);
    (semantic != a.cmp(b)).then_some(semantic)
}

/// Whether a tag can be used verbatim as a file name prefix.
#[must_use]
pub fn is_path_safe_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag != "."
        && tag != ".."
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+'))
}
