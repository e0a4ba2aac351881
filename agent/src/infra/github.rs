//! GitHub Releases implementation of the `ReleaseSource` port.
//!
//! Pages through `GET /repos/{owner}/{repo}/releases` following the `Link`
//! header until no `rel="next"` remains.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::ReleaseSource;
use crate::domain::{Asset, Release, UpdateSettings};

const GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 30;
/// Hard stop for runaway `Link` chains.
const MAX_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: Option<String>,
    browser_download_url: Option<String>,
}

impl GithubRelease {
    /// Releases without a tag are dropped; assets missing a name or URL too.
    fn into_release(self) -> Option<Release> {
        let tag = self.tag_name.filter(|t| !t.is_empty())?;
        let assets = self
            .assets
            .into_iter()
            .filter_map(|a| {
                Some(Asset {
                    name: a.name?,
                    download_url: a.browser_download_url?,
                })
            })
            .collect();
        Some(Release {
            tag,
            prerelease: self.prerelease,
            assets,
        })
    }
}

/// Release feed of one GitHub repository.
pub struct GithubReleaseSource {
    agent: ureq::Agent,
    api_base: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl GithubReleaseSource {
    /// Source for `settings.owner/settings.repo`.
    ///
    /// `FLEETWATCH_GITHUB_API_URL` overrides the API base and `GITHUB_TOKEN`,
    /// when set, authenticates requests.
    #[must_use]
    pub fn new(agent: ureq::Agent, settings: &UpdateSettings) -> Self {
        let api_base = std::env::var("FLEETWATCH_GITHUB_API_URL")
            .unwrap_or_else(|_| GITHUB_API_URL.to_string());
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        Self {
            agent,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
            token,
        }
    }

    fn first_page_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page={PER_PAGE}",
            self.api_base, self.owner, self.repo
        )
    }

    fn fetch_page(&self, url: &str) -> Result<(Vec<GithubRelease>, Option<String>)> {
        let req = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json");
        let req = match &self.token {
            Some(token) => req.set("Authorization", &format!("Bearer {token}")),
            None => req,
        };

        let resp = match req.call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(403, _)) => {
                anyhow::bail!("GitHub API rate limit exceeded; set GITHUB_TOKEN")
            }
            Err(ureq::Error::Status(404, _)) => {
                anyhow::bail!("GitHub repository not found: {}/{}", self.owner, self.repo)
            }
            Err(ureq::Error::Status(code, _)) => anyhow::bail!("GitHub API error: HTTP {code}"),
            Err(e) => return Err(anyhow::Error::new(e).context("requesting release list")),
        };

        let next = resp.header("Link").and_then(next_link);
        let page: Vec<GithubRelease> =
            serde_json::from_reader(resp.into_reader()).context("parsing release list")?;
        Ok((page, next))
    }
}

impl ReleaseSource for GithubReleaseSource {
    fn list_releases(&self) -> Result<Vec<Release>> {
        let mut releases = Vec::new();
        let mut url = Some(self.first_page_url());
        let mut pages = 0;

        while let Some(current) = url.take() {
            anyhow::ensure!(
                pages < MAX_PAGES,
                "release list exceeds {MAX_PAGES} pages"
            );
            let (page, next) = self.fetch_page(&current)?;
            pages += 1;
            debug!(page = pages, count = page.len(), "fetched release page");
            releases.extend(page.into_iter().filter_map(GithubRelease::into_release));
            url = next;
        }
        Ok(releases)
    }
}

/// Extract the `rel="next"` target from a `Link` header value.
#[must_use]
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

/// Name of the release asset built for this platform.
///
/// # Errors
///
/// Returns an error on platforms no build is published for.
pub fn platform_asset_name() -> Result<String> {
    asset_name_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn asset_name_for(os: &str, arch: &str) -> Result<String> {
    let name = match (os, arch) {
        ("linux", "x86_64") => "fleetwatch-linux-amd64.zip",
        ("linux", "aarch64") => "fleetwatch-linux-arm64.zip",
        ("linux", "arm") => "fleetwatch-linux-arm.zip",
        ("macos", "x86_64") => "fleetwatch-darwin-amd64.zip",
        ("macos", "aarch64") => "fleetwatch-darwin-arm64.zip",
        ("freebsd", "x86_64") => "fleetwatch-freebsd-amd64.zip",
        _ => anyhow::bail!("unsupported platform: {os}-{arch}"),
    };
    Ok(name.to_string())
}
