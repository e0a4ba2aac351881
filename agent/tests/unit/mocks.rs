//! Shared port doubles for unit tests.
//!
//! Each double is the smallest thing that satisfies one port, with just
//! enough recording for tests to assert on what the service did.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::Result;
use fleetwatch::application::ports::{
    Downloader, IdentityProvider, KeyValueStore, NetworkProbe, PackageFormat, ProcessLauncher,
    ReleaseSource, StatsCollector, TelemetrySink, UpdateInstaller,
};
use fleetwatch::domain::signature::{Signature, sign};
use fleetwatch::domain::{
    Asset, InstanceId, InstanceInfo, KeyPair, MachineStats, Release, StoreError, UpdateError,
};
use fleetwatch::infra::archive::SignedZip;

// ── Cross-platform ExitStatus construction ───────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub fn release(tag: &str, prerelease: bool, assets: &[(&str, &str)]) -> Release {
    Release {
        tag: tag.to_string(),
        prerelease,
        assets: assets
            .iter()
            .map(|(name, url)| Asset {
                name: (*name).to_string(),
                download_url: (*url).to_string(),
            })
            .collect(),
    }
}

/// Write `payload` to `dir/name`, sign it with `keys`, and write the
/// package to `dir/name.zip`.
pub fn signed_package(dir: &Path, name: &str, payload: &[u8], keys: &KeyPair) -> PathBuf {
    let source = dir.join(name);
    std::fs::write(&source, payload).unwrap();
    let signature = sign(payload, keys.secret_key()).unwrap();
    let bytes = SignedZip.pack(&source, &signature).unwrap();
    let package = dir.join(format!("{name}.zip"));
    std::fs::write(&package, bytes).unwrap();
    package
}

/// Write a package holding a `bin/` directory entry and the file
/// `bin/agent`. With `signature`, the file's comment carries it the way a
/// signed package does.
pub fn nested_package(dir: &Path, payload: &[u8], signature: Option<&Signature>) -> PathBuf {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    writer.add_directory("bin/", options).unwrap();
    writer.start_file("bin/agent", options).unwrap();
    writer.write_all(payload).unwrap();
    let mut bytes = writer.finish().unwrap().into_inner();

    if let Some(signature) = signature {
        set_entry_comment(&mut bytes, "bin/agent", &signature.to_json().unwrap());
    }
    let package = dir.join("nested.zip");
    std::fs::write(&package, bytes).unwrap();
    package
}

/// Attach `comment` to the central directory record of `entry`. The `zip`
/// writer has no per-entry comments, so the record is patched in place.
fn set_entry_comment(bytes: &mut Vec<u8>, entry: &str, comment: &str) {
    let le16 = |b: &[u8], at: usize| usize::from(u16::from_le_bytes([b[at], b[at + 1]]));
    let le32 = |b: &[u8], at: usize| {
        u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]) as usize
    };

    let eocd = bytes
        .windows(4)
        .rposition(|w| w == [0x50, 0x4b, 0x05, 0x06])
        .unwrap();
    let central_size = le32(bytes, eocd + 12);
    let mut at = le32(bytes, eocd + 16);
    loop {
        assert_eq!(bytes[at..at + 4], [0x50, 0x4b, 0x01, 0x02]);
        let name_len = le16(bytes, at + 28);
        let extra_len = le16(bytes, at + 30);
        let comment_len = le16(bytes, at + 32);
        if &bytes[at + 46..at + 46 + name_len] == entry.as_bytes() {
            assert_eq!(comment_len, 0);
            let len = u16::try_from(comment.len()).unwrap();
            bytes[at + 32..at + 34].copy_from_slice(&len.to_le_bytes());
            let insert_at = at + 46 + name_len + extra_len;
            let tail = bytes.split_off(insert_at);
            bytes.extend_from_slice(comment.as_bytes());
            bytes.extend_from_slice(&tail);
            let grown = u32::try_from(central_size + comment.len()).unwrap();
            let eocd = eocd + comment.len();
            bytes[eocd + 12..eocd + 16].copy_from_slice(&grown.to_le_bytes());
            return;
        }
        at += 46 + name_len + extra_len + comment_len;
    }
}

/// Deterministic, poorly compressible payload.
pub fn sample_payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state.to_le_bytes()[0]
        })
        .collect()
}

// ── Release source ───────────────────────────────────────────────────────────

pub struct StaticReleases(pub Vec<Release>);

impl ReleaseSource for StaticReleases {
    fn list_releases(&self) -> Result<Vec<Release>> {
        Ok(self.0.clone())
    }
}

pub struct FailingReleases;

impl ReleaseSource for FailingReleases {
    fn list_releases(&self) -> Result<Vec<Release>> {
        anyhow::bail!("GitHub API error: HTTP 500")
    }
}

// ── Downloader ───────────────────────────────────────────────────────────────

/// Serves URLs from local files.
#[derive(Default)]
pub struct FileCopyDownloader {
    files: HashMap<String, PathBuf>,
    pub requested: RefCell<Vec<String>>,
}

impl FileCopyDownloader {
    pub fn serving(url: &str, file: &Path) -> Self {
        let mut files = HashMap::new();
        files.insert(url.to_string(), file.to_path_buf());
        Self {
            files,
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl Downloader for FileCopyDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.requested.borrow_mut().push(url.to_string());
        let Some(source) = self.files.get(url) else {
            anyhow::bail!("HTTP 404 for {url}");
        };
        std::fs::copy(source, dest)?;
        Ok(())
    }
}

// ── Key-value store ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, Vec<u8>>>,
    pub writes: Cell<usize>,
}

impl MemoryStore {
    pub fn with(key: &str, value: &[u8]) -> Self {
        let store = Self::default();
        store
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        store
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn has(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.writes.set(self.writes.get() + 1);
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Claims every key exists but fails every access.
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn has(&self, _: &str) -> bool {
        true
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::other("disk unavailable"),
        })
    }

    fn write(&self, key: &str, _: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::other("disk unavailable"),
        })
    }
}

// ── Installer ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum InstallResult {
    NoUpdate,
    Installed(PathBuf),
    DownloadFailed,
    Rejected,
    RecordFailed,
}

pub struct StubInstaller {
    result: InstallResult,
    pub calls: Cell<usize>,
}

impl StubInstaller {
    pub fn new(result: InstallResult) -> Self {
        Self {
            result,
            calls: Cell::new(0),
        }
    }
}

impl UpdateInstaller for StubInstaller {
    fn fetch_and_install(&self, _current_tag: &str) -> Result<Option<PathBuf>, UpdateError> {
        self.calls.set(self.calls.get() + 1);
        match &self.result {
            InstallResult::NoUpdate => Ok(None),
            InstallResult::Installed(path) => Ok(Some(path.clone())),
            InstallResult::DownloadFailed => Err(UpdateError::Download {
                url: "https://example.invalid/agent.zip".to_string(),
                source: "connection refused".into(),
            }),
            InstallResult::Rejected => Err(UpdateError::VerificationFailed(
                "signature does not match".to_string(),
            )),
            InstallResult::RecordFailed => Err(UpdateError::Store(StoreError::Io {
                key: "currentApp".to_string(),
                source: std::io::Error::other("read-only filesystem"),
            })),
        }
    }
}

// ── Launcher ─────────────────────────────────────────────────────────────────

pub struct RecordingLauncher {
    exit_code: Option<i32>,
    pub calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl RecordingLauncher {
    /// Every launch exits with `code`.
    pub fn exiting(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every launch fails to start.
    pub fn unstartable() -> Self {
        Self {
            exit_code: None,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn run(&self, program: &Path, args: &[String]) -> Result<ExitStatus> {
        self.calls
            .borrow_mut()
            .push((program.to_path_buf(), args.to_vec()));
        match self.exit_code {
            Some(code) => Ok(exit_status(code)),
            None => anyhow::bail!("failed to start {}", program.display()),
        }
    }
}

// ── Telemetry ────────────────────────────────────────────────────────────────

pub struct StaticProvider {
    name: &'static str,
    identity: Option<InstanceId>,
}

impl StaticProvider {
    pub fn resolving(name: &'static str, id: &str) -> Self {
        Self {
            name,
            identity: Some(InstanceId {
                id: id.to_string(),
                cloud: name.to_string(),
                addr: String::new(),
            }),
        }
    }

    pub fn unavailable(name: &'static str) -> Self {
        Self {
            name,
            identity: None,
        }
    }
}

impl IdentityProvider for StaticProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn try_resolve(&self) -> Option<InstanceId> {
        self.identity.clone()
    }
}

pub struct StaticProbe(pub Option<IpAddr>);

impl NetworkProbe for StaticProbe {
    fn outbound_ip(&self) -> Option<IpAddr> {
        self.0
    }
}

pub struct FixedStats(pub MachineStats);

impl StatsCollector for FixedStats {
    fn collect(&self) -> Result<MachineStats> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: RefCell<Vec<InstanceInfo>>,
}

impl TelemetrySink for RecordingSink {
    fn send(&self, info: &InstanceInfo) -> Result<()> {
        self.sent.borrow_mut().push(info.clone());
        Ok(())
    }
}
