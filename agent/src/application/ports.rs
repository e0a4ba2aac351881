//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::cli`.
//!
//! Everything here is synchronous: the agent does one blocking step at a
//! time on the calling thread.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::Result;
use p256::PublicKey;

use crate::domain::{
    ArchiveError, InstanceId, InstanceInfo, MachineStats, Release, Signature, StoreError,
    UpdateError,
};

// ── Release feed ──────────────────────────────────────────────────────────────

/// Provider of published release metadata.
pub trait ReleaseSource {
    /// List every release, consuming all pages. Order is whatever the
    /// provider returns.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched or parsed.
    fn list_releases(&self) -> Result<Vec<Release>>;
}

/// Fetches a URL into a local file.
pub trait Downloader {
    /// Write the body of `url` to `dest`, replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or when
    /// `dest` cannot be written.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

// ── Persistent state ──────────────────────────────────────────────────────────

/// Durable small-blob storage keyed by name.
///
/// Accessed read-then-write without cross-process locking; one agent per
/// host is assumed.
pub trait KeyValueStore {
    /// Whether `key` currently holds a value.
    fn has(&self, key: &str) -> bool;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the key was never written, or
    /// [`StoreError::Io`] when it cannot be read.
    fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the value cannot be persisted.
    fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

// ── Package container ─────────────────────────────────────────────────────────

/// A non-directory entry as listed from a package, without its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    /// Authentication metadata travelling with the entry.
    pub comment: String,
}

/// A file written to disk by [`PackageFormat::unpack`], still paired with
/// the metadata that authenticates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    /// Entry name inside the package.
    pub name: String,
    /// Where the payload was written, including the name prefix.
    pub path: PathBuf,
    pub comment: String,
}

/// Container that carries one signed payload.
///
/// Callers never touch the container's byte layout, so a different way of
/// attaching the signature can be swapped in behind this trait.
pub trait PackageFormat {
    /// Build a package holding `source` under its base name, authenticated
    /// by `signature`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if `source` cannot be read, or
    /// [`ArchiveError::Malformed`] if it cannot be represented.
    fn pack(&self, source: &Path, signature: &Signature) -> Result<Vec<u8>, ArchiveError>;

    /// List non-directory entries without extracting payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Malformed`] if the container cannot be parsed.
    fn list_entries(&self, archive: &Path) -> Result<Vec<EntryInfo>, ArchiveError>;

    /// Extract every entry into `target_dir`, prefixing file names with
    /// `name_prefix`. Directory entries are created unprefixed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Malformed`] for unparseable containers or
    /// entries escaping `target_dir`, [`ArchiveError::Integrity`] when a
    /// payload fails its integrity check, and [`ArchiveError::Io`] when the
    /// filesystem refuses the write.
    fn unpack(
        &self,
        archive: &Path,
        target_dir: &Path,
        name_prefix: &str,
    ) -> Result<Vec<ExtractedEntry>, ArchiveError>;

    /// Check an extracted payload against its metadata and `trust_anchor`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::VerificationFailed`] when the signature is
    /// absent, malformed, or does not match.
    fn verify_extracted(
        &self,
        entry: &ExtractedEntry,
        trust_anchor: &PublicKey,
    ) -> Result<(), ArchiveError>;

    /// Check a whole package: exactly one file, whose payload verifies
    /// against `trust_anchor`. Extraction goes to a throwaway directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Malformed`] unless exactly one file entry
    /// exists, and [`ArchiveError::VerificationFailed`] or
    /// [`ArchiveError::Integrity`] when the payload is not authentic.
    fn verify_archive(&self, archive: &Path, trust_anchor: &PublicKey) -> Result<(), ArchiveError>;
}

// ── Update installation ───────────────────────────────────────────────────────

/// Installs newer builds; implemented by the update service.
pub trait UpdateInstaller {
    /// Install the best newer release, returning its path, or `None` when
    /// no update is available.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] describing the first failed step.
    fn fetch_and_install(&self, current_tag: &str) -> Result<Option<PathBuf>, UpdateError>;
}

/// Starts the installed binary and waits for it.
pub trait ProcessLauncher {
    /// Run `program` with `args` to completion.
    ///
    /// A process that starts and exits, with any exit code, is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the process cannot be started.
    fn run(&self, program: &Path, args: &[String]) -> Result<ExitStatus>;
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// One way of discovering the host's stable identity.
pub trait IdentityProvider {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Resolve the identity, or `None` when this provider does not apply.
    fn try_resolve(&self) -> Option<InstanceId>;
}

/// Abstracts network address discovery so services can be tested without
/// real network access.
pub trait NetworkProbe {
    /// The local address used for outbound traffic, if any.
    fn outbound_ip(&self) -> Option<IpAddr>;
}

/// Gathers host statistics.
pub trait StatsCollector {
    /// Take one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a required statistic is unavailable.
    fn collect(&self) -> Result<MachineStats>;
}

/// Delivers a telemetry document to the reporting endpoint.
pub trait TelemetrySink {
    /// Send `info`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    fn send(&self, info: &InstanceInfo) -> Result<()>;
}
