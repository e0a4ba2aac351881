//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

/// Boxed collaborator error carried as a `#[source]`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Signature engine errors ───────────────────────────────────────────────────

/// Errors raised by key handling, signing and signature (de)serialization.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("invalid key: {0}")]
    KeyFormat(String),

    #[error("invalid signature encoding: {0}")]
    SignatureFormat(String),
}

// ── Archive errors ────────────────────────────────────────────────────────────

/// Errors raised by the authenticated package container.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("malformed package: {0}")]
    Malformed(String),

    /// Entry payload failed the container's own integrity check (CRC or
    /// compressed stream) while being read.
    #[error("package payload is corrupt: {0}")]
    Integrity(String),

    #[error("package verification failed: {0}")]
    VerificationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ── Key-value store errors ────────────────────────────────────────────────────

/// Errors raised by the persistent key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has never been written. A normal outcome, not a failure.
    #[error("key '{0}' not found")]
    NotFound(String),

    #[error("invalid store key '{0}': only [A-Za-z0-9._-] are allowed")]
    InvalidKey(String),

    #[error("store I/O failed for key '{key}'")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Update errors ─────────────────────────────────────────────────────────────

/// Errors raised while discovering, fetching and installing an update.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("release lookup failed")]
    ReleaseSource(#[source] BoxError),

    #[error("release tag '{0}' cannot be used as a file name prefix")]
    UnsafeTag(String),

    #[error("download of {url} failed")]
    Download {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("corrupt package: {0}")]
    CorruptPackage(String),

    #[error("package verification failed: {0}")]
    VerificationFailed(String),

    #[error("update I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("recording installed application failed")]
    Store(#[from] StoreError),
}

impl From<ArchiveError> for UpdateError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Malformed(msg) => Self::CorruptPackage(msg),
            ArchiveError::Integrity(msg) | ArchiveError::VerificationFailed(msg) => {
                Self::VerificationFailed(msg)
            }
            ArchiveError::Io(e) => Self::Io(e),
        }
    }
}

impl UpdateError {
    /// Returns `true` for failures that must never be downgraded into
    /// "install anyway".
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::VerificationFailed(_))
    }
}
