//! Signed zip packages: implements `PackageFormat`.
//!
//! A package is a zip archive with exactly one file entry. The entry's
//! per-file comment holds the serialized signature over the entry's
//! decompressed bytes.
//!
//! Reading goes through the `zip` crate. The writer emits the single-entry
//! layout directly (local header, deflate stream, central directory record
//! with the comment, end record) because the `zip` writer cannot attach
//! per-entry comments.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use p256::PublicKey;
use zip::ZipArchive;

use crate::application::ports::{EntryInfo, ExtractedEntry, PackageFormat};
use crate::domain::signature::{self, Signature};
use crate::domain::ArchiveError;

// ── Zip layout constants ──────────────────────────────────────────────────────

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
/// 2.0: deflate.
const VERSION_NEEDED: u16 = 20;
/// Upper byte 3 marks unix external attributes.
const VERSION_MADE_BY_UNIX: u16 = (3 << 8) | VERSION_NEEDED;
/// Bit 11: name and comment are UTF-8.
const FLAG_UTF8: u16 = 1 << 11;
const METHOD_DEFLATE: u16 = 8;
const S_IFREG: u32 = 0o100_000;
/// Extracted files never get execute bits from the package.
const EXTRACT_MODE_MASK: u32 = 0o666;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Prefix of the throwaway directory used by [`SignedZip::verify_archive`].
const VERIFY_DIR_PREFIX: &str = "fleetwatch-verify-";

/// Production implementation of `PackageFormat`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignedZip;

impl PackageFormat for SignedZip {
    fn pack(&self, source: &Path, signature: &Signature) -> Result<Vec<u8>, ArchiveError> {
        pack(source, signature)
    }

    fn list_entries(&self, archive: &Path) -> Result<Vec<EntryInfo>, ArchiveError> {
        list_entries(archive)
    }

    fn unpack(
        &self,
        archive: &Path,
        target_dir: &Path,
        name_prefix: &str,
    ) -> Result<Vec<ExtractedEntry>, ArchiveError> {
        unpack(archive, target_dir, name_prefix)
    }

    fn verify_extracted(
        &self,
        entry: &ExtractedEntry,
        trust_anchor: &PublicKey,
    ) -> Result<(), ArchiveError> {
        verify_extracted(entry, trust_anchor)
    }

    fn verify_archive(&self, archive: &Path, trust_anchor: &PublicKey) -> Result<(), ArchiveError> {
        verify_archive(archive, trust_anchor)
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Build a single-entry package from `source`.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if `source` cannot be read and
/// [`ArchiveError::Malformed`] if it has no usable base name or exceeds the
/// zip32 size limits.
pub fn pack(source: &Path, signature: &Signature) -> Result<Vec<u8>, ArchiveError> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ArchiveError::Malformed(format!("{} has no UTF-8 file name", source.display()))
        })?;
    let payload = fs::read(source)?;
    let meta = fs::metadata(source)?;
    let comment = signature
        .to_json()
        .map_err(|e| ArchiveError::Malformed(e.to_string()))?;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    let compressed = encoder.finish()?;

    let (dos_time, dos_date) = dos_datetime(meta.modified().map(DateTime::<Utc>::from).ok());
    let entry = EntryHeader {
        name,
        comment: &comment,
        crc: crc32fast::hash(&payload),
        compressed_size: zip32("compressed size", compressed.len())?,
        uncompressed_size: zip32("file size", payload.len())?,
        dos_time,
        dos_date,
        mode: file_mode(&meta),
    };
    entry.check_field_lengths()?;

    let mut out = Vec::with_capacity(compressed.len() + 256);
    entry.write_local_header(&mut out);
    out.extend_from_slice(&compressed);
    let central_offset = zip32("archive size", out.len())?;
    entry.write_central_header(&mut out);
    let central_size = zip32("central directory", out.len())? - central_offset;
    write_end_of_central_dir(&mut out, central_size, central_offset);
    Ok(out)
}

struct EntryHeader<'a> {
    name: &'a str,
    comment: &'a str,
    crc: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    dos_time: u16,
    dos_date: u16,
    mode: u32,
}

impl EntryHeader<'_> {
    fn check_field_lengths(&self) -> Result<(), ArchiveError> {
        if u16::try_from(self.name.len()).is_err() || u16::try_from(self.comment.len()).is_err() {
            return Err(ArchiveError::Malformed(
                "entry name or signature too long for a zip header".to_string(),
            ));
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)] // lengths checked in check_field_lengths
    fn write_local_header(&self, out: &mut Vec<u8>) {
        put_u32(out, LOCAL_HEADER_SIG);
        put_u16(out, VERSION_NEEDED);
        put_u16(out, FLAG_UTF8);
        put_u16(out, METHOD_DEFLATE);
        put_u16(out, self.dos_time);
        put_u16(out, self.dos_date);
        put_u32(out, self.crc);
        put_u32(out, self.compressed_size);
        put_u32(out, self.uncompressed_size);
        put_u16(out, self.name.len() as u16);
        put_u16(out, 0); // extra field length
        out.extend_from_slice(self.name.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)] // lengths checked in check_field_lengths
    fn write_central_header(&self, out: &mut Vec<u8>) {
        put_u32(out, CENTRAL_HEADER_SIG);
        put_u16(out, VERSION_MADE_BY_UNIX);
        put_u16(out, VERSION_NEEDED);
        put_u16(out, FLAG_UTF8);
        put_u16(out, METHOD_DEFLATE);
        put_u16(out, self.dos_time);
        put_u16(out, self.dos_date);
        put_u32(out, self.crc);
        put_u32(out, self.compressed_size);
        put_u32(out, self.uncompressed_size);
        put_u16(out, self.name.len() as u16);
        put_u16(out, 0); // extra field length
        put_u16(out, self.comment.len() as u16);
        put_u16(out, 0); // disk number start
        put_u16(out, 0); // internal attributes
        put_u32(out, (S_IFREG | self.mode) << 16);
        put_u32(out, 0); // local header offset: the only entry starts the file
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(self.comment.as_bytes());
    }
}

fn write_end_of_central_dir(out: &mut Vec<u8>, central_size: u32, central_offset: u32) {
    put_u32(out, END_OF_CENTRAL_DIR_SIG);
    put_u16(out, 0); // this disk
    put_u16(out, 0); // disk with central directory
    put_u16(out, 1); // entries on this disk
    put_u16(out, 1); // total entries
    put_u32(out, central_size);
    put_u32(out, central_offset);
    put_u16(out, 0); // archive comment length
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn zip32(what: &str, len: usize) -> Result<u32, ArchiveError> {
    u32::try_from(len)
        .map_err(|_| ArchiveError::Malformed(format!("{what} exceeds the zip32 limit")))
}

/// MS-DOS time and date words. Times before 1980 clamp to 1980-01-01.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dos_datetime(modified: Option<DateTime<Utc>>) -> (u16, u16) {
    let Some(ts) = modified.filter(|ts| (1980..=2107).contains(&ts.year())) else {
        return (0, (1 << 5) | 1);
    };
    let time = (ts.hour() << 11) | (ts.minute() << 5) | (ts.second() / 2);
    let date = (((ts.year() - 1980) as u32) << 9) | (ts.month() << 5) | ts.day();
    (time as u16, date as u16)
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}

// ── Reading ───────────────────────────────────────────────────────────────────

fn open(archive: &Path) -> Result<ZipArchive<File>, ArchiveError> {
    let file = File::open(archive)?;
    ZipArchive::new(file).map_err(|e| ArchiveError::Malformed(e.to_string()))
}

/// List non-directory entries with their comments.
///
/// # Errors
///
/// Returns [`ArchiveError::Malformed`] if the archive cannot be parsed.
pub fn list_entries(archive: &Path) -> Result<Vec<EntryInfo>, ArchiveError> {
    let mut zip = open(archive)?;
    let mut entries = Vec::new();
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .map_err(|e| ArchiveError::Malformed(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        entries.push(EntryInfo {
            name: entry.name().to_string(),
            comment: entry.comment().to_string(),
        });
    }
    Ok(entries)
}

/// Extract all entries into `target_dir`, prefixing file names.
///
/// # Errors
///
/// See [`PackageFormat::unpack`].
pub fn unpack(
    archive: &Path,
    target_dir: &Path,
    name_prefix: &str,
) -> Result<Vec<ExtractedEntry>, ArchiveError> {
    let mut zip = open(archive)?;
    let mut extracted = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ArchiveError::Malformed(e.to_string()))?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ArchiveError::Malformed(format!("entry '{}' escapes the target", entry.name()))
            })?;

        if entry.is_dir() {
            fs::create_dir_all(target_dir.join(&relative))?;
            continue;
        }

        let dest = prefixed_path(target_dir, &relative, name_prefix)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mode = entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE) & EXTRACT_MODE_MASK;
        let name = entry.name().to_string();
        let comment = entry.comment().to_string();

        let mut out = create_file(&dest, mode)?;
        copy_payload(&mut entry, &mut out, &name)?;
        out.sync_all()?;

        extracted.push(ExtractedEntry {
            name,
            path: dest,
            comment,
        });
    }
    Ok(extracted)
}

fn prefixed_path(target_dir: &Path, relative: &Path, prefix: &str) -> Result<PathBuf, ArchiveError> {
    let file_name = relative
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|_| relative.components().all(|c| matches!(c, Component::Normal(_))))
        .ok_or_else(|| {
            ArchiveError::Malformed(format!("unusable entry name '{}'", relative.display()))
        })?;
    let parent = relative.parent().unwrap_or_else(|| Path::new(""));
    Ok(target_dir.join(parent).join(format!("{prefix}{file_name}")))
}

#[cfg(unix)]
fn create_file(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    // An existing file keeps its old mode through `open`; reset it.
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_file(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Copy an entry's payload, telling read-side failures (bad CRC, broken
/// deflate stream) apart from write-side filesystem failures.
fn copy_payload(entry: &mut impl Read, out: &mut File, name: &str) -> Result<(), ArchiveError> {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::Integrity(format!("entry '{name}': {e}"))),
        };
        out.write_all(&buf[..n])?;
    }
}

// ── Verification ──────────────────────────────────────────────────────────────

/// Verify an extracted payload against the signature from its entry
/// comment.
///
/// # Errors
///
/// Returns [`ArchiveError::VerificationFailed`] if the comment is empty,
/// not a signature, or does not match; [`ArchiveError::Io`] if the payload
/// cannot be read.
pub fn verify_extracted(entry: &ExtractedEntry, trust_anchor: &PublicKey) -> Result<(), ArchiveError> {
    if entry.comment.trim().is_empty() {
        return Err(ArchiveError::VerificationFailed(format!(
            "entry '{}' carries no signature",
            entry.name
        )));
    }
    let sig = Signature::from_json(&entry.comment).map_err(|e| {
        ArchiveError::VerificationFailed(format!("entry '{}': {e}", entry.name))
    })?;
    let payload = fs::read(&entry.path)?;
    if !signature::verify(&payload, trust_anchor, &sig) {
        return Err(ArchiveError::VerificationFailed(format!(
            "signature does not match contents of '{}'",
            entry.name
        )));
    }
    Ok(())
}

/// Structural and cryptographic check of a whole package.
///
/// # Errors
///
/// See [`PackageFormat::verify_archive`].
pub fn verify_archive(archive: &Path, trust_anchor: &PublicKey) -> Result<(), ArchiveError> {
    let entries = list_entries(archive)?;
    if entries.len() != 1 {
        return Err(ArchiveError::Malformed(format!(
            "expected exactly one file in package, found {}",
            entries.len()
        )));
    }
    let scratch = tempfile::Builder::new()
        .prefix(VERIFY_DIR_PREFIX)
        .tempdir()?;
    let extracted = unpack(archive, scratch.path(), "")?;
    let [entry] = extracted.as_slice() else {
        return Err(ArchiveError::Malformed(format!(
            "expected exactly one extracted file, found {}",
            extracted.len()
        )));
    };
    verify_extracted(entry, trust_anchor)
}
