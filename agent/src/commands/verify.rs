//! Verify command: check a package against a public key.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::application::ports::PackageFormat;
use crate::domain::signature::decode_public_key;
use crate::infra::archive::SignedZip;
use crate::infra::trust::trust_anchor;

/// Arguments for the verify command.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Package to verify
    pub package: PathBuf,

    /// PEM-encoded public key [default: the embedded release key]
    #[arg(long = "pub", value_name = "PEM")]
    pub public_key: Option<PathBuf>,
}

/// Verify `args.package`; prints `OK` on success.
///
/// # Errors
///
/// Returns an error if the key cannot be loaded or the package does not
/// verify.
pub fn run(args: &VerifyArgs) -> Result<()> {
    let key = match &args.public_key {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            decode_public_key(&pem).with_context(|| format!("loading {}", path.display()))?
        }
        None => trust_anchor()?,
    };
    SignedZip
        .verify_archive(&args.package, &key)
        .with_context(|| format!("verifying {}", args.package.display()))?;
    println!("OK");
    Ok(())
}
