//! Package command: build a signed release package.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::application::services::package::create_package;
use crate::infra::archive::SignedZip;

/// Arguments for the package command.
#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Binary to sign and pack
    #[arg(long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Package to write
    #[arg(long = "out", value_name = "ZIP")]
    pub output: PathBuf,

    /// PEM-encoded private key
    #[arg(long = "priv", value_name = "PEM")]
    pub private_key: PathBuf,
}

/// Sign, pack and self-verify; prints `OK` on success.
///
/// # Errors
///
/// Returns an error if the key cannot be read or the package cannot be
/// built or does not verify.
pub fn run(args: &PackageArgs) -> Result<()> {
    let private_pem = std::fs::read_to_string(&args.private_key)
        .with_context(|| format!("reading {}", args.private_key.display()))?;
    create_package(&SignedZip, &args.input, &args.output, &private_pem)?;
    println!("OK");
    Ok(())
}
