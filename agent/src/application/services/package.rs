//! Application service: release tooling: key generation and signed
//! package creation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::PackageFormat;
use crate::domain::signature::{self, encode_private_key, encode_public_key};
use crate::domain::KeyPair;

/// PEM text of a freshly generated key pair.
pub struct GeneratedKeys {
    pub private_pem: String,
    pub public_pem: String,
}

/// Generate a signing key pair and encode both halves.
///
/// # Errors
///
/// Returns an error if key generation or encoding fails.
pub fn generate_keys() -> Result<GeneratedKeys> {
    let pair = KeyPair::generate().context("generating key pair")?;
    Ok(GeneratedKeys {
        private_pem: encode_private_key(pair.secret_key()).context("encoding private key")?,
        public_pem: encode_public_key(&pair.public_key()).context("encoding public key")?,
    })
}

/// Sign `input`, pack it into `output`, then verify the written package
/// against the public half of `private_pem`.
///
/// # Errors
///
/// Returns an error if the key is invalid, a file cannot be read or
/// written, or the written package does not verify.
pub fn create_package(
    format: &impl PackageFormat,
    input: &Path,
    output: &Path,
    private_pem: &str,
) -> Result<()> {
    let secret = signature::decode_private_key(private_pem).context("loading private key")?;
    let payload =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let signature = signature::sign(&payload, &secret).context("signing payload")?;
    let archive = format
        .pack(input, &signature)
        .with_context(|| format!("packing {}", input.display()))?;
    std::fs::write(output, archive).with_context(|| format!("writing {}", output.display()))?;
    format
        .verify_archive(output, &secret.public_key())
        .with_context(|| format!("verifying {}", output.display()))?;
    Ok(())
}
