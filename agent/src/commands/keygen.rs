//! Keygen command: print a fresh signing key pair.

use anyhow::Result;

use crate::application::services::package::generate_keys;

/// Print the private key PEM followed by the public key PEM.
///
/// # Errors
///
/// Returns an error if key generation fails.
pub fn run() -> Result<()> {
    let keys = generate_keys()?;
    print!("{}", keys.private_pem);
    print!("{}", keys.public_pem);
    Ok(())
}
