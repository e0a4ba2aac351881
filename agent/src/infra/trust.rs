//! The compiled-in trust anchor for package verification.
//!
//! # Release
//!
//! [`TRUST_ANCHOR_PEM`] is a development key whose private half was never
//! kept, so no published package verifies against it. Replace it with the
//! release pipeline's public key in the same change that points
//! `DEFAULT_RELEASE_OWNER`/`DEFAULT_RELEASE_REPO` in `domain::config` at
//! the real feed. The key and the feed must move together.

use anyhow::{Context, Result};
use p256::PublicKey;

use crate::domain::signature::decode_public_key;

/// PEM-encoded P-256 public key every installed package must verify
/// against. The matching private key lives with the release pipeline.
pub const TRUST_ANCHOR_PEM: &str = "-----BEGIN PUBLIC KEY-----
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEvrDqkre8Y8CvL1mIhE1eGr21ETmG
WjdSQzZQt+WecGjKVb+I69FD7Ri5q5RiEPvqLl+cU3qI2/HAkM+qOy2NDw==
-----END PUBLIC KEY-----
";

/// Decode [`TRUST_ANCHOR_PEM`].
///
/// # Errors
///
/// Returns an error if the embedded key is not a valid P-256 public key.
pub fn trust_anchor() -> Result<PublicKey> {
    decode_public_key(TRUST_ANCHOR_PEM).context("decoding embedded trust anchor")
}
