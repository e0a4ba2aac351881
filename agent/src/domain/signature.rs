//! Signature engine: ECDSA over P-256, PEM key codecs, signature JSON.
//!
//! Both sides sign the lowercase hex text of the message's SHA-256 digest,
//! not the raw digest bytes. The 64-byte hex string is handed to ECDSA as
//! the prehash and truncated to the curve order's bit length, which is what
//! every standard ECDSA implementation does with an oversized hash. Changing
//! either side breaks every package signed so far.

use num_bigint::BigUint;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{FieldBytes, PublicKey, SecretKey};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::SignatureError;

/// Byte length of a P-256 scalar.
const SCALAR_LEN: usize = 32;

/// Random draws allowed before giving up on finding a scalar in `[1, n)`.
const KEYGEN_ATTEMPTS: usize = 8;

// ── Keys ──────────────────────────────────────────────────────────────────────

/// A P-256 private scalar together with its public point.
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the operating system's CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Crypto`] if the random source fails.
    pub fn generate() -> Result<Self, SignatureError> {
        let mut bytes = FieldBytes::default();
        for _ in 0..KEYGEN_ATTEMPTS {
            OsRng
                .try_fill_bytes(&mut bytes)
                .map_err(|e| SignatureError::Crypto(format!("random source failed: {e}")))?;
            if let Ok(secret) = SecretKey::from_bytes(&bytes) {
                return Ok(Self { secret });
            }
        }
        Err(SignatureError::Crypto(
            "random source kept producing out-of-range scalars".to_string(),
        ))
    }

    /// Wrap an existing private key.
    #[must_use]
    pub fn from_secret(secret: SecretKey) -> Self {
        Self { secret }
    }

    #[must_use]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// The public point, always derived from the private scalar.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }
}

/// Encode a private key as a PKCS#8 `PRIVATE KEY` PEM document.
///
/// # Errors
///
/// Returns [`SignatureError::KeyFormat`] if DER encoding fails.
pub fn encode_private_key(secret: &SecretKey) -> Result<String, SignatureError> {
    secret
        .to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| SignatureError::KeyFormat(e.to_string()))
}

/// Decode a P-256 private key from PEM.
///
/// Accepts PKCS#8 `PRIVATE KEY`, SEC1 `EC PRIVATE KEY`, and SEC1 DER
/// carried under a `PRIVATE KEY` label (emitted by older signing tools).
///
/// # Errors
///
/// Returns [`SignatureError::KeyFormat`] if the input is not PEM or does not
/// hold a P-256 private key.
pub fn decode_private_key(pem: &str) -> Result<SecretKey, SignatureError> {
    let (label, der) = pem_rfc7468::decode_vec(pem.trim().as_bytes())
        .map_err(|e| SignatureError::KeyFormat(format!("not a PEM document: {e}")))?;
    let secret = match label {
        "EC PRIVATE KEY" => SecretKey::from_sec1_der(&der).ok(),
        "PRIVATE KEY" => SecretKey::from_pkcs8_der(&der)
            .ok()
            .or_else(|| SecretKey::from_sec1_der(&der).ok()),
        other => {
            return Err(SignatureError::KeyFormat(format!(
                "unexpected PEM label '{other}'"
            )));
        }
    };
    secret.ok_or_else(|| {
        SignatureError::KeyFormat("PEM block does not hold a P-256 private key".to_string())
    })
}

/// Encode a public key as a SubjectPublicKeyInfo `PUBLIC KEY` PEM document.
///
/// # Errors
///
/// Returns [`SignatureError::KeyFormat`] if DER encoding fails.
pub fn encode_public_key(public: &PublicKey) -> Result<String, SignatureError> {
    public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| SignatureError::KeyFormat(e.to_string()))
}

/// Decode a P-256 public key from a `PUBLIC KEY` PEM document.
///
/// # Errors
///
/// Returns [`SignatureError::KeyFormat`] on malformed PEM/DER or when the key
/// belongs to another algorithm or curve.
pub fn decode_public_key(pem: &str) -> Result<PublicKey, SignatureError> {
    PublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| SignatureError::KeyFormat(format!("not a P-256 public key: {e}")))
}

// ── Signatures ────────────────────────────────────────────────────────────────

/// An ECDSA signature as its two integer components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

/// Wire form: decimal strings, so no JSON number precision is ever involved.
#[derive(Serialize, Deserialize)]
struct SignatureDto {
    r: String,
    s: String,
}

impl Signature {
    /// Serialize as `{"r": "<decimal>", "s": "<decimal>"}` with a one-space
    /// indent.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::SignatureFormat`] if JSON encoding fails.
    pub fn to_json(&self) -> Result<String, SignatureError> {
        let dto = SignatureDto {
            r: self.r.to_str_radix(10),
            s: self.s.to_str_radix(10),
        };
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        dto.serialize(&mut ser)
            .map_err(|e| SignatureError::SignatureFormat(e.to_string()))?;
        String::from_utf8(out).map_err(|e| SignatureError::SignatureFormat(e.to_string()))
    }

    /// Parse the JSON form produced by [`Signature::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::SignatureFormat`] if the text is not the
    /// expected JSON object or either field is not a decimal integer.
    pub fn from_json(text: &str) -> Result<Self, SignatureError> {
        let dto: SignatureDto = serde_json::from_str(text)
            .map_err(|e| SignatureError::SignatureFormat(e.to_string()))?;
        Ok(Self {
            r: parse_decimal("r", &dto.r)?,
            s: parse_decimal("s", &dto.s)?,
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<BigUint, SignatureError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SignatureError::SignatureFormat(format!(
            "field '{field}' is not a decimal integer"
        )));
    }
    BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| {
        SignatureError::SignatureFormat(format!("field '{field}' is not a decimal integer"))
    })
}

/// Lowercase hex text of the message's SHA-256 digest.
#[must_use]
pub fn digest_text(message: &[u8]) -> String {
    format!("{:x}", Sha256::digest(message))
}

/// Sign `message` with `secret`.
///
/// # Errors
///
/// Returns [`SignatureError::Crypto`] if the curve operation fails.
pub fn sign(message: &[u8], secret: &SecretKey) -> Result<Signature, SignatureError> {
    let signing_key = SigningKey::from(secret);
    let digest = digest_text(message);
    let signature: EcdsaSignature = signing_key
        .sign_prehash(digest.as_bytes())
        .map_err(|e| SignatureError::Crypto(e.to_string()))?;
    let (r, s) = signature.split_bytes();
    Ok(Signature {
        r: BigUint::from_bytes_be(&r),
        s: BigUint::from_bytes_be(&s),
    })
}

/// Check `signature` over `message` against `public`.
///
/// Out-of-range or otherwise unusable components yield `false`, never an
/// error.
#[must_use]
pub fn verify(message: &[u8], public: &PublicKey, signature: &Signature) -> bool {
    let (Some(r), Some(s)) = (scalar_bytes(&signature.r), scalar_bytes(&signature.s)) else {
        return false;
    };
    let Ok(signature) = EcdsaSignature::from_scalars(r, s) else {
        return false;
    };
    VerifyingKey::from(public)
        .verify_prehash(digest_text(message).as_bytes(), &signature)
        .is_ok()
}

fn scalar_bytes(value: &BigUint) -> Option<FieldBytes> {
    let raw = value.to_bytes_be();
    if raw.len() > SCALAR_LEN {
        return None;
    }
    let mut out = FieldBytes::default();
    out[SCALAR_LEN - raw.len()..].copy_from_slice(&raw);
    Some(out)
}
