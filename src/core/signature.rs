//! ECDSA P-256 signatures over a transaction's economic fields
//!
//! A signature covers `{product, currency, value}` only. Sender and recipient
//! are deliberately outside it: the HTTP boundary fixes the recipient, and the
//! non-native conversion rewrites the sender.

use crate::error::{BlockchainError, Result};
use crate::utils::{ecdsa_p256_sha256_sign_verify, to_canonical_vec};
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::Serialize;

/// Length of one affine coordinate or one signature half, in bytes
const COMPONENT_LEN: usize = 32;

/// Uncompressed SEC1 point tag
const SEC1_UNCOMPRESSED: u8 = 0x04;

fn decode_fixed_pair(hex: &str, what: &str) -> Result<[u8; 2 * COMPONENT_LEN]> {
    if hex.len() != 4 * COMPONENT_LEN {
        return Err(BlockchainError::Crypto(format!(
            "{what} must be {} hex characters, got {}",
            4 * COMPONENT_LEN,
            hex.len()
        )));
    }
    let bytes = HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Invalid {what} hex: {e}")))?;
    let mut out = [0u8; 2 * COMPONENT_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A P-256 public key held as its affine coordinates `X || Y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    xy: [u8; 2 * COMPONENT_LEN],
}

impl PublicKey {
    /// Parses the 128-character `X || Y` hex form used on the wire.
    pub fn from_hex(hex: &str) -> Result<PublicKey> {
        Ok(PublicKey {
            xy: decode_fixed_pair(hex, "public key")?,
        })
    }

    /// Accepts an uncompressed SEC1 point (`0x04 || X || Y`).
    pub fn from_sec1(point: &[u8]) -> Result<PublicKey> {
        if point.len() != 1 + 2 * COMPONENT_LEN || point[0] != SEC1_UNCOMPRESSED {
            return Err(BlockchainError::Crypto(
                "Public key is not an uncompressed P-256 point".to_string(),
            ));
        }
        let mut xy = [0u8; 2 * COMPONENT_LEN];
        xy.copy_from_slice(&point[1..]);
        Ok(PublicKey { xy })
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.xy)
    }

    /// `X || Y`, each coordinate zero-padded to 32 bytes.
    pub fn coordinates(&self) -> &[u8] {
        &self.xy
    }

    pub fn to_sec1(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.xy.len());
        point.push(SEC1_UNCOMPRESSED);
        point.extend_from_slice(&self.xy);
        point
    }
}

/// Fixed-width `R || S` ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    rs: [u8; 2 * COMPONENT_LEN],
}

impl Signature {
    pub fn from_hex(hex: &str) -> Result<Signature> {
        Ok(Signature {
            rs: decode_fixed_pair(hex, "signature")?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != 2 * COMPONENT_LEN {
            return Err(BlockchainError::Crypto(format!(
                "Signature must be {} bytes, got {}",
                2 * COMPONENT_LEN,
                bytes.len()
            )));
        }
        let mut rs = [0u8; 2 * COMPONENT_LEN];
        rs.copy_from_slice(bytes);
        Ok(Signature { rs })
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.rs)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.rs
    }
}

/// The signed portion of a transaction. Serializes as the exact object the
/// signer hashes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPayload {
    product: String,
    currency: String,
    value: f32,
}

impl TransactionPayload {
    pub fn new(product: impl Into<String>, currency: impl Into<String>, value: f32) -> Self {
        TransactionPayload {
            product: product.into(),
            currency: currency.into(),
            value,
        }
    }

    /// `{"product":…,"currency":…,"value":…}` exactly as the signer hashed it.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        to_canonical_vec(self)
    }

    pub fn verify(&self, public_key: &PublicKey, signature: &Signature) -> bool {
        ecdsa_p256_sha256_sign_verify(
            &public_key.to_sec1(),
            signature.as_bytes(),
            &self.canonical_bytes(),
        )
    }
}
