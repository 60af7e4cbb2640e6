use crate::core::signature::{PublicKey, Signature, TransactionPayload};
use crate::error::{BlockchainError, Result};
use crate::utils::ecdsa_p256_sha256_sign;
use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use zeroize::Zeroizing;

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

const PRIVATE_KEY_LEN: usize = 32;

// ring emits P-256 keys as a fixed-layout PKCS#8 v1 document: the scalar is the
// OCTET STRING following `version = 1` in the ECPrivateKey, and the public
// point follows the `[1]` context tag.
const PKCS8_LEN: usize = 138;
const PKCS8_SCALAR_HEADER: [u8; 5] = [0x02, 0x01, 0x01, 0x04, 0x20];
const PKCS8_SCALAR_OFFSET: usize = 36;
const PKCS8_PUBLIC_HEADER: [u8; 5] = [0xa1, 0x44, 0x03, 0x42, 0x00];

/// A P-256 key pair and the address derived from it.
#[derive(Clone)]
pub struct Wallet {
    private_key: Zeroizing<Vec<u8>>,
    public_key: PublicKey,
}

impl Wallet {
    /// Creates a wallet around a freshly generated key pair.
    pub fn generate() -> Result<Wallet> {
        let pkcs8 = Zeroizing::new(crate::utils::new_key_pair()?);
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng)
                .map_err(|e| {
                    BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
                })?;
        let public_key = PublicKey::from_sec1(key_pair.public_key().as_ref())?;
        let private_key = private_scalar_from_pkcs8(pkcs8.as_ref())?;
        Ok(Wallet {
            private_key,
            public_key,
        })
    }

    /// Rebuilds a wallet from its hex private scalar and `X || Y` public key.
    ///
    /// Short private keys (leading zero bytes dropped) are left-padded.
    pub fn from_hex(private_key: &str, public_key: &str) -> Result<Wallet> {
        let public_key = PublicKey::from_hex(public_key)?;
        let padded = format!("{:0>width$}", private_key, width = 2 * PRIVATE_KEY_LEN);
        if padded.len() != 2 * PRIVATE_KEY_LEN {
            return Err(BlockchainError::Crypto(format!(
                "Private key must be at most {} hex characters",
                2 * PRIVATE_KEY_LEN
            )));
        }
        let private_key = Zeroizing::new(
            HEXLOWER_PERMISSIVE
                .decode(padded.as_bytes())
                .map_err(|e| BlockchainError::Crypto(format!("Invalid private key hex: {e}")))?,
        );

        // Reject a scalar that does not belong to the given public key
        let rng = SystemRandom::new();
        EcdsaKeyPair::from_private_key_and_public_key(
            &ECDSA_P256_SHA256_FIXED_SIGNING,
            private_key.as_ref(),
            &public_key.to_sec1(),
            &rng,
        )
        .map_err(|e| BlockchainError::Crypto(format!("Key pair mismatch: {e}")))?;

        Ok(Wallet {
            private_key,
            public_key,
        })
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    pub fn private_key_hex(&self) -> String {
        HEXLOWER.encode(self.private_key.as_ref())
    }

    /// Signs the canonical bytes of `payload`.
    pub fn sign(&self, payload: &TransactionPayload) -> Result<Signature> {
        let signature = ecdsa_p256_sha256_sign(
            self.private_key.as_ref(),
            &self.public_key.to_sec1(),
            &payload.canonical_bytes(),
        )?;
        Signature::from_bytes(&signature)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn private_scalar_from_pkcs8(pkcs8: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let scalar_end = PKCS8_SCALAR_OFFSET + PRIVATE_KEY_LEN;
    if pkcs8.len() != PKCS8_LEN
        || pkcs8[PKCS8_SCALAR_OFFSET - PKCS8_SCALAR_HEADER.len()..PKCS8_SCALAR_OFFSET]
            != PKCS8_SCALAR_HEADER
        || pkcs8[scalar_end..scalar_end + PKCS8_PUBLIC_HEADER.len()] != PKCS8_PUBLIC_HEADER
    {
        return Err(BlockchainError::Crypto(
            "Unexpected PKCS#8 layout for a P-256 key".to_string(),
        ));
    }
    Ok(Zeroizing::new(
        pkcs8[PKCS8_SCALAR_OFFSET..scalar_end].to_vec(),
    ))
}

/// Derives the base58 address of a public key:
/// SHA-256 → RIPEMD-160 → version byte → double SHA-256 checksum → base58.
///
/// The hash input is `X || Y` with each coordinate as its minimal big-endian
/// bytes, so a coordinate that starts with zero bytes hashes shorter.
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    let (x, y) = public_key
        .coordinates()
        .split_at(public_key.coordinates().len() / 2);
    let mut key_bytes = Vec::with_capacity(x.len() + y.len());
    key_bytes.extend_from_slice(strip_leading_zeros(x));
    key_bytes.extend_from_slice(strip_leading_zeros(y));
    let pub_key_hash = hash_pub_key(&key_bytes);
    convert_address(pub_key_hash.as_slice())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = crate::utils::sha256_digest(pub_key);
    crate::utils::ripemd160_digest(pub_key_sha256.as_slice())
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = crate::utils::sha256_digest(payload);
    let second_sha = crate::utils::sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

pub fn validate_address(address: &str) -> bool {
    let payload = match crate::utils::base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false, // Invalid base58 encoding
    };

    // Check if payload is long enough
    if payload.len() < ADDRESS_CHECK_SUM_LEN + 1 {
        return false;
    }

    let (versioned, actual_checksum) = payload.split_at(payload.len() - ADDRESS_CHECK_SUM_LEN);
    checksum(versioned).as_slice() == actual_checksum
}

pub fn convert_address(pub_hash_key: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![];
    payload.push(VERSION);
    payload.extend(pub_hash_key);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    // version + pub_key_hash + checksum
    crate::utils::base58_encode(payload.as_slice())
}
