// ABOUTME: SSH public key fingerprint computation.
// ABOUTME: SHA256 over the SSH wire form of an ed25519 public key, hex encoded.

use crate::encode::public_key_blob;
use crate::error::Result;
use crate::keypair::PUBLIC_KEY_LEN;
use sha2::{Digest, Sha256};

/// Compute SHA256 fingerprint of a raw ed25519 public key (hex encoded, lowercase).
///
/// Hashes the same wire form embedded in the private key container:
///
/// - Algorithm name as SSH string (4-byte length prefix + "ssh-ed25519")
/// - Key data as SSH string (4-byte length prefix + 32-byte public key)
///
/// # Returns
/// A 64-character lowercase hex string.
pub fn compute_fingerprint(public_key: &[u8; PUBLIC_KEY_LEN]) -> Result<String> {
    let wire_data = public_key_blob(public_key)?;

    let mut hasher = Sha256::new();
    hasher.update(&wire_data);
    Ok(hex::encode(hasher.finalize()))
}
