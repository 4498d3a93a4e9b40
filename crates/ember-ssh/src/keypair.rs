// ABOUTME: Ephemeral ed25519 keypair generation from an injected secure random source.
// ABOUTME: Keys live only in memory and are zeroized when dropped.

use crate::error::{Result, SshError};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{ZeroizeOnDrop, Zeroizing};

/// Length of a raw ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;
/// Length of an ed25519 seed.
pub const SEED_LEN: usize = 32;
/// Length of the private key in OpenSSH form: seed followed by public key.
pub const PRIVATE_KEY_LEN: usize = SEED_LEN + PUBLIC_KEY_LEN;

/// A single-use ed25519 keypair.
///
/// `private_key` follows the OpenSSH convention of the 32-byte seed
/// concatenated with the 32-byte public key.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    public_key: [u8; PUBLIC_KEY_LEN],
    private_key: [u8; PRIVATE_KEY_LEN],
}

impl KeyPair {
    /// Derive a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self {
            public_key: signing_key.verifying_key().to_bytes(),
            private_key: signing_key.to_keypair_bytes(),
        }
    }

    /// Rebuild a keypair from raw bytes, checking lengths and that both halves agree.
    ///
    /// # Errors
    /// Returns `SshError::Encoding` if a length is wrong or the public key
    /// does not belong to the seed.
    pub fn from_bytes(public_key: &[u8], private_key: &[u8]) -> Result<Self> {
        let public_key: [u8; PUBLIC_KEY_LEN] = public_key.try_into().map_err(|_| {
            SshError::Encoding(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                public_key.len()
            ))
        })?;
        if private_key.len() != PRIVATE_KEY_LEN {
            return Err(SshError::Encoding(format!(
                "private key must be {} bytes, got {}",
                PRIVATE_KEY_LEN,
                private_key.len()
            )));
        }

        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&private_key[..SEED_LEN]);
        let keypair = Self::from_seed(&seed);

        if keypair.public_key != public_key || keypair.private_key[..] != private_key[..] {
            return Err(SshError::Encoding(
                "public key does not match private key seed".to_string(),
            ));
        }
        Ok(keypair)
    }

    /// Raw 32-byte public key.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// 64-byte private key (seed ‖ public key).
    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_LEN] {
        &self.private_key
    }

    /// The 32-byte seed half of the private key.
    pub fn seed(&self) -> &[u8] {
        &self.private_key[..SEED_LEN]
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a fresh ed25519 keypair from the given secure random source.
///
/// Each call draws a new seed, so concurrent callers never share key material.
///
/// # Errors
/// Returns `SshError::RandomSource` if the random source fails.
pub fn generate_keypair<R: RngCore + CryptoRng>(rng: &mut R) -> Result<KeyPair> {
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    rng.try_fill_bytes(&mut seed[..]).map_err(SshError::RandomSource)?;
    Ok(KeyPair::from_seed(&seed))
}

/// Generate a fresh ed25519 keypair from the operating system's random source.
pub fn generate_keypair_os() -> Result<KeyPair> {
    generate_keypair(&mut OsRng)
}
