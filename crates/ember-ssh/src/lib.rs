// ABOUTME: Ephemeral SSH key material for ember single-use credentials.
// ABOUTME: Provides keypair generation, openssh-key-v1 encoding, and fingerprinting.

//! # ember-ssh
//!
//! Key material for single-use SSH credentials.
//!
//! ## Features
//!
//! - **Key Generation**: Fresh ed25519 keypairs from an injected secure random source
//! - **Encoding**: Byte-exact unencrypted `openssh-key-v1` containers readable by OpenSSH
//! - **Fingerprinting**: SHA256 fingerprints over the SSH wire form of the public key
//!
//! ## Example
//!
//! ```no_run
//! use ember_ssh::{compute_fingerprint, encode_private_key, generate_keypair_os};
//!
//! let keypair = generate_keypair_os().expect("random source should be available");
//! let pem = encode_private_key(&keypair, "single-use certificate", &mut rand::rngs::OsRng)
//!     .expect("key should encode");
//!
//! let fingerprint = compute_fingerprint(keypair.public_key())
//!     .expect("fingerprint should compute");
//! println!("{fingerprint}");
//! println!("{}", pem.as_str());
//! ```

mod encode;
mod error;
mod fingerprint;
mod keypair;
mod wire;

pub use encode::{
    container_bytes, encode_private_key, encode_private_key_with_checkint, padding_len,
    public_key_blob, EncodedPrivateKey, AUTH_MAGIC, DEFAULT_COMMENT, KEY_ALGORITHM, PEM_LABEL,
};
pub use error::{Result, SshError};
pub use fingerprint::compute_fingerprint;
pub use keypair::{
    generate_keypair, generate_keypair_os, KeyPair, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SEED_LEN,
};
pub use wire::{WireReader, WireWriter};
