// ABOUTME: Byte-exact openssh-key-v1 encoding of an unencrypted ed25519 private key.
// ABOUTME: Writes every field explicitly, pads the private block, and wraps it in PEM armor.

use crate::error::{Result, SshError};
use crate::keypair::{KeyPair, PUBLIC_KEY_LEN, SEED_LEN};
use crate::wire::WireWriter;
use base64::Engine;
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

/// Magic prefix of the container: "openssh-key-v1" followed by a NUL byte.
pub const AUTH_MAGIC: &[u8; 15] = b"openssh-key-v1\0";

/// SSH algorithm name for ed25519 keys.
pub const KEY_ALGORITHM: &str = "ssh-ed25519";

/// Label of the PEM armor around the container.
pub const PEM_LABEL: &str = "OPENSSH PRIVATE KEY";

/// Comment attached to single-use keys when the caller has none.
pub const DEFAULT_COMMENT: &str = "single-use certificate";

const CIPHER_NONE: &str = "none";
const KDF_NONE: &str = "none";

// ssh-keygen aligns unencrypted private blocks to 8 bytes.
const BLOCK_SIZE: usize = 8;

// Base64 line width used by ssh-keygen.
const LINE_WIDTH: usize = 70;

const PADDING: [u8; BLOCK_SIZE - 1] = [1, 2, 3, 4, 5, 6, 7];

/// An encoded private key container in PEM armor.
///
/// The text is zeroized when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPrivateKey {
    pem: Zeroizing<String>,
}

impl EncodedPrivateKey {
    pub fn as_str(&self) -> &str {
        &self.pem
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.pem.as_bytes()
    }

    /// Decode the armor back into the raw container bytes.
    ///
    /// # Errors
    /// Returns `SshError::Encoding` if the armor or base64 body is malformed.
    pub fn to_container_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let begin = format!("-----BEGIN {}-----", PEM_LABEL);
        let end = format!("-----END {}-----", PEM_LABEL);

        let mut lines = self.pem.lines();
        if lines.next() != Some(begin.as_str()) {
            return Err(SshError::Encoding("missing PEM begin line".to_string()));
        }

        let mut body = Zeroizing::new(String::new());
        let mut terminated = false;
        for line in lines {
            if line == end {
                terminated = true;
                break;
            }
            body.push_str(line.trim());
        }
        if !terminated {
            return Err(SshError::Encoding("missing PEM end line".to_string()));
        }

        base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .map(Zeroizing::new)
            .map_err(|e| SshError::Encoding(format!("invalid base64 body: {}", e)))
    }
}

impl fmt::Debug for EncodedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPrivateKey")
            .field("pem", &"<redacted>")
            .finish()
    }
}

/// Number of padding bytes needed to align a private block of `unpadded_len` bytes.
///
/// Always in `0..=7`.
pub fn padding_len(unpadded_len: usize) -> usize {
    (BLOCK_SIZE - (unpadded_len % BLOCK_SIZE)) % BLOCK_SIZE
}

/// SSH wire form of an ed25519 public key: algorithm name then key bytes,
/// both as SSH strings.
pub fn public_key_blob(public_key: &[u8; PUBLIC_KEY_LEN]) -> Result<Vec<u8>> {
    let mut writer = WireWriter::new();
    writer.put_string(KEY_ALGORITHM)?.put_string(public_key)?;
    Ok(writer.as_bytes().to_vec())
}

/// Encode a keypair with check integers drawn from `rng`.
///
/// # Errors
/// Returns `SshError::RandomSource` if the random source fails, or
/// `SshError::Encoding` if the keypair violates an internal invariant.
pub fn encode_private_key<R: RngCore + CryptoRng>(
    keypair: &KeyPair,
    comment: &str,
    rng: &mut R,
) -> Result<EncodedPrivateKey> {
    let mut check = [0u8; 4];
    rng.try_fill_bytes(&mut check).map_err(SshError::RandomSource)?;
    encode_private_key_with_checkint(keypair, comment, u32::from_be_bytes(check))
}

/// Encode a keypair using a fixed check integer. Deterministic for identical inputs.
pub fn encode_private_key_with_checkint(
    keypair: &KeyPair,
    comment: &str,
    checkint: u32,
) -> Result<EncodedPrivateKey> {
    let container = container_bytes(keypair, comment, checkint)?;
    Ok(EncodedPrivateKey {
        pem: armor(&container),
    })
}

/// Assemble the raw openssh-key-v1 container.
///
/// Layout: magic, cipher, kdf, kdf options, key count, public key record,
/// private key block. The last two are embedded as SSH strings.
pub fn container_bytes(
    keypair: &KeyPair,
    comment: &str,
    checkint: u32,
) -> Result<Zeroizing<Vec<u8>>> {
    let public_record = public_key_blob(keypair.public_key())?;
    let private_block = private_key_block(keypair, comment, checkint)?;

    let mut writer = WireWriter::new();
    writer.put_raw(AUTH_MAGIC);
    writer
        .put_string(CIPHER_NONE)?
        .put_string(KDF_NONE)?
        .put_string("")?
        .put_u32(1);
    writer
        .put_string(&public_record)?
        .put_string(&private_block[..])?;

    Ok(writer.into_bytes())
}

fn private_key_block(
    keypair: &KeyPair,
    comment: &str,
    checkint: u32,
) -> Result<Zeroizing<Vec<u8>>> {
    if keypair.private_key()[SEED_LEN..] != keypair.public_key()[..] {
        return Err(SshError::Encoding(
            "private key does not end with its public key".to_string(),
        ));
    }

    let mut block = WireWriter::new();
    block.put_u32(checkint).put_u32(checkint);
    block
        .put_string(KEY_ALGORITHM)?
        .put_string(keypair.public_key())?
        .put_string(keypair.private_key())?
        .put_string(comment)?;

    let pad = padding_len(block.len());
    block.put_raw(&PADDING[..pad]);

    if block.len() % BLOCK_SIZE != 0 {
        return Err(SshError::Encoding(format!(
            "private block of {} bytes is not aligned to {}",
            block.len(),
            BLOCK_SIZE
        )));
    }

    Ok(block.into_bytes())
}

fn armor(container: &[u8]) -> Zeroizing<String> {
    let body = Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(container));
    let begin = format!("-----BEGIN {}-----\n", PEM_LABEL);
    let end = format!("-----END {}-----\n", PEM_LABEL);

    let line_count = body.len().div_ceil(LINE_WIDTH);
    let mut pem = String::with_capacity(begin.len() + body.len() + line_count + end.len());
    pem.push_str(&begin);
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        pem.extend(line.iter().map(|&b| b as char));
        pem.push('\n');
    }
    pem.push_str(&end);

    Zeroizing::new(pem)
}
