// ABOUTME: Explicit SSH binary encoding helpers (RFC 4251 section 5).
// ABOUTME: Writer appends u32 and length-prefixed fields in order; reader walks them back.

use crate::error::{Result, SshError};
use zeroize::{Zeroize, Zeroizing};

/// Append-only writer for SSH wire format fields.
///
/// Every field is appended in call order. The buffer is zeroized on drop
/// because it routinely holds private key material.
#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes with no length prefix.
    pub fn put_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a big-endian u32.
    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append an SSH string: 4-byte big-endian length followed by the bytes.
    ///
    /// # Errors
    /// Returns `SshError::Encoding` if the field is longer than `u32::MAX`.
    pub fn put_string(&mut self, bytes: impl AsRef<[u8]>) -> Result<&mut Self> {
        let bytes = bytes.as_ref();
        let len = u32::try_from(bytes.len()).map_err(|_| {
            SshError::Encoding(format!("field of {} bytes exceeds u32 length", bytes.len()))
        })?;
        self.put_u32(len);
        self.put_raw(bytes);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes, leaving nothing behind in the writer.
    pub fn into_bytes(mut self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(std::mem::take(&mut self.buf))
    }
}

impl Drop for WireWriter {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// Cursor over SSH wire format fields.
pub struct WireReader<'a> {
    data: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Read exactly `len` raw bytes.
    ///
    /// # Errors
    /// Returns `SshError::Encoding` if fewer than `len` bytes remain.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.data.len() < len {
            return Err(SshError::Encoding(format!(
                "truncated input: wanted {} bytes, {} remain",
                len,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_raw(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a length-prefixed SSH string.
    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_raw(len)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
