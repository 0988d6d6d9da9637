use super::varint::{get_varint, put_varint, varint_len};
use crate::error::{DuskError, Result};

/// Longest string the one-byte length prefix can describe
pub const MAX_STRING_LEN: usize = 255;

/// Growable output buffer for record serialization
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_varint(&mut self, value: u64) {
        put_varint(&mut self.buf, value);
    }

    /// Append a length-prefixed string; strings over 255 bytes are rejected
    pub fn put_str(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_STRING_LEN {
            return Err(DuskError::StringTooLong(bytes.len()));
        }
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
        Ok(())
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

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over a stored value
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(|| {
            DuskError::Corrupt(format!("unexpected end of record at offset {}", self.pos))
        })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(DuskError::Corrupt(format!(
                "record truncated at offset {}: need {} bytes, have {}",
                self.pos,
                n,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Read one varint, never looking past the length announced by its first byte
    pub fn get_varint(&mut self) -> Result<u64> {
        let first = *self.data.get(self.pos).ok_or_else(|| {
            DuskError::Corrupt(format!("missing varint at offset {}", self.pos))
        })?;
        let bytes = self.read_bytes(varint_len(first))?;
        let (value, _) = get_varint(bytes)?;
        Ok(value)
    }

    pub fn get_string(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DuskError::Corrupt(format!("invalid UTF-8 in string of {} bytes", len)))
    }
}
