//! Byte-level reader and writer for the demo wire format.
//!
//! Everything multi-byte in a demo file is little-endian regardless of host
//! byte order. A float is the bit pattern of a 32-bit little-endian read.

use std::io::{BufRead, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::DemoError;

/// Longest NUL-terminated string accepted in a message, excluding the NUL.
pub const MAX_STRING_LENGTH: usize = 2047;

/// Sequential reader over a demo byte source.
///
/// Tracks the number of consumed bytes, which feeds the progress sink and
/// never runs backwards. The only lookahead is the one-byte peek used for
/// end-of-input detection at block boundaries.
pub struct WireReader<'a> {
    inner: &'a mut dyn BufRead,
    position: u64,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over a `BufRead` instance.
    pub fn new(inner: &'a mut dyn BufRead) -> Self {
        WireReader { inner, position: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the next byte without consuming it, or `None` at end of
    /// input.
    pub fn peek_u8(&mut self) -> Result<Option<u8>, DemoError> {
        let buf = self.inner.fill_buf().map_err(|_| DemoError::UnexpectedEof)?;
        Ok(buf.first().copied())
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, DemoError> {
        let v = self.inner.read_u8().map_err(|_| DemoError::UnexpectedEof)?;
        self.position += 1;
        Ok(v)
    }

    /// Reads an unsigned 16-bit little-endian integer.
    pub fn read_u16(&mut self) -> Result<u16, DemoError> {
        let v = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(|_| DemoError::UnexpectedEof)?;
        self.position += 2;
        Ok(v)
    }

    /// Reads an unsigned 32-bit little-endian integer.
    pub fn read_u32(&mut self) -> Result<u32, DemoError> {
        let v = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(|_| DemoError::UnexpectedEof)?;
        self.position += 4;
        Ok(v)
    }

    /// Reads a 32-bit float as the bit pattern of a little-endian `u32`.
    pub fn read_f32(&mut self) -> Result<f32, DemoError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads exactly `buf.len()` bytes.
    pub fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<(), DemoError> {
        self.inner
            .read_exact(buf)
            .map_err(|_| DemoError::UnexpectedEof)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Appends exactly `n` bytes to `out`.
    pub fn append_exact(&mut self, out: &mut Vec<u8>, n: usize) -> Result<(), DemoError> {
        if n == 0 {
            return Ok(());
        }

        let start = out.len();
        out.resize(start + n, 0);
        self.read_exact_into(&mut out[start..])
    }

    /// Appends bytes up to and including a terminating NUL to `out`, and
    /// returns the number of bytes appended.
    ///
    /// The terminator must arrive within [`MAX_STRING_LENGTH`] non-NUL
    /// bytes.
    pub fn read_cstring(&mut self, out: &mut Vec<u8>) -> Result<usize, DemoError> {
        let mut appended = 0;

        loop {
            let b = self.read_u8()?;
            out.push(b);
            appended += 1;

            if b == 0 {
                return Ok(appended);
            }
            if appended > MAX_STRING_LENGTH {
                return Err(DemoError::Corrupt(format!(
                    "string not terminated within {} bytes",
                    MAX_STRING_LENGTH
                )));
            }
        }
    }
}

/// Sequential writer for the demo wire format.
pub struct WireWriter<'a> {
    inner: &'a mut dyn Write,
}

impl<'a> WireWriter<'a> {
    /// Creates a writer over a `Write` instance.
    pub fn new(inner: &'a mut dyn Write) -> Self {
        WireWriter { inner }
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, v: u8) -> Result<(), DemoError> {
        self.inner.write_u8(v).map_err(DemoError::CannotWrite)
    }

    /// Writes an unsigned 32-bit integer, little-endian.
    pub fn write_u32(&mut self, v: u32) -> Result<(), DemoError> {
        self.inner
            .write_u32::<LittleEndian>(v)
            .map_err(DemoError::CannotWrite)
    }

    /// Writes a 32-bit float as its bit pattern, little-endian.
    pub fn write_f32(&mut self, v: f32) -> Result<(), DemoError> {
        self.write_u32(v.to_bits())
    }

    /// Writes a byte slice in full.
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), DemoError> {
        self.inner.write_all(buf).map_err(DemoError::CannotWrite)
    }
}
