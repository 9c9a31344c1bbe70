//! Binary save stream.
//!
//! Save data is a flat little-endian sequence of primitives in a fixed,
//! order-dependent layout per entity. Entities write presence flags before
//! optional payloads; [`OutputStream::write_bools`] packs up to eight flags
//! into one byte.
//!
//! Reading never panics: a short or inconsistent buffer yields
//! [`GameError::StreamTruncated`] or [`GameError::CorruptSave`].

use crate::error::{GameError, Result};
use crate::math::Fixed;

/// Growable output buffer.
#[derive(Debug, Default, Clone)]
pub struct OutputStream {
    buffer: Vec<u8>,
}

impl OutputStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Consume the stream, returning the written bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a `u8`.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write an `i8`.
    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i16`.
    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i64`.
    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a bool as one byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write a fixed-point value as its raw bits.
    pub fn write_fixed(&mut self, value: Fixed) {
        self.write_i64(value.to_bits());
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    /// Write flags packed eight per byte, first flag in the lowest bit.
    pub fn write_bools(&mut self, flags: &[bool]) {
        for chunk in flags.chunks(8) {
            let packed = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, &flag)| acc | (u8::from(flag) << bit));
            self.write_u8(packed);
        }
    }

    /// Write a count-prefixed list of `u32`.
    pub fn write_u32_vec(&mut self, values: &[u32]) {
        self.write_u32(values.len() as u32);
        for &value in values {
            self.write_u32(value);
        }
    }
}

/// Cursor over a borrowed save buffer.
#[derive(Debug, Clone)]
pub struct InputStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> InputStream<'a> {
    /// Start reading at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(GameError::StreamTruncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a `u8`.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an `i8`.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Read an `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read an `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a bool; any value other than 0 or 1 is corrupt.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GameError::CorruptSave(format!("invalid bool byte {other}"))),
        }
    }

    /// Read a fixed-point value.
    pub fn read_fixed(&mut self) -> Result<Fixed> {
        Ok(Fixed::from_bits(self.read_i64()?))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| GameError::CorruptSave(format!("invalid string: {e}")))
    }

    /// Read `N` flags written by [`OutputStream::write_bools`].
    pub fn read_bools<const N: usize>(&mut self) -> Result<[bool; N]> {
        let mut flags = [false; N];
        for (chunk_index, chunk) in flags.chunks_mut(8).enumerate() {
            let packed = self.read_u8()?;
            if chunk.len() < 8 && packed >> chunk.len() != 0 {
                return Err(GameError::CorruptSave(format!(
                    "unused flag bits set in flag byte {chunk_index}"
                )));
            }
            for (bit, flag) in chunk.iter_mut().enumerate() {
                *flag = packed & (1 << bit) != 0;
            }
        }
        Ok(flags)
    }

    /// Read an element count, rejecting counts the buffer cannot hold.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_element_size) > self.remaining() {
            return Err(GameError::CorruptSave(format!(
                "element count {count} exceeds remaining data"
            )));
        }
        Ok(count)
    }

    /// Read a count-prefixed list of `u32`.
    pub fn read_u32_vec(&mut self) -> Result<Vec<u32>> {
        let count = self.read_count(4)?;
        (0..count).map(|_| self.read_u32()).collect()
    }
}
