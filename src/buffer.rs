//! Bounded scratch serializer for chunk payloads.
//!
//! The writer assembles every payload in one reusable scratch region before
//! handing it to the raw layer. The region has a hard capacity; exceeding it
//! is a caller error (`NotEnoughMemory`), not a silent reallocation. The
//! writer sizes the region up front from the largest payload any defined
//! signal can produce.

use crate::error::{JlsError, Result};
use crate::format::STRING_TERMINATOR;

/// Minimum scratch capacity in bytes.
pub const SCRATCH_SIZE_MIN: usize = 1 << 20;

/// A fixed scratch region with a moving cursor and little-endian primitive
/// writers. This layer never logs.
pub struct Serializer {
    buf: Vec<u8>,
    capacity: usize,
}

impl Serializer {
    pub fn new() -> Self {
        Self::with_capacity(SCRATCH_SIZE_MIN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(SCRATCH_SIZE_MIN);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Raise the capacity. Existing content is preserved.
    pub fn grow_to(&mut self, capacity: usize) {
        if capacity > self.capacity {
            self.buf.reserve(capacity - self.buf.len());
            self.capacity = capacity;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    fn ensure(&mut self, additional: usize) -> Result<()> {
        if self.buf.len() + additional > self.capacity {
            return Err(JlsError::NotEnoughMemory("serializer scratch exhausted"));
        }
        Ok(())
    }

    pub fn wr_zero(&mut self, count: usize) -> Result<()> {
        self.ensure(count)?;
        self.buf.resize(self.buf.len() + count, 0);
        Ok(())
    }

    pub fn wr_u8(&mut self, value: u8) -> Result<()> {
        self.ensure(1)?;
        self.buf.push(value);
        Ok(())
    }

    pub fn wr_u16(&mut self, value: u16) -> Result<()> {
        self.wr_bin(&value.to_le_bytes())
    }

    pub fn wr_u32(&mut self, value: u32) -> Result<()> {
        self.wr_bin(&value.to_le_bytes())
    }

    pub fn wr_u64(&mut self, value: u64) -> Result<()> {
        self.wr_bin(&value.to_le_bytes())
    }

    pub fn wr_i64(&mut self, value: i64) -> Result<()> {
        self.wr_bin(&value.to_le_bytes())
    }

    pub fn wr_f32(&mut self, value: f32) -> Result<()> {
        self.wr_bin(&value.to_le_bytes())
    }

    pub fn wr_bin(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a UTF-8 string terminated by `{0x00, 0x1F}`.
    pub fn wr_str(&mut self, value: &str) -> Result<()> {
        self.ensure(value.len() + STRING_TERMINATOR.len())?;
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(&STRING_TERMINATOR);
        Ok(())
    }
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_little_endian() {
        let mut s = Serializer::new();
        s.wr_u8(0x01).unwrap();
        s.wr_u16(0x0302).unwrap();
        s.wr_u32(0x07060504).unwrap();
        s.wr_u64(0x0f0e0d0c0b0a0908).unwrap();
        s.wr_i64(-1).unwrap();
        s.wr_f32(1.0).unwrap();
        let expect: Vec<u8> = (1u8..=15)
            .chain([0xff; 8])
            .chain([0x00, 0x00, 0x80, 0x3f])
            .collect();
        assert_eq!(s.as_slice(), &expect[..]);
    }

    #[test]
    fn test_string_terminator() {
        let mut s = Serializer::new();
        s.wr_str("hi").unwrap();
        s.wr_str("").unwrap();
        assert_eq!(s.as_slice(), &[b'h', b'i', 0x00, 0x1f, 0x00, 0x1f]);
    }

    #[test]
    fn test_zero_and_clear() {
        let mut s = Serializer::new();
        s.wr_zero(5).unwrap();
        assert_eq!(s.len(), 5);
        assert_eq!(s.as_slice(), &[0u8; 5]);
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut s = Serializer::with_capacity(SCRATCH_SIZE_MIN);
        s.wr_zero(SCRATCH_SIZE_MIN).unwrap();
        let err = s.wr_u8(0).unwrap_err();
        assert!(matches!(err, JlsError::NotEnoughMemory(_)));
        // the failed write must not advance the cursor
        assert_eq!(s.len(), SCRATCH_SIZE_MIN);
    }

    #[test]
    fn test_grow_to() {
        let mut s = Serializer::new();
        s.grow_to(SCRATCH_SIZE_MIN * 2);
        s.wr_zero(SCRATCH_SIZE_MIN + 1).unwrap();
        assert_eq!(s.len(), SCRATCH_SIZE_MIN + 1);
    }
}
