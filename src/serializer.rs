//! Length-prefixed little-endian binary codec with an optional Fletcher-16 checksum group.
//!
//! Mirrors the primitive set of `SerializerBackend` in the original implementation:
//! fixed-width integers and floats, bools as one byte, strings as `{len:u64, bytes}`, and a
//! bracketed checksum group that can wrap any sequence of writes/reads.

use crate::error::{CassError, CassResult};
use std::io::{Read, Write};

/// Running Fletcher-16 accumulator, matching the two-sum scheme in `SerializerBackend`.
#[derive(Debug, Default, Clone, Copy)]
struct Fletcher16 {
    sum1: u16,
    sum2: u16,
}

impl Fletcher16 {
    fn push(&mut self, byte: u8) {
        self.sum1 = (self.sum1 + byte as u16) % 255;
        self.sum2 = (self.sum2 + self.sum1) % 255;
    }

    fn checksum(&self) -> u16 {
        (self.sum2 << 8) | self.sum1
    }
}

/// Writes primitives to any `Write`, optionally inside a checksum group.
pub struct Serializer<W: Write> {
    inner: W,
    checksum: Option<Fletcher16>,
}

impl<W: Write> Serializer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            checksum: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Opens a checksum group. Every byte written until `end_checksum_group` contributes to
    /// a running Fletcher-16 sum.
    pub fn start_checksum_group(&mut self) {
        self.checksum = Some(Fletcher16::default());
    }

    /// Closes the checksum group and writes the two-byte sum.
    pub fn end_checksum_group(&mut self) -> CassResult<()> {
        let sum = self
            .checksum
            .take()
            .map(|f| f.checksum())
            .unwrap_or_default();
        self.write_raw(&sum.to_le_bytes())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> CassResult<()> {
        if let Some(chk) = self.checksum.as_mut() {
            for b in bytes {
                chk.push(*b);
            }
        }
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn add_bool(&mut self, v: bool) -> CassResult<()> {
        self.write_raw(&[v as u8])
    }

    pub fn add_u8(&mut self, v: u8) -> CassResult<()> {
        self.write_raw(&[v])
    }

    pub fn add_u16(&mut self, v: u16) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_i16(&mut self, v: i16) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_u32(&mut self, v: u32) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_i32(&mut self, v: i32) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_u64(&mut self, v: u64) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_i64(&mut self, v: i64) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_f32(&mut self, v: f32) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_f64(&mut self, v: f64) -> CassResult<()> {
        self.write_raw(&v.to_le_bytes())
    }

    pub fn add_sizet(&mut self, v: usize) -> CassResult<()> {
        self.add_u64(v as u64)
    }

    pub fn add_string(&mut self, v: &str) -> CassResult<()> {
        self.add_u64(v.len() as u64)?;
        self.write_raw(v.as_bytes())
    }
}

/// Reads primitives from any `Read`, optionally inside a checksum group.
pub struct Deserializer<R: Read> {
    inner: R,
    offset: u64,
    checksum: Option<Fletcher16>,
}

impl<R: Read> Deserializer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            checksum: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn start_checksum_group(&mut self) {
        self.checksum = Some(Fletcher16::default());
    }

    /// Closes the checksum group, reading the stored sum and comparing it against the
    /// running sum of everything read since `start_checksum_group`. Raises `CorruptStream`
    /// on mismatch.
    pub fn end_checksum_group(&mut self) -> CassResult<()> {
        let running = self
            .checksum
            .take()
            .map(|f| f.checksum())
            .unwrap_or_default();
        let mut raw = [0u8; 2];
        self.read_raw_uncounted(&mut raw)?;
        let stored = u16::from_le_bytes(raw);
        if stored != running {
            return Err(CassError::CorruptStream {
                reason: format!("checksum mismatch: stored {stored:#06x}, computed {running:#06x}"),
            });
        }
        Ok(())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> CassResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CassError::Truncated {
                    offset: self.offset,
                    expected: buf.len(),
                    got: 0,
                }
            } else {
                CassError::IoError(e)
            }
        })?;
        self.offset += buf.len() as u64;
        if let Some(chk) = self.checksum.as_mut() {
            for b in buf.iter() {
                chk.push(*b);
            }
        }
        Ok(())
    }

    /// Reads the trailing checksum bytes themselves, which never count toward the sum.
    fn read_raw_uncounted(&mut self, buf: &mut [u8]) -> CassResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                CassError::Truncated {
                    offset: self.offset,
                    expected: buf.len(),
                    got: 0,
                }
            } else {
                CassError::IoError(e)
            }
        })?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn retrieve_bool(&mut self) -> CassResult<bool> {
        let mut b = [0u8; 1];
        self.read_raw(&mut b)?;
        Ok(b[0] != 0)
    }

    pub fn retrieve_u8(&mut self) -> CassResult<u8> {
        let mut b = [0u8; 1];
        self.read_raw(&mut b)?;
        Ok(b[0])
    }

    pub fn retrieve_u16(&mut self) -> CassResult<u16> {
        let mut b = [0u8; 2];
        self.read_raw(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn retrieve_i16(&mut self) -> CassResult<i16> {
        let mut b = [0u8; 2];
        self.read_raw(&mut b)?;
        Ok(i16::from_le_bytes(b))
    }

    pub fn retrieve_u32(&mut self) -> CassResult<u32> {
        let mut b = [0u8; 4];
        self.read_raw(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    pub fn retrieve_i32(&mut self) -> CassResult<i32> {
        let mut b = [0u8; 4];
        self.read_raw(&mut b)?;
        Ok(i32::from_le_bytes(b))
    }

    pub fn retrieve_u64(&mut self) -> CassResult<u64> {
        let mut b = [0u8; 8];
        self.read_raw(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    pub fn retrieve_i64(&mut self) -> CassResult<i64> {
        let mut b = [0u8; 8];
        self.read_raw(&mut b)?;
        Ok(i64::from_le_bytes(b))
    }

    pub fn retrieve_f32(&mut self) -> CassResult<f32> {
        let mut b = [0u8; 4];
        self.read_raw(&mut b)?;
        Ok(f32::from_le_bytes(b))
    }

    pub fn retrieve_f64(&mut self) -> CassResult<f64> {
        let mut b = [0u8; 8];
        self.read_raw(&mut b)?;
        Ok(f64::from_le_bytes(b))
    }

    pub fn retrieve_sizet(&mut self) -> CassResult<usize> {
        Ok(self.retrieve_u64()? as usize)
    }

    pub fn retrieve_string(&mut self) -> CassResult<String> {
        let len = self.retrieve_u64()? as usize;
        let mut buf = vec![0u8; len];
        self.read_raw(&mut buf)?;
        String::from_utf8(buf).map_err(|e| CassError::CorruptStream {
            reason: format!("invalid utf8 string: {e}"),
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_primitives() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new(&mut buf);
            ser.add_u32(42).unwrap();
            ser.add_f64(3.5).unwrap();
            ser.add_string("hello").unwrap();
            ser.add_bool(true).unwrap();
        }
        let mut de = Deserializer::new(Cursor::new(buf));
        assert_eq!(de.retrieve_u32().unwrap(), 42);
        assert_eq!(de.retrieve_f64().unwrap(), 3.5);
        assert_eq!(de.retrieve_string().unwrap(), "hello");
        assert!(de.retrieve_bool().unwrap());
    }

    #[test]
    fn checksum_group_detects_mutation_inside() {
        let mut buf = Vec::new();
        {
            let mut ser = Serializer::new(&mut buf);
            ser.start_checksum_group();
            ser.add_u32(1).unwrap();
            ser.add_u32(2).unwrap();
            ser.end_checksum_group().unwrap();
            ser.add_u32(99).unwrap();
        }
        // mutate a byte inside the checksum group
        buf[0] ^= 0xFF;
        let mut de = Deserializer::new(Cursor::new(buf.clone()));
        de.start_checksum_group();
        de.retrieve_u32().unwrap();
        de.retrieve_u32().unwrap();
        assert!(matches!(
            de.end_checksum_group(),
            Err(CassError::CorruptStream { .. })
        ));

        // a mutation outside the group must not trip the checksum
        let mut buf2 = buf;
        buf2[0] ^= 0xFF; // undo
        let tail_idx = buf2.len() - 1;
        buf2[tail_idx] ^= 0xFF;
        let mut de2 = Deserializer::new(Cursor::new(buf2));
        de2.start_checksum_group();
        de2.retrieve_u32().unwrap();
        de2.retrieve_u32().unwrap();
        assert!(de2.end_checksum_group().is_ok());
    }

    #[test]
    fn short_read_raises_truncated() {
        let buf = vec![1u8, 2];
        let mut de = Deserializer::new(Cursor::new(buf));
        match de.retrieve_u32() {
            Err(CassError::Truncated { .. }) => {}
            other => panic!("expected Truncated, got {other:?}"),
        }
    }
}
