//! Bit-addressed reads over an in-memory packet.
//!
//! Positions are in bits from the packet start. Little-endian fields fill
//! each byte from its least significant bit, big-endian from its most
//! significant bit.

use super::types::ByteOrder;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// A read would cross the readable limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfBounds {
    /// Bit position of the failed read
    pub offset: u64,
}

pub struct BitReader<'a> {
    data: &'a [u8],
    pos: u64,
    limit: u64,
}

impl<'a> BitReader<'a> {
    /// Reader over the whole of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limit: data.len() as u64 * 8,
        }
    }

    /// Restrict reads to the first `limit` bits (clamped to the data length)
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit.min(self.data.len() as u64 * 8);
        self
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.pos)
    }

    /// Advance to the next multiple of `align` bits
    pub fn align(&mut self, align: u32) -> Result<(), OutOfBounds> {
        let align = u64::from(align.max(1));
        let aligned = self.pos.div_ceil(align) * align;
        if aligned > self.limit {
            return Err(OutOfBounds { offset: self.pos });
        }
        self.pos = aligned;
        Ok(())
    }

    fn ensure(&self, bits: u64) -> Result<(), OutOfBounds> {
        if self.pos + bits > self.limit {
            Err(OutOfBounds { offset: self.pos })
        } else {
            Ok(())
        }
    }

    /// Read an unsigned integer of `size` bits (1..=64)
    pub fn read_uint(&mut self, size: u32, order: ByteOrder) -> Result<u64, OutOfBounds> {
        let bits = u64::from(size);
        self.ensure(bits)?;

        let value = if self.pos % 8 == 0 && size % 8 == 0 {
            let start = (self.pos / 8) as usize;
            let len = (size / 8) as usize;
            let bytes = &self.data[start..start + len];
            match order {
                ByteOrder::Big => BigEndian::read_uint(bytes, len),
                _ => LittleEndian::read_uint(bytes, len),
            }
        } else {
            let mut value = 0u64;
            for i in 0..bits {
                let at = self.pos + i;
                let byte = self.data[(at / 8) as usize];
                match order {
                    ByteOrder::Big => {
                        let bit = (byte >> (7 - at % 8)) & 1;
                        value = (value << 1) | u64::from(bit);
                    }
                    _ => {
                        let bit = (byte >> (at % 8)) & 1;
                        value |= u64::from(bit) << i;
                    }
                }
            }
            value
        };

        self.pos += bits;
        Ok(value)
    }

    /// Read a signed integer of `size` bits, sign-extended to 64
    pub fn read_int(&mut self, size: u32, order: ByteOrder) -> Result<i64, OutOfBounds> {
        let raw = self.read_uint(size, order)?;
        let shift = 64 - size;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Read `len` whole bytes; the position must be byte aligned
    pub fn read_bytes(&mut self, len: u64) -> Result<&'a [u8], OutOfBounds> {
        self.align(8)?;
        self.ensure(len * 8)?;
        let start = (self.pos / 8) as usize;
        let data: &'a [u8] = self.data;
        self.pos += len * 8;
        Ok(&data[start..start + len as usize])
    }

    /// Read a NUL-terminated string (terminator consumed, not returned)
    pub fn read_cstr(&mut self) -> Result<&'a [u8], OutOfBounds> {
        self.align(8)?;
        let start = (self.pos / 8) as usize;
        let end = (self.limit / 8) as usize;
        let data: &'a [u8] = self.data;
        let len = data[start..end]
            .iter()
            .position(|&b| b == 0)
            .ok_or(OutOfBounds { offset: self.pos })?;
        self.pos += (len as u64 + 1) * 8;
        Ok(&data[start..start + len])
    }
}
