//! Fixed-size byte records with named field views.
//!
//! A [Field] names a little-endian unsigned integer of 1 to 4 bytes at a fixed
//! offset. Each record kind publishes a static table of its fields; there is no
//! runtime discovery of accessors.

use byteorder::{ByteOrder, LittleEndian};
use std::ops::Range;

/// How the integer stored in a field is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Plain unsigned value
    Int,
    /// 1-based index into a string pool, 0 meaning "no string"
    StringIndex,
}

/// A named window into a record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub encoding: Encoding,
    /// Bits forced on every write
    pub set_bits: u32,
    /// Written once when the record is built
    pub read_only: bool,
}

impl Field {
    pub const fn int(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
            encoding: Encoding::Int,
            set_bits: 0,
            read_only: false,
        }
    }

    pub const fn string(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            width: 1,
            encoding: Encoding::StringIndex,
            set_bits: 0,
            read_only: false,
        }
    }

    pub const fn with_set_bits(mut self, bits: u32) -> Self {
        self.set_bits = bits;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.width
    }

    pub fn covers(&self, pos: usize) -> bool {
        self.range().contains(&pos)
    }

    fn mask(&self) -> u64 {
        (1u64 << (8 * self.width)) - 1
    }
}

/// Zero-initialized byte buffer whose length never changes through field writes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    buf: Vec<u8>,
}

impl Record {
    pub fn zeroed(len: usize) -> Self {
        Self { buf: vec![0; len] }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Decode a field as little-endian unsigned
    pub fn get(&self, field: &Field) -> u32 {
        LittleEndian::read_uint(&self.buf[field.range()], field.width) as u32
    }

    /// Encode a field, truncating `value` to the field width
    pub fn put(&mut self, field: &Field, value: u32) {
        let v = u64::from(value | field.set_bits) & field.mask();
        LittleEndian::write_uint(&mut self.buf[field.range()], v, field.width);
    }
}
