use std::cmp::Ordering;

use crate::cell::{Cell, HashBytes};
use crate::error::Error;
use crate::util::{byte_len, get_bit, unlikely};

/// A read cursor over a [`Cell`].
///
/// A slice is a window `(bits_start..bits_end, refs_start..refs_end)` into
/// the cell content. Reads advance the window start by exactly the consumed
/// amount or fail with [`Error::SliceUnderrun`] without advancing, so
/// callers are free to branch on a failed read when parsing optional
/// fields. A slice shares no mutable state with its cell.
#[derive(Clone, PartialEq)]
pub struct CellSlice {
    cell: Cell,
    bits_start: u16,
    bits_end: u16,
    refs_start: u8,
    refs_end: u8,
}

impl From<Cell> for CellSlice {
    #[inline]
    fn from(cell: Cell) -> Self {
        Self::new(cell)
    }
}

impl CellSlice {
    /// Creates a slice over the full cell content.
    pub fn new(cell: Cell) -> Self {
        let bits_end = cell.bit_len();
        let refs_end = cell.reference_count();
        Self {
            cell,
            bits_start: 0,
            bits_end,
            refs_start: 0,
            refs_end,
        }
    }

    /// Returns the underlying cell.
    #[inline]
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Returns the number of bits left in the window.
    #[inline]
    pub fn remaining_bits(&self) -> u16 {
        self.bits_end - self.bits_start
    }

    /// Returns the number of references left in the window.
    #[inline]
    pub fn remaining_refs(&self) -> u8 {
        self.refs_end - self.refs_start
    }

    /// Returns whether there are no bits left.
    #[inline]
    pub fn is_data_empty(&self) -> bool {
        self.bits_start >= self.bits_end
    }

    /// Returns whether there are no references left.
    #[inline]
    pub fn is_refs_empty(&self) -> bool {
        self.refs_start >= self.refs_end
    }

    /// Returns whether both data and references are exhausted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_data_empty() && self.is_refs_empty()
    }

    /// Reads the bit at the specified offset without advancing.
    pub fn get_bit(&self, offset: u16) -> Result<bool, Error> {
        let index = self.bits_start + offset;
        if unlikely(index >= self.bits_end) {
            return Err(Error::SliceUnderrun);
        }
        Ok(get_bit(self.cell.data(), index))
    }

    /// Reads a single bit, advancing the cursor.
    pub fn load_bit(&mut self) -> Result<bool, Error> {
        let bit = ok!(self.get_bit(0));
        self.bits_start += 1;
        Ok(bit)
    }

    /// Reads a fixed-width unsigned integer of up to 64 bits.
    pub fn load_uint(&mut self, bits: u16) -> Result<u64, Error> {
        if unlikely(bits > 64) {
            return Err(Error::IntOverflow);
        }
        if unlikely(self.remaining_bits() < bits) {
            return Err(Error::SliceUnderrun);
        }
        let mut result = 0u64;
        for i in 0..bits {
            result = (result << 1) | get_bit(self.cell.data(), self.bits_start + i) as u64;
        }
        self.bits_start += bits;
        Ok(result)
    }

    /// Reads a fixed-width two's complement integer of up to 64 bits.
    pub fn load_int(&mut self, bits: u16) -> Result<i64, Error> {
        let raw = ok!(self.load_uint(bits));
        if bits == 0 || bits == 64 {
            return Ok(raw as i64);
        }
        let shift = 64 - bits;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Reads an 8-bit unsigned integer.
    #[inline]
    pub fn load_u8(&mut self) -> Result<u8, Error> {
        self.load_uint(8).map(|value| value as u8)
    }

    /// Reads a 16-bit unsigned integer.
    #[inline]
    pub fn load_u16(&mut self) -> Result<u16, Error> {
        self.load_uint(16).map(|value| value as u16)
    }

    /// Reads a 32-bit unsigned integer.
    #[inline]
    pub fn load_u32(&mut self) -> Result<u32, Error> {
        self.load_uint(32).map(|value| value as u32)
    }

    /// Reads a 64-bit unsigned integer.
    #[inline]
    pub fn load_u64(&mut self) -> Result<u64, Error> {
        self.load_uint(64)
    }

    /// Reads a 256-bit hash.
    pub fn load_u256(&mut self) -> Result<HashBytes, Error> {
        let bytes = ok!(self.load_raw(256));
        let mut result = HashBytes::ZERO;
        result.0.copy_from_slice(&bytes);
        Ok(result)
    }

    /// Reads a raw MSB-aligned bit string of the specified length.
    pub fn load_raw(&mut self, bits: u16) -> Result<Vec<u8>, Error> {
        if unlikely(self.remaining_bits() < bits) {
            return Err(Error::SliceUnderrun);
        }
        let mut result = vec![0u8; byte_len(bits)];
        for i in 0..bits {
            if get_bit(self.cell.data(), self.bits_start + i) {
                result[(i / 8) as usize] |= 1 << (7 - i % 8);
            }
        }
        self.bits_start += bits;
        Ok(result)
    }

    /// Reads a variable-width unsigned integer with at most
    /// `max_bytes` payload bytes.
    ///
    /// The length prefix occupies `ceil(log2(max_bytes))` bits; a zero
    /// length means a zero value with no payload.
    pub fn load_var_uint(&mut self, max_bytes: u16) -> Result<u128, Error> {
        let prefix = len_bits(max_bytes);
        let bytes = ok!(self.load_uint(prefix));
        if bytes > 16 {
            return Err(Error::IntOverflow);
        }
        if unlikely(self.remaining_bits() < bytes as u16 * 8) {
            // Undo the prefix read so a failed read leaves the slice intact.
            self.bits_start -= prefix;
            return Err(Error::SliceUnderrun);
        }
        let mut result = 0u128;
        for _ in 0..bytes {
            result = (result << 8) | ok!(self.load_uint(8)) as u128;
        }
        Ok(result)
    }

    /// Reads a variable-width two's complement integer with at most
    /// `max_bytes` payload bytes.
    pub fn load_var_int(&mut self, max_bytes: u16) -> Result<i128, Error> {
        let prefix = len_bits(max_bytes);
        let bytes = ok!(self.load_uint(prefix));
        if bytes > 16 {
            return Err(Error::IntOverflow);
        }
        if bytes == 0 {
            return Ok(0);
        }
        if unlikely(self.remaining_bits() < bytes as u16 * 8) {
            self.bits_start -= prefix;
            return Err(Error::SliceUnderrun);
        }
        let mut raw = 0u128;
        for _ in 0..bytes {
            raw = (raw << 8) | ok!(self.load_uint(8)) as u128;
        }
        let shift = 128 - bytes as u32 * 8;
        Ok(((raw << shift) as i128) >> shift)
    }

    /// Returns the child cell at the specified offset from the cursor
    /// without advancing.
    pub fn reference(&self, offset: u8) -> Option<&Cell> {
        let index = self.refs_start + offset;
        if index < self.refs_end {
            self.cell.reference(index)
        } else {
            None
        }
    }

    /// Reads the next child cell, advancing the reference cursor.
    pub fn load_reference(&mut self) -> Result<Cell, Error> {
        match self.reference(0) {
            Some(cell) => {
                let cell = cell.clone();
                self.refs_start += 1;
                Ok(cell)
            }
            None => Err(Error::SliceUnderrun),
        }
    }

    /// Advances the window start by the specified amounts.
    pub fn skip_first(&mut self, bits: u16, refs: u8) -> Result<(), Error> {
        if unlikely(self.remaining_bits() < bits || self.remaining_refs() < refs) {
            return Err(Error::SliceUnderrun);
        }
        self.bits_start += bits;
        self.refs_start += refs;
        Ok(())
    }

    /// Returns a sub-window over the first `bits` and `refs` of this slice
    /// without advancing it. The prefix is clamped to the window.
    pub fn get_prefix(&self, bits: u16, refs: u8) -> Self {
        Self {
            cell: self.cell.clone(),
            bits_start: self.bits_start,
            bits_end: self.bits_start + bits.min(self.remaining_bits()),
            refs_start: self.refs_start,
            refs_end: self.refs_start + refs.min(self.remaining_refs()),
        }
    }

    /// Reads a prefix sub-window, advancing this slice past it.
    pub fn load_prefix(&mut self, bits: u16, refs: u8) -> Result<Self, Error> {
        if unlikely(self.remaining_bits() < bits || self.remaining_refs() < refs) {
            return Err(Error::SliceUnderrun);
        }
        let prefix = self.get_prefix(bits, refs);
        self.bits_start += bits;
        self.refs_start += refs;
        Ok(prefix)
    }

    /// Returns the length in bits of the longest common prefix
    /// of two slices. Neither slice is advanced.
    pub fn longest_common_prefix_len(&self, other: &Self) -> u16 {
        let max = self.remaining_bits().min(other.remaining_bits());
        for i in 0..max {
            if get_bit(self.cell.data(), self.bits_start + i)
                != get_bit(other.cell.data(), other.bits_start + i)
            {
                return i;
            }
        }
        max
    }

    /// If all remaining bits are the same, returns that bit.
    pub fn test_uniform(&self) -> Option<bool> {
        if self.is_data_empty() {
            return None;
        }
        let first = get_bit(self.cell.data(), self.bits_start);
        for i in 1..self.remaining_bits() {
            if get_bit(self.cell.data(), self.bits_start + i) != first {
                return None;
            }
        }
        Some(first)
    }

    /// Compares the remaining data of two slices as
    /// left-aligned bit strings.
    pub fn lex_cmp(&self, other: &Self) -> Ordering {
        let common = self.remaining_bits().min(other.remaining_bits());
        for i in 0..common {
            let a = get_bit(self.cell.data(), self.bits_start + i);
            let b = get_bit(other.cell.data(), other.bits_start + i);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        self.remaining_bits().cmp(&other.remaining_bits())
    }
}

impl std::fmt::Debug for CellSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellSlice")
            .field("bits", &(self.bits_start..self.bits_end))
            .field("refs", &(self.refs_start..self.refs_end))
            .field("cell", &self.cell)
            .finish()
    }
}

/// Number of bits in the length prefix of a variable-width integer:
/// `ceil(log2(max_bytes))`.
#[inline]
pub(crate) const fn len_bits(max_bytes: u16) -> u16 {
    16 - max_bytes.saturating_sub(1).leading_zeros() as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellBuilder;

    #[test]
    fn sequential_reads() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b1011, 4).unwrap();
        builder.store_u16(0xbeef).unwrap();
        builder.store_int(-5, 7).unwrap();
        builder.store_reference(Cell::empty()).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = cell.as_slice();
        assert_eq!(slice.remaining_bits(), 4 + 16 + 7);
        assert_eq!(slice.load_uint(4).unwrap(), 0b1011);
        assert_eq!(slice.load_u16().unwrap(), 0xbeef);
        assert_eq!(slice.load_int(7).unwrap(), -5);
        assert!(slice.load_reference().unwrap().is_empty());
        assert!(slice.is_empty());
    }

    #[test]
    fn underrun_does_not_advance() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b101, 3).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = cell.as_slice();
        assert_eq!(slice.load_uint(8), Err(Error::SliceUnderrun));
        assert_eq!(slice.remaining_bits(), 3);
        assert_eq!(slice.load_reference(), Err(Error::SliceUnderrun));
        assert_eq!(slice.load_uint(3).unwrap(), 0b101);
    }

    #[test]
    fn var_uint_round_trip() {
        for value in [0u128, 1, 5, 127, 255, 256, 0xdead_beef, u64::MAX as u128] {
            for max_bytes in [7u16, 16] {
                let mut builder = CellBuilder::new();
                builder.store_var_uint(value, max_bytes).unwrap();
                let cell = builder.build().unwrap();
                let mut slice = cell.as_slice();
                assert_eq!(slice.load_var_uint(max_bytes).unwrap(), value);
                assert!(slice.is_data_empty());
            }
        }
    }

    #[test]
    fn var_int_round_trip() {
        for value in [0i128, 1, -1, 127, -128, 128, -129, 1 << 20, -(1 << 20)] {
            let mut builder = CellBuilder::new();
            builder.store_var_int(value, 16).unwrap();
            let cell = builder.build().unwrap();
            let mut slice = cell.as_slice();
            assert_eq!(slice.load_var_int(16).unwrap(), value);
        }
    }

    #[test]
    fn prefix_helpers() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b1100_1010, 8).unwrap();
        let a = builder.build().unwrap();

        let mut builder = CellBuilder::new();
        builder.store_uint(0b1100_0110, 8).unwrap();
        let b = builder.build().unwrap();

        let a = a.as_slice();
        let b = b.as_slice();
        assert_eq!(a.longest_common_prefix_len(&b), 4);
        assert_eq!(a.lex_cmp(&b), Ordering::Greater);

        let prefix = a.get_prefix(4, 0);
        assert_eq!(prefix.remaining_bits(), 4);
        assert_eq!(prefix.test_uniform(), None);
        assert_eq!(prefix.get_prefix(2, 0).test_uniform(), Some(true));
    }
}
