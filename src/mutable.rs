//! The mutable bit builder.
//!
//! [`MutableBits`] exclusively owns its storage and grows or rewrites it in
//! place. Every mutator returns `&mut Self` so edits chain without
//! aliasing. Converting a builder into an immutable [`Bits`] is an O(1)
//! move; snapshots taken earlier keep their own storage and never observe
//! later mutation.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::parser;
use crate::search;
use crate::store::{self, Bs, Bv};

/// A mutable sequence of bits.
///
/// ```
/// use bitloom::MutableBits;
///
/// let mut b = MutableBits::from_hex("0f").unwrap();
/// b.append(&"0x0a".parse().unwrap()).invert_all();
/// assert_eq!(b.to_hex().unwrap(), "f0f5");
/// ```
pub struct MutableBits {
    data: Bv,
}

impl MutableBits {
    pub(crate) fn from_store(data: Bv) -> Self {
        MutableBits { data }
    }

    pub(crate) fn window(&self) -> &Bs {
        &self.data
    }

    /// An empty builder.
    pub fn new() -> Self {
        MutableBits::from_store(Bv::new())
    }

    /// `n` zero bits.
    pub fn from_zeros(n: usize) -> Self {
        MutableBits::from_store(Bv::repeat(false, n))
    }

    /// `n` one bits.
    pub fn from_ones(n: usize) -> Self {
        MutableBits::from_store(Bv::repeat(true, n))
    }

    /// All bits of the given bytes.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        MutableBits::from_store(store::from_bytes(data.as_ref()))
    }

    /// A binary string; the `0b` prefix is optional.
    pub fn from_bin(s: &str) -> Result<Self> {
        store::from_bin(s).map(MutableBits::from_store)
    }

    /// An octal string; three bits per digit.
    pub fn from_oct(s: &str) -> Result<Self> {
        store::from_oct(s).map(MutableBits::from_store)
    }

    /// A hex string; four bits per digit.
    pub fn from_hex(s: &str) -> Result<Self> {
        store::from_hex(s).map(MutableBits::from_store)
    }

    /// `n` pseudo-random bits.
    pub fn from_random(n: usize, seed: Option<u64>) -> Self {
        MutableBits::from_store(store::from_random(n, seed))
    }

    /// One bit per element.
    pub fn from_bools(bools: impl IntoIterator<Item = bool>) -> Self {
        let mut bv = Bv::new();
        for b in bools {
            bv.push(b);
        }
        MutableBits::from_store(bv)
    }

    /// Parse a formatted bit-source string.
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(parser::parse_bit_literal(s)?.to_mutable())
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bit at `i`.
    pub fn bit(&self, i: usize) -> Result<bool> {
        if i >= self.len() {
            return Err(Error::OutOfRange(format!(
                "bit index {i} out of range for length {}",
                self.len()
            )));
        }
        Ok(self.data[i])
    }

    /// Count of one bits (for `true`) or zero bits (for `false`).
    pub fn count(&self, value: bool) -> usize {
        let ones = self.data.count_ones();
        if value {
            ones
        } else {
            self.len() - ones
        }
    }

    pub fn all(&self) -> bool {
        self.data.all()
    }

    pub fn any(&self) -> bool {
        self.data.any()
    }

    /// Pack into bytes, zero-padded at the tail.
    pub fn to_bytes(&self) -> Vec<u8> {
        store::to_bytes(&self.data)
    }

    pub fn to_bin(&self) -> String {
        store::to_bin(&self.data)
    }

    pub fn to_hex(&self) -> Result<String> {
        self.to_bits().to_hex()
    }

    pub fn to_oct(&self) -> Result<String> {
        self.to_bits().to_oct()
    }

    /// Lowest match of `pat` at or after `start`.
    pub fn find(&self, pat: &Bits, start: usize, byte_aligned: bool) -> Option<usize> {
        search::find(&self.data, pat.window(), start, byte_aligned)
    }

    /// Highest match of `pat` at or after `start`.
    pub fn rfind(&self, pat: &Bits, start: usize, byte_aligned: bool) -> Option<usize> {
        search::rfind(&self.data, pat.window(), start, self.len(), byte_aligned)
    }

    /// Append bits at the end.
    pub fn append(&mut self, bits: &Bits) -> &mut Self {
        self.data.extend_from_bitslice(bits.window());
        self
    }

    /// Insert bits at the front.
    pub fn prepend(&mut self, bits: &Bits) -> &mut Self {
        let mut bv = Bv::with_capacity(bits.len() + self.len());
        bv.extend_from_bitslice(bits.window());
        bv.extend_from_bitslice(&self.data);
        self.data = bv;
        self
    }

    /// Insert bits so that the first inserted bit lands at index `at`.
    pub fn insert(&mut self, at: usize, bits: &Bits) -> Result<&mut Self> {
        if at > self.len() {
            return Err(Error::OutOfRange(format!(
                "insert position {at} out of range for length {}",
                self.len()
            )));
        }
        let tail = self.data.split_off(at);
        self.data.extend_from_bitslice(bits.window());
        self.data.extend_from_bitslice(&tail);
        Ok(self)
    }

    /// Overwrite bits in place starting at `at`; the length is unchanged.
    pub fn overwrite(&mut self, at: usize, bits: &Bits) -> Result<&mut Self> {
        if at + bits.len() > self.len() {
            return Err(Error::OutOfRange(format!(
                "overwrite of {} bits at {at} exceeds length {}",
                bits.len(),
                self.len()
            )));
        }
        self.data[at..at + bits.len()].copy_from_bitslice(bits.window());
        Ok(self)
    }

    /// Replace the window `[start, end)` with the given bits, resizing as
    /// needed.
    pub fn splice(&mut self, start: usize, end: usize, bits: &Bits) -> Result<&mut Self> {
        if start > end || end > self.len() {
            return Err(Error::OutOfRange(format!(
                "splice {start}..{end} out of range for length {}",
                self.len()
            )));
        }
        if end - start == bits.len() {
            return self.overwrite(start, bits);
        }
        let tail = self.data.split_off(end);
        self.data.truncate(start);
        self.data.extend_from_bitslice(bits.window());
        self.data.extend_from_bitslice(&tail);
        Ok(self)
    }

    /// Replace non-overlapping occurrences of `old` with `new`, scanning
    /// from `start`. At most `count` replacements when given.
    pub fn replace(
        &mut self,
        old: &Bits,
        new: &Bits,
        start: usize,
        count: Option<usize>,
        byte_aligned: bool,
    ) -> Result<&mut Self> {
        if start > self.len() {
            return Err(Error::OutOfRange(format!(
                "replace start {start} out of range for length {}",
                self.len()
            )));
        }
        let limit = count.unwrap_or(usize::MAX);
        let mut positions = Vec::new();
        let mut pos = start;
        while positions.len() < limit {
            match search::find(&self.data, old.window(), pos, byte_aligned) {
                Some(p) => {
                    positions.push(p);
                    pos = p + old.len();
                }
                None => break,
            }
        }
        if positions.is_empty() {
            return Ok(self);
        }
        log::debug!("replacing {} occurrence(s)", positions.len());
        let mut bv = Bv::with_capacity(self.len());
        let mut copied = 0;
        for p in &positions {
            bv.extend_from_bitslice(&self.data[copied..*p]);
            bv.extend_from_bitslice(new.window());
            copied = p + old.len();
        }
        bv.extend_from_bitslice(&self.data[copied..]);
        self.data = bv;
        Ok(self)
    }

    /// Set the bit at `i`.
    pub fn set_index(&mut self, value: bool, i: usize) -> Result<&mut Self> {
        if i >= self.len() {
            return Err(Error::OutOfRange(format!(
                "bit index {i} out of range for length {}",
                self.len()
            )));
        }
        self.data.set(i, value);
        Ok(self)
    }

    /// Set every bit in the range.
    pub fn set_range(&mut self, value: bool, range: Range<usize>) -> Result<&mut Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::OutOfRange(format!(
                "range {}..{} out of range for length {}",
                range.start,
                range.end,
                self.len()
            )));
        }
        self.data[range].fill(value);
        Ok(self)
    }

    /// Set every `step`-th bit in `[start, end)`.
    pub fn set_stride(
        &mut self,
        value: bool,
        start: usize,
        end: usize,
        step: usize,
    ) -> Result<&mut Self> {
        if step == 0 {
            return Err(Error::OutOfRange("step cannot be zero".into()));
        }
        if start > end || end > self.len() {
            return Err(Error::OutOfRange(format!(
                "range {start}..{end} out of range for length {}",
                self.len()
            )));
        }
        let mut i = start;
        while i < end {
            self.data.set(i, value);
            i += step;
        }
        Ok(self)
    }

    /// Set the bits at each listed index.
    pub fn set_indices(&mut self, value: bool, indices: &[usize]) -> Result<&mut Self> {
        for &i in indices {
            self.set_index(value, i)?;
        }
        Ok(self)
    }

    /// Flip the bit at `i`.
    pub fn invert_index(&mut self, i: usize) -> Result<&mut Self> {
        let current = self.bit(i)?;
        self.data.set(i, !current);
        Ok(self)
    }

    /// Flip the bits at each listed index.
    pub fn invert_indices(&mut self, indices: &[usize]) -> Result<&mut Self> {
        for &i in indices {
            self.invert_index(i)?;
        }
        Ok(self)
    }

    /// Flip every bit.
    pub fn invert_all(&mut self) -> &mut Self {
        self.data = !std::mem::take(&mut self.data);
        self
    }

    /// Reverse the bit order in place.
    pub fn reverse(&mut self) -> &mut Self {
        self.data.reverse();
        self
    }

    /// Reverse each contiguous group of `k` bytes. The length must be a
    /// multiple of `8 * k` bits.
    pub fn byte_swap(&mut self, k: usize) -> Result<&mut Self> {
        if k == 0 {
            return Err(Error::OutOfRange("byte_swap group size cannot be zero".into()));
        }
        if self.len() % (8 * k) != 0 {
            return Err(Error::Alignment(format!(
                "byte_swap({k}) needs a length divisible by {} bits, got {}",
                8 * k,
                self.len()
            )));
        }
        let mut bytes = self.to_bytes();
        for group in bytes.chunks_mut(k) {
            group.reverse();
        }
        self.data = store::from_bytes(&bytes);
        Ok(self)
    }

    /// Rotate left by `n` bits; a negative `n` rotates right.
    pub fn rol(&mut self, n: i64) -> Result<&mut Self> {
        if self.is_empty() {
            return Err(Error::OutOfRange("cannot rotate an empty builder".into()));
        }
        let by = n.rem_euclid(self.len() as i64) as usize;
        self.data.rotate_left(by);
        Ok(self)
    }

    /// Rotate right by `n` bits; a negative `n` rotates left.
    pub fn ror(&mut self, n: i64) -> Result<&mut Self> {
        if self.is_empty() {
            return Err(Error::OutOfRange("cannot rotate an empty builder".into()));
        }
        let by = n.rem_euclid(self.len() as i64) as usize;
        self.data.rotate_right(by);
        Ok(self)
    }

    /// Remove every bit.
    pub fn clear(&mut self) -> &mut Self {
        self.data.clear();
        self
    }

    /// In-place AND with an equal-length operand.
    pub fn and_assign(&mut self, other: &Bits) -> Result<&mut Self> {
        self.check_len(other)?;
        self.data &= other.window();
        Ok(self)
    }

    /// In-place OR with an equal-length operand.
    pub fn or_assign(&mut self, other: &Bits) -> Result<&mut Self> {
        self.check_len(other)?;
        self.data |= other.window();
        Ok(self)
    }

    /// In-place XOR with an equal-length operand.
    pub fn xor_assign(&mut self, other: &Bits) -> Result<&mut Self> {
        self.check_len(other)?;
        self.data ^= other.window();
        Ok(self)
    }

    fn check_len(&self, other: &Bits) -> Result<()> {
        if self.len() != other.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }

    /// Freeze into an immutable [`Bits`] without copying.
    pub fn into_bits(self) -> Bits {
        Bits::from_store(self.data)
    }

    /// An immutable snapshot; the builder stays usable.
    pub fn to_bits(&self) -> Bits {
        Bits::from_store(self.data.clone())
    }
}

impl Default for MutableBits {
    fn default() -> Self {
        MutableBits::new()
    }
}

impl Clone for MutableBits {
    fn clone(&self) -> Self {
        MutableBits::from_store(self.data.clone())
    }
}

impl PartialEq for MutableBits {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for MutableBits {}

impl PartialEq<Bits> for MutableBits {
    fn eq(&self, other: &Bits) -> bool {
        self.window() == other.window()
    }
}

impl FromStr for MutableBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MutableBits::from_string(s)
    }
}

impl fmt::Display for MutableBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bits())
    }
}

impl fmt::Debug for MutableBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableBits")
            .field("bits", &format!("{self}"))
            .field("len", &self.len())
            .finish()
    }
}
