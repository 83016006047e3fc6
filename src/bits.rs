//! Immutable bit sequences.
//!
//! [`Bits`] is a shared, cheaply sliceable window onto reference-counted
//! storage. Slicing never copies: a slice is the same `Arc` with a
//! narrower window. Equality, search and all other reads are defined over
//! the logical window only; the storage offset and any trailing padding
//! are unobservable.

use std::borrow::Borrow;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use bitvec::field::BitField;

use crate::dtype::Dtype;
use crate::error::{Error, Result};
use crate::iter::{BitIter, Chunks, FindAll, RFindAll};
use crate::mutable::MutableBits;
use crate::parser;
use crate::search;
use crate::store::{self, Bs, Bv};
use crate::value::Value;

/// An immutable sequence of bits.
///
/// Construct with one of the `from_*` builders or by parsing a formatted
/// string:
///
/// ```
/// use bitloom::Bits;
///
/// let a = Bits::from_string("0b001, u32 = 90, 0x5e").unwrap();
/// assert_eq!(a.len(), 43);
/// let b = a.slice(3, 35).unwrap(); // zero-copy
/// assert_eq!(b, Bits::from_string("u32 = 90").unwrap());
/// ```
#[derive(Clone)]
pub struct Bits {
    data: Arc<Bv>,
    start: usize,
    len: usize,
}

impl Bits {
    pub(crate) fn from_store(bv: Bv) -> Self {
        let len = bv.len();
        Bits {
            data: Arc::new(bv),
            start: 0,
            len,
        }
    }

    pub(crate) fn window(&self) -> &Bs {
        &self.data[self.start..self.start + self.len]
    }

    /// An empty bit sequence.
    pub fn new() -> Self {
        Bits::from_store(Bv::new())
    }

    /// `n` zero bits.
    pub fn from_zeros(n: usize) -> Self {
        Bits::from_store(Bv::repeat(false, n))
    }

    /// `n` one bits.
    pub fn from_ones(n: usize) -> Self {
        Bits::from_store(Bv::repeat(true, n))
    }

    /// All bits of the given bytes, in order.
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        Bits::from_store(store::from_bytes(data.as_ref()))
    }

    /// The first `n` bits of the given bytes.
    pub fn from_bytes_trimmed(data: impl AsRef<[u8]>, n: usize) -> Result<Self> {
        let data = data.as_ref();
        if n > data.len() * 8 {
            return Err(Error::OutOfRange(format!(
                "cannot keep {n} bits of {} bytes",
                data.len()
            )));
        }
        let mut bv = store::from_bytes(data);
        bv.truncate(n);
        Ok(Bits::from_store(bv))
    }

    /// `n` pseudo-random bits. A seed gives a reproducible sequence; `None`
    /// seeds from the OS.
    pub fn from_random(n: usize, seed: Option<u64>) -> Self {
        Bits::from_store(store::from_random(n, seed))
    }

    /// One bit per element of the iterator.
    pub fn from_bools(bools: impl IntoIterator<Item = bool>) -> Self {
        let mut bv = Bv::new();
        for b in bools {
            bv.push(b);
        }
        Bits::from_store(bv)
    }

    /// Concatenation of a sequence of bit sources.
    pub fn from_joined<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<Bits>,
    {
        let mut bv = Bv::new();
        for part in parts {
            bv.extend_from_bitslice(part.borrow().window());
        }
        Bits::from_store(bv)
    }

    /// Parse a formatted bit-source string: binary/octal/hex literals and
    /// typed `dtype = value` tokens, comma-joined.
    pub fn from_string(s: &str) -> Result<Self> {
        parser::parse_bit_literal(s)
    }

    /// A binary string such as `"0b0110"` (the prefix is optional).
    pub fn from_bin(s: &str) -> Result<Self> {
        store::from_bin(s).map(Bits::from_store)
    }

    /// An octal string such as `"0o217"`, three bits per digit.
    pub fn from_oct(s: &str) -> Result<Self> {
        store::from_oct(s).map(Bits::from_store)
    }

    /// A hex string such as `"0xbeef"`, four bits per digit.
    pub fn from_hex(s: &str) -> Result<Self> {
        store::from_hex(s).map(Bits::from_store)
    }

    /// Pack a value with a dtype.
    pub fn from_dtype(dtype: &Dtype, value: &Value) -> Result<Self> {
        dtype.pack(value)
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bit at `i`.
    pub fn bit(&self, i: usize) -> Result<bool> {
        if i >= self.len {
            return Err(Error::OutOfRange(format!(
                "bit index {i} out of range for length {}",
                self.len
            )));
        }
        Ok(self.window()[i])
    }

    /// The zero-copy window `[a, b)`.
    pub fn slice(&self, a: usize, b: usize) -> Result<Self> {
        if a > b || b > self.len {
            return Err(Error::OutOfRange(format!(
                "slice {a}..{b} out of range for length {}",
                self.len
            )));
        }
        Ok(Bits {
            data: Arc::clone(&self.data),
            start: self.start + a,
            len: b - a,
        })
    }

    pub(crate) fn slice_unchecked(&self, a: usize, b: usize) -> Self {
        debug_assert!(a <= b && b <= self.len);
        Bits {
            data: Arc::clone(&self.data),
            start: self.start + a,
            len: b - a,
        }
    }

    /// Pack into bytes, left-aligned and zero-padded at the tail.
    pub fn to_bytes(&self) -> Vec<u8> {
        store::to_bytes(self.window())
    }

    /// `"01"` text, one character per bit.
    pub fn to_bin(&self) -> String {
        store::to_bin(self.window())
    }

    /// Octal text; the length must be a multiple of 3 bits.
    pub fn to_oct(&self) -> Result<String> {
        if self.len % 3 != 0 {
            return Err(Error::Alignment(format!(
                "cannot interpret as octal: length {} is not a multiple of 3 bits",
                self.len
            )));
        }
        Ok(format!("{self:o}"))
    }

    /// Hex text; the length must be a multiple of 4 bits.
    pub fn to_hex(&self) -> Result<String> {
        if self.len % 4 != 0 {
            return Err(Error::Alignment(format!(
                "cannot interpret as hex: length {} is not a multiple of 4 bits",
                self.len
            )));
        }
        Ok(format!("{self:x}"))
    }

    /// Lazy sequence of `k`-bit windows; the last may be shorter.
    ///
    /// Panics if `k` is zero.
    pub fn chunks(&self, k: usize) -> Chunks<'_> {
        assert!(k > 0, "chunk size must be non-zero");
        Chunks::new(self, k)
    }

    /// Iterate over the bits as booleans.
    pub fn iter(&self) -> BitIter<'_> {
        BitIter::new(self)
    }

    /// Count of one bits (for `true`) or zero bits (for `false`).
    pub fn count(&self, value: bool) -> usize {
        let ones = self.window().count_ones();
        if value {
            ones
        } else {
            self.len - ones
        }
    }

    /// True when every bit is one. Vacuously true for an empty sequence.
    pub fn all(&self) -> bool {
        self.window().all()
    }

    /// True when at least one bit is one.
    pub fn any(&self) -> bool {
        self.window().any()
    }

    /// Lowest index `i >= start` where `pat` occurs. With `byte_aligned`,
    /// only indices that are multiples of 8 qualify.
    pub fn find(&self, pat: &Bits, start: usize, byte_aligned: bool) -> Option<usize> {
        search::find(self.window(), pat.window(), start, byte_aligned)
    }

    /// Highest index `i >= start` where `pat` occurs.
    pub fn rfind(&self, pat: &Bits, start: usize, byte_aligned: bool) -> Option<usize> {
        search::rfind(self.window(), pat.window(), start, self.len, byte_aligned)
    }

    /// Whether the sequence begins with `prefix`.
    pub fn starts_with(&self, prefix: &Bits) -> bool {
        prefix.len() <= self.len && self.window()[..prefix.len()] == *prefix.window()
    }

    /// Whether the sequence ends with `suffix`.
    pub fn ends_with(&self, suffix: &Bits) -> bool {
        suffix.len() <= self.len && self.window()[self.len - suffix.len()..] == *suffix.window()
    }

    /// Lazy non-overlapping matches from low to high indices.
    pub fn find_all<'a>(&'a self, pat: &'a Bits, byte_aligned: bool) -> FindAll<'a> {
        FindAll::new(self, pat, byte_aligned)
    }

    /// Lazy non-overlapping matches from high to low indices.
    pub fn rfind_all<'a>(&'a self, pat: &'a Bits, byte_aligned: bool) -> RFindAll<'a> {
        RFindAll::new(self, pat, byte_aligned)
    }

    fn zip_op(&self, other: &Bits, f: impl FnOnce(&mut Bv, &Bs)) -> Result<Bits> {
        if self.len != other.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: other.len,
            });
        }
        let mut bv = self.window().to_bitvec();
        f(&mut bv, other.window());
        Ok(Bits::from_store(bv))
    }

    /// Bitwise AND of equal-length operands; fresh storage.
    pub fn and(&self, other: &Bits) -> Result<Bits> {
        self.zip_op(other, |bv, w| *bv &= w)
    }

    /// Bitwise OR of equal-length operands; fresh storage.
    pub fn or(&self, other: &Bits) -> Result<Bits> {
        self.zip_op(other, |bv, w| *bv |= w)
    }

    /// Bitwise XOR of equal-length operands; fresh storage.
    pub fn xor(&self, other: &Bits) -> Result<Bits> {
        self.zip_op(other, |bv, w| *bv ^= w)
    }

    /// Every bit inverted; fresh storage.
    pub fn not(&self) -> Bits {
        Bits::from_store(!self.window().to_bitvec())
    }

    /// Shift left by `n`, dropping high bits and zero-filling at the tail.
    pub fn shl(&self, n: usize) -> Result<Bits> {
        if self.is_empty() {
            return Err(Error::OutOfRange("cannot shift empty bits".into()));
        }
        if n >= self.len {
            return Ok(Bits::from_zeros(self.len));
        }
        let mut bv = Bv::with_capacity(self.len);
        bv.extend_from_bitslice(&self.window()[n..]);
        bv.resize(self.len, false);
        Ok(Bits::from_store(bv))
    }

    /// Shift right by `n`, zero-filling at the head.
    pub fn shr(&self, n: usize) -> Result<Bits> {
        if self.is_empty() {
            return Err(Error::OutOfRange("cannot shift empty bits".into()));
        }
        if n >= self.len {
            return Ok(Bits::from_zeros(self.len));
        }
        let mut bv = Bv::repeat(false, n);
        bv.extend_from_bitslice(&self.window()[..self.len - n]);
        Ok(Bits::from_store(bv))
    }

    /// An owning, mutable copy of this sequence.
    pub fn to_mutable(&self) -> MutableBits {
        MutableBits::from_store(self.window().to_bitvec())
    }
}

impl Default for Bits {
    fn default() -> Self {
        Bits::new()
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Self) -> bool {
        self.window() == other.window()
    }
}

impl Eq for Bits {}

impl PartialEq<MutableBits> for Bits {
    fn eq(&self, other: &MutableBits) -> bool {
        self.window() == other.window()
    }
}

impl FromStr for Bits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Bits::from_string(s)
    }
}

impl fmt::Binary for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.window() {
            f.write_char(if *bit { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::LowerHex for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len % 4 != 0 {
            return Err(fmt::Error);
        }
        for chunk in self.window().chunks(4) {
            let nibble: u8 = chunk.load_be();
            f.write_char(char::from_digit(nibble as u32, 16).unwrap())?;
        }
        Ok(())
    }
}

impl fmt::Octal for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len % 3 != 0 {
            return Err(fmt::Error);
        }
        for chunk in self.window().chunks(3) {
            let digit: u8 = chunk.load_be();
            f.write_char(char::from_digit(digit as u32, 8).unwrap())?;
        }
        Ok(())
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        if self.len % 4 == 0 {
            write!(f, "0x{self:x}")
        } else {
            write!(f, "0b{self:b}")
        }
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bits")
            .field("bits", &format!("{self}"))
            .field("len", &self.len)
            .finish()
    }
}

impl<'a> IntoIterator for &'a Bits {
    type Item = bool;
    type IntoIter = BitIter<'a>;

    fn into_iter(self) -> BitIter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_from_bytes() {
        let bits = Bits::from_bytes([10, 20, 30]);
        assert_eq!(bits.len(), 24);
        assert_eq!(bits.to_bytes(), vec![10, 20, 30]);
    }

    #[test]
    fn trimmed_bytes_keep_a_prefix() {
        let bits = Bits::from_bytes_trimmed([0xf0], 4).unwrap();
        assert_eq!(bits.to_bin(), "1111");
        assert!(Bits::from_bytes_trimmed([0xf0], 9).is_err());
    }

    #[test]
    fn zeros_ones_and_bools() {
        assert_eq!(Bits::from_zeros(9).to_bytes(), vec![0, 0]);
        assert_eq!(Bits::from_ones(5).to_bin(), "11111");
        let b = Bits::from_bools([true, false, true]);
        assert_eq!(b.to_bin(), "101");
    }

    #[test]
    fn slicing_is_zero_copy_and_composable() {
        let bits = Bits::from_hex("0123456789abcdef").unwrap();
        let s = bits.slice(12, 64).unwrap();
        assert_eq!(s.to_hex().unwrap(), "3456789abcdef");
        // slice of slice addresses the original storage
        let t = s.slice(4, 12).unwrap();
        assert_eq!(t.to_hex().unwrap(), "45");
        assert!(bits.slice(1, 0).is_err());
        assert!(bits.slice(0, 65).is_err());
    }

    #[test]
    fn slice_concatenation_invariant() {
        let b = Bits::from_random(77, Some(7));
        for (i, j, k) in [(0, 10, 77), (3, 3, 50), (0, 0, 0), (20, 40, 60)] {
            let joined = Bits::from_joined([&b.slice(i, j).unwrap(), &b.slice(j, k).unwrap()]);
            assert_eq!(joined, b.slice(i, k).unwrap());
        }
    }

    #[test]
    fn to_bytes_from_a_slice_pads() {
        let a = Bits::from_ones(16);
        let b = a.slice(7, 16).unwrap();
        assert_eq!(b.to_bin(), "111111111");
        assert_eq!(b.to_bytes(), vec![255, 128]);
    }

    #[test]
    fn equality_ignores_storage_offset() {
        let a = Bits::from_bin("0011").unwrap();
        let b = Bits::from_bin("110011").unwrap().slice(2, 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn counting_bits() {
        let b = Bits::from_hex("ef").unwrap();
        assert_eq!(b.count(true), 7);
        assert_eq!(b.count(false), 1);
        assert_eq!(b.count(true) + b.count(false), b.len());
    }

    #[test]
    fn all_and_any() {
        assert!(Bits::from_bin("111").unwrap().all());
        assert!(!Bits::from_bin("1011").unwrap().all());
        assert!(!Bits::from_bin("0000").unwrap().any());
        assert!(Bits::from_bin("1000").unwrap().any());
    }

    #[test]
    fn search_finds_lowest_match() {
        let b = Bits::from_bin("00001110").unwrap();
        let pat = Bits::from_bin("01").unwrap();
        assert_eq!(b.find(&pat, 0, false), Some(3));
        assert_eq!(b.find(&pat, 2, false), Some(3));
        assert_eq!(b.find(&Bits::from_ones(9), 0, false), None);
    }

    #[test]
    fn rfind_is_symmetric_from_the_high_end() {
        let b = Bits::from_hex("00780f0").unwrap();
        let pat = Bits::from_bin("1111").unwrap();
        assert_eq!(b.rfind(&pat, 0, false), Some(20));
        assert_eq!(b.find(&pat, 0, false), Some(9));
    }

    #[test]
    fn prefix_and_suffix_checks() {
        let b = Bits::from_bin("110100").unwrap();
        assert!(b.starts_with(&Bits::from_bin("1101").unwrap()));
        assert!(!b.starts_with(&Bits::from_bin("111").unwrap()));
        assert!(b.ends_with(&Bits::from_bin("100").unwrap()));
        assert!(!b.ends_with(&Bits::from_bin("110").unwrap()));
        assert!(b.starts_with(&Bits::new()));
        assert!(!Bits::new().starts_with(&b));
    }

    #[test]
    fn logical_ops_require_equal_lengths() {
        let a = Bits::from_hex("f0f").unwrap();
        let b = Bits::from_hex("123").unwrap();
        assert_eq!(a.and(&b).unwrap(), Bits::from_hex("103").unwrap());
        assert_eq!(a.or(&b).unwrap(), Bits::from_hex("f2f").unwrap());
        assert_eq!(a.xor(&b).unwrap(), Bits::from_hex("e2c").unwrap());
        let err = a.and(&Bits::from_hex("12").unwrap()).unwrap_err();
        assert!(err.is_length_mismatch());
    }

    #[test]
    fn xor_with_self_clears_everything() {
        let a = Bits::from_random(41, Some(3));
        let z = a.xor(&a).unwrap();
        assert_eq!(z, Bits::from_zeros(41));
    }

    #[test]
    fn double_inversion_is_identity() {
        let a = Bits::from_random(19, Some(5));
        assert_eq!(a.not().not(), a);
    }

    #[test]
    fn shifts_zero_fill() {
        let a = Bits::from_bin("10011010").unwrap();
        assert_eq!(a.shl(3).unwrap().to_bin(), "11010000");
        assert_eq!(a.shr(3).unwrap().to_bin(), "00010011");
        assert_eq!(a.shl(100).unwrap(), Bits::from_zeros(8));
        assert!(Bits::new().shl(1).is_err());
    }

    #[test]
    fn display_prefers_hex_for_nibble_lengths() {
        assert_eq!(Bits::from_bin("1110").unwrap().to_string(), "0xe");
        assert_eq!(Bits::from_bin("111").unwrap().to_string(), "0b111");
        assert_eq!(Bits::new().to_string(), "");
    }

    #[test]
    fn bit_indexing_checks_bounds() {
        let b = Bits::from_bin("001100").unwrap();
        assert!(!b.bit(0).unwrap());
        assert!(b.bit(2).unwrap());
        assert!(b.bit(6).unwrap_err().is_out_of_range());
    }

    #[test]
    fn byte_round_trip_for_whole_bytes() {
        let b = Bits::from_random(64, Some(11));
        assert_eq!(Bits::from_bytes(b.to_bytes()), b);
    }
}
