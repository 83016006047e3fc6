//! Codec primitives: the bit-level encodings behind each dtype kind.
//!
//! Values are materialised big-endian; little-endian dtypes byte-swap the
//! big-endian form. Integers up to 64 bits use the word-at-a-time fast
//! path, larger ones go through byte materialisation.

use bitvec::field::BitField;
use half::f16;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, ToPrimitive};

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::store::{self, Bv};

fn uint_to_store(u: &BigUint, bits: usize) -> Bv {
    if bits <= 64 {
        let mut bv = Bv::repeat(false, bits);
        if bits > 0 {
            bv.store_be(u.to_u64().expect("value checked to fit"));
        }
        bv
    } else {
        let mut bytes = u.to_bytes_be();
        let total = bits.div_ceil(8);
        if bytes.len() < total {
            let mut padded = vec![0u8; total - bytes.len()];
            padded.append(&mut bytes);
            bytes = padded;
        }
        store::from_bytes_offset(&bytes, total * 8 - bits)
    }
}

/// Pack an unsigned integer into exactly `bits` bits, most significant
/// first.
pub(crate) fn pack_uint(v: &BigInt, bits: usize) -> Result<Bits> {
    if bits == 0 {
        return Err(Error::OutOfRange(
            "a 'u' dtype needs a non-zero size to pack".into(),
        ));
    }
    if v.is_negative() {
        return Err(Error::OutOfRange(format!(
            "unsigned dtypes cannot hold the negative number {v}"
        )));
    }
    let u = v.magnitude();
    if u.bits() as usize > bits {
        return Err(Error::OutOfRange(format!(
            "{v} does not fit in {bits} bits; the allowed range is [0, {}]",
            (BigUint::one() << bits) - 1u8
        )));
    }
    Ok(Bits::from_store(uint_to_store(u, bits)))
}

/// Unpack bits as an unsigned integer.
pub(crate) fn unpack_uint(b: &Bits) -> Result<BigInt> {
    if b.is_empty() {
        return Err(Error::OutOfRange(
            "cannot interpret an empty bit sequence as an integer".into(),
        ));
    }
    if b.len() <= 64 {
        let u: u64 = b.window().load_be();
        return Ok(BigInt::from(u));
    }
    let pad = b.len().div_ceil(8) * 8 - b.len();
    let mut bv = Bv::repeat(false, pad);
    bv.extend_from_bitslice(b.window());
    Ok(BigInt::from(BigUint::from_bytes_be(&bv.into_vec())))
}

/// Pack a signed integer as two's complement in exactly `bits` bits.
pub(crate) fn pack_int(v: &BigInt, bits: usize) -> Result<Bits> {
    if bits == 0 {
        return Err(Error::OutOfRange(
            "an 'i' dtype needs a non-zero size to pack".into(),
        ));
    }
    let bound = BigInt::one() << (bits - 1);
    if *v >= bound || *v < -&bound {
        return Err(Error::OutOfRange(format!(
            "{v} does not fit in {bits} signed bits; the allowed range is [{}, {}]",
            -&bound,
            &bound - 1
        )));
    }
    let wrapped = if v.is_negative() {
        v + (BigInt::one() << bits)
    } else {
        v.clone()
    };
    let u = wrapped.to_biguint().expect("wrapped value is non-negative");
    Ok(Bits::from_store(uint_to_store(&u, bits)))
}

/// Unpack bits as a two's complement signed integer.
pub(crate) fn unpack_int(b: &Bits) -> Result<BigInt> {
    let u = unpack_uint(b)?;
    if b.bit(0)? {
        Ok(u - (BigInt::one() << b.len()))
    } else {
        Ok(u)
    }
}

/// Pack a float big-endian; `bits` must be 16, 32 or 64. Values that
/// overflow a narrower width become infinities, as the hardware cast does.
pub(crate) fn pack_float(v: f64, bits: usize) -> Result<Bits> {
    let bytes: Vec<u8> = match bits {
        16 => f16::from_f64(v).to_be_bytes().to_vec(),
        32 => (v as f32).to_be_bytes().to_vec(),
        64 => v.to_be_bytes().to_vec(),
        other => {
            return Err(Error::BadDtype(format!(
                "'f' dtypes must be 16, 32 or 64 bits, got {other}"
            )))
        }
    };
    Ok(Bits::from_bytes(bytes))
}

/// Unpack a big-endian IEEE float, widening to `f64`.
pub(crate) fn unpack_float(b: &Bits) -> Result<f64> {
    let bytes = b.to_bytes();
    match b.len() {
        16 => Ok(f16::from_be_bytes([bytes[0], bytes[1]]).to_f64()),
        32 => Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64),
        64 => Ok(f64::from_be_bytes(bytes.try_into().expect("eight bytes"))),
        other => Err(Error::BadDtype(format!(
            "'f' dtypes must be 16, 32 or 64 bits, got {other}"
        ))),
    }
}

/// Reverse the byte order of a whole-byte sequence.
pub(crate) fn byte_swapped(b: &Bits) -> Result<Bits> {
    if b.len() % 8 != 0 {
        return Err(Error::Alignment(format!(
            "cannot byte-swap {} bits; a whole number of bytes is required",
            b.len()
        )));
    }
    let mut bytes = b.to_bytes();
    bytes.reverse();
    Ok(Bits::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint_round_trip_across_the_word_boundary() {
        for bits in [1, 7, 12, 64, 65, 100] {
            let v = (BigInt::one() << bits) - 1;
            let packed = pack_uint(&v, bits).unwrap();
            assert_eq!(packed.len(), bits);
            assert_eq!(unpack_uint(&packed).unwrap(), v);
        }
    }

    #[test]
    fn uint_range_is_enforced() {
        assert!(pack_uint(&BigInt::from(256), 8).unwrap_err().is_out_of_range());
        assert!(pack_uint(&BigInt::from(-1), 8).unwrap_err().is_out_of_range());
        assert_eq!(
            pack_uint(&BigInt::from(255), 8).unwrap(),
            Bits::from_hex("ff").unwrap()
        );
    }

    #[test]
    fn int_is_twos_complement() {
        let packed = pack_int(&BigInt::from(-31), 7).unwrap();
        assert_eq!(packed.to_bin(), "1100001");
        assert_eq!(unpack_int(&packed).unwrap(), BigInt::from(-31));
        assert_eq!(unpack_uint(&packed).unwrap(), BigInt::from(97));
    }

    #[test]
    fn int_range_is_enforced() {
        assert!(pack_int(&BigInt::from(128), 8).unwrap_err().is_out_of_range());
        assert!(pack_int(&BigInt::from(-129), 8).unwrap_err().is_out_of_range());
        assert!(pack_int(&BigInt::from(-128), 8).is_ok());
    }

    #[test]
    fn wide_int_round_trip() {
        let v = -(BigInt::one() << 90usize) + 3;
        let packed = pack_int(&v, 100).unwrap();
        assert_eq!(unpack_int(&packed).unwrap(), v);
    }

    #[test]
    fn float_widths() {
        for bits in [16, 32, 64] {
            let packed = pack_float(13.5, bits).unwrap();
            assert_eq!(packed.len(), bits);
            assert_eq!(unpack_float(&packed).unwrap(), 13.5);
        }
        assert!(pack_float(1.0, 24).unwrap_err().is_bad_dtype());
    }

    #[test]
    fn float_overflow_becomes_infinity() {
        let packed = pack_float(1e10, 16).unwrap();
        assert_eq!(unpack_float(&packed).unwrap(), f64::INFINITY);
    }

    #[test]
    fn byte_swap_reverses_whole_bytes() {
        let b = Bits::from_hex("012345").unwrap();
        assert_eq!(byte_swapped(&b).unwrap(), Bits::from_hex("452301").unwrap());
        assert!(byte_swapped(&Bits::from_zeros(12)).unwrap_err().is_alignment());
    }
}
