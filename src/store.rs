//! Backing storage for bit sequences.
//!
//! Everything in the crate stores bits as `BitVec<u8, Msb0>`: bit 0 is the
//! most significant bit of the first byte. The constructors here are shared
//! by both the immutable and the mutable front-end types.

use bitvec::prelude::*;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{Error, Result};

/// Owned bit storage, MSB-first within each byte.
pub(crate) type Bv = BitVec<u8, Msb0>;
/// Borrowed view over bit storage.
pub(crate) type Bs = BitSlice<u8, Msb0>;

pub(crate) fn from_bytes(data: &[u8]) -> Bv {
    Bv::from_bitslice(data.view_bits::<Msb0>())
}

/// First `offset` bits of the byte data are dropped; used when a value
/// shorter than a whole number of bytes was materialised big-endian.
pub(crate) fn from_bytes_offset(data: &[u8], offset: usize) -> Bv {
    debug_assert!(offset < 8);
    let mut bv = from_bytes(data);
    bv.drain(..offset);
    bv
}

pub(crate) fn from_bin(s: &str) -> Result<Bv> {
    let s = s.strip_prefix("0b").unwrap_or(s);
    let mut bv = Bv::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '0' => bv.push(false),
            '1' => bv.push(true),
            '_' => continue,
            c if c.is_whitespace() => continue,
            _ => {
                return Err(Error::BadSyntax(format!(
                    "cannot convert from bin '{s}': invalid character '{c}'"
                )))
            }
        }
    }
    Ok(bv)
}

pub(crate) fn from_oct(s: &str) -> Result<Bv> {
    let s = s.strip_prefix("0o").unwrap_or(s);
    let mut bv = Bv::with_capacity(s.len() * 3);
    for c in s.chars() {
        match c {
            '0'..='7' => {
                let digit = c as u8 - b'0';
                for shift in (0..3).rev() {
                    bv.push((digit >> shift) & 1 == 1);
                }
            }
            '_' => continue,
            c if c.is_whitespace() => continue,
            _ => {
                return Err(Error::BadSyntax(format!(
                    "cannot convert from oct '{s}': invalid character '{c}'"
                )))
            }
        }
    }
    Ok(bv)
}

pub(crate) fn from_hex(s: &str) -> Result<Bv> {
    let mut cleaned: String = s
        .strip_prefix("0x")
        .unwrap_or(s)
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .collect();
    let odd = cleaned.len() % 2 != 0;
    if odd {
        cleaned.push('0');
    }
    let data = hex::decode(&cleaned)
        .map_err(|e| Error::BadSyntax(format!("cannot convert from hex '{s}': {e}")))?;
    let mut bv = from_bytes(&data);
    if odd {
        bv.truncate(bv.len() - 4);
    }
    Ok(bv)
}

pub(crate) fn from_random(len: usize, seed: Option<u64>) -> Bv {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut bytes = vec![0u8; len.div_ceil(8)];
    rng.fill_bytes(&mut bytes);
    let mut bv = from_bytes(&bytes);
    bv.truncate(len);
    bv
}

/// Pack a logical window into whole bytes, zero-padding the tail.
pub(crate) fn to_bytes(window: &Bs) -> Vec<u8> {
    if window.is_empty() {
        return Vec::new();
    }
    let mut bv = Bv::with_capacity(window.len().div_ceil(8) * 8);
    bv.extend_from_bitslice(window);
    bv.resize(bv.len().div_ceil(8) * 8, false);
    bv.into_vec()
}

pub(crate) fn to_bin(window: &Bs) -> String {
    window.iter().map(|b| if *b { '1' } else { '0' }).collect()
}
