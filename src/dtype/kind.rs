//! The closed taxonomy of dtype kinds and the endianness modifier.

use std::fmt;
use std::str::FromStr;

use strum::{Display, EnumIs, EnumIter, EnumString};

use crate::error::Error;

/// The family a dtype belongs to.
///
/// A concrete dtype combines a kind with a size and possibly an endianness,
/// e.g. `f32`, `f64` and `f64_le` all share [`Kind::Float`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, EnumIs)]
pub enum Kind {
    /// An unsigned integer.
    #[strum(serialize = "u")]
    Uint,
    /// A two's complement signed integer.
    #[strum(serialize = "i")]
    Int,
    /// An IEEE 754 float of 16, 32 or 64 bits.
    #[strum(serialize = "f")]
    Float,
    /// A single-bit boolean.
    #[strum(serialize = "bool")]
    Bool,
    /// Raw bytes.
    #[strum(serialize = "bytes")]
    Bytes,
    /// A hexadecimal string, four bits per character.
    #[strum(serialize = "hex")]
    Hex,
    /// A binary string, one bit per character.
    #[strum(serialize = "bin")]
    Bin,
    /// An octal string, three bits per character.
    #[strum(serialize = "oct")]
    Oct,
    /// An immutable bit sequence, kept as-is.
    #[strum(serialize = "bits")]
    Bits,
    /// Padding with no observable value.
    #[strum(serialize = "pad")]
    Pad,
}

/// Byte order for whole-byte integer and float dtypes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIs)]
pub enum Endianness {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
    /// The byte order of the machine the program runs on.
    Native,
    /// No byte order; required for dtypes that are not a whole number of
    /// bytes.
    #[default]
    Unspecified,
}

impl Endianness {
    /// The `_be` / `_le` / `_ne` dtype-string suffix; empty when unspecified.
    pub fn suffix(self) -> &'static str {
        match self {
            Endianness::Big => "_be",
            Endianness::Little => "_le",
            Endianness::Native => "_ne",
            Endianness::Unspecified => "",
        }
    }

    /// Whether bytes must be reversed relative to the big-endian encoding.
    pub(crate) fn is_effectively_little(self) -> bool {
        match self {
            Endianness::Little => true,
            Endianness::Native => cfg!(target_endian = "little"),
            Endianness::Big | Endianness::Unspecified => false,
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endianness::Big => "be",
            Endianness::Little => "le",
            Endianness::Native => "ne",
            Endianness::Unspecified => "",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Endianness {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "be" => Ok(Endianness::Big),
            "le" => Ok(Endianness::Little),
            "ne" => Ok(Endianness::Native),
            "" => Ok(Endianness::Unspecified),
            other => Err(Error::BadDtype(format!("unknown endianness '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_tokens_round_trip() {
        for (kind, token) in [
            (Kind::Uint, "u"),
            (Kind::Int, "i"),
            (Kind::Float, "f"),
            (Kind::Bool, "bool"),
            (Kind::Bytes, "bytes"),
            (Kind::Hex, "hex"),
            (Kind::Bin, "bin"),
            (Kind::Oct, "oct"),
            (Kind::Bits, "bits"),
            (Kind::Pad, "pad"),
        ] {
            assert_eq!(kind.to_string(), token);
            assert_eq!(Kind::from_str(token).unwrap(), kind);
        }
        assert!(Kind::from_str("word").is_err());
    }

    #[test]
    fn endianness_suffixes() {
        assert_eq!(Endianness::Big.suffix(), "_be");
        assert_eq!(Endianness::Unspecified.suffix(), "");
        assert_eq!(Endianness::from_str("le").unwrap(), Endianness::Little);
        assert!(Endianness::from_str("xx").is_err());
    }
}
