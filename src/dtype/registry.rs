//! The process-wide registry of dtype kind definitions.
//!
//! One static entry per [`Kind`], describing its character width, allowed
//! sizes, signedness and whether endianness modifiers apply. The table is
//! built once and never mutated; everything that needs to reason about a
//! kind (the grammar, the codec, `Display` code) reads it from here.

use super::kind::Kind;

/// Sizes a kind accepts, counted in the kind's own character unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedSizes {
    /// Any non-negative size.
    Any,
    /// Only the listed sizes.
    Fixed(&'static [usize]),
}

impl AllowedSizes {
    pub fn contains(&self, size: usize) -> bool {
        match self {
            AllowedSizes::Any => true,
            AllowedSizes::Fixed(sizes) => sizes.contains(&size),
        }
    }

    /// The implied size when a kind admits exactly one.
    pub fn single(&self) -> Option<usize> {
        match self {
            AllowedSizes::Fixed([size]) => Some(*size),
            _ => None,
        }
    }
}

/// Everything the library knows about one dtype kind.
#[derive(Debug, Clone, Copy)]
pub struct KindInfo {
    pub kind: Kind,
    /// Short human description used in diagnostics.
    pub description: &'static str,
    /// Bits contributed by one size unit (e.g. 4 for a hex character).
    pub bits_per_char: usize,
    pub is_signed: bool,
    /// Whether `_be` / `_le` / `_ne` modifiers are accepted.
    pub endianness_variants: bool,
    pub allowed_sizes: AllowedSizes,
}

static REGISTRY: [KindInfo; 10] = [
    KindInfo {
        kind: Kind::Uint,
        description: "unsigned integer",
        bits_per_char: 1,
        is_signed: false,
        endianness_variants: true,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Int,
        description: "two's complement signed integer",
        bits_per_char: 1,
        is_signed: true,
        endianness_variants: true,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Float,
        description: "IEEE floating point number",
        bits_per_char: 1,
        is_signed: true,
        endianness_variants: true,
        allowed_sizes: AllowedSizes::Fixed(&[16, 32, 64]),
    },
    KindInfo {
        kind: Kind::Bool,
        description: "boolean",
        bits_per_char: 1,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Fixed(&[1]),
    },
    KindInfo {
        kind: Kind::Bytes,
        description: "raw bytes",
        bits_per_char: 8,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Hex,
        description: "hexadecimal string",
        bits_per_char: 4,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Bin,
        description: "binary string",
        bits_per_char: 1,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Oct,
        description: "octal string",
        bits_per_char: 3,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Bits,
        description: "bit sequence",
        bits_per_char: 1,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
    KindInfo {
        kind: Kind::Pad,
        description: "skipped padding",
        bits_per_char: 1,
        is_signed: false,
        endianness_variants: false,
        allowed_sizes: AllowedSizes::Any,
    },
];

/// The registry entry for a kind.
pub fn info(kind: Kind) -> &'static KindInfo {
    REGISTRY
        .iter()
        .find(|entry| entry.kind == kind)
        .expect("every kind has a registry entry")
}

/// All registered kinds, in declaration order.
pub fn kinds() -> impl Iterator<Item = &'static KindInfo> {
    REGISTRY.iter()
}
