//! Error taxonomy for the whole crate.
//!
//! Every fallible operation returns [`Error`] through the crate-local
//! [`Result`] alias. The taxonomy is closed: each variant corresponds to one
//! family of failure, and callers can branch on the family with the
//! `is_*` helpers generated by `strum`.

use strum::EnumIs;
use thiserror::Error;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of error families surfaced by the library.
#[derive(Debug, Clone, PartialEq, Eq, Error, EnumIs)]
pub enum Error {
    /// A bit-literal, dtype or schema string was rejected by the grammar.
    #[error("syntax error: {0}")]
    BadSyntax(String),

    /// A kind, size and endianness combination that does not make sense.
    #[error("invalid dtype: {0}")]
    BadDtype(String),

    /// A value does not fit its dtype, a count is negative, or an index is
    /// outside the addressable window.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Two operands whose lengths must agree did not.
    #[error("length mismatch: expected {expected} bits, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// An operation that requires byte (or k-byte) alignment was applied to
    /// an unaligned length.
    #[error("alignment error: {0}")]
    Alignment(String),

    /// A parse ran off the end of the available bits.
    #[error("not enough bits: needed {needed}, but only {available} available")]
    ShortInput { needed: usize, available: usize },

    /// A const field did not match the bits it was parsed against.
    #[error("const mismatch: {0}")]
    ConstMismatch(String),

    /// An expression referenced a name with no binding in scope.
    #[error("unresolved name '{0}'")]
    UnresolvedName(String),

    /// Division by zero or a comparable arithmetic failure.
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// A structurally invalid schema, e.g. duplicate sibling names.
    #[error("schema error: {0}")]
    SchemaError(String),
}
