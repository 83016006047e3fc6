//! bitloom: arbitrary-length bit sequences and a declarative binary
//! format language.
//!
//! The crate has three tightly coupled layers:
//! - the bit engine: [`Bits`] (immutable, zero-copy slicing) and
//!   [`MutableBits`] (an exclusively owned builder), with searching,
//!   bitwise algebra and packed byte I/O;
//! - the typed codec: [`Dtype`] packs and unpacks integers of any bit
//!   width, IEEE floats, booleans, hex/bin/oct/byte strings and padding,
//!   with configurable endianness;
//! - the format interpreter: [`FieldType`] trees built from a small
//!   declarative language, with constants, conditionals, repetition and
//!   field-cross-referencing expressions.
//!
//! Bit numbering is MSB0 throughout: bit zero is the most significant bit
//! of the first byte.
//!
//! ```
//! use bitloom::{Bits, FieldType, Value};
//!
//! // Bit-level construction and inspection.
//! let bits = Bits::from_string("0b001, u32 = 90, 0x5e").unwrap();
//! assert_eq!(bits.len(), 43);
//! assert_eq!(bits.slice(3, 35).unwrap().count(true), 4);
//!
//! // A schema with an expression-driven array size.
//! let mut schema = FieldType::from_string(
//!     "(w: u12, h: u12, pixels: [u8; {w * h}])",
//! ).unwrap();
//! let packed = schema.pack(&Value::List(vec![
//!     Value::from(2i64),
//!     Value::from(3i64),
//!     Value::List((0..6i64).map(Value::from).collect()),
//! ])).unwrap();
//! assert_eq!(packed.len(), 72);
//! assert_eq!(schema.parse(&packed, 0).unwrap(), 72);
//! ```
#![warn(missing_docs)]

pub mod array;
pub mod bits;
pub mod dtype;
pub mod error;
pub mod expr;
pub mod iter;
pub mod mutable;
mod options;
mod parser;
mod pretty;
pub mod schema;
mod search;
mod store;
pub mod value;

pub use array::TypedArray;
pub use bits::Bits;
pub use dtype::{Dtype, DtypeArray, DtypeSingle, DtypeTuple, Endianness, Kind};
pub use error::{Error, Result};
pub use expr::env::Env;
pub use expr::Expression;
pub use mutable::MutableBits;
pub use options::{options, update_options, Options};
pub use schema::{Field, FieldType, Format, If, Let, Repeat};
pub use value::Value;
