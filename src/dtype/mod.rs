//! Typed codecs between bit sequences and native values.
//!
//! A [`Dtype`] is one of three shapes: a [`DtypeSingle`] (one value of one
//! [`Kind`]), a [`DtypeArray`] (a counted run of one fixed-size single) or
//! a [`DtypeTuple`] (an ordered heterogeneous sequence). Sizes and item
//! counts may be expressions, resolved against an environment with
//! [`Dtype::evaluate`] before packing or unpacking.
//!
//! ```
//! use bitloom::{Dtype, Value};
//!
//! let d: Dtype = "i7".parse().unwrap();
//! let bits = d.pack(&Value::from(-31i64)).unwrap();
//! assert_eq!(bits.to_bin(), "1100001");
//! assert_eq!(d.unpack(&bits).unwrap(), Value::from(-31i64));
//! ```

mod defs;
mod kind;
pub mod registry;

pub use kind::{Endianness, Kind};
pub use registry::{AllowedSizes, KindInfo};

use std::fmt;
use std::str::FromStr;

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::expr::Expression;
use crate::parser;
use crate::value::Value;

fn const_count(e: &Expression) -> Option<usize> {
    e.const_value().and_then(|v| v.to_count().ok())
}

/// A single-kind dtype such as `u12`, `f64_le` or `hex{w}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DtypeSingle {
    kind: Kind,
    /// Size in the kind's character unit; `None` means "consume the
    /// remainder" (unpack only).
    size: Option<Expression>,
    endianness: Endianness,
}

impl DtypeSingle {
    /// Build and validate a single dtype.
    pub fn new(kind: Kind, size: Option<Expression>, endianness: Endianness) -> Result<Self> {
        let info = registry::info(kind);
        // Kinds with exactly one legal size (bool) imply it.
        let size = size.or_else(|| info.allowed_sizes.single().map(Expression::from_int));
        if let Some(n) = size.as_ref().and_then(const_count) {
            if !info.allowed_sizes.contains(n) {
                return Err(Error::BadDtype(format!(
                    "a size of {n} is not allowed for the '{kind}' dtype"
                )));
            }
            if n == 0 && matches!(kind, Kind::Uint | Kind::Int) {
                return Err(Error::BadDtype(format!(
                    "the '{kind}' dtype needs a non-zero size"
                )));
            }
        }
        if !endianness.is_unspecified() {
            if !info.endianness_variants {
                return Err(Error::BadDtype(format!(
                    "the '{kind}' dtype does not support endianness modifiers"
                )));
            }
            if let Some(n) = size.as_ref().and_then(const_count) {
                if n * info.bits_per_char % 8 != 0 {
                    return Err(Error::BadDtype(format!(
                        "endianness needs a whole-byte dtype, but '{kind}{n}' is {} bits",
                        n * info.bits_per_char
                    )));
                }
            }
        }
        Ok(DtypeSingle {
            kind,
            size,
            endianness,
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The size expression, in the kind's character unit.
    pub fn size(&self) -> Option<&Expression> {
        self.size.as_ref()
    }

    /// Total length in bits, when known.
    pub fn bit_length(&self) -> Option<usize> {
        let chars = self.size.as_ref().and_then(const_count)?;
        Some(chars * registry::info(self.kind).bits_per_char)
    }

    /// Whether this dtype stretches to the end of the available bits.
    pub fn has_dynamic_size(&self) -> bool {
        self.size.is_none()
    }

    /// Whether no unresolved size expression remains.
    pub fn is_concrete(&self) -> bool {
        match &self.size {
            None => true,
            Some(e) => e.const_value().is_some(),
        }
    }

    /// A descriptive sentence about the dtype. The text is for people
    /// and not part of the data contract.
    pub fn info(&self) -> String {
        let info = registry::info(self.kind);
        let len = match (self.bit_length(), &self.size) {
            (Some(n), Some(size)) if info.bits_per_char != 1 => {
                format!("{n} bit ({size} character)")
            }
            (Some(n), _) => format!("{n} bit"),
            (None, Some(size)) => format!("{size} sized"),
            (None, None) => "variable length".into(),
        };
        let endian = match self.endianness {
            Endianness::Big => "big-endian ",
            Endianness::Little => "little-endian ",
            Endianness::Native => "native-endian ",
            Endianness::Unspecified => "",
        };
        format!("{len} {endian}{}", info.description)
    }

    /// Resolve a size expression against an environment.
    pub fn evaluate(&self, env: &Env) -> Result<DtypeSingle> {
        match &self.size {
            Some(e) if e.const_value().is_none() => {
                let n = e.evaluate_count(env)?;
                DtypeSingle::new(self.kind, Some(Expression::from_int(n)), self.endianness)
            }
            _ => Ok(self.clone()),
        }
    }

    fn checked_bit_length(&self) -> Result<Option<usize>> {
        match &self.size {
            None => Ok(None),
            Some(e) => match const_count(e) {
                Some(n) => Ok(Some(n * registry::info(self.kind).bits_per_char)),
                None => Err(Error::BadDtype(format!(
                    "'{self}' has an unresolved size expression; evaluate it first"
                ))),
            },
        }
    }

    fn value_error(&self, value: &Value) -> Error {
        Error::OutOfRange(format!("cannot pack {value} with the '{self}' dtype"))
    }

    /// Encode a value into exactly this dtype's bits.
    pub fn pack(&self, value: &Value) -> Result<Bits> {
        let bitlen = self.checked_bit_length()?;
        let need_size = || {
            Error::BadDtype(format!(
                "'{self}' has no size, so cannot pack a value"
            ))
        };
        let packed = match self.kind {
            Kind::Uint => {
                let i = value.as_int().ok_or_else(|| self.value_error(value))?;
                defs::pack_uint(&i, bitlen.ok_or_else(need_size)?)?
            }
            Kind::Int => {
                let i = value.as_int().ok_or_else(|| self.value_error(value))?;
                defs::pack_int(&i, bitlen.ok_or_else(need_size)?)?
            }
            Kind::Float => {
                let f = value.as_f64().ok_or_else(|| self.value_error(value))?;
                defs::pack_float(f, bitlen.ok_or_else(need_size)?)?
            }
            Kind::Bool => {
                let b = match value {
                    Value::Bool(b) => *b,
                    other => match other.as_int() {
                        Some(i) if i == 0u8.into() => false,
                        Some(i) if i == 1u8.into() => true,
                        _ => return Err(self.value_error(value)),
                    },
                };
                Bits::from_bools([b])
            }
            Kind::Bytes => match value {
                Value::Bytes(data) => Bits::from_bytes(data),
                _ => return Err(self.value_error(value)),
            },
            Kind::Hex => match value {
                Value::Str(s) => Bits::from_hex(s)?,
                _ => return Err(self.value_error(value)),
            },
            Kind::Bin => match value {
                Value::Str(s) => Bits::from_bin(s)?,
                _ => return Err(self.value_error(value)),
            },
            Kind::Oct => match value {
                Value::Str(s) => Bits::from_oct(s)?,
                _ => return Err(self.value_error(value)),
            },
            Kind::Bits => match value {
                Value::Bits(b) => b.clone(),
                _ => return Err(self.value_error(value)),
            },
            // Padding ignores the value and emits zeros.
            Kind::Pad => Bits::from_zeros(bitlen.ok_or_else(need_size)?),
        };
        if let Some(n) = bitlen {
            if packed.len() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    actual: packed.len(),
                });
            }
        }
        if self.endianness.is_effectively_little() {
            return defs::byte_swapped(&packed);
        }
        Ok(packed)
    }

    /// Decode a value from an exact-length input; dynamic dtypes consume
    /// the whole input.
    pub fn unpack(&self, b: &Bits) -> Result<Value> {
        if let Some(n) = self.checked_bit_length()? {
            if b.len() != n {
                return Err(Error::LengthMismatch {
                    expected: n,
                    actual: b.len(),
                });
            }
        }
        let swapped;
        let b = if self.endianness.is_effectively_little() {
            swapped = defs::byte_swapped(b)?;
            &swapped
        } else {
            b
        };
        match self.kind {
            Kind::Uint => Ok(Value::Int(defs::unpack_uint(b)?)),
            Kind::Int => Ok(Value::Int(defs::unpack_int(b)?)),
            Kind::Float => Ok(Value::Float(defs::unpack_float(b)?)),
            Kind::Bool => {
                if b.len() != 1 {
                    return Err(Error::LengthMismatch {
                        expected: 1,
                        actual: b.len(),
                    });
                }
                Ok(Value::Bool(b.bit(0)?))
            }
            Kind::Bytes => {
                if b.len() % 8 != 0 {
                    return Err(Error::Alignment(format!(
                        "cannot interpret {} bits as bytes",
                        b.len()
                    )));
                }
                Ok(Value::Bytes(b.to_bytes()))
            }
            Kind::Hex => Ok(Value::Str(b.to_hex()?)),
            Kind::Bin => Ok(Value::Str(b.to_bin())),
            Kind::Oct => Ok(Value::Str(b.to_oct()?)),
            Kind::Bits => Ok(Value::Bits(b.clone())),
            Kind::Pad => Ok(Value::Null),
        }
    }
}

impl fmt::Display for DtypeSingle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = registry::info(self.kind);
        write!(f, "{}", self.kind)?;
        if info.allowed_sizes.single().is_none() {
            if let Some(size) = &self.size {
                write!(f, "{size}")?;
            }
        }
        write!(f, "{}", self.endianness.suffix())
    }
}

/// A counted run of one fixed-size single dtype, e.g. `[u8; 6]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DtypeArray {
    item: DtypeSingle,
    /// Item count; `None` means "to the end of the available bits"
    /// (unpack only).
    items: Option<Expression>,
}

impl DtypeArray {
    pub fn new(item: DtypeSingle, items: Option<Expression>) -> Result<Self> {
        if item.has_dynamic_size() {
            return Err(Error::BadDtype(format!(
                "array items must have a fixed size, got '{item}'"
            )));
        }
        Ok(DtypeArray { item, items })
    }

    pub fn item(&self) -> &DtypeSingle {
        &self.item
    }

    pub fn items(&self) -> Option<&Expression> {
        self.items.as_ref()
    }

    pub fn bit_length(&self) -> Option<usize> {
        let item = self.item.bit_length()?;
        let items = self.items.as_ref().and_then(const_count)?;
        Some(item * items)
    }

    /// A descriptive sentence about the array dtype.
    pub fn info(&self) -> String {
        let items = match &self.items {
            Some(items) => format!("{items} items"),
            None => "a variable number of items".into(),
        };
        format!("array of {}s with {items}", self.item.info())
    }

    pub fn has_dynamic_size(&self) -> bool {
        self.items.is_none()
    }

    pub fn is_concrete(&self) -> bool {
        self.item.is_concrete()
            && match &self.items {
                None => true,
                Some(e) => e.const_value().is_some(),
            }
    }

    pub fn evaluate(&self, env: &Env) -> Result<DtypeArray> {
        let item = self.item.evaluate(env)?;
        let items = match &self.items {
            Some(e) if e.const_value().is_none() => {
                Some(Expression::from_int(e.evaluate_count(env)?))
            }
            other => other.clone(),
        };
        DtypeArray::new(item, items)
    }

    fn item_bits(&self) -> Result<usize> {
        let n = self.item.checked_bit_length()?.expect("array items are sized");
        if n == 0 {
            return Err(Error::BadDtype(format!(
                "array items must be at least one bit, got '{}'",
                self.item
            )));
        }
        Ok(n)
    }

    /// Concatenate per-element packs; the sequence length must match the
    /// item count.
    pub fn pack(&self, value: &Value) -> Result<Bits> {
        if let Value::Bits(b) = value {
            // A pre-packed bit sequence of exactly the right length passes
            // through untouched.
            return match self.bit_length() {
                Some(n) if b.len() == n => Ok(b.clone()),
                Some(n) => Err(Error::LengthMismatch {
                    expected: n,
                    actual: b.len(),
                }),
                None => Ok(b.clone()),
            };
        }
        let Value::List(values) = value else {
            return Err(Error::OutOfRange(format!(
                "cannot pack {value} with the '{self}' dtype"
            )));
        };
        if let Some(e) = &self.items {
            match const_count(e) {
                Some(n) if values.len() == n => {}
                Some(n) => {
                    return Err(Error::OutOfRange(format!(
                        "'{self}' expects {n} items, but got {}",
                        values.len()
                    )))
                }
                None => {
                    return Err(Error::BadDtype(format!(
                        "'{self}' has an unresolved item count; evaluate it first"
                    )))
                }
            }
        }
        let parts = values
            .iter()
            .map(|v| self.item.pack(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Bits::from_joined(&parts))
    }

    /// Split the input into item-sized windows and unpack each.
    pub fn unpack(&self, b: &Bits) -> Result<Value> {
        let item_bits = self.item_bits()?;
        let n = match &self.items {
            Some(e) => match const_count(e) {
                Some(n) => {
                    if b.len() != n * item_bits {
                        return Err(Error::LengthMismatch {
                            expected: n * item_bits,
                            actual: b.len(),
                        });
                    }
                    n
                }
                None => {
                    return Err(Error::BadDtype(format!(
                        "'{self}' has an unresolved item count; evaluate it first"
                    )))
                }
            },
            None => {
                if b.len() % item_bits != 0 {
                    return Err(Error::LengthMismatch {
                        expected: b.len() / item_bits * item_bits,
                        actual: b.len(),
                    });
                }
                b.len() / item_bits
            }
        };
        let values = (0..n)
            .map(|i| {
                self.item
                    .unpack(&b.slice_unchecked(i * item_bits, (i + 1) * item_bits))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::List(values))
    }
}

impl fmt::Display for DtypeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.items {
            Some(items) => write!(f, "[{}; {items}]", self.item),
            None => write!(f, "[{};]", self.item),
        }
    }
}

/// An ordered heterogeneous sequence of dtypes, e.g. `(bool, u7, hex4)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DtypeTuple {
    elems: Vec<Dtype>,
}

impl DtypeTuple {
    /// At most one element may have a dynamic size.
    pub fn new(elems: Vec<Dtype>) -> Result<Self> {
        let dynamic = elems.iter().filter(|d| d.has_dynamic_size()).count();
        if dynamic > 1 {
            return Err(Error::BadDtype(format!(
                "a tuple dtype can hold at most one dynamically sized element, found {dynamic}"
            )));
        }
        Ok(DtypeTuple { elems })
    }

    pub fn elems(&self) -> &[Dtype] {
        &self.elems
    }

    /// Number of elements, including padding.
    pub fn arity(&self) -> usize {
        self.elems.len()
    }

    pub fn bit_length(&self) -> Option<usize> {
        self.elems.iter().map(Dtype::bit_length).sum()
    }

    /// A descriptive sentence about the tuple dtype.
    pub fn info(&self) -> String {
        let parts: Vec<String> = self.elems.iter().map(Dtype::info).collect();
        format!("tuple of ({})", parts.join(", "))
    }

    pub fn has_dynamic_size(&self) -> bool {
        self.elems.iter().any(Dtype::has_dynamic_size)
    }

    pub fn is_concrete(&self) -> bool {
        self.elems.iter().all(Dtype::is_concrete)
    }

    pub fn evaluate(&self, env: &Env) -> Result<DtypeTuple> {
        let elems = self
            .elems
            .iter()
            .map(|d| d.evaluate(env))
            .collect::<Result<Vec<_>>>()?;
        DtypeTuple::new(elems)
    }

    fn is_pad(d: &Dtype) -> bool {
        matches!(d, Dtype::Single(s) if s.kind() == Kind::Pad)
    }

    /// Concatenate element packs. Padding elements emit zeros and do not
    /// consume an input value.
    pub fn pack(&self, value: &Value) -> Result<Bits> {
        let Value::List(values) = value else {
            return Err(Error::OutOfRange(format!(
                "cannot pack {value} with the '{self}' dtype"
            )));
        };
        let consuming = self.elems.iter().filter(|d| !Self::is_pad(d)).count();
        if values.len() != consuming {
            return Err(Error::OutOfRange(format!(
                "'{self}' expects {consuming} values, but got {}",
                values.len()
            )));
        }
        let mut parts = Vec::with_capacity(self.elems.len());
        let mut next = values.iter();
        for elem in &self.elems {
            if Self::is_pad(elem) {
                parts.push(elem.pack(&Value::Null)?);
            } else {
                parts.push(elem.pack(next.next().expect("arity checked"))?);
            }
        }
        Ok(Bits::from_joined(&parts))
    }

    /// Unpack each element in order; a single dynamic element receives the
    /// slack. Padding unpacks to no value.
    pub fn unpack(&self, b: &Bits) -> Result<Value> {
        let mut fixed = 0;
        let mut dynamic_index = None;
        for (i, elem) in self.elems.iter().enumerate() {
            if elem.has_dynamic_size() {
                dynamic_index = Some(i);
            } else {
                fixed += elem.bit_length().ok_or_else(|| {
                    Error::BadDtype(format!(
                        "'{elem}' has an unresolved size expression; evaluate it first"
                    ))
                })?;
            }
        }
        match dynamic_index {
            Some(_) if b.len() < fixed => {
                return Err(Error::ShortInput {
                    needed: fixed,
                    available: b.len(),
                })
            }
            None if b.len() != fixed => {
                return Err(Error::LengthMismatch {
                    expected: fixed,
                    actual: b.len(),
                })
            }
            _ => {}
        }
        let mut values = Vec::with_capacity(self.elems.len());
        let mut pos = 0;
        for (i, elem) in self.elems.iter().enumerate() {
            let len = if dynamic_index == Some(i) {
                b.len() - fixed
            } else {
                elem.bit_length().expect("checked above")
            };
            let v = elem.unpack(&b.slice_unchecked(pos, pos + len))?;
            pos += len;
            if !Self::is_pad(elem) {
                values.push(v);
            }
        }
        Ok(Value::List(values))
    }
}

impl fmt::Display for DtypeTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.elems.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

/// Any dtype shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Dtype {
    Single(DtypeSingle),
    Array(DtypeArray),
    Tuple(DtypeTuple),
}

impl Dtype {
    /// Parse a dtype token string such as `"u12"`, `"[f16; 5]"` or
    /// `"(bool, u7)"`.
    pub fn from_string(s: &str) -> Result<Dtype> {
        parser::parse_dtype(s)
    }

    /// Total length in bits, when fully known.
    pub fn bit_length(&self) -> Option<usize> {
        match self {
            Dtype::Single(d) => d.bit_length(),
            Dtype::Array(d) => d.bit_length(),
            Dtype::Tuple(d) => d.bit_length(),
        }
    }

    /// Whether the dtype stretches to the end of the available bits.
    pub fn has_dynamic_size(&self) -> bool {
        match self {
            Dtype::Single(d) => d.has_dynamic_size(),
            Dtype::Array(d) => d.has_dynamic_size(),
            Dtype::Tuple(d) => d.has_dynamic_size(),
        }
    }

    /// Whether no unresolved size or count expression remains.
    pub fn is_concrete(&self) -> bool {
        match self {
            Dtype::Single(d) => d.is_concrete(),
            Dtype::Array(d) => d.is_concrete(),
            Dtype::Tuple(d) => d.is_concrete(),
        }
    }

    /// Resolve size and count expressions against an environment.
    pub fn evaluate(&self, env: &Env) -> Result<Dtype> {
        Ok(match self {
            Dtype::Single(d) => Dtype::Single(d.evaluate(env)?),
            Dtype::Array(d) => Dtype::Array(d.evaluate(env)?),
            Dtype::Tuple(d) => Dtype::Tuple(d.evaluate(env)?),
        })
    }

    /// Encode a value.
    pub fn pack(&self, value: &Value) -> Result<Bits> {
        match self {
            Dtype::Single(d) => d.pack(value),
            Dtype::Array(d) => d.pack(value),
            Dtype::Tuple(d) => d.pack(value),
        }
    }

    /// Decode a value from an exact-length input.
    pub fn unpack(&self, b: &Bits) -> Result<Value> {
        match self {
            Dtype::Single(d) => d.unpack(b),
            Dtype::Array(d) => d.unpack(b),
            Dtype::Tuple(d) => d.unpack(b),
        }
    }

    /// Whether this is a single padding dtype.
    pub fn is_pad(&self) -> bool {
        matches!(self, Dtype::Single(s) if s.kind() == Kind::Pad)
    }

    /// A descriptive sentence about the dtype, for diagnostics and
    /// interactive use. Not part of the data contract.
    pub fn info(&self) -> String {
        match self {
            Dtype::Single(d) => d.info(),
            Dtype::Array(d) => d.info(),
            Dtype::Tuple(d) => d.info(),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Single(d) => write!(f, "{d}"),
            Dtype::Array(d) => write!(f, "{d}"),
            Dtype::Tuple(d) => write!(f, "{d}"),
        }
    }
}

impl FromStr for Dtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Dtype::from_string(s)
    }
}

impl FromStr for DtypeSingle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Dtype::from_string(s)? {
            Dtype::Single(single) => Ok(single),
            other => Err(Error::BadDtype(format!(
                "'{other}' is not a single dtype"
            ))),
        }
    }
}

impl From<DtypeSingle> for Dtype {
    fn from(d: DtypeSingle) -> Dtype {
        Dtype::Single(d)
    }
}

impl From<DtypeArray> for Dtype {
    fn from(d: DtypeArray) -> Dtype {
        Dtype::Array(d)
    }
}

impl From<DtypeTuple> for Dtype {
    fn from(d: DtypeTuple) -> Dtype {
        Dtype::Tuple(d)
    }
}
