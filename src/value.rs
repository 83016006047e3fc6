//! The dynamic value type exchanged between the codec and the interpreter.

use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use strum::EnumIs;

use crate::bits::Bits;
use crate::error::{Error, Result};

/// A value produced by unpacking a dtype or consumed when packing one.
///
/// Integer values are arbitrary precision; `Record` carries the named
/// children of a parsed `Format` so that dotted-path expressions such as
/// `header.size` can reach into substructures.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Value {
    /// The absence of a value; only produced by padding.
    Null,
    /// A single-bit boolean.
    Bool(bool),
    /// An arbitrary-precision integer (both signed and unsigned dtypes).
    Int(BigInt),
    /// A 64-bit float; narrower float dtypes widen on unpack.
    Float(f64),
    /// Text for the hex/bin/oct string kinds.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An immutable bit sequence.
    Bits(Bits),
    /// An ordered sequence (array/tuple dtypes, `Format` and `Repeat` results).
    List(Vec<Value>),
    /// Named children of a parsed `Format`, in document order.
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Integer view of the value, accepting `Bool` as 0/1.
    pub fn as_int(&self) -> Option<BigInt> {
        match self {
            Value::Int(i) => Some(i.clone()),
            Value::Bool(b) => Some(BigInt::from(*b as u8)),
            _ => None,
        }
    }

    /// Float view, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => i.to_f64(),
            Value::Bool(b) => Some(*b as u8 as f64),
            _ => None,
        }
    }

    /// Boolean context: zero, empty and `Null` are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => !i.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Bits(b) => !b.is_empty(),
            Value::List(v) => !v.is_empty(),
            Value::Record(v) => !v.is_empty(),
        }
    }

    /// Interpret as a non-negative count.
    pub fn to_count(&self) -> Result<usize> {
        let i = self
            .as_int()
            .ok_or_else(|| Error::OutOfRange(format!("expected an integer count, got {self}")))?;
        if i.is_negative() {
            return Err(Error::OutOfRange(format!("count must be non-negative, got {i}")));
        }
        i.to_usize()
            .ok_or_else(|| Error::OutOfRange(format!("count {i} is too large")))
    }

    /// Look up a named child of a `Record`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(entries) => entries.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Index into a `List` or `Bits`.
    pub fn index(&self, i: usize) -> Result<Value> {
        match self {
            Value::List(items) => items.get(i).cloned().ok_or_else(|| {
                Error::OutOfRange(format!("index {i} out of range for a list of {}", items.len()))
            }),
            Value::Bits(b) => b.bit(i).map(Value::Bool),
            _ => Err(Error::OutOfRange(format!("{self} cannot be indexed"))),
        }
    }
}

/// Floor division, matching the expression language semantics.
pub(crate) fn floor_div(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(Error::Arithmetic("division by zero".into()));
    }
    let q = a / b;
    if !(a % b).is_zero() && (a.is_negative() != b.is_negative()) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Remainder paired with [`floor_div`]: the result takes the divisor's sign.
pub(crate) fn floor_mod(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    let q = floor_div(a, b)?;
    Ok(a - q * b)
}

fn float_operands(a: &Value, b: &Value) -> Option<(f64, f64)> {
    if a.is_float() || b.is_float() {
        Some((a.as_f64()?, b.as_f64()?))
    } else {
        None
    }
}

macro_rules! arith_fn {
    ($name:ident, $op:tt, $int_body:expr) => {
        /// Element arithmetic shared by expressions and typed arrays.
        pub(crate) fn $name(a: &Value, b: &Value) -> Result<Value> {
            if let Some((x, y)) = float_operands(a, b) {
                return Ok(Value::Float(x $op y));
            }
            match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => $int_body(x, y),
                _ => Err(Error::Arithmetic(format!(
                    "cannot apply '{}' to {a} and {b}",
                    stringify!($op)
                ))),
            }
        }
    };
}

arith_fn!(add_values, +, |x: BigInt, y: BigInt| Ok(Value::Int(x + y)));
arith_fn!(sub_values, -, |x: BigInt, y: BigInt| Ok(Value::Int(x - y)));
arith_fn!(mul_values, *, |x: BigInt, y: BigInt| Ok(Value::Int(x * y)));
arith_fn!(div_values, /, |x: BigInt, y: BigInt| floor_div(&x, &y).map(Value::Int));

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bytes(b) => {
                write!(f, "\"")?;
                for byte in b {
                    if byte.is_ascii_graphic() || *byte == b' ' {
                        write!(f, "{}", *byte as char)?;
                    } else {
                        write!(f, "\\x{byte:02x}")?;
                    }
                }
                write!(f, "\"")
            }
            Value::Bits(b) => write!(f, "{b}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Record(entries) => {
                write!(f, "{{")?;
                for (i, (n, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{n}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(BigInt::from(i))
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Bits> for Value {
    fn from(b: Bits) -> Self {
        Value::Bits(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_follows_sign_rules() {
        let d = |a: i64, b: i64| floor_div(&BigInt::from(a), &BigInt::from(b)).unwrap();
        assert_eq!(d(7, 2), BigInt::from(3));
        assert_eq!(d(-7, 2), BigInt::from(-4));
        assert_eq!(d(7, -2), BigInt::from(-4));
        assert_eq!(d(-7, -2), BigInt::from(3));
    }

    #[test]
    fn floor_mod_takes_divisor_sign() {
        let m = |a: i64, b: i64| floor_mod(&BigInt::from(a), &BigInt::from(b)).unwrap();
        assert_eq!(m(7, 3), BigInt::from(1));
        assert_eq!(m(-7, 3), BigInt::from(2));
        assert_eq!(m(7, -3), BigInt::from(-2));
    }

    #[test]
    fn division_by_zero_is_reported() {
        let err = floor_div(&BigInt::from(1), &BigInt::from(0)).unwrap_err();
        assert!(err.is_arithmetic());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Int(BigInt::from(0)).truthy());
        assert!(Value::Int(BigInt::from(-3)).truthy());
        assert!(!Value::Str(String::new()).truthy());
    }

    #[test]
    fn mixed_arithmetic_widens_to_float() {
        let v = add_values(&Value::from(1i64), &Value::Float(0.5)).unwrap();
        assert_eq!(v, Value::Float(1.5));
    }
}
