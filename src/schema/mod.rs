//! The schema tree and its interpreter.
//!
//! A schema is an immutable tree of [`FieldType`] nodes built from text or
//! from parameters. Parsing and packing walk the tree in document order,
//! maintaining a scoped name environment; the per-invocation bindings (the
//! bits each field matched, the branch an `if` took, the iterations a
//! `repeat` made) live on the nodes and are wiped by [`FieldType::clear`].
//!
//! ```
//! use bitloom::{Bits, FieldType, Value};
//!
//! let mut schema = FieldType::from_string("(w: u8, data: [u8; {w}])").unwrap();
//! let input = Bits::from_bytes([2, 10, 20]);
//! assert_eq!(schema.parse(&input, 0).unwrap(), 24);
//! let tree = schema.unpack().unwrap();
//! assert_eq!(
//!     tree,
//!     Value::List(vec![
//!         Value::from(2i64),
//!         Value::List(vec![Value::from(10i64), Value::from(20i64)]),
//!     ])
//! );
//! ```

pub mod binding;
pub mod cond;
pub mod field;
pub mod format;
pub mod repeat;

pub use binding::Let;
pub use cond::If;
pub use field::Field;
pub use format::Format;
pub use repeat::Repeat;

use std::fmt;
use std::str::FromStr;

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::parser;
use crate::value::Value;

/// Any schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Field(Field),
    Format(Format),
    If(If),
    Repeat(Repeat),
    Let(Let),
    Pass,
}

impl FieldType {
    /// Parse a schema definition string; the node type is inferred.
    pub fn from_string(s: &str) -> Result<FieldType> {
        parser::parse_field_type(s)
    }

    /// Parse the schema from bits, starting at `offset`. Child nodes are
    /// bound as they match; the return value is the number of bits
    /// consumed.
    ///
    /// On error, the bindings made before the failing step are kept.
    pub fn parse(&mut self, b: &Bits, offset: usize) -> Result<usize> {
        if offset > b.len() {
            return Err(Error::OutOfRange(format!(
                "offset {offset} is beyond the {} available bits",
                b.len()
            )));
        }
        self.clear();
        let mut env = Env::new();
        self.parse_step(b, offset, &mut env)
    }

    /// Bind child nodes from the given values and return the built bits.
    ///
    /// A child that already carries a value — a constant, a field preset
    /// at construction, or a binding left by an earlier walk — supplies
    /// its own bits and does not pull from the input. Use
    /// [`FieldType::clear`] first to rebind everything from fresh values.
    pub fn pack(&mut self, value: &Value) -> Result<Bits> {
        let mut env = Env::new();
        let value = if self.consumes_value() { Some(value) } else { None };
        self.pack_value(value, &mut env)
    }

    /// Like [`FieldType::pack`], but leaves this tree's state untouched.
    pub fn build(&self, value: &Value) -> Result<Bits> {
        self.clone().pack(value)
    }

    /// The value tree bound by the last parse or pack. `Let`, `pass`,
    /// padding and const fields contribute nothing, so the output has the
    /// same shape [`FieldType::pack`] consumes; an `if` contributes its
    /// taken branch.
    pub fn unpack(&self) -> Result<Value> {
        self.unpack_value()
    }

    /// Reassemble the bits of the current bindings.
    pub fn to_bits(&self) -> Result<Bits> {
        match self {
            FieldType::Field(f) => f.to_bits(),
            FieldType::Format(f) => f.to_bits(),
            FieldType::If(i) => i.to_bits(),
            FieldType::Repeat(r) => r.to_bits(),
            FieldType::Let(_) | FieldType::Pass => Ok(Bits::new()),
        }
    }

    /// The bytes of [`FieldType::to_bits`], zero-padded at the tail.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_bits()?.to_bytes())
    }

    /// Unbind every non-const node.
    pub fn clear(&mut self) {
        match self {
            FieldType::Field(f) => f.clear(),
            FieldType::Format(f) => f.clear(),
            FieldType::If(i) => i.clear(),
            FieldType::Repeat(r) => r.clear(),
            FieldType::Let(_) | FieldType::Pass => {}
        }
    }

    /// Whether this node pulls a value when packing.
    pub(crate) fn consumes_value(&self) -> bool {
        match self {
            FieldType::Field(f) => f.consumes_value(),
            FieldType::Format(_) => true,
            FieldType::If(i) => i.consumes_value(),
            FieldType::Repeat(r) => r.consumes_value(),
            FieldType::Let(_) | FieldType::Pass => false,
        }
    }

    /// Whether this node is invisible in an unpacked value tree. Const
    /// fields are fixed by the schema and carry no information, so they
    /// are omitted just as `pack` never pulls a value for them.
    pub(crate) fn is_silent(&self) -> bool {
        match self {
            FieldType::Field(f) => f.dtype().is_pad() || f.is_const(),
            FieldType::Let(_) | FieldType::Pass => true,
            _ => false,
        }
    }

    pub(crate) fn parse_step(&mut self, b: &Bits, pos: usize, env: &mut Env) -> Result<usize> {
        match self {
            FieldType::Field(f) => f.parse_step(b, pos, env),
            FieldType::Format(f) => f.parse_step(b, pos, env),
            FieldType::If(i) => i.parse_step(b, pos, env),
            FieldType::Repeat(r) => r.parse_step(b, pos, env),
            FieldType::Let(l) => {
                l.bind(env)?;
                Ok(0)
            }
            FieldType::Pass => Ok(0),
        }
    }

    pub(crate) fn pack_value(&mut self, value: Option<&Value>, env: &mut Env) -> Result<Bits> {
        match self {
            FieldType::Field(f) => f.pack_value(value, env),
            FieldType::Format(f) => f.pack_value(value, env),
            FieldType::If(i) => i.pack_value(value, env),
            FieldType::Repeat(r) => r.pack_value(value, env),
            FieldType::Let(l) => {
                l.bind(env)?;
                Ok(Bits::new())
            }
            FieldType::Pass => Ok(Bits::new()),
        }
    }

    pub(crate) fn unpack_value(&self) -> Result<Value> {
        match self {
            FieldType::Field(f) => f.unpack_value(),
            FieldType::Format(f) => f.unpack_value(),
            FieldType::If(i) => i.unpack_value(),
            FieldType::Repeat(r) => r.unpack_value(),
            FieldType::Let(_) | FieldType::Pass => Ok(Value::Null),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Field(x) => write!(f, "{x}"),
            FieldType::Format(x) => write!(f, "{x}"),
            FieldType::If(x) => write!(f, "{x}"),
            FieldType::Repeat(x) => write!(f, "{x}"),
            FieldType::Let(x) => write!(f, "{x}"),
            FieldType::Pass => write!(f, "pass"),
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::from_string(s)
    }
}

impl From<Field> for FieldType {
    fn from(f: Field) -> FieldType {
        FieldType::Field(f)
    }
}

impl From<Format> for FieldType {
    fn from(f: Format) -> FieldType {
        FieldType::Format(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(s: &str) -> FieldType {
        FieldType::from_string(s).unwrap()
    }

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().map(|&v| Value::from(v)).collect())
    }

    #[test]
    fn simple_format_round_trip() {
        let mut s = schema("(a: u8, b: u16)");
        let packed = s
            .pack(&Value::List(vec![Value::from(1i64), Value::from(258i64)]))
            .unwrap();
        assert_eq!(packed.to_bytes(), vec![1, 1, 2]);
        let consumed = s.parse(&packed, 0).unwrap();
        assert_eq!(consumed, 24);
        assert_eq!(s.unpack().unwrap(), ints(&[1, 258]));
        assert_eq!(s.to_bits().unwrap(), packed);
    }

    #[test]
    fn expression_sized_array() {
        let mut s = schema("(w: u12, h: u12, pixels: [u8; {w * h}])");
        let pixels = ints(&[0, 1, 2, 3, 4, 5]);
        let packed = s
            .pack(&Value::List(vec![
                Value::from(2i64),
                Value::from(3i64),
                pixels.clone(),
            ]))
            .unwrap();
        assert_eq!(packed.len(), 12 + 12 + 48);
        let mut fresh = schema("(w: u12, h: u12, pixels: [u8; {w * h}])");
        assert_eq!(fresh.parse(&packed, 0).unwrap(), packed.len());
        let tree = fresh.unpack().unwrap();
        assert_eq!(
            tree,
            Value::List(vec![Value::from(2i64), Value::from(3i64), pixels])
        );
    }

    #[test]
    fn const_fields_validate_on_parse() {
        let mut s = schema("(code: const hex8 = 0x000001b3, size: u12)");
        let good = Bits::from_hex("000001b3040").unwrap();
        assert_eq!(s.parse(&good, 0).unwrap(), 44);
        // The const field is fixed by the schema, so only `size` appears.
        assert_eq!(s.unpack().unwrap(), Value::List(vec![Value::from(0x040i64)]));

        let bad = Bits::from_hex("010001b3040").unwrap();
        let err = s.parse(&bad, 0).unwrap_err();
        assert!(err.is_const_mismatch());
        // The failing step leaves the later field unbound.
        if let FieldType::Format(f) = &s {
            let FieldType::Field(size) = f.child("size").unwrap() else {
                panic!("size should be a field");
            };
            assert!(size.bits().is_none());
        } else {
            panic!("expected a format");
        }
    }

    #[test]
    fn const_fields_do_not_pull_values() {
        let mut s = schema("(code: const u8 = 7, x: u8)");
        let packed = s.pack(&Value::List(vec![Value::from(1i64)])).unwrap();
        assert_eq!(packed.to_bytes(), vec![7, 1]);
    }

    #[test]
    fn unpack_output_feeds_back_into_pack() {
        let text = "(code: const u8 = 7, size: u12)";
        let mut s = schema(text);
        let input = Bits::from_string("u8 = 7, u12 = 320").unwrap();
        assert_eq!(s.parse(&input, 0).unwrap(), 20);
        let tree = s.unpack().unwrap();
        assert_eq!(tree, Value::List(vec![Value::from(320i64)]));
        // The unpacked tree has exactly the shape pack consumes.
        let mut fresh = schema(text);
        assert_eq!(fresh.pack(&tree).unwrap(), input);
    }

    #[test]
    fn preset_fields_supply_their_own_value_on_pack() {
        let dtype: crate::Dtype = "u8".parse().unwrap();
        let preset = Field::new(dtype.clone(), "tag", Some(&Value::from(9i64)), false).unwrap();
        let open = Field::new(dtype, "x", None, false).unwrap();
        let mut s = FieldType::Format(Format::new(vec![preset.into(), open.into()], "").unwrap());
        // Only the unbound field pulls from the input.
        let packed = s.pack(&Value::List(vec![Value::from(1i64)])).unwrap();
        assert_eq!(packed.to_bytes(), vec![9, 1]);
        // Clearing drops the preset, so both fields pull fresh values.
        s.clear();
        let packed = s
            .pack(&Value::List(vec![Value::from(2i64), Value::from(3i64)]))
            .unwrap();
        assert_eq!(packed.to_bytes(), vec![2, 3]);
    }

    #[test]
    fn if_records_the_taken_branch() {
        let mut s = schema("(flag: bool, if {flag}: (x: u8) else: (y: u16))");
        let input = Bits::from_string("0b1, u8 = 42").unwrap();
        assert_eq!(s.parse(&input, 0).unwrap(), 9);
        let tree = s.unpack().unwrap();
        assert_eq!(
            tree,
            Value::List(vec![Value::Bool(true), Value::List(vec![Value::from(42i64)])])
        );
        assert_eq!(s.to_bits().unwrap(), input);
    }

    #[test]
    fn if_without_else_consumes_nothing_when_false() {
        let mut s = schema("(flag: bool, if {flag}: (x: u8))");
        let input = Bits::from_bin("0").unwrap();
        assert_eq!(s.parse(&input, 0).unwrap(), 1);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![Value::Bool(false), Value::Null])
        );
    }

    #[test]
    fn repeat_runs_count_times() {
        let mut s = schema("(n: u8, repeat {n}: (v: u8))");
        let input = Bits::from_bytes([3, 10, 20, 30]);
        assert_eq!(s.parse(&input, 0).unwrap(), 32);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![
                Value::from(3i64),
                Value::List(vec![ints(&[10]), ints(&[20]), ints(&[30])]),
            ])
        );
    }

    #[test]
    fn repeat_zero_binds_nothing() {
        let mut s = schema("(n: u8, repeat {n}: (v: u8))");
        let input = Bits::from_bytes([0]);
        assert_eq!(s.parse(&input, 0).unwrap(), 8);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![Value::from(0i64), Value::List(vec![])])
        );
        assert_eq!(s.to_bits().unwrap(), input);
    }

    #[test]
    fn repeat_exposes_the_loop_index() {
        let mut s = schema("(repeat 3: (let v = {_ * 2}, x: u{v + 8}))");
        // Widths are 8, 10 and 12 bits.
        let mut input = crate::MutableBits::new();
        input
            .append(&Bits::from_string("u8 = 1").unwrap())
            .append(&Bits::from_string("u10 = 2").unwrap())
            .append(&Bits::from_string("u12 = 3").unwrap());
        let input = input.into_bits();
        assert_eq!(s.parse(&input, 0).unwrap(), 8 + 10 + 12);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![Value::List(vec![ints(&[1]), ints(&[2]), ints(&[3])])])
        );
    }

    #[test]
    fn let_binds_for_later_siblings_only() {
        let mut s = schema("(let size = 16, v: u{size})");
        let input = Bits::from_bytes([1, 2]);
        assert_eq!(s.parse(&input, 0).unwrap(), 16);
        assert_eq!(s.unpack().unwrap(), ints(&[258]));

        let mut early = schema("(v: u{size}, let size = 16)");
        assert!(early.parse(&input, 0).unwrap_err().is_unresolved_name());
    }

    #[test]
    fn pass_is_a_no_op() {
        let mut s = schema("(pass, a: u8, pass)");
        let input = Bits::from_bytes([5]);
        assert_eq!(s.parse(&input, 0).unwrap(), 8);
        assert_eq!(s.unpack().unwrap(), ints(&[5]));
    }

    #[test]
    fn duplicate_sibling_names_are_rejected() {
        // Through the grammar the rejection surfaces as a syntax error.
        assert!(FieldType::from_string("(x: u8, x: u8)").is_err());
        // Programmatic construction reports the schema error directly.
        let dtype: crate::Dtype = "u8".parse().unwrap();
        let a = Field::new(dtype.clone(), "x", None, false).unwrap();
        let b = Field::new(dtype, "x", None, false).unwrap();
        let err = Format::new(vec![a.into(), b.into()], "").unwrap_err();
        assert!(err.is_schema_error());
        // The same name in different formats is fine.
        assert!(FieldType::from_string("(a: (x: u8), b: (x: u8))").is_ok());
    }

    #[test]
    fn sibling_scopes_are_isolated() {
        let mut s = schema("(a: (x: u8), b: (y: u{x}))");
        let err = s.parse(&Bits::from_bytes([8, 1]), 0).unwrap_err();
        assert!(err.is_unresolved_name());
    }

    #[test]
    fn dotted_paths_reach_nested_formats() {
        let mut s = schema("(header: (size: u8), body: [u8; {header.size}])");
        let input = Bits::from_bytes([2, 7, 9]);
        assert_eq!(s.parse(&input, 0).unwrap(), 24);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![ints(&[2]), ints(&[7, 9])])
        );
    }

    #[test]
    fn short_input_is_reported() {
        let mut s = schema("(a: u32)");
        let err = s.parse(&Bits::from_bytes([1]), 0).unwrap_err();
        assert_eq!(
            err,
            Error::ShortInput {
                needed: 32,
                available: 8
            }
        );
    }

    #[test]
    fn negative_repeat_count_is_rejected() {
        let mut s = schema("(n: u8, repeat {n - 10}: (v: u8))");
        let err = s.parse(&Bits::from_bytes([5, 0]), 0).unwrap_err();
        assert!(err.is_out_of_range());
    }

    #[test]
    fn parse_with_offset() {
        let mut s = schema("(a: u8)");
        let input = Bits::from_bytes([0xff, 0x2a]);
        assert_eq!(s.parse(&input, 8).unwrap(), 8);
        assert_eq!(s.unpack().unwrap(), ints(&[42]));
        assert!(s.parse(&input, 17).unwrap_err().is_out_of_range());
    }

    #[test]
    fn build_leaves_state_untouched() {
        let s = schema("(a: u8)");
        let bits = s.build(&ints(&[9])).unwrap();
        assert_eq!(bits.to_bytes(), vec![9]);
        assert!(s.to_bits().is_err());
    }

    #[test]
    fn pack_then_inspect() {
        let mut s = schema("(a: u8, b: bool, pad7)");
        let packed = s
            .pack(&Value::List(vec![Value::from(3i64), Value::Bool(true)]))
            .unwrap();
        assert_eq!(packed.len(), 16);
        assert_eq!(
            s.unpack().unwrap(),
            Value::List(vec![Value::from(3i64), Value::Bool(true)])
        );
    }

    #[test]
    fn clear_resets_everything_but_constants() {
        let mut s = schema("(code: const u8 = 9, x: u8)");
        s.parse(&Bits::from_bytes([9, 4]), 0).unwrap();
        s.clear();
        assert!(s.unpack().is_err());
        // Constants survive and still parse correctly afterwards.
        assert_eq!(s.parse(&Bits::from_bytes([9, 5]), 0).unwrap(), 16);
    }

    #[test]
    fn display_round_trips_through_the_grammar() {
        for text in [
            "(w: u12, h: u12, pixels: [u8; {w * h}])",
            "(flag: bool, if {flag}: (x: u8) else: (y: u16))",
            "(n: u8, repeat {n}: (v: u8))",
            "(let size = 16, v: u{size})",
            "pass",
            "(code: const hex8 = 0x000001b3, size: u12)",
        ] {
            let s = schema(text);
            let rendered = s.to_string();
            let reparsed = FieldType::from_string(&rendered).unwrap();
            assert_eq!(reparsed.to_string(), rendered);
        }
    }

    #[test]
    fn too_many_values_is_an_error() {
        let mut s = schema("(a: u8)");
        let err = s.pack(&ints(&[1, 2])).unwrap_err();
        assert!(err.is_out_of_range());
    }
}
