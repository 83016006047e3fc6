//! The leaf schema node: one dtype, an optional name, an optional constant.

use crate::bits::Bits;
use crate::dtype::Dtype;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::options::Colour;
use crate::value::Value;

/// Words that cannot be used as field or binding names because the
/// grammars claim them.
pub(crate) const RESERVED_NAMES: [&str; 8] =
    ["if", "else", "repeat", "let", "pass", "const", "true", "false"];

pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Ok(());
    }
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::SchemaError(format!(
            "'{name}' is not a valid field name"
        )));
    }
    if name.contains("__") {
        return Err(Error::SchemaError(format!(
            "the field name '{name}' contains a double underscore, which is not permitted"
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(Error::SchemaError(format!(
            "'{name}' is a reserved word and cannot be used as a field name"
        )));
    }
    Ok(())
}

/// A single dtype-backed field, possibly named, possibly constant.
///
/// A const field carries its bits from construction; parsing validates the
/// input against them and never overwrites them.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    dtype: Dtype,
    name: String,
    konst: bool,
    /// Bits bound by construction (const / preset) or by parse/pack.
    bits: Option<Bits>,
    /// The dtype with expressions resolved, fixed at bind time.
    concrete: Option<Dtype>,
}

impl Field {
    /// Build a field from parts. A value is packed immediately and
    /// requires a dtype without unresolved expressions; const fields must
    /// have a value.
    pub fn new(
        dtype: impl Into<Dtype>,
        name: impl Into<String>,
        value: Option<&Value>,
        konst: bool,
    ) -> Result<Field> {
        let dtype = dtype.into();
        let name = name.into();
        validate_name(&name)?;
        if konst && value.is_none() {
            return Err(Error::SchemaError(
                "fields with no value cannot be const".into(),
            ));
        }
        if dtype.is_pad() && value.is_some() {
            return Err(Error::SchemaError(
                "padding fields cannot be given a value".into(),
            ));
        }
        let mut field = Field {
            dtype,
            name,
            konst,
            bits: None,
            concrete: None,
        };
        if let Some(value) = value {
            if !field.dtype.is_concrete() {
                return Err(Error::SchemaError(format!(
                    "cannot preset a value for '{}' while its size is an expression",
                    field.dtype
                )));
            }
            field.bits = Some(field.dtype.pack(value)?);
            field.concrete = Some(field.dtype.clone());
        }
        Ok(field)
    }

    /// A field holding a fixed bit pattern.
    pub fn from_bits(bits: &Bits, name: impl Into<String>, konst: bool) -> Result<Field> {
        let dtype = Dtype::from_string(&format!("bits{}", bits.len()))?;
        Field::new(dtype, name, Some(&Value::Bits(bits.clone())), konst)
    }

    pub fn dtype(&self) -> &Dtype {
        &self.dtype
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_const(&self) -> bool {
        self.konst
    }

    /// The bound bits, when the field has been parsed, packed or preset.
    pub fn bits(&self) -> Option<&Bits> {
        self.bits.as_ref()
    }

    /// The bound value, decoded through the resolved dtype.
    pub fn value(&self) -> Option<Value> {
        let bits = self.bits.as_ref()?;
        let dtype = self.concrete.as_ref()?;
        dtype.unpack(bits).ok()
    }

    pub(crate) fn consumes_value(&self) -> bool {
        !self.konst && !self.dtype.is_pad() && self.bits.is_none()
    }

    pub(crate) fn bind_in_env(&self, env: &mut Env) {
        if self.name.is_empty() || self.dtype.is_pad() {
            return;
        }
        if let Some(v) = self.value() {
            env.bind(self.name.clone(), v);
        }
    }

    pub(crate) fn parse_step(&mut self, b: &Bits, pos: usize, env: &mut Env) -> Result<usize> {
        let available = b.len() - pos;
        if self.konst {
            let expected = self.bits.as_ref().expect("const fields always carry bits");
            if available < expected.len() {
                return Err(Error::ShortInput {
                    needed: expected.len(),
                    available,
                });
            }
            let got = b.slice_unchecked(pos, pos + expected.len());
            if got != *expected {
                return Err(Error::ConstMismatch(format!(
                    "read {got} where the const value {expected} was expected"
                )));
            }
            self.bind_in_env(env);
            return Ok(expected.len());
        }
        let concrete = self.dtype.evaluate(env)?;
        let taken = match concrete.bit_length() {
            Some(n) => {
                if available < n {
                    return Err(Error::ShortInput {
                        needed: n,
                        available,
                    });
                }
                n
            }
            // A dynamic dtype stretches to the end of the window.
            None => available,
        };
        log::debug!("field '{}' taking {taken} bits at {pos}", self.name);
        let bits = b.slice_unchecked(pos, pos + taken);
        // Decode eagerly so malformed input fails here, not at unpack time.
        let value = concrete.unpack(&bits)?;
        self.bits = Some(bits);
        self.concrete = Some(concrete);
        if !self.name.is_empty() && !self.dtype.is_pad() {
            env.bind(self.name.clone(), value);
        }
        Ok(taken)
    }

    pub(crate) fn pack_value(&mut self, value: Option<&Value>, env: &mut Env) -> Result<Bits> {
        if self.konst || self.bits.is_some() {
            // Preset fields never pull from the input.
            self.bind_in_env(env);
            return Ok(self.bits.clone().expect("preset fields carry bits"));
        }
        let concrete = self.dtype.evaluate(env)?;
        let bits = if self.dtype.is_pad() {
            concrete.pack(&Value::Null)?
        } else {
            let value = value.ok_or_else(|| {
                Error::OutOfRange(format!("no value supplied for the field '{self}'"))
            })?;
            let bits = concrete.pack(value)?;
            if !self.name.is_empty() {
                env.bind(self.name.clone(), value.clone());
            }
            bits
        };
        self.bits = Some(bits.clone());
        self.concrete = Some(concrete);
        Ok(bits)
    }

    pub(crate) fn to_bits(&self) -> Result<Bits> {
        self.bits
            .clone()
            .ok_or_else(|| Error::SchemaError(format!("the field '{self}' has no value")))
    }

    pub(crate) fn unpack_value(&self) -> Result<Value> {
        if self.dtype.is_pad() {
            return Ok(Value::Null);
        }
        let bits = self
            .bits
            .as_ref()
            .ok_or_else(|| Error::SchemaError(format!("the field '{self}' has no value")))?;
        let dtype = self
            .concrete
            .as_ref()
            .ok_or_else(|| Error::SchemaError(format!("the field '{self}' has no resolved dtype")))?;
        dtype.unpack(bits)
    }

    pub(crate) fn clear(&mut self) {
        if !self.konst {
            self.bits = None;
            self.concrete = None;
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let colour = Colour::current();
        if !self.name.is_empty() {
            write!(f, "{}{}{}: ", colour.name, self.name, colour.off)?;
        }
        if self.konst {
            write!(f, "{}const{} ", colour.keyword, colour.off)?;
        }
        write!(f, "{}{}{}", colour.dtype, self.dtype, colour.off)?;
        if let Some(value) = self.value() {
            let tint = if self.konst {
                colour.const_value
            } else {
                colour.value
            };
            // String values carry their base prefix so the rendering
            // re-parses unambiguously.
            let prefix = match (&value, &self.dtype) {
                (Value::Str(_), Dtype::Single(s)) => match s.kind() {
                    crate::dtype::Kind::Hex => "0x",
                    crate::dtype::Kind::Oct => "0o",
                    crate::dtype::Kind::Bin => "0b",
                    _ => "",
                },
                _ => "",
            };
            match value {
                Value::Null => {}
                Value::Bits(b) => write!(f, " = {tint}{b}{}", colour.off)?,
                other => write!(f, " = {tint}{prefix}{other}{}", colour.off)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("").is_ok());
        assert!(validate_name("header_2").is_ok());
        assert!(validate_name("_").is_ok());
        assert!(validate_name("2x").is_err());
        assert!(validate_name("a__b").is_err());
        assert!(validate_name("repeat").is_err());
    }

    #[test]
    fn const_fields_need_values() {
        let dtype = Dtype::from_string("u8").unwrap();
        assert!(Field::new(dtype.clone(), "x", None, true).is_err());
        let field = Field::new(dtype, "x", Some(&Value::from(5i64)), true).unwrap();
        assert_eq!(field.to_bits().unwrap().to_bytes(), vec![5]);
        assert_eq!(field.value(), Some(Value::from(5i64)));
    }

    #[test]
    fn clearing_spares_constants() {
        let dtype = Dtype::from_string("u8").unwrap();
        let mut konst = Field::new(dtype.clone(), "", Some(&Value::from(1i64)), true).unwrap();
        let mut plain = Field::new(dtype, "", Some(&Value::from(2i64)), false).unwrap();
        konst.clear();
        plain.clear();
        assert!(konst.bits().is_some());
        assert!(plain.bits().is_none());
    }

    #[test]
    fn display_forms() {
        let dtype = Dtype::from_string("u8").unwrap();
        let field = Field::new(dtype, "x", Some(&Value::from(5i64)), true).unwrap();
        assert_eq!(field.to_string(), "x: const u8 = 5");
    }
}
