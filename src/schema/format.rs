//! An ordered sequence of schema nodes with its own name scope.

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::options::Colour;
use crate::schema::field::validate_name;
use crate::schema::FieldType;
use crate::value::Value;

/// A sequence of child nodes, parsed and built in document order.
///
/// Each `Format` opens a scope: names bound by its children are visible to
/// later siblings and to nested children, but not to the outside. A named
/// `Format` additionally binds its own name to a record of its named
/// children, so expressions can reach inside with dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    name: String,
    children: Vec<FieldType>,
}

impl Format {
    /// Build a format, rejecting duplicate sibling names.
    pub fn new(children: Vec<FieldType>, name: impl Into<String>) -> Result<Format> {
        let name = name.into();
        validate_name(&name)?;
        let mut seen: Vec<&str> = Vec::new();
        for child in &children {
            let child_name = match child {
                FieldType::Field(f) if !f.name().is_empty() => Some(f.name()),
                FieldType::Format(g) if !g.name().is_empty() => Some(g.name()),
                FieldType::Let(l) => Some(l.name()),
                _ => None,
            };
            if let Some(n) = child_name {
                if seen.contains(&n) {
                    return Err(Error::SchemaError(format!(
                        "duplicate field name '{n}' in the same format"
                    )));
                }
                seen.push(n);
            }
        }
        Ok(Format { name, children })
    }

    /// Parse a format definition string such as `"(w: u12, h: u12)"`.
    pub fn from_string(s: &str) -> Result<Format> {
        match FieldType::from_string(s)? {
            FieldType::Format(format) => Ok(format),
            other => Err(Error::BadSyntax(format!(
                "'{s}' parses as '{other}', not as a format"
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[FieldType] {
        &self.children
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FieldType> {
        self.children.iter().find(|c| match c {
            FieldType::Field(f) => f.name() == name,
            FieldType::Format(g) => g.name() == name,
            _ => false,
        })
    }

    /// The record of named, bound children, used for dotted-path lookups.
    fn record(&self) -> Vec<(String, Value)> {
        let mut entries = Vec::new();
        collect_bindings(&self.children, &mut entries);
        entries
    }

    pub(crate) fn parse_step(&mut self, b: &Bits, pos: usize, env: &mut Env) -> Result<usize> {
        log::debug!("parsing format '{}' at bit {pos}", self.name);
        env.push_scope();
        let mut used = 0;
        for child in &mut self.children {
            match child.parse_step(b, pos + used, env) {
                Ok(n) => used += n,
                Err(e) => {
                    env.pop_scope();
                    return Err(e);
                }
            }
        }
        env.pop_scope();
        if !self.name.is_empty() {
            env.bind(self.name.clone(), Value::Record(self.record()));
        }
        Ok(used)
    }

    pub(crate) fn pack_value(&mut self, value: Option<&Value>, env: &mut Env) -> Result<Bits> {
        let values = match value {
            Some(Value::List(items)) => items.as_slice(),
            Some(other) => {
                return Err(Error::OutOfRange(format!(
                    "a format takes a list of values, got {other}"
                )))
            }
            None => &[],
        };
        let mut next = values.iter();
        env.push_scope();
        let mut parts = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            let child_value = if child.consumes_value() { next.next() } else { None };
            match child.pack_value(child_value, env) {
                Ok(bits) => parts.push(bits),
                Err(e) => {
                    env.pop_scope();
                    return Err(e);
                }
            }
        }
        env.pop_scope();
        let leftover = next.count();
        if leftover > 0 {
            return Err(Error::OutOfRange(format!(
                "{leftover} unused value(s) when packing '{self}'"
            )));
        }
        if !self.name.is_empty() {
            env.bind(self.name.clone(), Value::Record(self.record()));
        }
        Ok(Bits::from_joined(parts))
    }

    pub(crate) fn to_bits(&self) -> Result<Bits> {
        let parts = self
            .children
            .iter()
            .map(FieldType::to_bits)
            .collect::<Result<Vec<_>>>()?;
        Ok(Bits::from_joined(parts))
    }

    pub(crate) fn unpack_value(&self) -> Result<Value> {
        let mut values = Vec::new();
        for child in &self.children {
            if child.is_silent() {
                continue;
            }
            values.push(child.unpack_value()?);
        }
        Ok(Value::List(values))
    }

    pub(crate) fn clear(&mut self) {
        for child in &mut self.children {
            child.clear();
        }
    }
}

fn collect_bindings(children: &[FieldType], out: &mut Vec<(String, Value)>) {
    for child in children {
        match child {
            FieldType::Field(f) => {
                if !f.name().is_empty() && !f.dtype().is_pad() {
                    if let Some(v) = f.value() {
                        out.push((f.name().to_owned(), v));
                    }
                }
            }
            FieldType::Format(g) => {
                if !g.name().is_empty() {
                    out.push((g.name().to_owned(), Value::Record(g.record())));
                }
            }
            FieldType::If(i) => {
                if let Some(taken) = i.taken_branch() {
                    collect_bindings(std::slice::from_ref(taken), out);
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let colour = Colour::current();
        if !self.name.is_empty() {
            write!(f, "{}{}{}: ", colour.name, self.name, colour.off)?;
        }
        write!(f, "(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ")")
    }
}
