//! Repetition schema node: a body parsed or built a computed number of
//! times.

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::expr::Expression;
use crate::schema::FieldType;
use crate::value::Value;

/// `repeat count: body`.
///
/// The count expression is evaluated once, before the first iteration.
/// Each iteration works on its own copy of the body, with the loop index
/// bound as `_` in a scope of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeat {
    count: Expression,
    body: Box<FieldType>,
    /// One bound body copy per completed iteration.
    reps: Vec<FieldType>,
    bound: bool,
}

impl Repeat {
    pub fn new(count: Expression, body: FieldType) -> Repeat {
        Repeat {
            count,
            body: Box::new(body),
            reps: Vec::new(),
            bound: false,
        }
    }

    pub fn count(&self) -> &Expression {
        &self.count
    }

    pub fn body(&self) -> &FieldType {
        &self.body
    }

    /// The bound iterations from the last parse or pack.
    pub fn iterations(&self) -> &[FieldType] {
        &self.reps
    }

    fn fresh_body(&self) -> FieldType {
        let mut copy = (*self.body).clone();
        copy.clear();
        copy
    }

    pub(crate) fn consumes_value(&self) -> bool {
        true
    }

    pub(crate) fn parse_step(&mut self, b: &Bits, pos: usize, env: &mut Env) -> Result<usize> {
        // The count is evaluated exactly once, before any iteration binds.
        let n = self.count.evaluate_count(env)?;
        log::debug!("repeat of {n} iteration(s) at bit {pos}");
        self.reps = Vec::with_capacity(n);
        let mut used = 0;
        for i in 0..n {
            let mut rep = self.fresh_body();
            env.push_scope();
            env.bind("_", Value::from(i));
            let step = rep.parse_step(b, pos + used, env);
            env.pop_scope();
            used += step?;
            self.reps.push(rep);
        }
        self.bound = true;
        Ok(used)
    }

    pub(crate) fn pack_value(&mut self, value: Option<&Value>, env: &mut Env) -> Result<Bits> {
        let n = self.count.evaluate_count(env)?;
        let items: &[Value] = if self.body.consumes_value() {
            match value {
                Some(Value::List(items)) if items.len() == n => items,
                Some(Value::List(items)) => {
                    return Err(Error::OutOfRange(format!(
                        "'{self}' repeats {n} time(s), but got {} value(s)",
                        items.len()
                    )))
                }
                Some(other) => {
                    return Err(Error::OutOfRange(format!(
                        "a repeat takes a list of per-iteration values, got {other}"
                    )))
                }
                None => {
                    return Err(Error::OutOfRange(format!(
                        "no values supplied for '{self}'"
                    )))
                }
            }
        } else {
            &[]
        };
        self.reps = Vec::with_capacity(n);
        let mut parts = Vec::with_capacity(n);
        for i in 0..n {
            let mut rep = self.fresh_body();
            env.push_scope();
            env.bind("_", Value::from(i));
            let bits = rep.pack_value(items.get(i), env);
            env.pop_scope();
            parts.push(bits?);
            self.reps.push(rep);
        }
        self.bound = true;
        Ok(Bits::from_joined(parts))
    }

    pub(crate) fn to_bits(&self) -> Result<Bits> {
        if !self.bound {
            return Err(Error::SchemaError(format!(
                "the repeat '{self}' has no value"
            )));
        }
        let parts = self
            .reps
            .iter()
            .map(FieldType::to_bits)
            .collect::<Result<Vec<_>>>()?;
        Ok(Bits::from_joined(parts))
    }

    pub(crate) fn unpack_value(&self) -> Result<Value> {
        if !self.bound {
            return Err(Error::SchemaError(format!(
                "the repeat '{self}' has no value"
            )));
        }
        let values = self
            .reps
            .iter()
            .map(FieldType::unpack_value)
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::List(values))
    }

    pub(crate) fn clear(&mut self) {
        self.reps.clear();
        self.bound = false;
    }
}

impl std::fmt::Display for Repeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "repeat {}: {}", self.count, self.body)
    }
}
