//! Conditional schema node: parse or build one of two branches.

use crate::bits::Bits;
use crate::error::{Error, Result};
use crate::expr::env::Env;
use crate::expr::Expression;
use crate::schema::FieldType;
use crate::value::Value;

/// `if cond: then else: other`.
///
/// The condition is evaluated against the bindings made so far; the branch
/// that was taken is recorded on the node so `to_bits` and `unpack` are
/// deterministic afterwards. The branch that was not taken stays unbound.
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    condition: Expression,
    then_branch: Box<FieldType>,
    else_branch: Option<Box<FieldType>>,
    taken: Option<bool>,
}

impl If {
    pub fn new(condition: Expression, then_branch: FieldType, else_branch: Option<FieldType>) -> If {
        If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            taken: None,
        }
    }

    pub fn condition(&self) -> &Expression {
        &self.condition
    }

    pub fn then_branch(&self) -> &FieldType {
        &self.then_branch
    }

    pub fn else_branch(&self) -> Option<&FieldType> {
        self.else_branch.as_deref()
    }

    /// The branch chosen by the last parse or pack, if any.
    pub fn taken_branch(&self) -> Option<&FieldType> {
        match self.taken? {
            true => Some(&*self.then_branch),
            false => self.else_branch.as_deref(),
        }
    }

    fn choose(&mut self, env: &Env) -> Result<Option<&mut FieldType>> {
        let cond = self.condition.evaluate_bool(env)?;
        log::debug!(
            "condition {} took the {} branch",
            self.condition,
            if cond { "then" } else { "else" }
        );
        self.taken = Some(cond);
        Ok(match cond {
            true => Some(&mut *self.then_branch),
            false => self.else_branch.as_deref_mut(),
        })
    }

    pub(crate) fn consumes_value(&self) -> bool {
        self.then_branch.consumes_value()
            || self
                .else_branch
                .as_ref()
                .is_some_and(|b| b.consumes_value())
    }

    pub(crate) fn parse_step(&mut self, b: &Bits, pos: usize, env: &mut Env) -> Result<usize> {
        match self.choose(env)? {
            Some(branch) => branch.parse_step(b, pos, env),
            None => Ok(0),
        }
    }

    pub(crate) fn pack_value(&mut self, value: Option<&Value>, env: &mut Env) -> Result<Bits> {
        match self.choose(env)? {
            Some(branch) => {
                let value = if branch.consumes_value() { value } else { None };
                branch.pack_value(value, env)
            }
            None => Ok(Bits::new()),
        }
    }

    pub(crate) fn to_bits(&self) -> Result<Bits> {
        match self.taken {
            None => Err(Error::SchemaError(format!(
                "the conditional '{self}' has not chosen a branch yet"
            ))),
            Some(_) => match self.taken_branch() {
                Some(branch) => branch.to_bits(),
                None => Ok(Bits::new()),
            },
        }
    }

    pub(crate) fn unpack_value(&self) -> Result<Value> {
        match self.taken {
            None => Err(Error::SchemaError(format!(
                "the conditional '{self}' has not chosen a branch yet"
            ))),
            Some(_) => match self.taken_branch() {
                Some(branch) => branch.unpack_value(),
                None => Ok(Value::Null),
            },
        }
    }

    pub(crate) fn clear(&mut self) {
        self.taken = None;
        self.then_branch.clear();
        if let Some(b) = &mut self.else_branch {
            b.clear();
        }
    }
}

impl std::fmt::Display for If {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if {}: {}", self.condition, self.then_branch)?;
        if let Some(e) = &self.else_branch {
            write!(f, " else: {e}")?;
        }
        Ok(())
    }
}
