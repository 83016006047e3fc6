//! Name environment for expression evaluation.
//!
//! A stack of scopes: the interpreter pushes a scope per `Format` (and per
//! `Repeat` iteration) and pops it when the node completes. Lookup walks
//! from the innermost scope outward, so shadowing works and sibling
//! structures never see each other's names.

use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Env {
    scopes: SmallVec<[HashMap<String, Value>; 4]>,
}

impl Env {
    /// An environment with a single empty scope.
    pub fn new() -> Self {
        Env {
            scopes: smallvec![HashMap::new()],
        }
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the root scope");
        self.scopes.pop();
    }

    /// Bind a name in the innermost scope, shadowing any outer binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.scopes
            .last_mut()
            .expect("environment always has a scope")
            .insert(name.into(), value);
    }

    /// Resolve a dotted path: the head name in the nearest enclosing scope,
    /// then each segment as a field of the previous `Record` value.
    pub fn lookup(&self, path: &[String]) -> Result<Value> {
        let head = &path[0];
        let mut value = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(head))
            .ok_or_else(|| Error::UnresolvedName(head.clone()))?;
        for segment in &path[1..] {
            value = value
                .field(segment)
                .ok_or_else(|| Error::UnresolvedName(path.join(".")))?;
        }
        Ok(value.clone())
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}
