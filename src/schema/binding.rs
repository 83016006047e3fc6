//! The `let` schema node: bind a computed value, emit no bits.

use crate::error::Result;
use crate::expr::env::Env;
use crate::expr::Expression;
use crate::schema::field::validate_name;

/// `let name = expr`.
///
/// Binds the result of an expression for subsequent siblings in the
/// enclosing format. Consumes and produces no bits and never carries a
/// value of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    name: String,
    expr: Expression,
}

impl Let {
    pub fn new(name: impl Into<String>, expr: Expression) -> Result<Let> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::error::Error::SchemaError(
                "a let binding needs a name".into(),
            ));
        }
        validate_name(&name)?;
        Ok(Let { name, expr })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expr(&self) -> &Expression {
        &self.expr
    }

    pub(crate) fn bind(&self, env: &mut Env) -> Result<()> {
        let value = self.expr.evaluate(env)?;
        env.bind(self.name.clone(), value);
        Ok(())
    }
}

impl std::fmt::Display for Let {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "let {} = {}", self.name, self.expr)
    }
}
