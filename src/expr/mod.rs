//! The expression language used for sizes, counts and conditions.
//!
//! Expressions are parsed once at construction into an immutable AST and
//! are pure functions of the environment. Integer arithmetic is arbitrary
//! precision; comparisons and logical operators yield integer 0/1.

pub mod env;

use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::error::{Error, Result};
use crate::parser;
use crate::value::{self, Value};
use env::Env;

/// Binary operators, loosest-binding last in the parse hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn token(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    BitNot,
    Not,
}

/// One node of a parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    /// An integer literal.
    Int(BigInt),
    /// A name reference, possibly a dotted path into a parsed `Format`.
    Name(Vec<String>),
    Binary {
        op: BinOp,
        lhs: Box<ExprNode>,
        rhs: Box<ExprNode>,
    },
    Unary {
        op: UnOp,
        inner: Box<ExprNode>,
    },
    /// `base[index]`
    Index {
        base: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    /// `then if cond else other`
    Cond {
        then: Box<ExprNode>,
        cond: Box<ExprNode>,
        other: Box<ExprNode>,
    },
}

/// A pre-parsed, immutable expression.
///
/// ```
/// use bitloom::{Env, Expression, Value};
///
/// let e = Expression::parse("x + 1").unwrap();
/// let mut env = Env::new();
/// env.bind("x", Value::from(5i64));
/// assert_eq!(e.evaluate(&env).unwrap(), Value::from(6i64));
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    node: ExprNode,
    text: String,
    konst: Option<Value>,
}

impl Expression {
    /// Parse expression source text (without surrounding braces).
    pub fn parse(src: &str) -> Result<Self> {
        let node = parser::parse_expression(src)?;
        Ok(Expression::from_node(node, src.trim().to_owned()))
    }

    pub(crate) fn from_node(node: ExprNode, text: String) -> Self {
        // Constant-fold when there are no free names; errors (e.g. division
        // by zero) are deferred to evaluation so they carry context.
        let konst = eval_node(&node, &Env::new()).ok();
        Expression { node, text, konst }
    }

    /// An expression that is just an integer constant.
    pub fn from_int(value: impl Into<BigInt>) -> Self {
        let value = value.into();
        Expression {
            text: value.to_string(),
            konst: Some(Value::Int(value.clone())),
            node: ExprNode::Int(value),
        }
    }

    /// The constant value, when the expression has no free names.
    pub fn const_value(&self) -> Option<&Value> {
        self.konst.as_ref()
    }

    /// Evaluate against an environment.
    pub fn evaluate(&self, env: &Env) -> Result<Value> {
        if let Some(v) = &self.konst {
            return Ok(v.clone());
        }
        eval_node(&self.node, env)
    }

    /// Evaluate and coerce to a non-negative count.
    pub fn evaluate_count(&self, env: &Env) -> Result<usize> {
        self.evaluate(env)?.to_count()
    }

    /// Evaluate to a boolean using the standard truthiness rules.
    pub fn evaluate_bool(&self, env: &Env) -> Result<bool> {
        Ok(self.evaluate(env)?.truthy())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.konst {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "{{{}}}", self.text),
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        if self.text == other.text {
            return true;
        }
        match (&self.konst, &other.konst) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl std::str::FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expression::parse(s)
    }
}

fn both_ints(a: &Value, b: &Value) -> Option<(BigInt, BigInt)> {
    if a.is_float() || b.is_float() {
        return None;
    }
    Some((a.as_int()?, b.as_int()?))
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<bool> {
    use std::cmp::Ordering;
    let ordering = if let Some((x, y)) = both_ints(a, b) {
        x.cmp(&y)
    } else {
        let (x, y) = match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(Error::Arithmetic(format!(
                    "cannot compare {a} and {b} with '{}'",
                    op.token()
                )))
            }
        };
        x.partial_cmp(&y)
            .ok_or_else(|| Error::Arithmetic(format!("cannot order {a} and {b} (NaN operand)")))?
    };
    Ok(match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("compare called with non-comparison operator"),
    })
}

fn equal(a: &Value, b: &Value) -> bool {
    if let Some((x, y)) = both_ints(a, b) {
        return x == y;
    }
    if a.is_float() || b.is_float() {
        if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
            return x == y;
        }
    }
    a == b
}

fn shift_amount(v: &Value) -> Result<usize> {
    let i = v
        .as_int()
        .ok_or_else(|| Error::Arithmetic(format!("shift amount must be an integer, got {v}")))?;
    if i.is_negative() {
        return Err(Error::Arithmetic("negative shift amount".into()));
    }
    i.to_usize()
        .ok_or_else(|| Error::Arithmetic(format!("shift amount {i} is too large")))
}

fn int_only(op: BinOp, a: &Value, b: &Value) -> Result<(BigInt, BigInt)> {
    both_ints(a, b).ok_or_else(|| {
        Error::Arithmetic(format!(
            "'{}' requires integer operands, got {a} and {b}",
            op.token()
        ))
    })
}

fn non_numeric(op: BinOp, v: &Value) -> Error {
    Error::Arithmetic(format!(
        "'{}' requires a numeric operand, got {v}",
        op.token()
    ))
}

fn eval_binary(op: BinOp, a: Value, b: Value) -> Result<Value> {
    let flag = |b: bool| Value::Int(BigInt::from(b as u8));
    match op {
        BinOp::Add => value::add_values(&a, &b),
        BinOp::Sub => value::sub_values(&a, &b),
        BinOp::Mul => value::mul_values(&a, &b),
        BinOp::Div | BinOp::FloorDiv => {
            if a.is_float() || b.is_float() {
                let x = a.as_f64().ok_or_else(|| non_numeric(op, &a))?;
                let y = b.as_f64().ok_or_else(|| non_numeric(op, &b))?;
                if y == 0.0 {
                    return Err(Error::Arithmetic("division by zero".into()));
                }
                let q = x / y;
                Ok(Value::Float(if op == BinOp::FloorDiv { q.floor() } else { q }))
            } else {
                let (x, y) = int_only(op, &a, &b)?;
                value::floor_div(&x, &y).map(Value::Int)
            }
        }
        BinOp::Mod => {
            let (x, y) = int_only(op, &a, &b)?;
            value::floor_mod(&x, &y).map(Value::Int)
        }
        BinOp::Shl => {
            let x = a.as_int().ok_or_else(|| non_numeric(op, &a))?;
            Ok(Value::Int(x << shift_amount(&b)?))
        }
        BinOp::Shr => {
            let x = a.as_int().ok_or_else(|| non_numeric(op, &a))?;
            Ok(Value::Int(x >> shift_amount(&b)?))
        }
        BinOp::BitAnd => {
            let (x, y) = int_only(op, &a, &b)?;
            Ok(Value::Int(x & y))
        }
        BinOp::BitOr => {
            let (x, y) = int_only(op, &a, &b)?;
            Ok(Value::Int(x | y))
        }
        BinOp::BitXor => {
            let (x, y) = int_only(op, &a, &b)?;
            Ok(Value::Int(x ^ y))
        }
        BinOp::Eq => Ok(flag(equal(&a, &b))),
        BinOp::Ne => Ok(flag(!equal(&a, &b))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => Ok(flag(compare(op, &a, &b)?)),
        BinOp::And | BinOp::Or => unreachable!("logical operators are short-circuited"),
    }
}

fn eval_node(node: &ExprNode, env: &Env) -> Result<Value> {
    match node {
        ExprNode::Int(i) => Ok(Value::Int(i.clone())),
        ExprNode::Name(path) => env.lookup(path),
        ExprNode::Unary { op, inner } => {
            let v = eval_node(inner, env)?;
            match op {
                UnOp::Neg => match &v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    Value::Bool(b) => Ok(Value::Int(-BigInt::from(*b as u8))),
                    _ => Err(Error::Arithmetic(format!("cannot negate {v}"))),
                },
                UnOp::BitNot => {
                    let i = v
                        .as_int()
                        .ok_or_else(|| Error::Arithmetic(format!("cannot apply '~' to {v}")))?;
                    Ok(Value::Int(-i - 1))
                }
                UnOp::Not => Ok(Value::Int(BigInt::from(!v.truthy() as u8))),
            }
        }
        ExprNode::Binary { op, lhs, rhs } => match op {
            // Short-circuit evaluation for the logical operators.
            BinOp::And => {
                let a = eval_node(lhs, env)?;
                if !a.truthy() {
                    return Ok(Value::Int(BigInt::from(0)));
                }
                let b = eval_node(rhs, env)?;
                Ok(Value::Int(BigInt::from(b.truthy() as u8)))
            }
            BinOp::Or => {
                let a = eval_node(lhs, env)?;
                if a.truthy() {
                    return Ok(Value::Int(BigInt::from(1)));
                }
                let b = eval_node(rhs, env)?;
                Ok(Value::Int(BigInt::from(b.truthy() as u8)))
            }
            _ => eval_binary(*op, eval_node(lhs, env)?, eval_node(rhs, env)?),
        },
        ExprNode::Index { base, index } => {
            let base = eval_node(base, env)?;
            let index = eval_node(index, env)?
                .to_count()
                .map_err(|_| Error::OutOfRange("index must be a non-negative integer".into()))?;
            base.index(index)
        }
        ExprNode::Cond { then, cond, other } => {
            if eval_node(cond, env)?.truthy() {
                eval_node(then, env)
            } else {
                eval_node(other, env)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Value {
        Expression::parse(src).unwrap().evaluate(&Env::new()).unwrap()
    }

    fn eval_with(src: &str, binds: &[(&str, Value)]) -> Result<Value> {
        let mut env = Env::new();
        for (n, v) in binds {
            env.bind(*n, v.clone());
        }
        Expression::parse(src).unwrap().evaluate(&env)
    }

    #[test]
    fn precedence_matches_convention() {
        assert_eq!(eval("2 + 3 * 4"), Value::from(14i64));
        assert_eq!(eval("(2 + 3) * 4"), Value::from(20i64));
        assert_eq!(eval("1 << 4 | 1"), Value::from(17i64));
        assert_eq!(eval("7 % 3 + 1"), Value::from(2i64));
        assert_eq!(eval("-2 * 3"), Value::from(-6i64));
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval("3 < 4"), Value::from(1i64));
        assert_eq!(eval("3 >= 4"), Value::from(0i64));
        assert_eq!(eval("2 == 2 && 1 != 0"), Value::from(1i64));
        assert_eq!(eval("0 || 5"), Value::from(1i64));
    }

    #[test]
    fn conditional_expression_is_lazy() {
        assert_eq!(eval("1 if 1 else 1 // 0"), Value::from(1i64));
        assert_eq!(eval("10 if 0 else 20"), Value::from(20i64));
    }

    #[test]
    fn division_is_floored_and_checked() {
        assert_eq!(eval("7 // 2"), Value::from(3i64));
        assert_eq!(eval("-7 // 2"), Value::from(-4i64));
        assert_eq!(eval("7 / 2"), Value::from(3i64));
        let err = Expression::parse("1 / 0").unwrap().evaluate(&Env::new());
        assert!(err.unwrap_err().is_arithmetic());
    }

    #[test]
    fn bitwise_and_unary_operators() {
        assert_eq!(eval("~0"), Value::from(-1i64));
        assert_eq!(eval("!3"), Value::from(0i64));
        assert_eq!(eval("6 & 3"), Value::from(2i64));
        assert_eq!(eval("6 ^ 3"), Value::from(5i64));
        assert_eq!(eval("256 >> 4"), Value::from(16i64));
    }

    #[test]
    fn names_resolve_through_the_environment() {
        let v = eval_with("w * h", &[("w", Value::from(3i64)), ("h", Value::from(4i64))]);
        assert_eq!(v.unwrap(), Value::from(12i64));
        let err = eval_with("w * h", &[("w", Value::from(3i64))]).unwrap_err();
        assert!(err.is_unresolved_name());
    }

    #[test]
    fn indexing_into_bound_lists() {
        let lengths = Value::List(vec![Value::from(8i64), Value::from(16i64)]);
        let v = eval_with("lengths[1]", &[("lengths", lengths.clone())]).unwrap();
        assert_eq!(v, Value::from(16i64));
        let err = eval_with("lengths[2]", &[("lengths", lengths)]).unwrap_err();
        assert!(err.is_out_of_range());
    }

    #[test]
    fn constant_expressions_fold() {
        let e = Expression::parse("3 * 7").unwrap();
        assert_eq!(e.const_value(), Some(&Value::from(21i64)));
        assert_eq!(e.to_string(), "21");
        let e = Expression::parse("x + 1").unwrap();
        assert_eq!(e.const_value(), None);
        assert_eq!(e.to_string(), "{x + 1}");
    }

    #[test]
    fn counts_must_be_non_negative() {
        let e = Expression::parse("0 - 2").unwrap();
        assert!(e.evaluate_count(&Env::new()).unwrap_err().is_out_of_range());
    }

    #[test]
    fn big_integers_do_not_overflow() {
        let v = eval("(1 << 100) + 1");
        let expected = (BigInt::from(1) << 100) + 1;
        assert_eq!(v, Value::Int(expected));
    }
}
