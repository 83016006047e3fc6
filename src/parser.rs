//! Grammar front-ends for the three external languages, using chumsky.
//!
//! Role
//! - Turn bit-source literal strings into [`Bits`].
//! - Turn dtype token strings into [`Dtype`] values.
//! - Turn schema definition strings into [`FieldType`] trees.
//! - Turn `{…}` expression text into expression ASTs.
//!
//! Two stages everywhere:
//! 1) Tokenisation from the input string to a [`Token`] stream. All four
//!    grammars share one lexer; `{…}` groups are captured raw and parsed
//!    as expressions on demand.
//! 2) Parsing the token stream with chumsky combinators, building the
//!    target structure directly and reporting constructor failures as
//!    syntax errors with their span.
//!
//! The accepted syntax round-trips with the `Display` implementations of
//! the structures it produces, modulo whitespace and `#` comments.

use chumsky::input::ValueInput;
use chumsky::prelude::*;
use chumsky::text;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::bits::Bits;
use crate::dtype::{Dtype, DtypeArray, DtypeSingle, DtypeTuple, Endianness, Kind};
use crate::error::{Error, Result};
use crate::expr::{BinOp, ExprNode, Expression, UnOp};
use crate::schema::{Field, FieldType, Format, If, Let, Repeat};
use crate::value::Value;

type Span = SimpleSpan;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    // Literals
    Int(BigInt),
    Float(f64),
    Str(String),
    HexLit(String),
    BinLit(String),
    OctLit(String),
    /// The raw text between `{` and `}`.
    ExprGroup(String),
    Ident(String),

    // Keywords
    If,
    Else,
    Repeat,
    Let,
    Pass,
    Const,
    True,
    False,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Dot,
    Semi,
    Assign,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Shl,
    Shr,
    Amp,
    Pipe,
    Caret,
    EqEq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
    AndAnd,
    OrOr,
    Tilde,
    Bang,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::HexLit(s) => write!(f, "0x{s}"),
            Token::BinLit(s) => write!(f, "0b{s}"),
            Token::OctLit(s) => write!(f, "0o{s}"),
            Token::ExprGroup(s) => write!(f, "{{{s}}}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::Repeat => write!(f, "repeat"),
            Token::Let => write!(f, "let"),
            Token::Pass => write!(f, "pass"),
            Token::Const => write!(f, "const"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Colon => write!(f, ":"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Semi => write!(f, ";"),
            Token::Assign => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::SlashSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Shl => write!(f, "<<"),
            Token::Shr => write!(f, ">>"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Caret => write!(f, "^"),
            Token::EqEq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Lt => write!(f, "<"),
            Token::Ge => write!(f, ">="),
            Token::Gt => write!(f, ">"),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Tilde => write!(f, "~"),
            Token::Bang => write!(f, "!"),
        }
    }
}

// ---------------- Lexer ----------------

fn lexer<'a>() -> impl Parser<'a, &'a str, Vec<Token>, extra::Err<Rich<'a, char>>> {
    let strip = |s: String| s.chars().filter(|c| *c != '_').collect::<String>();

    let hex_lit = just("0x")
        .ignore_then(
            any()
                .filter(|c: &char| c.is_ascii_hexdigit() || *c == '_')
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .map(move |s| Token::HexLit(strip(s)));
    let bin_lit = just("0b")
        .ignore_then(
            any()
                .filter(|c: &char| *c == '0' || *c == '1' || *c == '_')
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .map(move |s| Token::BinLit(strip(s)));
    let oct_lit = just("0o")
        .ignore_then(
            any()
                .filter(|c: &char| ('0'..='7').contains(c) || *c == '_')
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .map(move |s| Token::OctLit(strip(s)));

    let float = text::digits(10)
        .then(just('.'))
        .then(text::digits(10))
        .to_slice()
        .map(|s: &str| Token::Float(s.parse().expect("lexed float is valid")));
    let int = text::digits(10)
        .to_slice()
        .map(|s: &str| Token::Int(s.parse().expect("lexed integer is valid")));

    let string = just('"')
        .ignore_then(none_of('"').repeated().collect::<String>())
        .then_ignore(just('"'))
        .map(Token::Str);

    let expr_group = just('{')
        .ignore_then(none_of('}').repeated().collect::<String>())
        .then_ignore(just('}'))
        .map(Token::ExprGroup);

    let word = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| match s {
            "if" => Token::If,
            "else" => Token::Else,
            "repeat" => Token::Repeat,
            "let" => Token::Let,
            "pass" => Token::Pass,
            "const" => Token::Const,
            "true" | "True" => Token::True,
            "false" | "False" => Token::False,
            _ => Token::Ident(s.to_string()),
        });

    // Multi-character operators first to avoid prefix capture.
    let op = choice((
        just("<<").to(Token::Shl),
        just(">>").to(Token::Shr),
        just("<=").to(Token::Le),
        just(">=").to(Token::Ge),
        just("==").to(Token::EqEq),
        just("!=").to(Token::Ne),
        just("&&").to(Token::AndAnd),
        just("||").to(Token::OrOr),
        just("//").to(Token::SlashSlash),
    ));

    let punct = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(':').to(Token::Colon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just(';').to(Token::Semi),
        just('=').to(Token::Assign),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ))
    .or(choice((
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('&').to(Token::Amp),
        just('|').to(Token::Pipe),
        just('^').to(Token::Caret),
        just('~').to(Token::Tilde),
        just('!').to(Token::Bang),
    )));

    let token = choice((
        hex_lit, bin_lit, oct_lit, float, int, string, expr_group, word, op, punct,
    ));

    // Comments are single-line starting with '#'.
    let comment = just('#')
        .then(any().and_is(just('\n').not()).repeated())
        .padded()
        .to(());

    token
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .collect()
        .then_ignore(end())
}

fn lex(src: &str) -> Result<Vec<Token>> {
    let (tokens, errors) = lexer().parse(src).into_output_errors();
    match tokens {
        Some(tokens) if errors.is_empty() => Ok(tokens),
        _ => {
            let mut messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if messages.is_empty() {
                messages.push("invalid input".into());
            }
            Err(Error::BadSyntax(messages.join("; ")))
        }
    }
}

fn run<'t, O>(
    parser: impl Parser<'t, &'t [Token], O, extra::Err<Rich<'t, Token, Span>>>,
    tokens: &'t [Token],
) -> Result<O> {
    let (out, errors) = parser.then_ignore(end()).parse(tokens).into_output_errors();
    match out {
        Some(out) if errors.is_empty() => Ok(out),
        _ => {
            let mut messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if messages.is_empty() {
                messages.push("invalid input".into());
            }
            Err(Error::BadSyntax(messages.join("; ")))
        }
    }
}

// ---------------- Expressions ----------------

fn expr_parser<'t, I>() -> impl Parser<'t, I, ExprNode, extra::Err<Rich<'t, Token, Span>>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|expr| {
        macro_rules! binary_level {
            ($lower:expr, $ops:expr) => {
                $lower
                    .clone()
                    .foldl($ops.then($lower.clone()).repeated(), |lhs, (op, rhs)| {
                        ExprNode::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        }
                    })
            };
        }

        let literal = select! {
            Token::Int(i) => ExprNode::Int(i),
            Token::True => ExprNode::Int(BigInt::from(1)),
            Token::False => ExprNode::Int(BigInt::from(0)),
        };
        let name = select! { Token::Ident(n) => n }
            .then(
                just(Token::Dot)
                    .ignore_then(select! { Token::Ident(n) => n })
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(head, tail)| {
                let mut path = vec![head];
                path.extend(tail);
                ExprNode::Name(path)
            });
        let atom = choice((
            literal,
            name,
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .labelled("expression atom")
        .boxed();

        // Indexing binds tightest.
        let index = atom
            .foldl(
                expr.clone()
                    .delimited_by(just(Token::LBracket), just(Token::RBracket))
                    .repeated(),
                |base, idx| ExprNode::Index {
                    base: Box::new(base),
                    index: Box::new(idx),
                },
            )
            .boxed();

        let unary = choice((
            just(Token::Minus).to(UnOp::Neg),
            just(Token::Tilde).to(UnOp::BitNot),
            just(Token::Bang).to(UnOp::Not),
        ))
        .repeated()
        .foldr(index, |op, inner| ExprNode::Unary {
            op,
            inner: Box::new(inner),
        })
        .boxed();

        let product = binary_level!(
            unary,
            choice((
                just(Token::Star).to(BinOp::Mul),
                just(Token::SlashSlash).to(BinOp::FloorDiv),
                just(Token::Slash).to(BinOp::Div),
                just(Token::Percent).to(BinOp::Mod),
            ))
        )
        .boxed();
        let sum = binary_level!(
            product,
            choice((
                just(Token::Plus).to(BinOp::Add),
                just(Token::Minus).to(BinOp::Sub),
            ))
        )
        .boxed();
        let shift = binary_level!(
            sum,
            choice((just(Token::Shl).to(BinOp::Shl), just(Token::Shr).to(BinOp::Shr)))
        )
        .boxed();
        let bit_and = binary_level!(shift, just(Token::Amp).to(BinOp::BitAnd)).boxed();
        let bit_xor = binary_level!(bit_and, just(Token::Caret).to(BinOp::BitXor)).boxed();
        let bit_or = binary_level!(bit_xor, just(Token::Pipe).to(BinOp::BitOr)).boxed();
        let comparison = binary_level!(
            bit_or,
            choice((
                just(Token::EqEq).to(BinOp::Eq),
                just(Token::Ne).to(BinOp::Ne),
                just(Token::Le).to(BinOp::Le),
                just(Token::Lt).to(BinOp::Lt),
                just(Token::Ge).to(BinOp::Ge),
                just(Token::Gt).to(BinOp::Gt),
            ))
        )
        .boxed();
        let logic_and = binary_level!(comparison, just(Token::AndAnd).to(BinOp::And)).boxed();
        let logic_or = binary_level!(logic_and, just(Token::OrOr).to(BinOp::Or)).boxed();

        // `a if c else b` is right-associative and binds loosest.
        recursive(|cond| {
            logic_or
                .clone()
                .then(
                    just(Token::If)
                        .ignore_then(logic_or.clone())
                        .then_ignore(just(Token::Else))
                        .then(cond)
                        .or_not(),
                )
                .map(|(then, rest)| match rest {
                    None => then,
                    Some((c, other)) => ExprNode::Cond {
                        then: Box::new(then),
                        cond: Box::new(c),
                        other: Box::new(other),
                    },
                })
        })
    })
}

// ---------------- Dtypes ----------------

/// Split a glued dtype ident such as `u12_le` into kind, size and
/// endianness.
fn decompose_single(s: &str) -> Result<DtypeSingle> {
    let (body, endianness) = if let Some(b) = s.strip_suffix("_be") {
        (b, Endianness::Big)
    } else if let Some(b) = s.strip_suffix("_le") {
        (b, Endianness::Little)
    } else if let Some(b) = s.strip_suffix("_ne") {
        (b, Endianness::Native)
    } else {
        (s, Endianness::Unspecified)
    };
    // Longest tokens first so that prefixes never shadow longer kinds.
    const KIND_TOKENS: [&str; 10] = [
        "bytes", "bool", "bits", "hex", "bin", "oct", "pad", "u", "i", "f",
    ];
    for token in KIND_TOKENS {
        if let Some(rest) = body.strip_prefix(token) {
            let size = if rest.is_empty() {
                None
            } else if rest.bytes().all(|b| b.is_ascii_digit()) {
                Some(rest.parse::<usize>().map_err(|_| {
                    Error::BadDtype(format!("the size in the dtype '{s}' is too large"))
                })?)
            } else {
                continue;
            };
            let kind = token.parse::<Kind>().expect("token table matches kinds");
            return DtypeSingle::new(kind, size.map(Expression::from_int), endianness);
        }
    }
    Err(Error::BadDtype(format!("unknown dtype '{s}'")))
}

fn single_parser<'t, I>() -> impl Parser<'t, I, DtypeSingle, extra::Err<Rich<'t, Token, Span>>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let expr_size = select! { Token::ExprGroup(src) => src };
    let suffix = select! { Token::Ident(s) if s == "_be" || s == "_le" || s == "_ne" => s };
    select! { Token::Ident(s) => s }
        .then(expr_size.then(suffix.or_not()).or_not())
        .try_map(|(head, group), span| {
            let built = match group {
                None => decompose_single(&head),
                Some((src, suffix)) => (|| {
                    let kind = head.parse::<Kind>().map_err(|_| {
                        Error::BadDtype(format!("unknown dtype kind '{head}'"))
                    })?;
                    let endianness = match suffix {
                        Some(sfx) => sfx.trim_start_matches('_').parse::<Endianness>()?,
                        None => Endianness::Unspecified,
                    };
                    let size = Expression::parse(&src)?;
                    DtypeSingle::new(kind, Some(size), endianness)
                })(),
            };
            built.map_err(|e| Rich::custom(span, e.to_string()))
        })
        .labelled("dtype")
}

fn dtype_parser<'t, I>() -> impl Parser<'t, I, Dtype, extra::Err<Rich<'t, Token, Span>>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|dtype| {
        let count = choice((
            select! { Token::Int(i) => i }.try_map(|i, span| {
                i.to_usize()
                    .map(Expression::from_int)
                    .ok_or_else(|| Rich::custom(span, "array count is too large"))
            }),
            select! { Token::ExprGroup(src) => src }.try_map(|src, span| {
                Expression::parse(&src).map_err(|e| Rich::custom(span, e.to_string()))
            }),
        ));
        let array = single_parser()
            .then_ignore(just(Token::Semi))
            .then(count.or_not())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .try_map(|(item, items), span| {
                DtypeArray::new(item, items)
                    .map(Dtype::Array)
                    .map_err(|e| Rich::custom(span, e.to_string()))
            })
            .labelled("array dtype")
            .boxed();
        let tuple = dtype
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .try_map(|elems, span| {
                DtypeTuple::new(elems)
                    .map(Dtype::Tuple)
                    .map_err(|e| Rich::custom(span, e.to_string()))
            })
            .labelled("tuple dtype")
            .boxed();
        choice((array, tuple, single_parser().map(Dtype::Single)))
    })
}

// ---------------- Values ----------------

#[derive(Debug, Clone)]
enum ValueTok {
    Int(BigInt),
    Float(f64),
    Bool(bool),
    Str(String),
    Word(String),
    Hex(String),
    Bin(String),
    Oct(String),
    List(Vec<ValueTok>),
}

fn value_parser<'t, I>() -> impl Parser<'t, I, ValueTok, extra::Err<Rich<'t, Token, Span>>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|value| {
        let scalar = select! {
            Token::Int(i) => ValueTok::Int(i),
            Token::Float(x) => ValueTok::Float(x),
            Token::True => ValueTok::Bool(true),
            Token::False => ValueTok::Bool(false),
            Token::Str(s) => ValueTok::Str(s),
            Token::Ident(s) => ValueTok::Word(s),
            Token::HexLit(s) => ValueTok::Hex(s),
            Token::BinLit(s) => ValueTok::Bin(s),
            Token::OctLit(s) => ValueTok::Oct(s),
        };
        let negative = just(Token::Minus).ignore_then(select! {
            Token::Int(i) => ValueTok::Int(-i),
            Token::Float(x) => ValueTok::Float(-x),
        });
        let bracket_list = value
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(ValueTok::List)
            .boxed();
        let paren_list = value
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(ValueTok::List);
        choice((negative, scalar, bracket_list, paren_list)).labelled("value")
    })
}

fn big_from_radix(s: &str, radix: u32) -> Result<BigInt> {
    BigInt::parse_bytes(s.as_bytes(), radix)
        .ok_or_else(|| Error::BadSyntax(format!("'{s}' is not a base-{radix} integer")))
}

fn single_value_from_tok(kind: Kind, tok: &ValueTok) -> Result<Value> {
    use Kind::*;
    Ok(match (kind, tok) {
        (Uint | Int, ValueTok::Int(i)) => Value::Int(i.clone()),
        (Uint | Int, ValueTok::Hex(s)) => Value::Int(big_from_radix(s, 16)?),
        (Uint | Int, ValueTok::Bin(s)) => Value::Int(big_from_radix(s, 2)?),
        (Uint | Int, ValueTok::Oct(s)) => Value::Int(big_from_radix(s, 8)?),
        (Uint | Int, ValueTok::Bool(b)) => Value::Int(BigInt::from(*b as u8)),
        (Float, ValueTok::Float(x)) => Value::Float(*x),
        (Float, ValueTok::Int(i)) => Value::Float(i.to_f64().ok_or_else(|| {
            Error::OutOfRange(format!("{i} cannot be represented as a float"))
        })?),
        (Bool, ValueTok::Bool(b)) => Value::Bool(*b),
        (Bool, ValueTok::Int(i)) => Value::Int(i.clone()),
        (Bytes, ValueTok::Str(s) | ValueTok::Word(s)) => Value::Bytes(s.clone().into_bytes()),
        (Hex, ValueTok::Hex(s) | ValueTok::Word(s) | ValueTok::Str(s)) => Value::Str(s.clone()),
        (Hex, ValueTok::Int(i)) => Value::Str(i.to_string()),
        (Bin, ValueTok::Bin(s) | ValueTok::Word(s) | ValueTok::Str(s)) => Value::Str(s.clone()),
        (Bin, ValueTok::Int(i)) => Value::Str(i.to_string()),
        (Oct, ValueTok::Oct(s) | ValueTok::Str(s)) => Value::Str(s.clone()),
        (Oct, ValueTok::Int(i)) => Value::Str(i.to_string()),
        (Bits, ValueTok::Hex(s)) => Value::Bits(crate::bits::Bits::from_hex(s)?),
        (Bits, ValueTok::Bin(s)) => Value::Bits(crate::bits::Bits::from_bin(s)?),
        (Bits, ValueTok::Oct(s)) => Value::Bits(crate::bits::Bits::from_oct(s)?),
        (Pad, _) => {
            return Err(Error::SchemaError(
                "padding fields cannot take a value".into(),
            ))
        }
        (kind, tok) => {
            return Err(Error::BadSyntax(format!(
                "'{tok:?}' is not a valid value for a '{kind}' dtype"
            )))
        }
    })
}

fn value_from_tok(dtype: &Dtype, tok: &ValueTok) -> Result<Value> {
    match dtype {
        Dtype::Single(single) => single_value_from_tok(single.kind(), tok),
        Dtype::Array(array) => match tok {
            ValueTok::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|t| single_value_from_tok(array.item().kind(), t))
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Err(Error::BadSyntax(format!(
                "an array value must be a bracketed list, got '{other:?}'"
            ))),
        },
        Dtype::Tuple(tuple) => match tok {
            ValueTok::List(items) => {
                let mut out = Vec::new();
                let mut next = items.iter();
                for elem in tuple.elems() {
                    if elem.is_pad() {
                        continue;
                    }
                    let tok = next.next().ok_or_else(|| {
                        Error::BadSyntax(format!("too few values for the tuple dtype '{dtype}'"))
                    })?;
                    out.push(value_from_tok(elem, tok)?);
                }
                if next.next().is_some() {
                    return Err(Error::BadSyntax(format!(
                        "too many values for the tuple dtype '{dtype}'"
                    )));
                }
                Ok(Value::List(out))
            }
            other => Err(Error::BadSyntax(format!(
                "a tuple value must be a bracketed list, got '{other:?}'"
            ))),
        },
    }
}

// ---------------- Schemas ----------------

fn field_type_parser<'t, I>() -> impl Parser<'t, I, FieldType, extra::Err<Rich<'t, Token, Span>>> + Clone
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    recursive(|field_type| {
        let name = select! { Token::Ident(s) => s };
        let expr_arg = choice((
            select! { Token::ExprGroup(src) => src }.try_map(|src, span| {
                Expression::parse(&src).map_err(|e| Rich::custom(span, e.to_string()))
            }),
            select! { Token::Int(i) => Expression::from_int(i) },
        ));

        let field = name
            .clone()
            .then_ignore(just(Token::Colon))
            .or_not()
            .then(just(Token::Const).or_not().map(|c| c.is_some()))
            .then(dtype_parser())
            .then(just(Token::Assign).ignore_then(value_parser()).or_not())
            .try_map(|(((name, konst), dtype), value_tok), span| {
                let value = match &value_tok {
                    Some(tok) => {
                        Some(value_from_tok(&dtype, tok).map_err(|e| Rich::custom(span, e.to_string()))?)
                    }
                    None => None,
                };
                Field::new(dtype, name.unwrap_or_default(), value.as_ref(), konst)
                    .map(FieldType::Field)
                    .map_err(|e| Rich::custom(span, e.to_string()))
            })
            .labelled("field")
            .boxed();

        let format = name
            .clone()
            .then_ignore(just(Token::Colon))
            .or_not()
            .then(
                field_type
                    .clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .try_map(|(name, children), span| {
                Format::new(children, name.unwrap_or_default())
                    .map(FieldType::Format)
                    .map_err(|e| Rich::custom(span, e.to_string()))
            })
            .labelled("format")
            .boxed();

        let if_ = just(Token::If)
            .ignore_then(expr_arg.clone())
            .then_ignore(just(Token::Colon))
            .then(field_type.clone())
            .then(
                just(Token::Else)
                    .ignore_then(just(Token::Colon))
                    .ignore_then(field_type.clone())
                    .or_not(),
            )
            .map(|((cond, then), other)| FieldType::If(If::new(cond, then, other)))
            .labelled("if")
            .boxed();

        let repeat = just(Token::Repeat)
            .ignore_then(expr_arg.clone())
            .then_ignore(just(Token::Colon))
            .then(field_type.clone())
            .map(|(count, body)| FieldType::Repeat(Repeat::new(count, body)))
            .labelled("repeat");

        let let_ = just(Token::Let)
            .ignore_then(name)
            .then_ignore(just(Token::Assign))
            .then(expr_arg)
            .try_map(|(name, expr), span| {
                Let::new(name, expr)
                    .map(FieldType::Let)
                    .map_err(|e| Rich::custom(span, e.to_string()))
            })
            .labelled("let");

        let pass = just(Token::Pass).to(FieldType::Pass);

        choice((if_, repeat, let_, pass, format, field))
    })
}

// ---------------- Bit-source literals ----------------

fn bit_literal_parser<'t, I>() -> impl Parser<'t, I, Bits, extra::Err<Rich<'t, Token, Span>>>
where
    I: ValueInput<'t, Token = Token, Span = Span>,
{
    let hex = select! { Token::HexLit(s) => s }
        .try_map(|s, span| Bits::from_hex(&s).map_err(|e| Rich::custom(span, e.to_string())));
    let bin = select! { Token::BinLit(s) => s }
        .try_map(|s, span| Bits::from_bin(&s).map_err(|e| Rich::custom(span, e.to_string())));
    let oct = select! { Token::OctLit(s) => s }
        .try_map(|s, span| Bits::from_oct(&s).map_err(|e| Rich::custom(span, e.to_string())));
    let typed = dtype_parser()
        .then_ignore(just(Token::Assign))
        .then(value_parser())
        .try_map(|(dtype, tok), span| {
            let build = || -> Result<Bits> {
                let value = value_from_tok(&dtype, &tok)?;
                dtype.pack(&value)
            };
            build().map_err(|e| Rich::custom(span, e.to_string()))
        });
    let item = choice((hex, bin, oct, typed)).labelled("bit literal");
    item.separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .map(Bits::from_joined)
}

// ---------------- Public entry points ----------------

/// Parse expression text (the inside of a `{…}` group).
pub(crate) fn parse_expression(src: &str) -> Result<ExprNode> {
    let tokens = lex(src)?;
    run(expr_parser(), &tokens)
}

/// Parse a dtype token string.
pub(crate) fn parse_dtype(src: &str) -> Result<Dtype> {
    let tokens = lex(src)?;
    run(dtype_parser(), &tokens)
}

/// Parse a schema definition string.
pub(crate) fn parse_field_type(src: &str) -> Result<FieldType> {
    let tokens = lex(src)?;
    if tokens.is_empty() {
        return Ok(FieldType::Pass);
    }
    run(field_type_parser(), &tokens)
}

/// Parse a comma-joined bit-source string into a single bit sequence.
pub(crate) fn parse_bit_literal(src: &str) -> Result<Bits> {
    let tokens = lex(src)?;
    if tokens.is_empty() {
        return Ok(Bits::new());
    }
    run(bit_literal_parser(), &tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_literals_concatenate_in_order() {
        let bits = parse_bit_literal("0b001, u32 = 90, 0x5e").unwrap();
        assert_eq!(bits.len(), 43);
        // Direct expansion: 001, 24 zero bits then 01011010, then 01011110,
        // padded with five zero bits to 48.
        assert_eq!(bits.to_bytes(), vec![0x20, 0x00, 0x00, 0x05, 0xa5, 0xe0]);
    }

    #[test]
    fn typed_literals_cover_the_kinds() {
        assert_eq!(parse_bit_literal("u12 = 160").unwrap().len(), 12);
        assert_eq!(parse_bit_literal("bool = 1").unwrap().to_bin(), "1");
        assert_eq!(
            parse_bit_literal("bytes = abc").unwrap().to_bytes(),
            b"abc".to_vec()
        );
        assert_eq!(
            parse_bit_literal("hex = beef").unwrap(),
            Bits::from_hex("beef").unwrap()
        );
        assert_eq!(parse_bit_literal("f64 = 3.14").unwrap().len(), 64);
        assert_eq!(parse_bit_literal("i7 = -31").unwrap().to_bin(), "1100001");
        assert_eq!(parse_bit_literal("").unwrap().len(), 0);
    }

    #[test]
    fn float_literal_endianness() {
        let le = parse_bit_literal("f64_le = 3.14").unwrap();
        let be = parse_bit_literal("f64_be = 3.14").unwrap();
        let mut reversed = be.to_bytes();
        reversed.reverse();
        assert_eq!(le.to_bytes(), reversed);
    }

    #[test]
    fn malformed_literals_are_syntax_errors() {
        assert!(parse_bit_literal("0q12").unwrap_err().is_bad_syntax());
        assert!(parse_bit_literal("u8").unwrap_err().is_bad_syntax());
        assert!(parse_bit_literal("u8 = ").unwrap_err().is_bad_syntax());
    }

    #[test]
    fn dtype_strings_parse_every_shape() {
        assert!(matches!(parse_dtype("u12").unwrap(), Dtype::Single(_)));
        assert!(matches!(parse_dtype("[i6; 5]").unwrap(), Dtype::Array(_)));
        assert!(matches!(parse_dtype("(bool, hex4, f16)").unwrap(), Dtype::Tuple(_)));
        assert!(matches!(parse_dtype("(bool, u7,)").unwrap(), Dtype::Tuple(_)));
        assert!(matches!(parse_dtype("[u8; {x + 1}]").unwrap(), Dtype::Array(_)));
        assert!(matches!(parse_dtype("u{w}_le").unwrap(), Dtype::Single(_)));
        assert!(parse_dtype("q8").is_err());
        assert!(parse_dtype("u8extra").is_err());
    }

    #[test]
    fn expression_text_round_trip() {
        let e = Expression::parse("w * h + lengths[0]").unwrap();
        assert_eq!(e.to_string(), "{w * h + lengths[0]}");
        assert!(Expression::parse("w +* h").is_err());
        assert!(Expression::parse("").is_err());
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        let s = parse_field_type("( # header\n  w: u8, h: u8 )").unwrap();
        assert_eq!(s.to_string(), "(w: u8, h: u8)");
    }

    #[test]
    fn schema_strings_build_every_node() {
        for src in [
            "pass",
            "u8",
            "x: u8",
            "x: const u8 = 3",
            "(a: u8, b: u8)",
            "hdr: (a: u8)",
            "if {x}: u8",
            "if {x}: (a: u8) else: pass",
            "repeat {n}: (v: u8)",
            "repeat 3: u8",
            "let y = {x + 1}",
            "let y = 5",
        ] {
            assert!(parse_field_type(src).is_ok(), "failed to parse '{src}'");
        }
        assert!(parse_field_type("if x: u8").is_err());
        assert!(parse_field_type("(a: u8,,)").is_err());
    }
}
