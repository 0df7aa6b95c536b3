//! Reader for path-navigation fragments.
//!
//! Grammar (whitespace allowed between tokens):
//!
//! ```text
//! query     := nav
//! nav       := primary postfix*
//! primary   := "$$" | call | string | int
//! call      := qname "(" (nav ("," nav)*)? ")"
//! postfix   := "." (ident | string)
//!            | "[" int "]"
//!            | "[?" nav op nav "]"
//! op        := eq | ne | lt | le | gt | ge | = | != | < | <= | > | >=
//! ```
//!
//! The `jn` prefix is bound to the JSON function namespace; any other
//! prefix is kept verbatim without a namespace URI.

use crate::ast::{Ast, AstError, AstId, Comparator};
use crate::qname::{QName, JSON_PREFIX};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error near `{near}`")]
    Syntax { near: String },
    #[error(transparent)]
    Ast(#[from] AstError),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    ContextItem,
    Str(String),
    Int(i64),
    Call {
        prefix: Option<String>,
        local: String,
        args: Vec<Expr>,
    },
    Deref(Box<Expr>, String),
    Index(Box<Expr>, i64),
    Filter(Box<Expr>, Box<Expr>),
    Compare(Comparator, Box<Expr>, Box<Expr>),
}

enum Postfix {
    Deref(String),
    Index(i64),
    Filter(Expr),
}

/// Parse `text` into `ast` and return the id of a fresh `Query` root whose
/// only child is the parsed expression.
pub fn parse_query(ast: &mut Ast, text: &str) -> Result<AstId, ParseError> {
    let expr = match all_consuming(delimited(multispace0, nav, multispace0))(text) {
        Ok((_, expr)) => expr,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::Syntax {
                near: e.input.chars().take(24).collect(),
            })
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(ParseError::Syntax {
                near: String::new(),
            })
        }
    };
    let body = lower(ast, expr)?;
    Ok(ast.query(body)?)
}

fn lower(ast: &mut Ast, expr: Expr) -> Result<AstId, AstError> {
    match expr {
        Expr::ContextItem => Ok(ast.context_item()),
        Expr::Str(s) => Ok(ast.str_literal(s)),
        Expr::Int(i) => Ok(ast.int_literal(i)),
        Expr::Call {
            prefix,
            local,
            args,
        } => {
            let name = match prefix.as_deref() {
                Some(JSON_PREFIX) => QName::json_function(local),
                Some(other) => QName {
                    namespace: None,
                    prefix: Some(other.to_string()),
                    local,
                },
                None => QName::local(local),
            };
            let mut ids = Vec::with_capacity(args.len());
            for arg in args {
                ids.push(lower(ast, arg)?);
            }
            ast.function_call(name, ids)
        }
        Expr::Deref(target, label) => {
            let target = lower(ast, *target)?;
            ast.deref(target, &label)
        }
        Expr::Index(target, index) => {
            let target = lower(ast, *target)?;
            ast.array_access(target, index)
        }
        Expr::Filter(target, predicate) => {
            let target = lower(ast, *target)?;
            let predicate = lower(ast, *predicate)?;
            ast.filter(target, predicate)
        }
        Expr::Compare(op, lhs, rhs) => {
            let lhs = lower(ast, *lhs)?;
            let rhs = lower(ast, *rhs)?;
            ast.comparison(op, lhs, rhs)
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue)))(input)
}

fn string_lit(input: &str) -> IResult<&str, String> {
    map(
        alt((
            delimited(pchar('"'), take_while(|c| c != '"'), pchar('"')),
            delimited(pchar('\''), take_while(|c| c != '\''), pchar('\'')),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn int_lit(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(pchar('-')), digit1)), |s: &str| {
        s.parse::<i64>()
    })(input)
}

fn qname(input: &str) -> IResult<&str, (Option<&str>, &str)> {
    let (input, first) = ident(input)?;
    let (input, second) = opt(preceded(pchar(':'), ident))(input)?;
    Ok(match second {
        Some(local) => (input, (Some(first), local)),
        None => (input, (None, first)),
    })
}

fn call(input: &str) -> IResult<&str, Expr> {
    let (input, (prefix, local)) = qname(input)?;
    let (input, _) = preceded(multispace0, pchar('('))(input)?;
    let (input, args) = separated_list0(
        preceded(multispace0, pchar(',')),
        preceded(multispace0, nav),
    )(input)?;
    let (input, _) = preceded(multispace0, pchar(')'))(input)?;
    Ok((
        input,
        Expr::Call {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
            args,
        },
    ))
}

fn primary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(tag("$$"), |_| Expr::ContextItem),
        call,
        map(string_lit, Expr::Str),
        map(int_lit, Expr::Int),
    ))(input)
}

fn comparator(input: &str) -> IResult<&str, Comparator> {
    alt((
        map(tag("eq"), |_| Comparator::Eq),
        map(tag("ne"), |_| Comparator::Ne),
        map(tag("lt"), |_| Comparator::Lt),
        map(tag("le"), |_| Comparator::Le),
        map(tag("gt"), |_| Comparator::Gt),
        map(tag("ge"), |_| Comparator::Ge),
        map(tag("!="), |_| Comparator::Ne),
        map(tag("<="), |_| Comparator::Le),
        map(tag(">="), |_| Comparator::Ge),
        map(tag("<"), |_| Comparator::Lt),
        map(tag(">"), |_| Comparator::Gt),
        map(tag("="), |_| Comparator::Eq),
    ))(input)
}

fn predicate(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = nav(input)?;
    let (input, op) = preceded(multispace0, comparator)(input)?;
    let (input, rhs) = preceded(multispace0, nav)(input)?;
    Ok((input, Expr::Compare(op, Box::new(lhs), Box::new(rhs))))
}

fn postfix(input: &str) -> IResult<&str, Postfix> {
    preceded(
        multispace0,
        alt((
            map(
                preceded(
                    pair(pchar('.'), multispace0),
                    alt((map(ident, |s: &str| s.to_string()), string_lit)),
                ),
                Postfix::Deref,
            ),
            map(
                delimited(
                    pair(tag("[?"), multispace0),
                    predicate,
                    pair(multispace0, pchar(']')),
                ),
                Postfix::Filter,
            ),
            map(
                delimited(
                    pair(pchar('['), multispace0),
                    int_lit,
                    pair(multispace0, pchar(']')),
                ),
                Postfix::Index,
            ),
        )),
    )(input)
}

fn nav(input: &str) -> IResult<&str, Expr> {
    let (input, head) = primary(input)?;
    let (input, postfixes) = many0(postfix)(input)?;
    let expr = postfixes
        .into_iter()
        .fold(head, |target, postfix| match postfix {
            Postfix::Deref(label) => Expr::Deref(Box::new(target), label),
            Postfix::Index(index) => Expr::Index(Box::new(target), index),
            Postfix::Filter(predicate) => Expr::Filter(Box::new(target), Box::new(predicate)),
        });
    Ok((input, expr))
}
