// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Building positioned form trees from the token stream. One
//! [Form](Form) is one complete EDN form: an atom, a collection, or a
//! tagged form. `#_` discard prefixes are consumed here and never
//! reach the decoder: the reader reads the marked form (recursively
//! processing nested discards and tag prefixes) and drops it.

use crate::parse::{ParseError, ParseErrorWithPos, Token, TokenWithPos};
use crate::pos::{Pos, Span};
use crate::value::{Atom, BracketKind, CollectionKind};
use kstring::KString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("{0}")]
    PE(ParseError),
    #[error("unexpected closing character '{}'", .0.closing())]
    UnexpectedClosingBracket(BracketKind),
    #[error("'{}' {1} expects '{}', got '{}'",
            .0.opening(), .0.closing().closing(), .2.closing())]
    BracketMismatch(CollectionKind, Pos, BracketKind),
    #[error("premature EOF while expecting closing character '{}' for '{}'",
            .0.closing().closing(), .0.opening())]
    PrematureEofExpectingClosingBracket(CollectionKind),
    #[error("map literal has an odd number of elements ({0})")]
    OddMapElements(usize),
    #[error("premature EOF after '#_' while expecting a form to discard")]
    PrematureEofAfterDiscard,
    #[error("premature EOF after tag '#{0}' while expecting a form")]
    PrematureEofAfterTag(KString),
    #[error("nesting too deep")]
    NestingTooDeep,
}

#[derive(Error, Debug)]
#[error("{err} {pos}")]
pub struct ReadErrorWithPos {
    pub err: ReadError,
    pub pos: Pos,
}

impl ReadError {
    fn at(self, p: Pos) -> ReadErrorWithPos {
        ReadErrorWithPos {
            err: self,
            pos: p
        }
    }
}

impl From<ParseErrorWithPos> for ReadErrorWithPos {
    fn from(ep: ParseErrorWithPos) -> ReadErrorWithPos {
        let ParseErrorWithPos { err, pos } = ep;
        ReadErrorWithPos {
            err: ReadError::PE(err),
            pos
        }
    }
}

/// One complete EDN form with its position and the byte span of its
/// exact source text (tag prefixes included, discards not).
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub pos: Pos,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    Atom(Atom),
    List(Vec<Form>),
    Vector(Vec<Form>),
    /// Flat alternating key/value children; the even element count is
    /// enforced at read time.
    Map(Vec<Form>),
    Set(Vec<Form>),
    Tagged(KString, Box<Form>),
}

impl Form {
    /// Category name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            FormKind::Atom(a) => a.kind_name(),
            FormKind::List(_) => "list",
            FormKind::Vector(_) => "vector",
            FormKind::Map(_) => "map",
            FormKind::Set(_) => "set",
            FormKind::Tagged(_, _) => "tagged form",
        }
    }
}

/// The nesting limit used by the decode entry points.
// The limit with default settings on Linux is around 1200.
pub const DEPTH_FUEL: u32 = 500;

enum Item {
    Form(Form),
    Close(BracketKind, Pos, Span),
    Eof,
}

// Produce the next complete form, a closing bracket (the caller
// decides whether it was expected), or EOF. Discard prefixes are
// consumed here, including chains like `#_ #_ a b`: each `#_` reads
// one (discard-processed) form, drops it, and continues with the one
// after.
fn next_item(
    ts: &mut impl Iterator<Item = Result<TokenWithPos,
                                         ParseErrorWithPos>>,
    depth_fuel: u32,
) -> Result<Item, ReadErrorWithPos> {
    let te = match ts.next() {
        None => return Ok(Item::Eof),
        Some(te) => te,
    };
    let TokenWithPos(t, pos, span) = te?;
    match t {
        Token::Atom(a) => Ok(Item::Form(Form {
            kind: FormKind::Atom(a),
            pos,
            span,
        })),
        Token::Open(kind) => {
            if depth_fuel == 0 {
                return Err(ReadError::NestingTooDeep.at(pos));
            }
            Ok(Item::Form(slurp(ts, kind, pos, span, depth_fuel - 1)?))
        }
        Token::Close(bk) => Ok(Item::Close(bk, pos, span)),
        Token::Discard => {
            if depth_fuel == 0 {
                return Err(ReadError::NestingTooDeep.at(pos));
            }
            match next_item(ts, depth_fuel - 1)? {
                Item::Form(_) => next_item(ts, depth_fuel),
                Item::Close(bk, cpos, _) => Err(
                    ReadError::UnexpectedClosingBracket(bk).at(cpos)),
                Item::Eof => Err(
                    ReadError::PrematureEofAfterDiscard.at(pos)),
            }
        }
        Token::Tag(name) => {
            if depth_fuel == 0 {
                return Err(ReadError::NestingTooDeep.at(pos));
            }
            match next_item(ts, depth_fuel - 1)? {
                Item::Form(inner) => {
                    let span = span.union(inner.span);
                    Ok(Item::Form(Form {
                        kind: FormKind::Tagged(name, Box::new(inner)),
                        pos,
                        span,
                    }))
                }
                Item::Close(bk, cpos, _) => Err(
                    ReadError::UnexpectedClosingBracket(bk).at(cpos)),
                Item::Eof => Err(
                    ReadError::PrematureEofAfterTag(name).at(pos)),
            }
        }
    }
}

// Read and fill the children of a collection up to the expected
// closing bracket. Maps get their element count checked here.
fn slurp(
    ts: &mut impl Iterator<Item = Result<TokenWithPos,
                                         ParseErrorWithPos>>,
    kind: CollectionKind,
    startpos: Pos,
    startspan: Span,
    depth_fuel: u32,
) -> Result<Form, ReadErrorWithPos> {
    let mut v = Vec::new();
    loop {
        match next_item(ts, depth_fuel)? {
            Item::Form(f) => v.push(f),
            Item::Close(bk, cpos, cspan) => {
                if bk != kind.closing() {
                    return Err(ReadError::BracketMismatch(
                        kind, startpos, bk).at(cpos));
                }
                if kind == CollectionKind::Map && v.len() % 2 != 0 {
                    return Err(ReadError::OddMapElements(v.len())
                               .at(startpos));
                }
                let fkind = match kind {
                    CollectionKind::List => FormKind::List(v),
                    CollectionKind::Vector => FormKind::Vector(v),
                    CollectionKind::Map => FormKind::Map(v),
                    CollectionKind::Set => FormKind::Set(v),
                };
                return Ok(Form {
                    kind: fkind,
                    pos: startpos,
                    span: startspan.union(cspan),
                });
            }
            Item::Eof => {
                return Err(ReadError::PrematureEofExpectingClosingBracket(
                    kind).at(startpos));
            }
        }
    }
}

/// Reads one complete top-level form from the token stream; `Ok(None)`
/// at clean end of input.
pub fn read_form(
    ts: &mut impl Iterator<Item = Result<TokenWithPos,
                                         ParseErrorWithPos>>,
    depth_fuel: u32,
) -> Result<Option<Form>, ReadErrorWithPos> {
    match next_item(ts, depth_fuel)? {
        Item::Form(f) => Ok(Some(f)),
        Item::Close(bk, cpos, _) => Err(
            ReadError::UnexpectedClosingBracket(bk).at(cpos)),
        Item::Eof => Ok(None),
    }
}
