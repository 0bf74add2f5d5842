// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Translating the input text to a token stream. This is (currently)
//! called "parser" because it fully parses atoms (strings, characters,
//! numbers, symbols, keywords), thus "tokenizer" may be selling it
//! short (?). The only tokens that denote nesting are [Token::Open]
//! and [Token::Close]; `#tag` and `#_` prefixes come out as their own
//! tokens and are attached to forms by [read](../read/index.html).

use crate::pos::{Pos, Span};
use crate::value::{name2char, Atom, BracketKind, CollectionKind, Keyword, Symbol};
use genawaiter::rc::Gen;
use kstring::KString;
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unexpected EOF in string starting")]
    UnexpectedEOFInString,
    #[error("invalid escaped character '{0}' in string")]
    InvalidEscapedChar(char),
    #[error("not a hex digit: '{0}'")]
    NonHexDigit(char),
    #[error("invalid code point {0}")]
    InvalidCodePoint(u32),
    #[error("unexpected EOF in unicode escape")]
    UnexpectedEOFInEscape,
    #[error("unexpected EOF after character backslash")]
    UnexpectedEOFAfterBackslash,
    #[error("invalid character literal '\\{0}'")]
    InvalidCharLiteral(String),
    #[error("unexpected EOF after '#'")]
    UnexpectedEOFAfterHash,
    #[error("invalid '#' dispatch on '{0}'")]
    InvalidDispatch(char),
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    #[error("malformed symbol '{0}'")]
    MalformedSymbol(String),
    #[error("malformed keyword '{0}'")]
    MalformedKeyword(String),
    #[error("malformed tag name '{0}'")]
    MalformedTagName(String),
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
}

#[derive(Error, Debug)]
#[error("{err} {pos}")]
pub struct ParseErrorWithPos {
    pub err: ParseError,
    pub pos: Pos,
}

impl ParseError {
    fn at(self, p: Pos) -> ParseErrorWithPos {
        ParseErrorWithPos {
            err: self,
            pos: p
        }
    }
}

#[derive(Debug)]
pub enum Token {
    Atom(Atom),
    Open(CollectionKind),
    Close(BracketKind),
    /// A `#name` tag prefix; applies to the following form.
    Tag(KString),
    /// A `#_` discard prefix; the following form is dropped.
    Discard,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
           -> Result<(), std::fmt::Error> {
        match self {
            Token::Atom(a) => a.fmt(f),
            Token::Open(k) => f.write_str(k.opening()),
            Token::Close(k) => f.write_char(k.closing()),
            Token::Tag(name) => f.write_fmt(format_args!("#{}", name)),
            Token::Discard => f.write_str("#_"),
        }
    }
}

#[derive(Debug)]
pub struct TokenWithPos(pub Token, pub Pos, pub Span);

fn is_whitespace_char(c: char) -> bool {
    // Commas are whitespace in EDN.
    c.is_whitespace() || c == ','
}

/// Characters that may appear inside symbols, keywords, numbers, tag
/// names and named character literals.
fn is_constituent(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(c, '.' | '*' | '+' | '!' | '-' | '_' | '?'
                    | '$' | '%' | '&' | '=' | '<' | '>' | ':' | '#' | '/')
}

fn parse_hexdigit(c: char) -> Option<u32> {
    c.to_digit(16)
}

fn try_u32_to_char(code: u32) -> Result<char, ParseError> {
    if let Some(c) = char::from_u32(code) {
        Ok(c)
    } else {
        Err(ParseError::InvalidCodePoint(code))
    }
}

/// Reads characters as long as `accepted` holds, appending to `out`
/// (which already holds whatever the caller put there). Returns the
/// first rejected item for pushback, or None at EOF.
fn read_while(
    cs: &mut impl Iterator<Item = (usize, char, Pos)>,
    accepted: fn(char) -> bool,
    out: &mut String,
) -> Option<(usize, char, Pos)> {
    loop {
        if let Some((off, c, pos)) = cs.next() {
            if accepted(c) {
                out.push(c);
            } else {
                return Some((off, c, pos));
            }
        } else {
            return None;
        }
    }
}

/// Reads the remainder of a string literal (the opening '"' is already
/// consumed), processing escapes into `out`. Returns the byte offset
/// just past the closing quote.
fn read_string(
    cs: &mut impl Iterator<Item = (usize, char, Pos)>,
    startpos: Pos,
    out: &mut String,
) -> Result<usize, ParseErrorWithPos> {
    out.clear();
    loop {
        let (off, c, pos) =
            cs.next().ok_or_else(
                || ParseError::UnexpectedEOFInString.at(startpos))?;
        match c {
            '"' => return Ok(off + 1),
            '\\' => {
                let (_, e, epos) =
                    cs.next().ok_or_else(
                        || ParseError::UnexpectedEOFInString.at(startpos))?;
                match e {
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'n' => out.push('\n'),
                    'b' => out.push('\x08'),
                    'f' => out.push('\x0C'),
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    'u' => {
                        let mut code: u32 = 0;
                        for _ in 0..4 {
                            let (_, h, hpos) =
                                cs.next().ok_or_else(
                                    || ParseError::UnexpectedEOFInEscape
                                        .at(epos))?;
                            let d = parse_hexdigit(h).ok_or_else(
                                || ParseError::NonHexDigit(h).at(hpos))?;
                            code = code * 16 + d;
                        }
                        out.push(try_u32_to_char(code)
                                 .map_err(|err| err.at(epos))?);
                    }
                    _ => return Err(ParseError::InvalidEscapedChar(e).at(pos)),
                }
            }
            _ => out.push(c),
        }
    }
}

/// At most one '/' separator, both sides nonempty; a lone "/" stands
/// for itself.
fn valid_name(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s == "/" {
        return true;
    }
    match s.split_once('/') {
        None => true,
        Some((ns, name)) => {
            !ns.is_empty() && !name.is_empty() && !name.contains('/')
        }
    }
}

fn int_digits(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && !(s.len() > 1 && s.starts_with('0'))
}

/// digits [ '.' digits ] [ ('e'|'E') ['+'|'-'] digits ], where at
/// least the fraction or the exponent is present.
fn float_shape(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            int_digits(int) && !frac.is_empty()
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => int_digits(mantissa),
    };
    if !mantissa_ok {
        return false;
    }
    match exponent {
        Some(e) => {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit())
        }
        None => mantissa.contains('.'),
    }
}

/// Classifies a word that starts like a number. The returned atom
/// keeps the literal text (sign kept, `N`/`M` suffix stripped).
fn lex_number(text: &str) -> Option<Atom> {
    let (body, suffix) = if let Some(body) = text.strip_suffix('N') {
        (body, Some('N'))
    } else if let Some(body) = text.strip_suffix('M') {
        (body, Some('M'))
    } else {
        (text, None)
    };
    let unsigned = body.strip_prefix(['+', '-']).unwrap_or(body);
    if int_digits(unsigned) {
        match suffix {
            Some('N') => Some(Atom::BigInt(KString::from_ref(body))),
            Some('M') => Some(Atom::BigDecimal(KString::from_ref(body))),
            _ => Some(Atom::Int(KString::from_ref(body))),
        }
    } else if float_shape(unsigned) {
        match suffix {
            // N is an integer suffix only.
            Some('N') => None,
            Some('M') => Some(Atom::BigDecimal(KString::from_ref(body))),
            _ => Some(Atom::Float(KString::from_ref(body))),
        }
    } else {
        None
    }
}

fn looks_numeric(w: &str) -> bool {
    let mut bytes = w.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'+') | Some(b'-') => {
            matches!(bytes.next(), Some(b2) if b2.is_ascii_digit())
        }
        _ => false,
    }
}

/// Classifies a complete constituent run.
fn classify_word(w: &str) -> Result<Atom, ParseError> {
    match w {
        "nil" => return Ok(Atom::Nil),
        "true" => return Ok(Atom::Bool(true)),
        "false" => return Ok(Atom::Bool(false)),
        _ => {}
    }
    if let Some(body) = w.strip_prefix(':') {
        if valid_name(body) && !body.starts_with(':') {
            return Ok(Atom::Keyword(Keyword::from_ref(body)));
        }
        return Err(ParseError::MalformedKeyword(w.to_string()));
    }
    if looks_numeric(w) {
        return lex_number(w)
            .ok_or_else(|| ParseError::MalformedNumber(w.to_string()));
    }
    if valid_name(w) {
        Ok(Atom::Symbol(Symbol::from_ref(w)))
    } else {
        Err(ParseError::MalformedSymbol(w.to_string()))
    }
}

/// Resolves a character literal from the constituent run following the
/// backslash: a single character stands for itself, `uXXXX` is a
/// unicode escape, the rest must be a known character name.
fn classify_char(w: &str) -> Result<char, ParseError> {
    let mut chars = w.chars();
    let c0 = chars.next()
        .ok_or(ParseError::UnexpectedEOFAfterBackslash)?;
    if chars.next().is_none() {
        return Ok(c0);
    }
    if c0 == 'u' && w.len() == 5 {
        let mut code: u32 = 0;
        for h in w[1..].chars() {
            match parse_hexdigit(h) {
                Some(d) => code = code * 16 + d,
                None => return Err(ParseError::InvalidCharLiteral(
                    w.to_string())),
            }
        }
        return try_u32_to_char(code);
    }
    if let Some(c) = name2char(w) {
        return Ok(c);
    }
    Err(ParseError::InvalidCharLiteral(w.to_string()))
}

/// Turns `input[base..]` into a token stream. `startpos` is the
/// line/column position of `input[base..]`'s first character; spans in
/// the produced tokens index into the full `input`, which is what
/// allows the decoder to hand raw form text to custom decoders.
///
/// Whitespace (including commas) and `;` line comments are skipped.
/// A lexical error ends the stream; the input past the error is left
/// untouched and can be re-lexed by a later session.
pub fn lex<'s>(
    input: &'s str,
    base: usize,
    startpos: Pos,
) -> impl Iterator<Item = Result<TokenWithPos, ParseErrorWithPos>> + 's {
    let end_of_input = input.len();
    Gen::new(|co| async move {
        let mut pos_state = startpos;
        let mut cs = input[base..].char_indices().map(move |(i, c)| {
            let this = (base + i, c, pos_state);
            if c == '\n' {
                pos_state = Pos { line: pos_state.line + 1, col: 0 };
            } else {
                pos_state = Pos { line: pos_state.line,
                                  col: pos_state.col + 1 };
            }
            this
        });
        let mut tmp = String::new();
        let mut maybe_next: Option<(usize, char, Pos)> = None;
        loop {
            let (off, c, pos);
            if let Some(ocp) = maybe_next {
                (off, c, pos) = ocp;
                maybe_next = None;
            } else if let Some(ocp) = cs.next() {
                (off, c, pos) = ocp;
            } else {
                return;
            }

            if is_whitespace_char(c) {
                continue;
            } else if c == ';' {
                // line comment
                maybe_next = read_while(&mut cs, |c| c != '\n', &mut tmp);
                tmp.clear();
                if maybe_next.is_none() {
                    return;
                }
            } else if let Some(t) = match c {
                '(' => Some(Token::Open(CollectionKind::List)),
                '[' => Some(Token::Open(CollectionKind::Vector)),
                '{' => Some(Token::Open(CollectionKind::Map)),
                ')' => Some(Token::Close(BracketKind::Round)),
                ']' => Some(Token::Close(BracketKind::Square)),
                '}' => Some(Token::Close(BracketKind::Curly)),
                _ => None,
            } {
                co.yield_(Ok(TokenWithPos(
                    t, pos, Span::new(off, off + 1)))).await;
            } else if c == '"' {
                match read_string(&mut cs, pos, &mut tmp) {
                    Err(e) => {
                        co.yield_(Err(e)).await;
                        return;
                    }
                    Ok(end) => {
                        co.yield_(Ok(TokenWithPos(
                            Token::Atom(Atom::String(KString::from_ref(&tmp))),
                            pos,
                            Span::new(off, end)))).await;
                    }
                }
            } else if c == '\\' {
                // character literal
                let (coff, c0, _c0pos);
                if let Some(ocp) = cs.next() {
                    (coff, c0, _c0pos) = ocp;
                } else {
                    co.yield_(Err(ParseError::UnexpectedEOFAfterBackslash
                                  .at(pos))).await;
                    return;
                }
                if !is_constituent(c0) {
                    // e.g. `\(`; the character stands for itself
                    co.yield_(Ok(TokenWithPos(
                        Token::Atom(Atom::Char(c0)),
                        pos,
                        Span::new(off, coff + c0.len_utf8())))).await;
                } else {
                    tmp.clear();
                    tmp.push(c0);
                    maybe_next = read_while(&mut cs, is_constituent, &mut tmp);
                    let end = maybe_next.map_or(end_of_input, |(o, _, _)| o);
                    match classify_char(&tmp) {
                        Err(e) => {
                            co.yield_(Err(e.at(pos))).await;
                            return;
                        }
                        Ok(ch) => {
                            co.yield_(Ok(TokenWithPos(
                                Token::Atom(Atom::Char(ch)),
                                pos,
                                Span::new(off, end)))).await;
                        }
                    }
                }
            } else if c == '#' {
                // #{ #_ #tagname
                let (hoff, c0, _c0pos);
                if let Some(ocp) = cs.next() {
                    (hoff, c0, _c0pos) = ocp;
                } else {
                    co.yield_(Err(ParseError::UnexpectedEOFAfterHash
                                  .at(pos))).await;
                    return;
                }
                if c0 == '{' {
                    co.yield_(Ok(TokenWithPos(
                        Token::Open(CollectionKind::Set),
                        pos,
                        Span::new(off, hoff + 1)))).await;
                } else if c0 == '_' {
                    co.yield_(Ok(TokenWithPos(
                        Token::Discard, pos,
                        Span::new(off, hoff + 1)))).await;
                } else if c0.is_alphabetic() {
                    tmp.clear();
                    tmp.push(c0);
                    maybe_next = read_while(&mut cs, is_constituent, &mut tmp);
                    let end = maybe_next.map_or(end_of_input, |(o, _, _)| o);
                    if valid_name(&tmp) {
                        co.yield_(Ok(TokenWithPos(
                            Token::Tag(KString::from_ref(&tmp)),
                            pos,
                            Span::new(off, end)))).await;
                    } else {
                        co.yield_(Err(ParseError::MalformedTagName(
                            tmp.clone()).at(pos))).await;
                        return;
                    }
                } else {
                    co.yield_(Err(ParseError::InvalidDispatch(c0).at(pos)))
                        .await;
                    return;
                }
            } else if is_constituent(c) {
                // numbers, symbols, keywords, nil, true, false
                tmp.clear();
                tmp.push(c);
                maybe_next = read_while(&mut cs, is_constituent, &mut tmp);
                let end = maybe_next.map_or(end_of_input, |(o, _, _)| o);
                match classify_word(&tmp) {
                    Err(e) => {
                        co.yield_(Err(e.at(pos))).await;
                        return;
                    }
                    Ok(a) => {
                        co.yield_(Ok(TokenWithPos(
                            Token::Atom(a), pos, Span::new(off, end)))).await;
                    }
                }
            } else {
                co.yield_(Err(ParseError::UnexpectedChar(c).at(pos))).await;
                return;
            }
        }
    }).into_iter()
}
