// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Runtime data types representing EDN values.

//! [Atom](Atom) covers the scalar leaves as they come out of the
//! tokenizer (numeric atoms still carry their literal text, since the
//! width they are parsed at is decided by the decode destination).
//! [Value](Value) is the dynamic, fully decoded form used when the
//! caller supplies no shape; it has a total ordering so it can key
//! ordered maps and sets.

use bigdecimal::BigDecimal;
use kstring::KString;
use num::BigInt;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// A (possibly namespaced) symbol, e.g. `foo` or `my.app/foo`.
/// Equality, ordering and hashing are by the full textual name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(KString);

/// A (possibly namespaced) keyword, e.g. `:foo` or `:my.app/foo`.
/// The stored name does not include the leading colon. Keywords are
/// self-evaluating: their decoded value is themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Keyword(KString);

macro_rules! impl_named {
    ($t:ident) => {
        impl $t {
            pub fn from_ref(s: &str) -> $t {
                $t(KString::from_ref(s))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// The part before the `/` separator, if any.
            pub fn namespace(&self) -> Option<&str> {
                // A lone "/" is the division symbol, not a separator.
                if self.0.as_str() == "/" {
                    None
                } else {
                    self.0.as_str().split_once('/').map(|(ns, _)| ns)
                }
            }

            /// The part after the `/` separator, or the whole name.
            pub fn name(&self) -> &str {
                if self.0.as_str() == "/" {
                    "/"
                } else {
                    match self.0.as_str().split_once('/') {
                        Some((_, name)) => name,
                        None => self.0.as_str(),
                    }
                }
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> $t {
                $t::from_ref(s)
            }
        }
    };
}

impl_named!(Symbol);
impl_named!(Keyword);

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
           -> Result<(), std::fmt::Error> {
        f.write_str(self.0.as_str())
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
           -> Result<(), std::fmt::Error> {
        f.write_char(':')?;
        f.write_str(self.0.as_str())
    }
}

/// Scalar leaves as produced by the tokenizer. The numeric variants
/// keep the literal text (sign included, `N`/`M` suffix stripped);
/// parsing to a concrete width happens at decode time, directed by the
/// destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Nil,
    Bool(bool),
    Int(KString),
    BigInt(KString),
    Float(KString),
    BigDecimal(KString),
    String(KString),
    Char(char),
    Symbol(Symbol),
    Keyword(Keyword),
}

impl Atom {
    /// Category name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Atom::Nil => "nil",
            Atom::Bool(_) => "boolean",
            Atom::Int(_) => "integer",
            Atom::BigInt(_) => "big integer",
            Atom::Float(_) => "float",
            Atom::BigDecimal(_) => "big decimal",
            Atom::String(_) => "string",
            Atom::Char(_) => "character",
            Atom::Symbol(_) => "symbol",
            Atom::Keyword(_) => "keyword",
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
           -> Result<(), std::fmt::Error> {
        match self {
            Atom::Nil => f.write_str("nil"),
            Atom::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Atom::Int(s) => f.write_str(s),
            Atom::BigInt(s) => f.write_fmt(format_args!("{}N", s)),
            Atom::Float(s) => f.write_str(s),
            Atom::BigDecimal(s) => f.write_fmt(format_args!("{}M", s)),
            Atom::String(s) => {
                f.write_char('"')?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        _ => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            }
            Atom::Char(c) => {
                f.write_char('\\')?;
                if let Some(name) = char2name(*c) {
                    f.write_str(name)
                } else {
                    f.write_char(*c)
                }
            }
            Atom::Symbol(s) => s.fmt(f),
            Atom::Keyword(k) => k.fmt(f),
        }
    }
}

// EDN named characters.

pub fn char2name(c: char) -> Option<&'static str> {
    match c {
        '\n' => Some("newline"),
        '\r' => Some("return"),
        ' ' => Some("space"),
        '\t' => Some("tab"),
        '\x0C' => Some("formfeed"),
        '\x08' => Some("backspace"),
        _ => None
    }
}

pub fn name2char(s: &str) -> Option<char> {
    match s {
        "newline" => Some('\n'),
        "return" => Some('\r'),
        "space" => Some(' '),
        "tab" => Some('\t'),
        "formfeed" => Some('\x0C'),
        "backspace" => Some('\x08'),
        _ => None
    }
}

/// The four EDN collection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Vector,
    Map,
    Set,
}

impl CollectionKind {
    pub fn opening(self) -> &'static str {
        match self {
            CollectionKind::List => "(",
            CollectionKind::Vector => "[",
            CollectionKind::Map => "{",
            CollectionKind::Set => "#{",
        }
    }

    /// Maps and sets share the curly close.
    pub fn closing(self) -> BracketKind {
        match self {
            CollectionKind::List => BracketKind::Round,
            CollectionKind::Vector => BracketKind::Square,
            CollectionKind::Map => BracketKind::Curly,
            CollectionKind::Set => BracketKind::Curly,
        }
    }

    pub fn kind_name(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Vector => "vector",
            CollectionKind::Map => "map",
            CollectionKind::Set => "set",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketKind {
    Round,
    Square,
    Curly,
}

impl BracketKind {
    pub fn closing(self) -> char {
        match self {
            BracketKind::Round => ')',
            BracketKind::Square => ']',
            BracketKind::Curly => '}',
        }
    }
}

/// Dynamic, fully decoded EDN value; the destination used when the
/// caller supplies no shape.
///
/// Integer literals land in `Int` when they fit an `i64` and silently
/// widen to `BigInt` otherwise. Tagged forms whose tag does not
/// resolve to a [Value](Value)-producing converter are kept as
/// `Tagged`, preserving the tag name.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    BigDecimal(BigDecimal),
    String(KString),
    Char(char),
    Symbol(Symbol),
    Keyword(Keyword),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Map(BTreeMap<Value, Value>),
    Set(BTreeSet<Value>),
    Tagged(KString, Box<Value>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::BigInt(_) => 3,
            Value::Float(_) => 4,
            Value::BigDecimal(_) => 5,
            Value::Char(_) => 6,
            Value::String(_) => 7,
            Value::Symbol(_) => 8,
            Value::Keyword(_) => 9,
            Value::List(_) => 10,
            Value::Vector(_) => 11,
            Value::Map(_) => 12,
            Value::Set(_) => 13,
            Value::Tagged(_, _) => 14,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::BigInt(_) => "big integer",
            Value::Float(_) => "float",
            Value::BigDecimal(_) => "big decimal",
            Value::Char(_) => "character",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Keyword(_) => "keyword",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Tagged(_, _) => "tagged value",
        }
    }
}

/// Total ordering over all value kinds: same-kind values compare
/// naturally (floats by `total_cmp`), different kinds by a fixed kind
/// rank. This makes `Value` usable as a `BTreeMap`/`BTreeSet` key.
impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::BigDecimal(a), Value::BigDecimal(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Keyword(a), Value::Keyword(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Vector(a), Value::Vector(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Tagged(t1, v1), Value::Tagged(t2, v2)) => {
                t1.cmp(t2).then_with(|| v1.cmp(v2))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// Easily create a symbol value
pub fn symbol(s: &str) -> Value {
    Value::Symbol(Symbol::from_ref(s))
}

/// Easily create a keyword value
pub fn keyword(s: &str) -> Value {
    Value::Keyword(Keyword::from_ref(s))
}
