// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Type-directed decoding: walking a [Form](crate::read::Form) tree
//! into a destination that implements [FromEdn].
//!
//! The destination's shape drives everything. Numeric atoms still
//! carry their literal text at this point, so an `i8` destination and
//! a `num::BigInt` destination parse the same atom at different
//! widths. Tagged forms are resolved through the session's tag
//! registries; any implementation may instead take over completely by
//! calling [DecodeContext::raw] and working on the unparsed text of
//! its form.

use crate::math::MathContext;
use crate::pos::Pos;
use crate::read::{Form, FormKind, ReadErrorWithPos};
use crate::tags::{self, TagHandler, TagRegistry};
use crate::value::{Atom, Keyword, Symbol, Value};
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};
use kstring::KString;
use num::BigInt;
use std::any::{type_name, Any};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Read(#[from] ReadErrorWithPos),
    #[error("expecting {expected}, got {got} {pos}")]
    Mismatch {
        expected: &'static str,
        got: &'static str,
        pos: Pos,
    },
    #[error("number '{literal}' does not fit {target} {pos}")]
    Range {
        literal: String,
        target: &'static str,
        pos: Pos,
    },
    #[error("unparseable numeric literal '{literal}' {pos}")]
    Number { literal: String, pos: Pos },
    #[error("no converter registered for tag '#{tag}' {pos}")]
    UnknownTag { tag: KString, pos: Pos },
    #[error("converter for tag '#{tag}' does not produce {expected} {pos}")]
    TagMismatch {
        tag: KString,
        expected: &'static str,
        pos: Pos,
    },
    #[error("converter for tag '#{tag}' failed {pos}: {source}")]
    TagConvert {
        tag: KString,
        pos: Pos,
        #[source]
        source: anyhow::Error,
    },
    #[error("expecting at most {expected} elements, got {got} {pos}")]
    TooManyElements {
        expected: usize,
        got: usize,
        pos: Pos,
    },
    #[error("end of input")]
    Eof,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn mismatch(expected: &'static str, form: &Form) -> DecodeError {
    DecodeError::Mismatch {
        expected,
        got: form.kind_name(),
        pos: form.pos,
    }
}

/// Per-decode-call context: the session's full input text (what form
/// spans index into), the active numeric context, and the session's
/// local tag registry, if any, consulted before the global one.
pub struct DecodeContext<'s> {
    input: &'s str,
    math: MathContext,
    local_tags: Option<&'s TagRegistry>,
}

impl<'s> DecodeContext<'s> {
    pub(crate) fn new(
        input: &'s str,
        math: MathContext,
        local_tags: Option<&'s TagRegistry>,
    ) -> DecodeContext<'s> {
        DecodeContext {
            input,
            math,
            local_tags,
        }
    }

    /// The exact unparsed source text of `form`, tag prefixes
    /// included, discarded forms and surrounding whitespace not. A
    /// [FromEdn] implementation may run any parsing it likes over this
    /// text, including independent nested decode sessions via
    /// [from_str](crate::decoder::from_str).
    pub fn raw(&self, form: &Form) -> &'s str {
        form.span.of(self.input)
    }

    /// The numeric context active for this decode call.
    pub fn math(&self) -> MathContext {
        self.math
    }

    fn resolve_tag(&self, tag: &str) -> Option<Arc<TagHandler>> {
        match self.local_tags.and_then(|r| r.get(tag)) {
            Some(h) => Some(h),
            None => tags::global().get(tag),
        }
    }

    /// Resolves `tag`, decodes `inner` into the converter's input
    /// shape, applies the converter and downcasts its output to `T`.
    /// Missing converter and wrong output type are both hard errors;
    /// only the dynamic [Value] destination is more lenient (it wraps
    /// instead).
    pub fn decode_tagged<T: Any>(
        &self,
        tag: &KString,
        inner: &Form,
        pos: Pos,
    ) -> Result<T, DecodeError> {
        let handler =
            self.resolve_tag(tag).ok_or_else(|| DecodeError::UnknownTag {
                tag: tag.clone(),
                pos,
            })?;
        let out = (handler.convert)(inner, self)?;
        match out.downcast::<T>() {
            Ok(b) => Ok(*b),
            Err(_) => Err(DecodeError::TagMismatch {
                tag: tag.clone(),
                expected: type_name::<T>(),
                pos,
            }),
        }
    }
}

/// Types that can be decoded from an EDN form. Implementations receive
/// the complete form for their destination slot before any built-in
/// interpretation happens, so an implementation that wants full
/// control simply never looks at `form.kind` and uses
/// [DecodeContext::raw] instead.
pub trait FromEdn: Sized + 'static {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Self, DecodeError>;
}

macro_rules! impl_from_edn_int {
    ($($t:ty)*) => {$(
        impl FromEdn for $t {
            fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                        -> Result<$t, DecodeError> {
                match &form.kind {
                    FormKind::Atom(Atom::Int(s) | Atom::BigInt(s)) => {
                        // Overflow is the only way these literals can
                        // fail to parse.
                        s.parse::<$t>().map_err(|_| DecodeError::Range {
                            literal: s.to_string(),
                            target: stringify!($t),
                            pos: form.pos,
                        })
                    }
                    FormKind::Tagged(tag, inner) =>
                        cx.decode_tagged::<$t>(tag, inner, form.pos),
                    _ => Err(mismatch("integer", form)),
                }
            }
        }
    )*};
}

impl_from_edn_int!(i8 i16 i32 i64 i128 isize u8 u16 u32 u64 u128 usize);

macro_rules! impl_from_edn_float {
    ($($t:ty)*) => {$(
        impl FromEdn for $t {
            fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                        -> Result<$t, DecodeError> {
                match &form.kind {
                    // Any numeric literal narrows into a float,
                    // lossily where it has to.
                    FormKind::Atom(Atom::Int(s) | Atom::BigInt(s)
                                   | Atom::Float(s) | Atom::BigDecimal(s)) =>
                        s.parse::<$t>().map_err(|_| DecodeError::Number {
                            literal: s.to_string(),
                            pos: form.pos,
                        }),
                    FormKind::Tagged(tag, inner) =>
                        cx.decode_tagged::<$t>(tag, inner, form.pos),
                    _ => Err(mismatch("float", form)),
                }
            }
        }
    )*};
}

impl_from_edn_float!(f32 f64);

impl FromEdn for BigInt {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<BigInt, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Int(s) | Atom::BigInt(s)) => {
                BigInt::from_str(s).map_err(|_| DecodeError::Number {
                    literal: s.to_string(),
                    pos: form.pos,
                })
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<BigInt>(tag, inner, form.pos)
            }
            _ => Err(mismatch("integer", form)),
        }
    }
}

impl FromEdn for BigDecimal {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<BigDecimal, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Int(s) | Atom::BigInt(s)
                           | Atom::Float(s) | Atom::BigDecimal(s)) => {
                let d = BigDecimal::from_str(s).map_err(
                    |_| DecodeError::Number {
                        literal: s.to_string(),
                        pos: form.pos,
                    })?;
                Ok(cx.math().apply(d))
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<BigDecimal>(tag, inner, form.pos)
            }
            _ => Err(mismatch("number", form)),
        }
    }
}

impl FromEdn for bool {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<bool, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Bool(b)) => Ok(*b),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<bool>(tag, inner, form.pos)
            }
            _ => Err(mismatch("boolean", form)),
        }
    }
}

impl FromEdn for char {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<char, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Char(c)) => Ok(*c),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<char>(tag, inner, form.pos)
            }
            _ => Err(mismatch("character", form)),
        }
    }
}

impl FromEdn for String {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<String, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::String(s)) => Ok(s.to_string()),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<String>(tag, inner, form.pos)
            }
            _ => Err(mismatch("string", form)),
        }
    }
}

impl FromEdn for KString {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<KString, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::String(s)) => Ok(s.clone()),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<KString>(tag, inner, form.pos)
            }
            _ => Err(mismatch("string", form)),
        }
    }
}

impl FromEdn for Symbol {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Symbol, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Symbol(s)) => Ok(s.clone()),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<Symbol>(tag, inner, form.pos)
            }
            _ => Err(mismatch("symbol", form)),
        }
    }
}

impl FromEdn for Keyword {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Keyword, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Keyword(k)) => Ok(k.clone()),
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<Keyword>(tag, inner, form.pos)
            }
            _ => Err(mismatch("keyword", form)),
        }
    }
}

impl<T: FromEdn> FromEdn for Option<T> {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Option<T>, DecodeError> {
        match &form.kind {
            FormKind::Atom(Atom::Nil) => Ok(None),
            _ => T::from_edn(form, cx).map(Some),
        }
    }
}

/// Owned indirection, for recursive destinations.
impl<T: FromEdn> FromEdn for Box<T> {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Box<T>, DecodeError> {
        T::from_edn(form, cx).map(Box::new)
    }
}

impl<T: FromEdn> FromEdn for Vec<T> {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Vec<T>, DecodeError> {
        match &form.kind {
            FormKind::List(v) | FormKind::Vector(v) | FormKind::Set(v) => {
                v.iter().map(|f| T::from_edn(f, cx)).collect()
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<Vec<T>>(tag, inner, form.pos)
            }
            _ => Err(mismatch("sequence", form)),
        }
    }
}

/// Fixed-size destination: more elements than fit is an error, missing
/// trailing elements are left at `T::default()`.
impl<T: FromEdn + Default, const N: usize> FromEdn for [T; N] {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<[T; N], DecodeError> {
        let children = match &form.kind {
            FormKind::List(v) | FormKind::Vector(v) => v,
            FormKind::Tagged(tag, inner) => {
                return cx.decode_tagged::<[T; N]>(tag, inner, form.pos);
            }
            _ => return Err(mismatch("sequence", form)),
        };
        if children.len() > N {
            return Err(DecodeError::TooManyElements {
                expected: N,
                got: children.len(),
                pos: form.pos,
            });
        }
        let mut out: [T; N] = std::array::from_fn(|_| T::default());
        for (slot, child) in out.iter_mut().zip(children) {
            *slot = T::from_edn(child, cx)?;
        }
        Ok(out)
    }
}

// Shared walk for map destinations: map forms contribute their
// key/value pairs, set forms contribute each element as a key mapped
// to the decoding of a synthesized `true` at the element's position.
fn map_insertions<K, V>(
    form: &Form,
    cx: &DecodeContext<'_>,
    mut insert: impl FnMut(K, V),
) -> Result<(), DecodeError>
where
    K: FromEdn,
    V: FromEdn,
{
    match &form.kind {
        FormKind::Map(kvs) => {
            for kv in kvs.chunks_exact(2) {
                let k = K::from_edn(&kv[0], cx)?;
                let v = V::from_edn(&kv[1], cx)?;
                insert(k, v);
            }
            Ok(())
        }
        FormKind::Set(elems) => {
            for e in elems {
                let k = K::from_edn(e, cx)?;
                let t = Form {
                    kind: FormKind::Atom(Atom::Bool(true)),
                    pos: e.pos,
                    span: e.span,
                };
                let v = V::from_edn(&t, cx)?;
                insert(k, v);
            }
            Ok(())
        }
        _ => Err(mismatch("map", form)),
    }
}

impl<K, V> FromEdn for HashMap<K, V>
where
    K: FromEdn + Eq + Hash,
    V: FromEdn,
{
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<HashMap<K, V>, DecodeError> {
        if let FormKind::Tagged(tag, inner) = &form.kind {
            return cx.decode_tagged::<HashMap<K, V>>(tag, inner, form.pos);
        }
        let mut m = HashMap::new();
        map_insertions(form, cx, |k, v| {
            // Duplicate decoded keys: last one wins.
            m.insert(k, v);
        })?;
        Ok(m)
    }
}

impl<K, V> FromEdn for BTreeMap<K, V>
where
    K: FromEdn + Ord,
    V: FromEdn,
{
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<BTreeMap<K, V>, DecodeError> {
        if let FormKind::Tagged(tag, inner) = &form.kind {
            return cx.decode_tagged::<BTreeMap<K, V>>(tag, inner, form.pos);
        }
        let mut m = BTreeMap::new();
        map_insertions(form, cx, |k, v| {
            m.insert(k, v);
        })?;
        Ok(m)
    }
}

impl<T> FromEdn for HashSet<T>
where
    T: FromEdn + Eq + Hash,
{
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<HashSet<T>, DecodeError> {
        match &form.kind {
            FormKind::Set(v) | FormKind::List(v) | FormKind::Vector(v) => {
                v.iter().map(|f| T::from_edn(f, cx)).collect()
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<HashSet<T>>(tag, inner, form.pos)
            }
            _ => Err(mismatch("set", form)),
        }
    }
}

impl<T> FromEdn for BTreeSet<T>
where
    T: FromEdn + Ord,
{
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<BTreeSet<T>, DecodeError> {
        match &form.kind {
            FormKind::Set(v) | FormKind::List(v) | FormKind::Vector(v) => {
                v.iter().map(|f| T::from_edn(f, cx)).collect()
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<BTreeSet<T>>(tag, inner, form.pos)
            }
            _ => Err(mismatch("set", form)),
        }
    }
}

/// The dynamic destination: mirrors whatever the form is. Integer
/// literals land in `Int` when they fit an `i64` and silently widen to
/// `BigInt` otherwise; unresolvable tags (and converters producing
/// something other than a `Value`) are kept as `Value::Tagged` instead
/// of failing.
impl FromEdn for Value {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Value, DecodeError> {
        match &form.kind {
            FormKind::Atom(a) => match a {
                Atom::Nil => Ok(Value::Nil),
                Atom::Bool(b) => Ok(Value::Bool(*b)),
                Atom::Int(s) => match s.parse::<i64>() {
                    Ok(i) => Ok(Value::Int(i)),
                    Err(_) => BigInt::from_str(s)
                        .map(Value::BigInt)
                        .map_err(|_| DecodeError::Number {
                            literal: s.to_string(),
                            pos: form.pos,
                        }),
                },
                Atom::BigInt(s) => BigInt::from_str(s)
                    .map(Value::BigInt)
                    .map_err(|_| DecodeError::Number {
                        literal: s.to_string(),
                        pos: form.pos,
                    }),
                Atom::Float(s) => s
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| DecodeError::Number {
                        literal: s.to_string(),
                        pos: form.pos,
                    }),
                Atom::BigDecimal(s) => BigDecimal::from_str(s)
                    .map(|d| Value::BigDecimal(cx.math().apply(d)))
                    .map_err(|_| DecodeError::Number {
                        literal: s.to_string(),
                        pos: form.pos,
                    }),
                Atom::String(s) => Ok(Value::String(s.clone())),
                Atom::Char(c) => Ok(Value::Char(*c)),
                Atom::Symbol(s) => Ok(Value::Symbol(s.clone())),
                Atom::Keyword(k) => Ok(Value::Keyword(k.clone())),
            },
            FormKind::List(v) => Ok(Value::List(
                v.iter()
                    .map(|f| Value::from_edn(f, cx))
                    .collect::<Result<_, _>>()?,
            )),
            FormKind::Vector(v) => Ok(Value::Vector(
                v.iter()
                    .map(|f| Value::from_edn(f, cx))
                    .collect::<Result<_, _>>()?,
            )),
            FormKind::Map(kvs) => {
                let mut m = BTreeMap::new();
                for kv in kvs.chunks_exact(2) {
                    let k = Value::from_edn(&kv[0], cx)?;
                    let v = Value::from_edn(&kv[1], cx)?;
                    m.insert(k, v);
                }
                Ok(Value::Map(m))
            }
            FormKind::Set(elems) => {
                let mut s = BTreeSet::new();
                for e in elems {
                    s.insert(Value::from_edn(e, cx)?);
                }
                Ok(Value::Set(s))
            }
            FormKind::Tagged(tag, inner) => {
                if let Some(handler) = cx.resolve_tag(tag) {
                    let out = (handler.convert)(inner, cx)?;
                    if let Ok(v) = out.downcast::<Value>() {
                        return Ok(*v);
                    }
                }
                Ok(Value::Tagged(
                    tag.clone(),
                    Box::new(Value::from_edn(inner, cx)?),
                ))
            }
        }
    }
}

impl FromEdn for DateTime<FixedOffset> {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<DateTime<FixedOffset>, DecodeError> {
        match &form.kind {
            // A bare RFC3339 string works too, not just `#inst`.
            FormKind::Atom(Atom::String(s)) => {
                DateTime::parse_from_rfc3339(s).map_err(|e| {
                    DecodeError::TagConvert {
                        tag: KString::from_static("inst"),
                        pos: form.pos,
                        source: e.into(),
                    }
                })
            }
            FormKind::Tagged(tag, inner) => {
                cx.decode_tagged::<DateTime<FixedOffset>>(
                    tag, inner, form.pos)
            }
            _ => Err(mismatch("timestamp", form)),
        }
    }
}

/// Walks a map form's key/value pairs, resolving each key to its
/// textual name (keywords, symbols and strings are all accepted) and
/// handing the name and value form to `set`. Used by the field tables
/// that [edn_struct](crate::edn_struct) generates.
pub fn map_fields(
    form: &Form,
    mut set: impl FnMut(&str, &Form) -> Result<(), DecodeError>,
) -> Result<(), DecodeError> {
    let kvs = match &form.kind {
        FormKind::Map(kvs) => kvs,
        _ => return Err(mismatch("map", form)),
    };
    for kv in kvs.chunks_exact(2) {
        let key = match &kv[0].kind {
            FormKind::Atom(Atom::Keyword(k)) => k.as_str(),
            FormKind::Atom(Atom::Symbol(s)) => s.as_str(),
            FormKind::Atom(Atom::String(s)) => s.as_str(),
            _ => {
                return Err(mismatch("keyword, symbol or string key",
                                    &kv[0]));
            }
        };
        set(key, &kv[1])?;
    }
    Ok(())
}

/// Defines a struct and derives its [FromEdn] implementation with a
/// field table built at compile time. Keys in the decoded map may be
/// keywords, symbols or strings; a field matches by its
/// `#[edn("alias")]` alias when one is declared, otherwise by its Rust
/// name, case-sensitively. Unmatched keys are ignored; absent fields
/// keep their `Default::default()`.
///
/// ```
/// use anyedn::edn_struct;
///
/// edn_struct! {
///     pub struct Animal {
///         #[edn("kind")]
///         pub species: String,
///         pub legs: u8,
///     }
/// }
///
/// let a: Animal = anyedn::from_str("{:kind \"cat\" :legs 4}").unwrap();
/// assert_eq!(a.legs, 4);
/// ```
#[macro_export]
macro_rules! edn_struct {
    ($(#[$meta:meta])* $vis:vis struct $name:ident {
        $( $(#[edn($alias:literal)])? $fvis:vis $field:ident : $ftype:ty ),*
        $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $fvis $field : $ftype ),*
        }

        impl $crate::decode::FromEdn for $name {
            fn from_edn(
                form: &$crate::read::Form,
                cx: &$crate::decode::DecodeContext<'_>,
            ) -> Result<Self, $crate::decode::DecodeError> {
                if let $crate::read::FormKind::Tagged(tag, inner) =
                    &form.kind
                {
                    return cx.decode_tagged::<Self>(tag, inner, form.pos);
                }
                let mut out = <Self as Default>::default();
                $crate::decode::map_fields(form, |key, vform| {
                    match key {
                        $( k if k == $crate::edn_field_name!(
                            $field $(, $alias)?) =>
                        {
                            out.$field = $crate::decode::FromEdn::from_edn(
                                vform, cx)?;
                            Ok(())
                        } )*
                        _ => Ok(()),
                    }
                })?;
                Ok(out)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! edn_field_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $alias:literal) => {
        $alias
    };
}
