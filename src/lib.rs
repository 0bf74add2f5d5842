// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decode EDN (extensible data notation) text directly into typed Rust
//! destinations.
//!
//! The pipeline: [parse](parse) turns input text into a token stream,
//! [read](read) builds positioned form trees (consuming `#_` discards
//! and attaching `#tag` prefixes), and [decode](decode) walks a form
//! into whatever implements [FromEdn](decode::FromEdn): the built-in
//! integers, floats, [num::BigInt], [bigdecimal::BigDecimal] (rounded
//! under a configurable [math](math) context), strings, characters,
//! symbols, keywords, `Option`, `Vec`, fixed-size arrays, maps, sets,
//! the dynamic [Value](value::Value), timestamps, or your own types
//! (usually via the [edn_struct](edn_struct) macro). Tagged literals
//! like `#inst "1985-04-12T23:20:50.52Z"` resolve through the
//! [tags](tags) registry.
//!
//! ```
//! let v: Vec<i64> = anyedn::from_str("[1 2 #_3 4]").unwrap();
//! assert_eq!(v, [1, 2, 4]);
//! ```
//!
//! One-shot decoding goes through [from_str] / [from_reader]; a
//! [Decoder](decoder::Decoder) session decodes several top-level forms
//! in sequence and can carry its own tag registrations and numeric
//! context.

pub mod decode;
pub mod decoder;
pub mod math;
pub mod parse;
pub mod pos;
pub mod read;
pub mod tags;
pub mod value;

pub use decode::{DecodeContext, DecodeError, FromEdn};
pub use decoder::{from_reader, from_str, Decoder};
pub use math::{
    global_math_context, set_global_math_context, MathContext,
    DEFAULT_MATH_CONTEXT,
};
pub use tags::{add_tag_fn, add_tag_struct, TagError, TagRegistry};
pub use value::{Keyword, Symbol, Value};
