// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Decode sessions and the one-shot entry points.
//!
//! A [Decoder] owns its input text and a cursor; each
//! [decode](Decoder::decode) call reads one top-level form and decodes
//! it into the requested destination. A session can carry its own
//! numeric context and its own tag registrations, both consulted
//! before the process-wide ones and both gone with the session.

use crate::decode::{DecodeContext, DecodeError, FromEdn};
use crate::math::{global_math_context, MathContext};
use crate::parse::lex;
use crate::pos::Pos;
use crate::read::{read_form, DEPTH_FUEL};
use crate::tags::{TagError, TagRegistry};
use std::any::Any;
use std::io::Read;

pub struct Decoder {
    input: String,
    offset: usize,
    pos: Pos,
    math: Option<MathContext>,
    tags: TagRegistry,
}

fn advance(mut pos: Pos, consumed: &str) -> Pos {
    for c in consumed.chars() {
        if c == '\n' {
            pos = Pos {
                line: pos.line + 1,
                col: 0,
            };
        } else {
            pos.col += 1;
        }
    }
    pos
}

impl Decoder {
    pub fn from_string(input: String) -> Decoder {
        Decoder {
            input,
            offset: 0,
            pos: Pos { line: 0, col: 0 },
            math: None,
            tags: TagRegistry::new(),
        }
    }

    pub fn from_str(input: &str) -> Decoder {
        Decoder::from_string(input.to_string())
    }

    /// Reads `r` to its end up front; the session decodes from the
    /// buffered text.
    pub fn from_reader(mut r: impl Read) -> Result<Decoder, DecodeError> {
        let mut input = String::new();
        r.read_to_string(&mut input)?;
        Ok(Decoder::from_string(input))
    }

    /// Gives this session its own numeric context; the process-wide
    /// default is left alone.
    pub fn use_math_context(&mut self, mc: MathContext) -> &mut Decoder {
        self.math = Some(mc);
        self
    }

    /// Session-local converter registration; see
    /// [TagRegistry::add_tag_fn]. Local registrations shadow the
    /// global registry for this session only.
    pub fn add_tag_fn<T, U, E, F>(&self, tagname: &str, f: F)
                                  -> Result<(), TagError>
    where T: FromEdn,
          U: Any + Send + Sync,
          E: Into<anyhow::Error>,
          F: Fn(T) -> Result<U, E> + Send + Sync + 'static
    {
        self.tags.add_tag_fn(tagname, f)
    }

    /// Session-local struct-prototype registration; see
    /// [TagRegistry::add_tag_struct].
    pub fn add_tag_struct<T>(&self, tagname: &str) -> Result<(), TagError>
    where T: FromEdn + Send + Sync
    {
        self.tags.add_tag_struct::<T>(tagname)
    }

    /// Reads the next top-level form and decodes it into `T`.
    /// [DecodeError::Eof] at clean end of input. An error does not
    /// advance the cursor.
    pub fn decode<T: FromEdn>(&mut self) -> Result<T, DecodeError> {
        let form = {
            let mut ts = lex(&self.input, self.offset, self.pos);
            read_form(&mut ts, DEPTH_FUEL)?
        };
        let form = match form {
            None => return Err(DecodeError::Eof),
            Some(form) => form,
        };
        let cx = DecodeContext::new(
            &self.input,
            self.math.unwrap_or_else(global_math_context),
            Some(&self.tags),
        );
        let value = T::from_edn(&form, &cx)?;
        self.pos = advance(self.pos, &self.input[self.offset..form.span.end]);
        self.offset = form.span.end;
        Ok(value)
    }
}

/// Decodes the first form in `s` into `T`; text after that form is
/// not looked at.
pub fn from_str<T: FromEdn>(s: &str) -> Result<T, DecodeError> {
    Decoder::from_str(s).decode()
}

/// Reads `r` to its end and decodes the first form into `T`.
pub fn from_reader<T: FromEdn>(r: impl Read) -> Result<T, DecodeError> {
    Decoder::from_reader(r)?.decode()
}
