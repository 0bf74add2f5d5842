// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Mappings from tag names to converter functions and struct
//! prototypes, used when decoding tagged forms like `#inst "..."`.
//!
//! A converter is registered with statically known input and output
//! types: the tag's inner form is decoded into the input type, the
//! function applied, and the output handed to the destination (which
//! must be of exactly the output type, or decoding fails). A struct
//! prototype registered via [TagRegistry::add_tag_struct] instead
//! makes the tag's inner form decode with that type's own shape.
//!
//! There is one global registry, pre-populated with the EDN built-in
//! tags `inst` (RFC3339 timestamps) and `base64` (byte blobs); decode
//! sessions may carry a local registry that is consulted first.

use crate::decode::{DecodeContext, DecodeError, FromEdn};
use crate::read::Form;
use base64::Engine;
use chrono::DateTime;
use kstring::KString;
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TagError {
    /// Soft notice: the registration itself succeeded and the new
    /// mapping is in effect; the previous one is gone.
    #[error("previous tag implementation was overwritten")]
    Overwritten,
}

pub(crate) type TagConvert =
    dyn Fn(&Form, &DecodeContext) -> Result<Box<dyn Any + Send + Sync>,
                                            DecodeError>
    + Send + Sync;

pub(crate) struct TagHandler {
    pub(crate) convert: Box<TagConvert>,
}

/// A thread-safe mapping from tag names to converter functions and
/// struct prototypes. Reads (tag resolution during decoding) and
/// writes (registration) may happen concurrently from different
/// threads; the lock scope covers single map operations only.
pub struct TagRegistry {
    m: RwLock<HashMap<KString, Arc<TagHandler>>>,
}

impl TagRegistry {
    pub fn new() -> TagRegistry {
        TagRegistry {
            m: RwLock::new(HashMap::new()),
        }
    }

    /// Adds `f` as the converter for `tagname` tags. The inner form of
    /// such a tag is decoded into `T`, then `f` is applied; its output
    /// becomes the decoded value and must be of the destination's
    /// exact type. The one-argument-in, value-plus-error-out contract
    /// is part of the signature here, so there is nothing left to
    /// check at registration time.
    pub fn add_tag_fn<T, U, E, F>(&self, tagname: &str, f: F)
                                  -> Result<(), TagError>
    where T: FromEdn,
          U: Any + Send + Sync,
          E: Into<anyhow::Error>,
          F: Fn(T) -> Result<U, E> + Send + Sync + 'static
    {
        let tag = KString::from_ref(tagname);
        let errtag = tag.clone();
        let handler = TagHandler {
            convert: Box::new(move |form, cx| {
                let input: T = T::from_edn(form, cx)?;
                match f(input) {
                    Ok(u) => Ok(Box::new(u) as Box<dyn Any + Send + Sync>),
                    Err(e) => Err(DecodeError::TagConvert {
                        tag: errtag.clone(),
                        pos: form.pos,
                        source: e.into(),
                    }),
                }
            }),
        };
        self.add_val(tag, handler)
    }

    /// Registers `T` as the matching struct prototype for `tagname`
    /// tags: the tag's inner form is decoded with `T`'s shape.
    /// Concreteness of `T` is enforced by the trait bound.
    pub fn add_tag_struct<T>(&self, tagname: &str) -> Result<(), TagError>
    where T: FromEdn + Send + Sync
    {
        let handler = TagHandler {
            convert: Box::new(move |form, cx| {
                Ok(Box::new(T::from_edn(form, cx)?)
                   as Box<dyn Any + Send + Sync>)
            }),
        };
        self.add_val(KString::from_ref(tagname), handler)
    }

    fn add_val(&self, name: KString, handler: TagHandler)
               -> Result<(), TagError> {
        let mut m = self.m.write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let prev = m.insert(name, Arc::new(handler));
        if prev.is_some() {
            Err(TagError::Overwritten)
        } else {
            Ok(())
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<TagHandler>> {
        let m = self.m.read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        m.get(name).cloned()
    }
}

impl Default for TagRegistry {
    fn default() -> TagRegistry {
        TagRegistry::new()
    }
}

static GLOBAL_TAGS: Lazy<TagRegistry> = Lazy::new(|| {
    let tags = TagRegistry::new();
    // The EDN built-in tagged elements. Registration on a fresh
    // registry cannot report an overwrite.
    tags.add_tag_fn("inst", |s: String| DateTime::parse_from_rfc3339(&s))
        .expect("fresh registry");
    tags.add_tag_fn("base64", |s: String| {
        base64::engine::general_purpose::STANDARD.decode(s)
    }).expect("fresh registry");
    tags
});

pub(crate) fn global() -> &'static TagRegistry {
    &GLOBAL_TAGS
}

/// Adds `fn` as a converter function for `tagname` tags to the global
/// registry. See [TagRegistry::add_tag_fn].
pub fn add_tag_fn<T, U, E, F>(tagname: &str, f: F) -> Result<(), TagError>
where T: FromEdn,
      U: Any + Send + Sync,
      E: Into<anyhow::Error>,
      F: Fn(T) -> Result<U, E> + Send + Sync + 'static
{
    global().add_tag_fn(tagname, f)
}

/// Registers `T` as the matching struct prototype for `tagname` tags
/// in the global registry. See [TagRegistry::add_tag_struct].
pub fn add_tag_struct<T>(tagname: &str) -> Result<(), TagError>
where T: FromEdn + Send + Sync
{
    global().add_tag_struct::<T>(tagname)
}
