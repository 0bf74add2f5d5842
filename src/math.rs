// Copyright 2023 Christian Jaeger <ch@christianjaeger.ch>. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The numeric context consulted when arbitrary-precision decimal
//! literals (`M` suffix) are decoded. There is one process-wide
//! default; a [Decoder](crate::decoder::Decoder) session can carry its
//! own copy without touching the default.

use bigdecimal::{BigDecimal, RoundingMode};
use std::num::NonZeroU64;
use std::sync::RwLock;

/// Precision (significant decimal digits) and rounding mode for
/// big-decimal decoding. A precision of 0 means "exact": the literal
/// is never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MathContext {
    pub precision: u64,
    pub rounding: RoundingMode,
}

impl MathContext {
    pub const fn new(precision: u64, rounding: RoundingMode) -> MathContext {
        MathContext { precision, rounding }
    }

    /// Rounds `d` according to this context.
    pub fn apply(&self, d: BigDecimal) -> BigDecimal {
        match NonZeroU64::new(self.precision) {
            Some(prec) => d.with_precision_round(prec, self.rounding),
            None => d,
        }
    }
}

pub const DEFAULT_MATH_CONTEXT: MathContext =
    MathContext::new(64, RoundingMode::HalfEven);

impl Default for MathContext {
    fn default() -> MathContext {
        DEFAULT_MATH_CONTEXT
    }
}

static GLOBAL: RwLock<MathContext> = RwLock::new(DEFAULT_MATH_CONTEXT);

/// The process-wide context, used by sessions that did not override
/// it. Returns a copy; later changes to the global do not affect it.
pub fn global_math_context() -> MathContext {
    match GLOBAL.read() {
        Ok(g) => *g,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Replaces the process-wide default context.
pub fn set_global_math_context(mc: MathContext) {
    match GLOBAL.write() {
        Ok(mut g) => *g = mc,
        Err(poisoned) => *poisoned.into_inner() = mc,
    }
}
