use anyedn::decode::DecodeError;
use anyedn::tags::TagError;
use anyedn::{
    edn_struct, from_str, global_math_context, set_global_math_context,
    Decoder, MathContext, Value,
};
use anyhow::Result;
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, FixedOffset};
use std::num::NonZeroU64;
use std::str::FromStr;
use std::sync::Mutex;

// Tests that read or replace the process-wide math context take this
// lock so they do not observe each other's changes.
static GLOBAL_CONTEXT_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn builtin_inst() -> Result<()> {
    let t: DateTime<FixedOffset> =
        from_str(r#"#inst "1985-04-12T23:20:50.52Z""#)?;
    assert_eq!(t, DateTime::parse_from_rfc3339("1985-04-12T23:20:50.52Z")?);
    // a bare RFC3339 string works for the timestamp destination too
    let t: DateTime<FixedOffset> = from_str(r#""2011-10-09T20:29:47+04:00""#)?;
    assert_eq!(t, DateTime::parse_from_rfc3339("2011-10-09T20:29:47+04:00")?);
    Ok(())
}

#[test]
fn builtin_inst_rejects_garbage() {
    let e = from_str::<DateTime<FixedOffset>>(r#"#inst "yesterday""#)
        .unwrap_err();
    assert!(matches!(e, DecodeError::TagConvert { .. }));
}

#[test]
fn builtin_base64() -> Result<()> {
    let bytes: Vec<u8> = from_str(r#"#base64 "aGVsbG8=""#)?;
    assert_eq!(bytes, b"hello");
    Ok(())
}

edn_struct! {
    pub struct Complex {
        pub re: f64,
        pub im: f64,
    }
}

#[test]
fn session_converter_fn() -> Result<()> {
    let mut d = Decoder::from_str("#complex [1.0 2.5] {:re 3.0 :im 0.0}");
    d.add_tag_fn("complex", |p: [f64; 2]| {
        Ok::<_, anyhow::Error>(Complex { re: p[0], im: p[1] })
    })?;
    assert_eq!(d.decode::<Complex>()?, Complex { re: 1.0, im: 2.5 });
    // the structural shape still works without the tag
    assert_eq!(d.decode::<Complex>()?, Complex { re: 3.0, im: 0.0 });
    Ok(())
}

edn_struct! {
    pub struct Node {
        pub value: i64,
        pub next: Option<Box<Node>>,
    }
}

#[test]
fn session_struct_prototype() -> Result<()> {
    let mut d = Decoder::from_str(
        "#node {:value 1 :next #node {:value 2 :next nil}}");
    d.add_tag_struct::<Node>("node")?;
    let n = d.decode::<Node>()?;
    assert_eq!(n.value, 1);
    assert_eq!(n.next.unwrap().value, 2);
    Ok(())
}

#[test]
fn overwriting_is_a_soft_notice() -> Result<()> {
    let mut d = Decoder::from_str("#twice 3");
    d.add_tag_fn("twice", |i: i64| Ok::<_, anyhow::Error>(i * 2))?;
    let second = d.add_tag_fn("twice", |i: i64| {
        Ok::<_, anyhow::Error>(i * 10)
    });
    assert_eq!(second, Err(TagError::Overwritten));
    // decoding uses the replacement
    assert_eq!(d.decode::<i64>()?, 30);
    Ok(())
}

#[test]
fn unknown_tag_fails_typed_destinations() {
    assert!(matches!(from_str::<i64>("#nope 3"),
                     Err(DecodeError::UnknownTag { .. })));
}

#[test]
fn converter_output_must_match_destination() -> Result<()> {
    let mut d = Decoder::from_str("#stringy 3");
    d.add_tag_fn("stringy", |i: i64| {
        Ok::<_, anyhow::Error>(i.to_string())
    })?;
    assert!(matches!(d.decode::<i64>(),
                     Err(DecodeError::TagMismatch { .. })));
    Ok(())
}

#[test]
fn session_tags_resolve_in_dynamic_values() -> Result<()> {
    let mut d = Decoder::from_str("#doubled 21 #unknown 21");
    d.add_tag_fn("doubled", |i: i64| {
        Ok::<_, anyhow::Error>(Value::Int(i * 2))
    })?;
    assert_eq!(d.decode::<Value>()?, Value::Int(42));
    // unresolved tags wrap instead of failing
    assert_eq!(d.decode::<Value>()?,
               Value::Tagged("unknown".into(),
                             Box::new(Value::Int(21))));
    Ok(())
}

const FIFTY_DIGITS: &str =
    "1.2345678901234567890123456789012345678901234567890M";

#[test]
fn math_context_precision() -> Result<()> {
    let _guard = GLOBAL_CONTEXT_LOCK.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let exact = BigDecimal::from_str(
        FIFTY_DIGITS.trim_end_matches('M'))?;

    let mut d = Decoder::from_str(FIFTY_DIGITS);
    d.use_math_context(MathContext::new(30, RoundingMode::HalfEven));
    let at30 = d.decode::<BigDecimal>()?;
    assert_eq!(at30,
               exact.with_precision_round(NonZeroU64::new(30).unwrap(),
                                          RoundingMode::HalfEven));

    // the default context keeps 64 significant digits; the 50-digit
    // literal passes through unrounded and differs from the 30-digit
    // rendition
    let at_default = from_str::<BigDecimal>(FIFTY_DIGITS)?;
    assert_eq!(at_default, exact);
    assert_ne!(at30, at_default);

    // precision 0 means exact
    let mut d = Decoder::from_str(FIFTY_DIGITS);
    d.use_math_context(MathContext::new(0, RoundingMode::HalfEven));
    assert_eq!(d.decode::<BigDecimal>()?, exact);
    Ok(())
}

#[test]
fn global_math_context_is_copied_into_sessions() -> Result<()> {
    let _guard = GLOBAL_CONTEXT_LOCK.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let saved = global_math_context();
    set_global_math_context(MathContext::new(10, RoundingMode::HalfEven));
    // a session with no override picks up the new global
    let at10 = from_str::<BigDecimal>(FIFTY_DIGITS);
    // a session override still wins over the global
    let mut d = Decoder::from_str(FIFTY_DIGITS);
    d.use_math_context(MathContext::new(0, RoundingMode::HalfEven));
    let exact = d.decode::<BigDecimal>();
    set_global_math_context(saved);

    let at10 = at10?;
    let exact = exact?;
    assert_eq!(at10,
               exact.with_precision_round(NonZeroU64::new(10).unwrap(),
                                          RoundingMode::HalfEven));
    assert_ne!(at10, exact);
    assert_eq!(global_math_context(), saved);
    Ok(())
}

#[test]
fn math_context_rounding_mode() -> Result<()> {
    let mut d = Decoder::from_str("0.125M");
    d.use_math_context(MathContext::new(2, RoundingMode::HalfEven));
    assert_eq!(d.decode::<BigDecimal>()?, BigDecimal::from_str("0.12")?);

    let mut d = Decoder::from_str("0.125M");
    d.use_math_context(MathContext::new(2, RoundingMode::HalfUp));
    assert_eq!(d.decode::<BigDecimal>()?, BigDecimal::from_str("0.13")?);
    Ok(())
}

#[test]
fn sessions_are_deterministic() -> Result<()> {
    // two sessions over the same input with the same context agree
    let decode_once = || -> Result<BigDecimal> {
        let mut d = Decoder::from_str(FIFTY_DIGITS);
        d.use_math_context(MathContext::new(30, RoundingMode::HalfEven));
        Ok(d.decode::<BigDecimal>()?)
    };
    assert_eq!(decode_once()?, decode_once()?);
    Ok(())
}
