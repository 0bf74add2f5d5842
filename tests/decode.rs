use anyedn::decode::{DecodeContext, DecodeError, FromEdn};
use anyedn::read::Form;
use anyedn::value::{keyword, symbol, Value};
use anyedn::{edn_struct, from_reader, from_str, Decoder, Keyword, Symbol};
use anyhow::Result;
use bigdecimal::BigDecimal;
use num::BigInt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

#[test]
fn ints() -> Result<()> {
    assert_eq!(from_str::<i64>("5")?, 5);
    assert_eq!(from_str::<i32>("-3")?, -3);
    assert_eq!(from_str::<u8>("+7")?, 7);
    assert_eq!(from_str::<i64>("8223372036854775808")?,
               8223372036854775808);
    assert_eq!(from_str::<usize>("0")?, 0);
    Ok(())
}

#[test]
fn int_range_errors() {
    assert!(matches!(from_str::<i8>("300"),
                     Err(DecodeError::Range { .. })));
    assert!(matches!(from_str::<u8>("-1"),
                     Err(DecodeError::Range { .. })));
    assert!(matches!(from_str::<i64>("9223372036854775808"),
                     Err(DecodeError::Range { .. })));
}

#[test]
fn bigints() -> Result<()> {
    let huge = "123456789012345678901234567890";
    assert_eq!(from_str::<BigInt>(&format!("{}N", huge))?,
               BigInt::from_str(huge)?);
    // plain literals work for BigInt destinations too
    assert_eq!(from_str::<BigInt>(huge)?, BigInt::from_str(huge)?);
    assert_eq!(from_str::<BigInt>("-42N")?, BigInt::from_str("-42")?);
    Ok(())
}

#[test]
fn floats() -> Result<()> {
    assert_eq!(from_str::<f64>("3.5")?, 3.5);
    assert_eq!(from_str::<f64>("1e3")?, 1000.0);
    assert_eq!(from_str::<f64>("-2.5E-1")?, -0.25);
    // integer and big-decimal literals narrow into floats
    assert_eq!(from_str::<f64>("2")?, 2.0);
    assert_eq!(from_str::<f64>("2.5M")?, 2.5);
    assert_eq!(from_str::<f32>("0.5")?, 0.5f32);
    Ok(())
}

#[test]
fn big_decimals() -> Result<()> {
    assert_eq!(from_str::<BigDecimal>("1.5M")?,
               BigDecimal::from_str("1.5")?);
    // M is accepted on integer-shaped literals
    assert_eq!(from_str::<BigDecimal>("3M")?, BigDecimal::from_str("3")?);
    assert_eq!(from_str::<BigDecimal>("-0.125M")?,
               BigDecimal::from_str("-0.125")?);
    Ok(())
}

#[test]
fn scalars() -> Result<()> {
    assert_eq!(from_str::<bool>("true")?, true);
    assert_eq!(from_str::<bool>("false")?, false);
    assert_eq!(from_str::<String>(r#""hi\nthere""#)?, "hi\nthere");
    assert_eq!(from_str::<String>(r#""Abc""#)?, "Abc");
    assert_eq!(from_str::<char>(r"\c")?, 'c');
    assert_eq!(from_str::<char>(r"\newline")?, '\n');
    assert_eq!(from_str::<char>(r"\u0041")?, 'A');
    assert_eq!(from_str::<char>(r"\(")?, '(');
    Ok(())
}

#[test]
fn options() -> Result<()> {
    assert_eq!(from_str::<Option<i64>>("nil")?, None);
    assert_eq!(from_str::<Option<i64>>("5")?, Some(5));
    assert_eq!(from_str::<Option<String>>(r#""x""#)?,
               Some("x".to_string()));
    Ok(())
}

#[test]
fn symbols_and_keywords() -> Result<()> {
    let s = from_str::<Symbol>("foo/bar")?;
    assert_eq!(s.namespace(), Some("foo"));
    assert_eq!(s.name(), "bar");
    let k = from_str::<Keyword>(":friday")?;
    assert_eq!(k.as_str(), "friday");
    assert_eq!(k.to_string(), ":friday");
    assert_eq!(from_str::<Symbol>("/")?.name(), "/");
    Ok(())
}

#[test]
fn sequences() -> Result<()> {
    assert_eq!(from_str::<Vec<i64>>("[1 2 3]")?, [1, 2, 3]);
    assert_eq!(from_str::<Vec<i64>>("(1, 2, 3)")?, [1, 2, 3]);
    assert_eq!(from_str::<Vec<Symbol>>("(a b c)")?.len(), 3);
    // sets decode into sequences in literal order
    assert_eq!(from_str::<Vec<i64>>("#{1 2 3}")?, [1, 2, 3]);
    assert_eq!(from_str::<Vec<Vec<i64>>>("[[1] [] [2 3]]")?,
               vec![vec![1], vec![], vec![2, 3]]);
    Ok(())
}

#[test]
fn fixed_size_arrays() -> Result<()> {
    assert_eq!(from_str::<[i64; 4]>("[1 2 3 4]")?, [1, 2, 3, 4]);
    // missing trailing elements stay at the default
    assert_eq!(from_str::<[i64; 4]>("[1 2 3]")?, [1, 2, 3, 0]);
    assert!(matches!(from_str::<[i64; 4]>("[1 2 3 4 5]"),
                     Err(DecodeError::TooManyElements {
                         expected: 4,
                         got: 5,
                         ..
                     })));
    Ok(())
}

#[test]
fn maps() -> Result<()> {
    let m: HashMap<String, i64> = from_str(r#"{"a" 1 "b" 2}"#)?;
    assert_eq!(m.len(), 2);
    assert_eq!(m["a"], 1);
    assert_eq!(m["b"], 2);
    let m: BTreeMap<Keyword, Vec<i64>> = from_str("{:xs [1 2] :ys []}")?;
    assert_eq!(m[&Keyword::from_ref("xs")], [1, 2]);
    Ok(())
}

#[test]
fn duplicate_map_keys_last_wins() -> Result<()> {
    let m: HashMap<Keyword, i64> = from_str("{:a 1 :a 2}")?;
    assert_eq!(m.len(), 1);
    assert_eq!(m[&Keyword::from_ref("a")], 2);
    Ok(())
}

#[test]
fn set_into_map_of_bool() -> Result<()> {
    let m: HashMap<Keyword, bool> = from_str("#{:a :b}")?;
    assert_eq!(m.len(), 2);
    assert_eq!(m[&Keyword::from_ref("a")], true);
    assert_eq!(m[&Keyword::from_ref("b")], true);
    Ok(())
}

#[test]
fn set_duplicates_collapse() -> Result<()> {
    let s: BTreeSet<i64> = from_str("#{1 2 2 3}")?;
    assert_eq!(s.len(), 3);
    Ok(())
}

#[test]
fn odd_map_elements_is_an_error() {
    let e = from_str::<Value>("{:a :b :c}").unwrap_err();
    assert!(matches!(e, DecodeError::Read(_)));
    assert!(e.to_string().contains("odd number"));
}

#[test]
fn discards() -> Result<()> {
    assert_eq!(from_str::<Vec<i64>>("[1 2 #_3 4]")?, [1, 2, 4]);
    assert_eq!(from_str::<Symbol>("#_ #zap #_ xyz foo bar")?,
               Symbol::from_ref("bar"));
    assert_eq!(
        from_str::<Symbol>("#_ #foo #foo #foo #_#_bar baz zip quux")?,
        Symbol::from_ref("quux"));
    assert_eq!(from_str::<Vec<i64>>("[#_ #_ #_ 1 2 3 4]")?, [4]);
    Ok(())
}

#[test]
fn comments_and_commas() -> Result<()> {
    assert_eq!(from_str::<Vec<i64>>("[1, ; one\n 2]")?, [1, 2]);
    Ok(())
}

edn_struct! {
    pub struct Animal {
        #[edn("kind")]
        pub species: String,
        pub sound: String,
        pub legs: i64,
    }
}

#[test]
fn keyed_structs() -> Result<()> {
    let a: Animal =
        from_str(r#"{:kind "dog" :sound "woof" :tail true}"#)?;
    assert_eq!(a.species, "dog");
    assert_eq!(a.sound, "woof");
    // absent field keeps its default, unmatched keys are ignored
    assert_eq!(a.legs, 0);
    // symbol and string keys match the same field table
    let a: Animal = from_str(r#"{kind "cat" "legs" 4}"#)?;
    assert_eq!(a.species, "cat");
    assert_eq!(a.legs, 4);
    Ok(())
}

edn_struct! {
    pub struct Node {
        pub value: i64,
        pub next: Option<Box<Node>>,
    }
}

#[test]
fn recursive_structs() -> Result<()> {
    let n: Node = from_str("{:value 1 :next {:value 2 :next nil}}")?;
    assert_eq!(n.value, 1);
    let next = n.next.unwrap();
    assert_eq!(next.value, 2);
    assert!(next.next.is_none());
    Ok(())
}

#[test]
fn dynamic_values() -> Result<()> {
    let v: Value = from_str(r#"{:a [1 2.5] :b #{x}}"#)?;
    let mut m = BTreeMap::new();
    m.insert(keyword("a"),
             Value::Vector(vec![Value::Int(1), Value::Float(2.5)]));
    m.insert(keyword("b"),
             Value::Set(BTreeSet::from([symbol("x")])));
    assert_eq!(v, Value::Map(m));
    // integers silently widen past i64
    assert_eq!(from_str::<Value>("9223372036854775808")?,
               Value::BigInt(BigInt::from_str("9223372036854775808")?));
    // unresolved tags are kept, not rejected
    assert_eq!(from_str::<Value>("#whatever 5")?,
               Value::Tagged("whatever".into(), Box::new(Value::Int(5))));
    Ok(())
}

#[test]
fn reader_entry_point() -> Result<()> {
    let v: Vec<i64> = from_reader(std::io::Cursor::new("[1 2 3]"))?;
    assert_eq!(v, [1, 2, 3]);
    // a source that is not UTF-8 fails on the I/O side
    assert!(matches!(
        from_reader::<Value>(std::io::Cursor::new(&b"\xff"[..])),
        Err(DecodeError::Io(_))));
    Ok(())
}

#[test]
fn sessions_decode_sequential_forms() -> Result<()> {
    let mut d = Decoder::from_str("1 [2 3] four");
    assert_eq!(d.decode::<i64>()?, 1);
    assert_eq!(d.decode::<Vec<i64>>()?, [2, 3]);
    assert_eq!(d.decode::<Symbol>()?, Symbol::from_ref("four"));
    assert!(matches!(d.decode::<Value>(), Err(DecodeError::Eof)));
    assert!(matches!(d.decode::<Value>(), Err(DecodeError::Eof)));
    Ok(())
}

#[test]
fn lex_errors_surface() {
    assert!(matches!(from_str::<Value>(r#""abc"#),
                     Err(DecodeError::Read(_))));
    assert!(matches!(from_str::<Value>("[1 2"),
                     Err(DecodeError::Read(_))));
    assert!(matches!(from_str::<Value>("(1 2]"),
                     Err(DecodeError::Read(_))));
    assert!(matches!(from_str::<Value>("007"),
                     Err(DecodeError::Read(_))));
}

#[test]
fn type_mismatches() {
    assert!(matches!(from_str::<i64>(r#""5""#),
                     Err(DecodeError::Mismatch { .. })));
    assert!(matches!(from_str::<String>("5"),
                     Err(DecodeError::Mismatch { .. })));
    assert!(matches!(from_str::<Vec<i64>>("{:a 1}"),
                     Err(DecodeError::Mismatch { .. })));
}

// A destination that never looks at the structural form: it counts the
// top-level forms between its collection's brackets by running an
// independent session over the raw text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
         Hash)]
struct Counter(usize);

impl FromEdn for Counter {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Counter, DecodeError> {
        let raw = cx.raw(form);
        let inner = &raw[1..raw.len() - 1];
        let mut d = Decoder::from_str(inner);
        let mut n = 0;
        loop {
            match d.decode::<Value>() {
                Ok(_) => n += 1,
                Err(DecodeError::Eof) => return Ok(Counter(n)),
                Err(e) => return Err(e),
            }
        }
    }
}

#[test]
fn raw_hook_counts_elements() -> Result<()> {
    assert_eq!(from_str::<Counter>("[foo bar baz]")?, Counter(3));
    assert_eq!(from_str::<Counter>("(a b c d e f)")?, Counter(6));
    let counts: Vec<Counter> = from_str(
        r#"[[a b c][d e f g h],[#_3 z 2 \c]()["c d e"](2 3.0M)]"#)?;
    assert_eq!(counts,
               [Counter(3), Counter(5), Counter(3), Counter(0),
                Counter(1), Counter(2)]);
    Ok(())
}

#[test]
fn raw_hook_as_map_key() -> Result<()> {
    let m: HashMap<Counter, Keyword> =
        from_str("{[a b] :two (c) :one}")?;
    assert_eq!(m[&Counter(2)], Keyword::from_ref("two"));
    assert_eq!(m[&Counter(1)], Keyword::from_ref("one"));
    Ok(())
}

// A destination with a shorthand: the keyword :all, or an explicit set
// of keywords.
#[derive(Debug, Default, PartialEq)]
struct Selection {
    all: bool,
    items: BTreeSet<Keyword>,
}

impl FromEdn for Selection {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<Selection, DecodeError> {
        if let Ok(k) = Keyword::from_edn(form, cx) {
            if k.as_str() == "all" {
                return Ok(Selection {
                    all: true,
                    items: BTreeSet::new(),
                });
            }
        }
        Ok(Selection {
            all: false,
            items: BTreeSet::from_edn(form, cx)?,
        })
    }
}

#[test]
fn shorthand_hook() -> Result<()> {
    assert_eq!(from_str::<Selection>(":all")?,
               Selection {
                   all: true,
                   items: BTreeSet::new(),
               });
    let s: Selection = from_str("#{:a :b}")?;
    assert!(!s.all);
    assert_eq!(s.items.len(), 2);
    Ok(())
}

// Hook priority: a type that takes the raw text sees tag prefixes
// before any registry lookup could reject them.
#[derive(Debug, PartialEq)]
struct RawText(String);

impl FromEdn for RawText {
    fn from_edn(form: &Form, cx: &DecodeContext<'_>)
                -> Result<RawText, DecodeError> {
        Ok(RawText(cx.raw(form).to_string()))
    }
}

#[test]
fn raw_hook_precedes_tag_resolution() -> Result<()> {
    assert_eq!(from_str::<RawText>("#unregistered [1 2]")?,
               RawText("#unregistered [1 2]".to_string()));
    assert_eq!(from_str::<RawText>(r#"{:a 1}"#)?,
               RawText("{:a 1}".to_string()));
    Ok(())
}
