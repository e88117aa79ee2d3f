use std::cmp::Ordering;

use num_bigint::BigInt;
use pretty_assertions::assert_eq;

use super::*;

fn list(items: Vec<Value>) -> Value {
    Value::new_list(items)
}

#[test]
fn test_repr_scalars() {
    assert_eq!(Value::None.repr(), "None");
    assert_eq!(Value::Bool(true).repr(), "True");
    assert_eq!(Value::int(7).repr(), "7");
    assert_eq!(Value::Float(7.7).repr(), "7.7");
    assert_eq!(Value::Float(1.0).repr(), "1.0");
    assert_eq!(Value::Float(1e20).repr(), "1e+20");
    assert_eq!(Value::Float(f64::NEG_INFINITY).repr(), "-inf");
    assert_eq!(Value::from("True").repr(), "\"True\"");
    assert_eq!(Value::bytes(&b"dead0000beef"[..]).repr(), "b\"dead0000beef\"");
}

#[test]
fn test_repr_containers() {
    let value = list(vec![
        Value::int(4),
        Value::int(2),
        Value::int(0),
        Value::from("go"),
    ]);
    assert_eq!(value.repr(), "[4, 2, 0, \"go\"]");
    assert_eq!(
        Value::new_tuple(vec![Value::int(13), Value::int(37)]).repr(),
        "(13, 37)"
    );
    assert_eq!(Value::new_tuple(vec![Value::int(1)]).repr(), "(1,)");

    let set = Value::new_set();
    if let Value::Set(s) = &set {
        for i in 1..=3 {
            s.insert(Value::int(i)).unwrap();
        }
    }
    assert_eq!(set.repr(), "set([1, 2, 3])");

    let dict = Value::new_dict();
    if let Value::Dict(d) = &dict {
        d.insert(Value::from("a"), Value::int(1)).unwrap();
    }
    assert_eq!(dict.repr(), "{\"a\": 1}");
}

#[test]
fn test_repr_cycle() {
    let outer = list(vec![Value::int(1)]);
    if let Value::List(l) = &outer {
        let inner = outer.clone();
        l.mutate("append to", |items| items.push(inner)).unwrap();
    }
    assert_eq!(outer.repr(), "[1, [...]]");
}

#[test]
fn test_str_is_unquoted() {
    assert_eq!(Value::from("hi").to_str(), "hi");
    assert_eq!(list(vec![Value::from("hi")]).to_str(), "[\"hi\"]");
}

#[test]
fn test_int_float_equality_and_hash() {
    assert!(equals(&Value::int(1), &Value::Float(1.0)).unwrap());
    assert!(!equals(&Value::int(1), &Value::Float(1.5)).unwrap());
    assert!(!equals(&Value::Bool(true), &Value::int(1)).unwrap());

    let dict = Value::new_dict();
    let Value::Dict(d) = &dict else { unreachable!() };
    d.insert(Value::int(1), Value::from("int")).unwrap();
    d.insert(Value::Float(1.0), Value::from("float")).unwrap();
    assert_eq!(d.len(), 1);
    assert_eq!(d.get(&Value::int(1)).unwrap(), Some(Value::from("float")));
}

#[test]
fn test_big_int_compare() {
    let big = Value::Int(BigInt::from(1u64 << 63) * 4);
    assert_eq!(compare(&big, &Value::int(1)).unwrap(), Ordering::Greater);
    assert_eq!(compare(&Value::int(2), &Value::Float(2.5)).unwrap(), Ordering::Less);
    assert_eq!(compare(&Value::Float(2.5), &Value::int(2)).unwrap(), Ordering::Greater);
}

#[test]
fn test_compare_sequences() {
    let a = Value::new_tuple(vec![Value::int(1), Value::int(2)]);
    let b = Value::new_tuple(vec![Value::int(1), Value::int(3)]);
    assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
    assert_eq!(
        compare(&Value::int(1), &Value::from("a")).unwrap_err(),
        "int < string not implemented"
    );
}

#[test]
fn test_unhashable() {
    let err = HashedValue::new(list(vec![])).unwrap_err();
    assert_eq!(err, "unhashable type: list");
    let nested = Value::new_tuple(vec![list(vec![])]);
    assert!(HashedValue::new(nested).is_err());
}

#[test]
fn test_freeze_is_deep() {
    let inner = list(vec![]);
    let outer = list(vec![inner.clone()]);
    outer.freeze();
    let Value::List(l) = &inner else { unreachable!() };
    assert!(l.is_frozen());
    assert_eq!(
        l.mutate("append to", |items| items.push(Value::None))
            .unwrap_err(),
        "cannot append to frozen list"
    );
}

#[test]
fn test_freeze_handles_cycles() {
    let outer = list(vec![]);
    if let Value::List(l) = &outer {
        let inner = outer.clone();
        l.mutate("append to", |items| items.push(inner)).unwrap();
    }
    outer.freeze();
}

#[test]
fn test_range() {
    let r = Range {
        start: 10,
        stop: 0,
        step: -3,
    };
    assert_eq!(r.iter().collect::<Vec<_>>(), vec![10, 7, 4, 1]);
    assert_eq!(r.get(3), Some(1));
    assert_eq!(r.get(4), None);
    assert!(r.contains(7));
    assert!(!r.contains(8));
    assert!(!r.contains(13));

    let wide = Range {
        start: i64::MIN + 1,
        stop: i64::MAX,
        step: 1 << 62,
    };
    assert_eq!(wide.len(), 4);
    assert_eq!(wide.get(3), Some((1 << 62) + 1));
    assert!(wide.materialize().is_ok());

    let huge = Range {
        start: 0,
        stop: 1 << 60,
        step: 1,
    };
    assert_eq!(
        huge.materialize().unwrap_err(),
        "range of 1152921504606846976 elements is too large to materialize"
    );
    assert_eq!(Value::Range(r).repr(), "range(10, 0, -3)");
    assert_eq!(
        Value::Range(Range {
            start: 0,
            stop: 5,
            step: 1
        })
        .repr(),
        "range(5)"
    );
}

#[test]
fn test_truth() {
    assert!(!Value::None.truth());
    assert!(!Value::int(0).truth());
    assert!(Value::Float(0.1).truth());
    assert!(!Value::from("").truth());
    assert!(list(vec![Value::None]).truth());
}
