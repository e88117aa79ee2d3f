use num_bigint::BigInt;
use pretty_assertions::assert_eq;

use super::{Dict, Opaque, Set, Value};

#[test]
fn test_dict_keeps_insertion_order_and_unique_keys() {
    let mut dict = Dict::new();
    dict.insert("b", 1);
    dict.insert("a", 2);
    assert_eq!(dict.insert("b", 3), Some(Value::from(1)));

    let keys: Vec<_> = dict.keys().cloned().collect();
    assert_eq!(keys, vec![Value::from("b"), Value::from("a")]);
    assert_eq!(dict.get(&"b".into()), Some(&Value::from(3)));
    assert_eq!(dict.len(), 2);
}

#[test]
fn test_dict_and_set_equality_ignores_order() {
    let left: Dict = [("x", 1), ("y", 2)].into_iter().collect();
    let right: Dict = [("y", 2), ("x", 1)].into_iter().collect();
    assert_eq!(Value::Dict(left), Value::Dict(right));

    let left: Set = [1, 2, 3].into_iter().collect();
    let right: Set = [3, 1, 2, 2].into_iter().collect();
    assert_eq!(right.len(), 3);
    assert_eq!(Value::Set(left), Value::Set(right));
}

#[test]
fn test_list_and_tuple_are_distinct() {
    assert_ne!(
        Value::List(vec![1.into()]),
        Value::Tuple(vec![1.into()])
    );
}

#[test]
fn test_type_names_and_accessors() {
    let big: BigInt = "123456789012345678901234567890".parse().unwrap();
    assert_eq!(Value::from(big.clone()).type_name(), "int");
    assert_eq!(Value::from(big.clone()).as_i64(), None);
    assert_eq!(Value::from(big.clone()).as_int(), Some(&big));
    assert_eq!(Value::from(7u8).as_i64(), Some(7));
    assert_eq!(Value::from(2).as_f64(), Some(2.0));
    assert_eq!(Value::from("s").as_str(), Some("s"));
    assert_eq!(Value::from(None::<i32>), Value::None);
    assert_eq!(Value::Bytes(vec![1]).type_name(), "bytes");

    struct Handle;
    let opaque = Opaque::new(Handle);
    assert!(Value::Opaque(opaque.clone()).type_name().ends_with("Handle"));
    assert!(opaque.downcast_ref::<Handle>().is_some());
    assert_eq!(Value::Opaque(opaque.clone()), Value::Opaque(opaque));
}
