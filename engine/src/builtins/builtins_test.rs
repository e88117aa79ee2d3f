use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use crate::dialect::Dialect;
use crate::eval::{Globals, eval, exec_file};
use crate::thread::Thread;
use crate::value::Value;

fn thread() -> Thread {
    Thread::new(Dialect {
        allow_set: true,
        ..Dialect::default()
    })
}

fn repr(src: &str) -> String {
    match eval(&mut thread(), "<expr>", src, &Globals::new()) {
        Ok(value) => value.repr(),
        Err(err) => panic!("{} failed: {}", src, err),
    }
}

fn error(src: &str) -> String {
    match eval(&mut thread(), "<expr>", src, &Globals::new()) {
        Ok(value) => panic!("{} unexpectedly gave {}", src, value.repr()),
        Err(err) => err.to_string(),
    }
}

#[test]
fn test_conversions() {
    assert_eq!(repr("int('42')"), "42");
    assert_eq!(repr("int('-0x1f', 16)"), "-31");
    assert_eq!(repr("int('0o17', 0)"), "15");
    assert_eq!(repr("int(3.9)"), "3");
    assert_eq!(repr("int(True)"), "1");
    assert_eq!(repr("float('1.5')"), "1.5");
    assert_eq!(repr("float(2)"), "2.0");
    assert_eq!(repr("str(1.0)"), "\"1.0\"");
    assert_eq!(repr("str('x')"), "\"x\"");
    assert_eq!(repr("repr('x')"), "\"\\\"x\\\"\"");
    assert_eq!(repr("bool([])"), "False");
    assert_eq!(repr("type({})"), "\"dict\"");
    assert_eq!(repr("bytes('hi')"), "b\"hi\"");
}

#[test]
fn test_conversion_errors() {
    assert_eq!(
        error("int('abc')"),
        "int: invalid literal with base 10: \"abc\""
    );
    assert_eq!(
        error("int(1, 2)"),
        "int: can't convert non-string with explicit base"
    );
    assert_eq!(error("float('x')"), "float: invalid float literal: x");
    assert_eq!(error("len(1)"), "len: value of type int has no len");
}

#[test]
fn test_collections() {
    assert_eq!(repr("len('héllo')"), "5");
    assert_eq!(repr("len(b'h\\xc3\\xa9llo')"), "6");
    assert_eq!(repr("list(range(3))"), "[0, 1, 2]");
    assert_eq!(repr("list(range(5, 0, -2))"), "[5, 3, 1]");
    assert_eq!(repr("tuple([1, 2])"), "(1, 2)");
    assert_eq!(repr("dict([('a', 1)], b=2)"), "{\"a\": 1, \"b\": 2}");
    assert_eq!(repr("set([3, 1, 3])"), "set([3, 1])");
    assert_eq!(repr("sorted([3, 1, 2])"), "[1, 2, 3]");
    assert_eq!(repr("sorted([3, 1, 2], reverse=True)"), "[3, 2, 1]");
    assert_eq!(repr("sorted(['bb', 'a', 'ccc'], key=len)"), "[\"a\", \"bb\", \"ccc\"]");
    assert_eq!(repr("reversed([1, 2, 3])"), "[3, 2, 1]");
    assert_eq!(repr("enumerate(['a', 'b'], 1)"), "[(1, \"a\"), (2, \"b\")]");
    assert_eq!(repr("zip([1, 2, 3], 'ab'.split('x'))"), "[(1, \"ab\")]");
    assert_eq!(repr("min(3, 1, 2)"), "1");
    assert_eq!(repr("max([3, 1, 2])"), "3");
    assert_eq!(repr("max(['bb', 'a'], key=len)"), "\"bb\"");
    assert_eq!(repr("abs(-4)"), "4");
    assert_eq!(repr("any([0, 1])"), "True");
    assert_eq!(repr("all([])"), "True");
    assert_eq!(error("min([])"), "min: argument is an empty sequence");
    assert_eq!(error("range(1, 2, 0)"), "range: step argument must not be zero");
    assert_eq!(
        error("list(range(1 << 60))"),
        "list: range of 1152921504606846976 elements is too large to materialize"
    );
    assert_eq!(error("min(1, 'a')"), "min: string < int not implemented");
}

#[test]
fn test_attributes() {
    assert_eq!(repr("hasattr([], 'append')"), "True");
    assert_eq!(repr("hasattr([], 'nope')"), "False");
    assert_eq!(repr("getattr({}, 'nope', 5)"), "5");
    assert_eq!(repr("dir(set())"), "[\"add\", \"clear\", \"discard\", \"remove\", \"union\"]");
    assert_eq!(repr("[].append"), "<built-in method append of list value>");
    assert_eq!(repr("len"), "<built-in function len>");
    assert_eq!(error("getattr(1, 'x')"), "getattr: int has no .x field or method");
}

#[test]
fn test_string_methods() {
    assert_eq!(repr("', '.join(['a', 'b'])"), "\"a, b\"");
    assert_eq!(repr("' a  b '.split()"), "[\"a\", \"b\"]");
    assert_eq!(repr("'a,b,c'.split(',', 1)"), "[\"a\", \"b,c\"]");
    assert_eq!(repr("'  x '.strip()"), "\"x\"");
    assert_eq!(repr("'xxhixx'.lstrip('x')"), "\"hixx\"");
    assert_eq!(repr("'abc'.startswith(('x', 'a'))"), "True");
    assert_eq!(repr("'abc'.endswith('bc')"), "True");
    assert_eq!(repr("'aaa'.replace('a', 'b', 2)"), "\"bba\"");
    assert_eq!(repr("'Hi'.upper() + 'Hi'.lower()"), "\"HIhi\"");
    assert_eq!(repr("'hello'.find('l')"), "2");
    assert_eq!(repr("'hello'.find('z')"), "-1");
    assert_eq!(repr("'héllo'.find('l')"), "2");
    assert_eq!(repr("'banana'.count('a')"), "3");
    assert_eq!(repr("'{} {x} {0!r}'.format('a', x=1)"), "\"a 1 \\\"a\\\"\"");
    assert_eq!(error("','.join([1])"), "join: in list, want string, got int");
}

#[test]
fn test_container_methods() {
    let src = "\
def f():
    xs = [1, 2]
    xs.append(3)
    xs.extend((4, 5))
    xs.insert(0, 0)
    last = xs.pop()
    xs.remove(2)
    d = {'a': 1}
    d.update(b=2)
    d.setdefault('c', 3)
    popped = d.pop('a')
    s = set([1])
    s.add(2)
    s.discard(7)
    return xs, last, xs.index(3), d, d.get('z', 0), popped, s.union([3])

result = f()
";
    let globals = exec_file(&mut thread(), "methods.star", src, &Globals::new()).unwrap();
    assert_eq!(
        globals["result"].repr(),
        "([0, 1, 3, 4], 5, 2, {\"b\": 2, \"c\": 3}, 0, 1, set([1, 2, 3]))"
    );
}

#[test]
fn test_frozen_mutation_fails() {
    let xs = Value::new_list(vec![Value::int(1)]);
    xs.freeze();
    let mut predeclared = Globals::new();
    predeclared.insert("xs".to_string(), xs);
    let err = eval(&mut thread(), "<expr>", "xs.append(2)", &predeclared).unwrap_err();
    assert_eq!(err.to_string(), "append: cannot append to frozen list");
}

#[test]
fn test_print_and_fail() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let mut thread = thread().with_print(Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    }));
    exec_file(
        &mut thread,
        "print.star",
        "print('a', 1, sep='-')\nprint()\n",
        &Globals::new(),
    )
    .unwrap();
    assert_eq!(*lines.lock().unwrap(), vec!["a-1".to_string(), String::new()]);

    assert_eq!(error("fail('boom', 42)"), "fail: boom 42");
}
