//! These tests change process-wide options, so each one holds `LOCK` and
//! starts from a known configuration.

mod common;

use indoc::indoc;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use starbridge_core::{Dialect, DialectUpdate, Error, Session, Set, Value, configure, dialect};

static LOCK: Mutex<()> = parking_lot::const_mutex(());

fn reset() {
    configure(DialectUpdate {
        allow_set: Some(false),
        allow_global_reassign: Some(false),
        allow_recursion: Some(false),
    });
}

#[test]
fn test_configure_retains_unset_options() {
    common::init_test_logging();
    let _guard = LOCK.lock();
    reset();

    configure(DialectUpdate::new().allow_set(true).allow_recursion(false));
    let current = configure(DialectUpdate::new().allow_recursion(true));
    assert_eq!(
        current,
        Dialect {
            allow_set: true,
            allow_global_reassign: false,
            allow_recursion: true,
        }
    );
    assert_eq!(dialect(), current);

    // An empty update changes nothing.
    assert_eq!(configure(DialectUpdate::default()), current);
}

#[test]
fn test_allow_set() {
    let _guard = LOCK.lock();
    reset();
    let session = Session::new();

    let err = session.eval("set([1, 1])").unwrap_err();
    assert!(matches!(err, Error::Resolve(_)), "{:?}", err);

    // Host sets convert whatever the dialect says.
    let set: Set = [1, 2].into_iter().collect();
    session.set([("s", Value::Set(set.clone()))]).unwrap();
    assert_eq!(session.get("s").unwrap(), Value::Set(set));

    configure(DialectUpdate::new().allow_set(true));
    assert_eq!(
        session.eval("set([1, 1])").unwrap(),
        Value::Set([1].into_iter().collect())
    );
}

#[test]
fn test_allow_recursion() {
    let _guard = LOCK.lock();
    reset();
    let session = Session::new();
    session
        .exec(indoc! {"
            def fact(n):
                return 1 if n <= 1 else n * fact(n - 1)
        "})
        .unwrap();

    let err = session.eval("fact(5)").unwrap_err();
    assert_eq!(err.error_type(), "EvalError");
    assert_eq!(err.message(), "function fact called recursively");

    configure(DialectUpdate::new().allow_recursion(true));
    assert_eq!(
        session.eval("fact(30)").unwrap().as_int().map(ToString::to_string),
        Some("265252859812191058636308480000000".to_string())
    );
}

#[test]
fn test_allow_global_reassign() {
    let _guard = LOCK.lock();
    reset();
    let session = Session::new();
    let src = "x = 1\nx = x + 1\n";
    assert!(matches!(session.exec(src), Err(Error::Resolve(_))));

    configure(DialectUpdate::new().allow_global_reassign(true));
    session.exec(src).unwrap();
    assert_eq!(session.get("x").unwrap(), Value::from(2));
}
