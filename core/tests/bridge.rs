mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indoc::indoc;
use pretty_assertions::assert_eq;
use starbridge_core::{Dict, HostFunction, Session, Signature, Value};

fn greet() -> HostFunction {
    HostFunction::new(
        "greet",
        Signature::new()
            .required("name")
            .optional("greeting", "hello")
            .keyword_only_default("punctuation", "!"),
        |args| {
            let name = args.get("name").and_then(Value::as_str).ok_or("name must be a str")?;
            let greeting = args.get("greeting").and_then(Value::as_str).unwrap_or_default();
            let punctuation = args.get("punctuation").and_then(Value::as_str).unwrap_or_default();
            Ok(format!("{}, {}{}", greeting, name, punctuation).into())
        },
    )
}

fn session_with(name: &str, function: HostFunction) -> Session {
    Session::builder().globals([(name, function)]).build().unwrap()
}

#[test]
fn test_calls_with_positional_and_keyword_arguments() {
    common::init_test_logging();
    let session = session_with("greet", greet());
    assert_eq!(session.eval("greet('bob')").unwrap(), Value::from("hello, bob!"));
    assert_eq!(
        session.eval("greet('bob', greeting='hi', punctuation='?')").unwrap(),
        Value::from("hi, bob?")
    );
    assert_eq!(
        session.eval("greet(*['ann', 'hey'])").unwrap(),
        Value::from("hey, ann!")
    );
}

#[test]
fn test_arity_mismatch_uses_host_messages() {
    let session = session_with("greet", greet());
    let cases = [
        (
            "greet()",
            "Error in greet:0:0: greet() missing 1 required positional argument: 'name'",
        ),
        (
            "greet('a', 'b', 'c')",
            "Error in greet:0:0: greet() takes from 1 to 2 positional arguments but 3 were given",
        ),
        (
            "greet('a', mood='x')",
            "Error in greet:0:0: greet() got an unexpected keyword argument 'mood'",
        ),
        (
            "greet('a', name='b')",
            "Error in greet:0:0: greet() got multiple values for argument 'name'",
        ),
    ];
    for (src, expected) in cases {
        let err = session.eval(src).unwrap_err();
        assert_eq!(err.error_type(), "EvalError", "{}", src);
        assert_eq!(err.message(), expected, "{}", src);
    }
}

#[test]
fn test_host_failure_becomes_eval_error() {
    let explode = HostFunction::variadic("explode", |_| Err("kaboom".into()));
    let session = session_with("explode", explode);
    let err = session.exec("def run():\n    explode()\n\nrun()\n").unwrap_err();
    let eval = err.as_eval_error().unwrap();
    assert_eq!(eval.message, "Error in explode:0:0: kaboom");
    assert_eq!(eval.function_name.as_deref(), Some("explode"));
    assert_eq!(eval.line, Some(2));
}

#[test]
fn test_arguments_and_results_are_converted() {
    let describe = HostFunction::variadic("describe", |args| {
        let mut dict = Dict::new();
        dict.insert(
            "positional",
            Value::List(args.positional().iter().map(|v| v.type_name().into()).collect()),
        );
        for (name, value) in args.keywords() {
            dict.insert(name.as_str(), value.clone());
        }
        Ok(Value::Dict(dict))
    });
    let session = session_with("describe", describe);
    let result = session
        .eval("describe(1 << 70, (1, 'a'), {'k': [None]}, flag=True)")
        .unwrap();

    let mut expected = Dict::new();
    expected.insert(
        "positional",
        Value::List(vec!["int".into(), "tuple".into(), "dict".into()]),
    );
    expected.insert("flag", true);
    assert_eq!(result, Value::Dict(expected));

    // The returned dict is an ordinary mutable Starlark value.
    session
        .exec(indoc! {"
            def grow():
                d = describe()
                d['extra'] = 1
                return len(d)

            size = grow()
        "})
        .unwrap();
    assert_eq!(session.get("size").unwrap(), Value::from(2));
}

#[test]
fn test_starlark_functions_cannot_be_passed_to_the_host() {
    let session = session_with("call", HostFunction::variadic("call", |_| Ok(Value::None)));
    let err = session
        .exec("def cb():\n    pass\n\nx = call(cb)\n")
        .unwrap_err();
    assert_eq!(
        err.message(),
        "Error in call:0:0: Don't know how to convert Starlark function to Rust"
    );
}

#[test]
fn test_callable_identity_survives_round_trip() {
    let function = greet();
    let session = session_with("greet", function.clone());
    session.exec("alias = greet").unwrap();
    let Value::Callable(back) = session.get("alias").unwrap() else {
        panic!("expected a callable");
    };
    assert!(back.ptr_eq(&function));

    // A host function handed back into Starlark still works.
    session.set([("again", Value::Callable(back))]).unwrap();
    assert_eq!(session.eval("again('x')").unwrap(), Value::from("hello, x!"));
    assert_eq!(
        session.eval("str(greet)").unwrap(),
        Value::from("<function greet>")
    );
}

#[test]
fn test_session_keeps_closures_alive() {
    let calls = Arc::new(AtomicUsize::new(0));
    let session = {
        let counter = calls.clone();
        let tick = HostFunction::variadic("tick", move |_| {
            Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) + 1))
        });
        session_with("tick", tick)
    };

    session.exec("last = [tick() for _ in range(5)][-1]").unwrap();
    assert_eq!(session.get("last").unwrap(), Value::from(5));
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    drop(session);
    assert_eq!(Arc::strong_count(&calls), 1);
}

#[test]
fn test_close_releases_closures_referenced_by_starlark_functions() {
    let token = Arc::new(());
    let session = {
        let token = token.clone();
        let h = HostFunction::variadic("h", move |_| Ok(Value::from(Arc::strong_count(&token))));
        session_with("h", h)
    };

    session
        .exec(indoc! {"
            def f():
                return h()

            def make():
                local = h
                def inner():
                    return local()
                return inner

            g = make()
        "})
        .unwrap();
    assert!(session.eval("f()").unwrap().as_i64().is_some());
    assert!(session.eval("g()").unwrap().as_i64().is_some());
    assert!(Arc::strong_count(&token) > 1);

    session.close();
    assert_eq!(Arc::strong_count(&token), 1);
}

#[test]
fn test_functions_survive_later_programs() {
    let session = session_with("h", HostFunction::variadic("h", |_| Ok(Value::from(7))));
    session.exec("def f():\n    return h() + 1\n").unwrap();
    session.exec("x = 1").unwrap();
    session.exec("y = f()").unwrap();
    assert_eq!(session.get("y").unwrap(), Value::from(8));

    // A failed program takes its functions with it.
    session.exec("def k():\n    return 2\n\nboom = 1 // 0\n").unwrap_err();
    assert!(!session.contains("k"));
    assert_eq!(session.eval("f()").unwrap(), Value::from(8));
}
