mod common;

use std::time::{Duration, Instant};

use indoc::indoc;
use pretty_assertions::assert_eq;
use starbridge_core::{Error, EvalOptions, Evaluated, ExecOptions, Session, Value};

use common::Lines;

const SPIN: &str = indoc! {"
    def spin():
        for i in range(1 << 60):
            pass

    print('started')
    spin()
    unreachable = True
"};

fn with_timeout(seconds: f64) -> ExecOptions {
    ExecOptions {
        timeout: Some(Duration::from_secs_f64(seconds)),
        ..ExecOptions::default()
    }
}

#[test]
fn test_infinite_loop_times_out() {
    common::init_test_logging();
    let lines = Lines::default();
    let session = Session::builder().print(lines.sink()).build().unwrap();

    let started = Instant::now();
    let err = session.exec_with(SPIN, with_timeout(0.5)).unwrap_err();
    let elapsed = started.elapsed();

    let Error::EvalTimeout(eval) = &err else {
        panic!("expected a timeout, got {:?}", err);
    };
    assert!(err.message().contains("timed out"), "{}", err.message());
    assert_eq!(eval.message, "Starlark computation cancelled: timed out");
    assert_eq!(eval.error_type, "EvalTimeoutError");
    assert_eq!(err.error_type(), "EvalTimeoutError");
    assert!(err.as_eval_error().is_some());
    assert_eq!(eval.function_name.as_deref(), Some("spin"));

    assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2500), "{:?}", elapsed);

    // Output produced before the timeout stands; bindings do not.
    assert_eq!(lines.take(), vec!["started"]);
    assert!(!session.contains("spin"));
    assert!(!session.contains("unreachable"));
}

#[test]
fn test_session_is_usable_after_timeout() {
    let session = Session::new();
    session.set([("x", 1)]).unwrap();
    let err = session.exec_with(SPIN, with_timeout(0.2)).unwrap_err();
    assert!(err.is_timeout());

    session.exec_with("y = x + 1", with_timeout(5.0)).unwrap();
    assert_eq!(session.get("y").unwrap(), Value::from(2));
}

#[test]
fn test_eval_times_out() {
    let session = Session::new();
    session
        .exec("def spin():\n    for i in range(1 << 60):\n        pass\n")
        .unwrap();
    let err = session
        .eval_with(
            "spin()",
            EvalOptions {
                timeout: Some(Duration::from_millis(200)),
                ..EvalOptions::default()
            },
        )
        .unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_fast_program_beats_its_timeout() {
    let session = Session::new();
    session.exec_with("x = 6 * 7", with_timeout(5.0)).unwrap();
    assert_eq!(session.get("x").unwrap(), Value::from(42));

    let err = session.exec_with("y = 1 // 0", with_timeout(5.0)).unwrap_err();
    assert_eq!(err.error_type(), "EvalError");
}

#[test]
fn test_zero_timeout_is_no_timeout() {
    let session = Session::new();
    let src = indoc! {"
        def total(n):
            t = 0
            for i in range(n):
                t += i
            return t

        x = total(1000)
    "};
    session.exec_with(src, with_timeout(0.0)).unwrap();
    assert_eq!(session.get("x").unwrap(), Value::from(499500));

    let value = session
        .eval_with(
            "total(10)",
            EvalOptions {
                timeout: Some(Duration::ZERO),
                ..EvalOptions::default()
            },
        )
        .unwrap();
    assert_eq!(value, Evaluated::Value(Value::from(45)));
}

#[test]
fn test_timeouts_are_independent_across_sessions() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let session = Session::new();
                session.exec_with(SPIN, with_timeout(0.2)).unwrap_err()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_timeout());
    }
}
