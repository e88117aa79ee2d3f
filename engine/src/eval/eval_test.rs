use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::dialect::Dialect;
use crate::error::{CallFrame, Error};
use crate::syntax::Pos;
use crate::thread::Thread;
use crate::value::Value;

use super::{Globals, eval, exec_file, exec_module};

fn permissive() -> Dialect {
    Dialect {
        allow_set: true,
        allow_global_reassign: true,
        allow_recursion: true,
    }
}

fn eval_with(dialect: Dialect, src: &str) -> Result<Value, Error> {
    eval(&mut Thread::new(dialect), "<expr>", src, &Globals::new())
}

fn repr(src: &str) -> String {
    match eval_with(Dialect::default(), src) {
        Ok(value) => value.repr(),
        Err(err) => panic!("{} failed: {}", src, err),
    }
}

fn eval_error(src: &str) -> String {
    match eval_with(Dialect::default(), src) {
        Ok(value) => panic!("{} unexpectedly gave {}", src, value.repr()),
        Err(err) => err.to_string(),
    }
}

fn exec(dialect: Dialect, src: &str) -> Result<Globals, Error> {
    exec_file(&mut Thread::new(dialect), "test.star", src, &Globals::new())
}

fn resolve_messages(dialect: Dialect, src: &str) -> Vec<(Pos, String)> {
    match exec(dialect, src) {
        Err(Error::Resolve(list)) => list.errors.into_iter().map(|e| (e.pos, e.msg)).collect(),
        Err(other) => panic!("expected resolve errors, got {}", other),
        Ok(_) => panic!("expected resolve errors, program ran"),
    }
}

#[test]
fn test_arithmetic() {
    assert_eq!(repr("1 + 2 * 3"), "7");
    assert_eq!(repr("7 // 2"), "3");
    assert_eq!(repr("-7 // 2"), "-4");
    assert_eq!(repr("-7 % 3"), "2");
    assert_eq!(repr("7 % -3"), "-2");
    assert_eq!(repr("7.0 / 2"), "3.5");
    assert_eq!(repr("1 / 4"), "0.25");
    assert_eq!(repr("-7.5 // 2"), "-4.0");
    assert_eq!(repr("1 << 70"), "1180591620717411303424");
    assert_eq!(repr("-1 >> 100"), "-1");
    assert_eq!(repr("6 & 3 | 8 ^ 1"), "11");
    assert_eq!(repr("~5"), "-6");
    assert_eq!(repr("2 == 2.0"), "True");
    assert_eq!(repr("1 == True"), "False");
}

#[test]
fn test_arithmetic_errors() {
    assert_eq!(eval_error("1 // 0"), "integer division by zero");
    assert_eq!(eval_error("1 % 0"), "integer modulo by zero");
    assert_eq!(eval_error("1 / 0"), "floating-point division by zero");
    assert_eq!(eval_error("1 + 'a'"), "unknown binary op: int + string");
    assert_eq!(eval_error("-'a'"), "unknown unary op: -string");
    assert_eq!(eval_error("1 << -1"), "negative shift count");
    assert_eq!(eval_error("'a' < 1"), "unknown binary op: string < int");
}

#[test]
fn test_nan_comparisons() {
    assert_eq!(repr("float('nan') < 1.0"), "False");
    assert_eq!(repr("float('nan') == float('nan')"), "False");
    assert_eq!(repr("sorted([float('nan'), 1.0, -1.0])"), "[-1.0, 1.0, nan]");
}

#[test]
fn test_sequences() {
    assert_eq!(repr("'ab' + 'cd'"), "\"abcd\"");
    assert_eq!(repr("[1] * 3"), "[1, 1, 1]");
    assert_eq!(repr("2 * (1, 2)"), "(1, 2, 1, 2)");
    assert_eq!(repr("'ab' * 2"), "\"abab\"");
    assert_eq!(repr("b'ab' + b'c'"), "b\"abc\"");
    assert_eq!(repr("[1, 2, 3, 4][::-1]"), "[4, 3, 2, 1]");
    assert_eq!(repr("'hello'[1:3]"), "\"el\"");
    assert_eq!(repr("'héllo'[1]"), "\"é\"");
    assert_eq!(repr("'héllo'[-4]"), "\"é\"");
    assert_eq!(repr("'héllo'[:2]"), "\"hé\"");
    assert_eq!(repr("'héllo'[::-1]"), "\"olléh\"");
    assert_eq!(repr("(1, 2, 3)[-1]"), "3");
    assert_eq!(repr("range(10)[2:8:2]"), "range(2, 8, 2)");
    assert_eq!(repr("{'a': 1} | {'b': 2}"), "{\"a\": 1, \"b\": 2}");
    assert_eq!(repr("2 in [1, 2]"), "True");
    assert_eq!(repr("'ell' in 'hello'"), "True");
    assert_eq!(repr("'z' not in {'a': 1}"), "True");
    assert_eq!(repr("3 in range(0, 10, 3)"), "True");
}

#[test]
fn test_huge_ranges_stay_lazy() {
    assert_eq!(
        repr("range(-9223372036854775807, 9223372036854775807, 4611686018427387904)[3]"),
        "4611686018427387905"
    );
    assert_eq!(repr("range(1 << 60)[::2]"), "range(0, 1152921504606846976, 2)");
    assert_eq!(repr("len(range(1 << 60))"), "1152921504606846976");
    assert_eq!(repr("(1 << 59) in range(1 << 60)"), "True");
    assert_eq!(repr("-1 in range(1 << 60)"), "False");
    assert_eq!(
        repr("len(range(-9223372036854775807, 9223372036854775807, 4611686018427387904)[1::4])"),
        "1"
    );
    assert_eq!(
        eval_error("range(-9223372036854775807, 9223372036854775807, 4611686018427387904)[::2]"),
        "range slice step out of range"
    );
}

#[test]
fn test_sequence_errors() {
    assert_eq!(eval_error("[1][5]"), "index 5 out of range [-1:1]");
    assert_eq!(eval_error("{}['a']"), "key \"a\" not in dict");
    assert_eq!(eval_error("[1][::0]"), "zero is not a valid slice step");
    assert_eq!(eval_error("{[]: 1}"), "unhashable type: list");
    assert_eq!(eval_error("{1: 1, 1: 2}"), "duplicate key: 1");
    assert_eq!(eval_error("(1, 2).x"), "tuple has no .x field or method");
}

#[test]
fn test_percent_format() {
    assert_eq!(repr("'%s=%d' % ('a', 3)"), "\"a=3\"");
    assert_eq!(repr("'%r' % 'x'"), "\"\\\"x\\\"\"");
    assert_eq!(repr("'%x %o %%' % (255, 8)"), "\"ff 10 %\"");
    assert_eq!(repr("'%(k)s' % {'k': 1}"), "\"1\"");
    assert_eq!(repr("'%d' % -2.5"), "\"-2\"");
    assert_eq!(repr("'%d' % -1e20"), "\"-100000000000000000000\"");
    assert_eq!(
        repr("'%d' % 1e300"),
        "\"1000000000000000052504760255204420248704468581108159154915854115511802457988908195786371375080447864043704443832883878176942523235360430575644792184786706982848387200926575803737830233794788090059368953234970799945081119038967640880074652742780142494579258788820056842838115669472196386865459400540160\""
    );
    assert_eq!(
        eval_error("'%s %s' % (1,)"),
        "not enough arguments for format string"
    );
    assert_eq!(eval_error("'%s' % (1, 2)"), "too many arguments for format string");
    assert_eq!(eval_error("'%q' % 1"), "unsupported format character 'q'");
}

#[test]
fn test_comprehensions() {
    assert_eq!(repr("[x * x for x in range(4) if x % 2 == 0]"), "[0, 4]");
    assert_eq!(
        repr("[(x, y) for x in [1, 2] for y in 'a b'.split()]"),
        "[(1, \"a\"), (1, \"b\"), (2, \"a\"), (2, \"b\")]"
    );
    assert_eq!(repr("{k: v for k, v in [('a', 1), ('b', 2)]}"), "{\"a\": 1, \"b\": 2}");
}

#[test]
fn test_exec_globals_and_functions() {
    let src = indoc! {"
        def add(a, b = 10, *rest, **named):
            return a + b + len(rest) + len(named)

        def make_counter():
            counts = [0]
            def incr():
                counts[0] += 1
                return counts[0]
            return incr

        counter = make_counter()
        first = counter()
        second = counter()
        total = add(1)
        spread = add(1, 2, 3, 4, x = 5)
        squares = {n: n * n for n in range(3)}
    "};
    let globals = exec(Dialect::default(), src).unwrap();
    assert_eq!(globals["first"].repr(), "1");
    assert_eq!(globals["second"].repr(), "2");
    assert_eq!(globals["total"].repr(), "11");
    assert_eq!(globals["spread"].repr(), "6");
    assert_eq!(globals["squares"].repr(), "{0: 0, 1: 1, 2: 4}");
    assert_eq!(globals["add"].repr(), "<function add>");
}

#[test]
fn test_argument_errors() {
    let cases = [
        ("f(1, 2, 3)", "function f accepts at most 2 positional arguments (3 given)"),
        ("f()", "function f missing 1 argument (a)"),
        ("f(1, c = 2)", "function f got an unexpected keyword argument c"),
        ("f(1, a = 2)", "function f got multiple values for parameter a"),
    ];
    for (call, expected) in cases {
        let src = format!("def f(a, b = 1):\n    return a\n\nf_result = {}\n", call);
        let err = exec(Dialect::default(), &src).unwrap_err();
        assert_eq!(err.to_string(), expected, "for {}", call);
    }
}

#[test]
fn test_control_flow_in_functions() {
    let src = indoc! {"
        def classify(xs):
            out = []
            for x in xs:
                if x < 0:
                    continue
                elif x > 10:
                    break
                else:
                    out.append(x)
            return out

        result = classify([1, -2, 3, 20, 4])
    "};
    let globals = exec(Dialect::default(), src).unwrap();
    assert_eq!(globals["result"].repr(), "[1, 3]");
}

#[test]
fn test_while_and_recursion_with_permissive_dialect() {
    let src = indoc! {"
        def fact(n):
            return 1 if n <= 1 else n * fact(n - 1)

        i = 0
        while i < 3:
            i += 1
        result = fact(20)
    "};
    let globals = exec(permissive(), src).unwrap();
    assert_eq!(globals["i"].repr(), "3");
    assert_eq!(globals["result"].repr(), "2432902008176640000");
}

#[test]
fn test_recursion_rejected_by_default() {
    let src = indoc! {"
        def f(n):
            return f(n - 1) if n > 0 else 0

        x = f(3)
    "};
    let err = exec(Dialect::default(), src).unwrap_err();
    assert_eq!(err.to_string(), "function f called recursively");
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let src = "def f():\n    return f()\n\nx = f()\n";
    let err = std::thread::Builder::new()
        .stack_size(64 << 20)
        .spawn(move || exec(permissive(), src).unwrap_err())
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(err.to_string(), "call stack exceeds maximum depth of 200");
}

#[test]
fn test_resolve_errors_are_collected_in_order() {
    let errors = resolve_messages(Dialect::default(), "x = a(1) + b(1)\n");
    assert_eq!(
        errors,
        vec![
            (Pos::new(1, 5), "undefined: a".to_string()),
            (Pos::new(1, 12), "undefined: b".to_string()),
        ]
    );

    let err = eval_with(Dialect::default(), "a(1) + b(1)").unwrap_err();
    assert_eq!(err.to_string(), "<expr>:1:1: undefined: a (and 1 more)");
}

#[test]
fn test_dialect_restrictions() {
    let src = indoc! {"
        x = 1
        x = 2
        if x:
            pass
        for y in []:
            pass
        s = set()
    "};
    let errors = resolve_messages(Dialect::default(), src);
    let messages: Vec<&str> = errors.iter().map(|(_, msg)| msg.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "cannot reassign global x declared at test.star:1:1",
            "if statement not within a function",
            "for loop not within a function",
            "this Starlark dialect does not support sets",
        ]
    );
    assert!(exec(permissive(), src).is_ok());

    let errors = resolve_messages(Dialect::default(), "def f():\n    while True:\n        break\n");
    assert_eq!(
        errors,
        vec![(Pos::new(2, 5), "this Starlark dialect does not support while loops".to_string())]
    );
}

#[test]
fn test_misplaced_statements() {
    let errors = resolve_messages(permissive(), "return 1\nbreak\n");
    let messages: Vec<&str> = errors.iter().map(|(_, msg)| msg.as_str()).collect();
    assert_eq!(
        messages,
        vec!["return statement not within a function", "break not in a loop"]
    );
}

#[test]
fn test_referenced_before_assignment() {
    let src = "def f():\n    y = x\n    x = 1\n\nz = f()\n";
    let err = exec(Dialect::default(), src).unwrap_err();
    assert_eq!(err.to_string(), "local variable x referenced before assignment");
}

#[test]
fn test_predeclared_names_are_visible_and_untouched() {
    let mut predeclared = Globals::new();
    predeclared.insert("base".to_string(), Value::int(40));
    let mut thread = Thread::new(Dialect::default());
    let globals = exec_file(&mut thread, "p.star", "answer = base + 2\n", &predeclared).unwrap();
    assert_eq!(globals.len(), 1);
    assert_eq!(globals["answer"].repr(), "42");
}

#[test]
fn test_functions_need_their_module() {
    let src = "def f():\n    return 1\n";
    let mut thread = Thread::new(Dialect::default());
    let module = exec_module(&mut thread, "m.star", src, &Globals::new()).unwrap();
    assert!(module.is_referenced());

    let globals = module.globals();
    let value = eval(&mut thread, "<expr>", "f()", &globals).unwrap();
    assert_eq!(value.repr(), "1");

    drop(module);
    let err = eval(&mut thread, "<expr>", "f()", &globals).unwrap_err();
    assert_eq!(err.to_string(), "function f outlived the module that defined it");
}

#[test]
fn test_dropping_a_module_releases_captured_scopes() {
    let src = indoc! {"
        def make():
            items = [1, 2]
            def inner():
                return items
            return inner

        g = make()
    "};
    let mut thread = Thread::new(Dialect::default());
    let module = exec_module(&mut thread, "m.star", src, &Globals::new()).unwrap();
    let Value::Function(g) = module.globals()["g"].clone() else {
        panic!("expected a function");
    };
    let vars = g.enclosing[0].vars.clone();
    assert_eq!(vars.lock().len(), 2);

    drop(module);
    assert!(vars.lock().is_empty());
}

#[test]
fn test_backtrace_names_every_frame() {
    let src = indoc! {"
        def inner():
            return 1 // 0

        def outer():
            return inner()

        x = outer()
    "};
    let Err(Error::Eval(err)) = exec(Dialect::default(), src) else {
        panic!("expected an evaluation error");
    };
    assert_eq!(err.msg, "integer division by zero");
    assert_eq!(
        err.call_stack,
        vec![
            CallFrame {
                name: "<toplevel>".to_string(),
                location: Some(("test.star".to_string(), Pos::new(7, 10))),
            },
            CallFrame {
                name: "outer".to_string(),
                location: Some(("test.star".to_string(), Pos::new(5, 17))),
            },
            CallFrame {
                name: "inner".to_string(),
                location: Some(("test.star".to_string(), Pos::new(2, 14))),
            },
        ]
    );
    assert_eq!(
        err.backtrace(),
        indoc! {"
            Traceback (most recent call last):
              test.star:7:10: in <toplevel>
              test.star:5:17: in outer
              test.star:2:14: in inner
            Error: integer division by zero"}
    );
}

#[test]
fn test_builtin_frames_have_no_location() {
    let Err(Error::Eval(err)) = exec(Dialect::default(), "x = len(1)\n") else {
        panic!("expected an evaluation error");
    };
    assert_eq!(err.msg, "len: value of type int has no len");
    assert_eq!(
        err.innermost(),
        Some(&CallFrame {
            name: "len".to_string(),
            location: None,
        })
    );
}

#[test]
fn test_cancelled_thread_stops() {
    let mut thread = Thread::new(permissive());
    thread.cancel_handle().cancel("timed out");
    let err = exec_file(&mut thread, "loop.star", "while True:\n    pass\n", &Globals::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Starlark computation cancelled: timed out");
}

#[test]
fn test_cancel_from_another_thread() {
    let mut thread = Thread::new(permissive());
    let handle = thread.cancel_handle();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        handle.cancel("stop");
    });
    let err = exec_file(&mut thread, "loop.star", "while True:\n    pass\n", &Globals::new())
        .unwrap_err();
    canceller.join().unwrap();
    assert_eq!(err.to_string(), "Starlark computation cancelled: stop");
}
