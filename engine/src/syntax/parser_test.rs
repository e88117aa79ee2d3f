use pretty_assertions::assert_eq;

use super::ast::*;
use super::{Pos, parse_expr, parse_file};

// Renders an expression as a fully parenthesized string so that trees can
// be compared without their positions.
fn sexpr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Literal(lit) => format!("{:?}", lit),
        ExprKind::List(items) => format!("[{}]", join(items)),
        ExprKind::Tuple(items) => format!("({},)", join(items)),
        ExprKind::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", sexpr(k), sexpr(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        ExprKind::Unary { op, operand } => format!("({:?} {})", op, sexpr(operand)),
        ExprKind::Binary { op, lhs, rhs } => {
            format!("({} {} {})", sexpr(lhs), op.symbol(), sexpr(rhs))
        }
        ExprKind::Cond {
            cond,
            then,
            otherwise,
        } => format!("({} if {} else {})", sexpr(then), sexpr(cond), sexpr(otherwise)),
        ExprKind::Call { func, args } => format!("{}(<{} args>)", sexpr(func), args.len()),
        ExprKind::Index { target, index } => format!("{}[{}]", sexpr(target), sexpr(index)),
        ExprKind::Slice { target, .. } => format!("{}[:]", sexpr(target)),
        ExprKind::Dot { target, name } => format!("{}.{}", sexpr(target), name),
        ExprKind::ListComp { body, clauses } => format!("[{} <{}>]", sexpr(body), clauses.len()),
        ExprKind::DictComp { key, clauses, .. } => {
            format!("{{{} <{}>}}", sexpr(key), clauses.len())
        }
    }
}

fn join(items: &[Expr]) -> String {
    items.iter().map(sexpr).collect::<Vec<_>>().join(", ")
}

fn ast(source: &str) -> String {
    let expr = parse_expr("<test>", source)
        .unwrap_or_else(|e| panic!("Expression parsing failed: {}\n{}", source, e));
    sexpr(&expr)
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(ast("a + b - c"), ast("(a + b) - c"));
    assert_eq!(ast("a + b * c"), ast("a + (b * c)"));
    assert_eq!(ast("a * b // c % d"), ast("((a * b) // c) % d"));
    assert_eq!(ast("-a * b"), ast("(-a) * b"));
}

#[test]
fn test_bitwise_precedence() {
    assert_eq!(ast("a | b ^ c & d"), ast("a | (b ^ (c & d))"));
    assert_eq!(ast("a & b << c"), ast("a & (b << c)"));
    assert_eq!(ast("a << b + c"), ast("a << (b + c)"));
}

#[test]
fn test_logical_precedence() {
    assert_eq!(ast("a or b and c"), ast("a or (b and c)"));
    assert_eq!(ast("not a == b"), ast("not (a == b)"));
    assert_eq!(ast("a and not b or c"), ast("(a and (not b)) or c"));
    assert_eq!(ast("x if a or b else y"), ast("x if (a or b) else y"));
}

#[test]
fn test_membership() {
    assert_eq!(ast("a not in b"), "(a not in b)");
    assert_eq!(ast("a in b + c"), ast("a in (b + c)"));
}

#[test]
fn test_comparison_does_not_chain() {
    let err = parse_expr("<test>", "a < b < c").unwrap_err();
    assert!(err.msg.contains("does not associate"), "{}", err.msg);
}

#[test]
fn test_literals() {
    assert_eq!(ast("0x1F"), "Int(31)");
    assert_eq!(ast("0o17"), "Int(15)");
    assert_eq!(ast("1.5"), "Float(1.5)");
    assert_eq!(ast("'a\\n'"), "String(\"a\\n\")");
    assert_eq!(ast("r'a\\n'"), "String(\"a\\\\n\")");
    assert_eq!(ast("b'\\xff'"), "Bytes([255])");
    assert_eq!(ast("\"\"\"x\ny\"\"\""), "String(\"x\\ny\")");
}

#[test]
fn test_obsolete_octal_is_rejected() {
    let err = parse_expr("<test>", "017").unwrap_err();
    assert!(err.msg.contains("octal"));
    assert_eq!(ast("00"), "Int(0)");
}

#[test]
fn test_tuples_and_containers() {
    assert_eq!(ast("1, 2"), "(Int(1), Int(2),)");
    assert_eq!(ast("(1,)"), "(Int(1),)");
    assert_eq!(ast("()"), "(,)");
    assert_eq!(ast("[1, 2,]"), "[Int(1), Int(2)]");
    assert_eq!(ast("{'a': 1}"), "{String(\"a\"): Int(1)}");
    assert_eq!(ast("[x for x in y if x]"), "[x <2>]");
    assert_eq!(ast("{k: v for k, v in d}"), "{k <1>}");
}

#[test]
fn test_suffixes() {
    assert_eq!(ast("a.b(1, c=2)[0]"), "a.b(<2 args>)[Int(0)]");
    assert_eq!(ast("x[1:2]"), "x[:]");
    assert_eq!(ast("x[::-1]"), "x[:]");
}

#[test]
fn test_leading_whitespace_in_expression() {
    let err = parse_expr("<expr>", " 7 ").unwrap_err();
    assert_eq!(err.pos, Pos::new(1, 2));
    assert_eq!(err.filename, "<expr>");
}

#[test]
fn test_parse_file_statements() {
    let module = parse_file(
        "<test>",
        "x = 1\n\
         def f(a, b=2, *args, **kwargs):\n\
         \x20   if a:\n\
         \x20       return b\n\
         \x20   for i in args:\n\
         \x20       y = i\n\
         \x20   return None\n\
         x += 1; pass\n",
    )
    .unwrap();
    assert_eq!(module.stmts.len(), 4);

    let StmtKind::Def(def) = &module.stmts[1].kind else {
        panic!("expected def, got {:?}", module.stmts[1].kind);
    };
    assert_eq!(def.name, "f");
    assert_eq!(def.pos, Pos::new(2, 5));
    assert_eq!(def.params.len(), 4);
    let locals: Vec<&str> = def.locals.iter().map(String::as_str).collect();
    assert_eq!(locals, vec!["a", "args", "b", "i", "kwargs", "y"]);

    assert!(matches!(module.stmts[2].kind, StmtKind::AugAssign { .. }));
    assert!(matches!(module.stmts[3].kind, StmtKind::Pass));
}

#[test]
fn test_elif_chain() {
    let module = parse_file(
        "<test>",
        "if a:\n  x = 1\nelif b:\n  x = 2\nelse:\n  x = 3\n",
    )
    .unwrap();
    let StmtKind::If { otherwise, .. } = &module.stmts[0].kind else {
        panic!("expected if");
    };
    assert_eq!(otherwise.len(), 1);
    assert!(matches!(otherwise[0].kind, StmtKind::If { .. }));
}

#[test]
fn test_newlines_inside_brackets_are_ignored() {
    let module = parse_file("<test>", "x = [\n    1,\n    2,\n]\ny = 3\n").unwrap();
    assert_eq!(module.stmts.len(), 2);
}

#[test]
fn test_comments_and_blank_lines() {
    let module = parse_file("<test>", "# header\n\nx = 1  # trailing\n\n\n").unwrap();
    assert_eq!(module.stmts.len(), 1);
}

#[test]
fn test_bad_unindent() {
    let err = parse_file("<test>", "def f():\n    x = 1\n  y = 2\n").unwrap_err();
    assert_eq!(err.msg, "unindent does not match any outer indentation level");
    assert_eq!(err.pos.line, 3);
}

#[test]
fn test_invalid_assignment_target() {
    let err = parse_file("<test>", "f() = 1\n").unwrap_err();
    assert!(err.msg.contains("can't assign"));
}

#[test]
fn test_unterminated_string() {
    let err = parse_file("<test>", "x = 'abc\n").unwrap_err();
    assert_eq!(err.msg, "unterminated string literal");
    assert_eq!(err.pos, Pos::new(1, 5));
}

#[test]
fn test_syntax_error_display() {
    let err = parse_file("a.star", "x = )\n").unwrap_err();
    assert_eq!(err.to_string(), format!("a.star:1:5: {}", err.msg));
}
