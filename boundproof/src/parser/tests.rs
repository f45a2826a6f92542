//! Parser tests for the codec language

use crate::ast::{AssignOp, AssocOp, BinaryOp, Expr, Lexeme, Stmt, TypeExpr, UnaryOp};
use crate::lexer::tokenize;
use crate::parser::{apply, parse, parse_expr};

/// Helper to parse a program and return the AST
fn parse_program(source: &str) -> crate::Result<crate::ast::Program> {
    let tokens = tokenize(source)?;
    parse("test.bp", source, tokens)
}

/// Helper to parse and expect success
fn parse_ok(source: &str) -> crate::ast::Program {
    parse_program(source).expect("Parse should succeed")
}

/// Helper to check if parsing fails
fn parse_fails(source: &str) -> bool {
    parse_program(source).is_err()
}

// ============================================
// Expression round trips
// ============================================

#[test]
fn test_render_round_trip() {
    let cases = [
        "1",
        "x",
        "f()",
        "f(a:i)",
        "f(a:i, b:j)",
        "f(a:i, b:j) + 1",
        "f(a:i, b:j)(c:k)",
        "f(a:i, b:j)(c:k, d:l, e:m + 2) + 3",
        "x[i]",
        "x[i][j]",
        "x[i:j]",
        "x[i](arg:j)",
        "x(arg:i)[j]",
        "x.y",
        "x.y.z.a",
        "+x",
        "-(x + y)",
        "not x",
        "not not x",
        "+++-x",
        "x + 42",
        "x and (y < z)",
        "x & (y as u8)",
        "x * ((a / b) - (i / j))",
        "x + y + z",
        "x + (i * j.k[l] * (-m << 4) * (n & o(o0:p, o1:q[:r.s + 5]))) + z",
        "x as bool",
        "x as u32",
        "x as T",
        "x as T[i..]",
        "x as T[..j]",
        "x as T[i..j]",
        "x as pkg.T",
        "x as ptr T",
        "x as [4] T",
        "x as [8 + (2 * N)] ptr [4] ptr pkg.T[i..j]",
    ];
    for case in cases {
        let expr = parse_expr(case).unwrap_or_else(|e| panic!("parse_expr({case:?}): {e}"));
        assert_eq!(expr.to_string(), case);
    }
}

#[test]
fn test_redundant_parens_are_dropped() {
    let expr = parse_expr("((x)) + (y)").unwrap();
    assert_eq!(expr.to_string(), "x + y");
}

// ============================================
// Operator forms
// ============================================

#[test]
fn test_parse_plus_forms_by_arity() {
    let unary = parse_expr("+x").unwrap();
    assert!(matches!(unary.as_ref(), Expr::Unary { op: UnaryOp::Plus, .. }));

    let binary = parse_expr("x + y").unwrap();
    assert!(matches!(binary.as_ref(), Expr::Binary { op: BinaryOp::Add, .. }));

    let assoc = parse_expr("x + y + z").unwrap();
    if let Expr::Associative { op: AssocOp::Add, args } = assoc.as_ref() {
        assert_eq!(args.len(), 3);
    } else {
        panic!("Expected Associative");
    }
}

#[test]
fn test_parse_and_chain() {
    let e = parse_expr("(0 <= i) and (i < n) and (n <= 10)").unwrap();
    assert!(matches!(e.as_ref(), Expr::Associative { op: AssocOp::And, .. }));
    assert_eq!(e.conjuncts().len(), 3);
}

#[test]
fn test_operator_without_form_is_a_user_error() {
    let err = apply(Lexeme::Star, vec![Expr::ident("x")]).unwrap_err();
    match err {
        lalrpop_util::ParseError::User { error } => {
            assert_eq!(error, "`Star` takes no 1-operand form");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_parse_rejects_mixed_operators() {
    assert!(parse_expr("x + y * z").is_err());
    assert!(parse_expr("a < b < c").is_err());
    assert!(parse_expr("x - y - z").is_err());
    assert!(parse_expr("x + y - z").is_err());
}

#[test]
fn test_parse_negative_literal() {
    let e = parse_expr("-5").unwrap();
    assert_eq!(e.const_value(), Some(-5));
}

#[test]
fn test_parse_hex_literal() {
    let e = parse_expr("x & 0xFF").unwrap();
    assert_eq!(e.to_string(), "x & 255");
}

#[test]
fn test_parse_refined_cast() {
    let e = parse_expr("x as u32[..100]").unwrap();
    match e.as_ref() {
        Expr::Cast { ty, .. } => assert_eq!(ty.range(), Some((0, 100))),
        other => panic!("Expected Cast, got {other:?}"),
    }
}

// ============================================
// Functions
// ============================================

#[test]
fn test_parse_function_signature() {
    let prog = parse_ok(
        "func get(buf [16] u8, i u32) u8
            pre i < 16
            post ret <= 255
        {
            return buf[i];
        }",
    );
    assert_eq!(prog.funcs.len(), 1);
    let f = &prog.funcs[0];
    assert_eq!(f.name.node, "get");
    assert_eq!(f.params.len(), 2);
    assert_eq!(f.params[0].ty.array_len(), Some(16));
    assert_eq!(f.pre.len(), 1);
    assert_eq!(f.post.len(), 1);
    assert!(matches!(&f.body[0].node, Stmt::Return(Some(_))));
}

#[test]
fn test_parse_multiple_contract_clauses() {
    let prog = parse_ok(
        "func f(a u32, b u32)
            pre a < 10, b < 10
            pre a < b
        {
        }",
    );
    let f = &prog.funcs[0];
    assert_eq!(f.pre.len(), 3);
    assert!(f.post.is_empty());
    assert!(f.ret_ty.is_none());
}

#[test]
fn test_parse_contract_spans() {
    let source = "func f(a u32) pre a < 10 { }";
    let prog = parse_ok(source);
    let span = prog.funcs[0].pre[0].span;
    assert_eq!(&source[span.start..span.end], "a < 10");
}

#[test]
fn test_parse_slice_param() {
    let prog = parse_ok("func f(s [] u8, p ptr [4] u8) { }");
    let f = &prog.funcs[0];
    assert!(matches!(f.params[0].ty.as_ref(), TypeExpr::Slice(_)));
    assert!(matches!(f.params[1].ty.as_ref(), TypeExpr::Ptr(_)));
}

// ============================================
// Statements
// ============================================

#[test]
fn test_parse_var_and_assign() {
    let prog = parse_ok(
        "func f() {
            var x u32 = 3;
            var y u8;
            x += 1;
            x = y as u32;
        }",
    );
    let body = &prog.funcs[0].body;
    assert_eq!(body.len(), 4);
    assert!(matches!(&body[0].node, Stmt::Var { value: Some(_), .. }));
    assert!(matches!(&body[1].node, Stmt::Var { value: None, .. }));
    assert!(matches!(
        &body[2].node,
        Stmt::Assign {
            op: AssignOp::AddAssign,
            ..
        }
    ));
    assert!(matches!(
        &body[3].node,
        Stmt::Assign {
            op: AssignOp::Assign,
            ..
        }
    ));
}

#[test]
fn test_parse_assign_to_element() {
    let prog = parse_ok("func f(a [4] u8) { a[0] = 1; }");
    match &prog.funcs[0].body[0].node {
        Stmt::Assign { target, .. } => assert_eq!(target.root_var(), Some("a")),
        other => panic!("Expected Assign, got {other:?}"),
    }
}

#[test]
fn test_parse_assert_via_reason() {
    let prog = parse_ok(
        r#"func f(a u32, b u32, c u32) {
            assert a < b via "a < b: a < c; c <= b"(c: c);
            assert a <= a;
        }"#,
    );
    let body = &prog.funcs[0].body;
    match &body[0].node {
        Stmt::Assert {
            reason: Some(reason),
            ..
        } => {
            assert_eq!(reason.name.node, "a < b: a < c; c <= b");
            assert_eq!(reason.args.len(), 1);
            assert_eq!(reason.args[0].name, "c");
        }
        other => panic!("Expected Assert with reason, got {other:?}"),
    }
    assert!(matches!(&body[1].node, Stmt::Assert { reason: None, .. }));
}

#[test]
fn test_parse_reason_without_args() {
    let prog = parse_ok(r#"func f(a u32, b u32) { assert a < b via "a < b: b > a"; }"#);
    match &prog.funcs[0].body[0].node {
        Stmt::Assert {
            reason: Some(reason),
            ..
        } => assert!(reason.args.is_empty()),
        other => panic!("Expected Assert, got {other:?}"),
    }
}

#[test]
fn test_parse_if_else_chain() {
    let prog = parse_ok(
        "func f(x u32) {
            if x < 10 {
                return;
            } else if x < 20 {
                x = 1;
            } else {
                x = 2;
            }
        }",
    );
    match &prog.funcs[0].body[0].node {
        Stmt::If {
            else_body: Some(else_body),
            ..
        } => {
            assert_eq!(else_body.len(), 1);
            assert!(matches!(
                &else_body[0].node,
                Stmt::If {
                    else_body: Some(_),
                    ..
                }
            ));
        }
        other => panic!("Expected If, got {other:?}"),
    }
}

#[test]
fn test_parse_while_with_invariants() {
    let prog = parse_ok(
        "func f(n u32) {
            var i u32 = 0;
            while i < n, inv i <= n, inv 0 <= i {
                i += 1;
            }
        }",
    );
    match &prog.funcs[0].body[1].node {
        Stmt::While {
            invariants, body, ..
        } => {
            assert_eq!(invariants.len(), 2);
            assert_eq!(body.len(), 1);
        }
        other => panic!("Expected While, got {other:?}"),
    }
}

#[test]
fn test_parse_errors() {
    assert!(parse_fails("func f( {"));
    assert!(parse_fails("func f() { var x; }"));
    assert!(parse_fails("func f() { x = ; }"));
    assert!(parse_fails("func f() { assert x via; }"));
}

#[test]
fn test_parse_error_span_points_at_token() {
    let source = "func f() { return ) ; }";
    let err = parse_program(source).unwrap_err();
    let span = err.span().unwrap();
    assert_eq!(&source[span.start..span.end], ")");
}
