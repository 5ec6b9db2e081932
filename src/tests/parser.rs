use crate::diagnostic::ParseError;
use crate::parser::produce_events;
use crate::tests::test_utils::{EventLog, dump, events, init_logger};

fn parse_error(source: &str) -> ParseError {
    init_logger();
    let mut log = EventLog::default();
    match produce_events(source.as_bytes(), &mut log) {
        Ok(()) => panic!("expected {source:?} to be rejected"),
        Err(e) => e,
    }
}

fn unsupported(source: &str) -> String {
    match parse_error(source) {
        ParseError::Unsupported { construct, .. } => construct,
        other => panic!("expected an unsupported construct, got {other}"),
    }
}

#[test]
fn test_function_event_stream() {
    insta::assert_snapshot!(events("int f(int *p){ return *p; }"), @r"
    Type@3 int
    DirectDeclarator@5 f
    Type@9 int
    Pointer@11 *
    DirectDeclarator@12 p
    FunctionHeader@13
    ScopeStart@14
    UnaryOperator@23 *
    Identifier@24 p
    Return@25
    ScopeEnd@27
    FunctionEnd@27
    TranslationUnitEnd@27
    ");
}

#[test]
fn test_unbraced_body_gets_implicit_scope() {
    insta::assert_snapshot!(events("void f(int x){ if (x) g(); }"), @r"
    Type@4 void
    DirectDeclarator@6 f
    Type@10 int
    DirectDeclarator@12 x
    FunctionHeader@13
    ScopeStart@14
    IfHeader@17
    Identifier@20 x
    IfCondition@21
    ImplicitScopeStart@21
    Identifier@23 g
    PostfixCall@25 0
    StatementEnd@26
    ImplicitScopeEnd@26
    IfEnd@26
    ScopeEnd@28
    FunctionEnd@28
    TranslationUnitEnd@28
    ");
}

#[test]
fn test_defer_events() {
    insta::assert_snapshot!(events("void f(void){ defer free(p); }"), @r"
    Type@4 void
    DirectDeclarator@6 f
    FunctionHeader@12
    ScopeStart@13
    DeferHeader@19
    Identifier@24 free
    Identifier@26 p
    PostfixCall@27 1
    Defer@28
    ScopeEnd@30
    FunctionEnd@30
    TranslationUnitEnd@30
    ");
}

#[test]
fn test_top_level_declarations_are_skipped() {
    let source = "typedef unsigned long u64;\nstruct s { int a; };\nstatic int g;\nu64 f(u64 x){ return x; }\n";
    insta::assert_snapshot!(dump(source), @r"
    TranslationUnit
      Function f -> u64 (u64 x)
        Return
          Identifier x
    ");
}

#[test]
fn test_comments_and_directives_are_skipped() {
    let source = "#include <stdio.h>\n// entry\nint main(void){ /* nothing */ return 0; }\n";
    insta::assert_snapshot!(dump(source), @r"
    TranslationUnit
      Function main -> int ()
        Return
          Constant 0
    ");
}

#[test]
fn test_adjacent_strings_form_one_constant() {
    let log = events(r#"void f(void){ puts("a" "b"); }"#);
    assert!(log.contains(r#"Constant@26 "a" "b""#), "{log}");
}

#[test]
fn test_casts_and_sizeof() {
    insta::assert_snapshot!(dump("void f(void){ n = (long)sizeof(int) + sizeof x; }"), @r"
    TranslationUnit
      Function f -> void ()
        BinaryOp =
          Identifier n
          BinaryOp +
            UnaryOp (long)
              Constant sizeof(int)
            UnaryOp sizeof
              Identifier x
    ");
}

#[test]
fn test_unsupported_statements() {
    assert_eq!(unsupported("void f(void){ goto out; }"), "goto");
    assert_eq!(unsupported("void f(void){ out: ; }"), "label");
    assert_eq!(unsupported("void f(int x){ switch (x) case 1: break; }"), "switch body without braces");
    assert_eq!(unsupported("void f(void){ typedef int T; }"), "block-scope typedef");
}

#[test]
fn test_unsupported_declarations() {
    assert_eq!(unsupported("void f(void){ int a[2] = { [0] = 1 }; }"), "designated initializer");
    assert_eq!(unsupported("void f(void){ int (*fp)(void); }"), "function pointer declarator");
    assert_eq!(unsupported("void f(void){ struct s { int a; } v; }"), "tag definition inside a function");
}

#[test]
fn test_parenthesized_deferred_expression() {
    let construct = "parenthesized deferred expression";
    assert_eq!(unsupported("void f(void){ defer (a)(); }"), construct);
    assert_eq!(unsupported("void f(void){ defer a + (b); }"), construct);
    assert_eq!(events("void f(void){ defer g((a)); }").lines().last(), Some("TranslationUnitEnd@29"));
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(
        parse_error("void f(void){ return 1 }"),
        ParseError::UnexpectedToken { .. }
    ));
    assert!(matches!(parse_error("void f(void){ a(); "), ParseError::UnexpectedEof { .. }));
    assert!(matches!(parse_error("void f(void){ puts(\"a); }"), ParseError::Lexical { .. }));
}
