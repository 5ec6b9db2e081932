use crate::ast::dumper::AstDumper;
use crate::ast::{NodeKind, NodeTag};
use crate::diagnostic::ProtocolError;
use crate::semantic::{BuilderMode, SemanticBuilder, SyntaxChunkType as E};
use crate::tests::test_utils::{build, dump, feed};

#[test]
fn test_declarations_and_return() {
    insta::assert_snapshot!(dump("int main(void){ int x = 5, *p; return x; }"), @r"
    TranslationUnit
      Function main -> int ()
        BinaryOp =
          Declaration int x
          Constant 5
        Declaration int* p
        Return
          Identifier x
    ");
}

#[test]
fn test_statement_spans_tile_the_body() {
    let ast = build(r#"void f(void){ defer close(fp); printf("a\n"); }"#);
    insta::assert_snapshot!(AstDumper::new().with_spans().dump(&ast), @r#"
    TranslationUnit [0..47)
      Function f -> void () [0..47)
        Defer [13..30)
          PostfixExpression call [20..29)
            Identifier close [20..25)
            Identifier fp [26..28)
        PostfixExpression call [30..45)
          Identifier printf [31..37)
          Constant "a\n" [38..43)
    "#);
}

#[test]
fn test_parameters_are_owned_by_the_function() {
    let ast = build("void f(const char *s, int n, unsigned long m[]){ }");
    insta::assert_snapshot!(AstDumper::new().dump(&ast), @r"
    TranslationUnit
      Function f -> void (const char* s, int n, unsigned long[] m)
    ");

    let function = ast.children(ast.root())[0];
    let NodeKind::Function(data) = ast.kind(function) else {
        panic!("expected a function");
    };
    assert_eq!(data.params.len(), 3);
    assert!(data.params.iter().all(|&p| ast.parent(p) == Some(function)));
    assert!(ast.children(function).is_empty());
    assert!(data.braced);
}

#[test]
fn test_if_with_else_keeps_both_bodies() {
    insta::assert_snapshot!(dump("void f(int x){ if (x) { a(); } else b(); }"), @r"
    TranslationUnit
      Function f -> void (int x)
        If
          Group
            Identifier x
          Scope {}
            PostfixExpression call
              Identifier a
          Scope
            PostfixExpression call
              Identifier b
    ");
}

#[test]
fn test_unbraced_if_folds_its_body() {
    let ast = build("void f(int x){ if (x) return; }");
    insta::assert_snapshot!(AstDumper::new().dump(&ast), @r"
    TranslationUnit
      Function f -> void (int x)
        If
          Group
            Identifier x
          Return
    ");
    let function = ast.children(ast.root())[0];
    let if_node = ast.children(function)[0];
    assert_eq!(ast.tag(if_node), NodeTag::If);
    assert!(!ast.kind(if_node).braced());
}

#[test]
fn test_for_loop_header_slots() {
    let ast = build("void f(void){ for (int i = 0; i < 10; i++) { g(i); } }");
    insta::assert_snapshot!(AstDumper::new().dump(&ast), @r"
    TranslationUnit
      Function f -> void ()
        Loop for
          Group
            BinaryOp =
              Declaration int i
              Constant 0
            BinaryOp <
              Identifier i
              Constant 10
            PostfixExpression ++
              Identifier i
          PostfixExpression call
            Identifier g
            Identifier i
    ");

    let function = ast.children(ast.root())[0];
    let NodeKind::Loop(data) = ast.kind(ast.children(function)[0]) else {
        panic!("expected a loop");
    };
    assert!(data.iterator_init.is_some());
    assert!(data.iterator_cond.is_some());
    assert!(data.iterator_change.is_some());
    assert!(data.braced);
}

#[test]
fn test_for_loop_with_empty_slots() {
    insta::assert_snapshot!(dump("void f(void){ for (;;) break; }"), @r"
    TranslationUnit
      Function f -> void ()
        Loop for
          Group
          JumpStatement break
    ");
}

#[test]
fn test_do_while_keeps_body_before_condition() {
    insta::assert_snapshot!(dump("void f(void){ do { g(); } while (x); }"), @r"
    TranslationUnit
      Function f -> void ()
        Loop do
          Scope {}
            PostfixExpression call
              Identifier g
          Group
            Identifier x
    ");
}

#[test]
fn test_switch_labels_and_fallthrough() {
    let src = "int f(int x){ switch (x) { case 1: a(); case 2: b(); break; default: c(); } return 0; }";
    insta::assert_snapshot!(dump(src), @r"
    TranslationUnit
      Function f -> int (int x)
        SwitchCase
          Group
            Identifier x
          SwitchCaseLabel 1 fallthrough
            PostfixExpression call
              Identifier a
          SwitchCaseLabel 2
            PostfixExpression call
              Identifier b
            JumpStatement break
          SwitchCaseLabel default
            PostfixExpression call
              Identifier c
        Return
          Constant 0
    ");
}

#[test]
fn test_defer_block_operand() {
    insta::assert_snapshot!(dump("void f(void){ defer { a(); b(); } c(); }"), @r"
    TranslationUnit
      Function f -> void ()
        Defer
          Scope {}
            PostfixExpression call
              Identifier a
            PostfixExpression call
              Identifier b
        PostfixExpression call
          Identifier c
    ");
}

#[test]
fn test_prefix_operators_fold_after_postfix() {
    insta::assert_snapshot!(dump("void f(void){ y = -a[1] + b * (c - d); }"), @r"
    TranslationUnit
      Function f -> void ()
        BinaryOp =
          Identifier y
          BinaryOp +
            UnaryOp -
              PostfixExpression index
                Identifier a
                Constant 1
            BinaryOp *
              Identifier b
              BinaryOp -
                Identifier c
                Identifier d
    ");
}

#[test]
fn test_conditional_member_and_cast() {
    insta::assert_snapshot!(dump("void f(void){ r = c ? s->n : (int)t.m; }"), @r"
    TranslationUnit
      Function f -> void ()
        BinaryOp =
          Identifier r
          BinaryOp ?
            Identifier c
            BinaryOp :
              PostfixExpression ->n
                Identifier s
              UnaryOp (int)
                PostfixExpression .m
                  Identifier t
    ");
}

#[test]
fn test_initializer_lists_and_struct_types() {
    insta::assert_snapshot!(dump("void f(void){ int a[2] = {1, 2}; struct point p = {0}; }"), @r"
    TranslationUnit
      Function f -> void ()
        BinaryOp =
          Declaration int[2] a
          InitializerList
            Constant 1
            Constant 2
        BinaryOp =
          Declaration struct point p
          InitializerList
            Constant 0
    ");
}

#[test]
fn test_builder_is_reusable_across_units() {
    let mut builder = SemanticBuilder::new();
    builder.new_translation_unit("a.c");
    feed(&mut builder, &[(E::TranslationUnitEnd, 0, "")]).unwrap();
    let first = builder.take_ast();
    assert_eq!(first.source_path().to_str(), Some("a.c"));
    assert_eq!(builder.scope_depth(), 1);
    assert_eq!(builder.staged_len(), 0);
    assert_eq!(builder.mode(), BuilderMode::Idle);
}

#[test]
fn test_struct_keyword_waits_for_its_tag() {
    let mut builder = SemanticBuilder::new();
    feed(&mut builder, &[(E::StructKeyword, 6, "struct")]).unwrap();
    assert_eq!(builder.mode(), BuilderMode::WaitingForStructType);
    feed(&mut builder, &[(E::Type, 12, "point")]).unwrap();
    assert_eq!(builder.mode(), BuilderMode::Idle);
    let chunks = builder.pending_chunks();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "struct point");
    assert_eq!(chunks[0].start, 0);
}

#[test]
fn test_unbalanced_scope_end_is_rejected() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::ScopeEnd, 5, "")]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::UnbalancedScope {
            event: E::ScopeEnd,
            open: "TranslationUnit",
            offset: 5,
        }
    );
}

#[test]
fn test_condition_without_operand() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::IfHeader, 2, ""), (E::IfCondition, 5, "")]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::MissingOperand {
            event: E::IfCondition,
            offset: 5,
        }
    );
}

#[test]
fn test_first_error_poisons_the_unit() {
    let mut builder = SemanticBuilder::new();
    let first = feed(&mut builder, &[(E::UnaryOperator, 1, "-"), (E::StatementEnd, 2, "")]).unwrap_err();
    assert_eq!(
        first,
        ProtocolError::DanglingUnaryOperator {
            op: String::from("-"),
            offset: 2,
        }
    );
    let again = feed(&mut builder, &[(E::Identifier, 5, "x")]).unwrap_err();
    assert_eq!(again, first);

    builder.new_translation_unit("b.c");
    assert!(feed(&mut builder, &[(E::TranslationUnitEnd, 0, "")]).is_ok());
}

#[test]
fn test_malformed_literals() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::Identifier, 1, "f"), (E::PostfixCall, 3, "x")]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidLiteral { event: E::PostfixCall, .. }));

    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::Jump, 6, "goto")]).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidLiteral { event: E::Jump, .. }));
}

#[test]
fn test_declarator_without_type() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::DirectDeclarator, 1, "x")]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::MissingType {
            name: String::from("x"),
            offset: 1,
        }
    );
}

#[test]
fn test_for_slot_outside_for_header() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::ForInit, 4, "")]).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedEvent {
            event: E::ForInit,
            mode: BuilderMode::Idle,
            ..
        }
    ));
}

#[test]
fn test_unit_end_with_open_scope() {
    let mut builder = SemanticBuilder::new();
    let err = feed(&mut builder, &[(E::ScopeStart, 1, ""), (E::TranslationUnitEnd, 2, "")]).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::UnbalancedScope {
            event: E::TranslationUnitEnd,
            open: "Scope",
            offset: 2,
        }
    );
}
