use crate::ast::{Ast, NodeRef, NodeTag};
use crate::semantic::folding::redundant_body;
use crate::semantic::{ends_in_break, fold_redundant_scopes};
use crate::tests::test_utils::{build, dump};

fn first_statement(ast: &Ast) -> NodeRef {
    let function = ast.children(ast.root())[0];
    ast.children(function)[0]
}

#[test]
fn test_folding_is_idempotent() {
    let mut ast = build("void f(int x){ while (x) { g(); h(); } }");
    let function = ast.children(ast.root())[0];
    let loop_node = first_statement(&ast);
    assert_eq!(fold_redundant_scopes(&mut ast, function), 0);
    assert_eq!(fold_redundant_scopes(&mut ast, loop_node), 0);
    assert_eq!(ast.children(loop_node).len(), 3);
    assert!(ast.kind(loop_node).braced());
}

#[test]
fn test_if_with_else_keeps_its_scopes() {
    let ast = build("void f(int x){ if (x) { a(); } else { b(); } }");
    let if_node = first_statement(&ast);
    assert_eq!(redundant_body(&ast, if_node), None);
    let tags: Vec<NodeTag> = ast.children(if_node).iter().map(|&c| ast.tag(c)).collect();
    assert_eq!(tags, vec![NodeTag::Group, NodeTag::Scope, NodeTag::Scope]);
}

#[test]
fn test_empty_body_folds_away() {
    insta::assert_snapshot!(dump("void f(int x){ if (x) { } }"), @r"
    TranslationUnit
      Function f -> void (int x)
        If
          Group
            Identifier x
    ");
}

#[test]
fn test_do_while_never_folds() {
    let ast = build("void f(int x){ do x--; while (x); }");
    let loop_node = first_statement(&ast);
    assert_eq!(redundant_body(&ast, loop_node), None);
    let tags: Vec<NodeTag> = ast.children(loop_node).iter().map(|&c| ast.tag(c)).collect();
    assert_eq!(tags, vec![NodeTag::Scope, NodeTag::Group]);
}

#[test]
fn test_nested_block_statement_is_kept() {
    insta::assert_snapshot!(dump("void f(void){ { a(); } b(); }"), @r"
    TranslationUnit
      Function f -> void ()
        Scope {}
          PostfixExpression call
            Identifier a
        PostfixExpression call
          Identifier b
    ");
}

#[test]
fn test_break_inside_trailing_block_ends_the_label() {
    let source = "void f(int x){ switch (x) { case 1: { a(); break; } case 2: b(); } }";
    insta::assert_snapshot!(dump(source), @r"
    TranslationUnit
      Function f -> void (int x)
        SwitchCase
          Group
            Identifier x
          SwitchCaseLabel 1
            Scope {}
              PostfixExpression call
                Identifier a
              JumpStatement break
          SwitchCaseLabel 2
            PostfixExpression call
              Identifier b
    ");

    let ast = build(source);
    let switch = first_statement(&ast);
    let labels = &ast.children(switch)[1..];
    assert!(ends_in_break(&ast, labels[0]));
    assert!(!ends_in_break(&ast, labels[1]));
}

#[test]
fn test_break_before_other_statements_falls_through() {
    let source = "void f(int x){ switch (x) { case 1: if (x) break; a(); case 2: b(); } }";
    let ast = build(source);
    let switch = first_statement(&ast);
    let first_label = ast.children(switch)[1];
    assert!(!ends_in_break(&ast, first_label));
    insta::assert_snapshot!(dump(source), @r"
    TranslationUnit
      Function f -> void (int x)
        SwitchCase
          Group
            Identifier x
          SwitchCaseLabel 1 fallthrough
            If
              Group
                Identifier x
              JumpStatement break
            PostfixExpression call
              Identifier a
          SwitchCaseLabel 2
            PostfixExpression call
              Identifier b
    ");
}
