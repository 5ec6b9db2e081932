use crate::ast::visitor::walk;
use crate::ast::{Dirty, NodeTag};
use crate::semantic::{DeferResolver, DeferSummary, ExitKind, FireRecord, resolve_defers};
use crate::tests::test_utils::{build, resolved_dump};

/// Run the resolver without applying its edits.
fn fired(source: &str) -> Vec<(NodeTag, ExitKind)> {
    let ast = build(source);
    let mut resolver = DeferResolver::new();
    walk(&ast, ast.root(), &mut resolver);
    resolver
        .fired()
        .iter()
        .map(|&FireRecord { scope, exit, .. }| (ast.tag(scope), exit))
        .collect()
}

#[test]
fn test_scope_end_appends_deferred_call() {
    insta::assert_snapshot!(resolved_dump(r#"void f(void){ defer close(fp); printf("a\n"); }"#), @r#"
    TranslationUnit
      Function f -> void ()
        Defer [removed]
          PostfixExpression call [removed]
            Identifier close [removed]
            Identifier fp [removed]
        PostfixExpression call
          Identifier printf
          Constant "a\n"
        PostfixExpression call [added]
          Identifier close
          Identifier fp
    "#);
}

#[test]
fn test_return_value_is_computed_before_defers() {
    insta::assert_snapshot!(resolved_dump("int f(FILE *fp){ defer fclose(fp); return read(fp); }"), @r#"
    TranslationUnit
      Function f -> int (FILE* fp)
        Defer [removed]
          PostfixExpression call [removed]
            Identifier fclose [removed]
            Identifier fp [removed]
        PostfixExpression call [added] <OPEN_BRACE> prefix "int __defer_ret = "
          Identifier read
          Identifier fp
        PostfixExpression call [added]
          Identifier fclose
          Identifier fp
        Return [modified] <CLOSE_BRACE>
          PostfixExpression call [modified] as "__defer_ret"
            Identifier read
            Identifier fp
    "#);
}

#[test]
fn test_early_return_in_unbraced_if() {
    insta::assert_snapshot!(resolved_dump("int f(int x){ defer close(fp); if (x) return 1; return 0; }"), @r"
    TranslationUnit
      Function f -> int (int x)
        Defer [removed]
          PostfixExpression call [removed]
            Identifier close [removed]
            Identifier fp [removed]
        If
          Group
            Identifier x
          PostfixExpression call [added] <OPEN_BRACE>
            Identifier close
            Identifier fp
          Return [modified] <CLOSE_BRACE>
            Constant 1
        PostfixExpression call [added]
          Identifier close
          Identifier fp
        Return
          Constant 0
    ");
}

#[test]
fn test_scope_ending_in_return_is_not_appended_to() {
    assert_eq!(
        fired("int f(int x){ defer close(fp); if (x) return 1; return 0; }"),
        vec![(NodeTag::Function, ExitKind::Return), (NodeTag::Function, ExitKind::Return)]
    );
}

#[test]
fn test_defers_fire_most_recent_first() {
    insta::assert_snapshot!(resolved_dump("void f(void){ defer a(); defer b(); c(); }"), @r"
    TranslationUnit
      Function f -> void ()
        Defer [removed]
          PostfixExpression call [removed]
            Identifier a [removed]
        Defer [removed]
          PostfixExpression call [removed]
            Identifier b [removed]
        PostfixExpression call
          Identifier c
        PostfixExpression call [added]
          Identifier b
        PostfixExpression call [added]
          Identifier a
    ");
}

#[test]
fn test_return_collects_every_enclosing_scope() {
    let source = "int f(void){ defer a(); while (x) { defer b(); return 1; } return 0; }";
    insta::assert_snapshot!(resolved_dump(source), @r"
    TranslationUnit
      Function f -> int ()
        Defer [removed]
          PostfixExpression call [removed]
            Identifier a [removed]
        Loop while
          Group
            Identifier x
          Defer [removed]
            PostfixExpression call [removed]
              Identifier b [removed]
          PostfixExpression call [added]
            Identifier b
          PostfixExpression call [added]
            Identifier a
          Return
            Constant 1
        PostfixExpression call [added]
          Identifier a
        Return
          Constant 0
    ");
    assert_eq!(
        fired(source),
        vec![
            (NodeTag::Loop, ExitKind::Return),
            (NodeTag::Function, ExitKind::Return),
            (NodeTag::Function, ExitKind::Return),
        ]
    );
}

#[test]
fn test_break_stops_at_the_loop() {
    let source = "void f(int n){ while (n) { defer a(); if (n > 3) break; n--; } }";
    assert_eq!(
        fired(source),
        vec![(NodeTag::Loop, ExitKind::Break), (NodeTag::Loop, ExitKind::ScopeEnd)]
    );

    assert_eq!(fired("void f(void){ defer a(); while (x) break; }"), vec![(
        NodeTag::Function,
        ExitKind::ScopeEnd
    )]);
}

#[test]
fn test_continue_stops_at_the_loop() {
    let source = "void f(int n){ for (;;) { defer a(); if (n) continue; g(); } }";
    assert_eq!(
        fired(source),
        vec![(NodeTag::Loop, ExitKind::Continue), (NodeTag::Loop, ExitKind::ScopeEnd)]
    );
}

#[test]
fn test_break_stops_at_the_case_label() {
    let source = "void f(int x){ defer z(); switch (x) { case 1: defer a(); b(); break; default: c(); } }";
    assert_eq!(
        fired(source),
        vec![(NodeTag::SwitchCaseLabel, ExitKind::Break), (NodeTag::Function, ExitKind::ScopeEnd)]
    );
    insta::assert_snapshot!(resolved_dump(source), @r"
    TranslationUnit
      Function f -> void (int x)
        Defer [removed]
          PostfixExpression call [removed]
            Identifier z [removed]
        SwitchCase
          Group
            Identifier x
          SwitchCaseLabel 1
            Defer [removed]
              PostfixExpression call [removed]
                Identifier a [removed]
            PostfixExpression call
              Identifier b
            PostfixExpression call [added]
              Identifier a
            JumpStatement break
          SwitchCaseLabel default
            PostfixExpression call
              Identifier c
        PostfixExpression call [added]
          Identifier z
    ");
}

#[test]
fn test_nested_defer_is_not_armed() {
    let mut ast = build("void f(void){ defer { defer a(); b(); } c(); }");
    let summary = resolve_defers(&mut ast);
    assert_eq!(summary, DeferSummary { armed: 1, fired: 1 });
}

#[test]
fn test_tree_without_defers_is_untouched() {
    let mut ast = build("int f(int x){ if (x) return 1; return 0; }");
    let summary = resolve_defers(&mut ast);
    assert_eq!(summary, DeferSummary::default());
    assert!(ast.reachable().all(|node| ast.get(node).dirty == Dirty::Clean));
}

#[test]
fn test_defer_block_fires_as_a_block() {
    insta::assert_snapshot!(resolved_dump("void f(void){ defer { a(); b(); } c(); }"), @r"
    TranslationUnit
      Function f -> void ()
        Defer [removed]
          Scope {} [removed]
            PostfixExpression call [removed]
              Identifier a [removed]
            PostfixExpression call [removed]
              Identifier b [removed]
        PostfixExpression call
          Identifier c
        Scope {} [added]
          PostfixExpression call
            Identifier a
          PostfixExpression call
            Identifier b
    ");
}
