use std::fs;
use std::io::Cursor;

use crate::ast::{NameId, NodeTag, SpecialActions};
use crate::diagnostic::RegenError;
use crate::parser::produce_events;
use crate::regen::{SourceRange, cut_list, emit_cuts, regenerate, regenerate_into, squash};
use crate::semantic::{SemanticBuilder, resolve_defers};
use crate::tests::test_utils::{build, init_logger, resolve};

fn emit(cuts: &[SourceRange], source: &str) -> String {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(source.as_bytes());
    let report = emit_cuts(cuts, Some(&mut cursor), &mut out);
    assert_eq!(report.failed_chunks, 0);
    String::from_utf8(out).unwrap()
}

fn range(start: u32, end: u32, depth: u32) -> SourceRange {
    SourceRange::new(start, end, NodeTag::Scope, depth)
}

#[test]
fn test_squash_reaches_a_fixed_point() {
    let ranges = vec![range(0, 20, 0), range(2, 18, 1), range(4, 8, 2), range(10, 16, 2), range(12, 14, 3)];
    let cuts = squash(ranges);
    let spans: Vec<(u32, u32)> = cuts.iter().map(|c| (c.start, c.end)).collect();
    assert_eq!(
        spans,
        vec![(0, 2), (2, 4), (4, 8), (8, 10), (10, 12), (12, 14), (14, 16), (16, 18), (18, 20)]
    );
    assert_eq!(squash(cuts.clone()), cuts);
}

#[test]
fn test_nested_chain_yields_head_and_tail_per_container() {
    let chain = vec![range(0, 10, 0), range(2, 8, 1), range(4, 6, 2)];
    let cuts = squash(chain.clone());
    assert_eq!(cuts.len(), 2 * chain.len() - 1);
    assert_eq!(cuts.first().map(|c| c.start), Some(0));
    assert_eq!(cuts.last().map(|c| c.end), Some(10));
    for pair in cuts.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    assert_eq!(emit(&cuts, "0123456789"), "0123456789");
}

#[test]
fn test_prefix_and_replacement_text() {
    let mut binding = range(2, 5, 1).with_actions(SpecialActions::PREPEND_NEWLINE | SpecialActions::APPEND_SEMICOLON);
    binding.synthesized = true;
    binding.prefix = Some(NameId::new("int t = "));
    let mut value = range(2, 5, 1);
    value.replacement = Some(NameId::new("t"));
    let cuts = squash(vec![range(0, 6, 0), binding, value]);
    assert_eq!(emit(&cuts, "r g();"), "r \nint t = g();t;");
}

#[test]
fn test_container_actions_wrap_its_text() {
    let container = range(0, 6, 0).with_actions(SpecialActions::OPEN_BRACE | SpecialActions::CLOSE_BRACE);
    let cuts = squash(vec![container, range(2, 4, 1)]);
    assert_eq!(cuts.first().map(|c| c.actions), Some(SpecialActions::OPEN_BRACE));
    assert_eq!(cuts.last().map(|c| c.actions), Some(SpecialActions::CLOSE_BRACE));
    assert_eq!(emit(&cuts, "abcdef"), "{abcdef\n}");
}

#[test]
fn test_inserted_range_precedes_the_next_sibling() {
    let mut inserted = range(0, 3, 1).with_actions(SpecialActions::PREPEND_NEWLINE | SpecialActions::APPEND_SEMICOLON);
    inserted.synthesized = true;
    let cuts = squash(vec![range(0, 9, 0), range(0, 4, 1), inserted, range(4, 9, 1)]);
    assert_eq!(emit(&cuts, "a(); b();"), "a();\na(); b();");
}

#[test]
fn test_omitted_range_is_skipped_and_clamps() {
    let cuts = vec![
        range(0, 3, 1),
        range(2, 4, 1).with_actions(SpecialActions::OMIT),
        range(3, 6, 1),
    ];
    assert_eq!(emit(&cuts, "abcdef"), "abcef");
}

#[test]
fn test_action_bytes() {
    let mut cut = range(0, 1, 1).with_actions(
        SpecialActions::OPEN_BRACE
            | SpecialActions::PREPEND_NEWLINE
            | SpecialActions::APPEND_SEMICOLON
            | SpecialActions::CLOSE_BRACE,
    );
    cut.synthesized = true;
    assert_eq!(emit(&[cut], "a"), "{\na;\n}");
}

#[test]
fn test_missing_source_counts_failed_chunks() {
    let ast = build("int f(void){ return 0; }");
    let mut out = Vec::new();
    let report = regenerate_into::<Cursor<&[u8]>, _>(&ast, None, &mut out);
    assert!(out.is_empty());
    assert_eq!(report.chunks, 0);
    assert_eq!(report.failed_chunks, cut_list(&ast).len());
}

#[test]
fn test_regenerate_writes_the_output_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.c");
    let source = "void f(void){ defer close(fp); work(); }\n";
    fs::write(&input, source).unwrap();

    let mut builder = SemanticBuilder::new();
    builder.new_translation_unit(&input);
    produce_events(source.as_bytes(), &mut builder).unwrap();
    let mut ast = builder.take_ast();
    resolve_defers(&mut ast);

    let output = dir.path().join("input.out.c");
    let report = regenerate(&ast, &output).unwrap();
    assert_eq!(report.failed_chunks, 0);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "void f(void){ work();\nclose(fp); }\n"
    );
    assert_eq!(report.bytes_written, fs::metadata(&output).unwrap().len());
}

#[test]
fn test_unreadable_source_still_creates_output() {
    let ast = resolve("void f(void){ g(); }");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.c");
    let report = regenerate(&ast, &output).unwrap();
    assert!(report.failed_chunks > 0);
    assert!(output.exists());
}

#[test]
fn test_uncreatable_output_is_an_error() {
    let ast = build("void f(void){ }");
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("missing").join("out.c");
    let err = regenerate(&ast, &output).unwrap_err();
    assert!(matches!(err, RegenError::CreateOutput { ref path, .. } if *path == output));
}
