use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_writes_output_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("main.c");
    fs::write(&input, "void f(void){ defer done(); work(); }\n").unwrap();

    Command::cargo_bin("cdefer").unwrap().arg(&input).assert().success();

    let output = fs::read_to_string(dir.path().join("main.out.c")).unwrap();
    assert_eq!(output, "void f(void){ work();\ndone(); }\n");
}

#[test]
fn test_out_dir_and_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.c");
    fs::write(&input, "int f(void){ return 0; }\n").unwrap();

    Command::cargo_bin("cdefer")
        .unwrap()
        .arg("-o")
        .arg(out_dir.path())
        .args(["--suffix", ".plain.c"])
        .arg(&input)
        .assert()
        .success();

    let output = fs::read_to_string(out_dir.path().join("a.plain.c")).unwrap();
    assert_eq!(output, "int f(void){ return 0; }\n");
}

#[test]
fn test_no_defer_copies_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("keep.c");
    let source = "void f(void){ defer done(); work(); }\n";
    fs::write(&input, source).unwrap();

    Command::cargo_bin("cdefer").unwrap().arg("--no-defer").arg(&input).assert().success();

    assert_eq!(fs::read_to_string(dir.path().join("keep.out.c")).unwrap(), source);
}

#[test]
fn test_dump_ast_prints_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("d.c");
    fs::write(&input, "void f(void){ defer g(); }\n").unwrap();

    Command::cargo_bin("cdefer")
        .unwrap()
        .arg("--dump-ast")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Defer [removed]"))
        .stdout(predicate::str::contains("PostfixExpression call [added]"));
}

#[test]
fn test_unsupported_construct_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.c");
    fs::write(&input, "void f(void){ goto out; }\n").unwrap();

    Command::cargo_bin("cdefer")
        .unwrap()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported construct: goto"));
}
