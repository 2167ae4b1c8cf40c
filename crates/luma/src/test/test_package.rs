// Module loader: path resolution, caching, circular requires, preload.

use super::rt;
use crate::{ErrorKind, Value};
use std::fs;

fn write_module(dir: &std::path::Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn require_resolves_through_search_path() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "answers.luma", "return { answer = 42 }");
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    let values = rt
        .evaluate("local m = require('answers') return m.answer", None)
        .unwrap();
    assert!(matches!(values[0], Value::Int(42)));
}

#[test]
fn dots_become_path_separators() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("pkg")).unwrap();
    write_module(dir.path(), "pkg/leaf.luma", "return 'leaf value'");
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    let values = rt
        .evaluate("return require('pkg.leaf')", None)
        .unwrap();
    let Value::Str(id) = values[0] else { panic!("expected string") };
    assert_eq!(rt.string_text(id), "leaf value");
}

#[test]
fn init_template_is_tried() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("mylib")).unwrap();
    write_module(dir.path(), "mylib/init.luma", "return 'from init'");
    let rt = rt();
    rt.set_search_path(&format!(
        "{0}/?.luma;{0}/?/init.luma",
        dir.path().display()
    ));
    let values = rt.evaluate("return require('mylib')", None).unwrap();
    let Value::Str(id) = values[0] else { panic!("expected string") };
    assert_eq!(rt.string_text(id), "from init");
}

#[test]
fn modules_load_once_and_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "counted.luma",
        "loads = (loads or 0) + 1\nreturn { n = loads }",
    );
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    rt.evaluate(
        r#"
        local a = require('counted')
        local b = require('counted')
        assert(a == b)
        assert(loads == 1)
        assert(package.loaded['counted'] == a)
        "#,
        None,
    )
    .unwrap();
}

#[test]
fn module_receives_name_and_path() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "who.luma", "local name, path = ...\nreturn name");
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    let values = rt.evaluate("return require('who')", None).unwrap();
    let Value::Str(id) = values[0] else { panic!("expected string") };
    assert_eq!(rt.string_text(id), "who");
}

#[test]
fn circular_require_returns_partial_value() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "ring_a.luma",
        "local b = require('ring_b')\nreturn { b_saw = b.a_was }",
    );
    write_module(
        dir.path(),
        "ring_b.luma",
        "local partial = require('ring_a')\nreturn { a_was = partial }",
    );
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    rt.evaluate(
        r#"
        local a = require('ring_a')
        -- the inner require observed the in-progress marker, not a loop
        assert(a.b_saw == true)
        "#,
        None,
    )
    .unwrap();
}

#[test]
fn missing_module_reports_tried_paths() {
    let rt = rt();
    rt.set_search_path("./definitely-missing/?.luma");
    let err = rt
        .evaluate("require('no_such_module')", None)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ModuleError);
    assert!(err.message.contains("no_such_module"));
    assert!(err.message.contains("not found"));
}

#[test]
fn preload_searcher_wins() {
    let rt = rt();
    rt.evaluate(
        r#"
        package.preload['virtual'] = function(name)
            return { provided_by = 'preload', name = name }
        end
        local m = require('virtual')
        assert(m.provided_by == 'preload')
        assert(m.name == 'virtual')
        "#,
        None,
    )
    .unwrap();
}

#[test]
fn add_search_path_appends() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "extra.luma", "return 'extra'");
    let rt = rt();
    rt.add_search_path(&format!("{}/?.luma", dir.path().display()));
    let values = rt.evaluate("return require('extra')", None).unwrap();
    let Value::Str(id) = values[0] else { panic!("expected string") };
    assert_eq!(rt.string_text(id), "extra");
}

#[test]
fn syntax_error_in_module_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "broken.luma", "return return");
    let rt = rt();
    rt.set_search_path(&format!("{}/?.luma", dir.path().display()));
    let err = rt.evaluate("require('broken')", None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::SyntaxError);
}
