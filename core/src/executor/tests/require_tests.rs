//! Tests for `require`, `require_relative` and `eval_file`

use std::fs;

use crate::config::Config;
use crate::executor::Runtime;

#[test]
fn test_require_runs_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.ext");
    fs::write(&path, "$loads ||= 0\n$loads += 1\n").unwrap();

    let mut rt = Runtime::new();
    assert!(rt.require(&path).unwrap());
    assert!(!rt.require(&path).unwrap());
    assert!(rt.is_required(&path));
    assert_eq!(rt.global("$loads").and_then(|v| v.as_int()), Some(1));
}

#[test]
fn test_require_uses_canonical_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let path = dir.path().join("counter.ext");
    fs::write(&path, "$loads ||= 0\n$loads += 1\n").unwrap();

    let mut rt = Runtime::new();
    assert!(rt.require(&path).unwrap());
    assert!(!rt.require(dir.path().join("sub").join("..").join("counter.ext")).unwrap());
    assert_eq!(rt.global("$loads").and_then(|v| v.as_int()), Some(1));
}

#[test]
fn test_eval_file_always_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.ext");
    fs::write(&path, "$loads ||= 0\n$loads += 1\n").unwrap();

    let mut rt = Runtime::new();
    rt.eval_file(&path).unwrap();
    rt.eval_file(&path).unwrap();
    assert_eq!(rt.global("$loads").and_then(|v| v.as_int()), Some(2));
    assert!(!rt.is_required(&path));
}

#[test]
fn test_require_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut rt = Runtime::new();
    let err = rt.require(dir.path().join("missing.ext")).unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
}

#[test]
fn test_failed_require_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flaky.ext");
    fs::write(&path, "$attempts ||= 0\n$attempts += 1\nraise \"not yet\" if $attempts < 2\n").unwrap();

    let mut rt = Runtime::new();
    assert!(rt.require(&path).is_err());
    assert!(!rt.is_required(&path));
    assert!(rt.require(&path).unwrap());
    assert!(!rt.require(&path).unwrap());
    assert_eq!(rt.global("$attempts").and_then(|v| v.as_int()), Some(2));
}

#[test]
fn test_require_relative_appends_suffix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("helper.ext"), "class Helper\nend\n").unwrap();
    let main = dir.path().join("main.ext");
    fs::write(
        &main,
        "first = require_relative(\"helper\")\nsecond = require_relative(\"helper.ext\")\n$result = [first, second]\n",
    )
    .unwrap();

    let mut rt = Runtime::new();
    rt.eval_file(&main).unwrap();
    assert!(rt.lookup_class("Helper").is_some());
    let result = rt.global("$result").unwrap();
    assert_eq!(rt.inspect(&result).unwrap(), "[true, false]");
}

#[test]
fn test_require_relative_needs_a_file() {
    let mut rt = Runtime::new();
    let err = rt.eval("require_relative \"helper\"").unwrap_err();
    assert_eq!(err.message(), "cannot infer basepath for require_relative");
}

#[test]
fn test_require_resolves_against_root_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lib.mx"), "class Lib\nend\n").unwrap();
    let config = Config {
        extension_suffix: "mx".to_string(),
        ..Config::default()
    };

    let mut rt = Runtime::builder().config(config).root_dir(dir.path()).build();
    rt.eval("require \"lib\"").unwrap();
    assert!(rt.lookup_class("Lib").is_some());
}
