use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use maplit::hashset;

use super::*;
use crate::config::Config;
use crate::errors::SourceLocation;
use crate::executor::{Runtime, Value};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn canonical(path: impl AsRef<Path>) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

fn global_int(rt: &Runtime, name: &str) -> Option<i64> {
    rt.global(name).and_then(|v| v.as_int())
}

/// A runtime with `fixtures/post.ext` required
fn post_runtime() -> (Runtime, ClassRef) {
    let mut rt = Runtime::new();
    rt.require(fixtures().join("post.ext")).unwrap();
    let post = rt.lookup_class("Post").unwrap();
    (rt, post)
}

/* ===================== Path Resolver ===================== */

#[test]
fn test_directory_for_uses_last_segment_lowercased() {
    let resolver = PathResolver::default();
    assert_eq!(
        resolver.directory_for(Path::new("/app/models"), "Blog::Comment"),
        PathBuf::from("/app/models/comment/extensions")
    );
    assert_eq!(
        resolver.directory_for(Path::new("/app"), "Post"),
        PathBuf::from("/app/post/extensions")
    );
}

#[test]
fn test_path_for_appends_suffix() {
    let resolver = PathResolver::new("concerns", "mx");
    assert_eq!(
        resolver.path_for(Path::new("/app"), "Post", "mailroom"),
        PathBuf::from("/app/post/concerns/mailroom.mx")
    );
    assert_eq!(resolver.suffix(), "mx");
}

#[test]
fn test_all_paths_filters_by_suffix() {
    let resolver = PathResolver::default();
    let paths: std::collections::HashSet<String> = resolver
        .all_paths(&fixtures(), "Post")
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        paths,
        hashset! {
            "cool.ext".to_string(),
            "mailroom.ext".to_string(),
            "named.ext".to_string(),
            "thawed.ext".to_string(),
        }
    );
}

#[test]
fn test_all_paths_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = PathResolver::default();
    assert!(resolver.all_paths(dir.path(), "Nothing").unwrap().is_empty());
}

#[test]
fn test_all_paths_skips_directories() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("extensions");
    fs::create_dir_all(ext_dir.join("nested.ext")).unwrap();
    fs::write(ext_dir.join("real.ext"), "").unwrap();

    let paths = PathResolver::default().all_paths(dir.path(), "Post").unwrap();
    assert_eq!(paths, vec![ext_dir.join("real.ext")]);
}

/* ===================== Classification ===================== */

#[test]
fn test_classify_reopening() {
    assert_eq!(classify("class Post\nend\n", "Post"), FileShape::Reopening);
    assert_eq!(classify("class Post < Model\nend\n", "Post"), FileShape::Reopening);
    assert_eq!(classify("class Post; end", "Post"), FileShape::Reopening);
    assert_eq!(classify("class Blog::Comment\nend", "Blog::Comment"), FileShape::Reopening);
}

#[test]
fn test_classify_skips_leading_comments_and_pragmas() {
    let source = "# frozen_string_literal: true\n\n# Reopens Post\n  class Post\nend\n";
    assert_eq!(classify(source, "Post"), FileShape::Reopening);
}

#[test]
fn test_classify_fragment() {
    assert_eq!(classify("def title\nend\n", "Post"), FileShape::Fragment);
    assert_eq!(classify("", "Post"), FileShape::Fragment);
    assert_eq!(classify("# only a comment\n", "Post"), FileShape::Fragment);
    assert_eq!(classify("attr_accessor :x\nclass Post\nend", "Post"), FileShape::Fragment);
}

#[test]
fn test_classify_requires_exact_name() {
    assert_eq!(classify("class PostsHelper\nend", "Post"), FileShape::Fragment);
    assert_eq!(classify("class Post_2\nend", "Post"), FileShape::Fragment);
    assert_eq!(classify("class Post::Draft\nend", "Post"), FileShape::Fragment);
    assert_eq!(classify("class Comment\nend", "Blog::Comment"), FileShape::Fragment);
    assert_eq!(classify("classPost\nend", "Post"), FileShape::Fragment);
    assert_eq!(classify("module Post\nend", "Post"), FileShape::Fragment);
}

#[test]
fn test_file_shape_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&FileShape::Reopening).unwrap(), "\"reopening\"");
    assert_eq!(serde_json::to_string(&FileShape::Fragment).unwrap(), "\"fragment\"");
}

/* ===================== Ledger ===================== */

#[test]
fn test_ledger_claims_once() {
    let ledger = LoadLedger::new();
    let path = Path::new("/app/post/extensions/a.ext");
    assert!(ledger.is_empty());
    assert!(ledger.claim(path));
    assert!(!ledger.claim(path));
    assert!(ledger.contains(path));
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_ledger_clones_share_state() {
    let ledger = LoadLedger::new();
    let clone = ledger.clone();
    clone.claim(Path::new("/b.ext"));
    clone.claim(Path::new("/a.ext"));
    assert!(ledger.shares_with(&clone));
    assert!(!ledger.shares_with(&LoadLedger::new()));
    assert_eq!(ledger.paths(), vec![PathBuf::from("/a.ext"), PathBuf::from("/b.ext")]);
}

#[test]
fn test_global_ledger_is_shared() {
    assert!(LoadLedger::global().shares_with(&LoadLedger::global()));
}

#[test]
fn test_ledger_claims_across_threads() {
    let ledger = LoadLedger::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            thread::spawn(move || ledger.claim(Path::new("/contended.ext")))
        })
        .collect();
    let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
    assert_eq!(winners, 1);
}

/* ===================== Loading ===================== */

#[test]
fn test_load_all_merges_every_extension() {
    let (mut rt, post) = post_runtime();

    let post_value = Value::Class(post.clone());
    assert!(rt.respond_to(&post_value, "cool"));
    assert!(rt.respond_to(&post_value, "named"));

    let instance = rt.instantiate(&post, Vec::new()).unwrap();
    for name in ["cool?", "mailroom", "sup", "sup=", "frozen_boi", "thawed_boi"] {
        assert!(rt.respond_to(&instance, name), "Post#{} missing", name);
    }

    assert_eq!(global_int(&rt, "$named_loads"), Some(1));
    assert_eq!(global_int(&rt, "$mailroom_loads"), Some(1));
    assert_eq!(global_int(&rt, "$named_calls"), Some(1));
}

#[test]
fn test_fragments_behave_like_class_body_code() {
    let (mut rt, _post) = post_runtime();
    let value = rt
        .eval("post = Post.new\npost.sup = \"bob\"\n[post.mailroom, post.cool?, Post.cool, Post.names]")
        .unwrap();
    assert_eq!(
        rt.inspect(&value).unwrap(),
        "[\"mail for bob\", true, \"cool\", [:sup]]"
    );
}

#[test]
fn test_loading_again_executes_nothing() {
    let (mut rt, post) = post_runtime();

    let reports = rt.load_extensions(&post, &[]).unwrap();
    assert_eq!(reports.len(), 4);
    assert!(reports.iter().all(|r| !r.executed));

    let reports = rt.load_extensions(&post, &["named", "cool"]).unwrap();
    assert!(reports.iter().all(|r| !r.executed));

    assert_eq!(global_int(&rt, "$named_loads"), Some(1));
    assert_eq!(global_int(&rt, "$mailroom_loads"), Some(1));
}

#[test]
fn test_keyed_load_hoists_dependencies() {
    let mut rt = Runtime::builder().root_dir(fixtures()).build();
    let post = rt.define_class("Post", None).unwrap();

    let reports = rt.load_extensions(&post, &["mailroom", "named"]).unwrap();
    let summary: Vec<(String, bool)> = reports
        .iter()
        .map(|r| (r.path.file_name().unwrap().to_string_lossy().to_string(), r.executed))
        .collect();
    assert_eq!(
        summary,
        vec![("mailroom.ext".to_string(), true), ("named.ext".to_string(), false)]
    );

    // named ran first, from inside mailroom, before `named :sup`
    assert_eq!(global_int(&rt, "$named_loads"), Some(1));
    assert_eq!(global_int(&rt, "$named_calls"), Some(1));

    // A later directory load skips both
    let reports = rt.load_extensions(&post, &[]).unwrap();
    let executed: Vec<String> = reports
        .iter()
        .filter(|r| r.executed)
        .map(|r| r.path.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        executed.into_iter().collect::<std::collections::HashSet<_>>(),
        hashset! {"cool.ext".to_string(), "thawed.ext".to_string()}
    );
    assert_eq!(global_int(&rt, "$named_loads"), Some(1));
}

#[test]
fn test_reopenings_are_required_and_fragments_ledgered() {
    let (rt, _post) = post_runtime();
    let dir = fixtures().join("post").join("extensions");

    assert!(rt.is_required(dir.join("cool.ext")));
    assert!(!rt.ledger().contains(&canonical(dir.join("cool.ext"))));

    assert_eq!(
        rt.ledger().paths(),
        vec![
            canonical(dir.join("mailroom.ext")),
            canonical(dir.join("named.ext")),
            canonical(dir.join("thawed.ext")),
        ]
    );
    assert!(!rt.is_required(dir.join("named.ext")));
}

#[test]
fn test_reports_describe_shapes() {
    let mut rt = Runtime::builder().root_dir(fixtures()).build();
    let post = rt.define_class("Post", None).unwrap();
    let reports = rt.load_extensions(&post, &["cool", "thawed"]).unwrap();

    let dir = fixtures().join("post").join("extensions");
    assert_eq!(
        reports,
        vec![
            LoadReport {
                path: canonical(dir.join("cool.ext")),
                shape: FileShape::Reopening,
                executed: true,
            },
            LoadReport {
                path: canonical(dir.join("thawed.ext")),
                shape: FileShape::Fragment,
                executed: true,
            },
        ]
    );

    let json = serde_json::to_value(&reports[1]).unwrap();
    assert_eq!(json["shape"], "fragment");
    assert_eq!(json["executed"], true);
}

/* ===================== Attribution & Pragmas ===================== */

#[test]
fn test_source_locations_point_at_extension_files() {
    let (rt, post) = post_runtime();
    let dir = fixtures().join("post").join("extensions");

    assert_eq!(
        rt.source_location(&post, "cool?"),
        Some(SourceLocation::new(Some(canonical(dir.join("cool.ext"))), 7))
    );
    assert_eq!(
        rt.singleton_source_location(&post, "cool"),
        Some(SourceLocation::new(Some(canonical(dir.join("cool.ext"))), 3))
    );
    assert_eq!(
        rt.source_location(&post, "mailroom"),
        Some(SourceLocation::new(Some(canonical(dir.join("mailroom.ext"))), 8))
    );
    assert_eq!(
        rt.singleton_source_location(&post, "named"),
        Some(SourceLocation::new(Some(canonical(dir.join("named.ext"))), 4))
    );
    // Generated by `attr_accessor key` inside `named`
    assert_eq!(
        rt.source_location(&post, "sup"),
        Some(SourceLocation::new(Some(canonical(dir.join("named.ext"))), 9))
    );
}

#[test]
fn test_source_location_visible_from_annex() {
    let (mut rt, _post) = post_runtime();
    let value = rt.eval("Post.instance_method(:frozen_boi).source_location").unwrap();
    let expected = format!(
        "[{:?}, 3]",
        canonical(fixtures().join("post/extensions/thawed.ext")).display().to_string()
    );
    assert_eq!(rt.inspect(&value).unwrap(), expected);
}

#[test]
fn test_frozen_pragma_applies_per_file() {
    let (mut rt, _post) = post_runtime();
    let value = rt
        .eval("post = Post.new\n[post.frozen_boi.frozen?, post.thawed_boi.frozen?, post.mailroom.frozen?]")
        .unwrap();
    assert_eq!(rt.inspect(&value).unwrap(), "[true, false, false]");
}

/* ===================== Namespaces & Inheritance ===================== */

#[test]
fn test_namespaced_class_uses_last_segment() {
    let mut rt = Runtime::new();
    rt.require(fixtures().join("blog").join("blog.ext")).unwrap();
    let value = rt
        .eval("c = Blog::Comment.new\n[c.score, c.limit, c.moderated?, Blog::Comment::SCORE]")
        .unwrap();
    assert_eq!(rt.inspect(&value).unwrap(), "[10, 3, true, 10]");
}

#[test]
fn test_autoload_extensions_on_subclass() {
    let mut rt = Runtime::new();
    rt.require(fixtures().join("models").join("models.ext")).unwrap();
    let value = rt
        .eval("[Widget.new.gears, Widget.method_defined?(:gears), Model.method_defined?(:gears), Gadget.method_defined?(:gears)]")
        .unwrap();
    assert_eq!(rt.inspect(&value).unwrap(), "[3, true, false, false]");

    let gears = canonical(fixtures().join("models/widget/extensions/gears.ext"));
    assert!(rt.ledger().contains(&gears));
}

#[test]
fn test_load_extensions_from_annex_accepts_strings_and_arrays() {
    let mut rt = Runtime::builder().root_dir(fixtures()).build();
    rt.eval("class Post\n  load_extensions \"thawed\", [:named, :cool]\nend").unwrap();
    let value = rt
        .eval("[Post.method_defined?(:frozen_boi), Post.respond_to?(:named), Post.respond_to?(:cool), Post.method_defined?(:mailroom)]")
        .unwrap();
    assert_eq!(rt.inspect(&value).unwrap(), "[true, true, true, false]");
}

/* ===================== Failures ===================== */

#[test]
fn test_missing_key_is_not_found() {
    let (mut rt, post) = post_runtime();
    let err = rt.load_extensions(&post, &["missing"]).unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
}

#[test]
fn test_missing_key_from_annex_propagates() {
    let (mut rt, _post) = post_runtime();
    let err = rt.eval("Post.load_extensions(:missing)").unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
}

#[test]
fn test_no_extension_directory_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut rt = Runtime::builder().root_dir(dir.path()).build();
    let lonely = rt.define_class("Lonely", None).unwrap();
    assert!(rt.load_extensions(&lonely, &[]).unwrap().is_empty());
}

#[test]
fn test_failed_fragment_stays_ledgered() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("extensions");
    fs::create_dir_all(&ext_dir).unwrap();
    fs::write(
        ext_dir.join("broken.ext"),
        "$tries ||= 0\n$tries += 1\ndef before_failure\nend\nraise \"broken\"\ndef after_failure\nend\n",
    )
    .unwrap();

    let mut rt = Runtime::builder().root_dir(dir.path()).build();
    let post = rt.define_class("Post", None).unwrap();

    let err = rt.load_extensions(&post, &["broken"]).unwrap_err();
    assert_eq!(err.message(), "broken");
    assert!(rt.ledger().contains(&canonical(ext_dir.join("broken.ext"))));
    assert!(rt.source_location(&post, "before_failure").is_some());
    assert!(rt.source_location(&post, "after_failure").is_none());

    let reports = rt.load_extensions(&post, &["broken"]).unwrap();
    assert!(!reports[0].executed);
    assert_eq!(global_int(&rt, "$tries"), Some(1));
}

#[test]
fn test_parse_error_in_extension() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("extensions");
    fs::create_dir_all(&ext_dir).unwrap();
    fs::write(ext_dir.join("typo.ext"), "def title\n  (\nend\n").unwrap();

    let mut rt = Runtime::builder().root_dir(dir.path()).build();
    let post = rt.define_class("Post", None).unwrap();
    let err = rt.load_extensions(&post, &["typo"]).unwrap_err();
    let crate::errors::Error::Parse(parse) = &err else {
        unreachable!("Expected a parse error, got {:?}", err);
    };
    assert!(parse.file().ends_with("typo.ext"), "{}", parse);
}

#[test]
fn test_fragment_requesting_itself_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("extensions");
    fs::create_dir_all(&ext_dir).unwrap();
    fs::write(
        ext_dir.join("selfish.ext"),
        "load_extensions :selfish\n$selfish ||= 0\n$selfish += 1\n",
    )
    .unwrap();

    let mut rt = Runtime::builder().root_dir(dir.path()).build();
    let post = rt.define_class("Post", None).unwrap();
    rt.load_extensions(&post, &["selfish"]).unwrap();
    assert_eq!(global_int(&rt, "$selfish"), Some(1));
}

/* ===================== Configuration & Sharing ===================== */

#[test]
fn test_custom_directory_and_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("concerns");
    fs::create_dir_all(&ext_dir).unwrap();
    fs::write(ext_dir.join("tags.mx"), "def tags\n  [:a]\nend\n").unwrap();
    fs::write(ext_dir.join("ignored.ext"), "def ignored\nend\n").unwrap();

    let config = Config {
        extension_suffix: "mx".to_string(),
        extensions_dir: "concerns".to_string(),
        root_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let mut rt = Runtime::builder().config(config).build();
    let post = rt.define_class("Post", None).unwrap();
    let reports = rt.load_extensions(&post, &[]).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(rt.source_location(&post, "tags").is_some());
    assert!(rt.source_location(&post, "ignored").is_none());
}

#[test]
fn test_runtimes_sharing_a_ledger_skip_each_others_fragments() {
    let ledger = LoadLedger::new();
    let mut first = Runtime::builder().ledger(ledger.clone()).build();
    first.require(fixtures().join("post.ext")).unwrap();

    let mut second = Runtime::builder().ledger(ledger.clone()).build();
    second.require(fixtures().join("post.ext")).unwrap();
    let post = second.lookup_class("Post").unwrap();

    // Reopenings are per runtime; fragments are per ledger
    assert!(second.source_location(&post, "cool?").is_some());
    assert!(second.source_location(&post, "mailroom").is_none());
    assert!(first.ledger().shares_with(second.ledger()));
}

#[test]
fn test_threads_share_one_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ext_dir = dir.path().join("post").join("extensions");
    fs::create_dir_all(&ext_dir).unwrap();
    fs::write(ext_dir.join("once.ext"), "def once\nend\n").unwrap();

    let ledger = LoadLedger::new();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = ledger.clone();
            let root = dir.path().to_path_buf();
            thread::spawn(move || {
                let mut rt = Runtime::builder().ledger(ledger).root_dir(root).build();
                let post = rt.define_class("Post", None).unwrap();
                let reports = rt.load_extensions(&post, &["once"]).unwrap();
                reports[0].executed
            })
        })
        .collect();

    let executed = handles.into_iter().map(|h| h.join().unwrap()).filter(|e| *e).count();
    assert_eq!(executed, 1);
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_loader_can_be_driven_directly() {
    let loader = ExtensionLoader::new(PathResolver::default(), LoadLedger::new());
    let mut rt = Runtime::builder().root_dir(fixtures()).build();
    let post = rt.define_class("Post", None).unwrap();

    let reports = loader.load(&mut rt, &post, &["thawed"]).unwrap();
    assert!(reports[0].executed);
    assert!(loader.ledger().contains(&reports[0].path));
    // The runtime's own ledger is separate
    assert!(!rt.ledger().contains(&reports[0].path));
    assert_eq!(loader.resolver(), &PathResolver::default());
}
