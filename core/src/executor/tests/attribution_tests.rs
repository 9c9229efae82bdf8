//! Tests for method source attribution
//!
//! Every method records the file and line of its `def` (or of the
//! `attr_*` call that generated it).

use std::fs;
use std::path::PathBuf;

use super::helpers::{eval_in, eval_inspect};
use crate::errors::SourceLocation;
use crate::executor::Runtime;

#[test]
fn test_eval_methods_report_eval() {
    let source = r#"
class Post
  def title
  end
end
Post.instance_method(:title).source_location
"#;
    assert_eq!(eval_inspect(source), "[\"(eval)\", 3]");
}

#[test]
fn test_attr_methods_report_call_site() {
    let mut rt = Runtime::new();
    eval_in(&mut rt, "class Post\n\n  attr_accessor :title\nend");
    let post = rt.lookup_class("Post").unwrap();
    assert_eq!(rt.source_location(&post, "title"), Some(SourceLocation::new(None, 3)));
    assert_eq!(rt.source_location(&post, "title="), Some(SourceLocation::new(None, 3)));
}

#[test]
fn test_class_eval_uses_given_file_and_first_line() {
    let mut rt = Runtime::new();
    let post = rt.define_class("Post", None).unwrap();
    let file = PathBuf::from("/app/post/extensions/cool.ext");
    rt.class_eval(&post, "def cool?\n  true\nend\n\ndef self.cool\n  :yes\nend\n", &file, 10)
        .unwrap();

    assert_eq!(
        rt.source_location(&post, "cool?"),
        Some(SourceLocation::new(Some(file.clone()), 10))
    );
    assert_eq!(
        rt.singleton_source_location(&post, "cool"),
        Some(SourceLocation::new(Some(file.clone()), 14))
    );

    let reported = eval_in(&mut rt, "Post.method(:cool).source_location");
    assert_eq!(
        rt.inspect(&reported).unwrap(),
        "[\"/app/post/extensions/cool.ext\", 14]"
    );
}

#[test]
fn test_class_eval_defines_on_target_class() {
    let mut rt = Runtime::new();
    let post = rt.define_class("Post", None).unwrap();
    let value = rt
        .class_eval(&post, "attr_reader :id\nself\n", "/app/post/extensions/id.ext", 1)
        .unwrap();
    assert_eq!(rt.inspect(&value).unwrap(), "Post");
    assert!(rt.source_location(&post, "id").is_some());
    assert!(rt.source_location(&rt.builtins().object.clone(), "id").is_none());
}

#[test]
fn test_class_eval_resolves_constants_in_namespace() {
    let mut rt = Runtime::new();
    eval_in(&mut rt, "module Blog\n  LIMIT = 5\n  class Comment\n  end\nend");
    let comment = rt.lookup_class("Blog::Comment").unwrap();
    rt.class_eval(
        &comment,
        "CAP = LIMIT * 2\ndef cap\n  CAP\nend\n",
        "/app/blog/comment/extensions/cap.ext",
        1,
    )
    .unwrap();
    assert_eq!(eval_in(&mut rt, "Blog::Comment.new.cap").as_int(), Some(10));
    assert_eq!(eval_in(&mut rt, "Blog::Comment::CAP").as_int(), Some(10));
}

#[test]
fn test_eval_file_reports_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("post.ext");
    fs::write(&path, "# the post model\nclass Post\n  def title\n  end\nend\n").unwrap();

    let mut rt = Runtime::new();
    rt.eval_file(&path).unwrap();
    let post = rt.lookup_class("Post").unwrap();
    assert_eq!(rt.source_location(&post, "title"), Some(SourceLocation::new(Some(path.clone()), 3)));
    assert_eq!(post.borrow().origin, Some(SourceLocation::new(Some(path), 2)));
}

#[test]
fn test_reopening_moves_attribution_to_latest_definition() {
    let mut rt = Runtime::new();
    eval_in(&mut rt, "class Post\n  def title\n  end\nend");
    let post = rt.lookup_class("Post").unwrap();
    rt.class_eval(&post, "\n\ndef title\nend\n", "/app/post/extensions/title.ext", 1)
        .unwrap();
    assert_eq!(
        rt.source_location(&post, "title"),
        Some(SourceLocation::new(Some(PathBuf::from("/app/post/extensions/title.ext")), 3))
    );
}
