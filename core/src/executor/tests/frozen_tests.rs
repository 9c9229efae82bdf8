//! Tests for the `frozen_string_literal` magic comment

use super::helpers::{eval, eval_err, eval_inspect};
use crate::errors::ErrorKind;
use crate::executor::Runtime;

#[test]
fn test_literals_are_mutable_by_default() {
    assert_eq!(eval_inspect("s = \"a\"\ns << \"b\"\n[s, s.frozen?]"), "[\"ab\", false]");
}

#[test]
fn test_pragma_freezes_literals() {
    let source = "# frozen_string_literal: true\ns = \"a\"\ns.frozen?\n";
    assert!(eval(source).is_truthy());

    let err = eval_err("# frozen_string_literal: true\ns = \"a\"\ns << \"b\"\n");
    assert_eq!(err.kind(), Some(ErrorKind::FrozenError));
    assert_eq!(err.message(), "can't modify frozen String: \"a\"");
}

#[test]
fn test_pragma_false_leaves_literals_mutable() {
    assert!(!eval("# frozen_string_literal: false\n\"a\".frozen?").is_truthy());
}

#[test]
fn test_dup_thaws_frozen_literal() {
    let source = r#"# frozen_string_literal: true
s = "a".dup
s << "b"
[s, s.frozen?, "c".frozen?]
"#;
    assert_eq!(eval_inspect(source), "[\"ab\", false, true]");
}

#[test]
fn test_computed_strings_are_not_frozen() {
    let source = r#"# frozen_string_literal: true
[("a" + "b").frozen?, "a".upcase.frozen?, 1.to_s.frozen?]
"#;
    assert_eq!(eval_inspect(source), "[false, false, false]");
}

#[test]
fn test_pragma_applies_to_methods_defined_in_the_file() {
    let mut rt = Runtime::new();
    rt.eval(
        r#"# frozen_string_literal: true
class Post
  def label
    "post"
  end
end
"#,
    )
    .unwrap();
    rt.eval("class Post\n  def thawed\n    \"post\"\n  end\nend").unwrap();

    let frozen = rt.eval("Post.new.label.frozen?").unwrap();
    let thawed = rt.eval("Post.new.thawed.frozen?").unwrap();
    assert!(frozen.is_truthy());
    assert!(!thawed.is_truthy());
}

#[test]
fn test_frozen_strings_from_host() {
    let mut rt = Runtime::new();
    let post = rt.define_class("Post", None).unwrap();
    rt.class_eval(
        &post,
        "# -*- frozen_string_literal: true -*-\ndef tag\n  \"t\"\nend\n",
        "/app/post/extensions/tag.ext",
        1,
    )
    .unwrap();
    assert!(rt.eval("Post.new.tag.frozen?").unwrap().is_truthy());
}
