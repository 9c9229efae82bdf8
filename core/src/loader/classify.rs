//! Extension file classification

use serde::{Deserialize, Serialize};

use crate::parser::split_preamble;

/// How an extension file is merged into its class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileShape {
    /// Starts with `class <Target>`: required as top-level code
    Reopening,
    /// Bare statements: evaluated inside the class body
    Fragment,
}

/// Classify `source` as a reopening of `class_name` or a body fragment
///
/// Leading comment, pragma and blank lines are skipped. The class name must
/// match exactly and end at a token boundary, so `class PostsHelper` is not a
/// reopening of `Post`.
pub fn classify(source: &str, class_name: &str) -> FileShape {
    let (_, body) = split_preamble(source);
    if declares_class(body.trim_start(), class_name) {
        FileShape::Reopening
    } else {
        FileShape::Fragment
    }
}

fn declares_class(text: &str, class_name: &str) -> bool {
    let Some(after_keyword) = text.strip_prefix("class") else {
        return false;
    };
    let name_start = after_keyword.trim_start_matches(|c: char| c == ' ' || c == '\t');
    if name_start.len() == after_keyword.len() {
        return false;
    }
    let Some(rest) = name_start.strip_prefix(class_name) else {
        return false;
    };
    !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == ':')
}
