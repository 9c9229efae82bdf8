//! Test helpers for executor tests
//!
//! Common utilities for parsing sources and running them in a fresh runtime

use crate::errors::Error;
use crate::executor::{Runtime, Value};
use crate::parser::{self, Program};

/// Parse `source` and check the AST survives a JSON round trip
pub fn parse_roundtrip(source: &str) -> Program {
    let program = parser::parse(source).expect("Parse failed");
    let json = serde_json::to_string(&program).expect("Program serialization failed");
    let decoded: Program = serde_json::from_str(&json).expect("Program deserialization failed");
    let again = serde_json::to_string(&decoded).expect("Program serialization failed");
    assert_eq!(json, again, "AST changed across a JSON round trip");
    decoded
}

/// Evaluate `source` in a fresh runtime
pub fn eval(source: &str) -> Value {
    let mut rt = Runtime::new();
    eval_in(&mut rt, source)
}

/// Evaluate `source` in `rt`, panicking with the error on failure
pub fn eval_in(rt: &mut Runtime, source: &str) -> Value {
    parse_roundtrip(source);
    match rt.eval(source) {
        Ok(value) => value,
        Err(e) => panic!("Evaluation failed: {}", e),
    }
}

/// `inspect` of the value `source` evaluates to
pub fn eval_inspect(source: &str) -> String {
    let mut rt = Runtime::new();
    let value = eval_in(&mut rt, source);
    rt.inspect(&value).expect("inspect failed")
}

/// Evaluate `source`, expecting it to fail
pub fn eval_err(source: &str) -> Error {
    let mut rt = Runtime::new();
    match rt.eval(source) {
        Ok(value) => panic!("Expected an error, got {:?}", value),
        Err(e) => e,
    }
}

/// Lines written by `puts` and `p` while evaluating `source`
pub fn output_of(source: &str) -> Vec<String> {
    let mut rt = Runtime::new();
    eval_in(&mut rt, source);
    rt.take_output()
}
