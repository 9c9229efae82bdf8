//! Standard library method implementations
//!
//! Natives are plain `fn(&mut Runtime, &Value, Vec<Value>)` pointers installed
//! into the builtin classes' method tables, so Annex code can reopen, alias and
//! override them like any other method.

pub mod array;
pub mod integer;
pub mod kernel;
pub mod method;
pub mod module;
pub mod string;
pub mod symbol;

use std::ops::RangeInclusive;

use super::runtime::Runtime;
use super::types::{ClassRef, Value};
use crate::errors::Error;

/// Largest string (in bytes) or array (in items) a native may build
pub(crate) const MAX_COLLECTION_LEN: usize = 1 << 26;

/* ===================== Environment Injection ===================== */

/// Install native methods on the builtin classes
///
/// Called once by the runtime builder.
pub fn inject_stdlib(rt: &mut Runtime) {
    kernel::inject(rt);
    module::inject(rt);
    string::inject(rt);
    symbol::inject(rt);
    integer::inject(rt);
    array::inject(rt);
    method::inject(rt);
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn expect_args(name: &str, args: &[Value], range: RangeInclusive<usize>) -> Result<(), Error> {
    if range.contains(&args.len()) {
        return Ok(());
    }
    let expected = if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("{}..{}", range.start(), range.end())
    };
    Err(Error::argument(format!(
        "wrong number of arguments calling '{}' (given {}, expected {})",
        name,
        args.len(),
        expected
    )))
}

/// Argument `index`, or `nil` when absent
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Nil)
}

/// Symbol or string argument naming a method, variable or constant
pub(crate) fn name_arg(args: &[Value], index: usize) -> Result<String, Error> {
    let value = arg(args, index);
    value
        .as_name()
        .ok_or_else(|| Error::type_error(format!("{} is not a symbol nor a string", value.inspect())))
}

pub(crate) fn int_arg(args: &[Value], index: usize) -> Result<i64, Error> {
    let value = arg(args, index);
    value
        .as_int()
        .ok_or_else(|| Error::type_error(format!("no implicit conversion of {} into Integer", value.inspect())))
}

pub(crate) fn recv_class(recv: &Value) -> Result<ClassRef, Error> {
    recv.as_class()
        .cloned()
        .ok_or_else(|| Error::type_error(format!("{} is not a class/module", recv.inspect())))
}
