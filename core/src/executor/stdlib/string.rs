//! String methods

use super::{arg, expect_args, int_arg, MAX_COLLECTION_LEN};
use crate::errors::Error;
use crate::executor::runtime::Runtime;
use crate::executor::types::values::RString;
use crate::executor::types::{NativeFn, Value};

use std::cell::RefCell;
use std::rc::Rc;

pub(crate) fn inject(rt: &mut Runtime) {
    let string = rt.builtins().string.clone();
    let natives: &[(&str, NativeFn)] = &[
        ("length", length),
        ("size", length),
        ("+", concat),
        ("*", repeat),
        ("<<", append),
        ("upcase", upcase),
        ("downcase", downcase),
        ("to_s", to_s),
        ("to_sym", to_sym),
        ("empty?", is_empty),
        ("include?", include),
        ("start_with?", start_with),
    ];
    for (name, f) in natives {
        rt.define_native(&string, name, *f);
    }
}

fn string_ref(recv: &Value) -> Result<Rc<RefCell<RString>>, Error> {
    match recv {
        Value::Str(s) => Ok(s.clone()),
        other => Err(Error::type_error(format!("{} is not a String", other.inspect()))),
    }
}

fn string_arg(args: &[Value], index: usize) -> Result<String, Error> {
    let value = arg(args, index);
    value
        .as_string()
        .ok_or_else(|| Error::type_error(format!("no implicit conversion of {} into String", value.inspect())))
}

fn length(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let s = string_ref(recv)?;
    let len = s.borrow().value.chars().count();
    Ok(Value::Int(len as i64))
}

fn concat(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("+", &args, 1..=1)?;
    let s = string_ref(recv)?;
    let other = string_arg(&args, 0)?;
    let joined = format!("{}{}", s.borrow().value, other);
    Ok(Value::str(joined))
}

fn repeat(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("*", &args, 1..=1)?;
    let s = string_ref(recv)?;
    let times = int_arg(&args, 0)?;
    if times < 0 {
        return Err(Error::argument("negative argument"));
    }
    let times = usize::try_from(times).map_err(|_| Error::argument("argument too big"))?;
    let len = s.borrow().value.len();
    match len.checked_mul(times) {
        Some(total) if total <= MAX_COLLECTION_LEN => {}
        _ => return Err(Error::argument("argument too big")),
    }
    let repeated = s.borrow().value.repeat(times);
    Ok(Value::str(repeated))
}

/// In-place append; raises `FrozenError` on frozen strings
fn append(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("<<", &args, 1..=1)?;
    let s = string_ref(recv)?;
    let other = string_arg(&args, 0)?;
    rt.check_frozen_str(&s.borrow())?;
    s.borrow_mut().value.push_str(&other);
    Ok(recv.clone())
}

fn upcase(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let s = string_ref(recv)?;
    let upper = s.borrow().value.to_uppercase();
    Ok(Value::str(upper))
}

fn downcase(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let s = string_ref(recv)?;
    let lower = s.borrow().value.to_lowercase();
    Ok(Value::str(lower))
}

fn to_s(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(recv.clone())
}

fn to_sym(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let s = string_ref(recv)?;
    let name = s.borrow().value.clone();
    Ok(Value::sym(&name))
}

fn is_empty(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let s = string_ref(recv)?;
    let empty = s.borrow().value.is_empty();
    Ok(Value::Bool(empty))
}

fn include(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("include?", &args, 1..=1)?;
    let s = string_ref(recv)?;
    let needle = string_arg(&args, 0)?;
    let found = s.borrow().value.contains(&needle);
    Ok(Value::Bool(found))
}

fn start_with(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("start_with?", &args, 1..=1)?;
    let s = string_ref(recv)?;
    let prefix = string_arg(&args, 0)?;
    let found = s.borrow().value.starts_with(&prefix);
    Ok(Value::Bool(found))
}
