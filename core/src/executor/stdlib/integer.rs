//! Integer methods
//!
//! Division and modulo round toward negative infinity, like Ruby.

use super::{arg, expect_args};
use crate::errors::{Error, ErrorKind};
use crate::executor::runtime::Runtime;
use crate::executor::types::{NativeFn, Value};

pub(crate) fn inject(rt: &mut Runtime) {
    let integer = rt.builtins().integer.clone();
    let natives: &[(&str, NativeFn)] = &[
        ("+", add),
        ("-", sub),
        ("*", mul),
        ("/", div),
        ("%", rem),
        ("<", lt),
        ("<=", le),
        (">", gt),
        (">=", ge),
        ("-@", neg),
        ("to_s", to_s),
        ("zero?", is_zero),
    ];
    for (name, f) in natives {
        rt.define_native(&integer, name, *f);
    }
}

fn operands(op: &str, recv: &Value, args: &[Value]) -> Result<(i64, i64), Error> {
    expect_args(op, args, 1..=1)?;
    let lhs = recv
        .as_int()
        .ok_or_else(|| Error::type_error(format!("{} is not an Integer", recv.inspect())))?;
    let other = arg(args, 0);
    let rhs = other
        .as_int()
        .ok_or_else(|| Error::type_error(format!("{} can't be coerced into Integer", other.inspect())))?;
    Ok((lhs, rhs))
}

fn overflow() -> Error {
    Error::runtime(ErrorKind::RuntimeError, "integer overflow")
}

fn zero_division() -> Error {
    Error::runtime(ErrorKind::ZeroDivisionError, "divided by 0")
}

fn add(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = operands("+", recv, &args)?;
    a.checked_add(b).map(Value::Int).ok_or_else(overflow)
}

fn sub(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = operands("-", recv, &args)?;
    a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
}

fn mul(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = operands("*", recv, &args)?;
    a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
}

fn floor_div(a: i64, b: i64) -> Result<i64, Error> {
    if b == 0 {
        return Err(zero_division());
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn div(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = operands("/", recv, &args)?;
    floor_div(a, b).map(Value::Int)
}

fn rem(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = operands("%", recv, &args)?;
    let q = floor_div(a, b)?;
    Ok(Value::Int(a - b * q))
}

fn compare(op: &str, recv: &Value, args: &[Value]) -> Result<(i64, i64), Error> {
    operands(op, recv, args).map_err(|_| {
        Error::argument(format!(
            "comparison of Integer with {} failed",
            arg(args, 0).inspect()
        ))
    })
}

fn lt(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = compare("<", recv, &args)?;
    Ok(Value::Bool(a < b))
}

fn le(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = compare("<=", recv, &args)?;
    Ok(Value::Bool(a <= b))
}

fn gt(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = compare(">", recv, &args)?;
    Ok(Value::Bool(a > b))
}

fn ge(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let (a, b) = compare(">=", recv, &args)?;
    Ok(Value::Bool(a >= b))
}

fn neg(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let v = recv
        .as_int()
        .ok_or_else(|| Error::type_error(format!("{} is not an Integer", recv.inspect())))?;
    v.checked_neg().map(Value::Int).ok_or_else(overflow)
}

fn to_s(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::str(recv.display()))
}

fn is_zero(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Bool(recv.as_int() == Some(0)))
}
