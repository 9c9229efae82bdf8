//! Array methods

use std::cell::RefCell;
use std::rc::Rc;

use super::{arg, expect_args, int_arg, MAX_COLLECTION_LEN};
use crate::errors::{Error, ErrorKind};
use crate::executor::runtime::Runtime;
use crate::executor::types::values::RArray;
use crate::executor::types::{NativeFn, Value};

pub(crate) fn inject(rt: &mut Runtime) {
    let array = rt.builtins().array.clone();
    let natives: &[(&str, NativeFn)] = &[
        ("length", length),
        ("size", length),
        ("<<", push),
        ("push", push),
        ("[]", index),
        ("[]=", set_index),
        ("first", first),
        ("last", last),
        ("include?", include),
        ("join", join),
        ("empty?", is_empty),
        ("+", concat),
        ("inspect", inspect),
        ("to_s", inspect),
    ];
    for (name, f) in natives {
        rt.define_native(&array, name, *f);
    }
}

fn array_ref(recv: &Value) -> Result<Rc<RefCell<RArray>>, Error> {
    match recv {
        Value::Array(a) => Ok(a.clone()),
        other => Err(Error::type_error(format!("{} is not an Array", other.inspect()))),
    }
}

fn check_frozen(array: &RArray) -> Result<(), Error> {
    if array.frozen {
        return Err(Error::runtime(ErrorKind::FrozenError, "can't modify frozen Array"));
    }
    Ok(())
}

/// Resolve a possibly negative index against `len`
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 {
        let back = index.unsigned_abs() as usize;
        len.checked_sub(back)
    } else {
        Some(index as usize)
    }
}

fn length(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    let len = a.borrow().items.len();
    Ok(Value::Int(len as i64))
}

fn push(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    check_frozen(&a.borrow())?;
    a.borrow_mut().items.extend(args);
    Ok(recv.clone())
}

fn index(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("[]", &args, 1..=1)?;
    let a = array_ref(recv)?;
    let i = int_arg(&args, 0)?;
    let array = a.borrow();
    let value = resolve_index(i, array.items.len()).and_then(|i| array.items.get(i).cloned());
    Ok(value.unwrap_or(Value::Nil))
}

/// Assigning past the end pads with `nil`
fn set_index(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("[]=", &args, 2..=2)?;
    let a = array_ref(recv)?;
    check_frozen(&a.borrow())?;
    let i = int_arg(&args, 0)?;
    let value = arg(&args, 1);

    let mut array = a.borrow_mut();
    let len = array.items.len();
    let slot = resolve_index(i, len)
        .ok_or_else(|| Error::runtime(ErrorKind::IndexError, format!("index {} too small for array", i)))?;
    if slot >= MAX_COLLECTION_LEN {
        return Err(Error::runtime(ErrorKind::IndexError, format!("index {} too big", i)));
    }
    if slot >= len {
        array.items.resize(slot + 1, Value::Nil);
    }
    array.items[slot] = value.clone();
    Ok(value)
}

fn first(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    let value = a.borrow().items.first().cloned();
    Ok(value.unwrap_or(Value::Nil))
}

fn last(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    let value = a.borrow().items.last().cloned();
    Ok(value.unwrap_or(Value::Nil))
}

fn include(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("include?", &args, 1..=1)?;
    let a = array_ref(recv)?;
    let needle = arg(&args, 0);
    let found = a.borrow().items.iter().any(|v| v.equals(&needle));
    Ok(Value::Bool(found))
}

fn join(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("join", &args, 0..=1)?;
    let a = array_ref(recv)?;
    let separator = arg(&args, 0).as_string().unwrap_or_default();
    let items = a.borrow().items.clone();

    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(rt.stringify(item)?);
    }
    Ok(Value::str(parts.join(&separator)))
}

fn is_empty(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    let empty = a.borrow().items.is_empty();
    Ok(Value::Bool(empty))
}

fn concat(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("+", &args, 1..=1)?;
    let a = array_ref(recv)?;
    let other = arg(&args, 0);
    let b = array_ref(&other)
        .map_err(|_| Error::type_error(format!("no implicit conversion of {} into Array", other.inspect())))?;

    let mut items = a.borrow().items.clone();
    items.extend(b.borrow().items.iter().cloned());
    Ok(Value::array(items))
}

fn inspect(rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let a = array_ref(recv)?;
    let items = a.borrow().items.clone();

    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(rt.inspect(item)?);
    }
    Ok(Value::str(format!("[{}]", parts.join(", "))))
}
