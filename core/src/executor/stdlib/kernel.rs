//! Kernel methods, available on every object

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{arg, expect_args, name_arg};
use crate::errors::{Error, ErrorKind};
use crate::executor::runtime::Runtime;
use crate::executor::types::values::{inherits, Class, Instance, RArray, RString};
use crate::executor::types::Value;

pub(crate) fn inject(rt: &mut Runtime) {
    let object = rt.builtins().object.clone();
    let natives: &[(&str, crate::executor::types::NativeFn)] = &[
        ("initialize", initialize),
        ("puts", puts),
        ("p", p),
        ("raise", raise),
        ("require", require),
        ("require_relative", require_relative),
        ("class", class),
        ("respond_to?", respond_to),
        ("send", send),
        ("public_send", send),
        ("is_a?", is_a),
        ("kind_of?", is_a),
        ("nil?", is_nil),
        ("==", equals),
        ("!=", not_equals),
        ("!", not),
        ("to_s", to_s),
        ("inspect", inspect),
        ("freeze", freeze),
        ("frozen?", is_frozen),
        ("dup", dup),
        ("instance_variable_get", instance_variable_get),
        ("instance_variable_set", instance_variable_set),
        ("instance_variables", instance_variables),
        ("method", method),
    ];
    for (name, f) in natives {
        rt.define_native(&object, name, *f);
    }
    define_exception_classes(rt);
}

/// Constants for `raise SomeError, "message"`; `raise` maps them back to an `ErrorKind`
fn define_exception_classes(rt: &mut Runtime) {
    let object = rt.builtins().object.clone();
    let standard = Class::new("StandardError", Some(object.clone()), false).into_ref();
    object
        .borrow_mut()
        .constants
        .insert("StandardError".to_string(), Value::Class(standard.clone()));

    for kind in ErrorKind::all() {
        let class = Class::new(kind.as_str(), Some(standard.clone()), false).into_ref();
        object
            .borrow_mut()
            .constants
            .insert(kind.as_str().to_string(), Value::Class(class));
    }
}

fn initialize(_rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("initialize", &args, 0..=0)?;
    Ok(Value::Nil)
}

/* ===================== Output ===================== */

fn puts(rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    if args.is_empty() {
        rt.write_output(String::new());
    }
    for value in &args {
        match value {
            Value::Array(items) => {
                let items = items.borrow().items.clone();
                for item in &items {
                    let line = rt.stringify(item)?;
                    rt.write_output(line);
                }
            }
            other => {
                let line = rt.stringify(other)?;
                rt.write_output(line);
            }
        }
    }
    Ok(Value::Nil)
}

fn p(rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    for value in &args {
        let line = rt.inspect(value)?;
        rt.write_output(line);
    }
    Ok(match args.len() {
        0 => Value::Nil,
        1 => arg(&args, 0),
        _ => Value::array(args),
    })
}

/* ===================== Errors ===================== */

/// `raise "message"` or `raise ArgumentError, "message"`
fn raise(_rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("raise", &args, 0..=2)?;
    let (kind, message) = match (arg(&args, 0), arg(&args, 1)) {
        (Value::Class(class), message) => {
            let name = class.borrow().name.clone();
            let kind = ErrorKind::from_name(&name).unwrap_or(ErrorKind::RuntimeError);
            let message = if message.is_nil() { name } else { message.display() };
            (kind, message)
        }
        (Value::Nil, _) => (ErrorKind::RuntimeError, "unhandled exception".to_string()),
        (message, _) => (ErrorKind::RuntimeError, message.display()),
    };
    Err(Error::runtime(kind, message))
}

/* ===================== Loading ===================== */

/// Append the configured suffix when the path has no extension
fn feature_path(rt: &Runtime, base: &Path, name: &str) -> PathBuf {
    let mut path = base.join(name);
    if path.extension().is_none() {
        path.set_extension(&rt.config().extension_suffix);
    }
    path
}

fn require(rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("require", &args, 1..=1)?;
    let name = name_arg(&args, 0)?;
    let base = rt
        .config()
        .root_dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default();
    let path = feature_path(rt, &base, &name);
    Ok(Value::Bool(rt.require(path)?))
}

fn require_relative(rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("require_relative", &args, 1..=1)?;
    let name = name_arg(&args, 0)?;
    let base = rt.current_dir().ok_or_else(|| {
        Error::runtime(ErrorKind::RuntimeError, "cannot infer basepath for require_relative")
    })?;
    let path = feature_path(rt, &base, &name);
    Ok(Value::Bool(rt.require(path)?))
}

/* ===================== Reflection ===================== */

fn class(rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Class(rt.class_of(recv)))
}

fn respond_to(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("respond_to?", &args, 1..=1)?;
    let name = name_arg(&args, 0)?;
    Ok(Value::Bool(rt.respond_to(recv, &name)))
}

fn send(rt: &mut Runtime, recv: &Value, mut args: Vec<Value>) -> Result<Value, Error> {
    if args.is_empty() {
        return Err(Error::argument("no method name given"));
    }
    let name = name_arg(&args, 0)?;
    args.remove(0);
    rt.call_method(recv, &name, args)
}

fn is_a(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("is_a?", &args, 1..=1)?;
    match arg(&args, 0) {
        Value::Class(class) => Ok(Value::Bool(inherits(&rt.class_of(recv), &class))),
        _ => Err(Error::type_error("class or module required")),
    }
}

fn is_nil(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Bool(recv.is_nil()))
}

fn equals(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("==", &args, 1..=1)?;
    Ok(Value::Bool(recv.equals(&arg(&args, 0))))
}

fn not_equals(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let equal = rt.call_method(recv, "==", args)?;
    Ok(Value::Bool(!equal.is_truthy()))
}

fn not(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Bool(!recv.is_truthy()))
}

fn to_s(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::str(recv.display()))
}

fn inspect(rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let Value::Object(object) = recv else {
        return Ok(Value::str(recv.inspect()));
    };

    let (class_name, mut ivars) = {
        let object = object.borrow();
        let ivars: Vec<(String, Value)> = object
            .ivars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let class_name = object.class.borrow().name.clone();
        (class_name, ivars)
    };
    if ivars.is_empty() {
        return Ok(Value::str(format!("#<{}>", class_name)));
    }

    ivars.sort_by(|a, b| a.0.cmp(&b.0));
    let mut parts = Vec::with_capacity(ivars.len());
    for (name, value) in &ivars {
        parts.push(format!("{}={}", name, rt.inspect(value)?));
    }
    Ok(Value::str(format!("#<{} {}>", class_name, parts.join(", "))))
}

/* ===================== Mutability ===================== */

fn freeze(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    match recv {
        Value::Str(s) => s.borrow_mut().frozen = true,
        Value::Array(a) => a.borrow_mut().frozen = true,
        Value::Object(o) => o.borrow_mut().frozen = true,
        _ => {}
    }
    Ok(recv.clone())
}

fn is_frozen(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Bool(recv.is_frozen()))
}

/// Shallow, unfrozen copy
fn dup(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(match recv {
        Value::Str(s) => Value::Str(Rc::new(RefCell::new(RString {
            value: s.borrow().value.clone(),
            frozen: false,
        }))),
        Value::Array(a) => Value::Array(Rc::new(RefCell::new(RArray {
            items: a.borrow().items.clone(),
            frozen: false,
        }))),
        Value::Object(o) => {
            let source = o.borrow();
            let mut copy = Instance::new(source.class.clone());
            copy.ivars = source.ivars.clone();
            Value::Object(Rc::new(RefCell::new(copy)))
        }
        other => other.clone(),
    })
}

/* ===================== Instance Variables ===================== */

fn ivar_name(args: &[Value]) -> Result<String, Error> {
    let name = name_arg(args, 0)?;
    if !name.starts_with('@') {
        return Err(Error::runtime(
            ErrorKind::NameError,
            format!("'{}' is not allowed as an instance variable name", name),
        ));
    }
    Ok(name)
}

fn instance_variable_get(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("instance_variable_get", &args, 1..=1)?;
    let name = ivar_name(&args)?;
    Ok(rt.ivar_get(recv, &name))
}

fn instance_variable_set(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("instance_variable_set", &args, 2..=2)?;
    let name = ivar_name(&args)?;
    let value = arg(&args, 1);
    rt.ivar_set(recv, &name, value.clone())?;
    Ok(value)
}

fn instance_variables(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let mut names: Vec<String> = match recv {
        Value::Object(o) => o.borrow().ivars.keys().cloned().collect(),
        Value::Class(c) => c.borrow().ivars.keys().cloned().collect(),
        _ => Vec::new(),
    };
    names.sort();
    Ok(Value::array(names.iter().map(|n| Value::sym(n)).collect()))
}

fn method(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("method", &args, 1..=1)?;
    let name = name_arg(&args, 0)?;
    match rt.find_method(recv, &name) {
        Some(method) => Ok(Value::Method(method)),
        None => Err(Error::runtime(
            ErrorKind::NameError,
            format!("undefined method '{}' for {}", name, rt.describe(recv)),
        )),
    }
}
