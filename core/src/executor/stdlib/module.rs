//! Module and Class methods: reflection, attribute macros and extension loading

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::{arg, expect_args, name_arg, recv_class};
use crate::errors::{Error, ErrorKind};
use crate::executor::runtime::{find_instance_method, Runtime};
use crate::executor::types::values::{ancestors, Instance, MethodBody};
use crate::executor::types::{ClassRef, Method, NativeFn, Value};

pub(crate) fn inject(rt: &mut Runtime) {
    let module = rt.builtins().module.clone();
    let module_natives: &[(&str, NativeFn)] = &[
        ("name", name),
        ("to_s", name),
        ("inspect", name),
        ("attr_reader", attr_reader),
        ("attr_writer", attr_writer),
        ("attr_accessor", attr_accessor),
        ("alias_method", alias_method),
        ("instance_method", instance_method),
        ("method_defined?", method_defined),
        ("instance_methods", instance_methods),
        ("const_get", const_get),
        ("ancestors", ancestors_of),
        ("load_extensions", load_extensions),
        ("autoload_extensions", autoload_extensions),
    ];
    for (name, f) in module_natives {
        rt.define_native(&module, name, *f);
    }

    let class = rt.builtins().class.clone();
    rt.define_native(&class, "new", new);
    rt.define_native(&class, "superclass", superclass);
}

/* ===================== Naming ===================== */

fn name(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let class = recv_class(recv)?;
    let name = class.borrow().name.clone();
    Ok(Value::str(name))
}

/* ===================== Attribute Macros ===================== */

/// Define readers and/or writers, attributed to the macro's call site
fn define_attrs(rt: &mut Runtime, recv: &Value, args: &[Value], reader: bool, writer: bool) -> Result<Value, Error> {
    let class = recv_class(recv)?;
    let location = rt.current_location();
    let mut defined = Vec::new();

    for index in 0..args.len() {
        let attr = name_arg(args, index)?;
        let ivar = format!("@{}", attr);
        if reader {
            let method = Method {
                name: attr.clone(),
                owner: class.clone(),
                body: MethodBody::AttrReader { ivar: ivar.clone() },
                location: Some(location.clone()),
            };
            rt.define_method(&class, method);
            defined.push(Value::sym(&attr));
        }
        if writer {
            let setter = format!("{}=", attr);
            let method = Method {
                name: setter.clone(),
                owner: class.clone(),
                body: MethodBody::AttrWriter { ivar },
                location: Some(location.clone()),
            };
            rt.define_method(&class, method);
            defined.push(Value::sym(&setter));
        }
    }

    Ok(Value::array(defined))
}

fn attr_reader(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    define_attrs(rt, recv, &args, true, false)
}

fn attr_writer(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    define_attrs(rt, recv, &args, false, true)
}

fn attr_accessor(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    define_attrs(rt, recv, &args, true, true)
}

fn alias_method(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("alias_method", &args, 2..=2)?;
    let class = recv_class(recv)?;
    let new_name = name_arg(&args, 0)?;
    let old_name = name_arg(&args, 1)?;

    let original = find_instance_method(&class, &old_name).ok_or_else(|| {
        Error::runtime(
            ErrorKind::NameError,
            format!("undefined method '{}' for class '{}'", old_name, class.borrow().name),
        )
    })?;
    rt.define_method(&class, original.renamed(new_name.clone()));
    Ok(Value::sym(&new_name))
}

/* ===================== Reflection ===================== */

fn instance_method(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("instance_method", &args, 1..=1)?;
    let class = recv_class(recv)?;
    let method_name = name_arg(&args, 0)?;
    match find_instance_method(&class, &method_name) {
        Some(method) => Ok(Value::Method(method)),
        None => Err(Error::runtime(
            ErrorKind::NameError,
            format!(
                "undefined method '{}' for class '{}'",
                method_name,
                class.borrow().name
            ),
        )),
    }
}

fn method_defined(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("method_defined?", &args, 1..=1)?;
    let class = recv_class(recv)?;
    let method_name = name_arg(&args, 0)?;
    Ok(Value::Bool(find_instance_method(&class, &method_name).is_some()))
}

/// Methods defined on the class and its user-defined ancestors, or only on
/// the class itself when called with `false`
fn instance_methods(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("instance_methods", &args, 0..=1)?;
    let class = recv_class(recv)?;
    let inherited = args.first().map_or(true, Value::is_truthy);
    let object = rt.builtins().object.clone();

    let chain: Vec<ClassRef> = if inherited {
        ancestors(&class)
            .into_iter()
            .filter(|c| !Rc::ptr_eq(c, &object))
            .collect()
    } else {
        vec![class]
    };

    let mut names: Vec<String> = chain
        .iter()
        .flat_map(|c| c.borrow().methods.keys().cloned().collect::<Vec<_>>())
        .collect();
    names.sort();
    names.dedup();
    Ok(Value::array(names.iter().map(|n| Value::sym(n)).collect()))
}

fn const_get(_rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("const_get", &args, 1..=1)?;
    let class = recv_class(recv)?;
    let const_name = name_arg(&args, 0)?;

    let mut current = Value::Class(class);
    for segment in const_name.split("::") {
        let owner = recv_class(&current)?;
        let found = ancestors(&owner)
            .iter()
            .find_map(|c| c.borrow().constants.get(segment).cloned());
        current = found.ok_or_else(|| {
            Error::runtime(
                ErrorKind::NameError,
                format!("uninitialized constant {}::{}", owner.borrow().name, segment),
            )
        })?;
    }
    Ok(current)
}

fn ancestors_of(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let class = recv_class(recv)?;
    Ok(Value::array(ancestors(&class).into_iter().map(Value::Class).collect()))
}

/* ===================== Extension Loading ===================== */

/// `load_extensions` / `load_extensions :key, "other"`
///
/// Keys are symbols or strings; arrays of keys are flattened.
fn load_extensions(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let class = recv_class(recv)?;

    let mut keys = Vec::new();
    for value in &args {
        match value {
            Value::Array(items) => {
                let items = items.borrow().items.clone();
                for index in 0..items.len() {
                    keys.push(name_arg(&items, index)?);
                }
            }
            _ => keys.push(name_arg(std::slice::from_ref(value), 0)?),
        }
    }

    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    rt.load_extensions(&class, &keys)?;
    Ok(Value::Nil)
}

/// Opt a base class into loading each new subclass's extensions
fn autoload_extensions(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("autoload_extensions", &args, 0..=0)?;
    let class = recv_class(recv)?;
    debug!(class = %class.borrow().name, "enabling extension autoloading for subclasses");
    rt.define_singleton_native(&class, "inherited", load_subclass_extensions);
    Ok(Value::Nil)
}

/// Native `inherited(subclass)` hook installed by `autoload_extensions`
fn load_subclass_extensions(rt: &mut Runtime, _recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    expect_args("inherited", &args, 1..=1)?;
    let subclass = recv_class(&arg(&args, 0))?;
    rt.load_extensions(&subclass, &[])?;
    Ok(Value::Nil)
}

/* ===================== Class ===================== */

fn new(rt: &mut Runtime, recv: &Value, args: Vec<Value>) -> Result<Value, Error> {
    let class = recv_class(recv)?;

    let builtins = rt.builtins().clone();
    if Rc::ptr_eq(&class, &builtins.string) {
        expect_args("new", &args, 0..=1)?;
        let value = arg(&args, 0);
        return Ok(Value::str(value.as_string().unwrap_or_default()));
    }
    if Rc::ptr_eq(&class, &builtins.array) {
        expect_args("new", &args, 0..=0)?;
        return Ok(Value::array(Vec::new()));
    }
    let immediate = [
        &builtins.integer,
        &builtins.symbol,
        &builtins.nil,
        &builtins.true_class,
        &builtins.false_class,
        &builtins.method,
        &builtins.class,
        &builtins.module,
    ];
    if immediate.iter().any(|c| Rc::ptr_eq(c, &class)) {
        return Err(Error::runtime(
            ErrorKind::NoMethodError,
            format!("undefined method 'new' for class {}", class.borrow().name),
        ));
    }

    let object = Value::Object(Rc::new(RefCell::new(Instance::new(class))));
    rt.call_method(&object, "initialize", args)?;
    Ok(object)
}

fn superclass(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let class = recv_class(recv)?;
    let parent = class.borrow().superclass.clone();
    Ok(parent.map(Value::Class).unwrap_or(Value::Nil))
}
