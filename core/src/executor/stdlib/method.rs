//! Method objects, returned by `method` and `instance_method`

use std::rc::Rc;

use crate::errors::Error;
use crate::executor::runtime::Runtime;
use crate::executor::types::{Method, Value};

pub(crate) fn inject(rt: &mut Runtime) {
    let method = rt.builtins().method.clone();
    rt.define_native(&method, "source_location", source_location);
    rt.define_native(&method, "name", name);
    rt.define_native(&method, "owner", owner);
    rt.define_native(&method, "arity", arity);
}

fn method_ref(recv: &Value) -> Result<Rc<Method>, Error> {
    match recv {
        Value::Method(m) => Ok(m.clone()),
        other => Err(Error::type_error(format!("{} is not a Method", other.inspect()))),
    }
}

/// `[file, line]`, or `nil` for natives
fn source_location(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let method = method_ref(recv)?;
    Ok(match &method.location {
        Some(location) => {
            let file = match &location.file {
                Some(path) => path.display().to_string(),
                None => "(eval)".to_string(),
            };
            Value::array(vec![Value::str(file), Value::Int(location.line as i64)])
        }
        None => Value::Nil,
    })
}

fn name(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let method = method_ref(recv)?;
    Ok(Value::sym(&method.name))
}

fn owner(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let method = method_ref(recv)?;
    Ok(Value::Class(method.owner.clone()))
}

fn arity(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    let method = method_ref(recv)?;
    Ok(Value::Int(method.arity()))
}
