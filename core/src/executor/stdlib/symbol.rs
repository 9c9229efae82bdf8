//! Symbol methods

use crate::errors::Error;
use crate::executor::runtime::Runtime;
use crate::executor::types::Value;

pub(crate) fn inject(rt: &mut Runtime) {
    let symbol = rt.builtins().symbol.clone();
    rt.define_native(&symbol, "to_s", to_s);
    rt.define_native(&symbol, "to_sym", to_sym);
    rt.define_native(&symbol, "length", length);
    rt.define_native(&symbol, "size", length);
}

fn to_s(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::str(recv.display()))
}

fn to_sym(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(recv.clone())
}

fn length(_rt: &mut Runtime, recv: &Value, _args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::Int(recv.display().chars().count() as i64))
}
