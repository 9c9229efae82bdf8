//! Expression evaluation

use super::runtime::Runtime;
use super::types::{Expr, Flow, Value};
use crate::errors::{Error, ErrorKind};

/// Evaluate an expression in the current frame
pub(crate) fn eval_expr(rt: &mut Runtime, expr: &Expr) -> Flow<Value> {
    match expr {
        Expr::Nil => Ok(Value::Nil),
        Expr::True => Ok(Value::Bool(true)),
        Expr::False => Ok(Value::Bool(false)),
        Expr::SelfRef => Ok(rt.frame().self_val.clone()),
        Expr::Int { v } => Ok(Value::Int(*v)),
        Expr::Str { v, frozen } => Ok(if *frozen {
            Value::frozen_str(v.as_str())
        } else {
            Value::str(v.as_str())
        }),
        Expr::Sym { name } => Ok(Value::sym(name)),
        Expr::Array { items } => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(rt, item)?);
            }
            Ok(Value::array(values))
        }

        Expr::Ident { name, .. } => {
            if let Some(value) = rt.frame().locals.get(name) {
                return Ok(value.clone());
            }
            eval_variable_call(rt, name)
        }
        Expr::Ivar { name } => {
            let target = rt.frame().self_val.clone();
            Ok(rt.ivar_get(&target, name))
        }
        Expr::Gvar { name } => Ok(rt.global(name).unwrap_or(Value::Nil)),
        Expr::Const { path } => Ok(rt.lookup_const_path(path)?),

        Expr::Call {
            receiver,
            method,
            args,
            safe_nav,
            ..
        } => {
            let recv = match receiver {
                Some(expr) => Some(eval_expr(rt, expr)?),
                None => None,
            };
            if *safe_nav && matches!(recv, Some(Value::Nil)) {
                return Ok(Value::Nil);
            }

            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(rt, arg)?);
            }

            match recv {
                Some(recv) => Ok(rt.call_method(&recv, method, values)?),
                None => {
                    let target = rt.frame().self_val.clone();
                    Ok(rt.call_method(&target, method, values)?)
                }
            }
        }

        Expr::Not { inner } => Ok(Value::Bool(!eval_expr(rt, inner)?.is_truthy())),
        Expr::And { left, right } => {
            let left = eval_expr(rt, left)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            eval_expr(rt, right)
        }
        Expr::Or { left, right } => {
            let left = eval_expr(rt, left)?;
            if left.is_truthy() {
                return Ok(left);
            }
            eval_expr(rt, right)
        }
    }
}

/// A bare identifier that is not a local: a zero-argument call on `self`
fn eval_variable_call(rt: &mut Runtime, name: &str) -> Flow<Value> {
    let target = rt.frame().self_val.clone();
    if rt.find_method(&target, name).is_none() {
        return Err(Error::runtime(
            ErrorKind::NameError,
            format!(
                "undefined local variable or method '{}' for {}",
                name,
                rt.describe(&target)
            ),
        )
        .into());
    }
    Ok(rt.call_method(&target, name, Vec::new())?)
}
