//! Statement execution
//!
//! Each statement kind has its own handler. Handlers return the statement's
//! value so a body evaluates to its last statement, like a Ruby class body.

use super::expressions::eval_expr;
use super::runtime::Runtime;
use super::types::ast::{AssignOp, AssignTarget, Span};
use super::types::values::MethodBody;
use super::types::{Control, Expr, Flow, Frame, Method, Stmt, Value};
use crate::errors::{Error, SourceLocation};

use std::rc::Rc;

/* ===================== Bodies ===================== */

pub(crate) fn exec_body(rt: &mut Runtime, body: &[Stmt]) -> Flow<Value> {
    let mut last = Value::Nil;
    for stmt in body {
        last = exec_stmt(rt, stmt)?;
    }
    Ok(last)
}

pub(crate) fn exec_stmt(rt: &mut Runtime, stmt: &Stmt) -> Flow<Value> {
    let line = stmt.span().line();
    rt.frame_mut().line = line;

    let result = match stmt {
        Stmt::Expr { expr, .. } => eval_expr(rt, expr),
        Stmt::Assign {
            target, op, value, ..
        } => execute_assign(rt, target, op, value),
        Stmt::Namespace {
            path,
            is_module,
            superclass,
            body,
            span,
        } => execute_namespace(rt, path, *is_module, superclass.as_ref(), body, span),
        Stmt::Def {
            name,
            params,
            singleton,
            body,
            span,
        } => execute_def(rt, name, params, *singleton, body, span),
        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            if eval_expr(rt, test)?.is_truthy() {
                exec_body(rt, then_s)
            } else {
                exec_body(rt, else_s)
            }
        }
        Stmt::While { test, body, .. } => {
            while eval_expr(rt, test)?.is_truthy() {
                exec_body(rt, body)?;
            }
            Ok(Value::Nil)
        }
        Stmt::Return { value, .. } => {
            let value = match value {
                Some(expr) => eval_expr(rt, expr)?,
                None => Value::Nil,
            };
            Err(Control::Return(value))
        }
    };

    // Errors are attributed to the innermost statement that raised them
    result.map_err(|control| match control {
        Control::Throw(err) => Control::Throw(rt.locate(err)),
        other => other,
    })
}

/* ===================== Classes & Methods ===================== */

/// `class Path [< Super] ... end` / `module Path ... end`
fn execute_namespace(
    rt: &mut Runtime,
    path: &str,
    is_module: bool,
    superclass: Option<&Expr>,
    body: &[Stmt],
    span: &Span,
) -> Flow<Value> {
    let (owner, name) = match path.rsplit_once("::") {
        Some((prefix, name)) => match rt.lookup_const_path(prefix)? {
            Value::Class(owner) => (owner, name),
            other => {
                return Err(Error::type_error(format!("{} is not a class/module", other.inspect())).into())
            }
        },
        None => (rt.lexical_owner(), path),
    };

    let superclass = match superclass {
        Some(expr) => match eval_expr(rt, expr)? {
            Value::Class(c) if !c.borrow().is_module => Some(c),
            other => {
                return Err(Error::type_error(format!(
                    "superclass must be a Class ({} given)",
                    other.inspect()
                ))
                .into())
            }
        },
        None => None,
    };

    let origin = SourceLocation::new(rt.frame().file.clone(), span.line());
    let class = rt.open_class(&owner, name, superclass, is_module, Some(origin))?;

    let mut cref = rt.frame().cref.clone();
    cref.push(class.clone());
    let frame = Frame::new(
        Value::Class(class.clone()),
        class,
        cref,
        rt.frame().file.clone(),
    );
    Ok(rt.run_frame(frame, body)?)
}

/// `def name(params) ... end` / `def self.name(params) ... end`
fn execute_def(
    rt: &mut Runtime,
    name: &str,
    params: &[String],
    singleton: bool,
    body: &[Stmt],
    span: &Span,
) -> Flow<Value> {
    let frame = rt.frame();
    let location = SourceLocation::new(frame.file.clone(), span.line());
    let target = if singleton {
        match &frame.self_val {
            Value::Class(class) => class.clone(),
            other => {
                return Err(Error::type_error(format!(
                    "can't define singleton method '{}' for {}",
                    name,
                    other.inspect()
                ))
                .into())
            }
        }
    } else {
        frame.definee.clone()
    };

    let method = Method {
        name: name.to_string(),
        owner: target.clone(),
        body: MethodBody::User {
            params: params.to_vec(),
            body: Rc::new(body.to_vec()),
            cref: frame.cref.clone(),
        },
        location: Some(location),
    };

    if singleton {
        rt.define_singleton_method(&target, method);
    } else {
        rt.define_method(&target, method);
    }
    Ok(Value::sym(name))
}

/* ===================== Assignment ===================== */

/// Assignment target with its receiver already evaluated
enum Place {
    Local(String),
    Ivar(String),
    Gvar(String),
    Const(String),
    Attr(Value, String),
    Index(Value, Value),
}

fn execute_assign(rt: &mut Runtime, target: &AssignTarget, op: &AssignOp, value: &Expr) -> Flow<Value> {
    let place = resolve_place(rt, target)?;

    let new_value = match op {
        AssignOp::Set => eval_expr(rt, value)?,
        AssignOp::OrSet => {
            let current = read_place(rt, &place)?;
            if current.is_truthy() {
                return Ok(current);
            }
            eval_expr(rt, value)?
        }
        AssignOp::AndSet => {
            let current = read_place(rt, &place)?;
            if !current.is_truthy() {
                return Ok(current);
            }
            eval_expr(rt, value)?
        }
        AssignOp::Op { op } => {
            let current = read_place(rt, &place)?;
            let rhs = eval_expr(rt, value)?;
            rt.call_method(&current, op, vec![rhs])?
        }
    };

    write_place(rt, place, new_value.clone())?;
    Ok(new_value)
}

fn resolve_place(rt: &mut Runtime, target: &AssignTarget) -> Flow<Place> {
    Ok(match target {
        AssignTarget::Local { name } => Place::Local(name.clone()),
        AssignTarget::Ivar { name } => Place::Ivar(name.clone()),
        AssignTarget::Gvar { name } => Place::Gvar(name.clone()),
        AssignTarget::Const { name } => Place::Const(name.clone()),
        AssignTarget::Attr { receiver, name } => Place::Attr(eval_expr(rt, receiver)?, name.clone()),
        AssignTarget::Index { receiver, index } => {
            let receiver = eval_expr(rt, receiver)?;
            let index = eval_expr(rt, index)?;
            Place::Index(receiver, index)
        }
    })
}

fn read_place(rt: &mut Runtime, place: &Place) -> Flow<Value> {
    Ok(match place {
        Place::Local(name) => rt.frame().locals.get(name).cloned().unwrap_or(Value::Nil),
        Place::Ivar(name) => rt.ivar_get(&rt.frame().self_val.clone(), name),
        Place::Gvar(name) => rt.global(name).unwrap_or(Value::Nil),
        Place::Const(name) => rt.lookup_const(name).unwrap_or(Value::Nil),
        Place::Attr(receiver, name) => rt.call_method(receiver, name, Vec::new())?,
        Place::Index(receiver, index) => rt.call_method(receiver, "[]", vec![index.clone()])?,
    })
}

fn write_place(rt: &mut Runtime, place: Place, value: Value) -> Flow<()> {
    match place {
        Place::Local(name) => {
            rt.frame_mut().locals.insert(name, value);
        }
        Place::Ivar(name) => {
            let target = rt.frame().self_val.clone();
            rt.ivar_set(&target, &name, value)?;
        }
        Place::Gvar(name) => rt.set_global(&name, value),
        Place::Const(name) => {
            let owner = rt.lexical_owner();
            owner.borrow_mut().constants.insert(name, value);
        }
        Place::Attr(receiver, name) => {
            rt.call_method(&receiver, &format!("{}=", name), vec![value])?;
        }
        Place::Index(receiver, index) => {
            rt.call_method(&receiver, "[]=", vec![index, value])?;
        }
    }
    Ok(())
}
