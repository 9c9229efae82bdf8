//! Runtime value types

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::ast::Stmt;
use crate::errors::{Error, SourceLocation};
use crate::executor::Runtime;

/// Shared handle to a class or module
pub type ClassRef = Rc<RefCell<Class>>;

/// Signature of natively implemented methods: `(runtime, self, args)`
pub type NativeFn = fn(&mut Runtime, &Value, Vec<Value>) -> Result<Value, Error>;

/* ===================== Values ===================== */

/// Runtime value
///
/// Strings, arrays, objects and classes are reference types; cloning a `Value`
/// clones the handle, not the referent.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Rc<RefCell<RString>>),
    Sym(Rc<str>),
    Array(Rc<RefCell<RArray>>),
    Object(Rc<RefCell<Instance>>),
    Class(ClassRef),
    Method(Rc<Method>),
}

impl Value {
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(Rc::new(RefCell::new(RString {
            value: value.into(),
            frozen: false,
        })))
    }

    pub fn frozen_str(value: impl Into<String>) -> Self {
        Value::Str(Rc::new(RefCell::new(RString {
            value: value.into(),
            frozen: true,
        })))
    }

    pub fn sym(name: &str) -> Self {
        Value::Sym(Rc::from(name))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(RArray {
            items,
            frozen: false,
        })))
    }

    /// `nil` and `false` are falsy, everything else is truthy
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Contents of a string value
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.borrow().value.clone()),
            _ => None,
        }
    }

    /// Name of a symbol or string value
    pub fn as_name(&self) -> Option<String> {
        match self {
            Value::Sym(name) => Some(name.to_string()),
            Value::Str(s) => Some(s.borrow().value.clone()),
            _ => None,
        }
    }

    /// Object identity for reference types, value identity for immediates
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality used by the builtin `==` implementations
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.borrow().value == b.borrow().value,
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.items.len() == b.items.len()
                    && a.items.iter().zip(b.items.iter()).all(|(x, y)| x.equals(y))
            }
            _ => self.same(other),
        }
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            Value::Str(s) => s.borrow().frozen,
            Value::Array(a) => a.borrow().frozen,
            Value::Object(o) => o.borrow().frozen,
            // Immediates and methods cannot be mutated
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Sym(_) | Value::Method(_) => true,
            Value::Class(_) => false,
        }
    }

    /// `inspect` representation for values that need no method dispatch
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Str(s) => format!("{:?}", s.borrow().value),
            Value::Sym(name) => format!(":{}", name),
            Value::Array(a) => {
                let items: Vec<String> = a.borrow().items.iter().map(|v| v.inspect()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(o) => format!("#<{}>", o.borrow().class.borrow().name),
            Value::Class(c) => c.borrow().name.clone(),
            Value::Method(m) => format!("#<Method: {}#{}>", m.owner.borrow().name, m.name),
        }
    }

    /// `to_s` representation for values that need no method dispatch
    pub fn display(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Str(s) => s.borrow().value.clone(),
            Value::Sym(name) => name.to_string(),
            Value::Array(_) => self.inspect(),
            other => other.inspect(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

/* ===================== Heap Objects ===================== */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RString {
    pub value: String,
    pub frozen: bool,
}

#[derive(Debug, Clone)]
pub struct RArray {
    pub items: Vec<Value>,
    pub frozen: bool,
}

/// Instance of a user-defined (or builtin) class
pub struct Instance {
    pub class: ClassRef,
    pub ivars: HashMap<String, Value>,
    pub frozen: bool,
}

impl Instance {
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            ivars: HashMap::new(),
            frozen: false,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.borrow().name)
            .field("ivars", &self.ivars)
            .field("frozen", &self.frozen)
            .finish()
    }
}

/* ===================== Classes ===================== */

/// A class or module
///
/// Classes are open: methods, constants and class-level instance variables can
/// be added at any time by reopening the class or evaluating code in it.
pub struct Class {
    /// Fully qualified name (`Blog::Comment`)
    pub name: String,
    pub superclass: Option<ClassRef>,
    pub is_module: bool,
    /// Instance methods
    pub methods: HashMap<String, Rc<Method>>,
    /// Class-level (`def self.x`) methods
    pub singleton_methods: HashMap<String, Rc<Method>>,
    pub constants: HashMap<String, Value>,
    pub ivars: HashMap<String, Value>,
    /// Where the class was first declared
    pub origin: Option<SourceLocation>,
}

impl Class {
    pub fn new(name: impl Into<String>, superclass: Option<ClassRef>, is_module: bool) -> Self {
        Self {
            name: name.into(),
            superclass,
            is_module,
            methods: HashMap::new(),
            singleton_methods: HashMap::new(),
            constants: HashMap::new(),
            ivars: HashMap::new(),
            origin: None,
        }
    }

    pub fn into_ref(self) -> ClassRef {
        Rc::new(RefCell::new(self))
    }

    /// Last `::` segment of the name
    pub fn simple_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|s| s.borrow().name.clone()),
            )
            .field("is_module", &self.is_module)
            .field("methods", &methods)
            .finish()
    }
}

/// Walk `class` and its superclasses, innermost first
pub fn ancestors(class: &ClassRef) -> Vec<ClassRef> {
    let mut chain = Vec::new();
    let mut current = Some(class.clone());
    while let Some(c) = current {
        current = c.borrow().superclass.clone();
        chain.push(c);
    }
    chain
}

/// Whether `class` is `other` or inherits from it
pub fn inherits(class: &ClassRef, other: &ClassRef) -> bool {
    ancestors(class).iter().any(|c| Rc::ptr_eq(c, other))
}

/* ===================== Methods ===================== */

pub enum MethodBody {
    User {
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
        /// Lexical class nesting at the point of definition, for constant lookup
        cref: Vec<ClassRef>,
    },
    Native(NativeFn),
    AttrReader {
        ivar: String,
    },
    AttrWriter {
        ivar: String,
    },
}

pub struct Method {
    pub name: String,
    pub owner: ClassRef,
    pub body: MethodBody,
    pub location: Option<SourceLocation>,
}

impl Method {
    pub fn native(name: impl Into<String>, owner: ClassRef, f: NativeFn) -> Self {
        Self {
            name: name.into(),
            owner,
            body: MethodBody::Native(f),
            location: None,
        }
    }

    /// Number of required arguments, or -1 for natives that take any number
    pub fn arity(&self) -> i64 {
        match &self.body {
            MethodBody::User { params, .. } => params.len() as i64,
            MethodBody::Native(_) => -1,
            MethodBody::AttrReader { .. } => 0,
            MethodBody::AttrWriter { .. } => 1,
        }
    }

    /// Copy of this method under a new name (for `alias_method`)
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let body = match &self.body {
            MethodBody::User { params, body, cref } => MethodBody::User {
                params: params.clone(),
                body: body.clone(),
                cref: cref.clone(),
            },
            MethodBody::Native(f) => MethodBody::Native(*f),
            MethodBody::AttrReader { ivar } => MethodBody::AttrReader { ivar: ivar.clone() },
            MethodBody::AttrWriter { ivar } => MethodBody::AttrWriter { ivar: ivar.clone() },
        };
        Self {
            name: name.into(),
            owner: self.owner.clone(),
            body,
            location: self.location.clone(),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.body {
            MethodBody::User { .. } => "user",
            MethodBody::Native(_) => "native",
            MethodBody::AttrReader { .. } => "attr_reader",
            MethodBody::AttrWriter { .. } => "attr_writer",
        };
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("owner", &self.owner.borrow().name)
            .field("kind", &kind)
            .field("location", &self.location)
            .finish()
    }
}
