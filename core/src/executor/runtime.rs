//! Runtime state
//!
//! The runtime owns everything an Annex program can observe:
//! - the class table (rooted at `Object`'s constants)
//! - the frame stack
//! - globals and the `require` cache
//! - the extension loader and its ledger

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use super::statements::exec_body;
use super::stdlib::inject_stdlib;
use super::types::values::{ancestors, Class, Instance, RString};
use super::types::{ClassRef, Control, Frame, Method, MethodBody, NativeFn, Stmt, Value};
use crate::config::Config;
use crate::errors::{Error, ErrorKind, RuntimeError, SourceLocation};
use crate::loader::{ExtensionLoader, LoadLedger, LoadReport};
use crate::parser::{self, Origin};

/* ===================== Builtins ===================== */

/// Handles to the builtin classes, installed as constants on `Object`
#[derive(Debug, Clone)]
pub struct Builtins {
    pub object: ClassRef,
    pub module: ClassRef,
    pub class: ClassRef,
    pub string: ClassRef,
    pub symbol: ClassRef,
    pub integer: ClassRef,
    pub array: ClassRef,
    pub nil: ClassRef,
    pub true_class: ClassRef,
    pub false_class: ClassRef,
    pub method: ClassRef,
}

impl Builtins {
    fn new() -> Self {
        let object = Class::new("Object", None, false).into_ref();
        let child = |name: &str, superclass: &ClassRef| {
            Class::new(name, Some(superclass.clone()), false).into_ref()
        };
        let module = child("Module", &object);
        let class = child("Class", &module);

        let builtins = Self {
            string: child("String", &object),
            symbol: child("Symbol", &object),
            integer: child("Integer", &object),
            array: child("Array", &object),
            nil: child("NilClass", &object),
            true_class: child("TrueClass", &object),
            false_class: child("FalseClass", &object),
            method: child("Method", &object),
            object,
            module,
            class,
        };

        for class in builtins.all() {
            let name = class.borrow().name.clone();
            builtins
                .object
                .borrow_mut()
                .constants
                .insert(name, Value::Class(class.clone()));
        }

        builtins
    }

    fn all(&self) -> [&ClassRef; 11] {
        [
            &self.object,
            &self.module,
            &self.class,
            &self.string,
            &self.symbol,
            &self.integer,
            &self.array,
            &self.nil,
            &self.true_class,
            &self.false_class,
            &self.method,
        ]
    }
}

/* ===================== Builder ===================== */

/// Builder for a [`Runtime`]
///
/// ```rust
/// use annex_core::{LoadLedger, Runtime};
///
/// let ledger = LoadLedger::new();
/// let mut rt = Runtime::builder().ledger(ledger.clone()).root_dir("app").build();
/// rt.eval("class Post; end").unwrap();
/// ```
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: Option<Config>,
    ledger: Option<LoadLedger>,
    root_dir: Option<PathBuf>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Share a fragment ledger with other runtimes (defaults to a fresh one)
    pub fn ledger(mut self, ledger: LoadLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Directory extensions are resolved against when nothing better is known
    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    pub fn build(self) -> Runtime {
        let mut config = self.config.unwrap_or_default();
        if let Some(root_dir) = self.root_dir {
            config.root_dir = Some(root_dir);
        }
        let ledger = self.ledger.unwrap_or_default();
        Runtime::with_parts(config, ledger)
    }
}

/* ===================== Runtime ===================== */

/// An Annex interpreter instance
///
/// Single-threaded: values are `Rc`-based, so a runtime never leaves the
/// thread that created it. Only the [`LoadLedger`] is shareable.
pub struct Runtime {
    config: Config,
    loader: ExtensionLoader,
    builtins: Builtins,
    main: Value,
    globals: HashMap<String, Value>,
    loaded_features: HashSet<PathBuf>,
    root: Frame,
    frames: Vec<Frame>,
    output: Vec<String>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    fn with_parts(config: Config, ledger: LoadLedger) -> Self {
        let builtins = Builtins::new();
        let main = Value::Object(Rc::new(RefCell::new(Instance::new(builtins.object.clone()))));
        let root = Frame::new(main.clone(), builtins.object.clone(), Vec::new(), None);
        let loader = ExtensionLoader::from_config(&config, ledger);

        let mut rt = Self {
            config,
            loader,
            builtins,
            main,
            globals: HashMap::new(),
            loaded_features: HashSet::new(),
            root,
            frames: Vec::new(),
            output: Vec::new(),
        };
        inject_stdlib(&mut rt);
        rt
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    pub fn ledger(&self) -> &LoadLedger {
        self.loader.ledger()
    }

    pub fn main(&self) -> &Value {
        &self.main
    }

    /* ---------- evaluation ---------- */

    /// Evaluate source at the top level, attributed to `(eval)`
    pub fn eval(&mut self, source: &str) -> Result<Value, Error> {
        let frame = self.top_level_frame(None);
        self.run_source(source, Origin::eval(), frame)
    }

    /// Execute a file at the top level, whether or not it ran before
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let frame = self.top_level_frame(Some(path.to_path_buf()));
        self.run_source(&source, Origin::new(Some(path.to_path_buf()), 1), frame)
    }

    /// Execute a file at most once per canonical path
    ///
    /// Returns `false` when the file had already been required. A file that
    /// raises is forgotten again, so it can be retried.
    pub fn require(&mut self, path: impl AsRef<Path>) -> Result<bool, Error> {
        let path = fs::canonicalize(path.as_ref())?;
        if !self.loaded_features.insert(path.clone()) {
            debug!(path = %path.display(), "already required");
            return Ok(false);
        }

        debug!(path = %path.display(), "requiring");
        match self.eval_file(&path) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.loaded_features.remove(&path);
                Err(e)
            }
        }
    }

    pub fn is_required(&self, path: impl AsRef<Path>) -> bool {
        fs::canonicalize(path.as_ref())
            .map(|p| self.loaded_features.contains(&p))
            .unwrap_or(false)
    }

    /// Evaluate `source` as if it were written inside `class`'s body
    ///
    /// Methods defined by the source report `file` as their origin, with line
    /// numbers counted from `first_line`.
    pub fn class_eval(
        &mut self,
        class: &ClassRef,
        source: &str,
        file: impl AsRef<Path>,
        first_line: usize,
    ) -> Result<Value, Error> {
        let file = file.as_ref().to_path_buf();
        let frame = Frame::new(
            Value::Class(class.clone()),
            class.clone(),
            self.cref_for(class),
            Some(file.clone()),
        );
        self.run_source(source, Origin::new(Some(file), first_line), frame)
    }

    fn run_source(&mut self, source: &str, origin: Origin, frame: Frame) -> Result<Value, Error> {
        let program = parser::parse_program(source, &origin)?;
        self.run_frame(frame, &program.body)
    }

    fn top_level_frame(&self, file: Option<PathBuf>) -> Frame {
        Frame::new(self.main.clone(), self.builtins.object.clone(), Vec::new(), file)
    }

    /// Lexical nesting for code evaluated inside `class`: `Blog::Comment` gives
    /// `[Blog, Blog::Comment]`
    fn cref_for(&self, class: &ClassRef) -> Vec<ClassRef> {
        let name = class.borrow().name.clone();
        let mut cref = Vec::new();
        let mut current = self.builtins.object.clone();
        let segments: Vec<&str> = name.split("::").collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            let next = current.borrow().constants.get(*segment).cloned();
            match next {
                Some(Value::Class(c)) => {
                    cref.push(c.clone());
                    current = c;
                }
                _ => break,
            }
        }
        cref.push(class.clone());
        cref
    }

    /* ---------- frames ---------- */

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.root)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    /// Run `body` in a fresh frame; `return` stops at this boundary
    pub(crate) fn run_frame(&mut self, frame: Frame, body: &[Stmt]) -> Result<Value, Error> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(Error::runtime(ErrorKind::SystemStackError, "stack level too deep"));
        }

        self.frames.push(frame);
        let result = exec_body(self, body);
        self.frames.pop();

        match result {
            Ok(value) | Err(Control::Return(value)) => Ok(value),
            Err(Control::Throw(err)) => Err(err),
        }
    }

    /// Location of the statement currently executing
    pub(crate) fn current_location(&self) -> SourceLocation {
        self.frame().location()
    }

    /// Directory of the file currently executing
    pub fn current_dir(&self) -> Option<PathBuf> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.file.as_ref())
            .and_then(|f| f.parent().map(Path::to_path_buf))
    }

    /* ---------- classes ---------- */

    /// Create or reopen a top-level or namespaced (`A::B`) class from the host
    pub fn define_class(&mut self, path: &str, superclass: Option<&ClassRef>) -> Result<ClassRef, Error> {
        let (owner, name) = match path.rsplit_once("::") {
            Some((prefix, name)) => (self.resolve_namespace(prefix)?, name),
            None => (self.builtins.object.clone(), path),
        };
        let location = self.frames.last().map(|f| f.location());
        self.open_class(&owner, name, superclass.cloned(), false, location)
    }

    /// Find a class or module by its constant path
    pub fn lookup_class(&self, path: &str) -> Option<ClassRef> {
        let mut current = self.builtins.object.clone();
        for segment in path.split("::") {
            let next = const_in_ancestors(&current, segment)?;
            current = next.as_class()?.clone();
        }
        Some(current)
    }

    fn resolve_namespace(&self, path: &str) -> Result<ClassRef, Error> {
        self.lookup_class(path)
            .ok_or_else(|| Error::runtime(ErrorKind::NameError, format!("uninitialized constant {}", path)))
    }

    /// Reopen `owner::name`, or create it and fire the superclass's `inherited` hook
    pub(crate) fn open_class(
        &mut self,
        owner: &ClassRef,
        name: &str,
        superclass: Option<ClassRef>,
        is_module: bool,
        origin: Option<SourceLocation>,
    ) -> Result<ClassRef, Error> {
        let existing = owner.borrow().constants.get(name).cloned();
        match existing {
            Some(Value::Class(class)) => {
                let (full_name, was_module) = {
                    let c = class.borrow();
                    (c.name.clone(), c.is_module)
                };
                if was_module != is_module {
                    let what = if is_module { "module" } else { "class" };
                    return Err(Error::type_error(format!("{} is not a {}", full_name, what)));
                }
                if let Some(requested) = &superclass {
                    let current = class.borrow().superclass.clone();
                    let matches = current.as_ref().map_or(false, |c| Rc::ptr_eq(c, requested));
                    if !matches {
                        return Err(Error::type_error(format!("superclass mismatch for class {}", full_name)));
                    }
                }
                debug!(class = %full_name, "reopening class");
                Ok(class)
            }
            Some(_) => Err(Error::type_error(format!("{} is not a class", name))),
            None => {
                let full_name = if Rc::ptr_eq(owner, &self.builtins.object) {
                    name.to_string()
                } else {
                    format!("{}::{}", owner.borrow().name, name)
                };
                let parent = if is_module {
                    None
                } else {
                    Some(superclass.unwrap_or_else(|| self.builtins.object.clone()))
                };

                let mut class = Class::new(full_name.clone(), parent.clone(), is_module);
                class.origin = origin;
                let class = class.into_ref();
                owner
                    .borrow_mut()
                    .constants
                    .insert(name.to_string(), Value::Class(class.clone()));
                debug!(class = %full_name, "defined class");

                if let Some(parent) = parent {
                    if let Some(hook) = find_singleton_method(&parent, "inherited") {
                        self.invoke(&hook, Value::Class(parent), vec![Value::Class(class.clone())])?;
                    }
                }
                Ok(class)
            }
        }
    }

    /// Class used for method lookup on `value`
    pub fn class_of(&self, value: &Value) -> ClassRef {
        let b = &self.builtins;
        match value {
            Value::Nil => b.nil.clone(),
            Value::Bool(true) => b.true_class.clone(),
            Value::Bool(false) => b.false_class.clone(),
            Value::Int(_) => b.integer.clone(),
            Value::Str(_) => b.string.clone(),
            Value::Sym(_) => b.symbol.clone(),
            Value::Array(_) => b.array.clone(),
            Value::Object(o) => o.borrow().class.clone(),
            Value::Class(c) if c.borrow().is_module => b.module.clone(),
            Value::Class(_) => b.class.clone(),
            Value::Method(_) => b.method.clone(),
        }
    }

    /// Directory a class's extensions are resolved against
    ///
    /// The directory of the file that declared the class, else the configured
    /// root, else the directory of the file currently executing, else the
    /// working directory.
    pub fn extension_base(&self, class: &ClassRef) -> PathBuf {
        let declared = class
            .borrow()
            .origin
            .as_ref()
            .and_then(|o| o.file.as_ref())
            .and_then(|f| f.parent().map(Path::to_path_buf));

        declared
            .or_else(|| self.config.root_dir.clone())
            .or_else(|| self.current_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    /// Merge extensions into `class`, every file in its directory when `keys` is empty
    pub fn load_extensions(&mut self, class: &ClassRef, keys: &[&str]) -> Result<Vec<LoadReport>, Error> {
        let loader = self.loader.clone();
        loader.load(self, class, keys)
    }

    /* ---------- methods ---------- */

    pub(crate) fn define_method(&mut self, class: &ClassRef, method: Method) {
        trace!(owner = %class.borrow().name, method = %method.name, "defined method");
        class.borrow_mut().methods.insert(method.name.clone(), Rc::new(method));
    }

    pub(crate) fn define_singleton_method(&mut self, class: &ClassRef, method: Method) {
        trace!(owner = %class.borrow().name, method = %method.name, "defined singleton method");
        class
            .borrow_mut()
            .singleton_methods
            .insert(method.name.clone(), Rc::new(method));
    }

    pub(crate) fn define_native(&mut self, class: &ClassRef, name: &str, f: NativeFn) {
        let method = Method::native(name, class.clone(), f);
        class.borrow_mut().methods.insert(name.to_string(), Rc::new(method));
    }

    pub(crate) fn define_singleton_native(&mut self, class: &ClassRef, name: &str, f: NativeFn) {
        let method = Method::native(name, class.clone(), f);
        class
            .borrow_mut()
            .singleton_methods
            .insert(name.to_string(), Rc::new(method));
    }

    /// Method `recv.name` would dispatch to
    pub fn find_method(&self, recv: &Value, name: &str) -> Option<Rc<Method>> {
        if let Value::Class(class) = recv {
            if let Some(method) = find_singleton_method(class, name) {
                return Some(method);
            }
        }
        find_instance_method(&self.class_of(recv), name)
    }

    pub fn respond_to(&self, recv: &Value, name: &str) -> bool {
        self.find_method(recv, name).is_some()
    }

    /// Send `name` to `recv`
    pub fn call_method(&mut self, recv: &Value, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        match self.find_method(recv, name) {
            Some(method) => self.invoke(&method, recv.clone(), args),
            None => Err(Error::runtime(
                ErrorKind::NoMethodError,
                format!("undefined method '{}' for {}", name, self.describe(recv)),
            )),
        }
    }

    /// Create an instance of `class`, running `initialize`
    pub fn instantiate(&mut self, class: &ClassRef, args: Vec<Value>) -> Result<Value, Error> {
        self.call_method(&Value::Class(class.clone()), "new", args)
    }

    pub(crate) fn invoke(&mut self, method: &Rc<Method>, recv: Value, args: Vec<Value>) -> Result<Value, Error> {
        match &method.body {
            MethodBody::Native(f) => f(self, &recv, args),
            MethodBody::AttrReader { ivar } => {
                check_arity(&method.name, &args, 0)?;
                Ok(self.ivar_get(&recv, ivar))
            }
            MethodBody::AttrWriter { ivar } => {
                check_arity(&method.name, &args, 1)?;
                let value = args.into_iter().next().unwrap_or(Value::Nil);
                self.ivar_set(&recv, ivar, value.clone())?;
                Ok(value)
            }
            MethodBody::User { params, body, cref } => {
                check_arity(&method.name, &args, params.len())?;
                let file = method.location.as_ref().and_then(|l| l.file.clone());
                let mut frame = Frame::new(recv, method.owner.clone(), cref.clone(), file);
                frame.locals = params.iter().cloned().zip(args).collect();
                if let Some(location) = &method.location {
                    frame.line = location.line;
                }
                let body = body.clone();
                self.run_frame(frame, &body)
            }
        }
    }

    /// Instance method location, as reported by `instance_method(name).source_location`
    pub fn source_location(&self, class: &ClassRef, name: &str) -> Option<SourceLocation> {
        find_instance_method(class, name).and_then(|m| m.location.clone())
    }

    /// Class method location, as reported by `method(name).source_location`
    pub fn singleton_source_location(&self, class: &ClassRef, name: &str) -> Option<SourceLocation> {
        find_singleton_method(class, name).and_then(|m| m.location.clone())
    }

    /* ---------- variables ---------- */

    pub fn ivar_get(&self, recv: &Value, name: &str) -> Value {
        let found = match recv {
            Value::Object(o) => o.borrow().ivars.get(name).cloned(),
            Value::Class(c) => c.borrow().ivars.get(name).cloned(),
            _ => None,
        };
        found.unwrap_or(Value::Nil)
    }

    pub fn ivar_set(&mut self, recv: &Value, name: &str, value: Value) -> Result<(), Error> {
        match recv {
            Value::Object(o) => {
                let mut object = o.borrow_mut();
                if object.frozen {
                    return Err(Error::runtime(
                        ErrorKind::FrozenError,
                        format!("can't modify frozen {}", object.class.borrow().name),
                    ));
                }
                object.ivars.insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(c) => {
                c.borrow_mut().ivars.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(Error::runtime(
                ErrorKind::FrozenError,
                format!("can't modify frozen {}", self.class_of(other).borrow().name),
            )),
        }
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Constant lookup: lexical scopes innermost first, then the innermost
    /// scope's ancestors, then `Object`
    pub(crate) fn lookup_const(&self, name: &str) -> Option<Value> {
        let cref = &self.frame().cref;
        for class in cref.iter().rev() {
            if let Some(value) = class.borrow().constants.get(name) {
                return Some(value.clone());
            }
        }
        if let Some(innermost) = cref.last() {
            if let Some(value) = const_in_ancestors(innermost, name) {
                return Some(value);
            }
        }
        self.builtins.object.borrow().constants.get(name).cloned()
    }

    /// Resolve `A::B::C` starting from the lexical scope
    pub(crate) fn lookup_const_path(&self, path: &str) -> Result<Value, Error> {
        let mut segments = path.split("::");
        let first = segments.next().unwrap_or(path);
        let mut value = self
            .lookup_const(first)
            .ok_or_else(|| Error::runtime(ErrorKind::NameError, format!("uninitialized constant {}", first)))?;

        for segment in segments {
            let class = match &value {
                Value::Class(c) => c.clone(),
                other => return Err(Error::type_error(format!("{} is not a class/module", other.inspect()))),
            };
            value = const_in_ancestors(&class, segment).ok_or_else(|| {
                Error::runtime(
                    ErrorKind::NameError,
                    format!("uninitialized constant {}::{}", class.borrow().name, segment),
                )
            })?;
        }
        Ok(value)
    }

    /// Class new constants and nested classes are placed in
    pub(crate) fn lexical_owner(&self) -> ClassRef {
        self.frame()
            .cref
            .last()
            .cloned()
            .unwrap_or_else(|| self.builtins.object.clone())
    }

    /* ---------- output & formatting ---------- */

    pub(crate) fn write_output(&mut self, line: String) {
        self.output.push(line);
    }

    /// Lines written by `puts` and `p` since the last call
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// `to_s`, honouring user-defined overrides
    pub fn stringify(&mut self, value: &Value) -> Result<String, Error> {
        match value {
            Value::Str(s) => Ok(s.borrow().value.clone()),
            Value::Object(_) => {
                let result = self.call_method(value, "to_s", Vec::new())?;
                Ok(result.display())
            }
            other => Ok(other.display()),
        }
    }

    /// `inspect`, honouring user-defined overrides
    pub fn inspect(&mut self, value: &Value) -> Result<String, Error> {
        match value {
            Value::Object(_) => {
                let result = self.call_method(value, "inspect", Vec::new())?;
                Ok(result.display())
            }
            other => Ok(other.inspect()),
        }
    }

    /// Receiver description used in error messages
    pub(crate) fn describe(&self, value: &Value) -> String {
        match value {
            Value::Object(_) if value.same(&self.main) => "main:Object".to_string(),
            Value::Object(o) => format!("an instance of {}", o.borrow().class.borrow().name),
            Value::Class(c) => {
                let c = c.borrow();
                let what = if c.is_module { "module" } else { "class" };
                format!("{} {}", what, c.name)
            }
            Value::Nil => "nil".to_string(),
            other => format!("an instance of {}", self.class_of(other).borrow().name),
        }
    }

    pub(crate) fn check_frozen_str(&self, s: &RString) -> Result<(), Error> {
        if s.frozen {
            return Err(Error::runtime(
                ErrorKind::FrozenError,
                format!("can't modify frozen String: {:?}", s.value),
            ));
        }
        Ok(())
    }

    /// Attach the current location to an error raised without one
    pub(crate) fn locate(&self, err: Error) -> Error {
        match err {
            Error::Runtime(RuntimeError {
                kind,
                message,
                location: None,
            }) => Error::Runtime(RuntimeError {
                kind,
                message,
                location: Some(self.current_location()),
            }),
            other => other,
        }
    }
}

/* ===================== Lookup Helpers ===================== */

pub(crate) fn find_instance_method(class: &ClassRef, name: &str) -> Option<Rc<Method>> {
    ancestors(class)
        .iter()
        .find_map(|c| c.borrow().methods.get(name).cloned())
}

/// Class-level methods are inherited by subclasses
pub(crate) fn find_singleton_method(class: &ClassRef, name: &str) -> Option<Rc<Method>> {
    ancestors(class)
        .iter()
        .find_map(|c| c.borrow().singleton_methods.get(name).cloned())
}

fn const_in_ancestors(class: &ClassRef, name: &str) -> Option<Value> {
    ancestors(class)
        .iter()
        .find_map(|c| c.borrow().constants.get(name).cloned())
}

pub(crate) fn check_arity(name: &str, args: &[Value], expected: usize) -> Result<(), Error> {
    if args.len() != expected {
        return Err(Error::argument(format!(
            "wrong number of arguments calling '{}' (given {}, expected {})",
            name,
            args.len(),
            expected
        )));
    }
    Ok(())
}
