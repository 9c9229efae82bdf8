//! Abstract Syntax Tree node types

use serde::{Deserialize, Serialize};

/// Source location span for error reporting and method attribution
///
/// Lines are stored 0-indexed but already shifted by the origin's first line,
/// so `line()` is the line a reader sees in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
    /// Start line (0-indexed)
    pub start_line: usize,
    /// Start column (0-indexed)
    pub start_col: usize,
    /// End line (0-indexed)
    pub end_line: usize,
    /// End column (0-indexed)
    pub end_col: usize,
}

impl Span {
    pub fn new(
        start: usize,
        end: usize,
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start,
            end,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// 1-based line the span starts on
    pub fn line(&self) -> usize {
        self.start_line + 1
    }
}

fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Expr {
        expr: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    /// `class Path [< Super] ... end` or `module Path ... end`
    Namespace {
        path: String,
        #[serde(default)]
        is_module: bool,
        superclass: Option<Expr>,
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Def {
        name: String,
        params: Vec<String>,
        #[serde(default)]
        singleton: bool,
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    If {
        test: Expr,
        then_s: Vec<Stmt>,
        else_s: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Return {
        value: Option<Expr>,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Namespace { span, .. }
            | Stmt::Def { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }
}

/// Expression AST node
///
/// Binary operators are desugared into `Call` nodes on the left operand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Nil,
    True,
    False,
    SelfRef,
    Int {
        v: i64,
    },
    Str {
        v: String,
        /// Set when the file carries `# frozen_string_literal: true`
        #[serde(default)]
        frozen: bool,
    },
    Sym {
        name: String,
    },
    Array {
        items: Vec<Expr>,
    },
    /// Local variable, or a receiverless call without arguments
    Ident {
        name: String,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Ivar {
        name: String,
    },
    Gvar {
        name: String,
    },
    Const {
        path: String,
    },
    Call {
        receiver: Option<Box<Expr>>,
        method: String,
        args: Vec<Expr>,
        #[serde(default)]
        safe_nav: bool,
        #[serde(default, skip_serializing_if = "is_default_span")]
        span: Span,
    },
    Not {
        inner: Box<Expr>,
    },
    And {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum AssignTarget {
    Local { name: String },
    Ivar { name: String },
    Gvar { name: String },
    Const { name: String },
    /// `recv.name = value`, dispatched as `name=`
    Attr { receiver: Expr, name: String },
    /// `recv[index] = value`, dispatched as `[]=`
    Index { receiver: Expr, index: Expr },
}

/// Assignment operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum AssignOp {
    Set,
    /// `||=`
    OrSet,
    /// `&&=`
    AndSet,
    /// `+=`, `-=`, `*=`, `<<=`
    Op { op: String },
}
