//! PEST-based parser for Annex source
//!
//! Produces the executor AST, with spans shifted so that line numbers match the
//! file a method was defined in, even when the source is evaluated starting at
//! an arbitrary first line.

use std::path::PathBuf;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};

use crate::executor::types::ast::{AssignOp, AssignTarget, Expr, Span, Stmt};


/* ===================== Program ===================== */

/// A parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub pragmas: Pragmas,
}

/// Magic comments found in the leading comment block of a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pragmas {
    /// `# frozen_string_literal: true`
    pub frozen_string_literal: bool,
}

/// Where a piece of source text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: Option<PathBuf>,
    /// 1-based line the text starts on
    pub first_line: usize,
}

impl Origin {
    pub fn new(file: Option<PathBuf>, first_line: usize) -> Self {
        Self {
            file,
            first_line: first_line.max(1),
        }
    }

    /// Origin for source that did not come from a file
    pub fn eval() -> Self {
        Self::new(None, 1)
    }

    pub fn display_name(&self) -> String {
        match &self.file {
            Some(path) => path.display().to_string(),
            None => "(eval)".to_string(),
        }
    }
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/annex.pest"]
struct AnnexParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{file}:{line}:{column}: syntax error, {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{file}:{line}: {message}")]
    Build {
        file: String,
        line: usize,
        message: String,
    },
}

impl ParseError {
    /// 1-based line the error was reported on
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::Build { line, .. } => *line,
        }
    }

    pub fn file(&self) -> &str {
        match self {
            ParseError::Syntax { file, .. } | ParseError::Build { file, .. } => file,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parse a source string evaluated outside of any file
pub fn parse(source: &str) -> ParseResult<Program> {
    parse_program(source, &Origin::eval())
}

/// Parse a source string, attributing it to `origin`
pub fn parse_program(source: &str, origin: &Origin) -> ParseResult<Program> {
    let pragmas = scan_pragmas(source);
    let builder = Builder {
        file: origin.display_name(),
        line_base: origin.first_line.saturating_sub(1),
        frozen: pragmas.frozen_string_literal,
    };

    let mut pairs = AnnexParser::parse(Rule::program, source).map_err(|e| builder.syntax(e))?;
    let program = pairs
        .next()
        .ok_or_else(|| builder.error(0, "empty program"))?;
    let body = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::body)
        .ok_or_else(|| builder.error(0, "program without body"))?;

    Ok(Program {
        body: builder.body(body)?,
        pragmas,
    })
}

/// Split `source` into its leading run of comment and blank lines and the rest
pub fn split_preamble(source: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            offset += line.len();
        } else {
            break;
        }
    }
    source.split_at(offset)
}

/// Read magic comments from the leading comment block
pub fn scan_pragmas(source: &str) -> Pragmas {
    let (preamble, _) = split_preamble(source);
    let mut pragmas = Pragmas::default();

    for line in preamble.lines() {
        let Some(comment) = line.trim().strip_prefix('#') else {
            continue;
        };
        // Emacs style: `# -*- frozen_string_literal: true -*-`
        let comment = comment.trim().trim_start_matches("-*-").trim_end_matches("-*-");

        for directive in comment.split(';') {
            let Some((key, value)) = directive.split_once(':') else {
                continue;
            };
            let key = key.trim().replace('-', "_").to_ascii_lowercase();
            if key == "frozen_string_literal" {
                pragmas.frozen_string_literal = value.trim().eq_ignore_ascii_case("true");
            }
        }
    }

    pragmas
}

/* ===================== AST Builder ===================== */

struct Builder {
    file: String,
    line_base: usize,
    frozen: bool,
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_class
            | Rule::kw_module
            | Rule::kw_def
            | Rule::kw_end
            | Rule::kw_if
            | Rule::kw_elsif
            | Rule::kw_else
            | Rule::kw_unless
            | Rule::kw_while
            | Rule::kw_then
            | Rule::kw_do
            | Rule::kw_return
    )
}

/// Inner pairs without structural keyword tokens
fn significant<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

impl Builder {
    fn span(&self, pair: &Pair<Rule>) -> Span {
        let span = pair.as_span();
        let (start_line, start_col) = span.start_pos().line_col();
        let (end_line, end_col) = span.end_pos().line_col();
        Span::new(
            span.start(),
            span.end(),
            start_line - 1 + self.line_base,
            start_col - 1,
            end_line - 1 + self.line_base,
            end_col - 1,
        )
    }

    fn syntax(&self, err: pest::error::Error<Rule>) -> ParseError {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ParseError::Syntax {
            file: self.file.clone(),
            line: line + self.line_base,
            column,
            message: err.variant.message().to_string(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> ParseError {
        ParseError::Build {
            file: self.file.clone(),
            line: line.max(1),
            message: message.into(),
        }
    }

    fn unexpected(&self, pair: &Pair<Rule>) -> ParseError {
        self.error(
            self.span(pair).line(),
            format!("unexpected {:?} '{}'", pair.as_rule(), pair.as_str()),
        )
    }

    fn missing(&self, span: &Span, what: &str) -> ParseError {
        self.error(span.line(), format!("expected {}", what))
    }

    /* ---------- statements ---------- */

    fn body(&self, pair: Pair<Rule>) -> ParseResult<Vec<Stmt>> {
        pair.into_inner().map(|p| self.statement(p)).collect()
    }

    fn statement(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let head = inner.next().ok_or_else(|| self.missing(&span, "statement"))?;
        let mut stmt = self.base_statement(head)?;

        // `stmt if cond` / `stmt unless cond`, applied left to right
        for modifier in inner {
            let mut parts = modifier.into_inner();
            let negate = matches!(parts.next().map(|p| p.as_rule()), Some(Rule::kw_unless));
            let test = parts
                .next()
                .ok_or_else(|| self.missing(&span, "modifier condition"))?;
            let mut test = self.expression(test)?;
            if negate {
                test = Expr::Not {
                    inner: Box::new(test),
                };
            }
            stmt = Stmt::If {
                test,
                then_s: vec![stmt],
                else_s: Vec::new(),
                span,
            };
        }

        Ok(stmt)
    }

    fn base_statement(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::class_def => self.namespace(pair, false),
            Rule::module_def => self.namespace(pair, true),
            Rule::method_def => self.method_def(pair),
            Rule::if_stmt => self.if_stmt(pair),
            Rule::unless_stmt => {
                let mut parts = significant(pair);
                let test = parts
                    .next()
                    .ok_or_else(|| self.missing(&span, "condition"))?;
                let test = Expr::Not {
                    inner: Box::new(self.expression(test)?),
                };
                let then_s = match parts.next() {
                    Some(body) => self.body(body)?,
                    None => Vec::new(),
                };
                let else_s = match parts.next() {
                    Some(clause) => self.else_clause(clause)?,
                    None => Vec::new(),
                };
                Ok(Stmt::If {
                    test,
                    then_s,
                    else_s,
                    span,
                })
            }
            Rule::while_stmt => {
                let mut parts = significant(pair);
                let test = parts
                    .next()
                    .ok_or_else(|| self.missing(&span, "condition"))?;
                let test = self.expression(test)?;
                let body = match parts.next() {
                    Some(body) => self.body(body)?,
                    None => Vec::new(),
                };
                Ok(Stmt::While { test, body, span })
            }
            Rule::return_stmt => {
                let value = match significant(pair).next() {
                    Some(expr) => Some(self.expression(expr)?),
                    None => None,
                };
                Ok(Stmt::Return { value, span })
            }
            Rule::assignment => self.assignment(pair),
            Rule::command_call => {
                let mut parts = pair.into_inner();
                let name = parts
                    .next()
                    .ok_or_else(|| self.missing(&span, "method name"))?
                    .as_str()
                    .to_string();
                let args = match parts.next() {
                    Some(args) => args
                        .into_inner()
                        .map(|a| self.expression(a))
                        .collect::<ParseResult<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Ok(Stmt::Expr {
                    expr: Expr::Call {
                        receiver: None,
                        method: name,
                        args,
                        safe_nav: false,
                        span,
                    },
                    span,
                })
            }
            Rule::expression => Ok(Stmt::Expr {
                expr: self.expression(pair)?,
                span,
            }),
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn namespace(&self, pair: Pair<Rule>, is_module: bool) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut path = None;
        let mut superclass = None;
        let mut body = Vec::new();

        for part in significant(pair) {
            match part.as_rule() {
                Rule::const_path => path = Some(part.as_str().to_string()),
                Rule::superclass => {
                    let part_span = self.span(&part);
                    let expr = part
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.missing(&part_span, "superclass"))?;
                    superclass = Some(self.expression(expr)?);
                }
                Rule::body => body = self.body(part)?,
                _ => return Err(self.unexpected(&part)),
            }
        }

        Ok(Stmt::Namespace {
            path: path.ok_or_else(|| self.missing(&span, "class name"))?,
            is_module,
            superclass,
            body,
            span,
        })
    }

    fn method_def(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut name = None;
        let mut params = Vec::new();
        let mut singleton = false;
        let mut body = Vec::new();

        for part in significant(pair) {
            match part.as_rule() {
                Rule::singleton => singleton = true,
                Rule::def_name => name = Some(part.as_str().to_string()),
                Rule::params => {
                    params = part.into_inner().map(|p| p.as_str().to_string()).collect();
                }
                Rule::body => body = self.body(part)?,
                _ => return Err(self.unexpected(&part)),
            }
        }

        Ok(Stmt::Def {
            name: name.ok_or_else(|| self.missing(&span, "method name"))?,
            params,
            singleton,
            body,
            span,
        })
    }

    fn if_stmt(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut branches: Vec<(Expr, Vec<Stmt>, Span)> = Vec::new();
        let mut else_s = Vec::new();
        let mut test = None;

        for part in significant(pair) {
            match part.as_rule() {
                Rule::expression => test = Some(self.expression(part)?),
                Rule::body => {
                    let cond = test.take().ok_or_else(|| self.missing(&span, "condition"))?;
                    branches.push((cond, self.body(part)?, span));
                }
                Rule::elsif_clause => {
                    let clause_span = self.span(&part);
                    let mut inner = significant(part);
                    let cond = inner
                        .next()
                        .ok_or_else(|| self.missing(&clause_span, "elsif condition"))?;
                    let cond = self.expression(cond)?;
                    let body = match inner.next() {
                        Some(body) => self.body(body)?,
                        None => Vec::new(),
                    };
                    branches.push((cond, body, clause_span));
                }
                Rule::else_clause => else_s = self.else_clause(part)?,
                _ => return Err(self.unexpected(&part)),
            }
        }

        // Fold `elsif` chains into nested ifs, innermost last
        let mut result = else_s;
        while let Some((test, then_s, branch_span)) = branches.pop() {
            result = vec![Stmt::If {
                test,
                then_s,
                else_s: result,
                span: branch_span,
            }];
        }

        result
            .pop()
            .ok_or_else(|| self.missing(&span, "if branch"))
    }

    fn else_clause(&self, pair: Pair<Rule>) -> ParseResult<Vec<Stmt>> {
        match significant(pair).next() {
            Some(body) => self.body(body),
            None => Ok(Vec::new()),
        }
    }

    fn assignment(&self, pair: Pair<Rule>) -> ParseResult<Stmt> {
        let span = self.span(&pair);
        let mut parts = pair.into_inner();
        let target = parts.next().ok_or_else(|| self.missing(&span, "target"))?;
        let op = parts.next().ok_or_else(|| self.missing(&span, "operator"))?;
        let value = parts.next().ok_or_else(|| self.missing(&span, "value"))?;

        let target = self.assign_target(self.expression(target)?, &span)?;
        let op = match op.as_str() {
            "=" => AssignOp::Set,
            "||=" => AssignOp::OrSet,
            "&&=" => AssignOp::AndSet,
            other => AssignOp::Op {
                op: other.trim_end_matches('=').to_string(),
            },
        };

        Ok(Stmt::Assign {
            target,
            op,
            value: self.expression(value)?,
            span,
        })
    }

    fn assign_target(&self, expr: Expr, span: &Span) -> ParseResult<AssignTarget> {
        match expr {
            Expr::Ident { name, .. } => Ok(AssignTarget::Local { name }),
            Expr::Ivar { name } => Ok(AssignTarget::Ivar { name }),
            Expr::Gvar { name } => Ok(AssignTarget::Gvar { name }),
            Expr::Const { path } if !path.contains("::") => Ok(AssignTarget::Const { name: path }),
            Expr::Call {
                receiver: Some(receiver),
                method,
                mut args,
                ..
            } => {
                if method == "[]" && args.len() == 1 {
                    let index = args.remove(0);
                    Ok(AssignTarget::Index {
                        receiver: *receiver,
                        index,
                    })
                } else if args.is_empty() && method.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    Ok(AssignTarget::Attr {
                        receiver: *receiver,
                        name: method,
                    })
                } else {
                    Err(self.error(span.line(), format!("cannot assign to method call '{}'", method)))
                }
            }
            other => Err(self.error(span.line(), format!("cannot assign to {:?}", other))),
        }
    }

    /* ---------- expressions ---------- */

    fn expression(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::expression => self.logical(pair, true),
            Rule::and_expr => self.logical(pair, false),
            Rule::equality
            | Rule::comparison
            | Rule::shift
            | Rule::additive
            | Rule::multiplicative => self.binary(pair),
            Rule::unary => self.unary(pair),
            Rule::postfix => self.postfix(pair),
            Rule::paren_expr => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| self.missing(&span, "expression"))?;
                self.expression(inner)
            }
            Rule::array_lit => {
                let items = pair
                    .into_inner()
                    .map(|p| self.expression(p))
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Expr::Array { items })
            }
            Rule::string => {
                let quoted = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| self.missing(&span, "string"))?;
                let double = quoted.as_rule() == Rule::dq_string;
                let raw = quoted
                    .into_inner()
                    .next()
                    .map(|p| p.as_str())
                    .unwrap_or_default();
                Ok(Expr::Str {
                    v: unescape(raw, double),
                    frozen: self.frozen,
                })
            }
            Rule::symbol => Ok(Expr::Sym {
                name: pair.as_str()[1..].to_string(),
            }),
            Rule::integer => {
                let digits: String = pair.as_str().chars().filter(|c| *c != '_').collect();
                let v = digits
                    .parse::<i64>()
                    .map_err(|e| self.error(span.line(), format!("invalid integer '{}': {}", digits, e)))?;
                Ok(Expr::Int { v })
            }
            Rule::nil_lit => Ok(Expr::Nil),
            Rule::true_lit => Ok(Expr::True),
            Rule::false_lit => Ok(Expr::False),
            Rule::self_ref => Ok(Expr::SelfRef),
            Rule::ivar => Ok(Expr::Ivar {
                name: pair.as_str().to_string(),
            }),
            Rule::gvar => Ok(Expr::Gvar {
                name: pair.as_str().to_string(),
            }),
            Rule::const_path => Ok(Expr::Const {
                path: pair.as_str().to_string(),
            }),
            Rule::func_call => {
                let mut parts = pair.into_inner();
                let name = parts
                    .next()
                    .ok_or_else(|| self.missing(&span, "method name"))?
                    .as_str()
                    .to_string();
                let args = match parts.next() {
                    Some(args) => self.call_args(args)?,
                    None => Vec::new(),
                };
                Ok(Expr::Call {
                    receiver: None,
                    method: name,
                    args,
                    safe_nav: false,
                    span,
                })
            }
            Rule::ident => Ok(Expr::Ident {
                name: pair.as_str().to_string(),
                span,
            }),
            _ => Err(self.unexpected(&pair)),
        }
    }

    /// `a || b`, `a && b` (and their word forms)
    fn logical(&self, pair: Pair<Rule>, is_or: bool) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(&span, "operand"))?;
        let mut expr = self.expression(first)?;

        while let Some(_op) = inner.next() {
            let rhs = inner.next().ok_or_else(|| self.missing(&span, "right operand"))?;
            let right = Box::new(self.expression(rhs)?);
            let left = Box::new(expr);
            expr = if is_or {
                Expr::Or { left, right }
            } else {
                Expr::And { left, right }
            };
        }

        Ok(expr)
    }

    /// Left-associative operator chains become method calls on the left operand
    fn binary(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| self.missing(&span, "operand"))?;
        let mut expr = self.expression(first)?;

        while let Some(op) = inner.next() {
            let op_span = self.span(&op);
            let rhs = inner.next().ok_or_else(|| self.missing(&span, "right operand"))?;
            expr = Expr::Call {
                receiver: Some(Box::new(expr)),
                method: op.as_str().to_string(),
                args: vec![self.expression(rhs)?],
                safe_nav: false,
                span: op_span,
            };
        }

        Ok(expr)
    }

    fn unary(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut ops = Vec::new();
        let mut operand = None;

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::unary_op => ops.push(part.as_str().to_string()),
                _ => operand = Some(self.expression(part)?),
            }
        }

        let mut expr = operand.ok_or_else(|| self.missing(&span, "operand"))?;
        for op in ops.iter().rev() {
            expr = match (op.as_str(), expr) {
                ("-", Expr::Int { v }) => Expr::Int { v: -v },
                ("-", other) => Expr::Call {
                    receiver: Some(Box::new(other)),
                    method: "-@".to_string(),
                    args: Vec::new(),
                    safe_nav: false,
                    span,
                },
                (_, other) => Expr::Not {
                    inner: Box::new(other),
                },
            };
        }

        Ok(expr)
    }

    fn postfix(&self, pair: Pair<Rule>) -> ParseResult<Expr> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let primary = inner.next().ok_or_else(|| self.missing(&span, "expression"))?;
        let mut expr = self.expression(primary)?;

        for suffix in inner {
            let suffix_span = self.span(&suffix);
            match suffix.as_rule() {
                Rule::method_call => {
                    let mut parts = suffix.into_inner();
                    let dot = parts
                        .next()
                        .ok_or_else(|| self.missing(&suffix_span, "'.'"))?;
                    let name = parts
                        .next()
                        .ok_or_else(|| self.missing(&suffix_span, "method name"))?;
                    let args = match parts.next() {
                        Some(args) => self.call_args(args)?,
                        None => Vec::new(),
                    };
                    expr = Expr::Call {
                        receiver: Some(Box::new(expr)),
                        method: name.as_str().to_string(),
                        args,
                        safe_nav: dot.as_str() == "&.",
                        span: suffix_span,
                    };
                }
                Rule::index => {
                    let index = suffix
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.missing(&suffix_span, "index"))?;
                    expr = Expr::Call {
                        receiver: Some(Box::new(expr)),
                        method: "[]".to_string(),
                        args: vec![self.expression(index)?],
                        safe_nav: false,
                        span: suffix_span,
                    };
                }
                _ => return Err(self.unexpected(&suffix)),
            }
        }

        Ok(expr)
    }

    fn call_args(&self, pair: Pair<Rule>) -> ParseResult<Vec<Expr>> {
        pair.into_inner().map(|p| self.expression(p)).collect()
    }
}

/// Resolve backslash escapes in a string literal body
fn unescape(raw: &str, double_quoted: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        if double_quoted {
            match next {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                's' => out.push(' '),
                'e' => out.push('\u{1b}'),
                other => out.push(other),
            }
        } else {
            match next {
                '\'' | '\\' => out.push(next),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    out
}
