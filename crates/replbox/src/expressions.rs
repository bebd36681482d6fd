//! The interpreter's own AST.
//!
//! Source is parsed by ruff and lowered into these types in `parse.rs`. Unlike ruff's AST they
//! are serde-serializable, which is what lets a function body travel through the value codec.

use std::{collections::BTreeSet, rc::Rc};

use serde::{Deserialize, Serialize};

/// A source position: 1-based line, 0-based column (in bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeRange {
    pub line: u32,
    pub column: u32,
}

impl CodeRange {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    // `+`
    Add,
    // `-`
    Sub,
    // `*`
    Mult,
    // `/`
    Div,
    // `//`
    FloorDiv,
    // `%`
    Mod,
    // `**`
    Pow,
    // `<<`
    LShift,
    // `>>`
    RShift,
    // `|`
    BitOr,
    // `^`
    BitXor,
    // `&`
    BitAnd,
}

impl Operator {
    /// The operator's source spelling, used in `TypeError` messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// `!s` / `!r` conversion applied to an f-string interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionFlag {
    None,
    Str,
    Repr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FStringPart {
    Literal(String),
    Interpolation {
        expr: Box<ExprLoc>,
        conversion: ConversionFlag,
        /// Static format spec such as `.2f` or `>8`.
        format_spec: Option<String>,
        /// Prefix rendered for the `f'{x=}'` form, e.g. `x=`.
        debug_prefix: Option<String>,
    },
}

/// One argument at a call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Positional(ExprLoc),
    /// `*args`
    Starred(ExprLoc),
    Keyword(String, ExprLoc),
    /// `**kwargs`
    DoubleStarred(ExprLoc),
}

/// `for target in iter if cond` clause of a comprehension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: Target,
    pub iter: ExprLoc,
    pub ifs: Vec<ExprLoc>,
}

/// Left hand side of an assignment, `for` loop or `del`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Name(String),
    /// Tuple or list unpacking, `a, (b, c) = ...`.
    Unpack(Vec<Target>),
    Subscript { object: Box<ExprLoc>, index: Box<ExprLoc> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    FString(Vec<FStringPart>),
    BinOp {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    BoolOp {
        op: BoolOperator,
        values: Vec<ExprLoc>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<ExprLoc>,
    },
    /// Chained comparison `a < b < c`; `ops` pairs each operator with its right operand.
    Compare {
        left: Box<ExprLoc>,
        ops: Vec<(CmpOperator, ExprLoc)>,
    },
    IfElse {
        test: Box<ExprLoc>,
        body: Box<ExprLoc>,
        orelse: Box<ExprLoc>,
    },
    Call {
        func: Box<ExprLoc>,
        args: Vec<Arg>,
    },
    Attribute {
        object: Box<ExprLoc>,
        attr: String,
    },
    Subscript {
        object: Box<ExprLoc>,
        index: Box<ExprLoc>,
    },
    Slice {
        lower: Option<Box<ExprLoc>>,
        upper: Option<Box<ExprLoc>>,
        step: Option<Box<ExprLoc>>,
    },
    List(Vec<ExprLoc>),
    Tuple(Vec<ExprLoc>),
    Dict(Vec<(ExprLoc, ExprLoc)>),
    /// List comprehensions and generator expressions; both are materialized eagerly.
    ListComp {
        elt: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<ExprLoc>,
        value: Box<ExprLoc>,
        generators: Vec<Comprehension>,
    },
    Lambda(Rc<FunctionDef>),
}

/// An expression with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprLoc {
    pub position: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    #[must_use]
    pub fn new(position: CodeRange, expr: Expr) -> Self {
        Self { position, expr }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Evaluated once, when the `def` runs.
    pub default: Option<ExprLoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub positional: Vec<Param>,
    pub var_args: Option<String>,
    pub keyword_only: Vec<Param>,
    pub var_kwargs: Option<String>,
}

impl Parameters {
    /// Every name the parameters bind, in signature order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positional
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.var_args.as_deref())
            .chain(self.keyword_only.iter().map(|p| p.name.as_str()))
            .chain(self.var_kwargs.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(Vec<StmtLoc>),
    /// Body of a lambda.
    Expr(Box<ExprLoc>),
}

/// A `def` or `lambda`, with the scope facts derived from its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Parameters,
    pub body: FunctionBody,
    /// Line of the `def` within its snippet.
    pub line: u32,
    /// Names bound in the function's own scope (parameters included).
    pub locals: Vec<String>,
    pub declared_global: Vec<String>,
    pub declared_nonlocal: Vec<String>,
    /// Every name the body can look up, nested functions included.
    ///
    /// The codec restricts a function's captured globals to this set.
    pub referenced: Vec<String>,
}

impl FunctionDef {
    /// Builds a definition and derives its scope facts from the body.
    #[must_use]
    pub fn new(name: String, params: Parameters, body: FunctionBody, line: u32) -> Self {
        let mut scope = ScopeFacts::default();
        for name in params.names() {
            scope.bind(name);
        }
        let mut referenced = NameCollector::default();
        match &body {
            FunctionBody::Block(stmts) => {
                scope.block(stmts);
                referenced.block(stmts);
            }
            FunctionBody::Expr(expr) => referenced.expr(expr),
        }
        let locals = scope
            .bound
            .into_iter()
            .filter(|name| !scope.global.contains(name) && !scope.nonlocal.contains(name))
            .collect();
        Self {
            name,
            params,
            body,
            line,
            locals,
            declared_global: scope.global.into_iter().collect(),
            declared_nonlocal: scope.nonlocal.into_iter().collect(),
            referenced: referenced.names.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|local| local == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    /// `None` for a bare `except:`.
    pub exc_type: Option<ExprLoc>,
    pub name: Option<String>,
    pub body: Vec<StmtLoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Expr(ExprLoc),
    /// `a = b = value`; targets are assigned left to right.
    Assign {
        targets: Vec<Target>,
        value: ExprLoc,
    },
    AugAssign {
        target: Target,
        op: Operator,
        value: ExprLoc,
    },
    If {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    While {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    For {
        target: Target,
        iter: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    FunctionDef(Rc<FunctionDef>),
    Return(Option<ExprLoc>),
    Pass,
    Break,
    Continue,
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Delete(Vec<Target>),
    /// `raise` with no operand re-raises the exception being handled.
    Raise(Option<ExprLoc>),
    Try {
        body: Vec<StmtLoc>,
        handlers: Vec<ExceptHandler>,
        or_else: Vec<StmtLoc>,
        finally: Vec<StmtLoc>,
    },
    Assert {
        test: ExprLoc,
        msg: Option<ExprLoc>,
    },
    With {
        context: ExprLoc,
        target: Option<Target>,
        body: Vec<StmtLoc>,
    },
    /// `import a, b as c`: pairs of (module, binding name).
    Import(Vec<(String, String)>),
    /// `from m import a as b`: pairs of (attribute, binding name).
    ImportFrom {
        module: String,
        names: Vec<(String, String)>,
    },
}

/// A statement with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmtLoc {
    pub position: CodeRange,
    pub node: Node,
}

impl StmtLoc {
    #[must_use]
    pub fn new(position: CodeRange, node: Node) -> Self {
        Self { position, node }
    }
}

/// Names bound directly in one function scope. Does not descend into nested functions,
/// whose own names belong to them, nor comprehensions, which get their own scope.
#[derive(Default)]
struct ScopeFacts {
    bound: BTreeSet<String>,
    global: BTreeSet<String>,
    nonlocal: BTreeSet<String>,
}

impl ScopeFacts {
    fn bind(&mut self, name: &str) {
        self.bound.insert(name.to_owned());
    }

    fn target(&mut self, target: &Target) {
        match target {
            Target::Name(name) => self.bind(name),
            Target::Unpack(targets) => targets.iter().for_each(|t| self.target(t)),
            Target::Subscript { .. } => {}
        }
    }

    fn block(&mut self, body: &[StmtLoc]) {
        for stmt in body {
            self.stmt(&stmt.node);
        }
    }

    fn stmt(&mut self, node: &Node) {
        match node {
            Node::Assign { targets, .. } => targets.iter().for_each(|t| self.target(t)),
            Node::AugAssign { target, .. } => self.target(target),
            Node::If { body, or_else, .. } | Node::While { body, or_else, .. } => {
                self.block(body);
                self.block(or_else);
            }
            Node::For {
                target, body, or_else, ..
            } => {
                self.target(target);
                self.block(body);
                self.block(or_else);
            }
            Node::FunctionDef(def) => self.bind(&def.name),
            Node::Global(names) => self.global.extend(names.iter().cloned()),
            Node::Nonlocal(names) => self.nonlocal.extend(names.iter().cloned()),
            Node::Delete(targets) => targets.iter().for_each(|t| self.target(t)),
            Node::Try {
                body,
                handlers,
                or_else,
                finally,
            } => {
                self.block(body);
                for handler in handlers {
                    if let Some(name) = &handler.name {
                        self.bind(name);
                    }
                    self.block(&handler.body);
                }
                self.block(or_else);
                self.block(finally);
            }
            Node::With { target, body, .. } => {
                if let Some(target) = target {
                    self.target(target);
                }
                self.block(body);
            }
            Node::Import(names) | Node::ImportFrom { names, .. } => {
                for (_, binding) in names {
                    self.bind(binding);
                }
            }
            Node::Expr(_)
            | Node::Return(_)
            | Node::Pass
            | Node::Break
            | Node::Continue
            | Node::Raise(_)
            | Node::Assert { .. } => {}
        }
    }
}

/// Collects every name a body can look up or bind, descending into nested functions.
#[derive(Default)]
struct NameCollector {
    names: BTreeSet<String>,
}

impl NameCollector {
    fn name(&mut self, name: &str) {
        if !self.names.contains(name) {
            self.names.insert(name.to_owned());
        }
    }

    fn block(&mut self, body: &[StmtLoc]) {
        for stmt in body {
            self.stmt(&stmt.node);
        }
    }

    fn target(&mut self, target: &Target) {
        match target {
            Target::Name(name) => self.name(name),
            Target::Unpack(targets) => targets.iter().for_each(|t| self.target(t)),
            Target::Subscript { object, index } => {
                self.expr(object);
                self.expr(index);
            }
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        for param in def.params.positional.iter().chain(&def.params.keyword_only) {
            if let Some(default) = &param.default {
                self.expr(default);
            }
        }
        for name in &def.referenced {
            self.name(name);
        }
    }

    fn stmt(&mut self, node: &Node) {
        match node {
            Node::Expr(expr) | Node::Return(Some(expr)) | Node::Raise(Some(expr)) => self.expr(expr),
            Node::Assign { targets, value } => {
                targets.iter().for_each(|t| self.target(t));
                self.expr(value);
            }
            Node::AugAssign { target, value, .. } => {
                self.target(target);
                self.expr(value);
            }
            Node::If { test, body, or_else } | Node::While { test, body, or_else } => {
                self.expr(test);
                self.block(body);
                self.block(or_else);
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => {
                self.target(target);
                self.expr(iter);
                self.block(body);
                self.block(or_else);
            }
            Node::FunctionDef(def) => {
                self.name(&def.name);
                self.function(def);
            }
            Node::Global(names) | Node::Nonlocal(names) => names.iter().for_each(|n| self.name(n)),
            Node::Delete(targets) => targets.iter().for_each(|t| self.target(t)),
            Node::Try {
                body,
                handlers,
                or_else,
                finally,
            } => {
                self.block(body);
                for handler in handlers {
                    if let Some(exc_type) = &handler.exc_type {
                        self.expr(exc_type);
                    }
                    self.block(&handler.body);
                }
                self.block(or_else);
                self.block(finally);
            }
            Node::Assert { test, msg } => {
                self.expr(test);
                if let Some(msg) = msg {
                    self.expr(msg);
                }
            }
            Node::With { context, target, body } => {
                self.expr(context);
                if let Some(target) = target {
                    self.target(target);
                }
                self.block(body);
            }
            Node::Import(names) | Node::ImportFrom { names, .. } => {
                for (_, binding) in names {
                    self.name(binding);
                }
            }
            Node::Return(None) | Node::Raise(None) | Node::Pass | Node::Break | Node::Continue => {}
        }
    }

    fn expr(&mut self, expr: &ExprLoc) {
        match &expr.expr {
            Expr::Literal(_) => {}
            Expr::Name(name) => self.name(name),
            Expr::FString(parts) => {
                for part in parts {
                    if let FStringPart::Interpolation { expr, .. } = part {
                        self.expr(expr);
                    }
                }
            }
            Expr::BinOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::BoolOp { values, .. } | Expr::List(values) | Expr::Tuple(values) => {
                values.iter().for_each(|v| self.expr(v));
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Compare { left, ops } => {
                self.expr(left);
                ops.iter().for_each(|(_, right)| self.expr(right));
            }
            Expr::IfElse { test, body, orelse } => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            Expr::Call { func, args } => {
                self.expr(func);
                for arg in args {
                    match arg {
                        Arg::Positional(e) | Arg::Starred(e) | Arg::Keyword(_, e) | Arg::DoubleStarred(e) => {
                            self.expr(e);
                        }
                    }
                }
            }
            Expr::Attribute { object, .. } => self.expr(object),
            Expr::Subscript { object, index } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Slice { lower, upper, step } => {
                for part in [lower, upper, step].into_iter().flatten() {
                    self.expr(part);
                }
            }
            Expr::Dict(items) => {
                for (key, value) in items {
                    self.expr(key);
                    self.expr(value);
                }
            }
            Expr::ListComp { elt, generators } => {
                self.expr(elt);
                self.generators(generators);
            }
            Expr::DictComp { key, value, generators } => {
                self.expr(key);
                self.expr(value);
                self.generators(generators);
            }
            Expr::Lambda(def) => self.function(def),
        }
    }

    fn generators(&mut self, generators: &[Comprehension]) {
        for generator in generators {
            self.target(&generator.target);
            self.expr(&generator.iter);
            generator.ifs.iter().for_each(|cond| self.expr(cond));
        }
    }
}
