//! Tree-walking evaluator.
//!
//! Each function call and comprehension gets its own [`Frame`]. Control flow that leaves a
//! block early (`break`, `continue`, `return`) travels up as a [`Flow`] value, and raised
//! exceptions travel up as `Err`, collecting one traceback entry per frame they leave.
//!
//! `eval` and `exec` dispatch to small helper methods so each recursion step keeps a small
//! native stack frame.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    args::ArgValues,
    builtins,
    exception::{ExcType, Exception, RunResult, StackFrame},
    expressions::{
        Arg, BoolOperator, Comprehension, ConversionFlag, ExceptHandler, Expr, ExprLoc, FStringPart, FunctionBody,
        FunctionDef, Literal, Node, Operator, StmtLoc, Target,
    },
    format::format_with_spec,
    function::{Defaults, Function, MAX_CALL_DEPTH, Scope, ScopeRef, Source},
    io::PrintWriter,
    modules,
    namespace::NamespaceRef,
    ops,
    resource::HostObject,
    types,
    value::{Dict, Value},
};

/// Outcome of executing a statement that did not raise.
#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

#[derive(Debug, Clone)]
enum FrameKind {
    Module,
    Function(Rc<FunctionDef>),
    Comprehension,
}

/// The execution state of one module body, function call or comprehension.
pub(crate) struct Frame {
    globals: NamespaceRef,
    /// `None` at module level, where names live in `globals`.
    locals: Option<ScopeRef>,
    kind: FrameKind,
    source: Rc<Source>,
    name: String,
    /// Line of the statement currently executing, reported in tracebacks.
    line: u32,
}

impl Frame {
    pub fn module(globals: NamespaceRef, filename: &str, code: &str) -> Self {
        Self {
            globals,
            locals: None,
            kind: FrameKind::Module,
            source: Source::new(filename, code),
            name: "<module>".to_owned(),
            line: 1,
        }
    }

    /// A child frame whose fresh scope holds the comprehension's loop variables.
    fn comprehension(&self) -> Self {
        Self {
            globals: Rc::clone(&self.globals),
            locals: Some(Scope::new(IndexMap::new(), self.locals.clone())),
            kind: FrameKind::Comprehension,
            source: Rc::clone(&self.source),
            name: self.name.clone(),
            line: self.line,
        }
    }

    /// Resolves a name: local scope chain, then globals, then builtins.
    fn lookup(&self, name: &str) -> RunResult<Value> {
        let search_locals = match &self.kind {
            FrameKind::Module => false,
            FrameKind::Function(def) if def.declared_global.iter().any(|g| g == name) => false,
            FrameKind::Function(def) if def.is_local(name) => {
                let local = self.locals.as_ref().and_then(|scope| scope.borrow().get(name).cloned());
                return local.ok_or_else(|| Exception::unbound_local(name));
            }
            FrameKind::Function(_) | FrameKind::Comprehension => true,
        };
        if search_locals {
            let mut scope = self.locals.clone();
            while let Some(current) = scope {
                let current = current.borrow();
                if let Some(value) = current.get(name) {
                    return Ok(value.clone());
                }
                scope = current.parent().cloned();
            }
        }
        if let Some(value) = self.globals.borrow().get(name) {
            return Ok(value.clone());
        }
        builtins::lookup(name).ok_or_else(|| Exception::name_error(name))
    }

    fn store(&self, name: &str, value: Value) -> RunResult<()> {
        match self.binding_scope(name)? {
            Some(scope) => {
                scope.borrow_mut().vars.insert(name.to_owned(), value);
            }
            None => {
                self.globals.borrow_mut().insert(name, value);
            }
        }
        Ok(())
    }

    /// Removes a binding, returning whether it existed.
    fn unbind(&self, name: &str) -> bool {
        match self.binding_scope(name) {
            Ok(Some(scope)) => scope.borrow_mut().vars.shift_remove(name).is_some(),
            Ok(None) => self.globals.borrow_mut().remove(name).is_some(),
            Err(_) => false,
        }
    }

    /// The local scope an assignment to `name` writes to, or `None` for globals.
    fn binding_scope(&self, name: &str) -> RunResult<Option<ScopeRef>> {
        let Some(locals) = &self.locals else {
            return Ok(None);
        };
        match &self.kind {
            FrameKind::Function(def) if def.declared_global.iter().any(|g| g == name) => Ok(None),
            FrameKind::Function(def) if def.declared_nonlocal.iter().any(|n| n == name) => {
                let mut scope = locals.borrow().parent().cloned();
                while let Some(current) = scope {
                    if current.borrow().get(name).is_some() {
                        return Ok(Some(current));
                    }
                    scope = current.borrow().parent().cloned();
                }
                Err(Exception::new(
                    ExcType::SyntaxError,
                    format!("no binding for nonlocal '{name}' found"),
                ))
            }
            _ => Ok(Some(Rc::clone(locals))),
        }
    }

    fn stack_frame(&self) -> StackFrame {
        StackFrame::new(&self.source.filename, self.line, &self.name, &self.source.text)
    }
}

/// Evaluates code, sending output to `writer`.
pub(crate) struct Interpreter<'w> {
    writer: &'w mut dyn PrintWriter,
    depth: usize,
    /// Exceptions whose `except` blocks are running, innermost last.
    handling: Vec<Exception>,
}

impl<'w> Interpreter<'w> {
    pub fn new(writer: &'w mut dyn PrintWriter) -> Self {
        Self {
            writer,
            depth: 0,
            handling: Vec::new(),
        }
    }

    pub fn writer(&mut self) -> &mut dyn PrintWriter {
        self.writer
    }

    /// Runs a module body, adding the `<module>` traceback entry on failure.
    pub fn run_module(&mut self, frame: &mut Frame, body: &[StmtLoc]) -> RunResult<()> {
        let result = match self.exec_block(frame, body) {
            Ok(Flow::Normal) => Ok(()),
            Ok(Flow::Return(_)) => Err(Exception::new(ExcType::SyntaxError, "'return' outside function")),
            Ok(flow @ (Flow::Break | Flow::Continue)) => Err(loop_control_outside_loop(&flow)),
            Err(exc) => Err(exc),
        };
        result.map_err(|mut exc| {
            exc.push_frame(frame.stack_frame());
            exc
        })
    }

    /// Evaluates a module-level expression, adding the `<module>` traceback entry on failure.
    pub fn eval_module_expr(&mut self, frame: &mut Frame, expr: &ExprLoc) -> RunResult<Value> {
        frame.line = expr.position.line;
        self.eval(frame, expr).map_err(|mut exc| {
            exc.push_frame(frame.stack_frame());
            exc
        })
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &[StmtLoc]) -> RunResult<Flow> {
        for stmt in body {
            match self.exec(frame, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &StmtLoc) -> RunResult<Flow> {
        frame.line = stmt.position.line;
        match &stmt.node {
            Node::Expr(expr) => {
                self.eval(frame, expr)?;
            }
            Node::Assign { targets, value } => {
                let value = self.eval(frame, value)?;
                for target in targets {
                    self.assign(frame, target, value.clone())?;
                }
            }
            Node::AugAssign { target, op, value } => self.exec_aug_assign(frame, target, *op, value)?,
            Node::If { test, body, or_else } => {
                let branch = if self.eval(frame, test)?.is_truthy() { body } else { or_else };
                return self.exec_block(frame, branch);
            }
            Node::While { test, body, or_else } => return self.exec_while(frame, stmt.position.line, test, body, or_else),
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => return self.exec_for(frame, target, iter, body, or_else),
            Node::FunctionDef(def) => {
                let function = self.make_function(frame, def)?;
                frame.store(&def.name, function)?;
            }
            Node::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Node::Pass | Node::Global(_) | Node::Nonlocal(_) => {}
            Node::Break => return Ok(Flow::Break),
            Node::Continue => return Ok(Flow::Continue),
            Node::Delete(targets) => {
                for target in targets {
                    self.delete(frame, target)?;
                }
            }
            Node::Raise(exc) => return Err(self.exec_raise(frame, exc.as_ref())),
            Node::Try {
                body,
                handlers,
                or_else,
                finally,
            } => {
                let outcome = match self.exec_block(frame, body) {
                    Ok(Flow::Normal) => self.exec_block(frame, or_else),
                    Ok(flow) => Ok(flow),
                    Err(exc) => self.exec_handlers(frame, exc, handlers),
                };
                if finally.is_empty() {
                    return outcome;
                }
                return match self.exec_block(frame, finally)? {
                    Flow::Normal => outcome,
                    flow => Ok(flow),
                };
            }
            Node::Assert { test, msg } => {
                if !self.eval(frame, test)?.is_truthy() {
                    return Err(match msg {
                        Some(msg) => Exception::new(ExcType::AssertionError, self.eval(frame, msg)?.py_str()),
                        None => Exception::bare(ExcType::AssertionError),
                    });
                }
            }
            Node::With { context, target, body } => return self.exec_with(frame, context, target.as_ref(), body),
            Node::Import(names) => {
                for (module, binding) in names {
                    let module = modules::import_module(module)?;
                    frame.store(binding, Value::Module(module))?;
                }
            }
            Node::ImportFrom { module, names } => {
                let module = modules::import_module(module)?;
                for (name, binding) in names {
                    let value = modules::get_attr(module, name).map_err(|_| {
                        Exception::new(
                            ExcType::ImportError,
                            format!("cannot import name '{name}' from '{module}' (unknown location)"),
                        )
                    })?;
                    frame.store(binding, value)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_aug_assign(&mut self, frame: &mut Frame, target: &Target, op: Operator, value: &ExprLoc) -> RunResult<()> {
        match target {
            Target::Name(name) => {
                let current = frame.lookup(name)?;
                let rhs = self.eval(frame, value)?;
                let updated = inplace_op(op, &current, &rhs)?;
                frame.store(name, updated)
            }
            Target::Subscript { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                let current = ops::get_item(&object, &index)?;
                let rhs = self.eval(frame, value)?;
                let updated = inplace_op(op, &current, &rhs)?;
                ops::set_item(&object, &index, updated)
            }
            Target::Unpack(_) => Err(Exception::new(
                ExcType::SyntaxError,
                "illegal expression for augmented assignment",
            )),
        }
    }

    fn exec_while(
        &mut self,
        frame: &mut Frame,
        line: u32,
        test: &ExprLoc,
        body: &[StmtLoc],
        or_else: &[StmtLoc],
    ) -> RunResult<Flow> {
        loop {
            frame.line = line;
            if !self.eval(frame, test)?.is_truthy() {
                break;
            }
            match self.exec_block(frame, body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        self.exec_block(frame, or_else)
    }

    fn exec_for(
        &mut self,
        frame: &mut Frame,
        target: &Target,
        iter: &ExprLoc,
        body: &[StmtLoc],
        or_else: &[StmtLoc],
    ) -> RunResult<Flow> {
        let iterable = self.eval(frame, iter)?;
        let items: Box<dyn Iterator<Item = Value>> = match &iterable {
            Value::Range(range) => Box::new(range.iter().map(Value::Int)),
            other => Box::new(ops::iterate(other)?.into_iter()),
        };
        for item in items {
            self.assign(frame, target, item)?;
            match self.exec_block(frame, body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        self.exec_block(frame, or_else)
    }

    fn exec_raise(&mut self, frame: &mut Frame, exc: Option<&ExprLoc>) -> Exception {
        let Some(expr) = exc else {
            return self
                .handling
                .last()
                .cloned()
                .unwrap_or_else(|| Exception::new(ExcType::RuntimeError, "No active exception to reraise"));
        };
        match self.eval(frame, expr) {
            Ok(value) => match to_exception(&value) {
                Ok(exc) | Err(exc) => exc,
            },
            Err(exc) => exc,
        }
    }

    fn exec_handlers(
        &mut self,
        frame: &mut Frame,
        exc: Exception,
        handlers: &[ExceptHandler],
    ) -> RunResult<Flow> {
        for handler in handlers {
            let matched = match &handler.exc_type {
                None => true,
                Some(expr) => {
                    let class = self.eval(frame, expr)?;
                    exception_matches(&exc, &class)?
                }
            };
            if !matched {
                continue;
            }
            if let Some(name) = &handler.name {
                frame.store(name, Value::Exception(Rc::new(exc.clone())))?;
            }
            self.handling.push(exc);
            let result = self.exec_block(frame, &handler.body);
            self.handling.pop();
            if let Some(name) = &handler.name {
                frame.unbind(name);
            }
            return result;
        }
        Err(exc)
    }

    fn exec_with(
        &mut self,
        frame: &mut Frame,
        context: &ExprLoc,
        target: Option<&Target>,
        body: &[StmtLoc],
    ) -> RunResult<Flow> {
        let manager = self.eval(frame, context)?;
        let resource = match &manager {
            Value::Resource(resource) if resource.is_file() => Rc::clone(resource),
            other => {
                return Err(Exception::type_error(format!(
                    "'{}' object does not support the context manager protocol",
                    other.type_name()
                )));
            }
        };
        if let Some(target) = target {
            self.assign(frame, target, manager)?;
        }
        let result = self.exec_block(frame, body);
        let closed = resource.close();
        let flow = result?;
        closed?;
        Ok(flow)
    }

    fn assign(&mut self, frame: &mut Frame, target: &Target, value: Value) -> RunResult<()> {
        match target {
            Target::Name(name) => frame.store(name, value),
            Target::Unpack(targets) => {
                let items = ops::iterate(&value).map_err(|_| {
                    Exception::type_error(format!(
                        "cannot unpack non-iterable {} object",
                        value.type_name()
                    ))
                })?;
                if items.len() < targets.len() {
                    return Err(Exception::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                if items.len() > targets.len() {
                    return Err(Exception::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(frame, target, item)?;
                }
                Ok(())
            }
            Target::Subscript { object, index } => {
                let object = self.eval(frame, object)?;
                if let Expr::Slice { lower, upper, step } = &index.expr {
                    if step.is_some() {
                        return Err(Exception::new(
                            ExcType::NotImplementedError,
                            "extended slice assignment is not supported",
                        ));
                    }
                    let lower = self.eval_optional(frame, lower.as_deref())?;
                    let upper = self.eval_optional(frame, upper.as_deref())?;
                    return ops::set_slice(&object, &lower, &upper, &value);
                }
                let index = self.eval(frame, index)?;
                ops::set_item(&object, &index, value)
            }
        }
    }

    fn delete(&mut self, frame: &mut Frame, target: &Target) -> RunResult<()> {
        match target {
            Target::Name(name) => {
                if frame.unbind(name) {
                    Ok(())
                } else {
                    Err(Exception::name_error(name))
                }
            }
            Target::Unpack(targets) => targets.iter().try_for_each(|t| self.delete(frame, t)),
            Target::Subscript { object, index } => {
                let object = self.eval(frame, object)?;
                let index = self.eval(frame, index)?;
                ops::del_item(&object, &index)
            }
        }
    }

    pub(crate) fn eval(&mut self, frame: &mut Frame, expr: &ExprLoc) -> RunResult<Value> {
        match &expr.expr {
            Expr::Literal(literal) => Ok(literal_value(literal)),
            Expr::Name(name) => frame.lookup(name),
            Expr::FString(parts) => self.eval_fstring(frame, parts),
            Expr::BinOp { left, op, right } => {
                let left = self.eval(frame, left)?;
                let right = self.eval(frame, right)?;
                ops::binary_op(*op, &left, &right)
            }
            Expr::BoolOp { op, values } => self.eval_bool_op(frame, *op, values),
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                ops::unary_op(*op, &operand)
            }
            Expr::Compare { left, ops: comparisons } => {
                let mut left = self.eval(frame, left)?;
                for (op, right) in comparisons {
                    let right = self.eval(frame, right)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::IfElse { test, body, orelse } => {
                let branch = if self.eval(frame, test)?.is_truthy() { body } else { orelse };
                self.eval(frame, branch)
            }
            Expr::Call { func, args } => self.eval_call(frame, func, args),
            Expr::Attribute { object, attr } => {
                let object = self.eval(frame, object)?;
                types::get_attribute(&object, attr)
            }
            Expr::Subscript { object, index } => self.eval_subscript(frame, object, index),
            Expr::Slice { .. } => Err(Exception::type_error("slices are only valid inside subscripts")),
            Expr::List(items) => Ok(Value::list(self.eval_all(frame, items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(frame, items)?)),
            Expr::Dict(pairs) => {
                let mut dict = Dict::new();
                for (key, value) in pairs {
                    let key = self.eval(frame, key)?;
                    let value = self.eval(frame, value)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::ListComp { elt, generators } => self.eval_list_comp(frame, elt, generators),
            Expr::DictComp { key, value, generators } => self.eval_dict_comp(frame, key, value, generators),
            Expr::Lambda(def) => self.make_function(frame, def),
        }
    }

    fn eval_all(&mut self, frame: &mut Frame, exprs: &[ExprLoc]) -> RunResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(frame, e)).collect()
    }

    fn eval_optional(&mut self, frame: &mut Frame, expr: Option<&ExprLoc>) -> RunResult<Value> {
        match expr {
            Some(expr) => self.eval(frame, expr),
            None => Ok(Value::None),
        }
    }

    fn eval_bool_op(&mut self, frame: &mut Frame, op: BoolOperator, values: &[ExprLoc]) -> RunResult<Value> {
        let mut result = Value::None;
        for (i, expr) in values.iter().enumerate() {
            result = self.eval(frame, expr)?;
            let last = i + 1 == values.len();
            let decided = match op {
                BoolOperator::And => !result.is_truthy(),
                BoolOperator::Or => result.is_truthy(),
            };
            if decided || last {
                break;
            }
        }
        Ok(result)
    }

    fn eval_subscript(&mut self, frame: &mut Frame, object: &ExprLoc, index: &ExprLoc) -> RunResult<Value> {
        let object = self.eval(frame, object)?;
        if let Expr::Slice { lower, upper, step } = &index.expr {
            let lower = self.eval_optional(frame, lower.as_deref())?;
            let upper = self.eval_optional(frame, upper.as_deref())?;
            let step = self.eval_optional(frame, step.as_deref())?;
            return ops::get_slice(&object, &lower, &upper, &step);
        }
        let index = self.eval(frame, index)?;
        ops::get_item(&object, &index)
    }

    fn eval_fstring(&mut self, frame: &mut Frame, parts: &[FStringPart]) -> RunResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                FStringPart::Literal(text) => out.push_str(text),
                FStringPart::Interpolation {
                    expr,
                    conversion,
                    format_spec,
                    debug_prefix,
                } => {
                    let value = self.eval(frame, expr)?;
                    if let Some(prefix) = debug_prefix {
                        out.push_str(prefix);
                    }
                    // `f'{x=}'` shows the repr unless a conversion or spec says otherwise
                    let conversion = match conversion {
                        ConversionFlag::None if debug_prefix.is_some() && format_spec.is_none() => {
                            ConversionFlag::Repr
                        }
                        other => *other,
                    };
                    let value = match conversion {
                        ConversionFlag::None => value,
                        ConversionFlag::Str => Value::from(value.py_str()),
                        ConversionFlag::Repr => Value::from(value.py_repr()),
                    };
                    out.push_str(&format_with_spec(&value, format_spec.as_deref().unwrap_or_default())?);
                }
            }
        }
        Ok(Value::from(out))
    }

    fn eval_call(&mut self, frame: &mut Frame, func: &ExprLoc, args: &[Arg]) -> RunResult<Value> {
        if let Expr::Attribute { object, attr } = &func.expr {
            let receiver = self.eval(frame, object)?;
            let args = self.eval_args(frame, args)?;
            return match &receiver {
                Value::Module(module) => {
                    let callee = modules::get_attr(*module, attr)?;
                    self.call(&callee, args)
                }
                _ => types::call_method(self, &receiver, attr, args),
            };
        }
        let callee = self.eval(frame, func)?;
        let args = self.eval_args(frame, args)?;
        self.call(&callee, args)
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Arg]) -> RunResult<ArgValues> {
        let mut values = ArgValues::default();
        for arg in args {
            match arg {
                Arg::Positional(expr) => values.positional.push(self.eval(frame, expr)?),
                Arg::Starred(expr) => {
                    let iterable = self.eval(frame, expr)?;
                    let items = ops::iterate(&iterable).map_err(|_| {
                        Exception::type_error(format!(
                            "argument after * must be an iterable, not {}",
                            iterable.type_name()
                        ))
                    })?;
                    values.positional.extend(items);
                }
                Arg::Keyword(name, expr) => {
                    let value = self.eval(frame, expr)?;
                    push_kwarg(&mut values, name.clone(), value)?;
                }
                Arg::DoubleStarred(expr) => {
                    let mapping = self.eval(frame, expr)?;
                    let Value::Dict(dict) = &mapping else {
                        return Err(Exception::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            mapping.type_name()
                        )));
                    };
                    let pairs: Vec<(Value, Value)> =
                        dict.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    for (key, value) in pairs {
                        let Value::Str(key) = &key else {
                            return Err(Exception::type_error("keywords must be strings"));
                        };
                        push_kwarg(&mut values, key.to_string(), value)?;
                    }
                }
            }
        }
        Ok(values)
    }

    /// Calls any callable value.
    pub(crate) fn call(&mut self, callee: &Value, args: ArgValues) -> RunResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            Value::Builtin(builtin) => builtins::call(self, *builtin, args),
            Value::Type(ty) => types::call_type(*ty, args),
            Value::ExcClass(exc_type) => new_exception(*exc_type, args),
            Value::ModuleFunction(function) => modules::call_module_function(*function, args),
            Value::Resource(resource) => match resource.host_object() {
                Some(HostObject::Shell) => {
                    args.check_zero_args("get_ipython")?;
                    Ok(callee.clone())
                }
                Some(HostObject::Exit | HostObject::Quit) => Ok(Value::None),
                Some(HostObject::Display) => {
                    for value in args.positional {
                        let mut line = value.py_repr();
                        line.push('\n');
                        self.writer.stdout_write(line.into())?;
                    }
                    Ok(Value::None)
                }
                None => Err(Exception::not_callable(resource.type_name())),
            },
            other => Err(Exception::not_callable(other.type_name())),
        }
    }

    fn call_function(&mut self, function: &Rc<Function>, args: ArgValues) -> RunResult<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Exception::new(ExcType::RecursionError, "maximum recursion depth exceeded"));
        }
        let bound = function.bind_arguments(args.positional, args.kwargs)?;
        let def = function.def();
        let mut frame = Frame {
            globals: Rc::clone(function.globals()),
            locals: Some(Scope::new(bound, function.closure().cloned())),
            kind: FrameKind::Function(Rc::clone(def)),
            source: Rc::clone(function.source()),
            name: def.name.clone(),
            line: def.line,
        };
        self.depth += 1;
        let result = match &def.body {
            FunctionBody::Block(body) => match self.exec_block(&mut frame, body) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(Flow::Normal) => Ok(Value::None),
                Ok(flow @ (Flow::Break | Flow::Continue)) => Err(loop_control_outside_loop(&flow)),
                Err(exc) => Err(exc),
            },
            FunctionBody::Expr(expr) => {
                frame.line = expr.position.line;
                self.eval(&mut frame, expr)
            }
        };
        self.depth -= 1;
        result.map_err(|mut exc| {
            exc.push_frame(frame.stack_frame());
            exc
        })
    }

    fn make_function(&mut self, frame: &mut Frame, def: &Rc<FunctionDef>) -> RunResult<Value> {
        let mut defaults = Defaults::default();
        for param in &def.params.positional {
            let value = param.default.as_ref().map(|d| self.eval(frame, d)).transpose()?;
            defaults.positional.push(value);
        }
        for param in &def.params.keyword_only {
            let value = param.default.as_ref().map(|d| self.eval(frame, d)).transpose()?;
            defaults.keyword_only.push(value);
        }
        Ok(Value::Function(Rc::new(Function::new(
            Rc::clone(def),
            defaults,
            Rc::clone(&frame.globals),
            frame.locals.clone(),
            Rc::clone(&frame.source),
        ))))
    }

    fn eval_list_comp(&mut self, frame: &mut Frame, elt: &ExprLoc, generators: &[Comprehension]) -> RunResult<Value> {
        let mut items = Vec::new();
        self.run_comprehension(frame, generators, &mut |interp, inner| {
            items.push(interp.eval(inner, elt)?);
            Ok(())
        })?;
        Ok(Value::list(items))
    }

    fn eval_dict_comp(
        &mut self,
        frame: &mut Frame,
        key: &ExprLoc,
        value: &ExprLoc,
        generators: &[Comprehension],
    ) -> RunResult<Value> {
        let mut dict = Dict::new();
        self.run_comprehension(frame, generators, &mut |interp, inner| {
            let k = interp.eval(inner, key)?;
            let v = interp.eval(inner, value)?;
            dict.insert(k, v)
        })?;
        Ok(Value::dict(dict))
    }

    /// Drives the `for` clauses of a comprehension in a child scope, calling `emit` per item.
    ///
    /// The first iterable is evaluated in the enclosing frame, the rest in the child scope.
    fn run_comprehension(
        &mut self,
        frame: &mut Frame,
        generators: &[Comprehension],
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> RunResult<()>,
    ) -> RunResult<()> {
        let Some(first) = generators.first() else {
            return Ok(());
        };
        let first_iterable = self.eval(frame, &first.iter)?;
        let mut inner = frame.comprehension();
        self.comprehension_level(&mut inner, generators, Some(first_iterable), emit)
    }

    fn comprehension_level(
        &mut self,
        frame: &mut Frame,
        generators: &[Comprehension],
        iterable: Option<Value>,
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> RunResult<()>,
    ) -> RunResult<()> {
        let Some((generator, rest)) = generators.split_first() else {
            return emit(self, frame);
        };
        let iterable = match iterable {
            Some(value) => value,
            None => self.eval(frame, &generator.iter)?,
        };
        'items: for item in ops::iterate(&iterable)? {
            self.assign(frame, &generator.target, item)?;
            for condition in &generator.ifs {
                if !self.eval(frame, condition)?.is_truthy() {
                    continue 'items;
                }
            }
            self.comprehension_level(frame, rest, None, emit)?;
        }
        Ok(())
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::str(s),
    }
}

fn loop_control_outside_loop(flow: &Flow) -> Exception {
    let message = match flow {
        Flow::Continue => "'continue' not properly in loop",
        _ => "'break' outside loop",
    };
    Exception::new(ExcType::SyntaxError, message)
}

fn push_kwarg(values: &mut ArgValues, name: String, value: Value) -> RunResult<()> {
    if values.kwargs.iter().any(|(key, _)| *key == name) {
        return Err(Exception::type_error(format!(
            "got multiple values for keyword argument '{name}'"
        )));
    }
    values.kwargs.push((name, value));
    Ok(())
}

/// `x op= y`: lists extend in place, everything else rebinds.
fn inplace_op(op: Operator, current: &Value, rhs: &Value) -> RunResult<Value> {
    if let (Operator::Add, Value::List(items)) = (op, current) {
        let extra = ops::iterate(rhs)?;
        items.borrow_mut().extend(extra);
        return Ok(current.clone());
    }
    ops::binary_op(op, current, rhs)
}

/// Turns the operand of `raise` into an exception.
fn to_exception(value: &Value) -> RunResult<Exception> {
    match value {
        Value::ExcClass(exc_type) => Ok(Exception::bare(*exc_type)),
        Value::Exception(exc) => Ok(exc.without_traceback()),
        _ => Err(Exception::type_error("exceptions must derive from BaseException")),
    }
}

/// Whether `except class:` catches `exc`.
fn exception_matches(exc: &Exception, class: &Value) -> RunResult<bool> {
    match class {
        Value::ExcClass(exc_type) => Ok(exc.exc_type().is_subclass_of(*exc_type)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(exc, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(Exception::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

/// Calling an exception class: `ValueError("bad")`.
fn new_exception(exc_type: ExcType, args: ArgValues) -> RunResult<Value> {
    let name: &'static str = exc_type.into();
    args.reject_kwargs(name)?;
    let exc = match args.positional.as_slice() {
        [] => Exception::bare(exc_type),
        [message] => Exception::new(exc_type, message.py_str()),
        several => Exception::new(exc_type, Value::tuple(several.to_vec()).py_repr()),
    };
    Ok(Value::Exception(Rc::new(exc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{io::CapturedOutput, namespace::Namespace, parse::parse_statements};

    fn run(code: &str) -> (RunResult<()>, String, NamespaceRef) {
        let globals = Namespace::new().into_ref();
        let mut output = CapturedOutput::new();
        let body = parse_statements(code).unwrap();
        let mut frame = Frame::module(Rc::clone(&globals), "<test>", code);
        let result = Interpreter::new(&mut output).run_module(&mut frame, &body);
        (result, output.stdout().to_owned(), globals)
    }

    #[test]
    fn closures_see_enclosing_scope() {
        let (result, out, _) = run(
            "def outer():\n    n = 0\n    def inc():\n        nonlocal n\n        n += 1\n        return n\n    inc()\n    return inc()\nprint(outer())\n",
        );
        result.unwrap();
        assert_eq!(out, "2\n");
    }

    #[test]
    fn unbound_local_is_reported() {
        let (result, _, _) = run("x = 1\ndef f():\n    print(x)\n    x = 2\nf()\n");
        let err = result.unwrap_err();
        assert_eq!(err.exc_type(), ExcType::UnboundLocalError);
        let frames: Vec<_> = err.traceback().map(|f| (f.name.clone(), f.line)).collect();
        assert_eq!(frames, vec![("<module>".to_owned(), 5), ("f".to_owned(), 3)]);
    }

    #[test]
    fn try_except_finally() {
        let (result, out, _) = run(
            "try:\n    1/0\nexcept ZeroDivisionError as e:\n    print('caught', e)\nelse:\n    print('no')\nfinally:\n    print('done')\n",
        );
        result.unwrap();
        assert_eq!(out, "caught division by zero\ndone\n");
    }

    #[test]
    fn handler_name_is_unbound_afterwards() {
        let (result, _, globals) = run("try:\n    raise ValueError('x')\nexcept ValueError as err:\n    pass\n");
        result.unwrap();
        assert!(!globals.borrow().contains("err"));
    }

    #[test]
    fn comprehension_variables_do_not_leak() {
        let (result, _, globals) = run("xs = [i * i for i in range(4) if i % 2 == 0]\n");
        result.unwrap();
        let globals = globals.borrow();
        assert_eq!(globals.get("xs").unwrap().py_repr(), "[0, 4]");
        assert!(!globals.contains("i"));
    }

    #[test]
    fn list_augmented_assignment_mutates_in_place() {
        let (result, out, _) = run("a = [1]\nb = a\na += [2]\nprint(b)\n");
        result.unwrap();
        assert_eq!(out, "[1, 2]\n");
    }

    #[test]
    fn bare_raise_outside_handler() {
        let (result, _, _) = run("raise\n");
        assert_eq!(
            result.unwrap_err().summary(),
            "RuntimeError: No active exception to reraise"
        );
    }
}
