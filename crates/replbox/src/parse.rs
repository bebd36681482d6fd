use std::{borrow::Cow, fmt, rc::Rc};

use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ConversionFlag as RuffConversionFlag, ElifElseClause, Expr as AstExpr,
    InterpolatedStringElement, Number, Operator as AstOperator, ParameterWithDefault, Stmt, UnaryOp,
};
use ruff_python_parser::{parse_expression, parse_module};
use ruff_text_size::{Ranged, TextRange};

use crate::{
    exception::{ExcType, Exception, StackFrame},
    expressions::{
        Arg, BoolOperator, CmpOperator, CodeRange, Comprehension, ConversionFlag, ExceptHandler, Expr, ExprLoc,
        FStringPart, FunctionBody, FunctionDef, Literal, Node, Operator, Param, Parameters, StmtLoc, Target,
        UnaryOperator,
    },
};

/// Maximum nesting depth for AST structures during lowering.
/// Matches CPython's limit of ~200 for nested parentheses.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// In debug builds stack frames are much larger, so the limit is set conservatively.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// Parses `code` as one expression. Fails if the fragment is anything else.
pub(crate) fn parse_expression_snippet(code: &str) -> Result<ExprLoc, ParseError> {
    let mut parser = Parser::new(code);
    let parsed =
        parse_expression(code).map_err(|e| ParseError::syntax(e.to_string(), parser.convert_range(e.range())))?;
    parser.parse_expression(*parsed.into_syntax().body)
}

/// Parses `code` as a module body.
pub(crate) fn parse_statements(code: &str) -> Result<Vec<StmtLoc>, ParseError> {
    let mut parser = Parser::new(code);
    let parsed = parse_module(code).map_err(|e| ParseError::syntax(e.to_string(), parser.convert_range(e.range())))?;
    parser.parse_statements(parsed.into_syntax().body)
}

/// Lowers ruff's AST into [`crate::expressions`].
struct Parser<'a> {
    code: &'a str,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
    /// Remaining nesting depth budget; reaching zero is a syntax error.
    depth_remaining: u16,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(code.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            code,
            line_starts,
            depth_remaining: MAX_NESTING_DEPTH,
        }
    }

    fn parse_statements(&mut self, statements: Vec<Stmt>) -> Result<Vec<StmtLoc>, ParseError> {
        statements.into_iter().map(|s| self.parse_statement(s)).collect()
    }

    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<StmtLoc>, ParseError> {
        let mut tail: Vec<StmtLoc> = Vec::new();
        for clause in clauses.into_iter().rev() {
            let position = self.convert_range(clause.range);
            match clause.test {
                Some(test) => {
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body)?;
                    let or_else = tail;
                    tail = vec![StmtLoc::new(position, Node::If { test, body, or_else })];
                }
                None => {
                    tail = self.parse_statements(clause.body)?;
                }
            }
        }
        Ok(tail)
    }

    fn parse_except_handler(&mut self, handler: ast::ExceptHandler) -> Result<ExceptHandler, ParseError> {
        let ast::ExceptHandler::ExceptHandler(h) = handler;
        let exc_type = match h.type_ {
            Some(expr) => Some(self.parse_expression(*expr)?),
            None => None,
        };
        let name = h.name.map(|n| n.id.to_string());
        let body = self.parse_statements(h.body)?;
        Ok(ExceptHandler { exc_type, name, body })
    }

    fn parse_statement(&mut self, statement: Stmt) -> Result<StmtLoc, ParseError> {
        self.decr_depth_remaining(|| statement.range())?;
        let result = self.parse_statement_impl(statement);
        self.depth_remaining += 1;
        result
    }

    fn parse_statement_impl(&mut self, statement: Stmt) -> Result<StmtLoc, ParseError> {
        let position = self.convert_range(statement.range());
        let node = match statement {
            Stmt::FunctionDef(function) => {
                if function.is_async {
                    return Err(ParseError::not_implemented("async functions", position));
                }
                if !function.decorator_list.is_empty() {
                    return Err(ParseError::not_implemented("decorators", position));
                }
                if function.type_params.is_some() {
                    return Err(ParseError::not_implemented("type parameters", position));
                }
                let params = self.parse_parameters(&function.parameters)?;
                let body = self.parse_statements(function.body)?;
                Node::FunctionDef(Rc::new(FunctionDef::new(
                    function.name.id.to_string(),
                    params,
                    FunctionBody::Block(body),
                    position.line,
                )))
            }
            Stmt::ClassDef(_) => return Err(ParseError::not_implemented("class definitions", position)),
            Stmt::Return(ast::StmtReturn { value, .. }) => {
                Node::Return(value.map(|v| self.parse_expression(*v)).transpose()?)
            }
            Stmt::Delete(ast::StmtDelete { targets, .. }) => Node::Delete(
                targets
                    .into_iter()
                    .map(|t| self.parse_target(t))
                    .collect::<Result<_, _>>()?,
            ),
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                let targets = targets
                    .into_iter()
                    .map(|t| self.parse_target(t))
                    .collect::<Result<_, _>>()?;
                let value = self.parse_expression(*value)?;
                Node::Assign { targets, value }
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => {
                let target = self.parse_target(*target)?;
                let op = convert_op(op).ok_or_else(|| ParseError::not_implemented("the @ operator", position))?;
                let value = self.parse_expression(*value)?;
                Node::AugAssign { target, op, value }
            }
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => match value {
                Some(value) => Node::Assign {
                    targets: vec![self.parse_target(*target)?],
                    value: self.parse_expression(*value)?,
                },
                None => Node::Pass,
            },
            Stmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_implemented("async for", position));
                }
                Node::For {
                    target: self.parse_target(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_statements(body)?,
                    or_else: self.parse_statements(orelse)?,
                }
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_statements(body)?,
                or_else: self.parse_statements(orelse)?,
            },
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body)?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Node::If { test, body, or_else }
            }
            Stmt::With(ast::StmtWith {
                items, body, is_async, ..
            }) => {
                if is_async {
                    return Err(ParseError::not_implemented("async with", position));
                }
                // `with a, b:` is `with a:` wrapping `with b:`
                let mut body = self.parse_statements(body)?;
                let mut items = items.into_iter().rev().peekable();
                loop {
                    let Some(item) = items.next() else {
                        return Err(ParseError::syntax("expected at least one with item", position));
                    };
                    let context = self.parse_expression(item.context_expr)?;
                    let target = item.optional_vars.map(|t| self.parse_target(*t)).transpose()?;
                    let node = Node::With { context, target, body };
                    if items.peek().is_none() {
                        break node;
                    }
                    body = vec![StmtLoc::new(position, node)];
                }
            }
            Stmt::Raise(ast::StmtRaise { exc, .. }) => Node::Raise(exc.map(|e| self.parse_expression(*e)).transpose()?),
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                is_star,
                ..
            }) => {
                if is_star {
                    return Err(ParseError::not_implemented("except*", position));
                }
                Node::Try {
                    body: self.parse_statements(body)?,
                    handlers: handlers
                        .into_iter()
                        .map(|h| self.parse_except_handler(h))
                        .collect::<Result<_, _>>()?,
                    or_else: self.parse_statements(orelse)?,
                    finally: self.parse_statements(finalbody)?,
                }
            }
            Stmt::Assert(ast::StmtAssert { test, msg, .. }) => Node::Assert {
                test: self.parse_expression(*test)?,
                msg: msg.map(|m| self.parse_expression(*m)).transpose()?,
            },
            Stmt::Import(ast::StmtImport { names, .. }) => Node::Import(
                names
                    .into_iter()
                    .map(|alias| {
                        let module = alias.name.id.to_string();
                        let binding = match alias.asname {
                            Some(asname) => asname.id.to_string(),
                            None => module.split('.').next().unwrap_or_default().to_owned(),
                        };
                        (module, binding)
                    })
                    .collect(),
            ),
            Stmt::ImportFrom(ast::StmtImportFrom {
                module, names, level, ..
            }) => {
                let module = match module {
                    Some(module) if level == 0 => module.id.to_string(),
                    _ => return Err(ParseError::not_implemented("relative imports", position)),
                };
                let mut bindings = Vec::with_capacity(names.len());
                for alias in names {
                    let name = alias.name.id.to_string();
                    if name == "*" {
                        return Err(ParseError::not_implemented("star imports", position));
                    }
                    let binding = alias.asname.map_or_else(|| name.clone(), |asname| asname.id.to_string());
                    bindings.push((name, binding));
                }
                Node::ImportFrom {
                    module,
                    names: bindings,
                }
            }
            Stmt::Global(ast::StmtGlobal { names, .. }) => Node::Global(names.iter().map(|n| n.id.to_string()).collect()),
            Stmt::Nonlocal(ast::StmtNonlocal { names, .. }) => {
                Node::Nonlocal(names.iter().map(|n| n.id.to_string()).collect())
            }
            Stmt::Expr(ast::StmtExpr { value, .. }) => Node::Expr(self.parse_expression(*value)?),
            Stmt::Pass(_) => Node::Pass,
            Stmt::Break(_) => Node::Break,
            Stmt::Continue(_) => Node::Continue,
            Stmt::Match(_) => return Err(ParseError::not_implemented("match statements", position)),
            Stmt::TypeAlias(_) => return Err(ParseError::not_implemented("type aliases", position)),
            _ => return Err(ParseError::not_implemented("this statement", position)),
        };
        Ok(StmtLoc::new(position, node))
    }

    fn parse_target(&mut self, expression: AstExpr) -> Result<Target, ParseError> {
        let position = self.convert_range(expression.range());
        match expression {
            AstExpr::Name(ast::ExprName { id, .. }) => Ok(Target::Name(id.to_string())),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) | AstExpr::List(ast::ExprList { elts, .. }) => Ok(
                Target::Unpack(elts.into_iter().map(|e| self.parse_target(e)).collect::<Result<_, _>>()?),
            ),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(Target::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_expression(*slice)?),
            }),
            AstExpr::Starred(_) => Err(ParseError::not_implemented("starred assignment targets", position)),
            AstExpr::Attribute(_) => Err(ParseError::not_implemented("attribute assignment", position)),
            _ => Err(ParseError::syntax("cannot assign to expression", position)),
        }
    }

    fn parse_expression(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        self.decr_depth_remaining(|| expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_boxed(&mut self, expression: AstExpr) -> Result<Box<ExprLoc>, ParseError> {
        self.parse_expression(expression).map(Box::new)
    }

    fn parse_expressions(&mut self, expressions: Vec<AstExpr>) -> Result<Vec<ExprLoc>, ParseError> {
        expressions.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        let position = self.convert_range(expression.range());
        let expr = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => Expr::BoolOp {
                op: match op {
                    BoolOp::And => BoolOperator::And,
                    BoolOp::Or => BoolOperator::Or,
                },
                values: self.parse_expressions(values)?,
            },
            AstExpr::Named(_) => return Err(ParseError::not_implemented("assignment expressions", position)),
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => {
                let op = convert_op(op).ok_or_else(|| ParseError::not_implemented("the @ operator", position))?;
                Expr::BinOp {
                    left: self.parse_boxed(*left)?,
                    op,
                    right: self.parse_boxed(*right)?,
                }
            }
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => Expr::Unary {
                op: match op {
                    UnaryOp::Not => UnaryOperator::Not,
                    UnaryOp::USub => UnaryOperator::Neg,
                    UnaryOp::UAdd => UnaryOperator::Pos,
                    UnaryOp::Invert => UnaryOperator::Invert,
                },
                operand: self.parse_boxed(*operand)?,
            },
            AstExpr::Lambda(ast::ExprLambda { parameters, body, .. }) => {
                let params = match parameters {
                    Some(parameters) => self.parse_parameters(&parameters)?,
                    None => Parameters::default(),
                };
                let body = self.parse_boxed(*body)?;
                Expr::Lambda(Rc::new(FunctionDef::new(
                    "<lambda>".to_owned(),
                    params,
                    FunctionBody::Expr(body),
                    position.line,
                )))
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Expr::IfElse {
                test: self.parse_boxed(*test)?,
                body: self.parse_boxed(*body)?,
                orelse: self.parse_boxed(*orelse)?,
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut pairs = Vec::with_capacity(items.len());
                for item in items {
                    let Some(key) = item.key else {
                        return Err(ParseError::not_implemented("dict unpacking in literals", position));
                    };
                    pairs.push((self.parse_expression(key)?, self.parse_expression(item.value)?));
                }
                Expr::Dict(pairs)
            }
            AstExpr::ListComp(ast::ExprListComp { elt, generators, .. })
            | AstExpr::Generator(ast::ExprGenerator { elt, generators, .. }) => Expr::ListComp {
                elt: self.parse_boxed(*elt)?,
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::DictComp(ast::ExprDictComp {
                key, value, generators, ..
            }) => Expr::DictComp {
                key: self.parse_boxed(*key)?,
                value: self.parse_boxed(*value)?,
                generators: self.parse_comprehensions(generators)?,
            },
            AstExpr::Compare(ast::ExprCompare {
                left, ops, comparators, ..
            }) => {
                let left = self.parse_boxed(*left)?;
                let ops = ops
                    .into_vec()
                    .into_iter()
                    .zip(comparators.into_vec())
                    .map(|(op, right)| Ok((convert_compare_op(op), self.parse_expression(right)?)))
                    .collect::<Result<_, ParseError>>()?;
                Expr::Compare { left, ops }
            }
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let func = self.parse_boxed(*func)?;
                let mut args = Vec::with_capacity(arguments.args.len() + arguments.keywords.len());
                for arg in arguments.args.into_vec() {
                    match arg {
                        AstExpr::Starred(ast::ExprStarred { value, .. }) => {
                            args.push(Arg::Starred(self.parse_expression(*value)?));
                        }
                        other => args.push(Arg::Positional(self.parse_expression(other)?)),
                    }
                }
                for keyword in arguments.keywords.into_vec() {
                    let value = self.parse_expression(keyword.value)?;
                    args.push(match keyword.arg {
                        Some(name) => Arg::Keyword(name.id.to_string(), value),
                        None => Arg::DoubleStarred(value),
                    });
                }
                Expr::Call { func, args }
            }
            AstExpr::FString(ast::ExprFString { value, .. }) => return self.parse_fstring(&value, position),
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Expr::Literal(Literal::Str(value.to_string()))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => Expr::Literal(Literal::Int(i)),
                    None => return Err(ParseError::not_implemented("integers wider than 64 bits", position)),
                },
                Number::Float(f) => Expr::Literal(Literal::Float(f)),
                Number::Complex { .. } => return Err(ParseError::not_implemented("complex numbers", position)),
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Expr::Literal(Literal::Bool(value)),
            AstExpr::NoneLiteral(_) => Expr::Literal(Literal::None),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::Attribute {
                object: self.parse_boxed(*value)?,
                attr: attr.id.to_string(),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Expr::Subscript {
                object: self.parse_boxed(*value)?,
                index: self.parse_boxed(*slice)?,
            },
            AstExpr::Name(ast::ExprName { id, .. }) => Expr::Name(id.to_string()),
            AstExpr::List(ast::ExprList { elts, .. }) => Expr::List(self.parse_elements(elts, position)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Expr::Tuple(self.parse_elements(elts, position)?),
            AstExpr::Slice(ast::ExprSlice { lower, upper, step, .. }) => Expr::Slice {
                lower: lower.map(|e| self.parse_boxed(*e)).transpose()?,
                upper: upper.map(|e| self.parse_boxed(*e)).transpose()?,
                step: step.map(|e| self.parse_boxed(*e)).transpose()?,
            },
            AstExpr::Set(_) | AstExpr::SetComp(_) => return Err(ParseError::not_implemented("sets", position)),
            AstExpr::BytesLiteral(_) => return Err(ParseError::not_implemented("bytes literals", position)),
            AstExpr::Await(_) => return Err(ParseError::not_implemented("await", position)),
            AstExpr::Yield(_) | AstExpr::YieldFrom(_) => return Err(ParseError::not_implemented("generators", position)),
            AstExpr::Starred(_) => return Err(ParseError::not_implemented("starred expressions", position)),
            _ => return Err(ParseError::not_implemented("this expression", position)),
        };
        Ok(ExprLoc::new(position, expr))
    }

    /// Elements of a list or tuple display; `*x` inside a display is not supported.
    fn parse_elements(&mut self, elts: Vec<AstExpr>, position: CodeRange) -> Result<Vec<ExprLoc>, ParseError> {
        if elts.iter().any(|e| matches!(e, AstExpr::Starred(_))) {
            return Err(ParseError::not_implemented("unpacking in displays", position));
        }
        self.parse_expressions(elts)
    }

    fn parse_comprehensions(&mut self, generators: Vec<ast::Comprehension>) -> Result<Vec<Comprehension>, ParseError> {
        generators
            .into_iter()
            .map(|comp| {
                if comp.is_async {
                    return Err(ParseError::not_implemented(
                        "async comprehensions",
                        self.convert_range(comp.range),
                    ));
                }
                let target = self.parse_target(comp.target)?;
                let iter = self.parse_expression(comp.iter)?;
                let ifs = self.parse_expressions(comp.ifs)?;
                Ok(Comprehension { target, iter, ifs })
            })
            .collect()
    }

    fn parse_parameters(&mut self, params: &ast::Parameters) -> Result<Parameters, ParseError> {
        let mut positional = self.parse_params_with_defaults(&params.posonlyargs)?;
        positional.extend(self.parse_params_with_defaults(&params.args)?);
        Ok(Parameters {
            positional,
            var_args: params.vararg.as_ref().map(|p| p.name.id.to_string()),
            keyword_only: self.parse_params_with_defaults(&params.kwonlyargs)?,
            var_kwargs: params.kwarg.as_ref().map(|p| p.name.id.to_string()),
        })
    }

    fn parse_params_with_defaults(&mut self, params: &[ParameterWithDefault]) -> Result<Vec<Param>, ParseError> {
        params
            .iter()
            .map(|p| {
                let default = match &p.default {
                    Some(expr) => Some(self.parse_expression((**expr).clone())?),
                    None => None,
                };
                Ok(Param {
                    name: p.parameter.name.id.to_string(),
                    default,
                })
            })
            .collect()
    }

    /// Parses an f-string value into literal and interpolation parts.
    fn parse_fstring(&mut self, value: &ast::FStringValue, position: CodeRange) -> Result<ExprLoc, ParseError> {
        let mut parts = Vec::new();
        for fstring_part in value {
            match fstring_part {
                ast::FStringPart::Literal(lit) => {
                    let processed = lit.value.to_string();
                    if !processed.is_empty() {
                        parts.push(FStringPart::Literal(processed));
                    }
                }
                ast::FStringPart::FString(fstring) => {
                    for element in &fstring.elements {
                        parts.push(self.parse_fstring_element(element, position)?);
                    }
                }
            }
        }
        Ok(ExprLoc::new(position, Expr::FString(parts)))
    }

    fn parse_fstring_element(
        &mut self,
        element: &InterpolatedStringElement,
        position: CodeRange,
    ) -> Result<FStringPart, ParseError> {
        match element {
            InterpolatedStringElement::Literal(lit) => Ok(FStringPart::Literal(lit.value.to_string())),
            InterpolatedStringElement::Interpolation(interp) => {
                let expr = Box::new(self.parse_expression((*interp.expression).clone())?);
                let conversion = match interp.conversion {
                    RuffConversionFlag::None => ConversionFlag::None,
                    RuffConversionFlag::Str => ConversionFlag::Str,
                    RuffConversionFlag::Repr | RuffConversionFlag::Ascii => ConversionFlag::Repr,
                };
                let format_spec = match &interp.format_spec {
                    Some(spec) => {
                        let mut text = String::new();
                        for element in &spec.elements {
                            match element {
                                InterpolatedStringElement::Literal(lit) => text.push_str(&lit.value),
                                InterpolatedStringElement::Interpolation(_) => {
                                    return Err(ParseError::not_implemented("nested format specs", position));
                                }
                            }
                        }
                        Some(text)
                    }
                    None => None,
                };
                // `f'{a=}'` renders as "a=" followed by the value
                let debug_prefix = interp.debug_text.as_ref().map(|dt| {
                    let expr_text = &self.code[interp.expression.range()];
                    format!("{}{}{}", dt.leading, expr_text, dt.trailing)
                });
                Ok(FStringPart::Interpolation {
                    expr,
                    conversion,
                    format_spec,
                    debug_prefix,
                })
            }
        }
    }

    fn convert_range(&self, range: TextRange) -> CodeRange {
        let offset = usize::from(range.start());
        let line_index = self.line_starts.partition_point(|&start| start <= offset).saturating_sub(1);
        let line_start = self.line_starts.get(line_index).copied().unwrap_or_default();
        CodeRange::new(
            u32::try_from(line_index + 1).unwrap_or(u32::MAX),
            u32::try_from(offset - line_start).unwrap_or(u32::MAX),
        )
    }

    /// Decrements the depth remaining for nested structures.
    /// Returns an error if the depth remaining goes to zero.
    fn decr_depth_remaining(&mut self, get_range: impl FnOnce() -> TextRange) -> Result<(), ParseError> {
        if let Some(depth_remaining) = self.depth_remaining.checked_sub(1) {
            self.depth_remaining = depth_remaining;
            Ok(())
        } else {
            let position = self.convert_range(get_range());
            Err(ParseError::syntax("too many nested parentheses", position))
        }
    }
}

fn convert_op(op: AstOperator) -> Option<Operator> {
    Some(match op {
        AstOperator::Add => Operator::Add,
        AstOperator::Sub => Operator::Sub,
        AstOperator::Mult => Operator::Mult,
        AstOperator::Div => Operator::Div,
        AstOperator::FloorDiv => Operator::FloorDiv,
        AstOperator::Mod => Operator::Mod,
        AstOperator::Pow => Operator::Pow,
        AstOperator::LShift => Operator::LShift,
        AstOperator::RShift => Operator::RShift,
        AstOperator::BitOr => Operator::BitOr,
        AstOperator::BitXor => Operator::BitXor,
        AstOperator::BitAnd => Operator::BitAnd,
        AstOperator::MatMult => return None,
    })
}

fn convert_compare_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// Errors that can occur while parsing or lowering source code.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Error in syntax
    Syntax {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
    /// Valid Python the interpreter does not support.
    /// Message gets prefixed with "The replbox parser does not support ".
    NotImplemented {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
}

impl ParseError {
    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Syntax {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn not_implemented(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::NotImplemented {
            msg: msg.into(),
            position,
        }
    }

    #[must_use]
    pub fn position(&self) -> CodeRange {
        match self {
            Self::Syntax { position, .. } | Self::NotImplemented { position, .. } => *position,
        }
    }

    /// Converts this parser error into a Python exception pointing at the offending line.
    #[must_use]
    pub fn into_python_exc(self, filename: &str, source: &str) -> Exception {
        let line = self.position().line;
        let mut exc = match self {
            Self::Syntax { msg, .. } => Exception::new(ExcType::SyntaxError, msg.into_owned()),
            Self::NotImplemented { msg, .. } => Exception::new(
                ExcType::NotImplementedError,
                format!("The replbox parser does not support {msg}"),
            ),
        };
        exc.push_frame(StackFrame::new(filename, line, "<module>", source));
        exc
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { msg, position } => write!(f, "SyntaxError: {msg} (line {})", position.line),
            Self::NotImplemented { msg, position } => {
                write!(f, "The replbox parser does not support {msg} (line {})", position.line)
            }
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_form_accepts_only_expressions() {
        assert!(parse_expression_snippet("1 + 2").is_ok());
        assert!(parse_expression_snippet("f(x)[0].y").is_ok());
        assert!(parse_expression_snippet("x = 1").is_err());
        assert!(parse_expression_snippet("print(1)\nprint(2)").is_err());
    }

    #[test]
    fn statement_positions_are_one_based_lines() {
        let body = parse_statements("a = 1\n\nb = 2").unwrap();
        let lines: Vec<u32> = body.iter().map(|s| s.position.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn function_scope_facts() {
        let body = parse_statements(
            "def f(a, *rest, k=1):\n    global g\n    b = a + h\n    def inner():\n        return zz\n    return b",
        )
        .unwrap();
        let Node::FunctionDef(def) = &body[0].node else {
            panic!("expected a function definition");
        };
        assert_eq!(def.locals, vec!["a", "b", "inner", "k", "rest"]);
        assert_eq!(def.declared_global, vec!["g"]);
        assert!(def.referenced.contains(&"h".to_owned()));
        assert!(def.referenced.contains(&"zz".to_owned()), "nested bodies are included");
    }

    #[test]
    fn unsupported_syntax_is_not_implemented() {
        let err = parse_statements("class A:\n    pass").unwrap_err();
        assert!(matches!(err, ParseError::NotImplemented { .. }));
    }

    #[test]
    fn syntax_errors_carry_a_line() {
        let err = parse_statements("x = 1\ny = = 2").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert_eq!(err.position().line, 2);
    }
}
