//! Expression evaluation.
//!
//! Sub-expressions evaluate left-to-right; `and`/`or` short-circuit, `xor`
//! does not. Postfix chains run through [`ExecChain`], the runtime mirror of
//! the analyzer's accessor-chain checker.

use std::cell::RefCell;
use std::rc::Rc;

use super::Executor;
use crate::ast::{Accessor, AccessorKind, Expr, ExprKind, Postfix, PostfixKind, PrefixKind, SumOp, TermOp, TypeId};
use crate::builtins::Builtin;
use crate::source::Span;
use crate::types::{DType, FuncType};
use crate::value::{Closure, ErrorKind, OpResult, RuntimeError, Value, rel_holds};

/// The value flowing through a postfix chain, with the span covered so far.
pub(crate) struct ExecChain {
    pub cur: Value,
    pub loc: Span,
}

impl ExecChain {
    pub fn new(cur: Value, loc: Span) -> Self {
        Self { cur, loc }
    }
}

fn type_id_to_dtype(type_id: TypeId) -> DType {
    match type_id {
        TypeId::Int => DType::Int,
        TypeId::Real => DType::Real,
        TypeId::Str => DType::Str,
        TypeId::Bool => DType::Bool,
        TypeId::None => DType::None,
        TypeId::Func => DType::Func(Rc::new(FuncType::opaque())),
        TypeId::Array => DType::Array,
        TypeId::Tuple => DType::Tuple,
    }
}

impl Executor<'_, '_> {
    /// Evaluates one expression, or returns `None` with the control state
    /// carrying the reason (throwing, or already unwinding).
    pub(crate) fn eval(&mut self, expr: &Expr) -> Option<Value> {
        if !self.ctx.state.is_running() {
            return None;
        }
        match &expr.kind {
            ExprKind::Literal(value) => Some(value.clone()),
            ExprKind::Name(ident) => match self.lookup_value(&ident.name) {
                Some(value) => Some(value),
                None => {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::UndefinedVariable,
                            format!("Variable \"{}\" is not defined", ident.name),
                        ),
                        expr.span,
                    );
                    None
                }
            },
            ExprKind::Closure(def) => {
                // Captured externals are snapshotted by value right now;
                // later reassignments in the enclosing scope stay invisible.
                let captured: Vec<(String, Value)> = def
                    .captured
                    .iter()
                    .map(|name| {
                        let value = self
                            .lookup_value(name)
                            .expect("the analyzer resolved every captured name");
                        (name.clone(), value)
                    })
                    .collect();
                Some(Value::Closure(Rc::new(Closure {
                    params: def.params.clone(),
                    captured: RefCell::new(captured),
                    body: Rc::clone(&def.body),
                    func_type: Rc::clone(&def.func_type),
                })))
            }
            ExprKind::And(operands) => self.eval_and_or(operands, false),
            ExprKind::Or(operands) => self.eval_and_or(operands, true),
            ExprKind::Xor(operands) => {
                let mut acc: Option<bool> = None;
                for operand in operands {
                    let b = self.eval_logical_operand(operand, "xor")?;
                    acc = Some(match acc {
                        None => b,
                        Some(a) => a != b,
                    });
                }
                Some(Value::Bool(acc.expect("xor chains have operands")))
            }
            ExprKind::Not(inner) => {
                let value = self.eval(inner)?;
                match value.unary_not() {
                    OpResult::Ok(result) => Some(result),
                    OpResult::Err(error) => {
                        self.ctx.throw(error, inner.span);
                        None
                    }
                    OpResult::Unsupported => {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::TypeMismatch,
                                format!("Operator \"not\" is not applicable to \"{}\"", value.dtype()),
                            ),
                            inner.span,
                        );
                        None
                    }
                }
            }
            ExprKind::Relation { operands, ops } => {
                let mut prev = self.eval(&operands[0])?;
                let mut prev_span = operands[0].span;
                for (operand, op) in operands[1..].iter().zip(ops) {
                    let next = self.eval(operand)?;
                    let supported = if op.is_equality() {
                        prev.dtype().binary_eq(&next.dtype())
                    } else {
                        prev.dtype().binary_ordering(&next.dtype())
                    };
                    if !supported {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "Operator \"{}\" is not applicable to: \"{}\", \"{}\"",
                                    op.symbol(),
                                    prev.dtype(),
                                    next.dtype()
                                ),
                            ),
                            prev_span.cover(operand.span),
                        );
                        return None;
                    }
                    if !rel_holds(*op, prev.compare(&next)) {
                        return Some(Value::Bool(false));
                    }
                    prev = next;
                    prev_span = operand.span;
                }
                Some(Value::Bool(true))
            }
            ExprKind::Sum { terms, ops } => {
                let mut acc = self.eval(&terms[0])?;
                let mut loc = terms[0].span;
                for (term, op) in terms[1..].iter().zip(ops) {
                    let next = self.eval(term)?;
                    let result = match op {
                        SumOp::Plus => acc.binary_plus(&next),
                        SumOp::Minus => acc.binary_minus(&next),
                    };
                    let symbol = match op {
                        SumOp::Plus => "+",
                        SumOp::Minus => "-",
                    };
                    acc = self.finish_binary(result, symbol, &acc, &next, loc, term.span)?;
                    loc = loc.cover(term.span);
                }
                Some(acc)
            }
            ExprKind::Term { factors, ops } => {
                let mut acc = self.eval(&factors[0])?;
                let mut loc = factors[0].span;
                for (factor, op) in factors[1..].iter().zip(ops) {
                    let next = self.eval(factor)?;
                    let result = match op {
                        TermOp::Times => acc.binary_mul(&next),
                        TermOp::Divide => acc.binary_div(&next),
                    };
                    let symbol = match op {
                        TermOp::Times => "*",
                        TermOp::Divide => "/",
                    };
                    acc = self.finish_binary(result, symbol, &acc, &next, loc, factor.span)?;
                    loc = loc.cover(factor.span);
                }
                Some(acc)
            }
            ExprKind::Unary { prefix, expr: inner, postfix } => {
                let value = self.eval(inner)?;
                let mut chain = ExecChain::new(value, inner.span);
                let npre = prefix.len();
                let npost = postfix.len();
                let (mut ipre, mut ipost) = (0usize, 0usize);
                while ipre < npre || ipost < npost {
                    let do_postfix = ipre == npre || (ipost < npost && postfix[ipost].tightness() <= 2);
                    if do_postfix {
                        self.chain_postfix(&mut chain, &postfix[ipost])?;
                        ipost += 1;
                    } else {
                        let op = &prefix[npre - ipre - 1];
                        let result = match op.kind {
                            PrefixKind::Plus => chain.cur.unary_plus(),
                            PrefixKind::Minus => chain.cur.unary_minus(),
                        };
                        let symbol = match op.kind {
                            PrefixKind::Plus => "unary+",
                            PrefixKind::Minus => "unary-",
                        };
                        match result {
                            OpResult::Ok(result) => chain.cur = result,
                            OpResult::Err(error) => {
                                self.ctx.throw(error, chain.loc);
                                return None;
                            }
                            OpResult::Unsupported => {
                                self.ctx.throw(
                                    RuntimeError::new(
                                        ErrorKind::TypeMismatch,
                                        format!(
                                            "Operator \"{symbol}\" is not applicable to \"{}\"",
                                            chain.cur.dtype()
                                        ),
                                    ),
                                    chain.loc,
                                );
                                return None;
                            }
                        }
                        chain.loc = chain.loc.cover(op.span);
                        ipre += 1;
                    }
                }
                Some(chain.cur)
            }
            ExprKind::ArrayLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Some(Value::array(values))
            }
            ExprKind::TupleLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval(&element.value)?;
                    values.push((element.name.as_ref().map(|n| n.name.clone()), value));
                }
                Some(Value::tuple(values))
            }
            ExprKind::FuncLit { .. } => {
                panic!("func literals are rewritten into closure definitions before execution")
            }
        }
    }

    fn finish_binary(
        &mut self,
        result: OpResult,
        symbol: &str,
        left: &Value,
        right: &Value,
        left_span: Span,
        right_span: Span,
    ) -> Option<Value> {
        match result {
            OpResult::Ok(value) => Some(value),
            OpResult::Err(error) => {
                self.ctx.throw(error, left_span.cover(right_span));
                None
            }
            OpResult::Unsupported => {
                self.ctx.throw(
                    RuntimeError::new(
                        ErrorKind::TypeMismatch,
                        format!(
                            "Operator \"{symbol}\" is not applicable to: \"{}\", \"{}\"",
                            left.dtype(),
                            right.dtype()
                        ),
                    ),
                    left_span.cover(right_span),
                );
                None
            }
        }
    }

    fn eval_logical_operand(&mut self, operand: &Expr, op_name: &str) -> Option<bool> {
        let value = self.eval(operand)?;
        match value {
            Value::Bool(b) => Some(b),
            other => {
                self.ctx.throw(
                    RuntimeError::new(
                        ErrorKind::TypeMismatch,
                        format!("Operator \"{op_name}\" is not applicable to \"{}\"", other.dtype()),
                    ),
                    operand.span,
                );
                None
            }
        }
    }

    fn eval_and_or(&mut self, operands: &[Expr], is_or: bool) -> Option<Value> {
        let op_name = if is_or { "or" } else { "and" };
        for operand in operands {
            let b = self.eval_logical_operand(operand, op_name)?;
            if b == is_or {
                // Decisive operand: the tail never evaluates.
                return Some(Value::Bool(is_or));
            }
        }
        Some(Value::Bool(!is_or))
    }

    pub(crate) fn eval_bool(&mut self, expr: &Expr, what: &str) -> Option<bool> {
        let value = self.eval(expr)?;
        match value {
            Value::Bool(b) => Some(b),
            other => {
                self.ctx.throw(
                    RuntimeError::new(
                        ErrorKind::TypeMismatch,
                        format!(
                            "The {what} condition must be a boolean value, but \"{}\" was provided",
                            other.dtype()
                        ),
                    ),
                    expr.span,
                );
                None
            }
        }
    }

    pub(crate) fn chain_postfix(&mut self, chain: &mut ExecChain, postfix: &Postfix) -> Option<()> {
        match &postfix.kind {
            PostfixKind::Call(args) => self.chain_call(chain, postfix.span, args),
            PostfixKind::Access(accessor) => self.chain_accessor(chain, accessor),
            PostfixKind::IsType(type_id) => {
                chain.cur = Value::Bool(chain.cur.dtype().type_eq(&type_id_to_dtype(*type_id)));
                chain.loc = chain.loc.cover(postfix.span);
                Some(())
            }
        }
    }

    pub(crate) fn chain_accessor(&mut self, chain: &mut ExecChain, accessor: &Accessor) -> Option<()> {
        let span = accessor.span;
        let result = match &accessor.kind {
            AccessorKind::Name(name) => match chain.cur.field(name) {
                OpResult::Ok(value) => value,
                OpResult::Err(error) => {
                    self.ctx.throw(error, span);
                    return None;
                }
                OpResult::Unsupported => {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::NoSuchField,
                            format!("The object of type \"{}\" has no field \"{name}\"", chain.cur.dtype()),
                        ),
                        span,
                    );
                    return None;
                }
            },
            AccessorKind::IntMember(index) => {
                self.field_by_index(chain, &Value::Int(index.clone()), span)?
            }
            AccessorKind::ParenMember(index_expr) => {
                let index = self.eval(index_expr)?;
                self.field_by_index(chain, &index, span)?
            }
            AccessorKind::Subscript(index_expr) => {
                let index = self.eval(index_expr)?;
                match chain.cur.subscript(&index) {
                    OpResult::Ok(value) => value,
                    OpResult::Err(error) => {
                        self.ctx.throw(error, span);
                        return None;
                    }
                    OpResult::Unsupported => {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "The object of type \"{}\" does not support subscript \"{}\"",
                                    chain.cur.dtype(),
                                    index.dtype()
                                ),
                            ),
                            span,
                        );
                        return None;
                    }
                }
            }
        };
        chain.cur = result;
        chain.loc = chain.loc.cover(span);
        Some(())
    }

    fn field_by_index(&mut self, chain: &ExecChain, index: &Value, span: Span) -> Option<Value> {
        match chain.cur.field_by_index(index) {
            OpResult::Ok(value) => Some(value),
            OpResult::Err(error) => {
                self.ctx.throw(error, span);
                None
            }
            OpResult::Unsupported => {
                self.ctx.throw(
                    RuntimeError::new(
                        ErrorKind::NoSuchField,
                        format!(
                            "The object of type \"{}\" has no indexed field \"{}\"",
                            chain.cur.dtype(),
                            index.render()
                        ),
                    ),
                    span,
                );
                None
            }
        }
    }

    fn chain_call(&mut self, chain: &mut ExecChain, span: Span, args: &[Expr]) -> Option<()> {
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        let call_span = chain.loc.cover(span);
        let result = match &chain.cur {
            Value::Closure(closure) => {
                let closure = Rc::clone(closure);
                self.call_closure(&closure, arg_values, call_span)?
            }
            Value::Builtin(Builtin::Input) => {
                if !arg_values.is_empty() {
                    self.ctx.throw(
                        RuntimeError::new(ErrorKind::WrongArguments, "The input function accepts no arguments"),
                        call_span,
                    );
                    return None;
                }
                let line = self.ctx.input.read_line().unwrap_or_default();
                Value::str(line)
            }
            Value::Builtin(builtin) => match builtin.call(&arg_values) {
                OpResult::Ok(value) => value,
                OpResult::Err(error) => {
                    self.ctx.throw(error, call_span);
                    return None;
                }
                OpResult::Unsupported => {
                    self.ctx.throw(
                        RuntimeError::new(ErrorKind::NotCallable, "This built-in cannot be called this way"),
                        call_span,
                    );
                    return None;
                }
            },
            other => {
                self.ctx.throw(
                    RuntimeError::new(
                        ErrorKind::NotCallable,
                        format!("Tried to call a value of type \"{}\", which is not a function", other.dtype()),
                    ),
                    call_span,
                );
                return None;
            }
        };
        chain.cur = result;
        chain.loc = call_span;
        Some(())
    }
}
