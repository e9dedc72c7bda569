//! The accessor-chain checker.
//!
//! Applies a single accessor, call, prefix sign or typecheck step to a
//! "current" value-or-type at a "current" span, so that a chained reference
//! like `obj.a.b[i].c(x)` can be analyzed left-to-right while carrying over
//! partial knowledge. Each step reports its own purity; a call to an impure
//! (or unknown) callee additionally degrades the whole timeline, because the
//! call could have mutated any observable state.

use std::rc::Rc;

use super::{Analyzer, diag};
use crate::ast::{Accessor, AccessorKind, Postfix, PostfixKind, PrefixKind, PrefixOp, TypeId};
use crate::source::Span;
use crate::timeline::TypeOrValue;
use crate::types::{DType, FuncType};
use crate::value::{OpResult, Value};

/// The partial knowledge carried along an accessor chain.
pub(crate) struct ChainState {
    pub cur: TypeOrValue,
    /// Span of everything applied so far; error messages anchor here.
    pub loc: Span,
}

impl ChainState {
    pub fn new(cur: TypeOrValue, loc: Span) -> Self {
        Self { cur, loc }
    }
}

impl DType {
    fn from_type_id(type_id: TypeId) -> Self {
        match type_id {
            TypeId::Int => Self::Int,
            TypeId::Real => Self::Real,
            TypeId::Str => Self::Str,
            TypeId::Bool => Self::Bool,
            TypeId::None => Self::None,
            TypeId::Func => Self::Func(Rc::new(FuncType::opaque())),
            TypeId::Array => Self::Array,
            TypeId::Tuple => Self::Tuple,
        }
    }
}

impl Analyzer<'_> {
    /// Applies one postfix step; returns the step's purity, or `None` after
    /// logging an error.
    pub(crate) fn apply_postfix(&mut self, state: &mut ChainState, postfix: &mut Postfix) -> Option<bool> {
        let span = postfix.span;
        match &mut postfix.kind {
            PostfixKind::Call(args) => self.apply_call(state, span, args),
            PostfixKind::Access(accessor) => self.apply_accessor(state, accessor),
            PostfixKind::IsType(type_id) => self.apply_typecheck(state, span, *type_id),
        }
    }

    pub(crate) fn apply_accessor(&mut self, state: &mut ChainState, accessor: &mut Accessor) -> Option<bool> {
        let span = accessor.span;
        match &mut accessor.kind {
            AccessorKind::Name(name) => {
                let name = name.clone();
                let step = match &state.cur {
                    TypeOrValue::Value(value) => match value.field(&name) {
                        OpResult::Ok(result) => Some(TypeOrValue::Value(result)),
                        OpResult::Err(error) => {
                            self.log.log(diag::evaluation_exception(span, &error));
                            None
                        }
                        OpResult::Unsupported => {
                            self.log.log(diag::no_such_field(span, &value.dtype(), &name));
                            None
                        }
                    },
                    TypeOrValue::Type(ty) => match ty.field(&name) {
                        Some(result) => Some(TypeOrValue::Type(result)),
                        None => {
                            self.log.log(diag::no_such_field(span, ty, &name));
                            None
                        }
                    },
                };
                state.cur = step?;
                state.loc = state.loc.cover(span);
                Some(true)
            }
            AccessorKind::IntMember(index) => {
                let index_value = Value::Int(index.clone());
                let step = match &state.cur {
                    TypeOrValue::Value(value) => match value.field_by_index(&index_value) {
                        OpResult::Ok(result) => Some(TypeOrValue::Value(result)),
                        OpResult::Err(error) => {
                            self.log.log(diag::evaluation_exception(span, &error));
                            None
                        }
                        OpResult::Unsupported => {
                            self.log
                                .log(diag::no_such_field(span, &value.dtype(), &index.to_string()));
                            None
                        }
                    },
                    TypeOrValue::Type(ty) => match ty.field_by_index(&DType::Int) {
                        Some(result) => Some(TypeOrValue::Type(result)),
                        None => {
                            self.log.log(diag::no_such_field(span, ty, &index.to_string()));
                            None
                        }
                    },
                };
                state.cur = step?;
                state.loc = state.loc.cover(span);
                Some(true)
            }
            AccessorKind::ParenMember(index_expr) => {
                let info = self.check_expr(index_expr)?;
                let step_pure = info.pure;
                let pair = match (&state.cur, &info.result) {
                    (TypeOrValue::Value(v), TypeOrValue::Value(i)) => Some((v.clone(), i.clone())),
                    _ => None,
                };
                if let Some((value, index)) = pair {
                    match value.field_by_index(&index) {
                        OpResult::Ok(result) => {
                            state.cur = TypeOrValue::Value(result);
                            state.loc = state.loc.cover(span);
                            return Some(step_pure);
                        }
                        OpResult::Err(error) => {
                            self.log.log(diag::evaluation_exception(span, &error));
                            return None;
                        }
                        OpResult::Unsupported => {
                            if index.dtype().type_eq(&DType::Int) {
                                self.log
                                    .log(diag::no_such_field(span, &value.dtype(), &index.render()));
                            } else {
                                self.log.log(diag::operator_not_applicable(
                                    ".",
                                    &[(state.loc, value.dtype()), (span, index.dtype())],
                                ));
                            }
                            return None;
                        }
                    }
                }
                let ty = state.cur.dtype();
                let index_type = info.result.dtype();
                match ty.field_by_index(&index_type) {
                    Some(result) => {
                        state.cur = TypeOrValue::Type(result);
                        state.loc = state.loc.cover(span);
                        Some(step_pure)
                    }
                    None => {
                        self.log
                            .log(diag::operator_not_applicable(".", &[(state.loc, ty), (span, index_type)]));
                        None
                    }
                }
            }
            AccessorKind::Subscript(index_expr) => {
                let info = self.check_expr(index_expr)?;
                let step_pure = info.pure;
                let pair = match (&state.cur, &info.result) {
                    (TypeOrValue::Value(v), TypeOrValue::Value(i)) => Some((v.clone(), i.clone())),
                    _ => None,
                };
                if let Some((value, index)) = pair {
                    match value.subscript(&index) {
                        OpResult::Ok(result) => {
                            state.cur = TypeOrValue::Value(result);
                            state.loc = state.loc.cover(span);
                            return Some(step_pure);
                        }
                        OpResult::Err(error) => {
                            self.log.log(diag::evaluation_exception(span, &error));
                            return None;
                        }
                        OpResult::Unsupported => {
                            self.log.log(diag::operator_not_applicable(
                                "[subscript]",
                                &[(state.loc, value.dtype()), (span, index.dtype())],
                            ));
                            return None;
                        }
                    }
                }
                let ty = state.cur.dtype();
                let index_type = info.result.dtype();
                match ty.subscript(&index_type) {
                    Some(result) => {
                        state.cur = TypeOrValue::Type(result);
                        state.loc = state.loc.cover(span);
                        Some(step_pure)
                    }
                    None => {
                        self.log.log(diag::operator_not_applicable(
                            "[subscript]",
                            &[(state.loc, ty), (span, index_type)],
                        ));
                        None
                    }
                }
            }
        }
    }

    /// A call step. A known pure callee with known pure arguments is invoked
    /// right here and the result folded in; otherwise the arity and argument
    /// types are checked against the signature, and an impure or unknown
    /// callee degrades every binding in the timeline.
    fn apply_call(&mut self, state: &mut ChainState, span: Span, args: &mut [crate::ast::Expr]) -> Option<bool> {
        let mut step_pure = !state.cur.is_unknown();
        let mut infos = Vec::with_capacity(args.len());
        let mut errored = false;
        for arg in args.iter_mut() {
            match self.check_expr(arg) {
                Some(info) => {
                    step_pure = step_pure && info.pure && !info.result.is_unknown();
                    infos.push(info);
                }
                None => errored = true,
            }
        }
        if errored {
            return None;
        }
        let all_known = infos.iter().all(|i| i.result.as_value().is_some());

        if let Some(callee) = state.cur.as_value().cloned()
            && all_known
            && step_pure
        {
            let callee_type = callee.dtype();
            let DType::Func(func_type) = &callee_type else {
                self.log.log(diag::tried_to_call_non_function(state.loc, &callee_type));
                return None;
            };
            if func_type.pure {
                let arg_values: Vec<Value> = infos
                    .iter()
                    .map(|i| i.result.as_value().expect("known").clone())
                    .collect();
                let Value::Builtin(builtin) = &callee else {
                    unreachable!("only built-ins exist as pure function values at analysis time")
                };
                match builtin.call(&arg_values) {
                    OpResult::Ok(result) => {
                        state.cur = TypeOrValue::Value(result);
                        state.loc = state.loc.cover(span);
                        return Some(true);
                    }
                    OpResult::Err(error) => {
                        self.log.log(diag::evaluation_exception(span, &error));
                        return None;
                    }
                    OpResult::Unsupported => {
                        self.log
                            .log(diag::operator_not_applicable("(call)", &[(state.loc, callee_type.clone())]));
                        return None;
                    }
                }
            }
        }

        let callee_type = state.cur.dtype();
        if callee_type.is_unknown() {
            state.cur = TypeOrValue::unknown();
            state.loc = state.loc.cover(span);
            self.timeline.make_all_unknown();
            return Some(false);
        }
        let DType::Func(func_type) = &callee_type else {
            self.log.log(diag::tried_to_call_non_function(state.loc, &callee_type));
            return None;
        };
        step_pure = step_pure && func_type.pure;
        if let Some(needed) = &func_type.params {
            if needed.len() != args.len() {
                self.log.log(diag::wrong_argument_count(span, needed.len(), args.len()));
                return None;
            }
            let mut bad = false;
            for ((need, info), arg) in needed.iter().zip(&infos).zip(args.iter()) {
                if need.is_unknown() {
                    continue;
                }
                let given = info.result.dtype();
                if given.is_unknown() || need.type_eq(&given) {
                    continue;
                }
                self.log.log(diag::wrong_argument_type(arg.span, need, &given));
                bad = true;
            }
            if bad {
                return None;
            }
        }
        state.cur = TypeOrValue::Type(func_type.ret.clone());
        state.loc = state.loc.cover(span);
        if !func_type.pure {
            self.timeline.make_all_unknown();
        }
        Some(step_pure)
    }

    pub(crate) fn apply_prefix_op(&mut self, state: &mut ChainState, op: &PrefixOp) -> Option<bool> {
        let op_name = match op.kind {
            PrefixKind::Plus => "unary+",
            PrefixKind::Minus => "unary-",
        };
        let step = match &state.cur {
            TypeOrValue::Value(value) => {
                let result = match op.kind {
                    PrefixKind::Plus => value.unary_plus(),
                    PrefixKind::Minus => value.unary_minus(),
                };
                match result {
                    OpResult::Ok(result) => Some(TypeOrValue::Value(result)),
                    OpResult::Err(error) => {
                        self.log.log(diag::evaluation_exception(state.loc, &error));
                        None
                    }
                    OpResult::Unsupported => {
                        self.log
                            .log(diag::operator_not_applicable(op_name, &[(state.loc, value.dtype())]));
                        None
                    }
                }
            }
            TypeOrValue::Type(ty) => {
                let result = match op.kind {
                    PrefixKind::Plus => ty.unary_plus(),
                    PrefixKind::Minus => ty.unary_minus(),
                };
                match result {
                    Some(result) => Some(TypeOrValue::Type(result)),
                    None => {
                        self.log
                            .log(diag::operator_not_applicable(op_name, &[(state.loc, ty.clone())]));
                        None
                    }
                }
            }
        };
        state.cur = step?;
        state.loc = state.loc.cover(op.span);
        Some(true)
    }

    /// `value is type`: decided statically whenever the type is known.
    fn apply_typecheck(&mut self, state: &mut ChainState, span: Span, type_id: TypeId) -> Option<bool> {
        let ty = state.cur.dtype();
        state.cur = if ty.is_unknown() {
            TypeOrValue::Type(DType::Bool)
        } else {
            TypeOrValue::Value(Value::Bool(ty.type_eq(&DType::from_type_id(type_id))))
        };
        state.loc = state.loc.cover(span);
        Some(true)
    }
}
