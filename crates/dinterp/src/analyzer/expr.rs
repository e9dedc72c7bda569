//! The expression checker: folds what it can, rewrites the tree in place.
//!
//! Every visit returns what is known about the expression (a value or a
//! type) together with its purity, or `None` after logging an error. A
//! fully-known pure sub-expression whose type is immutable is replaced with
//! a literal node; `func` literals are replaced with closure definitions.

use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;
use num_traits::Zero;

use super::{Analyzer, ChainState, ExprInfo, Termination, diag};
use crate::ast::{Body, ClosureDef, Expr, ExprKind, FuncBody, Stmt, StmtKind, SumOp, TermOp};
use crate::source::Span;
use crate::timeline::{Timeline, TypeOrValue};
use crate::types::{DType, FuncType};
use crate::value::{CmpOutcome, OpResult, Value, rel_holds};

/// How tightly prefix signs bind, between accessors (1) and `is` (3).
pub(super) const PREFIX_TIGHTNESS: u8 = 2;

fn known_pure(info: &ExprInfo) -> bool {
    info.pure && info.result.as_value().is_some()
}

impl Analyzer<'_> {
    pub(crate) fn check_expr(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        match &expr.kind {
            ExprKind::Literal(value) => Some(ExprInfo {
                result: TypeOrValue::Value(value.clone()),
                pure: true,
            }),
            ExprKind::Closure(def) => Some(ExprInfo {
                result: TypeOrValue::Type(DType::Func(Rc::clone(&def.func_type))),
                pure: true,
            }),
            ExprKind::Name(_) => self.check_name(expr),
            ExprKind::Not(_) => self.check_not(expr),
            ExprKind::And(_) => self.check_and_or(expr, false),
            ExprKind::Or(_) => self.check_and_or(expr, true),
            ExprKind::Xor(_) => self.check_xor(expr),
            ExprKind::Relation { .. } => self.check_relation(expr),
            ExprKind::Sum { .. } => self.check_sum(expr),
            ExprKind::Term { .. } => self.check_term(expr),
            ExprKind::Unary { .. } => self.check_unary(expr),
            ExprKind::ArrayLit(_) => self.check_array_lit(expr),
            ExprKind::TupleLit(_) => self.check_tuple_lit(expr),
            ExprKind::FuncLit { .. } => self.check_func_lit(expr),
        }
    }

    fn check_name(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Name(ident) = &expr.kind else {
            unreachable!()
        };
        let name = ident.name.clone();
        let Some(content) = self.timeline.lookup(&name) else {
            self.log.log(diag::variable_not_defined(span, &name));
            return None;
        };
        if content.dtype().type_eq(&DType::None) {
            self.log.log(diag::none_value_accessed(span, &name));
        }
        if let Some(value) = content.as_value()
            && !value.dtype().mutable()
        {
            *expr = Expr::literal(span, value.clone());
        }
        Some(ExprInfo {
            result: content,
            pure: true,
        })
    }

    fn check_not(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Not(inner) = &mut expr.kind else {
            unreachable!()
        };
        let inner_span = inner.span;
        let info = self.check_expr(inner)?;
        let pure = info.pure && !info.result.is_unknown();
        match info.result {
            TypeOrValue::Value(value) => match value.unary_not() {
                OpResult::Ok(negated) => {
                    if pure {
                        *expr = Expr::literal(span, negated.clone());
                    }
                    Some(ExprInfo {
                        result: TypeOrValue::Value(negated),
                        pure,
                    })
                }
                OpResult::Err(error) => {
                    self.log.log(diag::evaluation_exception(span, &error));
                    None
                }
                OpResult::Unsupported => {
                    self.log
                        .log(diag::operator_not_applicable("not", &[(inner_span, value.dtype())]));
                    None
                }
            },
            TypeOrValue::Type(ty) => match ty.unary_not() {
                Some(result) => Some(ExprInfo {
                    result: TypeOrValue::Type(result),
                    pure,
                }),
                None => {
                    self.log
                        .log(diag::operator_not_applicable("not", &[(inner_span, ty)]));
                    None
                }
            },
        }
    }

    /// Short-circuit folding for `and`/`or` chains.
    ///
    /// Operands are checked left-to-right, each against the timeline as it
    /// would be if all the ones before it ran. Known skippable operands
    /// (`true` in `or`, `false` in `and`) are cut from a pure prefix; a
    /// known decisive operand cuts the tail as unreachable. A fully known
    /// pure chain collapses into a literal.
    fn check_and_or(&mut self, expr: &mut Expr, is_or: bool) -> Option<ExprInfo> {
        let span = expr.span;
        let operands_ref = match &mut expr.kind {
            ExprKind::Or(v) | ExprKind::And(v) => v,
            _ => unreachable!(),
        };
        let mut operands = mem::take(operands_ref);
        let rebuild = |operands: Vec<Expr>| {
            if is_or {
                ExprKind::Or(operands)
            } else {
                ExprKind::And(operands)
            }
        };
        let op_name = if is_or { "or" } else { "and" };
        // The operand value that leaves the chain undecided.
        let skip_value = !is_or;
        let n = operands.len();

        let mut tls: Vec<Timeline> = Vec::with_capacity(n);
        let mut maybe_infos: Vec<Option<ExprInfo>> = Vec::with_capacity(n);
        let mut errored = false;
        for operand in &mut operands {
            let mut tl = tls.last().cloned().unwrap_or_else(|| self.timeline.clone());
            mem::swap(&mut self.timeline, &mut tl);
            let info = self.check_expr(operand);
            mem::swap(&mut self.timeline, &mut tl);
            tls.push(tl);
            errored = errored || info.is_none();
            maybe_infos.push(info);
        }
        if errored {
            expr.kind = rebuild(operands);
            return None;
        }
        let infos: Vec<ExprInfo> = maybe_infos.into_iter().map(|i| i.expect("no errors")).collect();

        let mut cur = infos[0].result.clone();
        let mut chain_pure = infos[0].pure && !infos[0].result.is_unknown();
        let mut loc = operands[0].span;
        let mut cut_first = 0usize;

        if let Some(first) = cur.as_value().cloned() {
            let Value::Bool(b) = first else {
                let bad = [(loc, first.dtype())];
                expr.kind = rebuild(operands);
                self.log.log(diag::operator_not_applicable(op_name, &bad));
                return None;
            };
            if b == skip_value {
                if chain_pure {
                    cut_first = 1;
                }
            } else {
                self.timeline = tls[0].clone();
                if n > 1 {
                    let tail = operands[1].span.cover(operands[n - 1].span);
                    self.log.log(diag::code_unreachable(tail, true));
                }
                if chain_pure {
                    *expr = Expr::literal(span, Value::Bool(b));
                } else {
                    operands.truncate(1);
                    expr.kind = rebuild(operands);
                }
                return Some(ExprInfo {
                    result: TypeOrValue::Value(Value::Bool(b)),
                    pure: chain_pure,
                });
            }
        }

        for i in 1..n {
            let new_loc = operands[i].span;
            chain_pure = chain_pure && infos[i].pure && !infos[i].result.is_unknown();
            let pair = match (&cur, &infos[i].result) {
                (TypeOrValue::Value(a), TypeOrValue::Value(b)) => Some((a.clone(), b.clone())),
                _ => None,
            };
            if let Some((a, b)) = pair {
                let outcome = if is_or { a.binary_or(&b) } else { a.binary_and(&b) };
                match outcome {
                    OpResult::Unsupported => {
                        let bad = [(loc, a.dtype()), (new_loc, b.dtype())];
                        expr.kind = rebuild(operands);
                        self.log.log(diag::operator_not_applicable(op_name, &bad));
                        return None;
                    }
                    OpResult::Err(error) => {
                        let merged = loc.cover(new_loc);
                        expr.kind = rebuild(operands);
                        self.log.log(diag::evaluation_exception(merged, &error));
                        return None;
                    }
                    OpResult::Ok(value) => {
                        loc = loc.cover(new_loc);
                        let Value::Bool(b) = value else {
                            unreachable!("boolean algebra yields booleans")
                        };
                        cur = TypeOrValue::Value(Value::Bool(b));
                        if b == skip_value {
                            if chain_pure {
                                cut_first = i + 1;
                            }
                        } else {
                            self.timeline = tls[i].clone();
                            if i + 1 < n {
                                let tail = operands[i + 1].span.cover(operands[n - 1].span);
                                self.log.log(diag::code_unreachable(tail, true));
                            }
                            if chain_pure {
                                *expr = Expr::literal(span, Value::Bool(b));
                            } else {
                                operands.truncate(i + 1);
                                expr.kind = rebuild(operands);
                            }
                            return Some(ExprInfo {
                                result: TypeOrValue::Value(Value::Bool(b)),
                                pure: chain_pure,
                            });
                        }
                    }
                }
                continue;
            }
            let ta = cur.dtype();
            let tb = infos[i].result.dtype();
            match ta.binary_logical(&tb) {
                None => {
                    let bad = [(loc, ta), (new_loc, tb)];
                    expr.kind = rebuild(operands);
                    self.log.log(diag::operator_not_applicable(op_name, &bad));
                    return None;
                }
                Some(ty) => {
                    cur = TypeOrValue::Type(ty);
                    loc = loc.cover(new_loc);
                }
            }
        }

        self.timeline = tls.pop().expect("one timeline per operand");
        operands.drain(..cut_first);
        if operands.is_empty() {
            let value = Value::Bool(skip_value);
            *expr = Expr::literal(span, value.clone());
            return Some(ExprInfo {
                result: TypeOrValue::Value(value),
                pure: true,
            });
        }
        if chain_pure && let Some(value) = cur.as_value().cloned() {
            *expr = Expr::literal(span, value);
        } else {
            expr.kind = rebuild(operands);
        }
        Some(ExprInfo {
            result: cur,
            pure: chain_pure,
        })
    }

    /// `xor` never short-circuits: every operand is always evaluated. Pure
    /// known operands are compacted into one leading literal; every operand
    /// must be boolean or unknown.
    fn check_xor(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Xor(operands_ref) = &mut expr.kind else {
            unreachable!()
        };
        let mut operands = mem::take(operands_ref);
        let mut infos: Vec<ExprInfo> = Vec::with_capacity(operands.len());
        let mut errored = false;
        for operand in &mut operands {
            match self.check_expr(operand) {
                Some(info) => infos.push(info),
                None => errored = true,
            }
        }
        if errored {
            expr.kind = ExprKind::Xor(operands);
            return None;
        }
        let pure = infos.iter().all(|i| i.pure && !i.result.is_unknown());
        let known_count = infos.iter().filter(|i| i.result.as_value().is_some()).count();

        if pure && known_count >= 2 {
            let mut acc: Option<Value> = None;
            let mut folded_positions: Vec<(Span, DType)> = Vec::with_capacity(known_count);
            for i in 0..operands.len() {
                let Some(value) = infos[i].result.as_value().cloned() else {
                    continue;
                };
                folded_positions.push((operands[i].span, value.dtype()));
                acc = Some(match acc {
                    None => value,
                    Some(a) => match a.binary_xor(&value) {
                        OpResult::Ok(result) => result,
                        OpResult::Unsupported => {
                            expr.kind = ExprKind::Xor(operands);
                            self.log.log(diag::operator_not_applicable("xor", &folded_positions));
                            return None;
                        }
                        OpResult::Err(error) => {
                            expr.kind = ExprKind::Xor(operands);
                            self.log.log(diag::evaluation_exception(span, &error));
                            return None;
                        }
                    },
                });
            }
            let folded = acc.expect("two or more known operands");
            let folded_span = folded_positions.last().expect("non-empty").0;
            let mut new_operands = vec![Expr::literal(folded_span, folded.clone())];
            let mut new_infos = vec![ExprInfo {
                result: TypeOrValue::Value(folded),
                pure: true,
            }];
            for (operand, info) in operands.into_iter().zip(infos) {
                if info.result.as_value().is_some() {
                    continue;
                }
                new_operands.push(operand);
                new_infos.push(info);
            }
            operands = new_operands;
            infos = new_infos;
        }

        let bad: Vec<(Span, DType)> = operands
            .iter()
            .zip(&infos)
            .filter_map(|(operand, info)| {
                let ty = info.result.dtype();
                (!ty.type_eq(&DType::Bool) && !ty.is_unknown()).then_some((operand.span, ty))
            })
            .collect();
        if !bad.is_empty() {
            expr.kind = ExprKind::Xor(operands);
            self.log.log(diag::operator_not_applicable("xor", &bad));
            return None;
        }
        if operands.len() == 1 {
            let single = operands.pop().expect("one operand");
            let info = infos.pop().expect("one info");
            *expr = single;
            return Some(ExprInfo {
                result: info.result,
                pure,
            });
        }
        expr.kind = ExprKind::Xor(operands);
        Some(ExprInfo {
            result: TypeOrValue::Type(DType::Bool),
            pure,
        })
    }

    /// A comparison chain is the AND of its pairwise comparisons. Leading
    /// pairs that are statically true are peeled off; a statically false
    /// pair collapses the whole chain to `false`.
    fn check_relation(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Relation { operands: op_ref, ops: ops_ref } = &mut expr.kind else {
            unreachable!()
        };
        let mut operands = mem::take(op_ref);
        let mut ops = mem::take(ops_ref);
        let mut infos: Vec<ExprInfo> = Vec::with_capacity(operands.len());
        let mut errored = false;
        for operand in &mut operands {
            match self.check_expr(operand) {
                Some(info) => infos.push(info),
                None => errored = true,
            }
        }
        if errored {
            expr.kind = ExprKind::Relation { operands, ops };
            return None;
        }
        let chain_pure = infos.iter().all(|i| i.pure && !i.result.is_unknown());

        // Every pair must support its comparison at the type level.
        let mut type_bad = false;
        for i in 1..operands.len() {
            let a = infos[i - 1].result.dtype();
            let b = infos[i].result.dtype();
            let supported = if ops[i - 1].is_equality() {
                a.binary_eq(&b)
            } else {
                a.binary_ordering(&b)
            };
            if !supported {
                self.log.log(diag::operator_not_applicable(
                    ops[i - 1].symbol(),
                    &[(operands[i - 1].span, a), (operands[i].span, b)],
                ));
                type_bad = true;
            }
        }
        if type_bad {
            expr.kind = ExprKind::Relation { operands, ops };
            return None;
        }

        loop {
            let n = operands.len();
            if n <= 1 {
                break;
            }
            let pair = match (&infos[0].result, &infos[1].result) {
                (TypeOrValue::Value(a), TypeOrValue::Value(b)) => Some((a.clone(), b.clone())),
                _ => None,
            };
            let Some((a, b)) = pair else { break };
            if !(infos[0].pure && (infos[1].pure || n > 2)) {
                break;
            }
            let cmp = a.compare(&b);
            if cmp == CmpOutcome::Unsupported {
                let bad = [(operands[0].span, a.dtype()), (operands[1].span, b.dtype())];
                let symbol = ops[0].symbol();
                expr.kind = ExprKind::Relation { operands, ops };
                self.log.log(diag::operator_not_applicable(symbol, &bad));
                return None;
            }
            if rel_holds(ops[0], cmp) {
                operands.remove(0);
                infos.remove(0);
                ops.remove(0);
                continue;
            }
            if !chain_pure {
                break;
            }
            if n > 2 {
                let tail = operands[2].span.cover(operands[n - 1].span);
                self.log.log(diag::code_unreachable(tail, true));
            }
            *expr = Expr::literal(span, Value::Bool(false));
            return Some(ExprInfo {
                result: TypeOrValue::Value(Value::Bool(false)),
                pure: chain_pure,
            });
        }

        if operands.len() == 1 {
            *expr = Expr::literal(span, Value::Bool(true));
            return Some(ExprInfo {
                result: TypeOrValue::Value(Value::Bool(true)),
                pure: chain_pure,
            });
        }
        expr.kind = ExprKind::Relation { operands, ops };
        Some(ExprInfo {
            result: TypeOrValue::Type(DType::Bool),
            pure: chain_pure,
        })
    }

    /// Folds the known pure operands of a sum into one literal, preserving
    /// operator signs; on a non-numeric or partially known chain, merges
    /// adjacent known pure pairs instead.
    fn check_sum(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Sum { terms: t_ref, ops: o_ref } = &mut expr.kind else {
            unreachable!()
        };
        let mut terms = mem::take(t_ref);
        let mut ops = mem::take(o_ref);
        let mut infos: Vec<ExprInfo> = Vec::with_capacity(terms.len());
        let mut errored = false;
        for term in &mut terms {
            match self.check_expr(term) {
                Some(info) => infos.push(info),
                None => errored = true,
            }
        }
        if errored {
            expr.kind = ExprKind::Sum { terms, ops };
            return None;
        }
        let chain_pure = infos.iter().all(|i| i.pure && !i.result.is_unknown());
        let collectible: Vec<bool> = infos.iter().map(known_pure).collect();
        let collectible_count = collectible.iter().filter(|b| **b).count();
        let numeric = infos.iter().any(|i| {
            let ty = i.result.dtype();
            ty.type_eq(&DType::Int) || ty.type_eq(&DType::Real)
        });
        let sign_of = |i: usize, ops: &[SumOp]| if i == 0 { SumOp::Plus } else { ops[i - 1] };

        if collectible_count > 1 && numeric {
            let mut acc: Option<(Value, Span)> = None;
            for i in 0..terms.len() {
                if !collectible[i] {
                    continue;
                }
                let value = infos[i].result.as_value().expect("known").clone();
                let term_span = terms[i].span;
                let sign = sign_of(i, &ops);
                let next = match acc {
                    None => {
                        if sign == SumOp::Minus {
                            match value.unary_minus() {
                                OpResult::Ok(negated) => (negated, term_span),
                                OpResult::Err(error) => {
                                    expr.kind = ExprKind::Sum { terms, ops };
                                    self.log.log(diag::evaluation_exception(term_span, &error));
                                    return None;
                                }
                                OpResult::Unsupported => {
                                    let bad = [(term_span, value.dtype())];
                                    expr.kind = ExprKind::Sum { terms, ops };
                                    self.log.log(diag::operator_not_applicable("-", &bad));
                                    return None;
                                }
                            }
                        } else {
                            (value, term_span)
                        }
                    }
                    Some((a, a_span)) => {
                        let merged = a_span.cover(term_span);
                        let result = if sign == SumOp::Plus {
                            a.binary_plus(&value)
                        } else {
                            a.binary_minus(&value)
                        };
                        match result {
                            OpResult::Ok(r) => (r, merged),
                            OpResult::Err(error) => {
                                expr.kind = ExprKind::Sum { terms, ops };
                                self.log.log(diag::evaluation_exception(merged, &error));
                                return None;
                            }
                            OpResult::Unsupported => {
                                let symbol = if sign == SumOp::Plus { "+" } else { "-" };
                                let bad = [(a_span, a.dtype()), (term_span, value.dtype())];
                                expr.kind = ExprKind::Sum { terms, ops };
                                self.log.log(diag::operator_not_applicable(symbol, &bad));
                                return None;
                            }
                        }
                    }
                };
                acc = Some(next);
            }
            let (folded, folded_span) = acc.expect("at least two collected operands");
            let mut new_terms = vec![Expr::literal(folded_span, folded.clone())];
            let mut new_ops: Vec<SumOp> = Vec::new();
            let mut new_infos = vec![ExprInfo {
                result: TypeOrValue::Value(folded),
                pure: true,
            }];
            for (i, (term, info)) in terms.into_iter().zip(infos).enumerate() {
                if collectible[i] {
                    continue;
                }
                new_ops.push(sign_of(i, &ops));
                new_terms.push(term);
                new_infos.push(info);
            }
            terms = new_terms;
            ops = new_ops;
            infos = new_infos;
        } else {
            // Merge adjacent known pure pairs; the effective operator is
            // derived from the two signs so `x - 2 + 3` folds to `x - -1`.
            let mut i = 1;
            while i < terms.len() {
                if !(known_pure(&infos[i - 1]) && known_pure(&infos[i])) {
                    i += 1;
                    continue;
                }
                let left_sign = if i == 1 { SumOp::Plus } else { ops[i - 2] };
                let this_sign = ops[i - 1];
                let op = if left_sign == this_sign { SumOp::Plus } else { SumOp::Minus };
                let a = infos[i - 1].result.as_value().expect("known").clone();
                let b = infos[i].result.as_value().expect("known").clone();
                let merged_span = terms[i - 1].span.cover(terms[i].span);
                let result = if op == SumOp::Plus {
                    a.binary_plus(&b)
                } else {
                    a.binary_minus(&b)
                };
                match result {
                    OpResult::Ok(value) => {
                        terms[i - 1] = Expr::literal(merged_span, value.clone());
                        infos[i - 1] = ExprInfo {
                            result: TypeOrValue::Value(value),
                            pure: true,
                        };
                        terms.remove(i);
                        infos.remove(i);
                        ops.remove(i - 1);
                    }
                    OpResult::Err(error) => {
                        expr.kind = ExprKind::Sum { terms, ops };
                        self.log.log(diag::evaluation_exception(merged_span, &error));
                        return None;
                    }
                    OpResult::Unsupported => {
                        let symbol = if op == SumOp::Plus { "+" } else { "-" };
                        let bad = [(terms[i - 1].span, a.dtype()), (terms[i].span, b.dtype())];
                        expr.kind = ExprKind::Sum { terms, ops };
                        self.log.log(diag::operator_not_applicable(symbol, &bad));
                        return None;
                    }
                }
            }
        }

        if terms.len() == 1
            && chain_pure
            && let Some(value) = infos[0].result.as_value().cloned()
        {
            *expr = Expr::literal(span, value.clone());
            return Some(ExprInfo {
                result: TypeOrValue::Value(value),
                pure: chain_pure,
            });
        }

        let mut cur_type = infos[0].result.dtype();
        let mut cur_loc = terms[0].span;
        for i in 1..terms.len() {
            let b = infos[i].result.dtype();
            let result = if ops[i - 1] == SumOp::Plus {
                cur_type.binary_plus(&b)
            } else {
                cur_type.binary_minus(&b)
            };
            match result {
                None => {
                    let symbol = if ops[i - 1] == SumOp::Plus { "+" } else { "-" };
                    let bad = [(cur_loc, cur_type), (terms[i].span, b)];
                    expr.kind = ExprKind::Sum { terms, ops };
                    self.log.log(diag::operator_not_applicable(symbol, &bad));
                    return None;
                }
                Some(ty) => {
                    cur_loc = cur_loc.cover(terms[i].span);
                    cur_type = ty;
                }
            }
        }
        expr.kind = ExprKind::Sum { terms, ops };
        Some(ExprInfo {
            result: TypeOrValue::Type(cur_type),
            pure: chain_pure,
        })
    }

    /// Products fold only when every factor is a known pure value, because
    /// division makes reordering unsafe. Division by an integer or unknown
    /// divisor is never pure unless the divisor value is known: zero is
    /// possible.
    fn check_term(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::Term { factors: f_ref, ops: o_ref } = &mut expr.kind else {
            unreachable!()
        };
        let mut factors = mem::take(f_ref);
        let ops = mem::take(o_ref);
        let mut infos: Vec<ExprInfo> = Vec::with_capacity(factors.len());
        let mut errored = false;
        for factor in &mut factors {
            match self.check_expr(factor) {
                Some(info) => infos.push(info),
                None => errored = true,
            }
        }
        if errored {
            expr.kind = ExprKind::Term { factors, ops };
            return None;
        }
        let mut chain_pure = infos.iter().all(|i| i.pure && !i.result.is_unknown());
        let all_known = infos.iter().all(known_pure);

        if all_known {
            let mut acc = infos[0].result.as_value().expect("known").clone();
            let mut loc = factors[0].span;
            for i in 1..factors.len() {
                let b = infos[i].result.as_value().expect("known");
                let new_loc = factors[i].span;
                let result = match ops[i - 1] {
                    TermOp::Times => acc.binary_mul(b),
                    TermOp::Divide => acc.binary_div(b),
                };
                match result {
                    OpResult::Ok(value) => {
                        acc = value;
                        loc = loc.cover(new_loc);
                    }
                    OpResult::Err(error) => {
                        let merged = loc.cover(new_loc);
                        expr.kind = ExprKind::Term { factors, ops };
                        self.log.log(diag::evaluation_exception(merged, &error));
                        return None;
                    }
                    OpResult::Unsupported => {
                        let symbol = match ops[i - 1] {
                            TermOp::Times => "*",
                            TermOp::Divide => "/",
                        };
                        let bad = [(loc, acc.dtype()), (new_loc, b.dtype())];
                        expr.kind = ExprKind::Term { factors, ops };
                        self.log.log(diag::operator_not_applicable(symbol, &bad));
                        return None;
                    }
                }
            }
            *expr = Expr::literal(span, acc.clone());
            return Some(ExprInfo {
                result: TypeOrValue::Value(acc),
                pure: chain_pure,
            });
        }

        let mut cur_type = infos[0].result.dtype();
        let mut loc = factors[0].span;
        for i in 1..factors.len() {
            let b_type = infos[i].result.dtype();
            let op = ops[i - 1];
            let result = match op {
                TermOp::Times => cur_type.binary_mul(&b_type),
                TermOp::Divide => cur_type.binary_div(&b_type),
            };
            let Some(next_type) = result else {
                let symbol = match op {
                    TermOp::Times => "*",
                    TermOp::Divide => "/",
                };
                let bad = [(loc, cur_type), (factors[i].span, b_type)];
                expr.kind = ExprKind::Term { factors, ops };
                self.log.log(diag::operator_not_applicable(symbol, &bad));
                return None;
            };
            if op == TermOp::Divide
                && (b_type.type_eq(&DType::Int) || b_type.is_unknown())
                && !cur_type.type_eq(&DType::Real)
            {
                match infos[i].result.as_value() {
                    None => chain_pure = false,
                    Some(Value::Int(divisor)) if divisor.is_zero() => {
                        self.log.log(diag::integer_zero_division(factors[i].span));
                    }
                    Some(_) => {}
                }
            }
            cur_type = next_type;
            loc = loc.cover(factors[i].span);
        }
        expr.kind = ExprKind::Term { factors, ops };
        Some(ExprInfo {
            result: TypeOrValue::Type(cur_type),
            pure: chain_pure,
        })
    }

    /// Applies prefix signs, calls, accessors and typechecks in tightness
    /// order, collapsing the applied steps into a literal for as long as the
    /// chain stays pure, known and immutable.
    fn check_unary(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let ExprKind::Unary { prefix, expr: inner, postfix } = &mut expr.kind else {
            unreachable!()
        };
        let info = self.check_expr(inner)?;
        if prefix.is_empty() && postfix.is_empty() {
            let unwrapped = mem::replace(&mut **inner, Expr::literal(Span::empty(), Value::None));
            *expr = unwrapped;
            return Some(info);
        }
        let mut pure = info.pure && !info.result.is_unknown();
        let mut state = ChainState::new(info.result, inner.span);
        let mut precomp = pure && state.cur.as_value().is_some();
        let npre = prefix.len();
        let npost = postfix.len();
        let (mut ipre, mut ipost) = (0usize, 0usize);
        let (mut consumed_pre, mut consumed_post) = (0usize, 0usize);
        let mut collapsed: Option<(Value, Span)> = None;
        while ipre < npre || ipost < npost {
            let do_postfix = ipre == npre || (ipost < npost && postfix[ipost].tightness() <= PREFIX_TIGHTNESS);
            let step_pure = if do_postfix {
                let step = self.apply_postfix(&mut state, &mut postfix[ipost])?;
                ipost += 1;
                step
            } else {
                let op = prefix[npre - ipre - 1].clone();
                let step = self.apply_prefix_op(&mut state, &op)?;
                ipre += 1;
                step
            };
            pure = pure && step_pure;
            precomp = precomp && pure && state.cur.as_value().is_some_and(|v| !v.dtype().mutable());
            if precomp {
                consumed_pre = ipre;
                consumed_post = ipost;
                collapsed = Some((state.cur.as_value().expect("known").clone(), state.loc));
            }
        }
        if let Some((value, value_span)) = collapsed {
            **inner = Expr::literal(value_span, value);
            prefix.truncate(npre - consumed_pre);
            postfix.drain(..consumed_post);
        }
        if prefix.is_empty() && postfix.is_empty() {
            let unwrapped = mem::replace(&mut **inner, Expr::literal(Span::empty(), Value::None));
            *expr = unwrapped;
        }
        Some(ExprInfo {
            result: state.cur,
            pure,
        })
    }

    /// Arrays are mutable: the literal is re-evaluated on every execution,
    /// so only the elements are checked, never pre-collapsed.
    fn check_array_lit(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let ExprKind::ArrayLit(items) = &mut expr.kind else {
            unreachable!()
        };
        let mut pure = true;
        let mut errored = false;
        for item in items.iter_mut() {
            match self.check_expr(item) {
                Some(info) => pure = pure && info.pure,
                None => errored = true,
            }
        }
        if errored {
            return None;
        }
        Some(ExprInfo {
            result: TypeOrValue::Type(DType::Array),
            pure,
        })
    }

    /// Tuples are mutable too; additionally every registered field name must
    /// be unique.
    fn check_tuple_lit(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let ExprKind::TupleLit(elements) = &mut expr.kind else {
            unreachable!()
        };
        let mut name_spans: IndexMap<String, Vec<Span>> = IndexMap::new();
        for element in elements.iter() {
            if let Some(name) = &element.name {
                name_spans.entry(name.name.clone()).or_default().push(name.span);
            }
        }
        let mut bad_names = false;
        for (name, spans) in &name_spans {
            if spans.len() > 1 {
                self.log.log(diag::duplicate_field_names(name, spans));
                bad_names = true;
            }
        }
        let mut pure = true;
        let mut errored = false;
        for element in elements.iter_mut() {
            match self.check_expr(&mut element.value) {
                Some(info) => pure = pure && info.pure,
                None => errored = true,
            }
        }
        if errored || bad_names {
            return None;
        }
        Some(ExprInfo {
            result: TypeOrValue::Type(DType::Tuple),
            pure,
        })
    }

    /// Analyzes a `func` literal: opens a blind scope over a copy of the
    /// timeline, declares the parameters as unknowns, analyzes the body with
    /// `in_function` set, collects the referenced externals, and rewrites
    /// the literal into a closure definition carrying the static signature.
    fn check_func_lit(&mut self, expr: &mut Expr) -> Option<ExprInfo> {
        let span = expr.span;
        let ExprKind::FuncLit { params, body } = &mut expr.kind else {
            unreachable!()
        };

        let mut name_spans: IndexMap<String, Vec<Span>> = IndexMap::new();
        for param in params.iter() {
            name_spans.entry(param.name.clone()).or_default().push(param.span);
        }
        let mut bad_names = false;
        for (name, spans) in &name_spans {
            if spans.len() > 1 {
                self.log.log(diag::duplicate_parameter_names(name, spans));
                bad_names = true;
            }
        }
        if bad_names {
            return None;
        }
        let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        let param_spans: Vec<Span> = params.iter().map(|p| p.span).collect();

        // The short body form is the long form with a single return.
        {
            let func_body = Rc::make_mut(body);
            if let FuncBody::Short(ret) = func_body {
                let ret_span = ret.span;
                let ret_expr = mem::replace(ret, Expr::literal(Span::empty(), Value::None));
                *func_body = FuncBody::Long(Body::new(
                    ret_span,
                    vec![Stmt {
                        span: ret_span,
                        kind: StmtKind::Return(Some(ret_expr)),
                    }],
                ));
            }
        }

        let scratch = self.timeline.clone();
        let enclosing = mem::replace(&mut self.timeline, scratch);
        self.timeline.start_blind_scope();
        for (name, param_span) in param_names.iter().zip(&param_spans) {
            self.timeline.declare(name, *param_span);
            self.timeline
                .assign(name, TypeOrValue::Type(DType::Unknown), *param_span);
        }
        let saved_function = mem::replace(&mut self.in_function, true);
        let saved_cycle = mem::replace(&mut self.in_cycle, false);
        let res = {
            let FuncBody::Long(long_body) = Rc::make_mut(body) else {
                unreachable!("short bodies were desugared above")
            };
            self.check_body(long_body)
        };
        self.in_function = saved_function;
        self.in_cycle = saved_cycle;
        let stats = self.timeline.end_scope();
        self.timeline = enclosing;
        if res.term == Termination::Errored {
            return None;
        }
        for (name, unused_span) in &stats.unused_assignments {
            self.log.log(diag::assigned_value_unused(*unused_span, name));
        }

        let mut captured: Vec<String> = stats.externals.keys().cloned().collect();
        captured.sort_unstable();
        for name in &captured {
            self.timeline.assign_unknown_used(name);
        }

        let func_type = Rc::new(FuncType {
            pure: res.pure,
            params: Some(vec![DType::Unknown; param_names.len()]),
            ret: res.returned.unwrap_or(DType::None),
        });
        let def = ClosureDef {
            func_type: Rc::clone(&func_type),
            params: param_names,
            captured,
            body: Rc::clone(body),
        };
        *expr = Expr::new(span, ExprKind::Closure(def));
        Some(ExprInfo {
            result: TypeOrValue::Type(DType::Func(func_type)),
            pure: true,
        })
    }
}
