//! The semantic analyzer with constant folding.
//!
//! Three co-operating passes over the owned AST:
//!
//! - the statement checker (this module): classifies how every statement
//!   terminates, prunes unreachable code, hoists known conditions, and keeps
//!   the [`Timeline`] in step with what each statement does;
//! - the expression checker ([`expr`]): folds fully-known pure
//!   sub-expressions into literals and rewrites `func` literals into closure
//!   definitions;
//! - the accessor-chain checker ([`chain`]): applies one call, accessor,
//!   prefix sign or typecheck at a time so that `obj.a.b[i].c(x)` can be
//!   analyzed left-to-right with partial knowledge carried along.
//!
//! The analyzer rewrites the tree as it goes. Execution must only happen if
//! the log stayed free of `Error` diagnostics afterwards.

mod chain;
mod expr;

use std::mem;

use crate::ast::{Body, Reference, Stmt, StmtKind, VarDef};
use crate::log::{CompilationLog, DiagCode, Diagnostic};
use crate::source::Span;
use crate::timeline::{ScopeReport, Timeline, TypeOrValue};
use crate::types::{DType, FuncType};
use crate::value::{RuntimeError, Value};

pub(crate) use chain::ChainState;

/// How a statement (or statement list) finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// Fell through to the next statement.
    ReachedEnd,
    /// Hit an `exit`.
    Exited,
    /// Hit a `return`.
    Returned,
    /// A diagnostic error stopped the analysis of this statement.
    Errored,
}

/// What the statement checker learned about one statement.
pub(crate) struct StmtRes {
    pub term: Termination,
    /// True when the statement has no observable side effects.
    pub pure: bool,
    /// Generalized type of every `return` on paths through this statement.
    pub returned: Option<DType>,
    /// Zero or more statements to splice in place of this one.
    pub replacement: Option<Vec<Stmt>>,
}

impl StmtRes {
    fn errored() -> Self {
        Self {
            term: Termination::Errored,
            pure: true,
            returned: None,
            replacement: None,
        }
    }

    fn reached_end(pure: bool) -> Self {
        Self {
            term: Termination::ReachedEnd,
            pure,
            returned: None,
            replacement: None,
        }
    }
}

/// What a body-visit learned about a statement list.
pub(crate) struct BodyRes {
    pub term: Termination,
    pub pure: bool,
    pub returned: Option<DType>,
}

/// What the expression checker learned about one expression.
pub(crate) struct ExprInfo {
    pub result: TypeOrValue,
    pub pure: bool,
}

/// Runs semantic analysis over a program body, rewriting it in place.
///
/// The global scope is seeded with the `input` built-in. Returns false when
/// the analysis stopped on an error; warnings alone do not fail it.
pub fn analyze(program: &mut Body, log: &mut dyn CompilationLog) -> bool {
    let mut analyzer = Analyzer {
        log,
        timeline: Timeline::new(),
        in_function: false,
        in_cycle: false,
    };
    analyzer.timeline.start_scope();
    let zero = Span::empty();
    analyzer.timeline.declare("input", zero);
    analyzer.timeline.assign(
        "input",
        TypeOrValue::Type(DType::Func(std::rc::Rc::new(FuncType::new(
            false,
            vec![],
            DType::Str,
        )))),
        zero,
    );
    analyzer.timeline.lookup("input");
    let res = analyzer.check_body(program);
    res.term != Termination::Errored
}

pub(crate) struct Analyzer<'log> {
    pub log: &'log mut dyn CompilationLog,
    pub timeline: Timeline,
    pub in_function: bool,
    pub in_cycle: bool,
}

/// Folds another return-type observation into the accumulator.
pub(crate) fn add_return(acc: &mut Option<DType>, extra: Option<&DType>) {
    if let Some(t) = extra {
        *acc = Some(match acc.take() {
            Some(prev) => prev.generalize(t),
            None => t.clone(),
        });
    }
}

fn take_body(body: &mut Body) -> Body {
    let span = body.span;
    mem::replace(body, Body::new(span, Vec::new()))
}

impl Analyzer<'_> {
    /// Analyzes a statement list in its own scope: splices replacements,
    /// prunes everything after the first non-fall-through statement, and
    /// reports unused names when the scope ends.
    pub(crate) fn check_body(&mut self, body: &mut Body) -> BodyRes {
        self.timeline.start_scope();
        let mut pure = true;
        let mut returned = None;
        let mut term = Termination::ReachedEnd;
        let mut i = 0;
        while i < body.statements.len() {
            let res = self.check_stmt(&mut body.statements[i]);
            pure = pure && res.pure;
            add_return(&mut returned, res.returned.as_ref());
            let advance = match res.replacement {
                Some(repl) => {
                    let count = repl.len();
                    body.statements.splice(i..=i, repl);
                    count
                }
                None => 1,
            };
            match res.term {
                Termination::ReachedEnd => i += advance,
                Termination::Exited | Termination::Returned => {
                    term = res.term;
                    let next = i + advance;
                    if next < body.statements.len() {
                        let tail = body.statements[next]
                            .span
                            .cover(body.statements.last().expect("non-empty tail").span);
                        self.log.log(diag::code_unreachable(tail, true));
                        body.statements.truncate(next);
                    }
                    break;
                }
                Termination::Errored => {
                    self.timeline.end_scope();
                    return BodyRes {
                        term: Termination::Errored,
                        pure,
                        returned,
                    };
                }
            }
        }
        let stats = self.timeline.end_scope();
        self.report_variable_problems(&stats);
        BodyRes { term, pure, returned }
    }

    pub(crate) fn report_variable_problems(&mut self, stats: &ScopeReport) {
        for (name, span) in &stats.unused_assignments {
            self.log.log(diag::assigned_value_unused(*span, name));
        }
        for (name, span) in &stats.never_used {
            self.log.log(diag::variable_never_used(*span, name));
        }
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> StmtRes {
        match &stmt.kind {
            StmtKind::Var(_) => self.check_var(stmt),
            StmtKind::If { .. } => self.check_if(stmt),
            StmtKind::ShortIf { .. } => self.check_short_if(stmt),
            StmtKind::While { .. } => self.check_while(stmt),
            StmtKind::For { .. } => self.check_for(stmt),
            StmtKind::Loop { .. } => {
                let StmtKind::Loop { body } = &mut stmt.kind else {
                    unreachable!()
                };
                self.timeline.start_blind_scope();
                self.check_loop_body(body)
            }
            StmtKind::Exit => self.check_exit(stmt.span),
            StmtKind::Assign { .. } => self.check_assign(stmt),
            StmtKind::Print(_) => self.check_print(stmt),
            StmtKind::Return(_) => self.check_return(stmt),
            StmtKind::Expr(_) => self.check_expr_stmt(stmt),
            // A block spliced in by an earlier pass; re-analysis sees it as
            // a plain nested body.
            StmtKind::Block(_) => {
                let StmtKind::Block(body) = &mut stmt.kind else {
                    unreachable!()
                };
                let res = self.check_body(body);
                StmtRes {
                    term: res.term,
                    pure: res.pure,
                    returned: res.returned,
                    replacement: None,
                }
            }
        }
    }

    fn check_var(&mut self, stmt: &mut Stmt) -> StmtRes {
        let StmtKind::Var(defs) = &mut stmt.kind else {
            unreachable!()
        };
        let mut pure = true;
        let mut errored = false;
        for def in defs.iter_mut() {
            let VarDef { name, init } = def;
            // Declared before the initializer is analyzed, so a function
            // literal in the initializer can capture the name (recursion).
            let declared = self.timeline.declare(&name.name, name.span);
            if !declared {
                self.log.log(diag::variable_redefined(name.span, &name.name));
                errored = true;
            }
            if let Some(init) = init {
                match self.check_expr(init) {
                    None => {
                        errored = true;
                        continue;
                    }
                    Some(info) => {
                        pure = pure && info.pure;
                        if declared {
                            self.timeline.assign(&name.name, info.result, init.span);
                        }
                    }
                }
            }
        }
        if errored {
            StmtRes::errored()
        } else {
            StmtRes::reached_end(pure)
        }
    }

    fn check_if(&mut self, stmt: &mut Stmt) -> StmtRes {
        let StmtKind::If {
            cond,
            then_body,
            else_body,
        } = &mut stmt.kind
        else {
            unreachable!()
        };
        let Some(cinfo) = self.check_expr(cond) else {
            return StmtRes::errored();
        };
        let ctype = cinfo.result.dtype();
        if !ctype.is_unknown() && !ctype.type_eq(&DType::Bool) {
            self.log.log(diag::condition_must_be_boolean(cond.span, &ctype));
            return StmtRes::errored();
        }
        let known = cinfo.result.known_bool();
        if let Some(value) = known {
            self.log.log(diag::if_condition_always_known(cond.span, value));
        }

        let else_tl = self.timeline.clone();
        let true_res = self.check_body(then_body);

        if let Some(else_b) = else_body {
            let then_tl = mem::replace(&mut self.timeline, else_tl);
            let false_res = self.check_body(else_b);
            if true_res.term == Termination::Errored || false_res.term == Termination::Errored {
                return StmtRes::errored();
            }
            if let Some(value) = known {
                let mut repl = Vec::new();
                if !cinfo.pure {
                    repl.push(Stmt {
                        span: cond.span,
                        kind: StmtKind::Expr(cond.clone()),
                    });
                }
                if value {
                    self.timeline = then_tl;
                    repl.push(Stmt {
                        span: then_body.span,
                        kind: StmtKind::Block(take_body(then_body)),
                    });
                    StmtRes {
                        term: true_res.term,
                        pure: cinfo.pure && true_res.pure,
                        returned: true_res.returned,
                        replacement: Some(repl),
                    }
                } else {
                    repl.push(Stmt {
                        span: else_b.span,
                        kind: StmtKind::Block(take_body(else_b)),
                    });
                    StmtRes {
                        term: false_res.term,
                        pure: cinfo.pure && false_res.pure,
                        returned: false_res.returned,
                        replacement: Some(repl),
                    }
                }
            } else {
                self.timeline.merge(&then_tl);
                let term = match (true_res.term, false_res.term) {
                    (Termination::ReachedEnd, _) | (_, Termination::ReachedEnd) => Termination::ReachedEnd,
                    (Termination::Exited, _) | (_, Termination::Exited) => Termination::Exited,
                    _ => Termination::Returned,
                };
                let mut returned = true_res.returned;
                add_return(&mut returned, false_res.returned.as_ref());
                StmtRes {
                    term,
                    pure: cinfo.pure && true_res.pure && false_res.pure,
                    returned,
                    replacement: None,
                }
            }
        } else {
            if true_res.term == Termination::Errored {
                return StmtRes::errored();
            }
            if let Some(value) = known {
                let mut repl = Vec::new();
                if !cinfo.pure {
                    repl.push(Stmt {
                        span: cond.span,
                        kind: StmtKind::Expr(cond.clone()),
                    });
                }
                if value {
                    repl.push(Stmt {
                        span: then_body.span,
                        kind: StmtKind::Block(take_body(then_body)),
                    });
                    StmtRes {
                        term: true_res.term,
                        pure: cinfo.pure && true_res.pure,
                        returned: true_res.returned,
                        replacement: Some(repl),
                    }
                } else {
                    self.timeline = else_tl;
                    StmtRes {
                        term: Termination::ReachedEnd,
                        pure: cinfo.pure,
                        returned: None,
                        replacement: Some(repl),
                    }
                }
            } else {
                self.timeline.merge(&else_tl);
                StmtRes {
                    term: Termination::ReachedEnd,
                    pure: cinfo.pure && true_res.pure,
                    returned: true_res.returned,
                    replacement: None,
                }
            }
        }
    }

    /// `if c => s` analyzes as `if c then s end` and replaces itself with
    /// the equivalent long form (or whatever that form folded into).
    fn check_short_if(&mut self, stmt: &mut Stmt) -> StmtRes {
        let span = stmt.span;
        let StmtKind::ShortIf { cond, then_stmt } = mem::replace(&mut stmt.kind, StmtKind::Exit) else {
            unreachable!()
        };
        let then_span = then_stmt.span;
        let mut equiv = Stmt {
            span,
            kind: StmtKind::If {
                cond,
                then_body: Body::new(then_span, vec![*then_stmt]),
                else_body: None,
            },
        };
        let mut res = self.check_stmt(&mut equiv);
        if res.replacement.is_none() {
            res.replacement = Some(vec![equiv]);
        }
        res
    }

    fn check_while(&mut self, stmt: &mut Stmt) -> StmtRes {
        let StmtKind::While { cond, body } = &mut stmt.kind else {
            unreachable!()
        };
        // First evaluation: the condition runs at least once, against the
        // state as it is before the loop. A scratch copy of the condition
        // and timeline keeps this evaluation from disturbing the real ones.
        let mut scratch = self.timeline.clone();
        let mut first_cond = cond.clone();
        mem::swap(&mut self.timeline, &mut scratch);
        let first = self.check_expr(&mut first_cond);
        mem::swap(&mut self.timeline, &mut scratch);
        let Some(first) = first else {
            return StmtRes::errored();
        };
        let ftype = first.result.dtype();
        if !ftype.is_unknown() && !ftype.type_eq(&DType::Bool) {
            self.log.log(diag::while_condition_not_bool(first_cond.span, &ftype));
            return StmtRes::errored();
        }
        if first.result.known_bool() == Some(false) {
            self.log.log(diag::while_condition_false(first_cond.span));
            let mut repl = Vec::new();
            if !first.pure {
                // The hoisted condition still runs once; adopt its effects.
                self.timeline = scratch;
                repl.push(Stmt {
                    span: first_cond.span,
                    kind: StmtKind::Expr(first_cond),
                });
            }
            // The body never runs, but its diagnostics are still worth
            // having; analyze it against a throwaway copy.
            let mut throwaway = self.timeline.clone();
            mem::swap(&mut self.timeline, &mut throwaway);
            self.timeline.start_blind_scope();
            let saved_cycle = mem::replace(&mut self.in_cycle, true);
            let body_res = self.check_body(body);
            self.in_cycle = saved_cycle;
            self.timeline.end_scope();
            mem::swap(&mut self.timeline, &mut throwaway);
            if body_res.term == Termination::Errored {
                return StmtRes::errored();
            }
            return StmtRes {
                term: Termination::ReachedEnd,
                pure: false,
                returned: None,
                replacement: Some(repl),
            };
        }
        // The loop may run: re-check the real condition behind the blind,
        // where every enclosing binding is unknown.
        self.timeline.start_blind_scope();
        if self.check_expr(cond).is_none() {
            self.timeline.end_scope();
            return StmtRes::errored();
        }
        self.check_loop_body(body)
    }

    /// Shared tail of while/for/loop: analyzes the body inside the already
    /// opened blind scope, closes it, and degrades every external the body
    /// writes, because the body may run zero or many times.
    fn check_loop_body(&mut self, body: &mut Body) -> StmtRes {
        let saved_cycle = mem::replace(&mut self.in_cycle, true);
        let res = self.check_body(body);
        self.in_cycle = saved_cycle;
        if res.term == Termination::Errored {
            self.timeline.end_scope();
            return StmtRes::errored();
        }
        let stats = self.timeline.end_scope();
        self.report_variable_problems(&stats);
        for (name, &written) in &stats.externals {
            if written {
                self.timeline.assign_unknown_used(name);
            }
        }
        StmtRes {
            term: if res.term == Termination::Returned {
                Termination::Returned
            } else {
                Termination::ReachedEnd
            },
            pure: false,
            returned: res.returned,
            replacement: None,
        }
    }

    fn check_for(&mut self, stmt: &mut Stmt) -> StmtRes {
        let StmtKind::For {
            var,
            start_or_list,
            end,
            body,
        } = &mut stmt.kind
        else {
            unreachable!()
        };
        let Some(sinfo) = self.check_expr(start_or_list) else {
            return StmtRes::errored();
        };
        let stype = sinfo.result.dtype();
        let var_type = if let Some(end_expr) = end {
            let Some(einfo) = self.check_expr(end_expr) else {
                return StmtRes::errored();
            };
            let etype = einfo.result.dtype();
            let mut bad = false;
            if !stype.is_unknown() && !stype.type_eq(&DType::Int) {
                self.log.log(diag::integer_boundary_expected(start_or_list.span, &stype));
                bad = true;
            }
            if !etype.is_unknown() && !etype.type_eq(&DType::Int) {
                self.log.log(diag::integer_boundary_expected(end_expr.span, &etype));
                bad = true;
            }
            if bad {
                return StmtRes::errored();
            }
            DType::Int
        } else {
            if !stype.is_unknown() && !stype.type_eq(&DType::Array) && !stype.type_eq(&DType::Tuple) {
                self.log.log(diag::iterable_expected(start_or_list.span, &stype));
                return StmtRes::errored();
            }
            DType::Unknown
        };
        self.timeline.start_blind_scope();
        if let Some(var) = var {
            self.timeline.declare(&var.name, var.span);
            self.timeline
                .assign(&var.name, TypeOrValue::Type(var_type), var.span);
        }
        self.check_loop_body(body)
    }

    fn check_exit(&mut self, span: Span) -> StmtRes {
        if !self.in_cycle {
            self.log.log(diag::exit_outside_of_cycle(span));
            return StmtRes::errored();
        }
        StmtRes {
            term: Termination::Exited,
            pure: false,
            returned: None,
            replacement: None,
        }
    }

    fn check_print(&mut self, stmt: &mut Stmt) -> StmtRes {
        let StmtKind::Print(exprs) = &mut stmt.kind else {
            unreachable!()
        };
        for expr in exprs.iter_mut() {
            if self.check_expr(expr).is_none() {
                return StmtRes::errored();
            }
        }
        StmtRes::reached_end(false)
    }

    fn check_return(&mut self, stmt: &mut Stmt) -> StmtRes {
        let span = stmt.span;
        let StmtKind::Return(value) = &mut stmt.kind else {
            unreachable!()
        };
        if !self.in_function {
            self.log.log(diag::return_outside_of_function(span));
            return StmtRes::errored();
        }
        match value {
            None => StmtRes {
                term: Termination::Returned,
                pure: true,
                returned: Some(DType::None),
                replacement: None,
            },
            Some(expr) => {
                let Some(info) = self.check_expr(expr) else {
                    return StmtRes::errored();
                };
                StmtRes {
                    term: Termination::Returned,
                    pure: info.pure,
                    returned: Some(info.result.dtype()),
                    replacement: None,
                }
            }
        }
    }

    fn check_expr_stmt(&mut self, stmt: &mut Stmt) -> StmtRes {
        let span = stmt.span;
        let StmtKind::Expr(expr) = &mut stmt.kind else {
            unreachable!()
        };
        let Some(info) = self.check_expr(expr) else {
            return StmtRes::errored();
        };
        if info.pure {
            self.log.log(diag::expression_statement_no_side_effects(span));
            return StmtRes {
                term: Termination::ReachedEnd,
                pure: true,
                returned: None,
                replacement: Some(Vec::new()),
            };
        }
        StmtRes::reached_end(false)
    }

    fn check_assign(&mut self, stmt: &mut Stmt) -> StmtRes {
        let span = stmt.span;
        let StmtKind::Assign { target, value } = &mut stmt.kind else {
            unreachable!()
        };
        let Some(vinfo) = self.check_expr(value) else {
            return StmtRes::errored();
        };
        let src = vinfo.result;
        if target.accessors.is_empty() {
            if !self.timeline.assign(&target.base.name, src, span) {
                self.log
                    .log(diag::variable_not_defined(target.base.span, &target.base.name));
                return StmtRes::errored();
            }
            return StmtRes::reached_end(false);
        }
        if self.check_accessor_assign(target, &src) {
            StmtRes::reached_end(false)
        } else {
            StmtRes::errored()
        }
    }

    /// Type-checks (and, when everything is known, replays on the timeline)
    /// an assignment through an accessor chain. True on success.
    fn check_accessor_assign(&mut self, target: &mut Reference, src: &TypeOrValue) -> bool {
        let Some(base) = self.timeline.lookup(&target.base.name) else {
            self.log
                .log(diag::variable_not_defined(target.base.span, &target.base.name));
            return false;
        };
        let mut state = ChainState::new(base, target.base.span);
        let last_index = target.accessors.len() - 1;
        for accessor in &mut target.accessors[..last_index] {
            if self.apply_accessor(&mut state, accessor).is_none() {
                return false;
            }
        }
        let last = &mut target.accessors[last_index];
        let last_span = last.span;
        let cur_type = state.cur.dtype();
        match &mut last.kind {
            crate::ast::AccessorKind::Subscript(index_expr) => {
                if !cur_type.is_unknown() && !cur_type.type_eq(&DType::Array) {
                    self.log.log(diag::subscript_assignment_only_in_arrays(last_span, &cur_type));
                    return false;
                }
                let Some(iinfo) = self.check_expr(index_expr) else {
                    return false;
                };
                let itype = iinfo.result.dtype();
                if !itype.is_unknown() && !itype.type_eq(&DType::Int) {
                    self.log.log(diag::bad_subscript_index_type(last_span, &itype));
                    return false;
                }
                if let (Some(Value::Array(arr)), Some(Value::Int(key)), Some(v)) =
                    (state.cur.as_value(), iinfo.result.as_value(), src.as_value())
                {
                    arr.borrow_mut().entries.insert(key.clone(), v.clone());
                }
                true
            }
            crate::ast::AccessorKind::Name(field) => {
                if !cur_type.is_unknown() && !cur_type.type_eq(&DType::Tuple) {
                    self.log.log(diag::fields_only_assignable_in_tuples(last_span, &cur_type));
                    return false;
                }
                if let (Some(Value::Tuple(tuple)), Some(v)) = (state.cur.as_value(), src.as_value()) {
                    let slot = tuple.borrow().slot_of(field);
                    match slot {
                        Some(slot) => tuple.borrow_mut().values[slot] = v.clone(),
                        None => {
                            self.log.log(diag::cannot_assign_named_field(last_span, field));
                            return false;
                        }
                    }
                }
                true
            }
            crate::ast::AccessorKind::IntMember(index) => {
                if !cur_type.is_unknown() && !cur_type.type_eq(&DType::Tuple) {
                    self.log.log(diag::fields_only_assignable_in_tuples(last_span, &cur_type));
                    return false;
                }
                if let (Some(Value::Tuple(tuple)), Some(v)) = (state.cur.as_value(), src.as_value()) {
                    let slot = tuple.borrow().slot_of_index(index);
                    match slot {
                        Some(slot) => tuple.borrow_mut().values[slot] = v.clone(),
                        None => {
                            self.log.log(diag::cannot_assign_indexed_field(last_span, index));
                            return false;
                        }
                    }
                }
                true
            }
            crate::ast::AccessorKind::ParenMember(index_expr) => {
                if !cur_type.is_unknown() && !cur_type.type_eq(&DType::Tuple) {
                    self.log.log(diag::fields_only_assignable_in_tuples(last_span, &cur_type));
                    return false;
                }
                let Some(iinfo) = self.check_expr(index_expr) else {
                    return false;
                };
                let itype = iinfo.result.dtype();
                if !itype.is_unknown() && !itype.type_eq(&DType::Int) {
                    self.log.log(diag::bad_subscript_index_type(last_span, &itype));
                    return false;
                }
                if let (Some(Value::Tuple(tuple)), Some(Value::Int(index)), Some(v)) =
                    (state.cur.as_value(), iinfo.result.as_value(), src.as_value())
                {
                    let slot = tuple.borrow().slot_of_index(index);
                    match slot {
                        Some(slot) => tuple.borrow_mut().values[slot] = v.clone(),
                        None => {
                            self.log.log(diag::cannot_assign_indexed_field(last_span, index));
                            return false;
                        }
                    }
                }
                true
            }
        }
    }
}

/// Constructors for the analyzer's diagnostics.
pub(crate) mod diag {
    use super::{DiagCode, Diagnostic, DType, RuntimeError, Span};
    use num_bigint::BigInt;

    pub fn variable_not_defined(span: Span, name: &str) -> Diagnostic {
        Diagnostic::error(
            DiagCode::VariableNotDefined,
            format!("Variable \"{name}\" is not defined"),
            &[span],
        )
    }

    pub fn variable_redefined(span: Span, name: &str) -> Diagnostic {
        Diagnostic::error(
            DiagCode::VariableRedefined,
            format!("Variable \"{name}\" is already defined"),
            &[span],
        )
    }

    pub fn operator_not_applicable(op: &str, operands: &[(Span, DType)]) -> Diagnostic {
        let types = operands
            .iter()
            .map(|(_, t)| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let spans: Vec<Span> = operands.iter().map(|(s, _)| *s).collect();
        Diagnostic::error(
            DiagCode::OperatorNotApplicable,
            format!("Operator \"{op}\" is not applicable to: {types}"),
            &spans,
        )
    }

    pub fn evaluation_exception(span: Span, error: &RuntimeError) -> Diagnostic {
        Diagnostic::error(
            DiagCode::EvaluationException,
            format!("Evaluating this expression raises an error: {error}"),
            &[span],
        )
    }

    pub fn wrong_argument_count(span: Span, needed: usize, given: usize) -> Diagnostic {
        Diagnostic::error(
            DiagCode::WrongArgumentCount,
            format!("The function expects {needed} argument(s), but {given} provided"),
            &[span],
        )
    }

    pub fn wrong_argument_type(span: Span, needed: &DType, given: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::WrongArgumentType,
            format!("Expected an argument of type \"{needed}\", but \"{given}\" provided"),
            &[span],
        )
    }

    pub fn tried_to_call_non_function(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::TriedToCallNonFunction,
            format!("Tried to call a value of type \"{ty}\", which is not a function"),
            &[span],
        )
    }

    pub fn condition_must_be_boolean(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::ConditionMustBeBoolean,
            format!("The condition must be a boolean, but its type is \"{ty}\""),
            &[span],
        )
    }

    pub fn iterable_expected(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::IterableExpected,
            format!("Expected an array or a tuple to iterate over, but the type is \"{ty}\""),
            &[span],
        )
    }

    pub fn integer_boundary_expected(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::IntegerBoundaryExpected,
            format!("The range boundary must be an integer, but its type is \"{ty}\""),
            &[span],
        )
    }

    pub fn no_such_field(span: Span, ty: &DType, field: &str) -> Diagnostic {
        Diagnostic::error(
            DiagCode::NoSuchField,
            format!("The object of type \"{ty}\" has no field \"{field}\""),
            &[span],
        )
    }

    pub fn bad_subscript_index_type(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::BadSubscriptIndexType,
            format!("The subscript index must be an integer, but its type is \"{ty}\""),
            &[span],
        )
    }

    pub fn subscript_assignment_only_in_arrays(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::SubscriptAssignmentOnlyInArrays,
            format!("Subscript assignment requires an array, but the type is \"{ty}\""),
            &[span],
        )
    }

    pub fn fields_only_assignable_in_tuples(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::FieldsOnlyAssignableInTuples,
            format!("Field assignment requires a tuple, but the type is \"{ty}\""),
            &[span],
        )
    }

    pub fn cannot_assign_named_field(span: Span, field: &str) -> Diagnostic {
        Diagnostic::error(
            DiagCode::CannotAssignNamedFieldInTuple,
            format!("The tuple has no field \"{field}\" to assign"),
            &[span],
        )
    }

    pub fn cannot_assign_indexed_field(span: Span, index: &BigInt) -> Diagnostic {
        Diagnostic::error(
            DiagCode::CannotAssignIndexedFieldInTuple,
            format!("The tuple has no slot {index} to assign"),
            &[span],
        )
    }

    pub fn exit_outside_of_cycle(span: Span) -> Diagnostic {
        Diagnostic::error(
            DiagCode::ExitOutsideOfCycle,
            "\"exit\" can only be used inside a cycle",
            &[span],
        )
    }

    pub fn return_outside_of_function(span: Span) -> Diagnostic {
        Diagnostic::error(
            DiagCode::ReturnOutsideOfFunction,
            "\"return\" can only be used inside a function",
            &[span],
        )
    }

    pub fn duplicate_field_names(name: &str, spans: &[Span]) -> Diagnostic {
        Diagnostic::error(
            DiagCode::DuplicateFieldNames,
            format!("The field name \"{name}\" is used more than once"),
            spans,
        )
    }

    pub fn duplicate_parameter_names(name: &str, spans: &[Span]) -> Diagnostic {
        Diagnostic::error(
            DiagCode::DuplicateParameterNames,
            format!("The parameter name \"{name}\" is used more than once"),
            spans,
        )
    }

    pub fn none_value_accessed(span: Span, name: &str) -> Diagnostic {
        Diagnostic::error(
            DiagCode::NoneValueAccessed,
            format!("The value of \"{name}\" is none here"),
            &[span],
        )
    }

    pub fn code_unreachable(span: Span, removed: bool) -> Diagnostic {
        let message = if removed {
            "This code is unreachable and was removed"
        } else {
            "This code is unreachable"
        };
        Diagnostic::warning(DiagCode::CodeUnreachable, message, &[span])
    }

    pub fn if_condition_always_known(span: Span, value: bool) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::IfConditionAlwaysKnown,
            format!("The condition is always {value}"),
            &[span],
        )
    }

    pub fn while_condition_false(span: Span) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::WhileConditionFalseAtStart,
            "The while condition is false on loop entry; the loop was removed",
            &[span],
        )
    }

    pub fn while_condition_not_bool(span: Span, ty: &DType) -> Diagnostic {
        Diagnostic::error(
            DiagCode::WhileConditionNotBoolAtStart,
            format!("The while condition must be a boolean, but its type is \"{ty}\""),
            &[span],
        )
    }

    pub fn expression_statement_no_side_effects(span: Span) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::ExpressionStatementNoSideEffects,
            "This expression statement has no side effects and was removed",
            &[span],
        )
    }

    pub fn integer_zero_division(span: Span) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::IntegerZeroDivisionWarning,
            "This integer division by zero will raise at runtime",
            &[span],
        )
    }

    pub fn variable_never_used(span: Span, name: &str) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::VariableNeverUsed,
            format!("Variable \"{name}\" is never used"),
            &[span],
        )
    }

    pub fn assigned_value_unused(span: Span, name: &str) -> Diagnostic {
        Diagnostic::warning(
            DiagCode::AssignedValueUnused,
            format!("The value assigned to \"{name}\" is never used"),
            &[span],
        )
    }
}
