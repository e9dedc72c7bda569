//! The tree-walking executor.
//!
//! One [`RuntimeContext`] per program run: input and output streams, a
//! bounded call stack, and the four-state control signal. Every visit checks
//! the signal first and returns immediately when it is not `Running`; `exit`,
//! `return` and runtime errors are states, never host exceptions.
//!
//! The executor runs the analyzer's rewritten tree. Statically decided sites
//! are trusted; sites the analyzer left `Unknown` keep their runtime checks,
//! and any operator that comes back unsupported or failing becomes a
//! `Throwing` state carrying the span and a call-stack snapshot.

mod eval;

use std::fmt::Write as _;
use std::mem;

use ahash::AHashMap;

use crate::ast::{Body, Stmt, StmtKind};
use crate::builtins::Builtin;
use crate::io::{InputReader, PrintWriter};
use crate::source::{SourceFile, Span};
use crate::tracer::ExecTracer;
use crate::value::{ErrorKind, RuntimeError, Value};

pub(crate) use eval::ExecChain;

/// Bound on simultaneously active user-function calls.
pub const DEFAULT_CALL_STACK_CAPACITY: usize = 1000;
/// Bound on rendered backtrace entries; longer traces elide the middle.
pub const DEFAULT_STACK_TRACE_ENTRIES: usize = 16;

/// A snapshot of the call stack taken when an error was thrown.
#[derive(Debug, Clone)]
pub struct StackTrace {
    entries: Vec<Span>,
    /// Index where elided frames would go; 0 when nothing was elided.
    skipping_sep: usize,
    skipped: usize,
}

impl StackTrace {
    /// Renders call sites top-down, eliding the middle as
    /// `Skipping N calls...` when the stack exceeded the entry cap.
    #[must_use]
    pub fn render(&self, file: &SourceFile) -> String {
        let mut out = String::new();
        for (i, &span) in self.entries.iter().enumerate() {
            if self.skipping_sep != 0 && i == self.skipping_sep {
                let _ = writeln!(out, "Skipping {} calls...", self.skipped);
            }
            file.write_pretty_excerpt(&mut out, span, 100);
        }
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The bounded stack of call-site spans.
#[derive(Debug)]
pub(crate) struct CallStack {
    entries: Vec<Span>,
    capacity: usize,
}

impl CallStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// False when the stack is full; the call site then throws.
    #[must_use]
    pub fn push(&mut self, span: Span) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(span);
        true
    }

    pub fn pop(&mut self) {
        self.entries.pop();
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// A snapshot capped to `entry_limit` frames: the first ⌊E/2⌋ and the
    /// last ⌈E/2⌉, with the elision recorded between them.
    pub fn report(&self, entry_limit: usize) -> StackTrace {
        let n = self.entries.len();
        if n <= entry_limit {
            return StackTrace {
                entries: self.entries.clone(),
                skipping_sep: 0,
                skipped: 0,
            };
        }
        let first_half = entry_limit / 2;
        let second_half = entry_limit - first_half;
        let mut entries = Vec::with_capacity(entry_limit);
        entries.extend_from_slice(&self.entries[..first_half]);
        entries.extend_from_slice(&self.entries[n - second_half..]);
        StackTrace {
            entries,
            skipping_sep: first_half,
            skipped: n - entry_limit,
        }
    }
}

/// An error in flight: what failed, where, and the stack when it did.
#[derive(Debug, Clone)]
pub struct Thrown {
    pub error: RuntimeError,
    pub span: Span,
    pub trace: StackTrace,
}

/// The control signal threaded through every visit.
#[derive(Debug)]
pub(crate) enum ControlState {
    Running,
    /// An `exit` is unwinding to the nearest loop.
    Exiting,
    /// A `return` is unwinding to the nearest call.
    Returning(Value),
    /// A runtime error is unwinding out of the whole program.
    Throwing(Thrown),
}

impl ControlState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

pub(crate) struct RuntimeContext<'io> {
    pub input: &'io mut dyn InputReader,
    pub output: &'io mut dyn PrintWriter,
    pub stack: CallStack,
    pub trace_cap: usize,
    pub state: ControlState,
}

impl RuntimeContext<'_> {
    pub fn throw(&mut self, error: RuntimeError, span: Span) {
        let trace = self.stack.report(self.trace_cap);
        self.state = ControlState::Throwing(Thrown { error, span, trace });
    }
}

pub(crate) struct Executor<'io, 'tr> {
    pub ctx: RuntimeContext<'io>,
    /// Runtime scopes, innermost last. The bottom scope holds the built-ins.
    pub scopes: Vec<AHashMap<String, Value>>,
    pub tracer: &'tr mut dyn ExecTracer,
}

/// Runs a fully analyzed program.
pub(crate) fn execute(
    program: &Body,
    input: &mut dyn InputReader,
    output: &mut dyn PrintWriter,
    tracer: &mut dyn ExecTracer,
    stack_capacity: usize,
    trace_cap: usize,
) -> Result<(), Thrown> {
    let mut globals = AHashMap::new();
    globals.insert("input".to_owned(), Value::Builtin(Builtin::Input));
    let mut executor = Executor {
        ctx: RuntimeContext {
            input,
            output,
            stack: CallStack::new(stack_capacity),
            trace_cap,
            state: ControlState::Running,
        },
        scopes: vec![globals],
        tracer,
    };
    executor.exec_body(program);
    match executor.ctx.state {
        ControlState::Throwing(thrown) => Err(thrown),
        _ => Ok(()),
    }
}

impl Executor<'_, '_> {
    /// The nearest visible value of a name.
    pub(crate) fn lookup_value(&self, name: &str) -> Option<Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name)).cloned()
    }

    /// Overwrites the nearest visible binding; false when undeclared.
    fn assign_name(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    /// When a closure is bound to the very name it captured while that name
    /// was still unassigned, patch the captured slot so the closure can call
    /// itself.
    fn fixup_self_capture(name: &str, value: &Value) {
        if let Value::Closure(closure) = value {
            let mut captured = closure.captured.borrow_mut();
            for (captured_name, captured_value) in captured.iter_mut() {
                if captured_name == name && matches!(captured_value, Value::None) {
                    *captured_value = value.clone();
                }
            }
        }
    }

    pub(crate) fn exec_body(&mut self, body: &Body) {
        self.scopes.push(AHashMap::new());
        for stmt in &body.statements {
            if !self.ctx.state.is_running() {
                break;
            }
            self.exec_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn exec_stmt(&mut self, stmt: &Stmt) {
        self.tracer.on_statement(stmt.span);
        match &stmt.kind {
            StmtKind::Var(defs) => {
                for def in defs {
                    let scope = self.scopes.last_mut().expect("a scope is always open");
                    if scope.contains_key(&def.name.name) {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::Redeclaration,
                                format!("Variable \"{}\" was already declared", def.name.name),
                            ),
                            def.name.span,
                        );
                        return;
                    }
                    // Declared before the initializer runs, so a closure in
                    // the initializer can capture the name.
                    scope.insert(def.name.name.clone(), Value::None);
                    if let Some(init) = &def.init {
                        let Some(value) = self.eval(init) else { return };
                        Self::fixup_self_capture(&def.name.name, &value);
                        self.scopes
                            .last_mut()
                            .expect("a scope is always open")
                            .insert(def.name.name.clone(), value);
                    }
                }
            }
            StmtKind::Block(body) => self.exec_body(body),
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let Some(test) = self.eval_bool(cond, "if") else { return };
                if test {
                    self.exec_body(then_body);
                } else if let Some(else_body) = else_body {
                    self.exec_body(else_body);
                }
            }
            StmtKind::ShortIf { cond, then_stmt } => {
                let Some(test) = self.eval_bool(cond, "if") else { return };
                if test {
                    self.scopes.push(AHashMap::new());
                    self.exec_stmt(then_stmt);
                    self.scopes.pop();
                }
            }
            StmtKind::While { cond, body } => loop {
                let Some(test) = self.eval_bool(cond, "while") else { return };
                if !test {
                    break;
                }
                self.exec_body(body);
                match self.ctx.state {
                    ControlState::Running => {}
                    ControlState::Exiting => {
                        self.ctx.state = ControlState::Running;
                        break;
                    }
                    _ => break,
                }
            },
            StmtKind::Loop { body } => loop {
                self.exec_body(body);
                match self.ctx.state {
                    ControlState::Running => {}
                    ControlState::Exiting => {
                        self.ctx.state = ControlState::Running;
                        break;
                    }
                    _ => break,
                }
            },
            StmtKind::For {
                var,
                start_or_list,
                end,
                body,
            } => self.exec_for(var.as_ref(), start_or_list, end.as_ref(), body),
            StmtKind::Exit => self.ctx.state = ControlState::Exiting,
            StmtKind::Return(value) => {
                let result = match value {
                    Some(expr) => match self.eval(expr) {
                        Some(v) => v,
                        None => return,
                    },
                    None => Value::None,
                };
                self.ctx.state = ControlState::Returning(result);
            }
            StmtKind::Print(exprs) => {
                for expr in exprs {
                    let Some(value) = self.eval(expr) else { return };
                    self.ctx.output.write_str(&value.render());
                }
            }
            StmtKind::Expr(expr) => {
                self.eval(expr);
            }
            StmtKind::Assign { target, value } => {
                let Some(value) = self.eval(value) else { return };
                if target.accessors.is_empty() {
                    Self::fixup_self_capture(&target.base.name, &value);
                    if !self.assign_name(&target.base.name, value) {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::UndefinedVariable,
                                format!("Variable \"{}\" is not defined", target.base.name),
                            ),
                            target.base.span,
                        );
                    }
                    return;
                }
                self.exec_accessor_assign(target, value);
            }
        }
    }

    fn exec_for(
        &mut self,
        var: Option<&crate::ast::Ident>,
        start_or_list: &crate::ast::Expr,
        end: Option<&crate::ast::Expr>,
        body: &Body,
    ) {
        let Some(first) = self.eval(start_or_list) else { return };
        match end {
            Some(end_expr) => {
                let Some(last) = self.eval(end_expr) else { return };
                let (Value::Int(from), Value::Int(to)) = (first, last) else {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::TypeMismatch,
                            "The range boundaries must be integer values",
                        ),
                        start_or_list.span,
                    );
                    return;
                };
                let mut i = from;
                // Both boundaries are included; an empty range runs nothing.
                while i <= to {
                    if !self.run_iteration(var, Value::Int(i.clone()), body) {
                        return;
                    }
                    i += 1;
                }
            }
            None => {
                let items: Vec<Value> = match &first {
                    Value::Array(array) => array.borrow().entries.values().cloned().collect(),
                    Value::Tuple(tuple) => tuple.borrow().values.clone(),
                    other => {
                        self.ctx.throw(
                            RuntimeError::new(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "Expected an array or a tuple to iterate over, but \"{}\" was provided",
                                    other.dtype()
                                ),
                            ),
                            start_or_list.span,
                        );
                        return;
                    }
                };
                for item in items {
                    if !self.run_iteration(var, item, body) {
                        return;
                    }
                }
            }
        }
    }

    /// One loop-body pass with the loop variable bound; false ends the loop
    /// (normally after absorbing an `exit`, or because of unwinding).
    fn run_iteration(&mut self, var: Option<&crate::ast::Ident>, item: Value, body: &Body) -> bool {
        let mut scope = AHashMap::new();
        if let Some(var) = var {
            scope.insert(var.name.clone(), item);
        }
        self.scopes.push(scope);
        self.exec_body(body);
        self.scopes.pop();
        match self.ctx.state {
            ControlState::Running => true,
            ControlState::Exiting => {
                self.ctx.state = ControlState::Running;
                false
            }
            _ => false,
        }
    }

    fn exec_accessor_assign(&mut self, target: &crate::ast::Reference, value: Value) {
        use crate::ast::AccessorKind;

        let Some(base) = self.lookup_value(&target.base.name) else {
            self.ctx.throw(
                RuntimeError::new(
                    ErrorKind::UndefinedVariable,
                    format!("Variable \"{}\" is not defined", target.base.name),
                ),
                target.base.span,
            );
            return;
        };
        let mut chain = ExecChain::new(base, target.base.span);
        let last_index = target.accessors.len() - 1;
        for accessor in &target.accessors[..last_index] {
            if self.chain_accessor(&mut chain, accessor).is_none() {
                return;
            }
        }
        let last = &target.accessors[last_index];
        match &last.kind {
            AccessorKind::Subscript(index_expr) => {
                let Some(index) = self.eval(index_expr) else { return };
                let (Value::Array(array), Value::Int(key)) = (&chain.cur, &index) else {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::TypeMismatch,
                            format!(
                                "Subscript assignment requires an array and an integer key, but \"{}\" and \"{}\" were provided",
                                chain.cur.dtype(),
                                index.dtype()
                            ),
                        ),
                        last.span,
                    );
                    return;
                };
                array.borrow_mut().entries.insert(key.clone(), value);
            }
            AccessorKind::Name(field) => {
                let Value::Tuple(tuple) = &chain.cur else {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::TypeMismatch,
                            format!("Field assignment requires a tuple, but \"{}\" was provided", chain.cur.dtype()),
                        ),
                        last.span,
                    );
                    return;
                };
                let slot = tuple.borrow().slot_of(field);
                match slot {
                    Some(slot) => tuple.borrow_mut().values[slot] = value,
                    None => self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::NoSuchField,
                            format!("The tuple has no field \"{field}\" to assign"),
                        ),
                        last.span,
                    ),
                }
            }
            AccessorKind::IntMember(index) => {
                self.assign_tuple_slot(&chain.cur, index, value, last.span);
            }
            AccessorKind::ParenMember(index_expr) => {
                let Some(index) = self.eval(index_expr) else { return };
                let Value::Int(index) = index else {
                    self.ctx.throw(
                        RuntimeError::new(
                            ErrorKind::TypeMismatch,
                            format!("The slot index must be an integer, but \"{}\" was provided", index.dtype()),
                        ),
                        last.span,
                    );
                    return;
                };
                self.assign_tuple_slot(&chain.cur, &index, value, last.span);
            }
        }
    }

    fn assign_tuple_slot(&mut self, cur: &Value, index: &num_bigint::BigInt, value: Value, span: Span) {
        let Value::Tuple(tuple) = cur else {
            self.ctx.throw(
                RuntimeError::new(
                    ErrorKind::TypeMismatch,
                    format!("Field assignment requires a tuple, but \"{}\" was provided", cur.dtype()),
                ),
                span,
            );
            return;
        };
        let slot = tuple.borrow().slot_of_index(index);
        match slot {
            Some(slot) => tuple.borrow_mut().values[slot] = value,
            None => self.ctx.throw(
                RuntimeError::new(
                    ErrorKind::NoSuchField,
                    format!("The tuple has no slot {index} to assign"),
                ),
                span,
            ),
        }
    }

    /// Calls a user closure: a fresh scope stack seeded with the captured
    /// snapshot plus the arguments, with `Returning` caught here. An
    /// `Exiting` state escaping a function body would mean the analyzer let
    /// an `exit` through, which is a bug.
    pub(crate) fn call_closure(
        &mut self,
        closure: &std::rc::Rc<crate::value::Closure>,
        args: Vec<Value>,
        call_span: Span,
    ) -> Option<Value> {
        if !self.ctx.stack.push(call_span) {
            self.ctx.throw(
                RuntimeError::new(
                    ErrorKind::StackOverflow,
                    format!("The call stack capacity of {} calls was exceeded", self.ctx.stack.capacity),
                ),
                call_span,
            );
            return None;
        }
        self.tracer.on_call(call_span, self.ctx.stack.depth());
        if args.len() != closure.params.len() {
            self.ctx.stack.pop();
            self.ctx.throw(
                RuntimeError::new(
                    ErrorKind::WrongArguments,
                    format!(
                        "The function expects {} argument(s), but {} provided",
                        closure.params.len(),
                        args.len()
                    ),
                ),
                call_span,
            );
            return None;
        }
        let mut captured_scope = AHashMap::new();
        for (name, value) in closure.captured.borrow().iter() {
            captured_scope.insert(name.clone(), value.clone());
        }
        let mut frame = AHashMap::new();
        for (param, arg) in closure.params.iter().zip(args) {
            frame.insert(param.clone(), arg);
        }
        let saved_scopes = mem::replace(&mut self.scopes, vec![captured_scope, frame]);
        let result = match &*closure.body {
            crate::ast::FuncBody::Long(body) => {
                self.exec_body(body);
                match &self.ctx.state {
                    ControlState::Running => Some(Value::None),
                    ControlState::Returning(_) => {
                        let ControlState::Returning(value) =
                            mem::replace(&mut self.ctx.state, ControlState::Running)
                        else {
                            unreachable!()
                        };
                        Some(value)
                    }
                    ControlState::Throwing(_) => None,
                    ControlState::Exiting => panic!("cannot 'exit' out of a function"),
                }
            }
            crate::ast::FuncBody::Short(expr) => self.eval(expr),
        };
        self.scopes = saved_scopes;
        self.ctx.stack.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(n: u32) -> Span {
        Span::new(n, n + 1)
    }

    #[test]
    fn call_stack_refuses_past_capacity() {
        let mut stack = CallStack::new(2);
        assert!(stack.push(span(0)));
        assert!(stack.push(span(1)));
        assert!(!stack.push(span(2)));
        stack.pop();
        assert!(stack.push(span(3)));
    }

    #[test]
    fn report_keeps_everything_under_the_cap() {
        let mut stack = CallStack::new(100);
        for i in 0..5 {
            assert!(stack.push(span(i)));
        }
        let trace = stack.report(8);
        assert_eq!(trace.entries.len(), 5);
        assert_eq!(trace.skipping_sep, 0);
        assert_eq!(trace.skipped, 0);
    }

    #[test]
    fn report_halves_around_the_elision() {
        let mut stack = CallStack::new(100);
        for i in 0..20 {
            assert!(stack.push(span(i)));
        }
        let trace = stack.report(7);
        // ⌊7/2⌋ = 3 from the top, ⌈7/2⌉ = 4 from the bottom.
        assert_eq!(trace.entries.len(), 7);
        assert_eq!(trace.skipping_sep, 3);
        assert_eq!(trace.skipped, 13);
        assert_eq!(trace.entries[..3], [span(0), span(1), span(2)]);
        assert_eq!(trace.entries[3..], [span(16), span(17), span(18), span(19)]);
    }

    #[test]
    fn trace_render_mentions_the_elision() {
        let file = SourceFile::new("t.d", "print 1\n".repeat(30));
        let mut stack = CallStack::new(100);
        for i in 0..20 {
            assert!(stack.push(Span::new(i * 8, i * 8 + 5)));
        }
        let rendered = stack.report(4).render(&file);
        assert!(rendered.contains("Skipping 16 calls..."));
    }
}
