//! Execution tracing hooks.
//!
//! The executor reports every statement it enters and every user-function
//! call to an [`ExecTracer`]. The default [`NoopTracer`] compiles away;
//! [`StderrTracer`] prints source positions as the program runs, which is
//! usually all the "step debugger" a small script needs.

use std::rc::Rc;

use crate::source::{SourceFile, Span};

/// Receives execution events from the executor.
pub trait ExecTracer {
    fn on_statement(&mut self, _span: Span) {}
    fn on_call(&mut self, _span: Span, _depth: usize) {}
}

/// Ignores all events.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl ExecTracer for NoopTracer {}

/// Prints one line per event to stderr.
#[derive(Debug)]
pub struct StderrTracer {
    file: Rc<SourceFile>,
}

impl StderrTracer {
    #[must_use]
    pub fn new(file: Rc<SourceFile>) -> Self {
        Self { file }
    }
}

impl ExecTracer for StderrTracer {
    fn on_statement(&mut self, span: Span) {
        eprintln!("trace: {}", self.file.pretty_position(span));
    }

    fn on_call(&mut self, span: Span, depth: usize) {
        eprintln!("trace: call depth {depth} at {}", self.file.pretty_position(span));
    }
}
