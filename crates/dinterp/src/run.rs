//! The public interface for compiling and running D programs.
//!
//! [`Runner::compile`] drives lexing, parsing and semantic analysis over a
//! shared diagnostic log; execution is only possible when no stage produced
//! an `Error`. A compiled `Runner` can be executed any number of times, each
//! run against fresh runtime state, and snapshotted with
//! [`Runner::dump`]/[`Runner::load`] so hosts can cache analyzed programs.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::analyzer::analyze;
use crate::ast::Body;
use crate::exec::{DEFAULT_CALL_STACK_CAPACITY, DEFAULT_STACK_TRACE_ENTRIES, StackTrace, Thrown, execute};
use crate::io::{CollectStringPrint, InputReader, PrintWriter, SliceInput};
use crate::lexer::tokenize;
use crate::log::{AccumulatingLog, CompilationLog};
use crate::parse::parse;
use crate::source::{SourceFile, Span};
use crate::tracer::{ExecTracer, NoopTracer};
use crate::value::RuntimeError;

/// A compiled (lexed, parsed, analyzed and rewritten) D program.
#[derive(Debug, Serialize, Deserialize)]
pub struct Runner {
    file: Rc<SourceFile>,
    program: Body,
}

impl Runner {
    /// Compiles source text.
    ///
    /// All diagnostics land on `log`; the result is `None` when any stage
    /// failed or logged an `Error`. Warnings do not gate compilation.
    pub fn compile(code: impl Into<String>, file_name: &str, log: &mut dyn CompilationLog) -> Option<Self> {
        let file = SourceFile::new_rc(file_name, code);
        let mut inner = AccumulatingLog::new();
        let program = (|| {
            let tokens = tokenize(&file, &mut inner)?;
            let mut program = parse(&tokens, &mut inner)?;
            let ok = analyze(&mut program, &mut inner);
            (ok && inner.is_clean()).then_some(program)
        })();
        for message in inner.messages() {
            log.log(message.clone());
        }
        Some(Self {
            file,
            program: program?,
        })
    }

    /// The source file this program was compiled from.
    #[must_use]
    pub fn source(&self) -> &SourceFile {
        &self.file
    }

    /// The rewritten program body, as the analyzer left it.
    #[must_use]
    pub fn program(&self) -> &Body {
        &self.program
    }

    /// Executes the program to completion.
    pub fn run(&self, input: &mut dyn InputReader, print: &mut dyn PrintWriter) -> Result<(), RuntimeFailure> {
        self.run_traced(input, print, &mut NoopTracer)
    }

    /// Executes the program with an execution tracer attached.
    pub fn run_traced(
        &self,
        input: &mut dyn InputReader,
        print: &mut dyn PrintWriter,
        tracer: &mut dyn ExecTracer,
    ) -> Result<(), RuntimeFailure> {
        self.run_with_limits(
            input,
            print,
            tracer,
            DEFAULT_CALL_STACK_CAPACITY,
            DEFAULT_STACK_TRACE_ENTRIES,
        )
    }

    /// Executes with a custom call-stack capacity and backtrace entry cap.
    pub fn run_with_limits(
        &self,
        input: &mut dyn InputReader,
        print: &mut dyn PrintWriter,
        tracer: &mut dyn ExecTracer,
        stack_capacity: usize,
        trace_cap: usize,
    ) -> Result<(), RuntimeFailure> {
        execute(&self.program, input, print, tracer, stack_capacity, trace_cap).map_err(|thrown| RuntimeFailure {
            thrown,
            file: Rc::clone(&self.file),
        })
    }

    /// Runs with scripted input lines and collected output; the shape most
    /// tests and embedding hosts want.
    pub fn run_collect(&self, input_lines: &[&str]) -> Result<String, RuntimeFailure> {
        let mut input = SliceInput::new(input_lines);
        let mut output = CollectStringPrint::new();
        self.run(&mut input, &mut output)?;
        Ok(output.into_output())
    }

    /// Serializes the compiled program to bytes.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a compiled program from [`Runner::dump`] bytes.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

/// A runtime error that escaped the program: the error itself, the span it
/// originated at, and the call-stack snapshot taken when it was thrown.
#[derive(Debug)]
pub struct RuntimeFailure {
    thrown: Thrown,
    file: Rc<SourceFile>,
}

impl RuntimeFailure {
    #[must_use]
    pub fn error(&self) -> &RuntimeError {
        &self.thrown.error
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.thrown.span
    }

    #[must_use]
    pub fn trace(&self) -> &StackTrace {
        &self.thrown.trace
    }
}

impl fmt::Display for RuntimeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Runtime error] {}", self.thrown.error)?;
        let mut excerpt = String::new();
        self.file.write_pretty_excerpt(&mut excerpt, self.thrown.span, 100);
        f.write_str(&excerpt)?;
        if !self.thrown.trace.is_empty() {
            writeln!(f, "Call stack:")?;
            f.write_str(&self.thrown.trace.render(&self.file))?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeFailure {}
