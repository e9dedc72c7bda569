#![doc = include_str!("../../../README.md")]

mod analyzer;
pub mod ast;
mod builtins;
mod exec;
mod io;
mod lexer;
mod log;
mod parse;
mod run;
mod source;
mod timeline;
mod tracer;
mod types;
mod value;

pub use crate::{
    analyzer::analyze,
    builtins::Builtin,
    exec::{DEFAULT_CALL_STACK_CAPACITY, DEFAULT_STACK_TRACE_ENTRIES, StackTrace, Thrown},
    io::{CollectStringPrint, EmptyInput, InputReader, NoPrint, PrintWriter, SliceInput, StdInput, StdPrint},
    lexer::{Token, TokenKind, tokenize},
    log::{AccumulatingLog, CompilationLog, DiagCode, Diagnostic, FanoutLog, FormatOptions, Severity, StreamingLog},
    parse::parse,
    run::{Runner, RuntimeFailure},
    source::{SourceFile, Span},
    tracer::{ExecTracer, NoopTracer, StderrTracer},
    types::{DType, FuncType},
    value::{Closure, CmpOutcome, DArray, DTuple, ErrorKind, OpResult, RuntimeError, Value},
};
