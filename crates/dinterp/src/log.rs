//! The compilation log: structured diagnostics and their sinks.
//!
//! Every stage of the pipeline reports problems as [`Diagnostic`] values with
//! a severity, a stable code, a rendered message and zero or more spans.
//! Sinks either accumulate messages for later rendering, stream them
//! line-by-line into a writer as they arrive, or fan out to both.

use std::fmt;
use std::io::Write;

use smallvec::SmallVec;
use strum::{Display, EnumString, IntoStaticStr};

use crate::source::{SourceFile, Span};

/// Message severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, IntoStaticStr)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Stable diagnostic codes.
///
/// The string form of each variant is the code users see in `(Code)` position
/// of a rendered message, and what tests match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum DiagCode {
    // Lexer
    UnknownCharacter,
    NewlineInStringLiteral,
    WrongEscapeSequence,
    // Parser
    UnexpectedToken,
    // Semantic analysis
    VariableNotDefined,
    VariableRedefined,
    OperatorNotApplicable,
    WrongArgumentCount,
    WrongArgumentType,
    TriedToCallNonFunction,
    ConditionMustBeBoolean,
    IterableExpected,
    IntegerBoundaryExpected,
    NoSuchField,
    BadSubscriptIndexType,
    SubscriptAssignmentOnlyInArrays,
    FieldsOnlyAssignableInTuples,
    CannotAssignNamedFieldInTuple,
    CannotAssignIndexedFieldInTuple,
    ExitOutsideOfCycle,
    ReturnOutsideOfFunction,
    EvaluationException,
    DuplicateFieldNames,
    DuplicateParameterNames,
    NoneValueAccessed,
    CodeUnreachable,
    IfConditionAlwaysKnown,
    WhileConditionFalseAtStart,
    WhileConditionNotBoolAtStart,
    ExpressionStatementNoSideEffects,
    IntegerZeroDivisionWarning,
    VariableNeverUsed,
    AssignedValueUnused,
}

/// One structured compilation message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagCode,
    pub message: String,
    pub spans: SmallVec<[Span; 2]>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, code: DiagCode, message: impl Into<String>, spans: &[Span]) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            spans: SmallVec::from_slice(spans),
        }
    }

    #[must_use]
    pub fn error(code: DiagCode, message: impl Into<String>, spans: &[Span]) -> Self {
        Self::new(Severity::Error, code, message, spans)
    }

    #[must_use]
    pub fn warning(code: DiagCode, message: impl Into<String>, spans: &[Span]) -> Self {
        Self::new(Severity::Warning, code, message, spans)
    }

    /// Renders `[Severity] (Code) message`, plus source excerpts under every
    /// span when `opts.context` is set.
    pub fn write_to(&self, out: &mut String, file: &SourceFile, opts: &FormatOptions) {
        use std::fmt::Write as _;
        let _ = write!(out, "[{}] ({}) {}", self.severity, self.code, self.message);
        out.push('\n');
        if opts.context {
            for &span in &self.spans {
                file.write_pretty_excerpt(out, span, opts.width);
            }
        }
    }

    #[must_use]
    pub fn render(&self, file: &SourceFile, opts: &FormatOptions) -> String {
        let mut out = String::new();
        self.write_to(&mut out, file, opts);
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({}) {}", self.severity, self.code, self.message)
    }
}

/// Rendering options shared by all sinks.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Render source excerpts under each message.
    pub context: bool,
    /// Suggested width of excerpt windows.
    pub width: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { context: false, width: 80 }
    }
}

impl FormatOptions {
    #[must_use]
    pub fn with_context(self) -> Self {
        Self { context: true, ..self }
    }
}

/// Sink for compilation messages.
pub trait CompilationLog {
    fn log(&mut self, diagnostic: Diagnostic);
}

/// Stores messages for later inspection or rendering.
#[derive(Debug, Default)]
pub struct AccumulatingLog {
    messages: Vec<Diagnostic>,
}

impl AccumulatingLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[Diagnostic] {
        &self.messages
    }

    /// True when no message reaches `Error` severity.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.messages.iter().all(|m| m.severity < Severity::Error)
    }

    /// Renders all messages of at least `least` severity.
    #[must_use]
    pub fn render(&self, least: Severity, file: &SourceFile, opts: &FormatOptions) -> String {
        let mut out = String::new();
        for msg in &self.messages {
            if msg.severity >= least {
                msg.write_to(&mut out, file, opts);
            }
        }
        out
    }
}

impl CompilationLog for AccumulatingLog {
    fn log(&mut self, diagnostic: Diagnostic) {
        self.messages.push(diagnostic);
    }
}

/// Writes each message to an output as it arrives.
///
/// The writer needs the source file to render excerpts, so it borrows it for
/// its lifetime.
pub struct StreamingLog<'f, W: Write> {
    out: W,
    file: &'f SourceFile,
    min_severity: Severity,
    opts: FormatOptions,
}

impl<'f, W: Write> StreamingLog<'f, W> {
    pub fn new(out: W, file: &'f SourceFile, opts: FormatOptions) -> Self {
        Self {
            out,
            file,
            min_severity: Severity::Info,
            opts,
        }
    }

    #[must_use]
    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }
}

impl<W: Write> CompilationLog for StreamingLog<'_, W> {
    fn log(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity < self.min_severity {
            return;
        }
        let rendered = diagnostic.render(self.file, &self.opts);
        let _ = self.out.write_all(rendered.as_bytes());
    }
}

/// Forwards every message to each of the wrapped sinks.
pub struct FanoutLog<'a> {
    sinks: Vec<&'a mut dyn CompilationLog>,
}

impl<'a> FanoutLog<'a> {
    #[must_use]
    pub fn new(sinks: Vec<&'a mut dyn CompilationLog>) -> Self {
        Self { sinks }
    }
}

impl CompilationLog for FanoutLog<'_> {
    fn log(&mut self, diagnostic: Diagnostic) {
        for sink in &mut self.sinks {
            sink.log(diagnostic.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn accumulating_log_filters_by_severity() {
        let file = SourceFile::new("t.d", "print 1\n");
        let mut log = AccumulatingLog::new();
        log.log(Diagnostic::warning(DiagCode::CodeUnreachable, "w", &[Span::new(0, 5)]));
        log.log(Diagnostic::error(DiagCode::VariableNotDefined, "e", &[Span::new(0, 5)]));
        assert!(!log.is_clean());
        let errors_only = log.render(Severity::Error, &file, &FormatOptions::default());
        assert!(errors_only.contains("(VariableNotDefined)"));
        assert!(!errors_only.contains("(CodeUnreachable)"));
    }

    #[test]
    fn rendered_message_shape() {
        let d = Diagnostic::error(DiagCode::VariableRedefined, "Variable \"x\" is already defined", &[]);
        assert_eq!(d.to_string(), "[Error] (VariableRedefined) Variable \"x\" is already defined");
    }

    #[test]
    fn fanout_delivers_to_all_sinks() {
        let mut a = AccumulatingLog::new();
        let mut b = AccumulatingLog::new();
        {
            let mut fan = FanoutLog::new(vec![&mut a, &mut b]);
            fan.log(Diagnostic::warning(DiagCode::VariableNeverUsed, "w", &[]));
        }
        assert_eq!(a.messages().len(), 1);
        assert_eq!(b.messages().len(), 1);
    }
}
