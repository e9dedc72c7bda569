//! The abstract syntax tree.
//!
//! Owned trees: every node holds its children directly (`Box`/`Vec`), so the
//! analyzer can rewrite sub-trees in place instead of juggling shared
//! handles. Every node carries a [`Span`].
//!
//! Two expression forms never come out of the parser — the analyzer
//! introduces them while rewriting: [`ExprKind::Literal`] carries a
//! precomputed runtime value, and [`ExprKind::Closure`] is the analyzed form
//! of a `func` literal with its captured-name list and static signature.

use std::rc::Rc;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::source::Span;
use crate::types::FuncType;
use crate::value::Value;

/// A sequence of statements with its own lexical scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub span: Span,
    pub statements: Vec<Stmt>,
}

impl Body {
    #[must_use]
    pub fn new(span: Span, statements: Vec<Stmt>) -> Self {
        Self { span, statements }
    }
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub span: Span,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub span: Span,
    pub kind: StmtKind,
}

/// One `name [:= init]` entry of a `var` statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDef {
    pub name: Ident,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `var a := 1, b, c := f()`
    Var(Vec<VarDef>),
    /// `if cond then … [else …] end`
    If {
        cond: Expr,
        then_body: Body,
        else_body: Option<Body>,
    },
    /// `if cond => stmt` — desugared by the analyzer into [`StmtKind::If`].
    ShortIf { cond: Expr, then_stmt: Box<Stmt> },
    /// `while cond loop … end`
    While { cond: Expr, body: Body },
    /// `for [i in] start [.. end] loop … end`
    For {
        var: Option<Ident>,
        start_or_list: Expr,
        end: Option<Expr>,
        body: Body,
    },
    /// `loop … end`
    Loop { body: Body },
    /// `exit`
    Exit,
    /// `target := value` where the target may be an accessor chain.
    Assign { target: Reference, value: Expr },
    /// `print a, b, c`
    Print(Vec<Expr>),
    /// `return [expr]`
    Return(Option<Expr>),
    /// A bare expression evaluated for its effects.
    Expr(Expr),
    /// An already-analyzed statement block spliced in by the analyzer when a
    /// statically-known `if` collapses to one of its branches.
    Block(Body),
}

/// An assignment target: a base name followed by accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub span: Span,
    pub base: Ident,
    pub accessors: Vec<Accessor>,
}

/// A single `.name`, `.2`, `.(expr)` or `[expr]` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessor {
    pub span: Span,
    pub kind: AccessorKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessorKind {
    /// `.name`
    Name(String),
    /// `.2` — a 1-based tuple slot.
    IntMember(BigInt),
    /// `.(expr)`
    ParenMember(Box<Expr>),
    /// `[expr]`
    Subscript(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
}

impl RelOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Equal => "=",
            Self::NotEqual => "/=",
        }
    }

    /// `=` and `/=` check equality; the rest need an ordering.
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SumOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermOp {
    Times,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixKind {
    Plus,
    Minus,
}

/// A `+`/`-` sign in front of a unary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixOp {
    pub span: Span,
    pub kind: PrefixKind,
}

/// The type names usable after `is`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeId {
    Int,
    Real,
    Str,
    Bool,
    None,
    Func,
    Array,
    Tuple,
}

/// A postfix operation on a unary expression.
///
/// Application order is by tightness: calls and accessors first, then
/// prefix signs, then `is` typechecks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postfix {
    pub span: Span,
    pub kind: PostfixKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PostfixKind {
    Call(Vec<Expr>),
    Access(Accessor),
    IsType(TypeId),
}

impl Postfix {
    /// The lower the number, the tighter the operation binds.
    #[must_use]
    pub fn tightness(&self) -> u8 {
        match self.kind {
            PostfixKind::Call(_) | PostfixKind::Access(_) => 1,
            PostfixKind::IsType(_) => 3,
        }
    }
}

/// A function body: `=> expr` or `is … end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FuncBody {
    Short(Expr),
    Long(Body),
}

/// The analyzed form of a `func` literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureDef {
    pub func_type: Rc<FuncType>,
    pub params: Vec<String>,
    /// Names free in the body that are bound in an enclosing scope; the
    /// executor snapshots their values at closure-creation time.
    pub captured: Vec<String>,
    pub body: Rc<FuncBody>,
}

/// One `[name :=] expr` element of a tuple literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleElem {
    pub span: Span,
    pub name: Option<Ident>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// `a xor b xor c` — n-ary, never short-circuits.
    Xor(Vec<Expr>),
    /// `a or b or c` — n-ary, short-circuits.
    Or(Vec<Expr>),
    /// `a and b and c` — n-ary, short-circuits.
    And(Vec<Expr>),
    /// `a < b <= c` — the AND of pairwise comparisons; `ops.len() ==
    /// operands.len() - 1`.
    Relation { operands: Vec<Expr>, ops: Vec<RelOp> },
    /// `a + b - c`; `ops.len() == terms.len() - 1`.
    Sum { terms: Vec<Expr>, ops: Vec<SumOp> },
    /// `a * b / c`; `ops.len() == factors.len() - 1`.
    Term { factors: Vec<Expr>, ops: Vec<TermOp> },
    /// `not expr`
    Not(Box<Expr>),
    /// `{prefix} primary {postfix}` — signs, calls, accessors, typechecks.
    Unary {
        prefix: Vec<PrefixOp>,
        expr: Box<Expr>,
        postfix: Vec<Postfix>,
    },
    /// A name read.
    Name(Ident),
    /// `[ a, b, c ]`
    ArrayLit(Vec<Expr>),
    /// `{ a := 1, 2, b := 3 }`
    TupleLit(Vec<TupleElem>),
    /// `func (a, b) => expr` or `func (a, b) is … end`
    FuncLit { params: Vec<Ident>, body: Rc<FuncBody> },
    /// A literal or analyzer-precomputed value. The parser only produces
    /// immutable kinds here; the analyzer keeps it that way (arrays and
    /// tuples are never collapsed into a shared literal).
    Literal(Value),
    /// Analyzer-rewritten `func` literal.
    Closure(ClosureDef),
}

impl Expr {
    #[must_use]
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    /// A literal node carrying a precomputed value.
    #[must_use]
    pub fn literal(span: Span, value: Value) -> Self {
        Self::new(span, ExprKind::Literal(value))
    }
}
