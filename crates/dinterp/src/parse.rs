//! The parser: token stream to AST.
//!
//! Recursive descent with save/restore backtracking. Newlines separate
//! statements, but inside parentheses, brackets, braces and condition
//! positions they are ignored (the scanner position simply advances past
//! them while an ignore region is active).
//!
//! On failure the parser reports the rightmost position it could not get
//! past, together with everything it would have accepted there, as one
//! `UnexpectedToken` diagnostic.

use crate::ast::{
    Accessor, AccessorKind, Body, Expr, ExprKind, FuncBody, Ident, Postfix, PostfixKind, PrefixKind, PrefixOp,
    Reference, RelOp, Stmt, StmtKind, SumOp, TermOp, TupleElem, TypeId, VarDef,
};
use crate::lexer::{Token, TokenKind};
use crate::log::{CompilationLog, DiagCode, Diagnostic};
use crate::source::Span;
use crate::value::Value;

/// Parses a token stream into a program body.
///
/// Returns `None` when the program does not parse; the failure detail is on
/// the log.
pub fn parse(tokens: &[Token], log: &mut dyn CompilationLog) -> Option<Body> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        last_span: Span::empty(),
        eol_ignore: 0,
        rightmost: 0,
        expected: Vec::new(),
    };
    let body = parser.parse_body(&[]);
    let complete = body.is_some() && parser.eat(&TokenKind::Eof).is_some();
    if complete {
        body
    } else {
        parser.note("a statement");
        let at = parser.rightmost.min(tokens.len() - 1);
        let found = &tokens[at];
        let mut expected = parser.expected.clone();
        expected.sort_unstable();
        expected.dedup();
        log.log(Diagnostic::error(
            DiagCode::UnexpectedToken,
            format!("Expected {}, but found {}", expected.join(" or "), found.kind.describe()),
            &[found.span],
        ));
        None
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    last_span: Span,
    /// Depth of active ignore-newline regions.
    eol_ignore: u32,
    /// Rightmost token index a parse attempt failed at.
    rightmost: usize,
    /// Token descriptions acceptable at `rightmost`.
    expected: Vec<&'static str>,
}

impl<'t> Parser<'t> {
    fn skip_ignored(&mut self) {
        if self.eol_ignore > 0 {
            while matches!(self.tokens[self.pos].kind, TokenKind::NewLine) {
                self.pos += 1;
            }
        }
    }

    fn peek(&mut self) -> &'t Token {
        self.skip_ignored();
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> &'t Token {
        self.skip_ignored();
        let token = &self.tokens[self.pos];
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        self.last_span = token.span;
        token
    }

    /// Records that `what` would have been acceptable at the current
    /// position; rightmost position wins.
    fn note(&mut self, what: &'static str) {
        self.skip_ignored();
        if self.pos > self.rightmost {
            self.rightmost = self.pos;
            self.expected.clear();
        }
        if self.pos == self.rightmost {
            self.expected.push(what);
        }
    }

    /// Consumes the next token when it matches; payload-free kinds only.
    fn eat(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.peek().kind == *kind {
            Some(self.bump().span)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Option<Span> {
        let span = self.eat(kind);
        if span.is_none() {
            self.note(kind.describe());
        }
        span
    }

    fn eat_ident(&mut self) -> Option<Ident> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.bump().span;
            Some(Ident { span, name })
        } else {
            self.note("identifier");
            None
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokenKind::NewLine) {
            self.bump();
        }
    }

    fn with_ignored_eol<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.eol_ignore += 1;
        let result = f(self);
        self.eol_ignore -= 1;
        result
    }

    // ---- statements ----

    /// `{ Statement Sep }` until one of `stops` (or end of file).
    ///
    /// Newlines separate statements even when an enclosing bracket region is
    /// ignoring them (a `func … is … end` body inside call parentheses), so
    /// the ignore depth is suspended for the duration of the body.
    fn parse_body(&mut self, stops: &[TokenKind]) -> Option<Body> {
        let saved_ignore = std::mem::replace(&mut self.eol_ignore, 0);
        let body = self.parse_body_inner(stops);
        self.eol_ignore = saved_ignore;
        body
    }

    fn parse_body_inner(&mut self, stops: &[TokenKind]) -> Option<Body> {
        let start = self.peek().span;
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek().kind, TokenKind::NewLine | TokenKind::Semicolon) {
                self.bump();
            }
            let next = &self.peek().kind;
            if matches!(next, TokenKind::Eof) || stops.contains(next) {
                break;
            }
            statements.push(self.parse_stmt()?);
            let next = &self.peek().kind;
            if matches!(next, TokenKind::NewLine | TokenKind::Semicolon | TokenKind::Eof) || stops.contains(next) {
                continue;
            }
            self.note("end of statement");
            return None;
        }
        let span = statements
            .iter()
            .map(|s| s.span)
            .reduce(Span::cover)
            .unwrap_or(Span::point(start.start));
        Some(Body::new(span, statements))
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek().kind {
            TokenKind::Var => self.parse_var(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Loop => {
                let start = self.peek().span;
                let body = self.parse_loop_body()?;
                Some(Stmt {
                    span: start.cover(self.last_span),
                    kind: StmtKind::Loop { body },
                })
            }
            TokenKind::Exit => {
                let span = self.bump().span;
                Some(Stmt { span, kind: StmtKind::Exit })
            }
            TokenKind::Print => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            _ => {
                // An assignment when a reference followed by `:=` parses,
                // otherwise a bare expression statement.
                let save = self.pos;
                if let Some(target) = self.parse_reference()
                    && self.eat(&TokenKind::Assign).is_some()
                {
                    let value = self.parse_expr()?;
                    return Some(Stmt {
                        span: target.span.cover(value.span),
                        kind: StmtKind::Assign { target, value },
                    });
                }
                self.pos = save;
                let expr = self.parse_expr()?;
                Some(Stmt {
                    span: expr.span,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    /// `var [NL] name [:= expr] { , [NL] name [:= expr] }`
    fn parse_var(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Var)?;
        let mut defs = Vec::new();
        loop {
            self.skip_newlines();
            let name = self.eat_ident()?;
            let init = if self.eat(&TokenKind::Assign).is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            defs.push(VarDef { name, init });
            if self.eat(&TokenKind::Comma).is_none() {
                break;
            }
        }
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::Var(defs),
        })
    }

    /// `if cond [NL] then [NL] body [else [NL] body] end`
    /// or the short form `if cond [NL] => [NL] stmt`.
    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::If)?;
        let cond = self.with_ignored_eol(Self::parse_expr)?;
        self.skip_newlines();
        if self.eat(&TokenKind::Arrow).is_some() {
            self.skip_newlines();
            let then_stmt = Box::new(self.parse_stmt()?);
            return Some(Stmt {
                span: start.cover(self.last_span),
                kind: StmtKind::ShortIf { cond, then_stmt },
            });
        }
        self.expect(&TokenKind::Then)?;
        self.skip_newlines();
        let then_body = self.parse_body(&[TokenKind::Else, TokenKind::End])?;
        let else_body = if self.eat(&TokenKind::Else).is_some() {
            self.skip_newlines();
            Some(self.parse_body(&[TokenKind::End])?)
        } else {
            None
        };
        self.expect(&TokenKind::End)?;
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::If { cond, then_body, else_body },
        })
    }

    /// `while cond loop [NL] body end`
    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::While)?;
        let cond = self.with_ignored_eol(Self::parse_expr)?;
        self.skip_newlines();
        let body = self.parse_loop_body()?;
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::While { cond, body },
        })
    }

    /// `for [i in] start [.. end] [NL] loop [NL] body end`
    fn parse_for(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::For)?;
        let save = self.pos;
        let var = match self.eat_ident() {
            Some(ident) if self.eat(&TokenKind::In).is_some() => Some(ident),
            _ => {
                self.pos = save;
                None
            }
        };
        let start_or_list = self.with_ignored_eol(Self::parse_expr)?;
        let end = if self.eat(&TokenKind::Range).is_some() {
            Some(self.with_ignored_eol(Self::parse_expr)?)
        } else {
            None
        };
        self.skip_newlines();
        let body = self.parse_loop_body()?;
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::For { var, start_or_list, end, body },
        })
    }

    /// `loop [NL] body end`
    fn parse_loop_body(&mut self) -> Option<Body> {
        self.expect(&TokenKind::Loop)?;
        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(&TokenKind::End)?;
        Some(body)
    }

    /// `print [expr { , expr }]`
    fn parse_print(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Print)?;
        let mut exprs = Vec::new();
        if self.starts_expression() {
            exprs.push(self.parse_expr()?);
            while self.eat(&TokenKind::Comma).is_some() {
                exprs.push(self.parse_expr()?);
            }
        }
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::Print(exprs),
        })
    }

    /// `return [expr]`
    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.expect(&TokenKind::Return)?;
        let value = if self.starts_expression() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Some(Stmt {
            span: start.cover(self.last_span),
            kind: StmtKind::Return(value),
        })
    }

    /// Whether the next token can begin an expression.
    fn starts_expression(&mut self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Ident(_)
                | TokenKind::IntLiteral(_)
                | TokenKind::RealLiteral(_)
                | TokenKind::StrLiteral(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::None
                | TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::OpenBrace
                | TokenKind::Func
                | TokenKind::Not
                | TokenKind::Plus
                | TokenKind::Minus
        )
    }

    /// `ident { accessor }` — an assignment target.
    fn parse_reference(&mut self) -> Option<Reference> {
        let base = self.eat_ident()?;
        let mut accessors = Vec::new();
        while let Some(accessor) = self.try_accessor()? {
            accessors.push(accessor);
        }
        Some(Reference {
            span: base.span.cover(self.last_span),
            base,
            accessors,
        })
    }

    /// One `.name`, `.2`, `.(expr)` or `[expr]` step, when present.
    ///
    /// The outer `Option` is a hard failure; the inner one is "no accessor
    /// here".
    #[expect(clippy::option_option, reason = "failure vs absence are distinct outcomes")]
    fn try_accessor(&mut self) -> Option<Option<Accessor>> {
        if let Some(dot) = self.eat(&TokenKind::Dot) {
            let accessor = match &self.peek().kind {
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    let span = self.bump().span;
                    Accessor {
                        span: dot.cover(span),
                        kind: AccessorKind::Name(name),
                    }
                }
                TokenKind::IntLiteral(index) => {
                    let index = index.clone();
                    let span = self.bump().span;
                    Accessor {
                        span: dot.cover(span),
                        kind: AccessorKind::IntMember(index),
                    }
                }
                TokenKind::OpenParen => {
                    self.bump();
                    let expr = self.with_ignored_eol(Self::parse_expr)?;
                    let close = self.expect(&TokenKind::ClosedParen)?;
                    Accessor {
                        span: dot.cover(close),
                        kind: AccessorKind::ParenMember(Box::new(expr)),
                    }
                }
                _ => {
                    self.note("field name, slot number or '('");
                    return None;
                }
            };
            return Some(Some(accessor));
        }
        if let Some(open) = self.eat(&TokenKind::OpenBracket) {
            let expr = self.with_ignored_eol(Self::parse_expr)?;
            let close = self.expect(&TokenKind::ClosedBracket)?;
            return Some(Some(Accessor {
                span: open.cover(close),
                kind: AccessorKind::Subscript(Box::new(expr)),
            }));
        }
        Some(None)
    }

    // ---- expressions ----
    //
    // Precedence, loosest to tightest:
    //   xor | or | and | not | relations | sums | terms | unary

    fn parse_expr(&mut self) -> Option<Expr> {
        let first = self.parse_or()?;
        if !matches!(self.peek().kind, TokenKind::Xor) {
            return Some(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::Xor).is_some() {
            operands.push(self.parse_or()?);
        }
        Some(chain(operands, ExprKind::Xor))
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let first = self.parse_and()?;
        if !matches!(self.peek().kind, TokenKind::Or) {
            return Some(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::Or).is_some() {
            operands.push(self.parse_and()?);
        }
        Some(chain(operands, ExprKind::Or))
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let first = self.parse_not()?;
        if !matches!(self.peek().kind, TokenKind::And) {
            return Some(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::And).is_some() {
            operands.push(self.parse_not()?);
        }
        Some(chain(operands, ExprKind::And))
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if let Some(span) = self.eat(&TokenKind::Not) {
            let nested = self.parse_not()?;
            let span = span.cover(nested.span);
            return Some(Expr::new(span, ExprKind::Not(Box::new(nested))));
        }
        self.parse_relation()
    }

    fn rel_op(&mut self) -> Option<RelOp> {
        let op = match self.peek().kind {
            TokenKind::Less => RelOp::Less,
            TokenKind::LessEq => RelOp::LessEq,
            TokenKind::Greater => RelOp::Greater,
            TokenKind::GreaterEq => RelOp::GreaterEq,
            TokenKind::Equal => RelOp::Equal,
            TokenKind::NotEqual => RelOp::NotEqual,
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn parse_relation(&mut self) -> Option<Expr> {
        let first = self.parse_sum()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = self.rel_op() {
            ops.push(op);
            operands.push(self.parse_sum()?);
        }
        if ops.is_empty() {
            return operands.pop();
        }
        let span = operands
            .iter()
            .map(|e| e.span)
            .reduce(Span::cover)
            .expect("at least two operands");
        Some(Expr::new(span, ExprKind::Relation { operands, ops }))
    }

    fn parse_sum(&mut self) -> Option<Expr> {
        let first = self.parse_term()?;
        let mut terms = vec![first];
        let mut ops = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => SumOp::Plus,
                TokenKind::Minus => SumOp::Minus,
                _ => break,
            };
            self.bump();
            ops.push(op);
            terms.push(self.parse_term()?);
        }
        if ops.is_empty() {
            return terms.pop();
        }
        let span = terms.iter().map(|e| e.span).reduce(Span::cover).expect("operands");
        Some(Expr::new(span, ExprKind::Sum { terms, ops }))
    }

    fn parse_term(&mut self) -> Option<Expr> {
        let first = self.parse_unary()?;
        let mut factors = vec![first];
        let mut ops = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Times => TermOp::Times,
                TokenKind::Divide => TermOp::Divide,
                _ => break,
            };
            self.bump();
            ops.push(op);
            factors.push(self.parse_unary()?);
        }
        if ops.is_empty() {
            return factors.pop();
        }
        let span = factors.iter().map(|e| e.span).reduce(Span::cover).expect("operands");
        Some(Expr::new(span, ExprKind::Term { factors, ops }))
    }

    /// `{+|-} primary {call | accessor | is Type}`
    fn parse_unary(&mut self) -> Option<Expr> {
        let mut prefix = Vec::new();
        loop {
            let kind = match self.peek().kind {
                TokenKind::Plus => PrefixKind::Plus,
                TokenKind::Minus => PrefixKind::Minus,
                _ => break,
            };
            let span = self.bump().span;
            prefix.push(PrefixOp { span, kind });
        }
        let expr = self.parse_primary()?;
        let mut postfix = Vec::new();
        loop {
            if let Some(open) = self.eat(&TokenKind::OpenParen) {
                let mut args = Vec::new();
                let close = self.with_ignored_eol(|p| {
                    if !matches!(p.peek().kind, TokenKind::ClosedParen) {
                        args.push(p.parse_expr()?);
                        while p.eat(&TokenKind::Comma).is_some() {
                            args.push(p.parse_expr()?);
                        }
                    }
                    p.expect(&TokenKind::ClosedParen)
                })?;
                postfix.push(Postfix {
                    span: open.cover(close),
                    kind: PostfixKind::Call(args),
                });
                continue;
            }
            if let Some(span) = self.eat(&TokenKind::Is) {
                let type_id = self.parse_type_id()?;
                postfix.push(Postfix {
                    span: span.cover(self.last_span),
                    kind: PostfixKind::IsType(type_id),
                });
                continue;
            }
            match self.try_accessor()? {
                Some(accessor) => {
                    postfix.push(Postfix {
                        span: accessor.span,
                        kind: PostfixKind::Access(accessor),
                    });
                }
                None => break,
            }
        }
        if prefix.is_empty() && postfix.is_empty() {
            return Some(expr);
        }
        let mut span = expr.span;
        for p in &prefix {
            span = span.cover(p.span);
        }
        for p in &postfix {
            span = span.cover(p.span);
        }
        Some(Expr::new(
            span,
            ExprKind::Unary {
                prefix,
                expr: Box::new(expr),
                postfix,
            },
        ))
    }

    /// `int | real | string | bool | none | func | [] | {}`
    fn parse_type_id(&mut self) -> Option<TypeId> {
        let type_id = match self.peek().kind {
            TokenKind::Int => TypeId::Int,
            TokenKind::Real => TypeId::Real,
            TokenKind::String => TypeId::Str,
            TokenKind::Bool => TypeId::Bool,
            TokenKind::None => TypeId::None,
            TokenKind::Func => TypeId::Func,
            TokenKind::OpenBracket => {
                self.bump();
                self.expect(&TokenKind::ClosedBracket)?;
                return Some(TypeId::Array);
            }
            TokenKind::OpenBrace => {
                self.bump();
                self.expect(&TokenKind::ClosedBrace)?;
                return Some(TypeId::Tuple);
            }
            _ => {
                self.note("a type name");
                return None;
            }
        };
        self.bump();
        Some(type_id)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let token = self.peek();
        let span = token.span;
        match &token.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Some(Expr::new(span, ExprKind::Name(Ident { span, name })))
            }
            TokenKind::IntLiteral(value) => {
                let value = value.clone();
                self.bump();
                Some(Expr::literal(span, Value::Int(value)))
            }
            TokenKind::RealLiteral(value) => {
                let value = *value;
                self.bump();
                Some(Expr::literal(span, Value::Real(value)))
            }
            TokenKind::StrLiteral(value) => {
                let value = value.clone();
                self.bump();
                Some(Expr::literal(span, Value::str(value)))
            }
            TokenKind::True => {
                self.bump();
                Some(Expr::literal(span, Value::Bool(true)))
            }
            TokenKind::False => {
                self.bump();
                Some(Expr::literal(span, Value::Bool(false)))
            }
            TokenKind::None => {
                self.bump();
                Some(Expr::literal(span, Value::None))
            }
            TokenKind::OpenParen => {
                self.bump();
                let expr = self.with_ignored_eol(Self::parse_expr)?;
                self.expect(&TokenKind::ClosedParen)?;
                Some(expr)
            }
            TokenKind::OpenBracket => self.parse_array_literal(),
            TokenKind::OpenBrace => self.parse_tuple_literal(),
            TokenKind::Func => self.parse_func_literal(),
            _ => {
                self.note("expression");
                None
            }
        }
    }

    /// `[ expr { , expr } ]`
    fn parse_array_literal(&mut self) -> Option<Expr> {
        let open = self.expect(&TokenKind::OpenBracket)?;
        let mut items = Vec::new();
        let close = self.with_ignored_eol(|p| {
            if !matches!(p.peek().kind, TokenKind::ClosedBracket) {
                items.push(p.parse_expr()?);
                while p.eat(&TokenKind::Comma).is_some() {
                    items.push(p.parse_expr()?);
                }
            }
            p.expect(&TokenKind::ClosedBracket)
        })?;
        Some(Expr::new(open.cover(close), ExprKind::ArrayLit(items)))
    }

    /// `{ [name :=] expr { , [name :=] expr } }`
    fn parse_tuple_literal(&mut self) -> Option<Expr> {
        let open = self.expect(&TokenKind::OpenBrace)?;
        let mut elements = Vec::new();
        let close = self.with_ignored_eol(|p| {
            if !matches!(p.peek().kind, TokenKind::ClosedBrace) {
                elements.push(p.parse_tuple_element()?);
                while p.eat(&TokenKind::Comma).is_some() {
                    elements.push(p.parse_tuple_element()?);
                }
            }
            p.expect(&TokenKind::ClosedBrace)
        })?;
        Some(Expr::new(open.cover(close), ExprKind::TupleLit(elements)))
    }

    fn parse_tuple_element(&mut self) -> Option<TupleElem> {
        let save = self.pos;
        if let Some(name) = self.eat_ident()
            && self.eat(&TokenKind::Assign).is_some()
        {
            let value = self.parse_expr()?;
            return Some(TupleElem {
                span: name.span.cover(value.span),
                name: Some(name),
                value,
            });
        }
        self.pos = save;
        let value = self.parse_expr()?;
        Some(TupleElem {
            span: value.span,
            name: None,
            value,
        })
    }

    /// `func ( [name { , name }] ) ( => expr | is [NL] body end )`
    fn parse_func_literal(&mut self) -> Option<Expr> {
        let start = self.expect(&TokenKind::Func)?;
        self.expect(&TokenKind::OpenParen)?;
        let mut params = Vec::new();
        self.with_ignored_eol(|p| {
            if !matches!(p.peek().kind, TokenKind::ClosedParen) {
                params.push(p.eat_ident()?);
                while p.eat(&TokenKind::Comma).is_some() {
                    params.push(p.eat_ident()?);
                }
            }
            p.expect(&TokenKind::ClosedParen)
        })?;
        let body = if self.eat(&TokenKind::Arrow).is_some() {
            self.skip_newlines();
            FuncBody::Short(self.parse_expr()?)
        } else {
            self.expect(&TokenKind::Is)?;
            self.skip_newlines();
            let body = self.parse_body(&[TokenKind::End])?;
            self.expect(&TokenKind::End)?;
            FuncBody::Long(body)
        };
        Some(Expr::new(
            start.cover(self.last_span),
            ExprKind::FuncLit {
                params,
                body: std::rc::Rc::new(body),
            },
        ))
    }
}

/// Wraps a parsed operand chain, or returns the single operand unwrapped.
fn chain(operands: Vec<Expr>, build: impl FnOnce(Vec<Expr>) -> ExprKind) -> Expr {
    debug_assert!(operands.len() >= 2, "chain wraps two or more operands");
    let span = operands
        .iter()
        .map(|e| e.span)
        .reduce(Span::cover)
        .expect("non-empty operand chain");
    Expr::new(span, build(operands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::log::AccumulatingLog;
    use crate::source::SourceFile;

    fn parse_ok(text: &str) -> Body {
        let file = SourceFile::new("t.d", text);
        let mut log = AccumulatingLog::new();
        let tokens = tokenize(&file, &mut log).expect("lexes");
        parse(&tokens, &mut log).expect("parses")
    }

    fn parse_fail(text: &str) -> AccumulatingLog {
        let file = SourceFile::new("t.d", text);
        let mut log = AccumulatingLog::new();
        let tokens = tokenize(&file, &mut log).expect("lexes");
        assert!(parse(&tokens, &mut log).is_none());
        log
    }

    #[test]
    fn statement_kinds() {
        let body = parse_ok("var a := 1\nprint a\na := 2\nexit\nreturn a");
        assert_eq!(body.statements.len(), 5);
        assert!(matches!(body.statements[0].kind, StmtKind::Var(_)));
        assert!(matches!(body.statements[1].kind, StmtKind::Print(_)));
        assert!(matches!(body.statements[2].kind, StmtKind::Assign { .. }));
        assert!(matches!(body.statements[3].kind, StmtKind::Exit));
        assert!(matches!(body.statements[4].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn precedence_tower() {
        let body = parse_ok("print 1 + 2 * 3 < 4 and true or false xor true");
        let StmtKind::Print(exprs) = &body.statements[0].kind else {
            panic!("print statement");
        };
        let ExprKind::Xor(xor_operands) = &exprs[0].kind else {
            panic!("xor is loosest: {:?}", exprs[0].kind);
        };
        let ExprKind::Or(or_operands) = &xor_operands[0].kind else {
            panic!("or under xor");
        };
        let ExprKind::And(and_operands) = &or_operands[0].kind else {
            panic!("and under or");
        };
        let ExprKind::Relation { operands, ops } = &and_operands[0].kind else {
            panic!("relation under and");
        };
        assert_eq!(ops, &[RelOp::Less]);
        let ExprKind::Sum { terms, .. } = &operands[0].kind else {
            panic!("sum under relation");
        };
        assert!(matches!(terms[1].kind, ExprKind::Term { .. }));
    }

    #[test]
    fn not_binds_looser_than_relations() {
        let body = parse_ok("print not 1 = 2");
        let StmtKind::Print(exprs) = &body.statements[0].kind else {
            panic!("print statement");
        };
        let ExprKind::Not(inner) = &exprs[0].kind else {
            panic!("not on top");
        };
        assert!(matches!(inner.kind, ExprKind::Relation { .. }));
    }

    #[test]
    fn single_operands_stay_unwrapped() {
        let body = parse_ok("print 1");
        let StmtKind::Print(exprs) = &body.statements[0].kind else {
            panic!("print statement");
        };
        assert!(matches!(exprs[0].kind, ExprKind::Literal(_)));
    }

    #[test]
    fn if_then_else_and_short_if() {
        let body = parse_ok("if a then print 1 else print 2 end\nif a => print 3");
        assert!(matches!(
            body.statements[0].kind,
            StmtKind::If { else_body: Some(_), .. }
        ));
        assert!(matches!(body.statements[1].kind, StmtKind::ShortIf { .. }));
    }

    #[test]
    fn loops() {
        let body = parse_ok("while a loop exit end\nfor i in 1..9 loop end\nfor xs loop end\nloop exit end");
        assert!(matches!(body.statements[0].kind, StmtKind::While { .. }));
        assert!(matches!(
            body.statements[1].kind,
            StmtKind::For { var: Some(_), end: Some(_), .. }
        ));
        assert!(matches!(
            body.statements[2].kind,
            StmtKind::For { var: None, end: None, .. }
        ));
        assert!(matches!(body.statements[3].kind, StmtKind::Loop { .. }));
    }

    #[test]
    fn accessor_chains_in_assignment_targets() {
        let body = parse_ok("a.b[1].(i + 1) := 2");
        let StmtKind::Assign { target, .. } = &body.statements[0].kind else {
            panic!("assignment");
        };
        assert_eq!(target.base.name, "a");
        assert_eq!(target.accessors.len(), 3);
        assert!(matches!(target.accessors[0].kind, AccessorKind::Name(_)));
        assert!(matches!(target.accessors[1].kind, AccessorKind::Subscript(_)));
        assert!(matches!(target.accessors[2].kind, AccessorKind::ParenMember(_)));
    }

    #[test]
    fn postfix_calls_and_typechecks() {
        let body = parse_ok("print f(1, 2).x is int");
        let StmtKind::Print(exprs) = &body.statements[0].kind else {
            panic!("print statement");
        };
        let ExprKind::Unary { prefix, postfix, .. } = &exprs[0].kind else {
            panic!("unary chain");
        };
        assert!(prefix.is_empty());
        assert!(matches!(postfix[0].kind, PostfixKind::Call(_)));
        assert!(matches!(postfix[1].kind, PostfixKind::Access(_)));
        assert!(matches!(postfix[2].kind, PostfixKind::IsType(TypeId::Int)));
    }

    #[test]
    fn array_and_tuple_type_ids() {
        let body = parse_ok("print a is [], b is {}");
        let StmtKind::Print(exprs) = &body.statements[0].kind else {
            panic!("print statement");
        };
        let ExprKind::Unary { postfix, .. } = &exprs[0].kind else {
            panic!("unary");
        };
        assert!(matches!(postfix[0].kind, PostfixKind::IsType(TypeId::Array)));
        let ExprKind::Unary { postfix, .. } = &exprs[1].kind else {
            panic!("unary");
        };
        assert!(matches!(postfix[0].kind, PostfixKind::IsType(TypeId::Tuple)));
    }

    #[test]
    fn newlines_ignored_inside_brackets() {
        let body = parse_ok("var a := [\n1,\n2\n]\nvar t := {\nx := 1\n}");
        assert_eq!(body.statements.len(), 2);
    }

    #[test]
    fn func_literal_forms() {
        let body = parse_ok("var f := func(a, b) => a + b\nvar g := func() is\nreturn 1\nend");
        let StmtKind::Var(defs) = &body.statements[0].kind else {
            panic!("var");
        };
        let Some(Expr { kind: ExprKind::FuncLit { params, body }, .. }) = &defs[0].init else {
            panic!("func literal");
        };
        assert_eq!(params.len(), 2);
        assert!(matches!(**body, FuncBody::Short(_)));
    }

    #[test]
    fn unexpected_token_is_reported() {
        let log = parse_fail("if then end");
        assert!(log.messages().iter().any(|m| m.code == DiagCode::UnexpectedToken));
    }

    #[test]
    fn separators_required_between_statements() {
        let log = parse_fail("print 1 print 2");
        assert!(log.messages().iter().any(|m| m.code == DiagCode::UnexpectedToken));
    }
}
