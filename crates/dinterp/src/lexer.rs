//! The lexer: source text to a token stream.
//!
//! Produces `Some(tokens)` ending with an [`TokenKind::Eof`] token, or `None`
//! when the text contains lexical errors; the errors themselves go to the
//! compilation log. Newlines are tokens (they separate statements), other
//! whitespace is skipped, `//` comments run to the end of the line and a
//! leading `#!` line is ignored.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::log::{CompilationLog, DiagCode, Diagnostic};
use crate::source::{SourceFile, Span};

/// One lexical token with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Punctuation
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Equal,
    NotEqual,
    Plus,
    Minus,
    Times,
    Divide,
    Assign,
    OpenBracket,
    ClosedBracket,
    OpenParen,
    ClosedParen,
    OpenBrace,
    ClosedBrace,
    Semicolon,
    Comma,
    Dot,
    Range,
    Arrow,
    NewLine,
    // Keywords
    Var,
    While,
    For,
    If,
    Then,
    Else,
    End,
    Loop,
    In,
    Exit,
    Print,
    Return,
    Func,
    Is,
    And,
    Or,
    Xor,
    Not,
    Int,
    Real,
    Bool,
    String,
    None,
    True,
    False,
    // Payload-carrying tokens
    IntLiteral(BigInt),
    RealLiteral(f64),
    StrLiteral(std::string::String),
    Ident(std::string::String),
    /// Always the last token of the stream.
    Eof,
}

impl TokenKind {
    /// Short human-readable name used in parser error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Greater => "'>'",
            Self::GreaterEq => "'>='",
            Self::Less => "'<'",
            Self::LessEq => "'<='",
            Self::Equal => "'='",
            Self::NotEqual => "'/='",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Times => "'*'",
            Self::Divide => "'/'",
            Self::Assign => "':='",
            Self::OpenBracket => "'['",
            Self::ClosedBracket => "']'",
            Self::OpenParen => "'('",
            Self::ClosedParen => "')'",
            Self::OpenBrace => "'{'",
            Self::ClosedBrace => "'}'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::Range => "'..'",
            Self::Arrow => "'=>'",
            Self::NewLine => "end of line",
            Self::Var => "'var'",
            Self::While => "'while'",
            Self::For => "'for'",
            Self::If => "'if'",
            Self::Then => "'then'",
            Self::Else => "'else'",
            Self::End => "'end'",
            Self::Loop => "'loop'",
            Self::In => "'in'",
            Self::Exit => "'exit'",
            Self::Print => "'print'",
            Self::Return => "'return'",
            Self::Func => "'func'",
            Self::Is => "'is'",
            Self::And => "'and'",
            Self::Or => "'or'",
            Self::Xor => "'xor'",
            Self::Not => "'not'",
            Self::Int => "'int'",
            Self::Real => "'real'",
            Self::Bool => "'bool'",
            Self::String => "'string'",
            Self::None => "'none'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::IntLiteral(_) => "integer literal",
            Self::RealLiteral(_) => "real literal",
            Self::StrLiteral(_) => "string literal",
            Self::Ident(_) => "identifier",
            Self::Eof => "end of file",
        }
    }
}

fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "var" => TokenKind::Var,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "else" => TokenKind::Else,
        "end" => TokenKind::End,
        "loop" => TokenKind::Loop,
        "in" => TokenKind::In,
        "exit" => TokenKind::Exit,
        "print" => TokenKind::Print,
        "return" => TokenKind::Return,
        "func" => TokenKind::Func,
        "is" => TokenKind::Is,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "xor" => TokenKind::Xor,
        "not" => TokenKind::Not,
        "int" => TokenKind::Int,
        "real" => TokenKind::Real,
        "bool" => TokenKind::Bool,
        "string" => TokenKind::String,
        "none" => TokenKind::None,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    })
}

/// Fixed tokens, longest first so that `:=` wins over `:` failing, `..` over
/// `.`, and `<=` over `<`.
const PUNCTUATION: &[(&str, TokenKind)] = &[
    (":=", TokenKind::Assign),
    ("..", TokenKind::Range),
    ("=>", TokenKind::Arrow),
    ("<=", TokenKind::LessEq),
    (">=", TokenKind::GreaterEq),
    ("/=", TokenKind::NotEqual),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("=", TokenKind::Equal),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Times),
    ("/", TokenKind::Divide),
    ("[", TokenKind::OpenBracket),
    ("]", TokenKind::ClosedBracket),
    ("(", TokenKind::OpenParen),
    (")", TokenKind::ClosedParen),
    ("{", TokenKind::OpenBrace),
    ("}", TokenKind::ClosedBrace),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
];

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    failed: bool,
}

impl Lexer<'_> {
    fn span_from(&self, start: usize) -> Span {
        Span::new(start as u32, self.pos as u32)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = self.span_from(start);
        self.tokens.push(Token { kind, span });
    }

    fn skip_line(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn scan_string(&mut self, log: &mut dyn CompilationLog) {
        let start = self.pos;
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            match self.bytes.get(self.pos) {
                Option::None | Some(b'\n') => {
                    self.failed = true;
                    log.log(Diagnostic::error(
                        DiagCode::NewlineInStringLiteral,
                        "The string literal is not closed before the end of the line",
                        &[self.span_from(start)],
                    ));
                    return;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    let esc_start = self.pos;
                    self.pos += 1;
                    let escaped = match self.bytes.get(self.pos) {
                        Some(b'n') => Some(b'\n'),
                        Some(b't') => Some(b'\t'),
                        Some(b'r') => Some(b'\r'),
                        Some(b'0') => Some(b'\0'),
                        Some(b'\\') => Some(b'\\'),
                        Some(b'"') => Some(b'"'),
                        _ => Option::None,
                    };
                    match escaped {
                        Some(b) => {
                            value.push(b);
                            self.pos += 1;
                        }
                        Option::None => {
                            self.failed = true;
                            let bad = self.bytes.get(self.pos).map_or_else(
                                || "\\".to_owned(),
                                |&b| format!("\\{}", char::from(b)),
                            );
                            self.pos = (self.pos + 1).min(self.bytes.len());
                            log.log(Diagnostic::error(
                                DiagCode::WrongEscapeSequence,
                                format!("Unknown escape sequence \"{bad}\" in a string literal"),
                                &[Span::new(esc_start as u32, self.pos as u32)],
                            ));
                        }
                    }
                }
                Some(&b) => {
                    value.push(b);
                    self.pos += 1;
                }
            }
        }
        let text = std::string::String::from_utf8(value).unwrap_or_default();
        self.push(TokenKind::StrLiteral(text), start);
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        // A '.' begins a fraction only when a digit follows, so `1..5`
        // stays an integer range.
        let is_real = self.bytes.get(self.pos) == Some(&b'.')
            && self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit);
        if is_real {
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("digits are ascii");
            let value: f64 = text.parse().expect("digits with one dot parse as f64");
            self.push(TokenKind::RealLiteral(value), start);
        } else {
            let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("digits are ascii");
            let value: BigInt = text.parse().expect("digit run parses as BigInt");
            self.push(TokenKind::IntLiteral(value), start);
        }
    }

    fn scan_ident(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).expect("identifier is ascii");
        match keyword(text) {
            Some(kind) => self.push(kind, start),
            Option::None => self.push(TokenKind::Ident(text.to_owned()), start),
        }
    }

    fn scan_punctuation(&mut self) -> bool {
        for (text, kind) in PUNCTUATION {
            if self.bytes[self.pos..].starts_with(text.as_bytes()) {
                let start = self.pos;
                self.pos += text.len();
                self.push(kind.clone(), start);
                return true;
            }
        }
        false
    }
}

/// Tokenizes a source file.
///
/// Returns `None` when any lexical error was logged; the scan still continues
/// to the end of the file so that several errors can be reported at once.
pub fn tokenize(file: &SourceFile, log: &mut dyn CompilationLog) -> Option<Vec<Token>> {
    let mut lx = Lexer {
        bytes: file.text().as_bytes(),
        pos: 0,
        tokens: Vec::new(),
        failed: false,
    };
    if lx.bytes.starts_with(b"#!") {
        lx.skip_line();
    }
    while lx.pos < lx.bytes.len() {
        let b = lx.bytes[lx.pos];
        match b {
            b' ' | b'\t' | b'\r' => lx.pos += 1,
            b'\n' => {
                let start = lx.pos;
                lx.pos += 1;
                lx.push(TokenKind::NewLine, start);
            }
            b'/' if lx.bytes.get(lx.pos + 1) == Some(&b'/') => lx.skip_line(),
            b'"' => lx.scan_string(log),
            b'0'..=b'9' => lx.scan_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => lx.scan_ident(),
            _ => {
                if !lx.scan_punctuation() {
                    lx.failed = true;
                    let start = lx.pos;
                    // Advance over the whole UTF-8 character, not just one byte.
                    let ch = file.text()[lx.pos..].chars().next().expect("in-bounds position");
                    lx.pos += ch.len_utf8();
                    log.log(Diagnostic::error(
                        DiagCode::UnknownCharacter,
                        format!("Unknown character: {ch:?}"),
                        &[Span::new(start as u32, lx.pos as u32)],
                    ));
                }
            }
        }
    }
    let eof = Span::point(lx.pos as u32);
    lx.tokens.push(Token { kind: TokenKind::Eof, span: eof });
    if lx.failed { None } else { Some(lx.tokens) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::AccumulatingLog;

    fn lex(text: &str) -> Vec<TokenKind> {
        let file = SourceFile::new("t.d", text);
        let mut log = AccumulatingLog::new();
        tokenize(&file, &mut log)
            .expect("clean input")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(text: &str) -> AccumulatingLog {
        let file = SourceFile::new("t.d", text);
        let mut log = AccumulatingLog::new();
        assert!(tokenize(&file, &mut log).is_none());
        log
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            lex("var iffy if"),
            vec![
                TokenKind::Var,
                TokenKind::Ident("iffy".into()),
                TokenKind::If,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn range_is_not_a_real() {
        assert_eq!(
            lex("1..5"),
            vec![
                TokenKind::IntLiteral(BigInt::from(1)),
                TokenKind::Range,
                TokenKind::IntLiteral(BigInt::from(5)),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn real_literals() {
        assert_eq!(
            lex("12.25"),
            vec![TokenKind::RealLiteral(12.25), TokenKind::Eof]
        );
    }

    #[test]
    fn big_integer_literal() {
        let big = "1".to_owned() + &"0".repeat(40);
        assert_eq!(
            lex(&big),
            vec![TokenKind::IntLiteral(big.parse().unwrap()), TokenKind::Eof]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex(r#""a\n\t\"b\\""#),
            vec![TokenKind::StrLiteral("a\n\t\"b\\".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn longest_match_punctuation() {
        assert_eq!(
            lex("a := b <= c /= d => e"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Assign,
                TokenKind::Ident("b".into()),
                TokenKind::LessEq,
                TokenKind::Ident("c".into()),
                TokenKind::NotEqual,
                TokenKind::Ident("d".into()),
                TokenKind::Arrow,
                TokenKind::Ident("e".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_and_shebang() {
        assert_eq!(
            lex("#!/usr/bin/env dinterp\nprint 1 // trailing\n"),
            vec![
                TokenKind::NewLine,
                TokenKind::Print,
                TokenKind::IntLiteral(BigInt::from(1)),
                TokenKind::NewLine,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn newline_in_string_is_an_error() {
        let log = lex_err("\"abc\ndef\"");
        assert!(log.messages().iter().any(|m| m.code == DiagCode::NewlineInStringLiteral));
    }

    #[test]
    fn bad_escape_is_an_error() {
        let log = lex_err(r#""a\qb""#);
        assert!(log.messages().iter().any(|m| m.code == DiagCode::WrongEscapeSequence));
    }

    #[test]
    fn unknown_character_is_an_error() {
        let log = lex_err("print 1 @");
        assert!(log.messages().iter().any(|m| m.code == DiagCode::UnknownCharacter));
    }
}
