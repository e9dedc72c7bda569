//! Source files and spans.
//!
//! Every token, AST node and diagnostic carries a [`Span`] — a half-open byte
//! range into the file it came from. [`SourceFile`] owns the text and a
//! precomputed table of line starts so spans can be mapped to line/column
//! pairs and rendered as excerpts under diagnostics.

use std::fmt::Write as _;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` into a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Self { start, end }
    }

    /// A zero-length span at the given position.
    #[must_use]
    pub fn point(pos: u32) -> Self {
        Self { start: pos, end: pos }
    }

    /// The zero span at the start of the file, used for synthesized nodes.
    #[must_use]
    pub fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    #[must_use]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A named source file with line/column mapping.
#[derive(Debug, Serialize, Deserialize)]
pub struct SourceFile {
    name: String,
    text: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(u32::try_from(i + 1).expect("source file larger than 4 GiB"));
            }
        }
        Self {
            name: name.into(),
            text,
            line_starts,
        }
    }

    #[must_use]
    pub fn new_rc(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self::new(name, text))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 0-based line index containing the byte position.
    #[must_use]
    pub fn line(&self, pos: u32) -> usize {
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(insertion) => insertion - 1,
        }
    }

    /// 0-based (line, column) of the byte position.
    #[must_use]
    pub fn line_col(&self, pos: u32) -> (usize, usize) {
        let line = self.line(pos);
        (line, (pos - self.line_starts[line]) as usize)
    }

    /// Byte position of a 0-based (line, column) pair.
    #[must_use]
    pub fn position(&self, line: usize, col: usize) -> u32 {
        self.line_starts[line] + u32::try_from(col).expect("column out of range")
    }

    /// The text of a 0-based line, without the trailing line feed.
    #[must_use]
    pub fn line_text(&self, line: usize) -> &str {
        let start = self.line_starts[line] as usize;
        let end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |&next| next as usize - 1);
        &self.text[start..end.max(start)]
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The raw text under a span.
    #[must_use]
    pub fn excerpt(&self, span: Span) -> &str {
        &self.text[span.start as usize..span.end as usize]
    }

    /// Renders `name:line:column` for the start of a span (line is 1-based).
    #[must_use]
    pub fn pretty_position(&self, span: Span) -> String {
        let (line, col) = self.line_col(span.start);
        format!("{}:{}:{}", self.name, line + 1, col)
    }

    /// Renders the source line under a span with a caret marker, capped to
    /// `width` columns around the marked region.
    ///
    /// ```text
    /// program.d:3:10
    ///     3: var x := y + 1
    ///                 ^
    /// ```
    pub fn write_pretty_excerpt(&self, out: &mut String, span: Span, width: usize) {
        let (line, col) = self.line_col(span.start);
        let text = self.line_text(line);
        let marker_len = (span.len() as usize).clamp(1, text.len().saturating_sub(col).max(1));

        // Window the line around the marker when it is wider than requested,
        // nudging the cut points onto character boundaries.
        let (window_start, window) = if text.len() <= width {
            (0, text)
        } else {
            let mut start = col.saturating_sub(width / 2).min(text.len().saturating_sub(width));
            while start > 0 && !text.is_char_boundary(start) {
                start -= 1;
            }
            let mut end = (start + width).min(text.len());
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
            (start, &text[start..end])
        };

        let _ = writeln!(out, "{}:{}:{}", self.name, line + 1, col);
        let prefix = format!("    {}: ", line + 1);
        let _ = writeln!(out, "{prefix}{window}");
        let pad = prefix.len() + col.saturating_sub(window_start);
        out.push_str(&" ".repeat(pad));
        out.push_str(&"^".repeat(marker_len.min(window.len().saturating_sub(col - window_start).max(1))));
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_mapping() {
        let file = SourceFile::new("t.d", "ab\ncd\n\nef");
        assert_eq!(file.line_col(0), (0, 0));
        assert_eq!(file.line_col(1), (0, 1));
        assert_eq!(file.line_col(3), (1, 0));
        assert_eq!(file.line_col(6), (2, 0));
        assert_eq!(file.line_col(7), (3, 0));
        assert_eq!(file.line_count(), 4);
    }

    #[test]
    fn line_text_drops_line_feed() {
        let file = SourceFile::new("t.d", "ab\ncd\n");
        assert_eq!(file.line_text(0), "ab");
        assert_eq!(file.line_text(1), "cd");
        assert_eq!(file.line_text(2), "");
    }

    #[test]
    fn position_round_trips() {
        let file = SourceFile::new("t.d", "one\ntwo\nthree");
        let pos = file.position(2, 1);
        assert_eq!(file.line_col(pos), (2, 1));
    }

    #[test]
    fn span_cover() {
        let a = Span::new(2, 5);
        let b = Span::new(4, 9);
        assert_eq!(a.cover(b), Span::new(2, 9));
        assert_eq!(b.cover(a), Span::new(2, 9));
    }
}
