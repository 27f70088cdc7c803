//! Byte ranges into a module's immutable source buffer

/// A byte range into a module's source buffer.
///
/// Spans never own text; the module that owns the buffer resolves a span back
/// to its text and to a line/column pair on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    offset: usize,
    len: usize,
}

impl Span {
    /// Creates a new span from a byte offset and length.
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// A zero-length span at a byte offset.
    pub fn empty(offset: usize) -> Self {
        Self { offset, len: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte covered by this span.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        let offset = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        Span {
            offset,
            len: end - offset,
        }
    }

    /// Resolves this span against the source buffer it was created from.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.offset..self.end().min(source.len())]
    }

    /// Computes the 1-based line and column of the span start.
    pub fn line_column(&self, source: &str) -> (usize, usize) {
        let mut line = 1;
        let mut column = 1;
        for b in source.as_bytes().iter().take(self.offset) {
            if *b == b'\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

/// Anything that covers a range of source text.
pub trait Spanned {
    fn span(&self) -> Span;
}

impl Spanned for Span {
    fn span(&self) -> Span {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_is_covering() {
        let a = Span::new(4, 3);
        let b = Span::new(10, 2);
        let joined = a.join(b);
        assert_eq!(joined.offset(), 4);
        assert_eq!(joined.end(), 12);
    }

    #[test]
    fn test_line_column() {
        let src = "ab\ncde\nf";
        assert_eq!(Span::new(0, 1).line_column(src), (1, 1));
        assert_eq!(Span::new(3, 1).line_column(src), (2, 1));
        assert_eq!(Span::new(5, 1).line_column(src), (2, 3));
        assert_eq!(Span::new(7, 1).line_column(src), (3, 1));
    }
}
