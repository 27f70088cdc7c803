//! A byte cursor over a NUL-terminated source buffer.

/// Scans a source buffer codeunit by codeunit.
///
/// The buffer must end in a single NUL sentinel one past the logical end of
/// the text; every lookahead clamps at the sentinel, so no read can run past
/// the buffer. Handing the cursor a buffer without the sentinel is a defect
/// in the loader and panics.
#[derive(Debug)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    #[track_caller]
    pub fn new(buffer: &'a [u8]) -> Self {
        if buffer.last() != Some(&0) {
            panic!("source buffer missing NUL sentinel");
        }
        Self {
            buffer,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// The index of the sentinel, i.e. the logical end of the text.
    pub fn end(&self) -> usize {
        self.buffer.len() - 1
    }

    /// The byte under the cursor; the sentinel once the end is reached.
    pub fn current(&self) -> u8 {
        self.buffer[self.pos.min(self.end())]
    }

    /// The byte before the cursor; the sentinel at the start of the buffer.
    pub fn previous(&self) -> u8 {
        if self.pos == 0 {
            0
        } else {
            self.buffer[(self.pos - 1).min(self.end())]
        }
    }

    /// Looks `n` bytes ahead, clamped at the sentinel.
    pub fn peek(&self, n: usize) -> u8 {
        self.buffer[(self.pos + n).min(self.end())]
    }

    /// Reads an absolute buffer index, clamped at the sentinel.
    pub fn byte(&self, index: usize) -> u8 {
        self.buffer[index.min(self.end())]
    }

    /// Steps over the current byte, tracking 1-based line/column.
    pub fn advance(&mut self) -> u8 {
        let byte = self.current();
        if self.pos < self.end() {
            self.pos += 1;
            if byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        byte
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.end()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_clamps_at_sentinel() {
        let buffer = b"ab\0";
        let cursor = Cursor::new(buffer);
        assert_eq!(cursor.current(), b'a');
        assert_eq!(cursor.peek(1), b'b');
        assert_eq!(cursor.peek(2), 0);
        assert_eq!(cursor.peek(100), 0);
    }

    #[test]
    fn test_line_column_tracking() {
        let buffer = b"a\nbc\0";
        let mut cursor = Cursor::new(buffer);
        assert_eq!((cursor.line(), cursor.column()), (1, 1));
        cursor.advance();
        cursor.advance();
        assert_eq!((cursor.line(), cursor.column()), (2, 1));
        cursor.advance();
        assert_eq!((cursor.line(), cursor.column()), (2, 2));
    }

    #[test]
    #[should_panic(expected = "NUL sentinel")]
    fn test_missing_sentinel_panics() {
        let _ = Cursor::new(b"ab");
    }
}
