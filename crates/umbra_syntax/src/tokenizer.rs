//! Converts source text into a token stream.
//!
//! The tokenizer is error tolerant: lexical problems become dedicated error
//! token kinds and a diagnostic, never an early exit, so a single run
//! surfaces every lexical problem in a file. `ok` is decided only after the
//! whole buffer has been scanned.

use crate::cursor::Cursor;
use tracing::trace;
use umbra_tokens::{Diagnostic, DiagnosticSink, Spacing, Span, Spanned, Token, TokenKind};

/// What a grouping-stack entry was opened by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupingKind {
    /// an ordinary grouping token
    Token(TokenKind),
    /// a string-interpolation splice; closing `}` re-enters string scanning
    Interpolation,
}

/// A grouping-stack entry: what was opened, and which token opened it.
#[derive(Debug)]
struct Grouping {
    kind: GroupingKind,
    token_index: usize,
}

/// Tokenizes a NUL-terminated source buffer.
///
/// Returns the token stream and whether the stream is free of lexical errors.
pub fn tokenize(buffer: &[u8], module: &str, sink: &dyn DiagnosticSink) -> (Vec<Token>, bool) {
    Tokenizer::new(buffer, module, sink).run()
}

struct Tokenizer<'a> {
    cursor: Cursor<'a>,
    module: &'a str,
    sink: &'a dyn DiagnosticSink,
    tokens: Vec<Token>,
    groupings: Vec<Grouping>,
    ok: bool,
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_identifier_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

impl<'a> Tokenizer<'a> {
    fn new(buffer: &'a [u8], module: &'a str, sink: &'a dyn DiagnosticSink) -> Self {
        Self {
            cursor: Cursor::new(buffer),
            module,
            sink,
            tokens: Vec::new(),
            groupings: Vec::new(),
            ok: true,
        }
    }

    fn run(mut self) -> (Vec<Token>, bool) {
        loop {
            self.skip_blank();
            if self.cursor.at_end() {
                break;
            }
            self.scan_token();
        }
        self.finish_groupings();
        trace!(
            "tokenized {} with {} tokens, ok={}",
            self.module,
            self.tokens.len(),
            self.ok
        );
        (self.tokens, self.ok)
    }

    fn skip_blank(&mut self) {
        loop {
            let c = self.cursor.current();
            if is_blank(c) {
                self.cursor.advance();
            } else if c == b'#' {
                // line comment
                while !self.cursor.at_end() && self.cursor.current() != b'\n' {
                    self.cursor.advance();
                }
            } else {
                break;
            }
        }
    }

    fn error(&mut self, message: String, span: Span) {
        self.ok = false;
        self.sink.report(
            Diagnostic::error(message)
                .with_span(span)
                .with_module(self.module),
        );
    }

    /// Pushes a token covering `start` to the cursor, computing its spacing
    /// from the bytes on either side.
    fn push_token(&mut self, kind: TokenKind, start: usize, line: usize, column: usize) {
        let before = start == 0 || is_blank(self.cursor.byte(start - 1));
        let after = self.cursor.at_end() || is_blank(self.cursor.current());
        let span = Span::new(start, self.cursor.pos() - start);
        self.tokens.push(Token::new(
            kind,
            span,
            line,
            column,
            Spacing::from_sides(before, after),
        ));
    }

    fn scan_token(&mut self) {
        let start = self.cursor.pos();
        let line = self.cursor.line();
        let column = self.cursor.column();
        let c = self.cursor.current();

        if is_identifier_start(c) {
            self.scan_identifier(start, line, column);
        } else if c.is_ascii_digit() {
            self.scan_number(start, line, column);
        } else if c == b'"' {
            self.scan_string(false);
        } else if c == b'\'' {
            self.scan_codeunit(start, line, column);
        } else if c == b'}'
            && matches!(
                self.groupings.last(),
                Some(Grouping {
                    kind: GroupingKind::Interpolation,
                    ..
                })
            )
        {
            self.groupings.pop();
            self.scan_string(true);
        } else {
            self.scan_operator(start, line, column);
        }
    }

    fn scan_identifier(&mut self, start: usize, line: usize, column: usize) {
        let mut text = Vec::new();
        while is_identifier_continue(self.cursor.current()) {
            text.push(self.cursor.advance());
        }
        let text = String::from_utf8_lossy(&text).into_owned();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        self.push_token(kind, start, line, column);
    }

    fn scan_number(&mut self, start: usize, line: usize, column: usize) {
        while self.cursor.current().is_ascii_digit() || self.cursor.current() == b'_' {
            self.cursor.advance();
        }
        let c = self.cursor.current();
        if c == b'x' && self.cursor.peek(1).is_ascii_alphanumeric() {
            // explicit-base literal: the value is parsed later through
            // parse_numeric, which also reports zero/oversized bases
            self.cursor.advance();
            while self.cursor.current().is_ascii_alphanumeric() || self.cursor.current() == b'_' {
                self.cursor.advance();
            }
            self.push_token(TokenKind::Integer, start, line, column);
        } else if c == b'.' && self.cursor.peek(1).is_ascii_digit() {
            self.cursor.advance();
            while self.cursor.current().is_ascii_digit() || self.cursor.current() == b'_' {
                self.cursor.advance();
            }
            if matches!(self.cursor.current(), b'e' | b'E') {
                self.cursor.advance();
                if matches!(self.cursor.current(), b'+' | b'-') {
                    self.cursor.advance();
                }
                while self.cursor.current().is_ascii_digit() {
                    self.cursor.advance();
                }
            }
            self.push_token(TokenKind::Real, start, line, column);
        } else {
            self.push_token(TokenKind::Integer, start, line, column);
        }
    }

    /// Scans one fragment of a quoted string.
    ///
    /// Entered either at the opening quote or, for `continuation`, at the `}`
    /// closing an interpolation splice. Ends at the closing quote, at the `{`
    /// opening the next splice, or with an error token at end of line/input.
    fn scan_string(&mut self, continuation: bool) {
        let start = self.cursor.pos();
        let line = self.cursor.line();
        let column = self.cursor.column();
        self.cursor.advance(); // the `"` or `}`
        let mut error_kind = None;
        loop {
            match self.cursor.current() {
                0 | b'\n' => {
                    let span = Span::new(start, self.cursor.pos() - start);
                    self.error("unterminated string literal".to_string(), span);
                    self.push_token(TokenKind::ErrorUnterminatedString, start, line, column);
                    return;
                }
                b'"' => {
                    self.cursor.advance();
                    let kind = error_kind.unwrap_or(if continuation {
                        TokenKind::StringRight
                    } else {
                        TokenKind::String
                    });
                    self.push_token(kind, start, line, column);
                    return;
                }
                b'{' => {
                    self.cursor.advance();
                    let kind = error_kind.unwrap_or(if continuation {
                        TokenKind::StringMiddle
                    } else {
                        TokenKind::StringLeft
                    });
                    self.push_token(kind, start, line, column);
                    self.groupings.push(Grouping {
                        kind: GroupingKind::Interpolation,
                        token_index: self.tokens.len() - 1,
                    });
                    return;
                }
                b'\\' => {
                    if let Some(kind) = self.scan_escape() {
                        error_kind.get_or_insert(kind);
                    }
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
    }

    /// Consumes one escape sequence; returns an error token kind when it is
    /// invalid.
    fn scan_escape(&mut self) -> Option<TokenKind> {
        let escape_start = self.cursor.pos();
        self.cursor.advance(); // the backslash
        match self.cursor.current() {
            b'n' | b't' | b'r' | b'0' | b'\\' | b'"' | b'\'' | b'{' | b'}' => {
                self.cursor.advance();
                None
            }
            // escaped newline: the literal continues on the next line
            b'\n' => {
                self.cursor.advance();
                None
            }
            b'x' => {
                self.cursor.advance();
                let hi = self.cursor.current();
                let lo = self.cursor.peek(1);
                if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                    self.cursor.advance();
                    self.cursor.advance();
                    None
                } else {
                    let span = Span::new(escape_start, self.cursor.pos() - escape_start);
                    self.error("numeric escape requires two hex digits".to_string(), span);
                    Some(TokenKind::ErrorInvalidEscape)
                }
            }
            other => {
                if other != 0 {
                    self.cursor.advance();
                }
                let span = Span::new(escape_start, self.cursor.pos() - escape_start);
                self.error(
                    format!("invalid escape sequence '\\{}'", other as char),
                    span,
                );
                Some(TokenKind::ErrorInvalidEscape)
            }
        }
    }

    fn scan_codeunit(&mut self, start: usize, line: usize, column: usize) {
        self.cursor.advance(); // opening quote
        let mut error_kind = None;
        loop {
            match self.cursor.current() {
                0 | b'\n' => {
                    let span = Span::new(start, self.cursor.pos() - start);
                    self.error("unterminated codeunit literal".to_string(), span);
                    self.push_token(TokenKind::ErrorUnterminatedCodeunit, start, line, column);
                    return;
                }
                b'\'' => {
                    self.cursor.advance();
                    self.push_token(
                        error_kind.unwrap_or(TokenKind::Codeunit),
                        start,
                        line,
                        column,
                    );
                    return;
                }
                b'\\' => {
                    if let Some(kind) = self.scan_escape() {
                        error_kind.get_or_insert(kind);
                    }
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn scan_operator(&mut self, start: usize, line: usize, column: usize) {
        use TokenKind::*;
        let c = self.cursor.advance();
        // greedy longest match over multi-character operators
        let kind = match c {
            b'.' => Dot,
            b',' => Comma,
            b';' => Semicolon,
            b'~' => Tilde,
            b'?' => Question,
            b'@' => At,
            b'^' => Caret,
            b':' => match self.cursor.current() {
                b'}' => {
                    self.cursor.advance();
                    RightScope
                }
                b']' => {
                    self.cursor.advance();
                    RightTable
                }
                _ => Colon,
            },
            b'(' => {
                if self.cursor.current() == b'>' {
                    self.cursor.advance();
                    LeftFunnel
                } else {
                    LeftParenthesis
                }
            }
            b')' => RightParenthesis,
            b'[' => {
                if self.cursor.current() == b':' {
                    self.cursor.advance();
                    LeftTable
                } else {
                    LeftBracket
                }
            }
            b']' => RightBracket,
            b'{' => {
                if self.cursor.current() == b':' {
                    self.cursor.advance();
                    LeftScope
                } else {
                    LeftBrace
                }
            }
            b'}' => RightBrace,
            b'<' => match self.cursor.current() {
                b'=' => {
                    self.cursor.advance();
                    LessEqual
                }
                b'<' => {
                    self.cursor.advance();
                    ShiftLeft
                }
                b')' => {
                    self.cursor.advance();
                    RightFunnel
                }
                _ => Less,
            },
            b'>' => match self.cursor.current() {
                b'=' => {
                    self.cursor.advance();
                    GreaterEqual
                }
                b'>' => {
                    self.cursor.advance();
                    ShiftRight
                }
                _ => Greater,
            },
            b'=' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    Equal
                } else {
                    Assign
                }
            }
            b'!' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    NotEqual
                } else {
                    Bang
                }
            }
            b'&' => {
                if self.cursor.current() == b'&' {
                    self.cursor.advance();
                    AndAnd
                } else {
                    Ampersand
                }
            }
            b'|' => {
                if self.cursor.current() == b'|' {
                    self.cursor.advance();
                    OrOr
                } else {
                    Pipe
                }
            }
            b'+' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    PlusAssign
                } else {
                    Plus
                }
            }
            b'-' => match self.cursor.current() {
                b'=' => {
                    self.cursor.advance();
                    DashAssign
                }
                b'>' => {
                    self.cursor.advance();
                    Arrow
                }
                _ => Dash,
            },
            b'*' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    StarAssign
                } else {
                    Star
                }
            }
            b'/' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    SlashAssign
                } else {
                    Slash
                }
            }
            b'%' => {
                if self.cursor.current() == b'=' {
                    self.cursor.advance();
                    PercentAssign
                } else {
                    Percent
                }
            }
            other => {
                let span = Span::new(start, self.cursor.pos() - start);
                self.error(format!("invalid character {:?}", other as char), span);
                ErrorInvalidCharacter
            }
        };
        self.push_token(kind, start, line, column);
        if kind.is_opening() {
            self.groupings.push(Grouping {
                kind: GroupingKind::Token(kind),
                token_index: self.tokens.len() - 1,
            });
        } else if kind.is_closing() {
            self.close_grouping(kind);
        }
    }

    /// Pops the grouping stack against a just-pushed closing token.
    fn close_grouping(&mut self, close: TokenKind) {
        let close_index = self.tokens.len() - 1;
        match self.groupings.last() {
            Some(Grouping {
                kind: GroupingKind::Token(open),
                ..
            }) if open.matching_close() == Some(close) => {
                self.groupings.pop();
            }
            Some(Grouping {
                kind: GroupingKind::Token(open),
                ..
            }) => {
                let open = *open;
                self.groupings.pop();
                let span = self.tokens[close_index].span();
                self.error(
                    format!("mismatched closing delimiter; {open:?} is still open"),
                    span,
                );
                if let Some(error) = close.unmatched_error() {
                    self.tokens[close_index].set_kind(error);
                }
            }
            // a closing delimiter inside an interpolation splice does not
            // consume the splice entry
            Some(Grouping {
                kind: GroupingKind::Interpolation,
                ..
            })
            | None => {
                let span = self.tokens[close_index].span();
                self.error("unmatched closing delimiter".to_string(), span);
                if let Some(error) = close.unmatched_error() {
                    self.tokens[close_index].set_kind(error);
                }
            }
        }
    }

    /// Rewrites every still-open grouping's opening token to its unmatched
    /// error kind once the whole buffer has been scanned.
    fn finish_groupings(&mut self) {
        while let Some(grouping) = self.groupings.pop() {
            self.ok = false;
            let token = &mut self.tokens[grouping.token_index];
            let span = token.span();
            match grouping.kind {
                GroupingKind::Token(open) => {
                    if let Some(error) = open.unmatched_error() {
                        token.set_kind(error);
                    }
                    self.sink.report(
                        Diagnostic::error(format!("unmatched {open:?}"))
                            .with_span(span)
                            .with_module(self.module),
                    );
                }
                GroupingKind::Interpolation => {
                    token.set_kind(TokenKind::ErrorUnterminatedString);
                    self.sink.report(
                        Diagnostic::error("unterminated string interpolation".to_string())
                            .with_span(span)
                            .with_module(self.module),
                    );
                }
            }
        }
    }
}
