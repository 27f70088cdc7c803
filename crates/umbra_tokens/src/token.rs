//! A lexical token from a source file

use crate::span::{Span, Spanned};
use std::fmt::{Debug, Formatter};

/// How a token relates to the whitespace around it.
///
/// The parser consults this when an operator spelling is ambiguous; an
/// operator with [Spacing::After] alone is never accepted in binary position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    /// No whitespace on either side
    None,
    /// Whitespace before only
    Before,
    /// Whitespace after only
    After,
    /// Whitespace on both sides
    BeforeAndAfter,
}

impl Spacing {
    pub fn from_sides(before: bool, after: bool) -> Self {
        match (before, after) {
            (false, false) => Spacing::None,
            (true, false) => Spacing::Before,
            (false, true) => Spacing::After,
            (true, true) => Spacing::BeforeAndAfter,
        }
    }

    /// Whether this spacing is acceptable for a binary operator. Binary use
    /// requires symmetric spacing; before-only binds the operator to the
    /// following operand and after-only is always invalid.
    pub fn valid_for_binary(&self) -> bool {
        matches!(self, Spacing::None | Spacing::BeforeAndAfter)
    }

    /// Whether this spacing is acceptable for a prefix operator.
    pub fn valid_for_prefix(&self) -> bool {
        matches!(self, Spacing::None | Spacing::Before)
    }
}

/// A lexical token.
///
/// Tokens never own text; their span points back into the module's source
/// buffer. Line and column are 1-based.
#[derive(Clone)]
pub struct Token {
    kind: TokenKind,
    span: Span,
    line: usize,
    column: usize,
    spacing: Spacing,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: usize, column: usize, spacing: Spacing) -> Self {
        Self {
            kind,
            span,
            line,
            column,
            spacing,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Rewrites the kind of this token in place.
    ///
    /// Used by the tokenizer to turn a recorded grouping token into its
    /// unmatched-error form after the whole file has been scanned.
    pub fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// The token's text, resolved against the source buffer it came from.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}@{}:{}",
            self.kind, self.line, self.column
        )
    }
}

impl Spanned for Token {
    fn span(&self) -> Span {
        self.span
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // literals
    Identifier,
    Integer,
    Real,
    String,
    Codeunit,
    /// opening fragment of an interpolated string, up to the first splice
    StringLeft,
    /// fragment of an interpolated string between two splices
    StringMiddle,
    /// closing fragment of an interpolated string, after the last splice
    StringRight,

    // groupings
    LeftParenthesis,
    RightParenthesis,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    /// `{:`
    LeftScope,
    /// `:}`
    RightScope,
    /// `(>`
    LeftFunnel,
    /// `<)`
    RightFunnel,
    /// `[:`
    LeftTable,
    /// `:]`
    RightTable,

    // operators
    Dot,
    Comma,
    Colon,
    Semicolon,
    Plus,
    Dash,
    Star,
    Slash,
    Percent,
    Caret,
    Ampersand,
    Pipe,
    Tilde,
    Bang,
    Question,
    At,
    Assign,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    ShiftLeft,
    ShiftRight,
    AndAnd,
    OrOr,
    PlusAssign,
    DashAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Arrow,

    // keywords
    KwObject,
    KwProc,
    KwVar,
    KwAlias,
    KwTable,
    KwLabel,
    KwEntry,
    KwImport,
    KwUse,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwSwitch,
    KwCase,
    KwReturn,
    KwJump,
    KwMutable,
    KwVolatile,
    KwPrivate,
    KwExport,
    KwInline,
    KwExternal,
    KwThreadlocal,

    // lexical error tokens; values, never early exits
    ErrorUnmatchedLeftParenthesis,
    ErrorUnmatchedRightParenthesis,
    ErrorUnmatchedLeftBracket,
    ErrorUnmatchedRightBracket,
    ErrorUnmatchedLeftBrace,
    ErrorUnmatchedRightBrace,
    ErrorUnmatchedLeftScope,
    ErrorUnmatchedRightScope,
    ErrorUnmatchedLeftFunnel,
    ErrorUnmatchedRightFunnel,
    ErrorUnmatchedLeftTable,
    ErrorUnmatchedRightTable,
    ErrorUnterminatedString,
    ErrorUnterminatedCodeunit,
    ErrorInvalidEscape,
    ErrorInvalidCharacter,
}

impl TokenKind {
    /// Whether this kind is one of the lexical-error kinds.
    pub fn is_error(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            ErrorUnmatchedLeftParenthesis
                | ErrorUnmatchedRightParenthesis
                | ErrorUnmatchedLeftBracket
                | ErrorUnmatchedRightBracket
                | ErrorUnmatchedLeftBrace
                | ErrorUnmatchedRightBrace
                | ErrorUnmatchedLeftScope
                | ErrorUnmatchedRightScope
                | ErrorUnmatchedLeftFunnel
                | ErrorUnmatchedRightFunnel
                | ErrorUnmatchedLeftTable
                | ErrorUnmatchedRightTable
                | ErrorUnterminatedString
                | ErrorUnterminatedCodeunit
                | ErrorInvalidEscape
                | ErrorInvalidCharacter
        )
    }

    /// Whether this kind opens a grouping.
    pub fn is_opening(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            LeftParenthesis | LeftBracket | LeftBrace | LeftScope | LeftFunnel | LeftTable
        )
    }

    /// Whether this kind closes a grouping.
    pub fn is_closing(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            RightParenthesis | RightBracket | RightBrace | RightScope | RightFunnel | RightTable
        )
    }

    /// The closing kind that matches an opening grouping kind.
    pub fn matching_close(&self) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match self {
            LeftParenthesis => RightParenthesis,
            LeftBracket => RightBracket,
            LeftBrace => RightBrace,
            LeftScope => RightScope,
            LeftFunnel => RightFunnel,
            LeftTable => RightTable,
            _ => return None,
        })
    }

    /// The unmatched-error kind for a grouping kind.
    pub fn unmatched_error(&self) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match self {
            LeftParenthesis => ErrorUnmatchedLeftParenthesis,
            RightParenthesis => ErrorUnmatchedRightParenthesis,
            LeftBracket => ErrorUnmatchedLeftBracket,
            RightBracket => ErrorUnmatchedRightBracket,
            LeftBrace => ErrorUnmatchedLeftBrace,
            RightBrace => ErrorUnmatchedRightBrace,
            LeftScope => ErrorUnmatchedLeftScope,
            RightScope => ErrorUnmatchedRightScope,
            LeftFunnel => ErrorUnmatchedLeftFunnel,
            RightFunnel => ErrorUnmatchedRightFunnel,
            LeftTable => ErrorUnmatchedLeftTable,
            RightTable => ErrorUnmatchedRightTable,
            _ => return None,
        })
    }

    /// Looks up the keyword kind for an identifier spelling.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match text {
            "object" => KwObject,
            "proc" => KwProc,
            "var" => KwVar,
            "alias" => KwAlias,
            "table" => KwTable,
            "label" => KwLabel,
            "entry" => KwEntry,
            "import" => KwImport,
            "use" => KwUse,
            "if" => KwIf,
            "else" => KwElse,
            "while" => KwWhile,
            "for" => KwFor,
            "switch" => KwSwitch,
            "case" => KwCase,
            "return" => KwReturn,
            "jump" => KwJump,
            "mutable" => KwMutable,
            "volatile" => KwVolatile,
            "private" => KwPrivate,
            "export" => KwExport,
            "inline" => KwInline,
            "external" => KwExternal,
            "threadlocal" => KwThreadlocal,
            _ => return None,
        })
    }

    /// Whether this kind is an attribute keyword.
    pub fn is_attribute_keyword(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            KwMutable | KwVolatile | KwPrivate | KwExport | KwInline | KwExternal | KwThreadlocal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_pairs() {
        for open in [
            TokenKind::LeftParenthesis,
            TokenKind::LeftBracket,
            TokenKind::LeftBrace,
            TokenKind::LeftScope,
            TokenKind::LeftFunnel,
            TokenKind::LeftTable,
        ] {
            let close = open.matching_close().unwrap();
            assert!(open.is_opening());
            assert!(close.is_closing());
            assert!(open.unmatched_error().unwrap().is_error());
            assert!(close.unmatched_error().unwrap().is_error());
        }
    }

    #[test]
    fn test_spacing_binary_validity() {
        assert!(Spacing::None.valid_for_binary());
        assert!(Spacing::BeforeAndAfter.valid_for_binary());
        assert!(!Spacing::Before.valid_for_binary());
        assert!(!Spacing::After.valid_for_binary());
    }

    #[test]
    fn test_spacing_prefix_validity() {
        assert!(Spacing::None.valid_for_prefix());
        assert!(Spacing::Before.valid_for_prefix());
        assert!(!Spacing::After.valid_for_prefix());
        assert!(!Spacing::BeforeAndAfter.valid_for_prefix());
    }
}
