//! Lexical tokens, source spans, and the diagnostic interface shared by every
//! stage of the umbra front end.

pub mod diagnostic;
pub mod span;
pub mod token;

pub use diagnostic::{Diagnostic, DiagnosticSink, Severity};
pub use span::{Span, Spanned};
pub use token::{Spacing, Token, TokenKind};
