//! The diagnostic interface every pipeline stage reports through.
//!
//! Stages never format or print; they hand [Diagnostic] values to a
//! [DiagnosticSink] owned by the driver, which renders them against the
//! module's source buffer at the end of the run.

use crate::span::Span;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Remark,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Remark => write!(f, "remark"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single reported problem, located by span when one is available.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Span into the reporting module's source buffer
    pub span: Option<Span>,
    /// Relative path of the module the span belongs to
    pub module: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: None,
            module: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span: None,
            module: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Receives diagnostics from pipeline stages.
///
/// Implementations must be shareable across worker tasks; the driver's sink
/// guards its collection with a mutex.
pub trait DiagnosticSink: Send + Sync {
    /// Reports a located diagnostic.
    fn report(&self, diagnostic: Diagnostic);

    /// Reports a message with no source location.
    fn report_text(&self, severity: Severity, message: &str) {
        self.report(Diagnostic {
            severity,
            message: message.to_string(),
            span: None,
            module: None,
        });
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic)
    }
}
