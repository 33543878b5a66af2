//! Located error records produced while loading and linking.
//!
//! A failed compile returns every diagnostic it found, not just the first;
//! rendering is left to the caller.

use crate::ast::Location;
use crate::lexer::SyntaxError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed token or grammar violation.
    Syntax,
    /// Unresolved type reference or missing import.
    Linkage,
    /// Tag collision, reserved overlap, illegal label and similar rule violations.
    Schema,
    /// Option name or value that fails to type-check.
    Option,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Linkage => "linkage",
            DiagnosticKind::Schema => "schema",
            DiagnosticKind::Option => "option",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            location,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} error: {}", self.location, self.kind.as_str(), self.message)
    }
}

impl From<SyntaxError> for Diagnostic {
    fn from(e: SyntaxError) -> Self {
        Diagnostic {
            kind: DiagnosticKind::Syntax,
            location: Location::new(e.path, e.line, e.column),
            message: e.message,
        }
    }
}

/// A compile that produced no schema, with everything that went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.diagnostics))]
pub struct LinkError {
    pub diagnostics: Vec<Diagnostic>,
}

impl LinkError {
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

impl From<SyntaxError> for LinkError {
    fn from(e: SyntaxError) -> Self {
        LinkError {
            diagnostics: vec![e.into()],
        }
    }
}

fn render(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error(s)", diagnostics.len());
    for d in diagnostics {
        out.push_str("\n  ");
        out.push_str(&d.to_string());
    }
    out
}
