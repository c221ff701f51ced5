//! Diagnostic severities and the diagnostic record shared by the compiler
//! core and the CLI.

/// How severe a diagnostic is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Note,
}

/// A rendered diagnostic: a message attached to a byte offset in a file.
///
/// The builder produces these from verify errors; the CLI decorates them
/// with line details before printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub offset: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: impl Into<String>, offset: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: file.into(),
            offset,
            message: message.into(),
        }
    }

    pub fn warning(file: impl Into<String>, offset: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            file: file.into(),
            offset,
            message: message.into(),
        }
    }
}
