//! Common types for the kiln compiler.
//!
//! This crate provides the foundational types shared by every other kiln
//! crate:
//! - Source spans (`Span`, `Spanned`)
//! - Line maps and error-rendering details (`LineMap`, `LineDetails`)
//! - Diagnostic severities and the diagnostic record

pub mod span;
pub use span::{Span, Spanned};

pub mod position;
pub use position::{LineDetails, LineMap, Position};

pub mod diagnostics;
pub use diagnostics::{Diagnostic, Severity};
