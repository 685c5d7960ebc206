//! Error reporting and diagnostics for kwrap.
//!
//! The wrapper compiler never sees source text: its input is an already
//! parsed module spec. Diagnostics are therefore located by *name* (module,
//! kernel, argument) rather than by span, and rendered in the style of
//! Rust/Cargo ([`render`]), as JSON lines ([`json`]), or explained at
//! length by `kwrap explain` ([`explain`]).
//!
//! ```ignore
//! use kwrap_diagnostics::{CargoRenderer, Diagnostic};
//!
//! let diag = Diagnostic::error("intent tags `{}` do not select any class")
//!     .with_code("E0001")
//!     .with_kernel("example_sum")
//!     .with_argument("x");
//!
//! CargoRenderer::new().render_all(&[diag]);
//! ```

#![warn(missing_docs)]

pub mod explain;
pub mod json;
pub mod render;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use explain::{all_error_codes, get_explanation, print_explanation, Explanation};
pub use json::{to_json_lines, JsonDiagnostic};
pub use render::{CargoRenderer, Style};

/// The severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A bug in the generator itself.
    Bug,
    /// A fatal error that prevents a kernel from being generated.
    Error,
    /// A warning that doesn't prevent generation.
    Warning,
    /// A note providing additional context.
    Note,
    /// Help text with suggestions.
    Help,
}

impl Severity {
    /// Get the label for this severity.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Bug => "internal generator error",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
            Self::Help => "help",
        }
    }
}

/// Where in the module spec a diagnostic originates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The module being generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// The kernel, if the diagnostic concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    /// The argument within the kernel, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl Location {
    /// Check whether no part of the location is known.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.module.is_none() && self.kernel.is_none() && self.argument.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(module) = &self.module {
            parts.push(format!("module `{module}`"));
        }
        if let Some(kernel) = &self.kernel {
            parts.push(format!("kernel `{kernel}`"));
        }
        if let Some(argument) = &self.argument {
            parts.push(format!("argument `{argument}`"));
        }
        if parts.is_empty() {
            f.write_str("<unknown>")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// A diagnostic message with a location, notes and help.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// The severity of this diagnostic.
    pub severity: Severity,
    /// The main message.
    pub message: String,
    /// An optional error code.
    pub code: Option<String>,
    /// Where the problem is.
    pub location: Location,
    /// Additional notes.
    pub notes: Vec<String>,
    /// Suggested fixes, in prose.
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            code: None,
            location: Location::default(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    /// Create a new bug diagnostic (internal generator error).
    #[must_use]
    pub fn bug(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Bug, message)
    }

    /// Add an error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the module name.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.location.module = Some(module.into());
        self
    }

    /// Attach the kernel name.
    #[must_use]
    pub fn with_kernel(mut self, kernel: impl Into<String>) -> Self {
        self.location.kernel = Some(kernel.into());
        self
    }

    /// Attach the argument name.
    #[must_use]
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.location.argument = Some(argument.into());
        self
    }

    /// Add a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add a help message.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Check if this is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Bug)
    }

    /// Check if this is a warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// A handler for collecting and emitting diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticHandler {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticHandler {
    /// Create a new diagnostic handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error | Severity::Bug => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    /// Emit every diagnostic of an iterator.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    /// Check if any errors have been emitted.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Get the number of errors.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Get the number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Get all diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take all diagnostics, leaving the handler empty.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        self.warning_count = 0;
        std::mem::take(&mut self.diagnostics)
    }
}

/// Trait for types that can produce diagnostics.
pub trait IntoDiagnostic {
    /// Convert into a diagnostic.
    fn into_diagnostic(self) -> Diagnostic;
}

impl IntoDiagnostic for Diagnostic {
    fn into_diagnostic(self) -> Diagnostic {
        self
    }
}
