//! Generator session state, options, and configuration for kwrap.
//!
//! The [`Session`] type holds everything shared by one generator run: the
//! [`Options`] it was started with and a diagnostic sink that per-kernel
//! workers emit into from any thread.
//!
//! # Configuration
//!
//! Options are normally read from a `kwrap.toml` next to the module spec
//! and then overridden by command-line flags:
//!
//! ```toml
//! debug = false
//! report_stats = true
//! layouts = ["c", "xnd"]
//! deny_warnings = true
//! jobs = 4
//! output_path = "build/example_kernels.c"
//! extra_includes = ["mylib.h"]
//! ```

#![warn(missing_docs)]

use camino::{Utf8Path, Utf8PathBuf};
use kwrap_diagnostics::{Diagnostic, DiagnosticHandler};
use kwrap_spec::LayoutKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Generator options that can be set via CLI or configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Emit `DEBUGMSG` tracing in generated wrappers.
    pub debug: bool,
    /// Emit the per-wrapper call-count report and its `atexit` hook.
    pub report_stats: bool,
    /// Only generate these layout kinds; `None` means all.
    pub layouts: Option<Vec<LayoutKind>>,
    /// Treat warnings as errors.
    pub deny_warnings: bool,
    /// Worker threads for per-kernel stages; `None` uses the global pool.
    pub jobs: Option<usize>,
    /// Where to write the generated unit.
    pub output_path: Option<Utf8PathBuf>,
    /// Headers included after the module's own.
    pub extra_includes: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            debug: false,
            report_stats: true,
            layouts: None,
            deny_warnings: false,
            jobs: None,
            output_path: None,
            extra_includes: Vec::new(),
        }
    }
}

impl Options {
    /// Parse options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] on syntax errors, unknown
    /// keys, or a zero job count.
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        let options: Self =
            toml::from_str(text).map_err(|e| SessionError::InvalidConfig(e.to_string()))?;
        if options.jobs == Some(0) {
            return Err(SessionError::InvalidConfig(
                "`jobs` must be at least 1".to_string(),
            ));
        }
        Ok(options)
    }

    /// Load options from a `kwrap.toml` file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConfigNotFound`] if the file does not exist,
    /// or the errors of [`Options::from_toml_str`].
    pub fn from_toml_file(path: &Utf8Path) -> Result<Self, SessionError> {
        if !path.exists() {
            return Err(SessionError::ConfigNotFound(path.to_owned()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check whether kernels of `layout` should be generated.
    #[must_use]
    pub fn layout_enabled(&self, layout: LayoutKind) -> bool {
        self.layouts
            .as_ref()
            .map_or(true, |layouts| layouts.contains(&layout))
    }
}

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(Utf8PathBuf),
    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The generator session holds all state for one run.
pub struct Session {
    /// Generator options.
    pub options: Options,
    /// Diagnostics emitted so far.
    diagnostics: Mutex<DiagnosticHandler>,
    /// Working directory for the session.
    working_dir: Utf8PathBuf,
}

impl Session {
    /// Create a new session with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the current working directory cannot be determined.
    pub fn new(options: Options) -> Result<Self, SessionError> {
        let working_dir = std::env::current_dir()
            .map_err(SessionError::Io)?
            .try_into()
            .map_err(|e| SessionError::InvalidConfig(format!("invalid working dir: {e}")))?;

        Ok(Self {
            options,
            diagnostics: Mutex::new(DiagnosticHandler::new()),
            working_dir,
        })
    }

    /// Create a new session with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the current working directory cannot be determined.
    pub fn with_defaults() -> Result<Self, SessionError> {
        Self::new(Options::default())
    }

    /// Get the working directory for this session.
    #[must_use]
    pub fn working_dir(&self) -> &Utf8Path {
        &self.working_dir
    }

    /// Record a diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().emit(diagnostic);
    }

    /// Record several diagnostics at once.
    pub fn emit_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.lock().extend(diagnostics);
    }

    /// Check whether any error has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.lock().has_errors()
    }

    /// Number of errors and warnings recorded.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let handler = self.diagnostics.lock();
        (handler.error_count(), handler.warning_count())
    }

    /// Drain every recorded diagnostic.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().take_diagnostics()
    }

    /// Get the output path, computing a default if not specified.
    ///
    /// The default is `<module>_kernels.c` in the working directory.
    #[must_use]
    pub fn output_path(&self, module_name: &str) -> Utf8PathBuf {
        match &self.options.output_path {
            Some(path) => path.clone(),
            None => self.working_dir.join(format!("{module_name}_kernels.c")),
        }
    }
}

/// A shared, thread-safe reference to a session.
pub type SessionRef = Arc<Session>;

/// Create a shared session reference.
///
/// # Errors
///
/// Returns an error if the current working directory cannot be determined.
pub fn create_session(options: Options) -> Result<SessionRef, SessionError> {
    Ok(Arc::new(Session::new(options)?))
}
