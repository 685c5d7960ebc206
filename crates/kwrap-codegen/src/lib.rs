//! Wrapper code generation for kwrap.
//!
//! This crate turns validated [`KernelSpec`](kwrap_spec::KernelSpec)s into
//! C source: one wrapper function per kernel and layout kind, an optional
//! shape-constraint function, and the dispatch table the host runtime
//! registers.
//!
//! # Pipeline
//!
//! Each kernel runs through five stages:
//!
//! 1. [`intent`]: classify every argument's intent tags
//! 2. [`shape`]: assign symbol letters to symbolic dimensions
//! 3. [`synth`]: look up the code-matrix cell and render its fragment
//! 4. [`sequence`]: order fragments by their dependencies
//! 5. [`table`]: merge plans into dispatch-table rows
//!
//! Stages 1 to 4 are independent per kernel and driven by
//! [`plan_kernel`]. Stage 5 and [`render_module`] run once all plans are
//! available.

#![warn(missing_docs)]

pub mod argument;
pub mod intent;
pub mod plan;
pub mod sequence;
pub mod shape;
pub mod source;
pub mod synth;
pub mod table;

pub use argument::{resolve_arguments, ArgForm, ResolvedArgument, ResolvedArguments};
pub use intent::{classify, Classification, IntentClass};
pub use plan::{plan_kernel, signature, wrapper_name, WrapperPlan};
pub use sequence::{emit, sequence, Emission, Fragment, Ordering};
pub use shape::{resolve, ResolvedDim, ResolvedShape, SymbolTable, MAX_SYMBOLS, SYMBOL_ALPHABET};
pub use source::render_module;
pub use synth::{cell, synthesize, Cell};
pub use table::{aggregate, KernelTable, KernelTableRow};

use kwrap_diagnostics::{Diagnostic, IntoDiagnostic};
use kwrap_spec::{IntentSet, LayoutKind, Pointer};
use kwrap_template::TemplateError;
use thiserror::Error;

/// Switches that change the generated text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Emit `DEBUGMSG` tracing in wrappers.
    pub debug: bool,
    /// Emit the per-wrapper call-count report.
    pub report_stats: bool,
    /// Headers included after the module's own.
    pub extra_includes: Vec<String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            debug: false,
            report_stats: true,
            extra_includes: Vec::new(),
        }
    }
}

/// Fatal per-kernel errors.
///
/// A kernel that raises one of these contributes nothing to the output.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The intent tags select zero or several classes.
    #[error("intent tags `{tags}` of argument `{argument}` {}", describe_matches(.matched))]
    Classification {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
        /// The offending tags.
        tags: IntentSet,
        /// The classes the tags matched.
        matched: Vec<IntentClass>,
    },

    /// More distinct symbolic dimensions than the alphabet holds.
    #[error("argument `{argument}` introduces symbolic dimension number {}, but only {limit} are available", .limit + 1)]
    SymbolOverflow {
        /// The kernel.
        kernel: String,
        /// The argument introducing the overflowing dimension.
        argument: String,
        /// The alphabet size.
        limit: usize,
    },

    /// A scalar flowing both ways carries a default value.
    #[error("argument `{argument}` has class {class} and cannot take a default value")]
    DefaultOnDualDirection {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
        /// Its class.
        class: IntentClass,
    },

    /// A by-value scalar whose class writes back into its input.
    #[error("by-value argument `{argument}` cannot have class {class}")]
    IllegalScalarIntent {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
        /// Its class.
        class: IntentClass,
    },

    /// An array argument carries a default value.
    #[error("array argument `{argument}` cannot take a default value")]
    ArrayDefault {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
    },

    /// Shape presence disagrees with the pointer arity.
    #[error("argument `{argument}` {}", describe_arity(.pointer))]
    ShapeMismatch {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
        /// The declared arity.
        pointer: Pointer,
    },

    /// A hidden by-value scalar that nothing initialises.
    #[error("hidden by-value argument `{argument}` needs a default value")]
    HiddenWithoutDefault {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
    },

    /// A built-in template failed to expand.
    #[error("template expansion failed: {source}")]
    Template {
        /// The kernel.
        kernel: String,
        /// The underlying error.
        #[source]
        source: TemplateError,
    },
}

fn describe_matches(matched: &[IntentClass]) -> String {
    if matched.is_empty() {
        "select no intent class".to_string()
    } else {
        let names: Vec<String> = matched.iter().map(ToString::to_string).collect();
        format!("select several intent classes ({})", names.join(", "))
    }
}

fn describe_arity(pointer: &Pointer) -> &'static str {
    match pointer {
        Pointer::Array => "is an array but has no shape",
        Pointer::Value | Pointer::Scalar => "is a scalar but has a shape",
    }
}

impl CodegenError {
    /// Stable diagnostic code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Classification { .. } => "E0001",
            Self::SymbolOverflow { .. } => "E0002",
            Self::DefaultOnDualDirection { .. } => "E0003",
            Self::IllegalScalarIntent { .. } => "E0004",
            Self::ArrayDefault { .. } => "E0005",
            Self::ShapeMismatch { .. } => "E0006",
            Self::HiddenWithoutDefault { .. } => "E0007",
            Self::Template { .. } => "E0008",
        }
    }

    /// The kernel that failed.
    #[must_use]
    pub fn kernel(&self) -> &str {
        match self {
            Self::Classification { kernel, .. }
            | Self::SymbolOverflow { kernel, .. }
            | Self::DefaultOnDualDirection { kernel, .. }
            | Self::IllegalScalarIntent { kernel, .. }
            | Self::ArrayDefault { kernel, .. }
            | Self::ShapeMismatch { kernel, .. }
            | Self::HiddenWithoutDefault { kernel, .. }
            | Self::Template { kernel, .. } => kernel,
        }
    }

    /// The offending argument, if the error concerns one.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::Classification { argument, .. }
            | Self::SymbolOverflow { argument, .. }
            | Self::DefaultOnDualDirection { argument, .. }
            | Self::IllegalScalarIntent { argument, .. }
            | Self::ArrayDefault { argument, .. }
            | Self::ShapeMismatch { argument, .. }
            | Self::HiddenWithoutDefault { argument, .. } => Some(argument),
            Self::Template { .. } => None,
        }
    }
}

impl IntoDiagnostic for CodegenError {
    fn into_diagnostic(self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string())
            .with_code(self.code())
            .with_kernel(self.kernel());
        if let Some(argument) = self.argument() {
            diag = diag.with_argument(argument);
        }
        match &self {
            Self::Classification { matched, .. } if matched.is_empty() => diag
                .with_help("add one of `input`, `output`, `inout` or `inplace` to the intent tags"),
            Self::Classification { .. } => {
                diag.with_help("keep a single input-side tag, optionally combined with `output`")
            }
            Self::SymbolOverflow { .. } => {
                diag.with_note(format!("symbols are drawn from `{SYMBOL_ALPHABET}`"))
            }
            Self::DefaultOnDualDirection { .. } | Self::ArrayDefault { .. } => {
                diag.with_help("remove the `default` entry")
            }
            Self::IllegalScalarIntent { .. } => {
                diag.with_help("pass the scalar by pointer, or use `input`")
            }
            Self::ShapeMismatch { .. } => {
                diag.with_help("arrays need a non-empty `shape`; scalars must not have one")
            }
            Self::HiddenWithoutDefault { .. } => {
                diag.with_help("give the argument a `default` expression")
            }
            Self::Template { .. } => diag.with_note("this is a bug in a built-in template"),
        }
    }
}

/// Result alias for code generation.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Problems that do not stop generation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodegenWarning {
    /// Fragment dependencies form a cycle; declaration order was used.
    #[error("dependency cycle between arguments {}; falling back to declaration order", unresolved.join(", "))]
    DependencyCycle {
        /// The kernel.
        kernel: String,
        /// Fragments placed by the fallback.
        unresolved: Vec<String>,
        /// The cycles among them.
        cycles: Vec<Vec<String>>,
    },

    /// Two plans offer different wrappers for the same row and layout.
    #[error("signature `{signature}` already has a {layout} entry `{kept}`; dropping `{dropped}`")]
    ConflictingEntry {
        /// The kernel.
        kernel: String,
        /// The row's signature.
        signature: String,
        /// The contested layout kind.
        layout: LayoutKind,
        /// The entry that stays.
        kept: String,
        /// The entry discarded.
        dropped: String,
    },
}

impl CodegenWarning {
    /// Stable diagnostic code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DependencyCycle { .. } => "W0001",
            Self::ConflictingEntry { .. } => "W0002",
        }
    }

    /// The kernel concerned.
    #[must_use]
    pub fn kernel(&self) -> &str {
        match self {
            Self::DependencyCycle { kernel, .. } | Self::ConflictingEntry { kernel, .. } => kernel,
        }
    }
}

impl IntoDiagnostic for CodegenWarning {
    fn into_diagnostic(self) -> Diagnostic {
        let diag = Diagnostic::warning(self.to_string())
            .with_code(self.code())
            .with_kernel(self.kernel());
        match self {
            Self::DependencyCycle { cycles, .. } => cycles.iter().fold(diag, |diag, cycle| {
                diag.with_note(format!("cycle: {}", cycle.join(" -> ")))
            }),
            Self::ConflictingEntry { .. } => {
                diag.with_help("give the kernels distinct names or function names")
            }
        }
    }
}
