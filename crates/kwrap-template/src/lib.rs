//! Template expansion for generated C code.
//!
//! Code fragments are literal strings with `{key}` placeholders, rendered
//! against a [`Context`] of string attributes. A [`Choice`] holds several
//! fragments, each guarded by a [`Predicate`], and renders the first one
//! whose guard holds.
//!
//! ```ignore
//! use kwrap_template::{is, Choice, Context};
//!
//! let decl = Choice::new()
//!     .when("{ctype}* {name} = NULL;", is("pointer", "array"))?
//!     .otherwise("{ctype} {name};")?;
//! let ctx = Context::new().with("ctype", "double").with("name", "x");
//! assert_eq!(decl.render_or_empty(&ctx)?, "double x;");
//! ```

#![warn(missing_docs)]

mod context;
mod predicate;
mod template;

pub use context::Context;
pub use predicate::{flag, has, is, Predicate};
pub use template::{Choice, Template};

/// Errors from parsing or rendering a template.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder has no value in the context.
    #[error("no value for placeholder `{{{0}}}`")]
    MissingKey(String),
    /// A `{` is never closed.
    #[error("unclosed `{{` at byte {position}")]
    Unclosed {
        /// Byte offset of the opening brace.
        position: usize,
    },
    /// A lone `}` outside a placeholder.
    #[error("unmatched `}}` at byte {position}")]
    UnmatchedClose {
        /// Byte offset of the brace.
        position: usize,
    },
    /// A placeholder whose name is empty or has illegal characters.
    #[error("invalid placeholder `{{{0}}}`")]
    InvalidPlaceholder(String),
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
