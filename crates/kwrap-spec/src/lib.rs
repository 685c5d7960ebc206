//! Kernel specifications for the kwrap wrapper compiler.
//!
//! A [`ModuleSpec`] describes a set of foreign numeric functions: for each
//! kernel, the native symbol to call, its memory-layout kind and an ordered
//! list of [`ArgumentSpec`]s with their types, shapes and intents.
//!
//! Specs are plain data. They are loaded from JSON or TOML (see [`load`]),
//! checked for basic well-formedness by [`ModuleSpec::validate`], and then
//! handed, unchanged, to the code generator.
//!
//! # Example
//!
//! ```ignore
//! use kwrap_spec::{ArgumentSpec, IntentTag, KernelSpec, LayoutKind, ScalarType};
//!
//! let kernel = KernelSpec::new("example_sum", "d_example_sum", LayoutKind::Container)
//!     .argument(
//!         ArgumentSpec::new("x", ScalarType::Float64)
//!             .array(["n"])
//!             .intent(&[IntentTag::Input]),
//!     );
//! ```

#![warn(missing_docs)]

mod dtype;
mod intent;
mod layout;
pub mod load;

pub use dtype::{ScalarType, UnknownScalarType};
pub use intent::{IntentSet, IntentTag};
pub use layout::{ArrayKind, LayoutKind, UnknownLayoutKind};
pub use load::load;

use camino::Utf8PathBuf;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while loading or validating a module spec.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The spec file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// The file that failed.
        path: Utf8PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },
    /// The file extension is neither `.json` nor `.toml`.
    #[error("unsupported spec format for `{0}` (expected .json or .toml)")]
    UnsupportedFormat(Utf8PathBuf),
    /// JSON syntax or shape error.
    #[error("invalid JSON spec: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML syntax or shape error.
    #[error("invalid TOML spec: {0}")]
    Toml(#[from] toml::de::Error),
    /// A type name that is not a known scalar type.
    #[error("kernel `{kernel}`: {source}")]
    UnknownType {
        /// The kernel being loaded.
        kernel: String,
        /// The underlying error.
        source: UnknownScalarType,
    },
    /// A kernel entry names no layout kind.
    #[error("kernel `{0}` does not declare a layout kind")]
    MissingLayout(String),
    /// Two arguments of a kernel share a name.
    #[error("kernel `{kernel}`: argument `{argument}` is declared more than once")]
    DuplicateArgument {
        /// The kernel.
        kernel: String,
        /// The repeated name.
        argument: String,
    },
    /// A `depends` entry names no argument of the kernel.
    #[error("kernel `{kernel}`: argument `{argument}` depends on unknown argument `{dependency}`")]
    UnknownDependency {
        /// The kernel.
        kernel: String,
        /// The argument carrying the dependency.
        argument: String,
        /// The missing name.
        dependency: String,
    },
    /// A kernel, function, module or argument name is not a C identifier.
    #[error("`{0}` is not a valid C identifier")]
    InvalidIdentifier(String),
    /// A shape contains an empty dimension expression.
    #[error("kernel `{kernel}`: argument `{argument}` has an empty dimension")]
    EmptyDimension {
        /// The kernel.
        kernel: String,
        /// The argument.
        argument: String,
    },
}

impl SpecError {
    /// The kernel this error concerns, if any.
    #[must_use]
    pub fn kernel(&self) -> Option<&str> {
        match self {
            Self::UnknownType { kernel, .. }
            | Self::DuplicateArgument { kernel, .. }
            | Self::UnknownDependency { kernel, .. }
            | Self::EmptyDimension { kernel, .. } => Some(kernel),
            Self::MissingLayout(kernel) => Some(kernel),
            _ => None,
        }
    }

    /// The argument this error concerns, if any.
    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::DuplicateArgument { argument, .. }
            | Self::UnknownDependency { argument, .. }
            | Self::EmptyDimension { argument, .. } => Some(argument),
            _ => None,
        }
    }
}

/// Result type for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// How an argument is passed to the native function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pointer {
    /// A scalar passed by value.
    #[default]
    Value,
    /// A pointer to a single scalar.
    Scalar,
    /// A pointer to the first element of an array.
    Array,
}

/// One dimension of an array argument's shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DimensionSpec {
    /// A literal extent.
    Fixed(u64),
    /// A name or expression known only at call time, e.g. `n` or `n+5`.
    Symbolic(String),
}

impl DimensionSpec {
    /// Parse a dimension: all-digit text is fixed, anything else symbolic.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = text.parse() {
                return Self::Fixed(n);
            }
        }
        Self::Symbolic(text.to_string())
    }

    /// The dimension as written.
    #[must_use]
    pub fn value(&self) -> String {
        match self {
            Self::Fixed(n) => n.to_string(),
            Self::Symbolic(s) => s.clone(),
        }
    }
}

impl fmt::Display for DimensionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Symbolic(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DimensionSpec {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<u64> for DimensionSpec {
    fn from(n: u64) -> Self {
        Self::Fixed(n)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDimension {
    Int(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for DimensionSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawDimension::deserialize(deserializer)? {
            RawDimension::Int(n) => Self::Fixed(n),
            RawDimension::Text(s) => Self::parse(&s),
        })
    }
}

impl Serialize for DimensionSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fixed(n) => serializer.serialize_u64(*n),
            Self::Symbolic(s) => serializer.serialize_str(s),
        }
    }
}

/// One argument of a native function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// Name, unique within the kernel.
    pub name: String,
    /// Scalar element type.
    #[serde(rename = "type")]
    pub ty: ScalarType,
    /// Native C spelling of the element type, if not the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctype: Option<String>,
    /// Pointer arity.
    #[serde(default)]
    pub pointer: Pointer,
    /// Ordered dimensions, present only for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<DimensionSpec>>,
    /// Raw intent tags.
    #[serde(default)]
    pub intent: IntentSet,
    /// Literal C expression used when the caller's slot is missing.
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Arguments whose setup must run before this one's.
    #[serde(default, rename = "depends", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ArgumentSpec {
    /// A by-value scalar argument with no intent tags.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ScalarType) -> Self {
        Self {
            name: name.into(),
            ty,
            ctype: None,
            pointer: Pointer::Value,
            shape: None,
            intent: IntentSet::EMPTY,
            default_value: None,
            depends_on: Vec::new(),
        }
    }

    /// Pass the argument as a pointer to a single scalar.
    #[must_use]
    pub fn by_pointer(mut self) -> Self {
        self.pointer = Pointer::Scalar;
        self
    }

    /// Make the argument an array with the given shape.
    #[must_use]
    pub fn array<D: Into<DimensionSpec>>(mut self, shape: impl IntoIterator<Item = D>) -> Self {
        self.pointer = Pointer::Array;
        self.shape = Some(shape.into_iter().map(Into::into).collect());
        self
    }

    /// Set the intent tags.
    #[must_use]
    pub fn intent(mut self, tags: &[IntentTag]) -> Self {
        self.intent = IntentSet::of(tags);
        self
    }

    /// Set the default value expression.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Add dependencies.
    #[must_use]
    pub fn depends_on<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Override the native type spelling.
    #[must_use]
    pub fn ctype(mut self, ctype: impl Into<String>) -> Self {
        self.ctype = Some(ctype.into());
        self
    }

    /// The native C spelling of the element type.
    #[must_use]
    pub fn c_type(&self) -> &str {
        self.ctype.as_deref().unwrap_or(self.ty.c_type())
    }

    /// True if this argument is an array.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.pointer == Pointer::Array
    }
}

/// One native function wrapped for one memory-layout kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Name under which the host runtime registers the kernel.
    pub kernel_name: String,
    /// Native symbol to call.
    pub function_name: String,
    /// Scalar return type; `None` for `void`.
    pub return_type: Option<ScalarType>,
    /// Native spelling of the return type, if not the default.
    pub return_ctype: Option<String>,
    /// Memory-layout kind the wrapper implements.
    pub layout: LayoutKind,
    /// How dimensions appear in the signature.
    pub array_kind: ArrayKind,
    /// Ellipsis prefix for every signature entry, e.g. `...`.
    pub ellipsis: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Arguments in declaration order.
    pub arguments: Vec<ArgumentSpec>,
}

impl KernelSpec {
    /// A void kernel with no arguments.
    #[must_use]
    pub fn new(
        kernel_name: impl Into<String>,
        function_name: impl Into<String>,
        layout: LayoutKind,
    ) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            function_name: function_name.into(),
            return_type: None,
            return_ctype: None,
            layout,
            array_kind: ArrayKind::Symbolic,
            ellipsis: None,
            description: None,
            arguments: Vec::new(),
        }
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, ty: ScalarType) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Append an argument.
    #[must_use]
    pub fn argument(mut self, arg: ArgumentSpec) -> Self {
        self.arguments.push(arg);
        self
    }

    /// Set the array kind.
    #[must_use]
    pub fn array_kind(mut self, kind: ArrayKind) -> Self {
        self.array_kind = kind;
        self
    }

    /// Set the ellipsis prefix.
    #[must_use]
    pub fn ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.ellipsis = Some(ellipsis.into());
        self
    }

    /// Look up an argument by name.
    #[must_use]
    pub fn find_argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Check the kernel's basic well-formedness.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an invalid identifier, a repeated
    /// argument name, an empty dimension or an unknown dependency.
    pub fn validate(&self) -> SpecResult<()> {
        check_identifier(&self.kernel_name)?;
        check_identifier(&self.function_name)?;

        let mut seen = FxHashSet::default();
        for arg in &self.arguments {
            check_identifier(&arg.name)?;
            if !seen.insert(arg.name.as_str()) {
                return Err(SpecError::DuplicateArgument {
                    kernel: self.kernel_name.clone(),
                    argument: arg.name.clone(),
                });
            }
            let empty_dim = arg
                .shape
                .iter()
                .flatten()
                .any(|d| matches!(d, DimensionSpec::Symbolic(s) if s.is_empty()));
            if empty_dim {
                return Err(SpecError::EmptyDimension {
                    kernel: self.kernel_name.clone(),
                    argument: arg.name.clone(),
                });
            }
        }

        for arg in &self.arguments {
            if let Some(dep) = arg.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(SpecError::UnknownDependency {
                    kernel: self.kernel_name.clone(),
                    argument: arg.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A pair of type spellings that must agree in size at load time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typemap {
    /// The spelling used by the wrapped library.
    pub orig_type: String,
    /// The spelling used by the host runtime.
    pub normal_type: String,
}

/// A set of kernels compiled into one output unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSpec {
    /// Module name; prefixes the generated table and routines.
    pub module_name: String,
    /// Headers to `#include`.
    pub includes: Vec<String>,
    /// Size agreements checked before registration.
    pub typemaps: Vec<Typemap>,
    /// Kernels, one per (function, layout) pair.
    pub kernels: Vec<KernelSpec>,
}

impl ModuleSpec {
    /// An empty module.
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Self::default()
        }
    }

    /// Append a kernel.
    #[must_use]
    pub fn kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernels.push(kernel);
        self
    }

    /// Check the module name and every kernel.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> SpecResult<()> {
        check_identifier(&self.module_name)?;
        self.kernels.iter().try_for_each(KernelSpec::validate)
    }
}

/// Check that `name` is a C identifier.
fn check_identifier(name: &str) -> SpecResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SpecError::InvalidIdentifier(name.to_string()))
    }
}
