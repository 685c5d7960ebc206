//! Loading module specs from JSON and TOML.
//!
//! The on-disk format is slightly looser than the in-memory model: a kernel
//! entry may list several layout kinds under `layouts` and is expanded into
//! one [`KernelSpec`] per kind, an argument's `pointer` is inferred from the
//! presence of a `shape`, and `return_type` accepts `"void"`.

use crate::{
    ArgumentSpec, ArrayKind, DimensionSpec, IntentSet, KernelSpec, LayoutKind, ModuleSpec,
    Pointer, ScalarType, SpecError, SpecResult, Typemap,
};
use camino::Utf8Path;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    module_name: String,
    #[serde(default)]
    includes: Vec<String>,
    #[serde(default)]
    typemaps: Vec<Typemap>,
    #[serde(default)]
    kernels: Vec<RawKernel>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKernel {
    kernel_name: String,
    function_name: String,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    return_ctype: Option<String>,
    #[serde(default)]
    layout: Option<LayoutKind>,
    #[serde(default)]
    layouts: Vec<LayoutKind>,
    #[serde(default)]
    array_kind: ArrayKind,
    #[serde(default)]
    ellipsis: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    arguments: Vec<RawArgument>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArgument {
    name: String,
    #[serde(rename = "type")]
    ty: ScalarType,
    #[serde(default)]
    ctype: Option<String>,
    #[serde(default)]
    pointer: Option<Pointer>,
    #[serde(default)]
    shape: Option<Vec<DimensionSpec>>,
    #[serde(default)]
    intent: IntentSet,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    depends: Vec<String>,
}

impl From<RawArgument> for ArgumentSpec {
    fn from(raw: RawArgument) -> Self {
        let pointer = raw.pointer.unwrap_or(if raw.shape.is_some() {
            Pointer::Array
        } else {
            Pointer::Value
        });
        Self {
            name: raw.name,
            ty: raw.ty,
            ctype: raw.ctype,
            pointer,
            shape: raw.shape,
            intent: raw.intent,
            default_value: raw.default,
            depends_on: raw.depends,
        }
    }
}

fn parse_return_type(kernel: &str, text: Option<&str>) -> SpecResult<Option<ScalarType>> {
    match text.map(str::trim) {
        None | Some("void" | "none" | "") => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|source| SpecError::UnknownType {
                kernel: kernel.to_string(),
                source,
            }),
    }
}

impl RawKernel {
    fn expand(self) -> SpecResult<Vec<KernelSpec>> {
        let mut layouts = self.layouts;
        if let Some(layout) = self.layout {
            if !layouts.contains(&layout) {
                layouts.insert(0, layout);
            }
        }
        if layouts.is_empty() {
            return Err(SpecError::MissingLayout(self.kernel_name));
        }

        let return_type = parse_return_type(&self.kernel_name, self.return_type.as_deref())?;
        let arguments: Vec<ArgumentSpec> = self.arguments.into_iter().map(Into::into).collect();

        Ok(layouts
            .into_iter()
            .map(|layout| KernelSpec {
                kernel_name: self.kernel_name.clone(),
                function_name: self.function_name.clone(),
                return_type,
                return_ctype: self.return_ctype.clone(),
                layout,
                array_kind: self.array_kind,
                ellipsis: self.ellipsis.clone(),
                description: self.description.clone(),
                arguments: arguments.clone(),
            })
            .collect())
    }
}

impl RawModule {
    fn into_spec(self) -> SpecResult<ModuleSpec> {
        let mut kernels = Vec::new();
        for raw in self.kernels {
            kernels.extend(raw.expand()?);
        }
        let spec = ModuleSpec {
            module_name: self.module_name,
            includes: self.includes,
            typemaps: self.typemaps,
            kernels,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Parse and validate a module spec from JSON text.
///
/// # Errors
///
/// Returns an error if the text is malformed or fails validation.
pub fn from_json_str(text: &str) -> SpecResult<ModuleSpec> {
    serde_json::from_str::<RawModule>(text)?.into_spec()
}

/// Parse and validate a module spec from TOML text.
///
/// # Errors
///
/// Returns an error if the text is malformed or fails validation.
pub fn from_toml_str(text: &str) -> SpecResult<ModuleSpec> {
    toml::from_str::<RawModule>(text)?.into_spec()
}

/// Load a module spec from a `.json` or `.toml` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unsupported
/// extension, is malformed, or fails validation.
pub fn load(path: &Utf8Path) -> SpecResult<ModuleSpec> {
    let parse = match path.extension() {
        Some("json") => from_json_str,
        Some("toml") => from_toml_str,
        _ => return Err(SpecError::UnsupportedFormat(path.to_path_buf())),
    };
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_expand() {
        let spec = from_json_str(
            r#"{
                "module_name": "m",
                "kernels": [{
                    "kernel_name": "k",
                    "function_name": "f",
                    "layouts": ["c", "fortran", "xnd"],
                    "arguments": [{"name": "x", "type": "double", "shape": ["n"], "intent": ["input"]}]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.kernels.len(), 3);
        assert_eq!(spec.kernels[1].layout, LayoutKind::ColumnMajor);
        assert_eq!(spec.kernels[2].arguments[0].pointer, Pointer::Array);
    }

    #[test]
    fn test_return_type_void() {
        assert_eq!(parse_return_type("k", Some("void")).unwrap(), None);
        assert_eq!(
            parse_return_type("k", Some("double")).unwrap(),
            Some(ScalarType::Float64)
        );
        assert!(matches!(
            parse_return_type("k", Some("quad")),
            Err(SpecError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_missing_layout() {
        let err = from_json_str(
            r#"{"module_name": "m", "kernels": [{"kernel_name": "k", "function_name": "f"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::MissingLayout(name) if name == "k"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = from_json_str(r#"{"module_name": "m", "kernals": []}"#).unwrap_err();
        assert!(matches!(err, SpecError::Json(_)));
    }
}
