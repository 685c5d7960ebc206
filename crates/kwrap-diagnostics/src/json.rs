//! Machine-readable diagnostics for `--message-format json`.
//!
//! Each diagnostic becomes one flat object; location parts that are not
//! known are omitted:
//!
//! ```json
//! {"severity":"error","code":"E0005","message":"argument `v` declares a default but is an array","kernel":"scale","argument":"v"}
//! ```

use serde::Serialize;

use crate::{Diagnostic, Location, Severity};

/// Borrowed JSON view of a [`Diagnostic`].
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic<'a> {
    /// Severity, lowercase.
    pub severity: Severity,
    /// Stable code such as `E0005`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,
    /// The main message.
    pub message: &'a str,
    /// Module, kernel and argument, flattened into the object.
    #[serde(flatten)]
    pub location: &'a Location,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    notes: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    help: &'a [String],
}

impl<'a> From<&'a Diagnostic> for JsonDiagnostic<'a> {
    fn from(diag: &'a Diagnostic) -> Self {
        Self {
            severity: diag.severity,
            code: diag.code.as_deref(),
            message: &diag.message,
            location: &diag.location,
            notes: &diag.notes,
            help: &diag.help,
        }
    }
}

/// One compact object per line, each terminated by a newline.
///
/// # Errors
///
/// Fails only if serialization fails, which plain strings never do.
pub fn to_json_lines(diagnostics: &[Diagnostic]) -> Result<String, serde_json::Error> {
    diagnostics.iter().try_fold(String::new(), |mut out, diag| {
        out.push_str(&serde_json::to_string(&JsonDiagnostic::from(diag))?);
        out.push('\n');
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_flat_object() {
        let diag = Diagnostic::error("argument `v` declares a default but is an array")
            .with_code("E0005")
            .with_kernel("scale")
            .with_argument("v")
            .with_note("array arguments are always supplied by the caller");

        let value: Value = serde_json::from_str(to_json_lines(&[diag]).unwrap().trim_end()).unwrap();
        assert_eq!(
            value,
            json!({
                "severity": "error",
                "code": "E0005",
                "message": "argument `v` declares a default but is an array",
                "kernel": "scale",
                "argument": "v",
                "notes": ["array arguments are always supplied by the caller"],
            })
        );
    }

    #[test]
    fn test_lines_are_independent() {
        let output = to_json_lines(&[
            Diagnostic::error("error 1").with_module("m"),
            Diagnostic::warning("warning 1"),
        ])
        .unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["module"], "m");
        assert_eq!(lines[1]["severity"], "warning");
        assert!(lines[1].get("code").is_none());
    }
}
