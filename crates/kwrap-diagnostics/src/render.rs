//! Cargo-style diagnostic rendering.
//!
//! ```text
//! error[E0001]: intent tags of `x` select both `Input` and `InOut`
//!   --> module `vec`, kernel `foo`, argument `x`
//!    = note: tags: input, inout
//! ```

use std::io::{IsTerminal, Write};

use crate::{Diagnostic, Severity};

/// Whether output carries ANSI escapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    /// Bold, colored headers.
    Ansi,
    /// No escapes.
    Plain,
}

impl Style {
    /// `Ansi` when stderr is a terminal, `Plain` otherwise.
    #[must_use]
    pub fn detect() -> Self {
        if std::io::stderr().is_terminal() {
            Self::Ansi
        } else {
            Self::Plain
        }
    }

    fn paint(self, sgr: &str, text: &str) -> String {
        match self {
            Self::Ansi => format!("\x1b[{sgr}m{text}\x1b[0m"),
            Self::Plain => text.to_string(),
        }
    }

    fn severity_sgr(severity: Severity) -> &'static str {
        match severity {
            Severity::Bug => "1;35",
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Note => "1;36",
            Severity::Help => "1;32",
        }
    }
}

/// A Cargo-style diagnostic renderer.
#[derive(Clone, Copy, Debug)]
pub struct CargoRenderer {
    style: Style,
}

impl Default for CargoRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CargoRenderer {
    /// Create a renderer that colors output only on a terminal.
    #[must_use]
    pub fn new() -> Self {
        Self::with_style(Style::detect())
    }

    /// Create a renderer with a fixed style.
    #[must_use]
    pub fn with_style(style: Style) -> Self {
        Self { style }
    }

    /// Render one diagnostic.
    pub fn render(&self, diagnostic: &Diagnostic, w: &mut impl Write) -> std::io::Result<()> {
        let style = self.style;
        let head = match &diagnostic.code {
            Some(code) => format!("{}[{code}]", diagnostic.severity.label()),
            None => diagnostic.severity.label().to_string(),
        };
        writeln!(
            w,
            "{}{}",
            style.paint(Style::severity_sgr(diagnostic.severity), &head),
            style.paint("1", &format!(": {}", diagnostic.message))
        )?;

        let gutter = style.paint("1;34", "-->");
        if !diagnostic.location.is_unknown() {
            writeln!(w, "  {gutter} {}", diagnostic.location)?;
        }

        let eq = style.paint("1;34", "=");
        let labelled = diagnostic
            .notes
            .iter()
            .map(|n| ("note", n))
            .chain(diagnostic.help.iter().map(|h| ("help", h)));
        for (label, text) in labelled {
            writeln!(w, "   {eq} {}: {text}", style.paint("1", label))?;
        }

        writeln!(w)
    }

    /// Render the closing summary, if anything was reported.
    pub fn render_summary(
        &self,
        errors: usize,
        warnings: usize,
        w: &mut impl Write,
    ) -> std::io::Result<()> {
        let warn = self.style.paint(Style::severity_sgr(Severity::Warning), "warning");
        let err = self.style.paint(Style::severity_sgr(Severity::Error), "error");
        if warnings > 0 {
            writeln!(w, "{warn}: {warnings} warning{} emitted", plural(warnings))?;
        }
        if errors > 0 {
            writeln!(
                w,
                "{err}: aborting due to {errors} previous error{}",
                plural(errors)
            )?;
        }
        Ok(())
    }

    /// Render every diagnostic and the summary to stderr.
    pub fn render_all(&self, diagnostics: &[Diagnostic]) {
        let mut stderr = std::io::stderr().lock();
        // Nothing useful can be done if stderr is gone.
        let _ = self.render_to(diagnostics, &mut stderr);
    }

    fn render_to(&self, diagnostics: &[Diagnostic], w: &mut impl Write) -> std::io::Result<()> {
        let (mut errors, mut warnings) = (0, 0);
        for diag in diagnostics {
            match diag.severity {
                Severity::Bug | Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Note | Severity::Help => {}
            }
            self.render(diag, w)?;
        }
        self.render_summary(errors, warnings, w)
    }

    /// Render a diagnostic into a string.
    #[must_use]
    pub fn render_to_string(&self, diagnostic: &Diagnostic) -> String {
        let mut buf = Vec::new();
        let _ = self.render(diagnostic, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> CargoRenderer {
        CargoRenderer::with_style(Style::Plain)
    }

    #[test]
    fn test_simple_error() {
        let diag = Diagnostic::error("too many symbolic dimensions")
            .with_code("E0002")
            .with_kernel("wide");

        let output = plain().render_to_string(&diag);

        assert!(output.starts_with("error[E0002]: too many symbolic dimensions\n"));
        assert!(output.contains("  --> kernel `wide`\n"));
    }

    #[test]
    fn test_warning_with_note_and_help() {
        let diag = Diagnostic::warning("dependency cycle")
            .with_code("W0001")
            .with_note("unresolved: a, b")
            .with_help("remove one of the `depends` entries");

        let output = plain().render_to_string(&diag);

        assert!(output.starts_with("warning[W0001]"));
        assert!(output.contains("   = note: unresolved: a, b\n"));
        assert!(output.contains("   = help: remove one"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn test_ansi_wraps_header() {
        let output = CargoRenderer::with_style(Style::Ansi)
            .render_to_string(&Diagnostic::error("x").with_code("E0001"));
        assert!(output.starts_with("\x1b[1;31merror[E0001]\x1b[0m"));
    }

    #[test]
    fn test_summary() {
        let diags = [
            Diagnostic::error("a"),
            Diagnostic::warning("b"),
            Diagnostic::warning("c"),
        ];
        let mut buf = Vec::new();
        plain().render_to(&diags, &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with(
            "warning: 2 warnings emitted\nerror: aborting due to 1 previous error\n"
        ));

        let mut empty = Vec::new();
        plain().render_summary(0, 0, &mut empty).unwrap();
        assert!(empty.is_empty());
    }
}
