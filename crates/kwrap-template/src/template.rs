//! Placeholder templates and guarded choices.

use crate::{Context, Predicate, TemplateError, TemplateResult};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Key(String),
}

/// A literal string with `{key}` placeholders.
///
/// `{{` and `}}` stand for literal braces. Placeholder names may contain
/// ASCII letters, digits, `_` and `-`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl Template {
    /// Parse a template.
    ///
    /// # Errors
    ///
    /// Returns an error on an unbalanced brace or a malformed placeholder.
    pub fn parse(source: &str) -> TemplateResult<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    text.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for (_, k) in chars.by_ref() {
                        if k == '}' {
                            closed = true;
                            break;
                        }
                        key.push(k);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed { position: pos });
                    }
                    if key.is_empty() || !key.chars().all(is_key_char) {
                        return Err(TemplateError::InvalidPlaceholder(key));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Key(key));
                }
                '}' => return Err(TemplateError::UnmatchedClose { position: pos }),
                _ => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    /// Substitute every placeholder from `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingKey`] if a placeholder has no value.
    pub fn render(&self, ctx: &Context) -> TemplateResult<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Key(key) => {
                    let value = ctx
                        .get(key)
                        .ok_or_else(|| TemplateError::MissingKey(key.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// An ordered list of (template, guard) pairs; the first true guard wins.
#[derive(Clone, Debug, Default)]
pub struct Choice {
    arms: Vec<(Template, Predicate)>,
}

impl Choice {
    /// An empty choice.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arm.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub fn when(mut self, source: &str, guard: Predicate) -> TemplateResult<Self> {
        self.arms.push((Template::parse(source)?, guard));
        Ok(self)
    }

    /// Add an arm that always matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub fn otherwise(self, source: &str) -> TemplateResult<Self> {
        self.when(source, Predicate::Always)
    }

    /// Render the first arm whose guard holds, or `None` if none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected template cannot be rendered.
    pub fn render(&self, ctx: &Context) -> TemplateResult<Option<String>> {
        self.arms
            .iter()
            .find(|(_, guard)| guard.eval(ctx))
            .map(|(template, _)| template.render(ctx))
            .transpose()
    }

    /// Render the first matching arm, or the empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected template cannot be rendered.
    pub fn render_or_empty(&self, ctx: &Context) -> TemplateResult<String> {
        Ok(self.render(ctx)?.unwrap_or_default())
    }
}
