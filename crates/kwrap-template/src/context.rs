//! Attribute maps that templates and predicates are evaluated against.

use rustc_hash::FxHashMap;

/// An immutable-by-convention snapshot of string attributes.
///
/// Flags are stored as attributes too: a flag is set when its value is
/// anything other than empty, `"0"` or `"false"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Context {
    attrs: FxHashMap<String, String>,
}

impl Context {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Set an attribute, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set or clear a flag.
    pub fn set_flag(&mut self, key: impl Into<String>, on: bool) -> &mut Self {
        let key = key.into();
        if on {
            self.attrs.insert(key, "true".to_string());
        } else {
            self.attrs.remove(&key);
        }
        self
    }

    /// Look up an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Check whether an attribute is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Check whether a flag is set.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(v) if !v.is_empty() && v != "0" && v != "false")
    }

    /// A copy of this context with `other`'s attributes layered on top.
    #[must_use]
    pub fn layered(&self, other: &Self) -> Self {
        let mut attrs = self.attrs.clone();
        attrs.extend(other.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { attrs }
    }
}
