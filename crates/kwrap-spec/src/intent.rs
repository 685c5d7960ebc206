//! Raw intent tags as written in a kernel spec.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One caller-facing data-flow tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentTag {
    /// Read by the native function.
    Input,
    /// Written by the native function into an output slot.
    Output,
    /// Read and written back through the same input slot.
    Inout,
    /// Modified in place.
    Inplace,
    /// Not supplied by the caller.
    Hide,
}

impl IntentTag {
    /// All tags, in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Input,
        Self::Output,
        Self::Inout,
        Self::Inplace,
        Self::Hide,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Input => 1,
            Self::Output => 1 << 1,
            Self::Inout => 1 << 2,
            Self::Inplace => 1 << 3,
            Self::Hide => 1 << 4,
        }
    }

    /// The tag as written in a spec.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Inout => "inout",
            Self::Inplace => "inplace",
            Self::Hide => "hide",
        }
    }
}

/// A set of intent tags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<IntentTag>", into = "Vec<IntentTag>")]
pub struct IntentSet(u8);

impl IntentSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Build a set from tags.
    #[must_use]
    pub fn of(tags: &[IntentTag]) -> Self {
        tags.iter().fold(Self::EMPTY, |set, &tag| set.with(tag))
    }

    /// Return the set with `tag` added.
    #[must_use]
    pub const fn with(self, tag: IntentTag) -> Self {
        Self(self.0 | tag.bit())
    }

    /// Check membership.
    #[must_use]
    pub const fn contains(self, tag: IntentTag) -> bool {
        self.0 & tag.bit() != 0
    }

    /// Check whether no tag is present.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the tags present, in canonical order.
    pub fn iter(self) -> impl Iterator<Item = IntentTag> {
        IntentTag::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    /// True if any input-side tag (`input`, `inout`, `inplace`) is present.
    ///
    /// Such arguments occupy an input slot of the calling convention.
    #[must_use]
    pub const fn has_input_side(self) -> bool {
        self.contains(IntentTag::Input)
            || self.contains(IntentTag::Inout)
            || self.contains(IntentTag::Inplace)
    }

    /// True if the `output` tag is present.
    ///
    /// Such arguments occupy an output slot of the calling convention.
    #[must_use]
    pub const fn has_output_side(self) -> bool {
        self.contains(IntentTag::Output)
    }
}

impl From<Vec<IntentTag>> for IntentSet {
    fn from(tags: Vec<IntentTag>) -> Self {
        Self::of(&tags)
    }
}

impl From<IntentSet> for Vec<IntentTag> {
    fn from(set: IntentSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<IntentTag> for IntentSet {
    fn from_iter<I: IntoIterator<Item = IntentTag>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for IntentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(IntentTag::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

impl fmt::Debug for IntentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{self}}}")
    }
}
