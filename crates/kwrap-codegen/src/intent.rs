//! Intent classification.
//!
//! Raw intent tags are reduced to exactly one [`IntentClass`]. The `hide`
//! tag is a modifier: it only becomes the class when no other class
//! matches.

use kwrap_spec::{IntentSet, IntentTag};
use std::fmt;

/// The derived role of an argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntentClass {
    /// Read only.
    Input,
    /// Written only, into an output slot.
    Output,
    /// Read and written back through the input slot.
    InOut,
    /// Modified in place.
    Inplace,
    /// Not supplied by the caller, not returned.
    Hide,
    /// Read from the input slot, written to the output slot.
    InputOutput,
    /// `InOut` that is also returned through an output slot.
    InOutOutput,
    /// `Inplace` that is also returned through an output slot.
    InplaceOutput,
}

impl IntentClass {
    /// All classes.
    pub const ALL: [Self; 8] = [
        Self::Input,
        Self::Output,
        Self::InOut,
        Self::Inplace,
        Self::Hide,
        Self::InputOutput,
        Self::InOutOutput,
        Self::InplaceOutput,
    ];

    /// Upper-case name used in unimplemented-combination sentinels.
    #[must_use]
    pub const fn sentinel_tag(self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Output => "OUTPUT",
            Self::InOut => "INOUT",
            Self::Inplace => "INPLACE",
            Self::Hide => "HIDE",
            Self::InputOutput => "INPUT_OUTPUT",
            Self::InOutOutput => "INOUT_OUTPUT",
            Self::InplaceOutput => "INPLACE_OUTPUT",
        }
    }

    /// True if the argument occupies an output slot.
    #[must_use]
    pub const fn is_output_bearing(self) -> bool {
        matches!(
            self,
            Self::Output | Self::InputOutput | Self::InOutOutput | Self::InplaceOutput
        )
    }

    /// True if the argument occupies an input slot.
    #[must_use]
    pub const fn is_input_bearing(self) -> bool {
        matches!(
            self,
            Self::Input
                | Self::InOut
                | Self::Inplace
                | Self::InputOutput
                | Self::InOutOutput
                | Self::InplaceOutput
        )
    }

    /// True for the three compound classes that read and write.
    #[must_use]
    pub const fn is_dual(self) -> bool {
        matches!(
            self,
            Self::InputOutput | Self::InOutOutput | Self::InplaceOutput
        )
    }

    /// True if the native function writes through the argument and the
    /// result is copied back into the input slot.
    #[must_use]
    pub const fn writes_back_input(self) -> bool {
        matches!(
            self,
            Self::InOut | Self::Inplace | Self::InOutOutput | Self::InplaceOutput
        )
    }
}

impl fmt::Display for IntentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::InOut => "InOut",
            Self::Inplace => "Inplace",
            Self::Hide => "Hide",
            Self::InputOutput => "InputOutput",
            Self::InOutOutput => "InOutOutput",
            Self::InplaceOutput => "InplaceOutput",
        };
        f.write_str(name)
    }
}

/// A successful classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// The derived class.
    pub class: IntentClass,
    /// Whether the `hide` modifier was present.
    pub hidden: bool,
}

/// Tags that select no class, or several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbiguousIntent {
    /// The non-`Hide` classes the tags matched.
    pub matched: Vec<IntentClass>,
}

/// Classify a tag set.
///
/// # Errors
///
/// Returns the matched classes if the set selects none or more than one.
pub fn classify(tags: IntentSet) -> Result<Classification, AmbiguousIntent> {
    let input = tags.contains(IntentTag::Input);
    let output = tags.contains(IntentTag::Output);
    let inout = tags.contains(IntentTag::Inout);
    let inplace = tags.contains(IntentTag::Inplace);
    let hidden = tags.contains(IntentTag::Hide);

    let rules = [
        (IntentClass::Input, input && !output),
        (IntentClass::InOut, inout && !output),
        (IntentClass::Inplace, inplace && !output),
        (IntentClass::Output, output && !(input || inout || inplace)),
        (IntentClass::InputOutput, input && output),
        (IntentClass::InOutOutput, inout && output),
        (IntentClass::InplaceOutput, inplace && output),
    ];
    let matched: Vec<IntentClass> = rules
        .into_iter()
        .filter_map(|(class, hit)| hit.then_some(class))
        .collect();

    match matched.as_slice() {
        [class] => Ok(Classification {
            class: *class,
            hidden,
        }),
        [] if hidden => Ok(Classification {
            class: IntentClass::Hide,
            hidden,
        }),
        _ => Err(AmbiguousIntent { matched }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use IntentTag::{Hide, Inout, Inplace, Input, Output};

    fn class_of(tags: &[IntentTag]) -> Option<IntentClass> {
        classify(IntentSet::of(tags)).ok().map(|c| c.class)
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(class_of(&[Input]), Some(IntentClass::Input));
        assert_eq!(class_of(&[Output]), Some(IntentClass::Output));
        assert_eq!(class_of(&[Input, Output]), Some(IntentClass::InputOutput));
        assert_eq!(class_of(&[Inout]), Some(IntentClass::InOut));
        assert_eq!(class_of(&[Inout, Output]), Some(IntentClass::InOutOutput));
        assert_eq!(class_of(&[Inplace]), Some(IntentClass::Inplace));
        assert_eq!(
            class_of(&[Inplace, Output]),
            Some(IntentClass::InplaceOutput)
        );
        assert_eq!(class_of(&[]), None);
    }

    #[test]
    fn test_hide_is_a_modifier() {
        let c = classify(IntentSet::of(&[Hide, Output])).unwrap();
        assert_eq!(c.class, IntentClass::Output);
        assert!(c.hidden);

        let c = classify(IntentSet::of(&[Hide])).unwrap();
        assert_eq!(c.class, IntentClass::Hide);

        let c = classify(IntentSet::of(&[Input])).unwrap();
        assert!(!c.hidden);
    }

    #[test]
    fn test_conflicting_tags() {
        let err = classify(IntentSet::of(&[Input, Inout])).unwrap_err();
        assert_eq!(err.matched, vec![IntentClass::Input, IntentClass::InOut]);
        let err = classify(IntentSet::EMPTY).unwrap_err();
        assert!(err.matched.is_empty());
    }

    #[test]
    fn test_slot_predicates() {
        for class in IntentClass::ALL {
            assert!(!(class.is_dual() && !class.is_output_bearing()));
            assert_eq!(
                class.is_dual(),
                class.is_input_bearing() && class.is_output_bearing()
            );
        }
        assert!(!IntentClass::Hide.is_input_bearing());
        assert!(!IntentClass::Hide.is_output_bearing());
    }

    proptest! {
        #[test]
        fn prop_classification_is_total(bits in 0u8..32) {
            let tags: IntentSet = IntentTag::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| bits & (1 << i) != 0)
                .map(|(_, t)| t)
                .collect();
            match classify(tags) {
                Ok(c) => {
                    // The class agrees with the slot tags.
                    prop_assert_eq!(c.class.is_output_bearing(), tags.has_output_side());
                    prop_assert_eq!(c.class.is_input_bearing(), tags.has_input_side());
                    prop_assert_eq!(c.hidden, tags.contains(Hide));
                }
                Err(e) => prop_assert!(e.matched.len() != 1),
            }
        }
    }
}
