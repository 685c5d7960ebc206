//! Long-form explanations for diagnostic codes, printed by
//! `kwrap explain E0001`.
//!
//! `E000x` codes reject a kernel; `W000x` codes are warnings and
//! generation proceeds.

use std::fmt;

/// The long-form explanation of one diagnostic code.
#[derive(Clone, Copy, Debug)]
pub struct Explanation {
    /// The code, e.g. `E0005`.
    pub code: &'static str,
    /// One-line title.
    pub title: &'static str,
    /// Prose explanation.
    pub body: &'static str,
    /// A spec fragment that triggers the diagnostic.
    pub wrong: Option<&'static str>,
    /// The same fragment, fixed.
    pub fixed: Option<&'static str>,
    /// Related codes.
    pub see_also: &'static [&'static str],
}

static EXPLANATIONS: &[Explanation] = &[
    Explanation {
        code: "E0001",
        title: "Intent tags do not select exactly one class",
        body: r#"
Every argument's intent tags must resolve to exactly one intent class:
Input, Output, InOut, Inplace, InputOutput, InOutOutput, InplaceOutput,
or (for derived arguments only) Hide.

An empty tag set selects nothing. Combining two input-side tags such as
`input` and `inout` selects two classes at once. Both are rejected and
the kernel is not generated.
"#,
        wrong: Some(
            r#"
[[kernels.arguments]]
name = "x"
intent = ["input", "inout"]
"#,
        ),
        fixed: Some(
            r#"
[[kernels.arguments]]
name = "x"
intent = ["inout"]
"#,
        ),
        see_also: &["E0003", "E0004"],
    },
    Explanation {
        code: "E0002",
        title: "Too many symbolic dimensions",
        body: r#"
Each distinct symbolic dimension name in a kernel is assigned a single
letter from a fixed 25-letter alphabet. A kernel that uses more than 25
distinct symbolic dimension names cannot be described to the host runtime
and is rejected.
"#,
        wrong: None,
        fixed: None,
        see_also: &[],
    },
    Explanation {
        code: "E0003",
        title: "Default value on a dual-direction scalar",
        body: r#"
A default value replaces a missing input. For a scalar that is both read
and written (InputOutput, InOutOutput or InplaceOutput) a default cannot
say which side it belongs to, so the combination is rejected.
"#,
        wrong: Some(
            r#"
[[kernels.arguments]]
name = "alpha"
type = "float64"
pointer = "scalar"
intent = ["input", "output"]
default = "1.0"
"#,
        ),
        fixed: Some(
            r#"
[[kernels.arguments]]
name = "alpha"
type = "float64"
pointer = "scalar"
intent = ["input"]
default = "1.0"
"#,
        ),
        see_also: &["E0001"],
    },
    Explanation {
        code: "E0004",
        title: "Intent class not valid for a by-value scalar",
        body: r#"
InOut, Inplace, InOutOutput and InplaceOutput require the native function
to write through the argument. A scalar passed by value cannot be written,
so declare it as a pointer to scalar instead.
"#,
        wrong: Some(
            r#"
[[kernels.arguments]]
name = "count"
type = "int64"
intent = ["inout"]
"#,
        ),
        fixed: Some(
            r#"
[[kernels.arguments]]
name = "count"
type = "int64"
pointer = "scalar"
intent = ["inout"]
"#,
        ),
        see_also: &["E0001"],
    },
    Explanation {
        code: "E0005",
        title: "Array argument with a default value",
        body: r#"
Default values are literal scalar expressions. An array argument is always
supplied through its stack slot and cannot take a default.
"#,
        wrong: None,
        fixed: None,
        see_also: &["E0006"],
    },
    Explanation {
        code: "E0006",
        title: "Shape does not agree with pointer arity",
        body: r#"
An argument declared as a pointer to an array must carry a shape, and a
scalar or pointer-to-scalar argument must not.
"#,
        wrong: None,
        fixed: None,
        see_also: &["E0005"],
    },
    Explanation {
        code: "E0007",
        title: "Hidden by-value scalar without a default",
        body: r#"
A hidden argument is not supplied by the caller. When it is also passed by
value and has no default, nothing can ever give it a value. Add a default
expression (often derived from another argument's shape) or pass it by
address so the native function can fill it in.
"#,
        wrong: None,
        fixed: Some(
            r#"
[[kernels.arguments]]
name = "n"
type = "int64"
intent = ["hide"]
default = "xnd_fixed_shape_at(&gmk_input_x, 0)"
depends = ["x"]
"#,
        ),
        see_also: &[],
    },
    Explanation {
        code: "E0008",
        title: "Template expansion failed",
        body: r#"
A code fragment referenced a placeholder that has no value in the current
argument or kernel context, or contained an unbalanced brace. This is a
generator bug unless the failing placeholder comes from a user-supplied
default expression containing `{` or `}`.
"#,
        wrong: None,
        fixed: None,
        see_also: &[],
    },
    Explanation {
        code: "E0009",
        title: "Invalid kernel specification",
        body: r#"
The module spec failed basic validation: an argument name is repeated in a
kernel, a `depends` entry names an argument that does not exist, or a
name is not a valid C identifier.
"#,
        wrong: None,
        fixed: None,
        see_also: &[],
    },
    Explanation {
        code: "W0001",
        title: "Dependency cycle between argument fragments",
        body: r#"
The `depends` entries of a kernel's arguments form a cycle, so no order
satisfies all of them. Generation continues: the fragments that could not
be ordered are appended in declaration order, and the resulting wrapper
should be reviewed by hand.
"#,
        wrong: Some(
            r#"
[[kernels.arguments]]
name = "a"
depends = ["b"]

[[kernels.arguments]]
name = "b"
depends = ["a"]
"#,
        ),
        fixed: None,
        see_also: &[],
    },
    Explanation {
        code: "W0002",
        title: "Conflicting layout entry in a kernel table row",
        body: r#"
Two wrappers with the same kernel name, signature and output-symbol count
were generated for the same layout kind but with different entry points.
The first one is kept in the kernel table.
"#,
        wrong: None,
        fixed: None,
        see_also: &[],
    },
];

/// Look up the explanation of `code`, ignoring ASCII case.
#[must_use]
pub fn get_explanation(code: &str) -> Option<&'static Explanation> {
    EXPLANATIONS
        .iter()
        .find(|e| e.code.eq_ignore_ascii_case(code))
}

/// Every explained code, errors before warnings.
pub fn all_error_codes() -> impl Iterator<Item = &'static str> {
    EXPLANATIONS.iter().map(|e| e.code)
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} - {}\n", self.code, self.title)?;
        writeln!(f, "{}\n", self.body.trim())?;
        for (heading, fragment) in [
            ("Example of erroneous spec", self.wrong),
            ("Corrected spec", self.fixed),
        ] {
            if let Some(fragment) = fragment {
                writeln!(f, "## {heading}:\n```toml\n{}\n```\n", fragment.trim())?;
            }
        }
        if let Some((first, rest)) = self.see_also.split_first() {
            write!(f, "See also: `{first}`")?;
            for code in rest {
                write!(f, ", `{code}`")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Print the explanation of `code` to stdout, or the list of known codes.
pub fn print_explanation(code: &str) {
    match get_explanation(code) {
        Some(explanation) => print!("{explanation}"),
        None => {
            println!("Error code `{code}` not found.\n\nAvailable error codes:");
            for e in EXPLANATIONS {
                println!("  {}: {}", e.code, e.title);
            }
        }
    }
}
