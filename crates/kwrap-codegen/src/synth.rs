//! The per-argument code matrix.
//!
//! Every (form, class, layout) cell is either real code or an explicit
//! [`Cell::Unimplemented`] marker. Unimplemented cells render as a bare
//! undeclared identifier so the generated unit refuses to compile and
//! names the missing combination.

use crate::argument::{ArgForm, ResolvedArgument};
use crate::intent::IntentClass;
use crate::sequence::Fragment;
use kwrap_spec::LayoutKind;
use kwrap_template::{flag, has, is, Choice, Context, TemplateResult};
use tracing::debug;

/// Marks where the native call goes inside a cell's source.
const CALL_SITE: &str = "...";

const SCALAR_READ: &str = "{name} = *GMK_SCALAR_DATA({ctype}, gmk_input_{name});";
const SCALAR_READ_OR_DEFAULT: &str =
    "{name} = (xnd_is_na(&gmk_input_{name}) ? {value} : *GMK_SCALAR_DATA({ctype}, gmk_input_{name}));";
const SCALAR_ASSIGN_DEFAULT: &str = "{name} = {value};";
const SCALAR_WRITE_INPUT: &str = "*GMK_SCALAR_DATA({ctype}, gmk_input_{name}) = {name};";
const SCALAR_WRITE_OUTPUT: &str = "*GMK_SCALAR_DATA({ctype}, gmk_output_{name}) = {name};";

const ARRAY_INPUT_C: &str = "\
if (ndt_is_c_contiguous(gmk_input_{name}.type))
  {name} = GMK_FIXED_ARRAY_DATA({ctype}, gmk_input_{name});
else
  {name} = ({ctype}*)xndtools_copy(&gmk_input_{name}, gmk_ctx);
if ({name} != NULL) {{
...
if (!ndt_is_c_contiguous(gmk_input_{name}.type))
  free({name});
}} else gmk_success = -1; /* if ({name} != NULL) */";

const ARRAY_INPUT_FORTRAN: &str = "\
if (ndt_is_f_contiguous(gmk_input_{name}.type))
  {name} = GMK_FIXED_ARRAY_DATA({ctype}, gmk_input_{name});
else
  {name} = ({ctype}*)xndtools_fcopy(&gmk_input_{name}, gmk_ctx);
if ({name} != NULL) {{
...
if (!ndt_is_f_contiguous(gmk_input_{name}.type))
  free({name});
}} else gmk_success = -1; /* if ({name} != NULL) */";

const ARRAY_INPUT_XND: &str = "\
{name} = ({ctype}*)xndtools_copy(&gmk_input_{name}, gmk_ctx);
if ({name} != NULL) {{
...
  free({name});
}} else gmk_success = -1; /* if ({name} != NULL) */";

const ARRAY_OUTPUT_XND: &str = "{name} = GMK_FIXED_ARRAY_DATA({ctype}, gmk_output_{name});";

const ARRAY_INPUT_OUTPUT_XND: &str = "\
{name} = GMK_FIXED_ARRAY_DATA({ctype}, gmk_output_{name});
xndtools_cpy((char*){name}, &gmk_input_{name}, ndt_is_f_contiguous(gmk_output_{name}.type));";

/// One cell of the code matrix.
#[derive(Clone, Debug)]
pub enum Cell {
    /// Real code.
    Implemented {
        /// Rendered before the native call.
        enter: Choice,
        /// Rendered after the native call.
        exit: Choice,
        /// Whether the enter half may allocate a temporary.
        uses_temp: bool,
    },
    /// A combination with no implementation.
    Unimplemented {
        /// Identifier naming the combination.
        label: String,
    },
}

impl Cell {
    fn split(source: &str, uses_temp: bool) -> TemplateResult<Self> {
        let (enter, exit) = source.split_once(CALL_SITE).unwrap_or((source, ""));
        Ok(Self::Implemented {
            enter: Choice::new().otherwise(enter.trim_end_matches('\n'))?,
            exit: Choice::new().otherwise(exit.trim_start_matches('\n'))?,
            uses_temp,
        })
    }

    fn unimplemented(class: IntentClass, layout: LayoutKind) -> Self {
        Self::Unimplemented {
            label: format!(
                "NOTIMPLEMENTED_{}_{}",
                class.sentinel_tag(),
                layout.sentinel_tag()
            ),
        }
    }
}

/// Scalar code does not depend on the layout kind.
fn scalar_cell(class: IntentClass) -> TemplateResult<Cell> {
    let read_or_default = || {
        Choice::new()
            .when(SCALAR_READ_OR_DEFAULT, has("value"))?
            .otherwise(SCALAR_READ)
    };
    let assign_default = || Choice::new().when(SCALAR_ASSIGN_DEFAULT, has("value"));
    let always = |source: &str| Choice::new().otherwise(source);

    let (enter, exit) = match class {
        IntentClass::Input => (read_or_default()?, Choice::new()),
        IntentClass::InOut | IntentClass::Inplace => {
            (read_or_default()?, always(SCALAR_WRITE_INPUT)?)
        }
        IntentClass::Output => (assign_default()?, always(SCALAR_WRITE_OUTPUT)?),
        IntentClass::Hide => (assign_default()?, Choice::new()),
        IntentClass::InputOutput => (always(SCALAR_READ)?, always(SCALAR_WRITE_OUTPUT)?),
        IntentClass::InOutOutput | IntentClass::InplaceOutput => (
            always(SCALAR_READ)?,
            always(&format!("{SCALAR_WRITE_INPUT}\n{SCALAR_WRITE_OUTPUT}"))?,
        ),
    };
    Ok(Cell::Implemented {
        enter,
        exit,
        uses_temp: false,
    })
}

/// Look up a cell of the code matrix.
///
/// # Errors
///
/// Fails only if a built-in template is malformed.
pub fn cell(form: ArgForm, class: IntentClass, layout: LayoutKind) -> TemplateResult<Cell> {
    use IntentClass as C;
    use LayoutKind as L;

    match (form, class, layout) {
        (ArgForm::Scalar, class, _) => scalar_cell(class),

        (ArgForm::Array, C::Input, L::RowMajor) => Cell::split(ARRAY_INPUT_C, true),
        (ArgForm::Array, C::Input, L::ColumnMajor) => Cell::split(ARRAY_INPUT_FORTRAN, true),
        (ArgForm::Array, C::Input, L::Container) => Cell::split(ARRAY_INPUT_XND, true),
        (ArgForm::Array, C::Output, L::Container) => Cell::split(ARRAY_OUTPUT_XND, false),
        (ArgForm::Array, C::InputOutput, L::Container) => {
            Cell::split(ARRAY_INPUT_OUTPUT_XND, false)
        }

        (ArgForm::Array, C::Input, L::Strided)
        | (ArgForm::Array, C::Output | C::InputOutput, L::RowMajor | L::ColumnMajor | L::Strided)
        | (
            ArgForm::Array,
            C::InOut | C::Inplace | C::Hide | C::InOutOutput | C::InplaceOutput,
            L::RowMajor | L::ColumnMajor | L::Strided | L::Container,
        ) => Ok(Cell::unimplemented(class, layout)),
    }
}

/// Render one argument's fragment.
///
/// `ctx` must already hold the argument's attributes layered over the
/// kernel's.
///
/// # Errors
///
/// Fails if a template references an attribute missing from `ctx`.
pub fn synthesize(
    arg: &ResolvedArgument,
    layout: LayoutKind,
    ctx: &Context,
) -> TemplateResult<Fragment> {
    let fragment = Fragment::new(arg.name.as_str()).depends_on(arg.depends_on.iter().cloned());
    let fragment = match arg.use_expr() {
        Some(expr) => fragment.use_expr(expr),
        None => fragment,
    };

    match cell(arg.form(), arg.class, layout)? {
        Cell::Implemented { enter, exit, .. } => Ok(fragment
            .enter(enter.render_or_empty(ctx)?)
            .exit(exit.render_or_empty(ctx)?)),
        Cell::Unimplemented { label } => {
            debug!(argument = %arg.name, %label, "unimplemented combination");
            Ok(fragment.enter(format!("{label}_{};", arg.name)))
        }
    }
}

/// Declarations emitted at the top of a wrapper for each argument.
#[derive(Clone, Debug)]
pub struct Declarations {
    comment: Choice,
    local: Choice,
    input: Choice,
    input_debug: Choice,
    output: Choice,
    constraint: Choice,
}

impl Declarations {
    /// Build the declaration templates.
    ///
    /// # Errors
    ///
    /// Fails only if a built-in template is malformed.
    pub fn new() -> TemplateResult<Self> {
        Ok(Self {
            comment: Choice::new().otherwise("/* {name} intent: {intent} */")?,
            local: Choice::new()
                .when("{ctype}* {name} = NULL;", is("pointer", "array"))?
                .otherwise("{ctype} {name};")?,
            input: Choice::new().when(
                "const xnd_t gmk_input_{name} = gmk_stack[{input_index}];",
                has("input_index"),
            )?,
            input_debug: Choice::new().when(
                r#"DEBUGMSG1("gmk_input_{name}.type=%s\n", ndt_as_string(gmk_input_{name}.type, gmk_ctx));"#,
                has("input_index") & flag("debug"),
            )?,
            output: Choice::new().when(
                "const xnd_t gmk_output_{name} = gmk_stack[{output_slot}];",
                has("output_slot"),
            )?,
            constraint: Choice::new().when(
                "{ctype} {name} = *({ctype}*)(((xnd_t *)gmk_args)[{input_index}].ptr);",
                has("input_index") & !is("pointer", "array"),
            )?,
        })
    }

    /// Wrapper-local declarations for one argument.
    ///
    /// # Errors
    ///
    /// Fails if a template references an attribute missing from `ctx`.
    pub fn wrapper(&self, ctx: &Context) -> TemplateResult<Vec<String>> {
        let mut lines = Vec::new();
        for choice in [
            &self.comment,
            &self.local,
            &self.input,
            &self.input_debug,
            &self.output,
        ] {
            if let Some(line) = choice.render(ctx)? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Constraint-function declaration for one argument, if it has one.
    ///
    /// # Errors
    ///
    /// Fails if a template references an attribute missing from `ctx`.
    pub fn constraint(&self, ctx: &Context) -> TemplateResult<Option<String>> {
        self.constraint.render(ctx)
    }
}
