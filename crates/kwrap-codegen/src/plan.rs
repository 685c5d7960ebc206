//! Per-kernel wrapper plans.
//!
//! [`plan_kernel`] runs the whole per-kernel pipeline: classification,
//! symbol resolution, fragment synthesis, sequencing, and rendering of the
//! wrapper and constraint functions.

use crate::argument::{resolve_arguments, ResolvedArgument};
use crate::sequence::{emit, sequence, Fragment};
use crate::shape::{ResolvedDim, SymbolTable};
use crate::synth::{synthesize, Declarations};
use crate::{CodegenError, CodegenOptions, CodegenResult, CodegenWarning};
use kwrap_spec::{ArrayKind, KernelSpec, LayoutKind};
use kwrap_template::{flag, is, Choice, Context, Template, TemplateError};
use tracing::debug;

const WRAPPER_TEMPLATE: &str = r#"
/*
  Kernel: {kernel_name}
  Signature: "{sig}"
  External function: {function_name}
*/
static int {wrapper_name}_counter = 0;
static int
{wrapper_name}(xnd_t gmk_stack[], ndt_context_t *gmk_ctx) {{
  {wrapper_name}_counter += 1;
  {entering}
  int gmk_success = 0;
  {declarations}
  {body-start}
  {return_value}{function_name}({arguments});
  {body-end}
  {leaving}
  return gmk_success;
}}
"#;

const STRIDED_WRAPPER_TEMPLATE: &str = r#"
static int {wrapper_name}_counter = 0;
static int
{wrapper_name}(char **args, intptr_t *dimensions, intptr_t *steps, void *data) {{
  {wrapper_name}_counter += 1;
  {entering}
  int gmk_success = 0;
  NOT_IMPLEMENTED_KIND_{kind}_for_{function_name};
  {leaving}
  return gmk_success;
}}
"#;

const CONSTRAINT_TEMPLATE: &str = r#"
static int
gmk_{kernel_name}_constraint_func(int64_t *gmk_shapes, const void *gmk_args, ndt_context_t *gmk_ctx) {{
  {constraint_declarations}
  {constraints}
  return 0;
}}
static const ndt_constraint_t
gmk_{kernel_name}_constraint = {{ .f = gmk_{kernel_name}_constraint_func, .nin = {nin_symbols}, .nout = {nout_symbols}, .symbols = {{ {symbols} }} }};
"#;

/// Everything generated for one kernel and one layout kind.
#[derive(Clone, Debug)]
pub struct WrapperPlan {
    /// Kernel name in the host's table.
    pub kernel_name: String,
    /// Native symbol called.
    pub function_name: String,
    /// Layout kind implemented.
    pub layout: LayoutKind,
    /// Entry-point name.
    pub wrapper_name: String,
    /// Host signature, e.g. `N * float64 -> float64`.
    pub signature: String,
    /// Arguments, including the return-value pseudo-argument.
    pub arguments: Vec<ResolvedArgument>,
    /// Kernel symbols.
    pub symbols: SymbolTable,
    /// Number of input slots.
    pub nin: usize,
    /// Number of output slots.
    pub nout: usize,
    /// Fragments, in sequenced order.
    pub fragments: Vec<Fragment>,
    /// Native call expression, without the return-value assignment.
    pub call: String,
    /// Rendered wrapper function.
    pub wrapper_source: String,
    /// Rendered constraint function, if any output symbol exists.
    pub constraint_source: Option<String>,
    /// Problems that did not stop generation.
    pub warnings: Vec<CodegenWarning>,
}

impl WrapperPlan {
    /// Number of output-side symbols.
    #[must_use]
    pub fn nout_symbols(&self) -> usize {
        self.symbols.output_symbols().len()
    }

    /// True if the kernel needs a constraint function.
    #[must_use]
    pub fn needs_constraint(&self) -> bool {
        self.nout_symbols() > 0
    }

    /// Name of the constraint object referenced from the kernel table.
    #[must_use]
    pub fn constraint_name(&self) -> Option<String> {
        self.needs_constraint()
            .then(|| format!("gmk_{}_constraint", self.kernel_name))
    }
}

/// Entry-point name of a kernel's wrapper for its layout.
#[must_use]
pub fn wrapper_name(kernel: &KernelSpec) -> String {
    let ellipsis_name = if kernel.ellipsis.is_some() { "dims" } else { "fixed" };
    format!(
        "gmk_{}_{}_{}_{}_{}",
        kernel.kernel_name,
        ellipsis_name,
        kernel.array_kind.as_str(),
        kernel.layout.table_field(),
        kernel.function_name
    )
}

fn signature_entry(arg: &ResolvedArgument, kernel: &KernelSpec) -> String {
    let mut entry = String::new();
    if let Some(ellipsis) = &kernel.ellipsis {
        entry.push_str(ellipsis);
        entry.push_str(" * ");
    }
    if let Some(shape) = &arg.shape {
        for dim in &shape.dims {
            match (kernel.array_kind, dim) {
                (ArrayKind::Variable, _) => entry.push_str("var"),
                (ArrayKind::Symbolic, ResolvedDim::Fixed(n)) => entry.push_str(&n.to_string()),
                (ArrayKind::Symbolic, ResolvedDim::Symbol { symbol, .. }) => entry.push(*symbol),
            }
            entry.push_str(" * ");
        }
    }
    entry.push_str(arg.ty.ndt_name());
    entry
}

/// Host signature string: inputs, `->`, outputs; `void` for an empty side.
#[must_use]
pub fn signature(arguments: &[ResolvedArgument], kernel: &KernelSpec) -> String {
    let side = |pick: fn(&ResolvedArgument) -> bool| {
        let entries: Vec<String> = arguments
            .iter()
            .filter(|a| pick(a))
            .map(|a| signature_entry(a, kernel))
            .collect();
        if entries.is_empty() {
            "void".to_string()
        } else {
            entries.join(", ")
        }
    };
    format!(
        "{} -> {}",
        side(|a| a.class.is_input_bearing()),
        side(|a| a.class.is_output_bearing())
    )
}

/// Join statements, indenting continuation lines to the wrapper body.
fn block(items: &[String]) -> String {
    items
        .iter()
        .flat_map(|item| item.lines())
        .collect::<Vec<_>>()
        .join("\n  ")
}

/// Drop lines left empty by empty sections.
fn tidy(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for (i, line) in source.lines().enumerate() {
        if i > 0 && line.trim().is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn kernel_context(kernel: &KernelSpec, wrapper_name: &str, options: &CodegenOptions) -> Context {
    let mut ctx = Context::new();
    ctx.set("kernel_name", kernel.kernel_name.as_str())
        .set("function_name", kernel.function_name.as_str())
        .set("wrapper_name", wrapper_name)
        .set("kind", kernel.layout.table_field())
        .set("arraytype", kernel.array_kind.as_str())
        .set_flag("debug", options.debug);
    if kernel.return_type.is_some() {
        ctx.set("return_type", "true");
    }
    ctx
}

/// Build the wrapper plan for one kernel.
///
/// # Errors
///
/// Returns a [`CodegenError`] for any configuration the matrix rejects;
/// such a kernel produces no plan at all.
pub fn plan_kernel(kernel: &KernelSpec, options: &CodegenOptions) -> CodegenResult<WrapperPlan> {
    let template_err = |source: TemplateError| CodegenError::Template {
        kernel: kernel.kernel_name.clone(),
        source,
    };

    let resolved = resolve_arguments(kernel)?;
    let wrapper_name = wrapper_name(kernel);
    let signature = signature(&resolved.arguments, kernel);
    debug!(
        kernel = %kernel.kernel_name,
        layout = %kernel.layout,
        %signature,
        symbols = resolved.symbols.len(),
        "resolved kernel arguments"
    );

    let kernel_ctx = kernel_context(kernel, &wrapper_name, options);
    let declarations = Declarations::new().map_err(template_err)?;

    let mut fragments = Vec::with_capacity(resolved.arguments.len());
    let mut decl_lines = Vec::new();
    let mut constraint_decls = Vec::new();
    for arg in &resolved.arguments {
        let ctx = kernel_ctx.layered(&arg.context(kernel.layout));
        fragments.push(synthesize(arg, kernel.layout, &ctx).map_err(template_err)?);
        decl_lines.extend(declarations.wrapper(&ctx).map_err(template_err)?);
        constraint_decls.extend(declarations.constraint(&ctx).map_err(template_err)?);
    }

    let call = fragments
        .iter()
        .filter_map(|f| f.use_expr.as_deref())
        .collect::<Vec<_>>()
        .join(", ");

    let ordering = sequence(&fragments);
    let mut warnings = Vec::new();
    if ordering.has_cycle() {
        warnings.push(CodegenWarning::DependencyCycle {
            kernel: kernel.kernel_name.clone(),
            unresolved: ordering.unresolved.clone(),
            cycles: ordering.cycles.clone(),
        });
    }
    let emission = emit(&fragments, &ordering.order);

    let entering = Choice::new()
        .when(r#"DEBUGMSG("entering {wrapper_name}\n");"#, flag("debug"))
        .map_err(template_err)?;
    let leaving = Choice::new()
        .when(r#"DEBUGMSG("leaving {wrapper_name}\n");"#, flag("debug"))
        .map_err(template_err)?;
    let return_value = Choice::new()
        .when("{function_name}_return_value_ = ", flag("return_type"))
        .map_err(template_err)?;
    let wrapper = Choice::new()
        .when(STRIDED_WRAPPER_TEMPLATE, is("kind", LayoutKind::Strided.table_field()))
        .and_then(|c| c.otherwise(WRAPPER_TEMPLATE))
        .map_err(template_err)?;

    let mut ctx = kernel_ctx.clone();
    ctx.set("sig", signature.as_str())
        .set("entering", entering.render_or_empty(&kernel_ctx).map_err(template_err)?)
        .set("leaving", leaving.render_or_empty(&kernel_ctx).map_err(template_err)?)
        .set("return_value", return_value.render_or_empty(&kernel_ctx).map_err(template_err)?)
        .set("declarations", block(&decl_lines))
        .set("body-start", block(&emission.enter))
        .set("body-end", block(&emission.exit))
        .set("arguments", call.as_str());
    let wrapper_source = tidy(&wrapper.render_or_empty(&ctx).map_err(template_err)?);

    let symbols = resolved.symbols;
    let constraint_source = if symbols.output_symbols().is_empty() {
        None
    } else {
        let quoted: Vec<String> = symbols.symbols().map(|s| format!("\"{s}\"")).collect();
        ctx.set("constraint_declarations", block(&constraint_decls))
            .set("constraints", block(symbols.constraints()))
            .set("nin_symbols", symbols.input_symbols().len().to_string())
            .set("nout_symbols", symbols.output_symbols().len().to_string())
            .set("symbols", quoted.join(", "));
        let template = Template::parse(CONSTRAINT_TEMPLATE).map_err(template_err)?;
        Some(tidy(&template.render(&ctx).map_err(template_err)?))
    };

    let fragments = ordering
        .order
        .iter()
        .map(|&i| fragments[i].clone())
        .collect();

    Ok(WrapperPlan {
        kernel_name: kernel.kernel_name.clone(),
        function_name: kernel.function_name.clone(),
        layout: kernel.layout,
        wrapper_name,
        signature,
        arguments: resolved.arguments,
        symbols,
        nin: resolved.nin,
        nout: resolved.nout,
        fragments,
        call,
        wrapper_source,
        constraint_source,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwrap_spec::{ArgumentSpec, IntentTag, ScalarType};

    fn example_sum() -> KernelSpec {
        KernelSpec::new("example_sum", "d_example_sum", LayoutKind::Container)
            .argument(
                ArgumentSpec::new("n", ScalarType::Int64)
                    .ctype("long")
                    .intent(&[IntentTag::Hide])
                    .default_value("xnd_fixed_shape_at(&gmk_input_x, 0)")
                    .depends_on(["x"]),
            )
            .argument(
                ArgumentSpec::new("x", ScalarType::Float64)
                    .array(["n"])
                    .intent(&[IntentTag::Input]),
            )
            .argument(
                ArgumentSpec::new("y", ScalarType::Float64)
                    .array(["n+5", "n"])
                    .intent(&[IntentTag::Input]),
            )
            .argument(
                ArgumentSpec::new("r", ScalarType::Float64)
                    .by_pointer()
                    .intent(&[IntentTag::Hide, IntentTag::Output]),
            )
    }

    #[test]
    fn test_wrapper_name() {
        let kernel = example_sum();
        assert_eq!(
            wrapper_name(&kernel),
            "gmk_example_sum_fixed_symbolic_Xnd_d_example_sum"
        );
        let kernel = kernel.ellipsis("...").array_kind(ArrayKind::Variable);
        assert_eq!(
            wrapper_name(&kernel),
            "gmk_example_sum_dims_variable_Xnd_d_example_sum"
        );
    }

    #[test]
    fn test_example_sum_plan() {
        let plan = plan_kernel(&example_sum(), &CodegenOptions::default()).unwrap();

        assert_eq!(plan.signature, "N * float64, M * N * float64 -> float64");
        assert_eq!(plan.symbols.input_symbols(), &['N', 'M']);
        assert!(!plan.needs_constraint());
        assert!(plan.constraint_source.is_none());
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.call, "n, x, y, &r");
        assert_eq!((plan.nin, plan.nout), (2, 1));

        // `n` is derived from `x` after `x` is set up and before the call.
        let src = &plan.wrapper_source;
        let x_setup = src.find("x = (double*)xndtools_copy(&gmk_input_x, gmk_ctx);").unwrap();
        let n_setup = src.find("n = xnd_fixed_shape_at(&gmk_input_x, 0);").unwrap();
        let call = src.find("d_example_sum(n, x, y, &r);").unwrap();
        assert!(x_setup < n_setup && n_setup < call);

        assert!(src.contains("long n;"));
        assert!(src.contains("const xnd_t gmk_output_r = gmk_stack[2];"));
        assert!(src.contains("*GMK_SCALAR_DATA(double, gmk_output_r) = r;"));
        assert!(src.contains("static int gmk_example_sum_fixed_symbolic_Xnd_d_example_sum_counter = 0;"));
    }

    #[test]
    fn test_exits_nest_around_call() {
        let plan = plan_kernel(&example_sum(), &CodegenOptions::default()).unwrap();
        let src = &plan.wrapper_source;
        let call = src.find("d_example_sum(").unwrap();
        let free_x = src.find("  free(x);").unwrap();
        let free_y = src.find("  free(y);").unwrap();
        // y was opened last, so it closes first.
        assert!(call < free_y && free_y < free_x);
        assert_eq!(src.matches('{').count(), src.matches('}').count());
    }

    #[test]
    fn test_every_argument_declared_and_called_once() {
        let kernel = example_sum().returns(ScalarType::Int32);
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        let src = &plan.wrapper_source;
        assert_eq!(src.matches(" intent: ").count(), kernel.arguments.len() + 1);
        assert_eq!(plan.call, "n, x, y, &r");
        assert!(src.contains("d_example_sum_return_value_ = d_example_sum(n, x, y, &r);"));
        assert_eq!(plan.signature, "N * float64, M * N * float64 -> float64, int32");
    }

    #[test]
    fn test_zero_arguments_with_return() {
        let kernel = KernelSpec::new("foo", "d_foo", LayoutKind::Container).returns(ScalarType::Float64);
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        assert_eq!(plan.signature, "void -> float64");
        assert_eq!(plan.arguments.len(), 1);
        assert_eq!(plan.arguments[0].output_index, Some(0));
        assert!(plan.wrapper_source.contains("d_foo_return_value_ = d_foo();"));
        assert!(plan.wrapper_source.contains("const xnd_t gmk_output_d_foo_return_value_ = gmk_stack[0];"));
    }

    #[test]
    fn test_constraint_function() {
        let kernel = KernelSpec::new("tile", "d_tile", LayoutKind::Container)
            .argument(ArgumentSpec::new("m", ScalarType::Int64).intent(&[IntentTag::Input]))
            .argument(
                ArgumentSpec::new("a", ScalarType::Float64)
                    .array(["n"])
                    .intent(&[IntentTag::Input]),
            )
            .argument(
                ArgumentSpec::new("b", ScalarType::Float64)
                    .array(["m", "n"])
                    .intent(&[IntentTag::Output])
                    .depends_on(["m"]),
            );
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        assert_eq!(plan.signature, "int64, N * float64 -> M * N * float64");
        assert_eq!(plan.constraint_name().as_deref(), Some("gmk_tile_constraint"));

        let src = plan.constraint_source.unwrap();
        assert!(src.contains("gmk_tile_constraint_func(int64_t *gmk_shapes, const void *gmk_args, ndt_context_t *gmk_ctx) {"));
        assert!(src.contains("int64_t m = *(int64_t*)(((xnd_t *)gmk_args)[0].ptr);"));
        assert!(src.contains("gmk_shapes[0] = m;"));
        assert!(src.contains(".nin = 1, .nout = 1, .symbols = { \"N\", \"M\" }"));
    }

    #[test]
    fn test_debug_tracing() {
        let options = CodegenOptions {
            debug: true,
            ..CodegenOptions::default()
        };
        let plan = plan_kernel(&example_sum(), &options).unwrap();
        let src = &plan.wrapper_source;
        assert!(src.contains(r#"DEBUGMSG("entering gmk_example_sum_fixed_symbolic_Xnd_d_example_sum\n");"#));
        assert!(src.contains(r#"DEBUGMSG("leaving gmk_example_sum_fixed_symbolic_Xnd_d_example_sum\n");"#));
        assert!(src.contains("DEBUGMSG1(\"gmk_input_x.type=%s\\n\""));
    }

    #[test]
    fn test_strided_wrapper() {
        let mut kernel = example_sum();
        kernel.layout = LayoutKind::Strided;
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        let src = &plan.wrapper_source;
        assert!(src.contains("(char **args, intptr_t *dimensions, intptr_t *steps, void *data)"));
        assert!(src.contains("NOT_IMPLEMENTED_KIND_Strided_for_d_example_sum;"));
        assert_eq!(plan.fragments.len(), 4);
    }

    #[test]
    fn test_cycle_warning() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(
                ArgumentSpec::new("a", ScalarType::Int64)
                    .intent(&[IntentTag::Input])
                    .depends_on(["b"]),
            )
            .argument(
                ArgumentSpec::new("b", ScalarType::Int64)
                    .intent(&[IntentTag::Input])
                    .depends_on(["a"]),
            );
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        assert!(matches!(
            &plan.warnings[..],
            [CodegenWarning::DependencyCycle { unresolved, .. }] if unresolved == &["a", "b"]
        ));
        assert_eq!(plan.call, "a, b");
    }

    #[test]
    fn test_ellipsis_signature() {
        let kernel = example_sum().ellipsis("...");
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        assert_eq!(
            plan.signature,
            "... * N * float64, ... * M * N * float64 -> ... * float64"
        );
    }

    #[test]
    fn test_variable_signature() {
        let kernel = example_sum().array_kind(ArrayKind::Variable);
        let plan = plan_kernel(&kernel, &CodegenOptions::default()).unwrap();
        assert_eq!(plan.signature, "var * float64, var * var * float64 -> float64");
    }
}
