//! Assembly of the generated compilation unit.

use crate::plan::WrapperPlan;
use crate::table::KernelTable;
use crate::CodegenOptions;
use indexmap::IndexSet;
use kwrap_spec::{ModuleSpec, Typemap};
use kwrap_template::{flag, Choice, Context, Template, TemplateResult};

const MODULE_TEMPLATE: &str = r#"/* Generated by kwrap for module `{module_name}`. Do not edit. */

#include <stdlib.h>
#include <stdint.h>
#include <string.h>
#include <math.h>
#include <complex.h>
#include <inttypes.h>
#include "ndtypes.h"
#include "xnd.h"
#include "gumath.h"
#include "xndtools.h"
{includes}

#define GMK_FIXED_ARRAY_DATA(CTYPE, NAME) ((CTYPE *)(NAME.ptr + NAME.index * NAME.type->Concrete.FixedDim.itemsize))
#define GMK_SCALAR_DATA(CTYPE, NAME) ((CTYPE *)(NAME.ptr))

#define DEBUGMSG(MSG) printf("debug: " MSG);
#define DEBUGMSG1(MSG, VALUE) printf("debug: " MSG, VALUE);
#define DEBUGMSG2(MSG, VALUE1, VALUE2) printf("debug: " MSG, VALUE1, VALUE2);

/* ---- constraints -------------------------------------------------------- */
{constraints}
/* ---- wrappers ----------------------------------------------------------- */
{wrappers}
/* ---- typemap checks ----------------------------------------------------- */

static int
gmk_test_{module_name}_typemaps(ndt_context_t *ctx) {{
  {typemap_checks}
  return 0;
}}
{stats}
/* ---- kernel table ------------------------------------------------------- */

static const gm_kernel_init_t {module_name}_kernels[] = {{
  {table}
}};

int
gmk_init_{module_name}_kernels(gm_tbl_t *tbl, ndt_context_t *ctx) {{
  const gm_kernel_init_t *k;

  if (gmk_test_{module_name}_typemaps(ctx) < 0) {{
    return -1;
  }}

  for (k = {module_name}_kernels; k->name != NULL; k++) {{
    if (gm_add_kernel(tbl, k, ctx) < 0) {{
      return -1;
    }}
  }}
  {register_stats}
  return 0;
}}
"#;

const TYPEMAP_CHECK: &str = r#"if (sizeof({orig_type}) != sizeof({normal_type})) {{
    ndt_err_format(ctx, NDT_RuntimeError,
                   "incorrect kernel configuration typemaps: sizeof({orig_type})!=sizeof({normal_type})");
    return -1;
  }}"#;

const STATS_TEMPLATE: &str = r#"
/* ---- call statistics ---------------------------------------------------- */

static void
gmk_wrapper_stats_{module_name}(void) {{
  printf("------+---------------------------------------------------------\n");
  printf(" Module: {module_name}\n");
  printf("Calls | Wrapper name\n");
  printf("------+---------------------------------------------------------\n");
  {counters}
  printf("------+---------------------------------------------------------\n");
}}
"#;

/// Render an `#include` line; names already in angle brackets stay as-is.
fn include_line(header: &str) -> String {
    if header.starts_with('<') {
        format!("#include {header}")
    } else {
        format!("#include \"{header}\"")
    }
}

fn typemap_checks(typemaps: &[Typemap]) -> TemplateResult<String> {
    let template = Template::parse(TYPEMAP_CHECK)?;
    let mut checks = Vec::with_capacity(typemaps.len());
    for typemap in typemaps {
        let mut ctx = Context::new();
        ctx.set("orig_type", typemap.orig_type.as_str())
            .set("normal_type", typemap.normal_type.as_str());
        checks.push(template.render(&ctx)?);
    }
    Ok(checks.join("\n  "))
}

/// Render the whole compilation unit for `module`.
///
/// `plans` are the plans that survived generation, in kernel order.
/// Identical constraint and wrapper functions are emitted once.
///
/// A constraint function is named after its kernel alone, so every plan of
/// one kernel must produce the same constraint text. Constraint bodies only
/// read input scalars, which do not vary with the layout kind; two plans of
/// one kernel whose bodies still differ would define the same C function
/// twice.
///
/// # Errors
///
/// Fails only if a built-in template is malformed.
pub fn render_module(
    module: &ModuleSpec,
    plans: &[WrapperPlan],
    table: &KernelTable,
    options: &CodegenOptions,
) -> TemplateResult<String> {
    let constraints: IndexSet<&str> = plans
        .iter()
        .filter_map(|p| p.constraint_source.as_deref())
        .collect();
    let wrappers: IndexSet<&str> = plans.iter().map(|p| p.wrapper_source.as_str()).collect();
    let wrapper_names: IndexSet<&str> = plans.iter().map(|p| p.wrapper_name.as_str()).collect();

    let includes: Vec<String> = module
        .includes
        .iter()
        .chain(&options.extra_includes)
        .map(|h| include_line(h))
        .collect();

    let mut ctx = Context::new();
    ctx.set("module_name", module.module_name.as_str())
        .set("includes", includes.join("\n"))
        .set("constraints", constraints.into_iter().collect::<String>())
        .set("wrappers", wrappers.into_iter().collect::<String>())
        .set("typemap_checks", typemap_checks(&module.typemaps)?)
        .set("table", table.render())
        .set_flag("report_stats", options.report_stats);

    let counters: Vec<String> = wrapper_names
        .iter()
        .map(|name| format!(r#"printf("%5d | {name}\n", {name}_counter);"#))
        .collect();
    let mut stats_ctx = ctx.clone();
    stats_ctx.set("counters", counters.join("\n  "));

    let stats = Choice::new().when(STATS_TEMPLATE, flag("report_stats"))?;
    let register = Choice::new().when(
        "atexit(gmk_wrapper_stats_{module_name});",
        flag("report_stats"),
    )?;
    let register_stats = register.render_or_empty(&ctx)?;
    ctx.set("stats", stats.render_or_empty(&stats_ctx)?)
        .set("register_stats", register_stats);

    Template::parse(MODULE_TEMPLATE)?.render(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_kernel;
    use crate::table::aggregate;
    use kwrap_spec::{ArgumentSpec, IntentTag, KernelSpec, LayoutKind, ScalarType};

    fn module() -> ModuleSpec {
        let mut module = ModuleSpec::new("demo");
        module.includes = vec!["demo.h".into(), "<complex.h>".into()];
        module.typemaps = vec![Typemap {
            orig_type: "double".into(),
            normal_type: "float64".into(),
        }];
        for layout in [LayoutKind::RowMajor, LayoutKind::Container] {
            module = module.kernel(
                KernelSpec::new("scale", "d_scale", layout)
                    .argument(ArgumentSpec::new("a", ScalarType::Float64).intent(&[IntentTag::Input]))
                    .argument(
                        ArgumentSpec::new("x", ScalarType::Float64)
                            .array(["n"])
                            .intent(&[IntentTag::Input]),
                    ),
            );
        }
        module
    }

    fn render(options: &CodegenOptions) -> String {
        let module = module();
        let plans: Vec<WrapperPlan> = module
            .kernels
            .iter()
            .map(|k| plan_kernel(k, options).unwrap())
            .collect();
        let table = aggregate(&plans);
        render_module(&module, &plans, &table, options).unwrap()
    }

    #[test]
    fn test_unit_sections() {
        let src = render(&CodegenOptions::default());
        assert!(src.contains("#include \"demo.h\"\n#include <complex.h>\n"));
        assert!(src.contains("gmk_test_demo_typemaps(ndt_context_t *ctx) {"));
        assert!(src.contains("sizeof(double)!=sizeof(float64)"));
        assert!(src.contains("static const gm_kernel_init_t demo_kernels[] = {"));
        assert!(src.contains(".C = gmk_scale_fixed_symbolic_C_d_scale, .Xnd = gmk_scale_fixed_symbolic_Xnd_d_scale }"));
        assert!(src.contains("{ .name = NULL, .sig = NULL }\n};"));
        assert!(src.contains("int\ngmk_init_demo_kernels(gm_tbl_t *tbl, ndt_context_t *ctx) {"));
    }

    #[test]
    fn test_stats_report() {
        let src = render(&CodegenOptions::default());
        assert!(src.contains(r#"printf("%5d | gmk_scale_fixed_symbolic_C_d_scale\n", gmk_scale_fixed_symbolic_C_d_scale_counter);"#));
        assert!(src.contains("atexit(gmk_wrapper_stats_demo);"));

        let quiet = render(&CodegenOptions {
            report_stats: false,
            ..CodegenOptions::default()
        });
        assert!(!quiet.contains("gmk_wrapper_stats_demo"));
        assert!(!quiet.contains("atexit"));
        // Counters stay in the wrappers.
        assert!(quiet.contains("gmk_scale_fixed_symbolic_C_d_scale_counter += 1;"));
    }

    #[test]
    fn test_extra_includes_follow_module_includes() {
        let src = render(&CodegenOptions {
            extra_includes: vec!["extra.h".into()],
            ..CodegenOptions::default()
        });
        assert!(src.contains("#include <complex.h>\n#include \"extra.h\""));
    }

    #[test]
    fn test_identical_wrappers_emitted_once() {
        let module = module();
        let plan = plan_kernel(&module.kernels[1], &CodegenOptions::default()).unwrap();
        let plans = vec![plan.clone(), plan];
        let table = aggregate(&plans);
        let src = render_module(&module, &plans, &table, &CodegenOptions::default()).unwrap();
        assert_eq!(
            src.matches("static int gmk_scale_fixed_symbolic_Xnd_d_scale_counter = 0;").count(),
            1
        );
        assert_eq!(src.matches("| gmk_scale_fixed_symbolic_Xnd_d_scale\\n").count(), 1);
    }

    #[test]
    fn test_one_constraint_per_kernel_across_layouts() {
        let mut module = ModuleSpec::new("vec");
        for layout in [LayoutKind::RowMajor, LayoutKind::Container] {
            module = module.kernel(
                KernelSpec::new("repeat", "c_repeat", layout)
                    .argument(ArgumentSpec::new("k", ScalarType::Int64).intent(&[IntentTag::Input]))
                    .argument(
                        ArgumentSpec::new("x", ScalarType::Float64)
                            .array(["n"])
                            .intent(&[IntentTag::Input]),
                    )
                    .argument(
                        ArgumentSpec::new("y", ScalarType::Float64)
                            .array(["k", "n"])
                            .intent(&[IntentTag::Output])
                            .depends_on(["k"]),
                    ),
            );
        }
        let options = CodegenOptions::default();
        let plans: Vec<WrapperPlan> = module
            .kernels
            .iter()
            .map(|k| plan_kernel(k, &options).unwrap())
            .collect();
        assert_eq!(plans[0].constraint_source, plans[1].constraint_source);

        let table = aggregate(&plans);
        let src = render_module(&module, &plans, &table, &options).unwrap();
        assert_eq!(src.matches("gmk_repeat_constraint_func(int64_t").count(), 1);
        assert_eq!(src.matches("gmk_repeat_constraint = {").count(), 1);
    }
}
