//! Kernel-table aggregation.
//!
//! Plans sharing a kernel name, signature and output-symbol count become
//! one table row listing every layout kind implemented for them.

use crate::plan::WrapperPlan;
use crate::CodegenWarning;
use indexmap::IndexMap;
use kwrap_spec::LayoutKind;
use tracing::{debug, info};

/// Terminates the table for the host runtime.
pub const SENTINEL_ROW: &str = "{ .name = NULL, .sig = NULL }";

/// One dispatch-table entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelTableRow {
    /// Kernel name.
    pub kernel_name: String,
    /// Host signature.
    pub signature: String,
    /// Number of output-side symbols.
    pub nout_symbols: usize,
    /// Wrapper entry points by layout kind, in first-seen order.
    pub entries: Vec<(LayoutKind, String)>,
    /// Constraint object, present iff `nout_symbols > 0`.
    pub constraint: Option<String>,
}

impl KernelTableRow {
    /// Render as a C initializer.
    #[must_use]
    pub fn render(&self) -> String {
        let mut fields = vec![
            format!(".name = \"{}\"", self.kernel_name),
            format!(".sig = \"{}\"", self.signature),
        ];
        if let Some(constraint) = &self.constraint {
            fields.push(format!(".constraint = &{constraint}"));
        }
        fields.extend(
            self.entries
                .iter()
                .map(|(layout, wrapper)| format!(".{} = {wrapper}", layout.table_field())),
        );
        format!("{{ {} }}", fields.join(", "))
    }
}

/// The aggregated table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelTable {
    /// Rows, in first-seen order.
    pub rows: Vec<KernelTableRow>,
    /// Conflicting entries that were dropped.
    pub warnings: Vec<CodegenWarning>,
}

impl KernelTable {
    /// Render every row followed by the sentinel, one per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(KernelTableRow::render)
            .chain(std::iter::once(SENTINEL_ROW.to_string()))
            .collect::<Vec<_>>()
            .join(",\n  ")
    }
}

/// Merge plans into table rows.
pub fn aggregate<'a>(plans: impl IntoIterator<Item = &'a WrapperPlan>) -> KernelTable {
    let mut groups: IndexMap<(String, String, usize), KernelTableRow> = IndexMap::new();
    let mut warnings = Vec::new();

    for plan in plans {
        let key = (
            plan.kernel_name.clone(),
            plan.signature.clone(),
            plan.nout_symbols(),
        );
        let row = groups.entry(key).or_insert_with(|| KernelTableRow {
            kernel_name: plan.kernel_name.clone(),
            signature: plan.signature.clone(),
            nout_symbols: plan.nout_symbols(),
            entries: Vec::new(),
            constraint: plan.constraint_name(),
        });

        match row.entries.iter().find(|(layout, _)| *layout == plan.layout) {
            Some((_, kept)) if *kept == plan.wrapper_name => {}
            Some((_, kept)) => {
                debug!(
                    kernel = %plan.kernel_name,
                    layout = %plan.layout,
                    %kept,
                    dropped = %plan.wrapper_name,
                    "conflicting kernel table entry"
                );
                warnings.push(CodegenWarning::ConflictingEntry {
                    kernel: plan.kernel_name.clone(),
                    signature: plan.signature.clone(),
                    layout: plan.layout,
                    kept: kept.clone(),
                    dropped: plan.wrapper_name.clone(),
                });
            }
            None => row.entries.push((plan.layout, plan.wrapper_name.clone())),
        }
    }

    let rows: Vec<KernelTableRow> = groups.into_values().collect();
    for row in &rows {
        let layouts: Vec<&str> = row.entries.iter().map(|(l, _)| l.table_field()).collect();
        info!(
            kernel = %row.kernel_name,
            signature = %row.signature,
            layouts = %layouts.join(", "),
            nout = row.nout_symbols,
            "kernel table row"
        );
    }

    KernelTable { rows, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_kernel;
    use crate::CodegenOptions;
    use kwrap_spec::{ArgumentSpec, IntentTag, KernelSpec, ScalarType};

    fn plan(layout: LayoutKind, ty: ScalarType, output_shape: Option<&str>) -> WrapperPlan {
        let out = ArgumentSpec::new("r", ty);
        let out = match output_shape {
            Some(dim) => out.array([dim]).intent(&[IntentTag::Output]),
            None => out.by_pointer().intent(&[IntentTag::Output]),
        };
        let kernel = KernelSpec::new("sum", "f_sum", layout)
            .argument(ArgumentSpec::new("x", ty).array(["n"]).intent(&[IntentTag::Input]))
            .argument(out);
        plan_kernel(&kernel, &CodegenOptions::default()).unwrap()
    }

    #[test]
    fn test_layouts_merge_into_one_row() {
        let plans = [
            plan(LayoutKind::RowMajor, ScalarType::Float64, None),
            plan(LayoutKind::ColumnMajor, ScalarType::Float64, None),
            plan(LayoutKind::Container, ScalarType::Float64, None),
            plan(LayoutKind::Container, ScalarType::Float32, None),
        ];
        let table = aggregate(&plans);
        assert_eq!(table.rows.len(), 2);
        assert!(table.warnings.is_empty());

        let row = &table.rows[0];
        assert_eq!(row.signature, "N * float64 -> float64");
        let layouts: Vec<LayoutKind> = row.entries.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            layouts,
            vec![LayoutKind::RowMajor, LayoutKind::ColumnMajor, LayoutKind::Container]
        );
        assert_eq!(row.constraint, None);
        assert_eq!(
            row.render(),
            "{ .name = \"sum\", .sig = \"N * float64 -> float64\", \
             .C = gmk_sum_fixed_symbolic_C_f_sum, \
             .Fortran = gmk_sum_fixed_symbolic_Fortran_f_sum, \
             .Xnd = gmk_sum_fixed_symbolic_Xnd_f_sum }"
        );
        assert_eq!(table.rows[1].signature, "N * float32 -> float32");
    }

    #[test]
    fn test_identical_plans_collapse() {
        let p = plan(LayoutKind::Container, ScalarType::Float64, None);
        let table = aggregate([&p, &p]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].entries.len(), 1);
        assert!(table.warnings.is_empty());
    }

    #[test]
    fn test_conflicting_entry_keeps_first() {
        let first = plan(LayoutKind::Container, ScalarType::Float64, None);
        let mut second = first.clone();
        second.wrapper_name = "gmk_other".to_string();
        let table = aggregate([&first, &second]);
        assert_eq!(table.rows[0].entries[0].1, first.wrapper_name);
        assert!(matches!(
            &table.warnings[..],
            [CodegenWarning::ConflictingEntry { dropped, .. }] if dropped == "gmk_other"
        ));
    }

    #[test]
    fn test_constraint_reference_and_sentinel() {
        let p = plan(LayoutKind::Container, ScalarType::Float64, Some("k"));
        let table = aggregate([&p]);
        let row = &table.rows[0];
        assert_eq!(row.nout_symbols, 1);
        assert_eq!(row.constraint.as_deref(), Some("gmk_sum_constraint"));
        assert!(row.render().contains(".constraint = &gmk_sum_constraint, .Xnd = "));

        let rendered = table.render();
        assert!(rendered.ends_with(",\n  { .name = NULL, .sig = NULL }"));
    }

    #[test]
    fn test_empty_table_is_just_the_sentinel() {
        assert_eq!(KernelTable::default().render(), SENTINEL_ROW);
    }
}
