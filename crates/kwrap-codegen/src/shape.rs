//! Symbolic-dimension resolution and shape constraints.

use crate::intent::IntentClass;
use crate::{CodegenError, CodegenResult};
use indexmap::IndexMap;
use kwrap_spec::{DimensionSpec, KernelSpec};

/// Symbol letters, in assignment order.
pub const SYMBOL_ALPHABET: &str = "NMLKPQRSVWXYZBCDFGHJAEIOU";

/// Maximum number of distinct symbolic dimensions per kernel.
pub const MAX_SYMBOLS: usize = SYMBOL_ALPHABET.len();

/// A dimension after symbol assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedDim {
    /// A literal extent.
    Fixed(u64),
    /// A symbolic extent and its letter.
    Symbol {
        /// The expression as written, e.g. `n+5`.
        expr: String,
        /// The assigned letter.
        symbol: char,
    },
}

impl ResolvedDim {
    /// The expression as written.
    #[must_use]
    pub fn expr(&self) -> String {
        match self {
            Self::Fixed(n) => n.to_string(),
            Self::Symbol { expr, .. } => expr.clone(),
        }
    }
}

/// An array argument's shape after symbol assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedShape {
    /// Dimensions, outermost first.
    pub dims: Vec<ResolvedDim>,
    /// Parenthesized product of the dimension expressions.
    pub nofitems: String,
}

/// Symbols of one kernel, split by direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolTable {
    by_expr: IndexMap<String, char>,
    input: Vec<char>,
    output: Vec<char>,
    constraints: Vec<String>,
}

impl SymbolTable {
    /// Input-side symbols, in first-seen order.
    #[must_use]
    pub fn input_symbols(&self) -> &[char] {
        &self.input
    }

    /// Output-side symbols, in first-seen order.
    #[must_use]
    pub fn output_symbols(&self) -> &[char] {
        &self.output
    }

    /// All symbols, inputs first.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.input.iter().chain(&self.output).copied()
    }

    /// The letter assigned to a dimension expression.
    #[must_use]
    pub fn symbol_of(&self, expr: &str) -> Option<char> {
        self.by_expr.get(expr).copied()
    }

    /// Shape-constraint statements, in emission order.
    #[must_use]
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    /// Number of distinct symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_expr.len()
    }

    /// True if no symbol was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_expr.is_empty()
    }

    fn intern(&mut self, expr: &str) -> Option<(char, bool)> {
        if let Some(&symbol) = self.by_expr.get(expr) {
            return Some((symbol, false));
        }
        let symbol = SYMBOL_ALPHABET.chars().nth(self.by_expr.len())?;
        self.by_expr.insert(expr.to_string(), symbol);
        Some((symbol, true))
    }
}

/// The resolver's output.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// Kernel-wide symbols.
    pub symbols: SymbolTable,
    /// One entry per declared argument; `None` for non-arrays.
    pub shapes: Vec<Option<ResolvedShape>>,
}

/// Assign symbols to every symbolic dimension of `kernel`.
///
/// `classes[i]` is the class of `kernel.arguments[i]`.
///
/// # Errors
///
/// Returns [`CodegenError::SymbolOverflow`] when the kernel uses more
/// distinct symbolic dimensions than [`MAX_SYMBOLS`].
pub fn resolve(kernel: &KernelSpec, classes: &[IntentClass]) -> CodegenResult<Resolution> {
    let mut table = SymbolTable::default();
    let mut shapes = Vec::with_capacity(kernel.arguments.len());

    for (arg, class) in kernel.arguments.iter().zip(classes) {
        let Some(shape) = &arg.shape else {
            shapes.push(None);
            continue;
        };

        let mut dims = Vec::with_capacity(shape.len());
        for dim in shape {
            let expr = match dim {
                DimensionSpec::Fixed(n) => {
                    dims.push(ResolvedDim::Fixed(*n));
                    continue;
                }
                DimensionSpec::Symbolic(expr) => expr,
            };
            let (symbol, fresh) = table.intern(expr).ok_or_else(|| CodegenError::SymbolOverflow {
                kernel: kernel.kernel_name.clone(),
                argument: arg.name.clone(),
                limit: MAX_SYMBOLS,
            })?;
            if fresh {
                if class.is_output_bearing() {
                    if arg.depends_on.iter().any(|d| d == expr) {
                        let index = table.output.len();
                        table
                            .constraints
                            .push(format!("gmk_shapes[{index}] = {expr};"));
                    }
                    table.output.push(symbol);
                } else {
                    table.input.push(symbol);
                }
            }
            dims.push(ResolvedDim::Symbol {
                expr: expr.clone(),
                symbol,
            });
        }

        let nofitems = format!(
            "({})",
            dims.iter()
                .map(ResolvedDim::expr)
                .collect::<Vec<_>>()
                .join(")*(")
        );
        shapes.push(Some(ResolvedShape { dims, nofitems }));
    }

    Ok(Resolution {
        symbols: table,
        shapes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwrap_spec::{ArgumentSpec, IntentTag, LayoutKind, ScalarType};
    use proptest::prelude::*;

    fn array(name: &str, dims: &[&str]) -> ArgumentSpec {
        ArgumentSpec::new(name, ScalarType::Float64).array(dims.iter().copied())
    }

    #[test]
    fn test_example_sum_symbols() {
        let kernel = KernelSpec::new("example_sum", "d_example_sum", LayoutKind::Container)
            .argument(array("x", &["n"]).intent(&[IntentTag::Input]))
            .argument(array("y", &["n+5", "n"]).intent(&[IntentTag::Input]));
        let classes = [IntentClass::Input, IntentClass::Input];

        let res = resolve(&kernel, &classes).unwrap();
        assert_eq!(res.symbols.input_symbols(), &['N', 'M']);
        assert!(res.symbols.output_symbols().is_empty());
        assert!(res.symbols.constraints().is_empty());
        assert_eq!(res.symbols.symbol_of("n"), Some('N'));
        assert_eq!(res.symbols.symbol_of("n+5"), Some('M'));

        let y = res.shapes[1].as_ref().unwrap();
        assert_eq!(y.nofitems, "(n+5)*(n)");
    }

    #[test]
    fn test_fixed_dims_take_no_symbol() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::RowMajor)
            .argument(array("a", &["3", "n"]).intent(&[IntentTag::Input]));
        let res = resolve(&kernel, &[IntentClass::Input]).unwrap();
        assert_eq!(res.symbols.len(), 1);
        let shape = res.shapes[0].as_ref().unwrap();
        assert_eq!(shape.dims[0], ResolvedDim::Fixed(3));
        assert_eq!(shape.nofitems, "(3)*(n)");
    }

    #[test]
    fn test_output_symbols_and_constraints() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(ArgumentSpec::new("m", ScalarType::Int64).intent(&[IntentTag::Input]))
            .argument(array("a", &["n"]).intent(&[IntentTag::Input]))
            .argument(
                array("b", &["m", "n"])
                    .intent(&[IntentTag::Output])
                    .depends_on(["m"]),
            );
        let classes = [IntentClass::Input, IntentClass::Input, IntentClass::Output];

        let res = resolve(&kernel, &classes).unwrap();
        // `n` was first seen on an input; it stays an input symbol.
        assert_eq!(res.symbols.input_symbols(), &['N']);
        assert_eq!(res.symbols.output_symbols(), &['M']);
        assert_eq!(res.symbols.constraints(), &["gmk_shapes[0] = m;".to_string()]);
        assert_eq!(res.symbols.symbols().collect::<String>(), "NM");
    }

    #[test]
    fn test_output_without_dependency_has_no_constraint() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(array("b", &["k"]).intent(&[IntentTag::Output]));
        let res = resolve(&kernel, &[IntentClass::Output]).unwrap();
        assert_eq!(res.symbols.output_symbols(), &['N']);
        assert!(res.symbols.constraints().is_empty());
    }

    fn wide_kernel(count: usize) -> KernelSpec {
        let names: Vec<String> = (0..count).map(|i| format!("d{i}")).collect();
        KernelSpec::new("wide", "f", LayoutKind::Container).argument(
            ArgumentSpec::new("a", ScalarType::Float64)
                .array(names.iter().map(String::as_str))
                .intent(&[IntentTag::Input]),
        )
    }

    #[test]
    fn test_symbol_limit() {
        let res = resolve(&wide_kernel(25), &[IntentClass::Input]).unwrap();
        assert_eq!(res.symbols.len(), 25);
        assert_eq!(
            res.symbols.symbols().collect::<String>(),
            SYMBOL_ALPHABET
        );

        let err = resolve(&wide_kernel(26), &[IntentClass::Input]).unwrap_err();
        assert!(matches!(err, CodegenError::SymbolOverflow { limit: 25, .. }));
    }

    proptest! {
        #[test]
        fn prop_resolution_is_deterministic(
            dims in proptest::collection::vec(
                proptest::collection::vec("[a-e]", 1..4), 1..5),
            outputs in proptest::collection::vec(any::<bool>(), 5),
        ) {
            let mut kernel = KernelSpec::new("k", "f", LayoutKind::Container);
            let mut classes = Vec::new();
            for (i, shape) in dims.iter().enumerate() {
                let (tag, class) = if outputs[i] {
                    (IntentTag::Output, IntentClass::Output)
                } else {
                    (IntentTag::Input, IntentClass::Input)
                };
                kernel = kernel.argument(
                    ArgumentSpec::new(format!("a{i}"), ScalarType::Float64)
                        .array(shape.iter().map(String::as_str))
                        .intent(&[tag]),
                );
                classes.push(class);
            }

            let first = resolve(&kernel, &classes).unwrap();
            let second = resolve(&kernel, &classes).unwrap();
            prop_assert_eq!(&first.symbols, &second.symbols);

            // Letters are handed out in alphabet order, inputs listed first.
            let all: String = first.symbols.symbols().collect();
            let n_in = first.symbols.input_symbols().len();
            prop_assert_eq!(all.len(), first.symbols.len());
            let mut sorted_in: Vec<char> = first.symbols.input_symbols().to_vec();
            sorted_in.sort_by_key(|c| SYMBOL_ALPHABET.find(*c));
            prop_assert_eq!(&sorted_in[..], &all.chars().take(n_in).collect::<Vec<_>>()[..]);

            // Each expression maps to exactly one letter everywhere.
            for (arg, shape) in kernel.arguments.iter().zip(&first.shapes) {
                let shape = shape.as_ref().unwrap();
                for (dim, resolved) in arg.shape.as_ref().unwrap().iter().zip(&shape.dims) {
                    if let ResolvedDim::Symbol { symbol, .. } = resolved {
                        prop_assert_eq!(first.symbols.symbol_of(&dim.value()), Some(*symbol));
                    }
                }
            }
        }
    }
}
