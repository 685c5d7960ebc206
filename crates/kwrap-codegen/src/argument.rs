//! Per-argument facts derived from a kernel spec.
//!
//! The kernel spec itself is never mutated: classification, slot indices, the
//! resolved shape and the return-value pseudo-argument all live in
//! [`ResolvedArgument`].

use crate::intent::{classify, IntentClass};
use crate::shape::{resolve, ResolvedShape, SymbolTable};
use crate::{CodegenError, CodegenResult};
use kwrap_spec::{ArgumentSpec, IntentSet, IntentTag, KernelSpec, LayoutKind, Pointer, ScalarType};
use kwrap_template::Context;

/// Scalar or array, the first axis of the code matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArgForm {
    /// By value or pointer to a single scalar.
    Scalar,
    /// Pointer to array data.
    Array,
}

/// An argument with everything the synthesizer needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedArgument {
    /// Argument name.
    pub name: String,
    /// Element type.
    pub ty: ScalarType,
    /// Native spelling of the element type.
    pub ctype: String,
    /// Pointer arity.
    pub pointer: Pointer,
    /// Raw tags, kept for the generated intent comment.
    pub tags: IntentSet,
    /// Derived class.
    pub class: IntentClass,
    /// Resolved shape, for arrays.
    pub shape: Option<ResolvedShape>,
    /// Default value expression.
    pub default_value: Option<String>,
    /// Dependencies.
    pub depends_on: Vec<String>,
    /// Position among input-bearing arguments.
    pub input_index: Option<usize>,
    /// Position among output-bearing arguments.
    pub output_index: Option<usize>,
    /// Position of the output slot on the stack: inputs come first.
    pub output_slot: Option<usize>,
    /// True for the synthetic return-value argument.
    pub is_return_value: bool,
}

impl ResolvedArgument {
    /// Scalar or array.
    #[must_use]
    pub fn form(&self) -> ArgForm {
        match self.pointer {
            Pointer::Array => ArgForm::Array,
            Pointer::Value | Pointer::Scalar => ArgForm::Scalar,
        }
    }

    /// The expression passed to the native function.
    #[must_use]
    pub fn use_expr(&self) -> Option<String> {
        if self.is_return_value {
            return None;
        }
        Some(match self.pointer {
            Pointer::Scalar => format!("&{}", self.name),
            Pointer::Value | Pointer::Array => self.name.clone(),
        })
    }

    /// Attributes for template rendering.
    #[must_use]
    pub fn context(&self, layout: LayoutKind) -> Context {
        let mut ctx = Context::new();
        ctx.set("name", self.name.as_str())
            .set("ctype", self.ctype.as_str())
            .set("type", self.ty.ndt_name())
            .set("intent", self.tags.to_string())
            .set("class", self.class.to_string())
            .set("kind", layout.table_field())
            .set(
                "pointer",
                match self.pointer {
                    Pointer::Value => "value",
                    Pointer::Scalar => "scalar",
                    Pointer::Array => "array",
                },
            );
        if let Some(value) = &self.default_value {
            ctx.set("value", value.as_str());
        }
        if let Some(i) = self.input_index {
            ctx.set("input_index", i.to_string());
        }
        if let Some(i) = self.output_index {
            ctx.set("output_index", i.to_string());
        }
        if let Some(i) = self.output_slot {
            ctx.set("output_slot", i.to_string());
        }
        if let Some(shape) = &self.shape {
            ctx.set("nofitems", shape.nofitems.as_str());
        }
        ctx
    }
}

/// All arguments of a kernel, resolved.
#[derive(Clone, Debug, Default)]
pub struct ResolvedArguments {
    /// Declared arguments, then the return value if any.
    pub arguments: Vec<ResolvedArgument>,
    /// Kernel-wide symbols.
    pub symbols: SymbolTable,
    /// Number of input slots.
    pub nin: usize,
    /// Number of output slots, including the return value.
    pub nout: usize,
}

/// Reject argument configurations the code matrix cannot express.
fn check_configuration(kernel: &KernelSpec, arg: &ArgumentSpec, class: IntentClass) -> CodegenResult<()> {
    let at = || (kernel.kernel_name.clone(), arg.name.clone());

    let has_shape = arg.shape.as_ref().is_some_and(|s| !s.is_empty());
    if has_shape != arg.is_array() {
        let (kernel, argument) = at();
        return Err(CodegenError::ShapeMismatch {
            kernel,
            argument,
            pointer: arg.pointer,
        });
    }

    let has_default = arg.default_value.is_some();
    if arg.is_array() {
        if has_default {
            let (kernel, argument) = at();
            return Err(CodegenError::ArrayDefault { kernel, argument });
        }
        return Ok(());
    }

    if arg.pointer == Pointer::Value && class.writes_back_input() {
        let (kernel, argument) = at();
        return Err(CodegenError::IllegalScalarIntent {
            kernel,
            argument,
            class,
        });
    }
    if has_default && class.is_dual() {
        let (kernel, argument) = at();
        return Err(CodegenError::DefaultOnDualDirection {
            kernel,
            argument,
            class,
        });
    }
    if arg.pointer == Pointer::Value && class == IntentClass::Hide && !has_default {
        let (kernel, argument) = at();
        return Err(CodegenError::HiddenWithoutDefault { kernel, argument });
    }
    Ok(())
}

/// Classify, check, index and shape-resolve every argument of `kernel`,
/// appending the return-value pseudo-argument for non-void kernels.
///
/// # Errors
///
/// Returns the first classification, configuration or symbol error.
pub fn resolve_arguments(kernel: &KernelSpec) -> CodegenResult<ResolvedArguments> {
    let mut classified = Vec::with_capacity(kernel.arguments.len());
    for arg in &kernel.arguments {
        let c = classify(arg.intent).map_err(|e| CodegenError::Classification {
            kernel: kernel.kernel_name.clone(),
            argument: arg.name.clone(),
            tags: arg.intent,
            matched: e.matched,
        })?;
        check_configuration(kernel, arg, c.class)?;
        classified.push(c);
    }

    let classes: Vec<IntentClass> = classified.iter().map(|c| c.class).collect();
    let resolution = resolve(kernel, &classes)?;

    let nin = classes.iter().filter(|c| c.is_input_bearing()).count();
    let mut next_input = 0;
    let mut next_output = 0;
    let mut arguments = Vec::with_capacity(kernel.arguments.len() + 1);

    for ((arg, c), shape) in kernel
        .arguments
        .iter()
        .zip(&classified)
        .zip(resolution.shapes)
    {
        let input_index = c.class.is_input_bearing().then(|| {
            next_input += 1;
            next_input - 1
        });
        let output_index = c.class.is_output_bearing().then(|| {
            next_output += 1;
            next_output - 1
        });
        arguments.push(ResolvedArgument {
            name: arg.name.clone(),
            ty: arg.ty,
            ctype: arg.c_type().to_string(),
            pointer: arg.pointer,
            tags: arg.intent,
            class: c.class,
            shape,
            default_value: arg.default_value.clone(),
            depends_on: arg.depends_on.clone(),
            input_index,
            output_index,
            output_slot: output_index.map(|i| nin + i),
            is_return_value: false,
        });
    }

    if let Some(ty) = kernel.return_type {
        let output_index = next_output;
        next_output += 1;
        arguments.push(ResolvedArgument {
            name: format!("{}_return_value_", kernel.function_name),
            ty,
            ctype: kernel
                .return_ctype
                .clone()
                .unwrap_or_else(|| ty.c_type().to_string()),
            pointer: Pointer::Value,
            tags: IntentSet::of(&[IntentTag::Output]),
            class: IntentClass::Output,
            shape: None,
            default_value: None,
            depends_on: Vec::new(),
            input_index: None,
            output_index: Some(output_index),
            output_slot: Some(nin + output_index),
            is_return_value: true,
        });
    }

    Ok(ResolvedArguments {
        arguments,
        symbols: resolution.symbols,
        nin,
        nout: next_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kwrap_spec::IntentTag::{Hide, Inout, Input, Output};

    fn scalar(name: &str) -> ArgumentSpec {
        ArgumentSpec::new(name, ScalarType::Float64)
    }

    #[test]
    fn test_indices_are_dense_per_direction() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(scalar("a").intent(&[Input]))
            .argument(scalar("b").by_pointer().intent(&[Output]))
            .argument(scalar("c").by_pointer().intent(&[Input, Output]))
            .argument(scalar("d").by_pointer().intent(&[Inout]))
            .returns(ScalarType::Int32);

        let resolved = resolve_arguments(&kernel).unwrap();
        assert_eq!(resolved.nin, 3);
        assert_eq!(resolved.nout, 3);
        let idx: Vec<_> = resolved
            .arguments
            .iter()
            .map(|a| (a.name.as_str(), a.input_index, a.output_index, a.output_slot))
            .collect();
        assert_eq!(
            idx,
            vec![
                ("a", Some(0), None, None),
                ("b", None, Some(0), Some(3)),
                ("c", Some(1), Some(1), Some(4)),
                ("d", Some(2), None, None),
                ("f_return_value_", None, Some(2), Some(5)),
            ]
        );
    }

    #[test]
    fn test_zero_arguments_with_return_value() {
        let kernel = KernelSpec::new("foo", "d_foo", LayoutKind::Container).returns(ScalarType::Float64);
        let resolved = resolve_arguments(&kernel).unwrap();
        assert_eq!(resolved.arguments.len(), 1);
        let ret = &resolved.arguments[0];
        assert!(ret.is_return_value);
        assert_eq!(ret.name, "d_foo_return_value_");
        assert_eq!(ret.class, IntentClass::Output);
        assert_eq!(ret.output_index, Some(0));
        assert_eq!(ret.use_expr(), None);
    }

    #[test]
    fn test_use_expressions() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(scalar("a").intent(&[Input]))
            .argument(scalar("b").by_pointer().intent(&[Output]))
            .argument(scalar("c").array(["n"]).intent(&[Input]));
        let resolved = resolve_arguments(&kernel).unwrap();
        let uses: Vec<_> = resolved.arguments.iter().filter_map(ResolvedArgument::use_expr).collect();
        assert_eq!(uses, vec!["a", "&b", "c"]);
    }

    #[test]
    fn test_rejections() {
        let base = KernelSpec::new("k", "f", LayoutKind::Container);

        let err = resolve_arguments(&base.clone().argument(scalar("a").intent(&[Input, Inout])))
            .unwrap_err();
        assert!(matches!(err, CodegenError::Classification { .. }));

        let err = resolve_arguments(&base.clone().argument(scalar("a").intent(&[Inout]))).unwrap_err();
        assert!(matches!(err, CodegenError::IllegalScalarIntent { class: IntentClass::InOut, .. }));

        let err = resolve_arguments(
            &base
                .clone()
                .argument(scalar("a").by_pointer().intent(&[Input, Output]).default_value("0")),
        )
        .unwrap_err();
        assert!(matches!(err, CodegenError::DefaultOnDualDirection { .. }));

        let err = resolve_arguments(
            &base
                .clone()
                .argument(scalar("a").array(["n"]).intent(&[Input]).default_value("0")),
        )
        .unwrap_err();
        assert!(matches!(err, CodegenError::ArrayDefault { .. }));

        let err = resolve_arguments(&base.clone().argument(scalar("a").intent(&[Hide]))).unwrap_err();
        assert!(matches!(err, CodegenError::HiddenWithoutDefault { .. }));

        let mut shapeless = scalar("a").intent(&[Input]);
        shapeless.pointer = Pointer::Array;
        let err = resolve_arguments(&base.argument(shapeless)).unwrap_err();
        assert!(matches!(err, CodegenError::ShapeMismatch { pointer: Pointer::Array, .. }));
    }

    #[test]
    fn test_hidden_pointer_scratch_is_allowed() {
        let kernel = KernelSpec::new("k", "f", LayoutKind::Container)
            .argument(scalar("work").by_pointer().intent(&[Hide]));
        let resolved = resolve_arguments(&kernel).unwrap();
        assert_eq!(resolved.arguments[0].class, IntentClass::Hide);
        assert_eq!(resolved.arguments[0].use_expr().as_deref(), Some("&work"));
    }
}
