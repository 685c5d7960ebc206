//! Generation orchestration and pipeline for kwrap.
//!
//! This crate coordinates one generator run, from a module spec file to
//! the generated C unit.
//!
//! # Overview
//!
//! The driver is responsible for:
//!
//! - Loading the module spec and applying the layout filter
//! - Planning every kernel in parallel
//! - Collecting diagnostics from all workers into the session
//! - Aggregating the kernel table and rendering the unit
//!
//! # Pipeline
//!
//! ```text
//!  Spec file
//!      │
//!      ▼
//! ┌─────────┐     ┌──────────────────────────┐
//! │  Load   │ ──▶ │ Plan (one task / kernel) │
//! └─────────┘     └──────────────────────────┘
//!                              │ fan-in
//!                              ▼
//!                 ┌─────────┐     ┌─────────┐
//!                 │Aggregate│ ──▶ │ Render  │ ──▶ <module>_kernels.c
//!                 └─────────┘     └─────────┘
//! ```
//!
//! A kernel that fails planning contributes nothing. The unit is only
//! written when every kernel succeeded.

#![warn(missing_docs)]

use camino::{Utf8Path, Utf8PathBuf};
use kwrap_codegen::{
    aggregate, plan_kernel, render_module, CodegenError, CodegenOptions, KernelTable, WrapperPlan,
};
use kwrap_diagnostics::{Diagnostic, IntoDiagnostic};
use kwrap_session::{Options, Session, SessionRef};
use kwrap_spec::{KernelSpec, ModuleSpec, SpecError};
use kwrap_template::TemplateError;
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors that end a generator run.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Session creation failed.
    #[error("failed to create session: {0}")]
    SessionError(#[from] kwrap_session::SessionError),

    /// The module spec could not be loaded.
    #[error("failed to load module spec: {0}")]
    Spec(#[from] SpecError),

    /// The worker pool could not be built.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A built-in module template failed to expand.
    #[error("failed to render module: {0}")]
    Render(#[from] TemplateError),

    /// The generated unit could not be written.
    #[error("failed to write `{path}`")]
    Write {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Some kernels could not be generated.
    #[error("{0} kernel(s) could not be generated")]
    KernelsFailed(usize),

    /// Warnings were emitted while they are denied.
    #[error("{0} warning(s) emitted with warnings denied")]
    WarningsDenied(usize),
}

/// Result type for generator operations.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// The current phase of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratePhase {
    /// Reading and validating the spec.
    Load,
    /// Per-kernel planning.
    Plan,
    /// Building the kernel table.
    Aggregate,
    /// Rendering the unit.
    Render,
    /// Writing the unit to disk.
    Write,
}

impl GeneratePhase {
    /// Get a human-readable name for this phase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Plan => "plan",
            Self::Aggregate => "aggregate",
            Self::Render => "render",
            Self::Write => "write",
        }
    }
}

/// Callbacks for monitoring a run.
pub trait GenerateCallbacks: Send + Sync {
    /// Called when a phase starts.
    fn on_phase_start(&self, _phase: GeneratePhase, _module: &str) {}

    /// Called when a phase completes.
    fn on_phase_complete(&self, _phase: GeneratePhase, _module: &str) {}

    /// Called when a kernel is rejected.
    fn on_kernel_error(&self, _error: &CodegenError) {}
}

/// Default no-op implementation of callbacks.
#[derive(Default)]
pub struct NoopCallbacks;

impl GenerateCallbacks for NoopCallbacks {}

/// Everything a run produced.
#[derive(Debug)]
pub struct GenerateOutput {
    /// The module generated.
    pub module_name: String,
    /// The rendered unit.
    pub source: String,
    /// The kernel table.
    pub table: KernelTable,
    /// Plans of the kernels that succeeded, in spec order.
    pub plans: Vec<WrapperPlan>,
    /// Kernels skipped by the layout filter.
    pub skipped: Vec<String>,
    /// Where the unit was written, if it was.
    pub path: Option<Utf8PathBuf>,
}

/// The main generator driver.
pub struct Generator {
    session: SessionRef,
    callbacks: Arc<dyn GenerateCallbacks>,
}

impl Generator {
    /// Create a new generator with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    pub fn new(options: Options) -> GenerateResult<Self> {
        let session = kwrap_session::create_session(options)?;
        Ok(Self {
            session,
            callbacks: Arc::new(NoopCallbacks),
        })
    }

    /// Create a new generator with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    pub fn with_defaults() -> GenerateResult<Self> {
        Self::new(Options::default())
    }

    /// Set the run callbacks.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: impl GenerateCallbacks + 'static) -> Self {
        self.callbacks = Arc::new(callbacks);
        self
    }

    /// Get a reference to the session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn codegen_options(&self) -> CodegenOptions {
        let options = &self.session.options;
        CodegenOptions {
            debug: options.debug,
            report_stats: options.report_stats,
            extra_includes: options.extra_includes.clone(),
        }
    }

    /// Load a spec file, generate it, and write the unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid, any kernel fails, warnings
    /// are denied and present, or the unit cannot be written. Diagnostics
    /// are left in the session either way.
    #[instrument(skip(self, path), fields(path = %path.as_ref()))]
    pub fn generate_file(&self, path: impl AsRef<Utf8Path>) -> GenerateResult<GenerateOutput> {
        let module = self.load(path.as_ref())?;
        let mut output = self.generate_module(&module)?;

        let out_path = self.session.output_path(&module.module_name);
        self.callbacks
            .on_phase_start(GeneratePhase::Write, &module.module_name);
        write_unit(&out_path, &output.source)?;
        self.callbacks
            .on_phase_complete(GeneratePhase::Write, &module.module_name);
        info!(path = %out_path, kernels = output.plans.len(), "wrote kernel unit");

        output.path = Some(out_path);
        Ok(output)
    }

    /// Load and generate a spec file without writing anything.
    ///
    /// # Errors
    ///
    /// The same as [`Generator::generate_file`], minus write failures.
    #[instrument(skip(self, path), fields(path = %path.as_ref()))]
    pub fn check_file(&self, path: impl AsRef<Utf8Path>) -> GenerateResult<GenerateOutput> {
        let module = self.load(path.as_ref())?;
        self.generate_module(&module)
    }

    fn load(&self, path: &Utf8Path) -> GenerateResult<ModuleSpec> {
        let name = path.file_stem().unwrap_or(path.as_str());
        self.callbacks.on_phase_start(GeneratePhase::Load, name);
        let module = kwrap_spec::load(path).map_err(|e| {
            self.session.emit(spec_diagnostic(&e));
            e
        })?;
        self.callbacks.on_phase_complete(GeneratePhase::Load, name);
        debug!(
            module = %module.module_name,
            kernels = module.kernels.len(),
            "loaded module spec"
        );
        Ok(module)
    }

    /// Generate an in-memory module.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::KernelsFailed`] if any kernel was
    /// rejected, [`GenerateError::WarningsDenied`] if warnings are denied
    /// and any were emitted, or a render error.
    #[instrument(skip(self, module), fields(module = %module.module_name))]
    pub fn generate_module(&self, module: &ModuleSpec) -> GenerateResult<GenerateOutput> {
        let name = module.module_name.as_str();
        let options = self.codegen_options();

        let (selected, skipped): (Vec<&KernelSpec>, Vec<&KernelSpec>) = module
            .kernels
            .iter()
            .partition(|k| self.session.options.layout_enabled(k.layout));
        for kernel in &skipped {
            debug!(kernel = %kernel.kernel_name, layout = %kernel.layout, "layout filtered out");
        }

        self.callbacks.on_phase_start(GeneratePhase::Plan, name);
        let results = self.plan_all(&selected, &options)?;
        self.callbacks.on_phase_complete(GeneratePhase::Plan, name);

        let mut plans = Vec::with_capacity(results.len());
        let mut failed = 0;
        let mut warnings = 0;
        for result in results {
            match result {
                Ok(plan) => {
                    warnings += plan.warnings.len();
                    self.session.emit_all(
                        plan.warnings
                            .iter()
                            .cloned()
                            .map(|w| w.into_diagnostic().with_module(name)),
                    );
                    plans.push(plan);
                }
                Err(e) => {
                    self.callbacks.on_kernel_error(&e);
                    failed += 1;
                    self.session.emit(e.into_diagnostic().with_module(name));
                }
            }
        }

        self.callbacks.on_phase_start(GeneratePhase::Aggregate, name);
        let table = aggregate(&plans);
        warnings += table.warnings.len();
        self.session.emit_all(
            table
                .warnings
                .iter()
                .cloned()
                .map(|w| w.into_diagnostic().with_module(name)),
        );
        self.callbacks.on_phase_complete(GeneratePhase::Aggregate, name);

        self.callbacks.on_phase_start(GeneratePhase::Render, name);
        let source = render_module(module, &plans, &table, &options).map_err(|e| {
            self.session.emit(render_diagnostic(name, &e));
            e
        })?;
        self.callbacks.on_phase_complete(GeneratePhase::Render, name);

        if failed > 0 {
            return Err(GenerateError::KernelsFailed(failed));
        }
        if self.session.options.deny_warnings && warnings > 0 {
            return Err(GenerateError::WarningsDenied(warnings));
        }

        info!(
            rows = table.rows.len(),
            wrappers = plans.len(),
            skipped = skipped.len(),
            "generated module"
        );
        Ok(GenerateOutput {
            module_name: module.module_name.clone(),
            source,
            table,
            plans,
            skipped: skipped.iter().map(|k| k.kernel_name.clone()).collect(),
            path: None,
        })
    }

    /// Plan every kernel, in parallel, preserving spec order.
    fn plan_all(
        &self,
        kernels: &[&KernelSpec],
        options: &CodegenOptions,
    ) -> GenerateResult<Vec<Result<WrapperPlan, CodegenError>>> {
        let run = || -> Vec<Result<WrapperPlan, CodegenError>> {
            kernels
                .par_iter()
                .map(|kernel| plan_one(kernel, options))
                .collect()
        };
        match self.session.options.jobs {
            Some(jobs) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
                Ok(pool.install(run))
            }
            None => Ok(run()),
        }
    }
}

#[instrument(skip_all, fields(kernel = %kernel.kernel_name, layout = %kernel.layout))]
fn plan_one(kernel: &KernelSpec, options: &CodegenOptions) -> Result<WrapperPlan, CodegenError> {
    let plan = plan_kernel(kernel, options)?;
    debug!(wrapper = %plan.wrapper_name, "planned kernel");
    Ok(plan)
}

fn write_unit(path: &Utf8Path, source: &str) -> GenerateResult<()> {
    let write_err = |source| GenerateError::Write {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, source).map_err(write_err)
}

/// A module template that fails to expand is a generator bug, not a spec
/// problem.
fn render_diagnostic(module: &str, error: &TemplateError) -> Diagnostic {
    Diagnostic::bug(format!("failed to render module unit: {error}"))
        .with_module(module)
        .with_help("this is a bug in kwrap; please report it with the module spec")
}

/// Convert a load failure into a diagnostic.
#[must_use]
pub fn spec_diagnostic(error: &SpecError) -> Diagnostic {
    let mut diag = Diagnostic::error(error.to_string()).with_code("E0009");
    if let Some(kernel) = error.kernel() {
        diag = diag.with_kernel(kernel);
    }
    if let Some(argument) = error.argument() {
        diag = diag.with_argument(argument);
    }
    diag
}

/// Builder for configuring and creating a generator.
#[derive(Default)]
pub struct GeneratorBuilder {
    options: Options,
}

impl GeneratorBuilder {
    /// Create a new builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the given options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Emit debug tracing in wrappers.
    #[must_use]
    pub fn debug(mut self, enable: bool) -> Self {
        self.options.debug = enable;
        self
    }

    /// Emit the call-count report.
    #[must_use]
    pub fn report_stats(mut self, enable: bool) -> Self {
        self.options.report_stats = enable;
        self
    }

    /// Restrict generation to one more layout kind.
    #[must_use]
    pub fn layout(mut self, layout: kwrap_spec::LayoutKind) -> Self {
        self.options.layouts.get_or_insert_with(Vec::new).push(layout);
        self
    }

    /// Treat warnings as errors.
    #[must_use]
    pub fn deny_warnings(mut self, deny: bool) -> Self {
        self.options.deny_warnings = deny;
        self
    }

    /// Set the worker count.
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.options.jobs = Some(jobs);
        self
    }

    /// Set the output path.
    #[must_use]
    pub fn output_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.options.output_path = Some(path.into());
        self
    }

    /// Build the generator.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    pub fn build(self) -> GenerateResult<Generator> {
        Generator::new(self.options)
    }
}
