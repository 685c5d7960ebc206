//! kwrap - Kernel Wrapper Compiler - Main Entry Point
//!
//! kwrap turns a declarative module spec into a C unit of kernel wrappers
//! and the dispatch table that registers them with the host runtime.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kwrap_diagnostics::{CargoRenderer, Diagnostic};
use kwrap_driver::{GenerateError, GenerateOutput, Generator};
use kwrap_session::Options;
use kwrap_spec::LayoutKind;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Kernel wrapper compiler
#[derive(Parser, Debug)]
#[command(name = "kwrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the wrapper unit for a module spec
    Generate {
        #[command(flatten)]
        run: RunArgs,

        /// Output file name
        #[arg(short, long, value_name = "FILE")]
        output: Option<Utf8PathBuf>,
    },

    /// Check a module spec without writing output
    Check {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Explain an error code
    Explain {
        /// The code, e.g. E0001
        code: String,
    },
}

/// Options shared by `generate` and `check`
#[derive(Args, Debug)]
struct RunArgs {
    /// Module spec (.json or .toml)
    #[arg(value_name = "SPEC")]
    spec: Utf8PathBuf,

    /// Configuration file; defaults to kwrap.toml next to the spec
    #[arg(long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Emit debug tracing in generated wrappers
    #[arg(long)]
    debug: bool,

    /// Do not emit the call-count report
    #[arg(long)]
    no_stats: bool,

    /// Only generate kernels of this layout kind (repeatable)
    #[arg(long = "layout", value_name = "KIND")]
    layouts: Vec<LayoutKind>,

    /// Treat warnings as errors
    #[arg(long)]
    deny_warnings: bool,

    /// Diagnostic output format
    #[arg(long, value_enum, default_value = "human")]
    message_format: MessageFormat,

    /// Number of parallel jobs
    #[arg(short, long)]
    jobs: Option<usize>,
}

/// How diagnostics are printed
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// Cargo-style text
    Human,
    /// One JSON object per line
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate { run, output } => {
            let mut options = load_options(&run)?;
            if let Some(output) = output {
                options.output_path = Some(output);
            }
            execute(&run, options, true)
        }
        Commands::Check { run } => {
            let options = load_options(&run)?;
            execute(&run, options, false)
        }
        Commands::Explain { code } => {
            kwrap_diagnostics::print_explanation(&code.to_uppercase());
            Ok(())
        }
    }
}

/// Read the configuration file, then apply command-line overrides.
fn load_options(run: &RunArgs) -> Result<Options> {
    let implicit = run
        .spec
        .parent()
        .map(|dir| dir.join("kwrap.toml"))
        .filter(|path| path.exists());

    let mut options = match run.config.as_deref().or(implicit.as_deref()) {
        Some(path) => Options::from_toml_file(path)
            .with_context(|| format!("failed to load configuration `{path}`"))?,
        None => Options::default(),
    };

    options.debug |= run.debug;
    if run.no_stats {
        options.report_stats = false;
    }
    if !run.layouts.is_empty() {
        options.layouts = Some(run.layouts.clone());
    }
    options.deny_warnings |= run.deny_warnings;
    if run.jobs.is_some() {
        options.jobs = run.jobs;
    }
    Ok(options)
}

fn execute(run: &RunArgs, options: Options, write: bool) -> Result<()> {
    let generator = Generator::new(options).context("failed to create generator")?;
    let result = if write {
        generator.generate_file(&run.spec)
    } else {
        generator.check_file(&run.spec)
    };

    let diagnostics = generator.session().take_diagnostics();
    emit_diagnostics(&diagnostics, run.message_format)?;

    match result {
        Ok(output) => {
            report(&output, &run.spec);
            Ok(())
        }
        Err(
            e @ (GenerateError::Spec(_)
            | GenerateError::KernelsFailed(_)
            | GenerateError::WarningsDenied(_)),
        ) => {
            eprintln!("error: could not generate `{}`: {e}", run.spec);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn emit_diagnostics(diagnostics: &[Diagnostic], format: MessageFormat) -> Result<()> {
    match format {
        MessageFormat::Human => CargoRenderer::new().render_all(diagnostics),
        MessageFormat::Json => {
            if !diagnostics.is_empty() {
                eprintln!("{}", kwrap_diagnostics::to_json_lines(diagnostics)?.trim_end());
            }
        }
    }
    Ok(())
}

fn report(output: &GenerateOutput, spec: &Utf8Path) {
    match &output.path {
        Some(path) => tracing::info!("Generated: {path}"),
        None => tracing::info!(
            "Checked {spec}: {} wrapper(s), {} table row(s)",
            output.plans.len(),
            output.table.rows.len()
        ),
    }
}
