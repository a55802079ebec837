//! The chartcheck command-line interface.
//!
//! Parses arguments, resolves configuration, wires the renderer, validator
//! and schema adapters into a [`TestContext`], and runs the suite.

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::{ChartCheckArgs, ColorArg, Command, GlobalArgs};
use crate::config::{ConfigFile, Mode, RunOptions};
use crate::discovery::resolve_test_names;
use crate::errors::{ChartTestError, Result};
use crate::manifest::IgnorePatterns;
use crate::render::{DebugSink, HelmRenderer};
use crate::report::Reporter;
use crate::schema::CueUnifier;
use crate::suite::TestSuite;
use crate::test_case::TestContext;
use crate::validate::{KubeconformValidator, NoopValidator, Validator};
use crate::value::Value;

pub mod args;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = ChartCheckArgs::parse();
    init_logging(args.global.verbose);

    let result = match args.command {
        Command::Version => {
            println!("chartcheck {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
        Command::Run { tests } => execute(Mode::Run, &args.global, &tests),
        Command::Update { tests } => execute(Mode::Update, &args.global, &tests),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let report = miette::Report::new(e);
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default = if verbose { "chartcheck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn color_choice(arg: ColorArg) -> ColorChoice {
    match arg {
        ColorArg::Always => ColorChoice::Always,
        ColorArg::Never => ColorChoice::Never,
        ColorArg::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
        ColorArg::Auto => ColorChoice::Never,
    }
}

/// Runs or updates the suite. `Ok(false)` means tests failed.
fn execute(mode: Mode, global: &GlobalArgs, requested: &[String]) -> Result<bool> {
    if !global.path.is_dir() {
        println!("No tests found");
        return Ok(true);
    }

    let file = ConfigFile::load(&global.path)?;
    let options = RunOptions::resolve(mode, file, global.overrides());
    debug!(?options, "resolved options");

    let ignore = IgnorePatterns::compile(&options.ignore_lines)?;
    let names = resolve_test_names(&options.tests_dir, requested)?;
    let ctx = build_context(&options, ignore)?;

    let mut suite = TestSuite::new(names, mode);
    let stdout = StandardStream::stdout(color_choice(global.color));
    let mut reporter = Reporter::new(stdout, mode, options.values_display).with_name_width(suite.name_width());

    info!(tests = suite.len(), concurrency = options.concurrency, "starting");
    suite.run(Arc::new(ctx), options.concurrency, &mut reporter)?;
    reporter.print_summary()?;

    Ok(mode.is_update() || suite.is_successful())
}

fn build_context(options: &RunOptions, ignore: IgnorePatterns) -> Result<TestContext> {
    let renderer = HelmRenderer::new(&options.chart_dir, &options.release, &options.namespace);
    let validator = select_validator(options.validation.as_deref(), KubeconformValidator::new);

    let mut ctx = TestContext::new(&options.tests_dir, options.mode, Box::new(renderer))
        .with_validator(validator)
        .with_chart_defaults(load_chart_defaults(&options.chart_dir)?)
        .with_ignore(ignore)
        .with_save_actual(options.save_actual);
    if let Some(schema) = &options.schema {
        ctx = ctx.with_schema(Box::new(CueUnifier::new(schema)));
    }
    if let Some(path) = &options.debug_output {
        ctx = ctx.with_debug(DebugSink::open(path)?);
    }
    Ok(ctx)
}

/// Picks kubeconform when validation is enabled and the binary exists.
/// A missing binary is reported once and validation is skipped.
fn select_validator(
    args: Option<&[String]>,
    make: impl FnOnce(Vec<String>) -> KubeconformValidator,
) -> Box<dyn Validator> {
    let Some(args) = args else {
        return Box::new(NoopValidator);
    };
    let validator = make(args.to_vec());
    if validator.is_installed() {
        Box::new(validator)
    } else {
        warn!("kubeconform not found on PATH; skipping validation (pass --no-validate to silence)");
        Box::new(NoopValidator)
    }
}

/// Reads the chart's `values.yaml`; a chart without one has no defaults.
fn load_chart_defaults(chart_dir: &Path) -> Result<Value> {
    let path = chart_dir.join("values.yaml");
    if !path.is_file() {
        return Ok(Value::mapping());
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ChartTestError::Fixture {
        path: path.clone(),
        source,
    })?;
    let values = Value::from_yaml_str(&text).map_err(|err| ChartTestError::FixtureParse {
        path,
        message: err.to_string(),
    })?;
    Ok(if values.is_null() { Value::mapping() } else { values })
}
