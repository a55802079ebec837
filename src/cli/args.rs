//! Command-line arguments and subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Overrides, ValuesDisplay};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "chartcheck",
    about = "Fixture-based regression tests for rendered Helm chart manifests."
)]
pub struct ChartCheckArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding one subdirectory per test.
    #[arg(short = 'p', long = "path", default_value = "tests", global = true)]
    pub path: PathBuf,

    /// Chart directory passed to the renderer.
    #[arg(long, default_value = ".", global = true)]
    pub chart: PathBuf,

    /// Namespace to render into [default: my-namespace].
    #[arg(short = 'n', long, global = true)]
    pub namespace: Option<String>,

    /// Release name to render with [default: my-release].
    #[arg(short = 'r', long, global = true)]
    pub release: Option<String>,

    /// Write each test's rendered manifest to actual.yaml.
    #[arg(short = 's', long, global = true)]
    pub save_actual: bool,

    /// Print coalesced values of failing tests.
    #[arg(short = 'v', long, global = true)]
    pub show_values: bool,

    /// Print coalesced values of every test.
    #[arg(short = 'V', long, global = true)]
    pub show_all_values: bool,

    /// Regular expression for lines to leave out of comparisons. Repeatable.
    #[arg(short = 'i', long = "ignore", value_name = "REGEX", global = true)]
    pub ignore: Vec<String>,

    /// Maximum tests rendering at once; 0 uses every available CPU.
    #[arg(short = 'j', long, global = true)]
    pub concurrency: Option<usize>,

    /// Append raw render output to this file, or `-` for stderr.
    #[arg(long, value_name = "PATH", global = true)]
    pub debug: Option<PathBuf>,

    /// Skip schema validation of rendered manifests. Validation runs the
    /// `kubeconform` binary and is skipped with a warning when it is missing.
    #[arg(long, global = true)]
    pub no_validate: bool,

    /// Log progress to stderr. RUST_LOG takes precedence.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// When to color output.
    #[arg(long, value_enum, default_value_t = ColorArg::Auto, global = true)]
    pub color: ColorArg,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            tests_dir: self.path.clone(),
            chart_dir: self.chart.clone(),
            release: self.release.clone(),
            namespace: self.namespace.clone(),
            ignore_lines: self.ignore.clone(),
            concurrency: self.concurrency,
            save_actual: self.save_actual,
            values_display: ValuesDisplay::from_flags(self.show_values, self.show_all_values),
            debug_output: self.debug.clone(),
            no_validate: self.no_validate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render every test and compare it with its expected manifest.
    Run {
        /// Tests to run; defaults to every directory under the tests path.
        tests: Vec<String>,
    },
    /// Rewrite expected manifests from the current render output.
    Update {
        /// Tests to update; defaults to every directory under the tests path.
        tests: Vec<String>,
    },
    /// Print the version.
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        ChartCheckArgs::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = ChartCheckArgs::try_parse_from([
            "chartcheck", "run", "-i", "^a", "--ignore", "^b", "-j", "4", "-V", "basic",
        ])
        .unwrap();
        assert_eq!(args.global.ignore, ["^a", "^b"]);
        assert_eq!(args.global.concurrency, Some(4));
        assert!(args.global.show_all_values);
        match args.command {
            Command::Run { tests } => assert_eq!(tests, ["basic"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults() {
        let args = ChartCheckArgs::try_parse_from(["chartcheck", "update"]).unwrap();
        assert_eq!(args.global.path, PathBuf::from("tests"));
        assert_eq!(args.global.chart, PathBuf::from("."));
        assert_eq!(args.global.color, ColorArg::Auto);
        let overrides = args.global.overrides();
        assert_eq!(overrides.values_display, ValuesDisplay::Never);
        assert!(overrides.release.is_none());
    }
}
