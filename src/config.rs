//! Run configuration: the optional `tests.yaml` file in the tests directory,
//! overlaid with command-line options.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{ChartTestError, Result};

/// Name of the configuration file looked up inside the tests directory.
pub const CONFIG_FILE: &str = "tests.yaml";
const CURRENT_VERSION: u32 = 1;

pub const DEFAULT_RELEASE: &str = "my-release";
pub const DEFAULT_NAMESPACE: &str = "my-namespace";
/// CUE schema picked up from the chart directory when present.
pub const DEFAULT_SCHEMA_FILE: &str = "values.cue";

/// Whether a run compares only, or also rewrites expected files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Update,
}

impl Mode {
    pub fn is_update(&self) -> bool {
        matches!(self, Mode::Update)
    }
}

/// Which tests get their coalesced values printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValuesDisplay {
    #[default]
    Never,
    /// Only tests that failed or are invalid.
    Failing,
    All,
}

impl ValuesDisplay {
    pub fn from_flags(show_values: bool, show_all_values: bool) -> Self {
        if show_all_values {
            ValuesDisplay::All
        } else if show_values {
            ValuesDisplay::Failing
        } else {
            ValuesDisplay::Never
        }
    }

    pub fn shows(&self, failed: bool) -> bool {
        match self {
            ValuesDisplay::Never => false,
            ValuesDisplay::Failing => failed,
            ValuesDisplay::All => true,
        }
    }
}

/// Contents of `tests.yaml`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub version: Option<u32>,
    pub release: Option<String>,
    pub namespace: Option<String>,
    /// Regular expressions; matching lines are left out of comparisons.
    #[serde(default)]
    pub ignore_lines: Vec<String>,
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Path to a CUE schema, relative to the chart directory.
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Extra arguments for the validator command.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enable: true,
            args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl ConfigFile {
    /// Loads `tests.yaml` from `tests_dir`; a missing file yields defaults.
    pub fn load(tests_dir: &Path) -> Result<Self> {
        let path = tests_dir.join(CONFIG_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(ChartTestError::io(format!("reading {}", path.display()), err)),
        };
        Self::parse(&text, &path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: ConfigFile = serde_yaml::from_str(text).map_err(|err| ChartTestError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        match config.version {
            None | Some(CURRENT_VERSION) => Ok(config),
            Some(other) => Err(ChartTestError::Config {
                path: path.to_path_buf(),
                message: format!("unsupported config file version {other}, expected {CURRENT_VERSION}"),
            }),
        }
    }
}

/// Command-line values that take precedence over `tests.yaml`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tests_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub release: Option<String>,
    pub namespace: Option<String>,
    pub ignore_lines: Vec<String>,
    pub concurrency: Option<usize>,
    pub save_actual: bool,
    pub values_display: ValuesDisplay,
    pub debug_output: Option<PathBuf>,
    pub no_validate: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    pub tests_dir: PathBuf,
    pub chart_dir: PathBuf,
    pub release: String,
    pub namespace: String,
    pub ignore_lines: Vec<String>,
    pub concurrency: usize,
    pub save_actual: bool,
    pub values_display: ValuesDisplay,
    pub debug_output: Option<PathBuf>,
    /// Validator arguments, or `None` when validation is disabled.
    pub validation: Option<Vec<String>>,
    pub schema: Option<PathBuf>,
}

impl RunOptions {
    pub fn resolve(mode: Mode, file: ConfigFile, overrides: Overrides) -> Self {
        let mut ignore_lines = file.ignore_lines;
        ignore_lines.extend(overrides.ignore_lines);

        let validation = (file.validation.enable && !overrides.no_validate)
            .then_some(file.validation.args);

        let schema = match file.schema {
            Some(path) => Some(overrides.chart_dir.join(path)),
            None => {
                let default = overrides.chart_dir.join(DEFAULT_SCHEMA_FILE);
                default.is_file().then_some(default)
            }
        };

        Self {
            mode,
            release: overrides
                .release
                .or(file.release)
                .unwrap_or_else(|| DEFAULT_RELEASE.to_string()),
            namespace: overrides
                .namespace
                .or(file.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            concurrency: effective_concurrency(overrides.concurrency.or(file.concurrency).unwrap_or(0)),
            tests_dir: overrides.tests_dir,
            chart_dir: overrides.chart_dir,
            ignore_lines,
            save_actual: overrides.save_actual,
            values_display: overrides.values_display,
            debug_output: overrides.debug_output,
            validation,
            schema,
        }
    }
}

/// Zero means one worker per available execution unit.
pub fn effective_concurrency(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ConfigFile> {
        ConfigFile::parse(text, Path::new("tests/tests.yaml"))
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert!(config.ignore_lines.is_empty());
        assert!(config.validation.enable);
    }

    #[test]
    fn parses_all_fields() {
        let config = parse(
            "version: 1\nrelease: rel\nnamespace: ns\nignoreLines: ['^\\s*checksum:']\nconcurrency: 3\nvalidation:\n  enable: false\n  args: [-summary]\nschema: schema/values.cue\n",
        )
        .unwrap();
        assert_eq!(config.release.as_deref(), Some("rel"));
        assert_eq!(config.namespace.as_deref(), Some("ns"));
        assert_eq!(config.ignore_lines, ["^\\s*checksum:"]);
        assert_eq!(config.concurrency, Some(3));
        assert!(!config.validation.enable);
        assert_eq!(config.validation.args, ["-summary"]);
        assert_eq!(config.schema, Some(PathBuf::from("schema/values.cue")));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse("version: 2").unwrap_err();
        assert!(matches!(err, ChartTestError::Config { .. }));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse("relase: typo").is_err());
    }

    #[test]
    fn command_line_wins_and_patterns_accumulate() {
        let file = parse("release: from-file\nnamespace: file-ns\nignoreLines: [a]\nconcurrency: 2").unwrap();
        let overrides = Overrides {
            tests_dir: PathBuf::from("tests"),
            chart_dir: PathBuf::from("/nonexistent-chart"),
            release: Some("from-cli".to_string()),
            ignore_lines: vec!["b".to_string()],
            no_validate: true,
            ..Overrides::default()
        };
        let options = RunOptions::resolve(Mode::Run, file, overrides);
        assert_eq!(options.release, "from-cli");
        assert_eq!(options.namespace, "file-ns");
        assert_eq!(options.ignore_lines, ["a", "b"]);
        assert_eq!(options.concurrency, 2);
        assert!(options.validation.is_none());
        assert!(options.schema.is_none());
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let options = RunOptions::resolve(Mode::Update, ConfigFile::default(), Overrides::default());
        assert_eq!(options.release, DEFAULT_RELEASE);
        assert_eq!(options.namespace, DEFAULT_NAMESPACE);
        assert!(options.concurrency >= 1);
        assert_eq!(options.validation, Some(Vec::new()));
        assert!(options.mode.is_update());
    }

    #[test]
    fn values_display_from_flags() {
        assert_eq!(ValuesDisplay::from_flags(false, false), ValuesDisplay::Never);
        assert!(ValuesDisplay::from_flags(true, false).shows(true));
        assert!(!ValuesDisplay::from_flags(true, false).shows(false));
        assert!(ValuesDisplay::from_flags(true, true).shows(false));
    }
}
