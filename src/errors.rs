//! Error types for chartcheck.
//!
//! Only a handful of failures are allowed to escape a test's unit of work: a
//! missing or unreadable fixture, a render failure, a schema unification
//! failure, and an I/O error while writing an expected file back. Everything
//! else (validation findings, normalization failures) is recorded on the
//! [`TestCase`](crate::test_case::TestCase) and shown by the reporter.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ChartTestError> = std::result::Result<T, E>;

/// Fatal errors, all of which abort the suite.
#[derive(Debug, Error, Diagnostic)]
pub enum ChartTestError {
    #[error("reading fixture {path}")]
    #[diagnostic(
        code(chartcheck::fixture),
        help("every test directory needs a values.yaml and an expected.yaml; create an empty expected.yaml and run `chartcheck update` to fill it")
    )]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing fixture {path}: {message}")]
    #[diagnostic(code(chartcheck::fixture::parse))]
    FixtureParse { path: PathBuf, message: String },

    #[error("rendering test {test}: {message}")]
    #[diagnostic(code(chartcheck::render))]
    Render { test: String, message: String },

    #[error("unifying values of test {test} with schema:\n{}", .errors.join("\n"))]
    #[diagnostic(code(chartcheck::schema))]
    Schema { test: String, errors: Vec<String> },

    #[error("compiling ignore pattern {pattern:?}")]
    #[diagnostic(
        code(chartcheck::config::ignore),
        help("ignore patterns use the `regex` crate syntax and are matched against single lines")
    )]
    IgnorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("writing {path}")]
    #[diagnostic(code(chartcheck::write_back))]
    WriteBack {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {message}")]
    #[diagnostic(code(chartcheck::config))]
    Config { path: PathBuf, message: String },

    #[error("running validator: {message}")]
    #[diagnostic(code(chartcheck::validator))]
    Validator { message: String },

    #[error("test {test} stopped without reporting a result")]
    #[diagnostic(code(chartcheck::worker))]
    Worker { test: String },

    #[error("{context}")]
    #[diagnostic(code(chartcheck::io))]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ChartTestError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn render(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            test: test.into(),
            message: message.into(),
        }
    }
}

/// A document could not be decoded as YAML.
///
/// Always recoverable: callers fall back to comparing raw trimmed text.
#[derive(Debug, Error)]
#[error("normalizing YAML document: {0}")]
pub struct NormalizationError(#[from] pub serde_yaml::Error);
