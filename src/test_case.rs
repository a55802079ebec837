//! A single fixture test: render, compare, optionally update, validate.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Mode;
use crate::errors::{ChartTestError, Result};
use crate::manifest::{combine_manifests, compare_manifests, IgnorePatterns, Item};
use crate::render::{DebugSink, Renderer};
use crate::schema::SchemaUnifier;
use crate::update::{apply_update, UpdateType};
use crate::validate::{NoopValidator, Validator};
use crate::value::Value;

pub const VALUES_FILE: &str = "values.yaml";
pub const EXPECTED_FILE: &str = "expected.yaml";
pub const ACTUAL_FILE: &str = "actual.yaml";

/// Shared, read-only state every test in a suite runs against.
pub struct TestContext {
    pub tests_dir: PathBuf,
    pub mode: Mode,
    /// The chart's own `values.yaml`, used for the coalesced values dump.
    pub chart_defaults: Value,
    pub renderer: Box<dyn Renderer>,
    pub validator: Box<dyn Validator>,
    pub schema: Option<Box<dyn SchemaUnifier>>,
    pub ignore: IgnorePatterns,
    pub save_actual: bool,
    pub debug: Option<DebugSink>,
}

impl TestContext {
    pub fn new(tests_dir: impl Into<PathBuf>, mode: Mode, renderer: Box<dyn Renderer>) -> Self {
        Self {
            tests_dir: tests_dir.into(),
            mode,
            chart_defaults: Value::mapping(),
            renderer,
            validator: Box::new(NoopValidator),
            schema: None,
            ignore: IgnorePatterns::default(),
            save_actual: false,
            debug: None,
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_schema(mut self, schema: Box<dyn SchemaUnifier>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_chart_defaults(mut self, defaults: Value) -> Self {
        self.chart_defaults = defaults;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnorePatterns) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_save_actual(mut self, save_actual: bool) -> Self {
        self.save_actual = save_actual;
        self
    }

    pub fn with_debug(mut self, sink: DebugSink) -> Self {
        self.debug = Some(sink);
        self
    }
}

/// A validator finding attached to a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    pub signature: String,
    pub error: String,
}

/// One test and, after [`TestCase::run`], its outcome.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub is_update: bool,
    pub update_type: UpdateType,
    pub is_same: bool,
    pub is_valid: bool,
    pub missing: Vec<Item>,
    pub extra: Vec<Item>,
    pub different: Vec<Item>,
    pub validation_errors: Vec<ValidationFinding>,
    pub ignored_lines: Vec<String>,
    /// Chart defaults coalesced with the test's values.
    pub values: Option<Value>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            is_update: mode.is_update(),
            update_type: UpdateType::None,
            is_same: true,
            is_valid: true,
            missing: Vec::new(),
            extra: Vec::new(),
            different: Vec::new(),
            validation_errors: Vec::new(),
            ignored_lines: Vec::new(),
            values: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.is_same && self.is_valid
    }

    pub fn add_validation_error(&mut self, signature: impl Into<String>, error: impl Into<String>) {
        self.is_valid = false;
        self.validation_errors.push(ValidationFinding {
            signature: signature.into(),
            error: error.into(),
        });
    }

    /// Runs the whole pipeline for this test against its fixture directory.
    pub fn run(&mut self, ctx: &TestContext) -> Result<()> {
        let dir = ctx.tests_dir.join(&self.name);

        let mut values = load_values(&dir.join(VALUES_FILE))?;
        if let Some(schema) = &ctx.schema {
            values = schema.unify(&values).map_err(|errors| ChartTestError::Schema {
                test: self.name.clone(),
                errors,
            })?;
        }
        self.values = Some(ctx.chart_defaults.coalesce(&values));

        let rendered = ctx.renderer.render(&values);
        if let Some(sink) = &ctx.debug {
            let raw = match &rendered {
                Ok(rendered) => Some(rendered.manifest.as_str()),
                Err(err) => err.partial.as_deref(),
            };
            sink.write_render(&self.name, raw.unwrap_or_default());
        }
        let rendered = rendered.map_err(|err| ChartTestError::render(&self.name, err.message))?;

        let actual = combine_manifests(
            &rendered.manifest,
            rendered.hooks.iter().map(|hook| (hook.path.as_str(), hook.manifest.as_str())),
        );

        if ctx.save_actual {
            let path = dir.join(ACTUAL_FILE);
            fs::write(&path, &actual)
                .map_err(|err| ChartTestError::io(format!("writing {}", path.display()), err))?;
        }

        let expected_path = dir.join(EXPECTED_FILE);
        let expected = fs::read_to_string(&expected_path).map_err(|source| ChartTestError::Fixture {
            path: expected_path.clone(),
            source,
        })?;

        let comparison = compare_manifests(&expected, &actual, &ctx.ignore);
        self.is_same = comparison.is_equal();
        if self.is_update {
            self.update_type = apply_update(&expected_path, self.is_same, &actual, &expected)?;
        }
        self.missing = comparison.missing;
        self.extra = comparison.extra;
        self.different = comparison.different;
        self.ignored_lines = comparison.ignored_lines;

        // Hooks are not validated.
        for result in ctx.validator.validate(&rendered.manifest)? {
            if result.status.is_failure() {
                self.add_validation_error(result.signature, result.message);
            }
        }

        debug!(
            test = %self.name,
            same = self.is_same,
            valid = self.is_valid,
            update = %self.update_type,
            "test finished"
        );
        Ok(())
    }
}

/// Reads a test's values file. An empty file is an empty mapping.
fn load_values(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|source| ChartTestError::Fixture {
        path: path.to_path_buf(),
        source,
    })?;
    let values = Value::from_yaml_str(&text).map_err(|err| ChartTestError::FixtureParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    match values {
        Value::Null => Ok(Value::mapping()),
        Value::Mapping(_) => Ok(values),
        other => Err(ChartTestError::FixtureParse {
            path: path.to_path_buf(),
            message: format!("top level must be a mapping, found {}", other.type_name()),
        }),
    }
}
