//! Unification of test values with a chart-provided schema.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::render::run_with_stdin;
use crate::value::Value;

/// Unifies a values tree with a schema, returning the completed tree or
/// every error the schema reported.
pub trait SchemaUnifier: Send + Sync {
    fn unify(&self, values: &Value) -> Result<Value, Vec<String>>;
}

/// Unifies against the `#values` definition of a CUE file using `cue export`.
#[derive(Debug, Clone)]
pub struct CueUnifier {
    program: PathBuf,
    schema: PathBuf,
    definition: String,
}

impl CueUnifier {
    pub fn new(schema: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("cue"),
            schema: schema.into(),
            definition: "#values".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("export")
            .arg(&self.schema)
            .arg("json:")
            .arg("-")
            .arg("--schema")
            .arg(&self.definition)
            .arg("--out")
            .arg("json");
        command
    }
}

impl SchemaUnifier for CueUnifier {
    fn unify(&self, values: &Value) -> Result<Value, Vec<String>> {
        let input = serde_json::to_string(values).map_err(|err| vec![format!("serializing values: {err}")])?;

        debug!(schema = %self.schema.display(), "unifying values");
        let output = run_with_stdin(self.command(), &input)
            .map_err(|err| vec![format!("running {}: {err}", self.program.display())])?;

        if !output.status.success() {
            return Err(split_errors(&String::from_utf8_lossy(&output.stderr)));
        }

        let unified: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|err| vec![format!("reading unified values: {err}")])?;
        Ok(Value::from(unified))
    }
}

/// One error per non-blank line of tool output.
fn split_errors(stderr: &str) -> Vec<String> {
    let errors: Vec<String> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    if errors.is_empty() {
        vec!["schema unification failed".to_string()]
    } else {
        errors
    }
}
