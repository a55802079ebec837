//! Chart rendering.
//!
//! The renderer is an external collaborator: it receives the values tree and
//! returns the primary manifest plus any hook manifests. [`HelmRenderer`]
//! drives the `helm` binary; tests substitute their own implementation.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::{ChartTestError, Result};
use crate::value::Value;

/// A rendered hook manifest, kept apart from the primary manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub path: String,
    pub manifest: String,
}

/// Successful render output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub manifest: String,
    pub hooks: Vec<Hook>,
}

impl Rendered {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, path: impl Into<String>, manifest: impl Into<String>) -> Self {
        self.hooks.push(Hook {
            path: path.into(),
            manifest: manifest.into(),
        });
        self
    }
}

/// Render failure. `partial` holds whatever manifest text was produced
/// before the failure, for the debug dump.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
    pub partial: Option<String>,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }
}

/// Produces manifests for a chart given a values tree.
///
/// Shared by every worker, so implementations must be thread-safe.
pub trait Renderer: Send + Sync {
    fn render(&self, values: &Value) -> std::result::Result<Rendered, RenderError>;
}

/// Renders with `helm template`, passing values on standard input.
#[derive(Debug, Clone)]
pub struct HelmRenderer {
    program: PathBuf,
    chart_dir: PathBuf,
    release: String,
    namespace: String,
}

impl HelmRenderer {
    pub fn new(chart_dir: impl Into<PathBuf>, release: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("helm"),
            chart_dir: chart_dir.into(),
            release: release.into(),
            namespace: namespace.into(),
        }
    }

    /// Uses a specific `helm` executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("template")
            .arg(&self.release)
            .arg(&self.chart_dir)
            .arg("--namespace")
            .arg(&self.namespace)
            .arg("--include-crds")
            .arg("--values")
            .arg("-");
        command
    }
}

impl Renderer for HelmRenderer {
    fn render(&self, values: &Value) -> std::result::Result<Rendered, RenderError> {
        let values = values
            .to_yaml_string()
            .map_err(|err| RenderError::new(format!("serializing values: {err}")))?;

        debug!(chart = %self.chart_dir.display(), release = %self.release, "running helm template");
        let output = run_with_stdin(self.command(), &values)
            .map_err(|err| RenderError::new(format!("running {}: {err}", self.program.display())))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError {
                message: stderr.trim().to_string(),
                partial: (!stdout.is_empty()).then_some(stdout),
            });
        }

        // `helm template` prints hooks inline with the rest of the release.
        Ok(Rendered::new(stdout))
    }
}

/// Spawns `command`, writes `input` to its standard input and collects output.
///
/// Input is fed from a helper thread so a child that stops reading early
/// is still reaped and its stderr kept. A closed pipe is not an error; the
/// child's exit status tells the story.
pub(crate) fn run_with_stdin(mut command: Command, input: &str) -> io::Result<std::process::Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let feeder = child.stdin.take().map(|mut stdin| {
        let input = input.to_owned();
        thread::spawn(move || stdin.write_all(input.as_bytes()))
    });
    let output = child.wait_with_output()?;
    if let Some(Ok(Err(err))) = feeder.map(thread::JoinHandle::join) {
        if err.kind() != io::ErrorKind::BrokenPipe {
            return Err(err);
        }
    }
    Ok(output)
}

/// Destination for raw render output of every test.
pub struct DebugSink {
    target: Mutex<Box<dyn Write + Send>>,
}

impl DebugSink {
    /// Opens `path` for writing; `-` means standard error.
    pub fn open(path: &Path) -> Result<Self> {
        let target: Box<dyn Write + Send> = if path == Path::new("-") {
            Box::new(io::stderr())
        } else {
            let file = File::create(path)
                .map_err(|err| ChartTestError::io(format!("creating debug output {}", path.display()), err))?;
            Box::new(file)
        };
        Ok(Self::from_writer(target))
    }

    pub fn from_writer(target: Box<dyn Write + Send>) -> Self {
        Self {
            target: Mutex::new(target),
        }
    }

    /// Appends one test's raw manifest, preceded by a comment naming the test.
    pub fn write_render(&self, test: &str, manifest: &str) {
        let mut target = self.target.lock().unwrap_or_else(|e| e.into_inner());
        let written = writeln!(target, "# chartcheck test: {test}")
            .and_then(|_| writeln!(target, "{}", manifest.trim_end()))
            .and_then(|_| target.flush());
        if let Err(err) = written {
            warn!(test, error = %err, "failed to write debug output");
        }
    }
}
