//! Schema validation of rendered manifests.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{ChartTestError, Result};
use crate::render::run_with_stdin;

/// Per-resource validation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Invalid,
    /// The validator could not process the resource.
    Error,
    /// No schema was available for the resource.
    Skipped,
}

impl ValidationStatus {
    /// Whether this status becomes a finding on the test.
    pub fn is_failure(&self) -> bool {
        matches!(self, ValidationStatus::Invalid | ValidationStatus::Error)
    }
}

/// Validation result for one resource in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceValidation {
    /// Identifies the resource, e.g. `Deployment/web (apps/v1)`.
    pub signature: String,
    pub status: ValidationStatus,
    pub message: String,
}

impl ResourceValidation {
    pub fn new(signature: impl Into<String>, status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            status,
            message: message.into(),
        }
    }
}

/// Validates every resource in a manifest.
///
/// `Err` means the validator itself could not run; findings about
/// individual resources are returned in the list.
pub trait Validator: Send + Sync {
    fn validate(&self, manifest: &str) -> Result<Vec<ResourceValidation>>;
}

/// Accepts everything. Used when validation is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _manifest: &str) -> Result<Vec<ResourceValidation>> {
        Ok(Vec::new())
    }
}

/// Validates with `kubeconform` in strict mode, skipping resources whose
/// schema is unknown.
#[derive(Debug, Clone)]
pub struct KubeconformValidator {
    program: PathBuf,
    args: Vec<String>,
}

impl KubeconformValidator {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            program: PathBuf::from("kubeconform"),
            args,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Whether the validator binary can be started at all.
    pub fn is_installed(&self) -> bool {
        Command::new(&self.program)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(["-strict", "-ignore-missing-schemas", "-output", "json"])
            .args(&self.args)
            .arg("-");
        command
    }
}

#[derive(Debug, Deserialize)]
struct KubeconformReport {
    #[serde(default)]
    resources: Vec<KubeconformResource>,
}

#[derive(Debug, Deserialize)]
struct KubeconformResource {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    status: String,
    #[serde(default)]
    msg: String,
}

impl KubeconformResource {
    fn signature(&self) -> String {
        let mut signature = format!("{}/{}", self.kind, self.name);
        if !self.version.is_empty() {
            signature.push_str(&format!(" ({})", self.version));
        }
        signature
    }

    fn status(&self) -> ValidationStatus {
        match self.status.as_str() {
            "statusInvalid" => ValidationStatus::Invalid,
            "statusError" => ValidationStatus::Error,
            "statusSkipped" => ValidationStatus::Skipped,
            _ => ValidationStatus::Valid,
        }
    }
}

/// Parses kubeconform's `-output json` report.
fn parse_report(stdout: &str) -> std::result::Result<Vec<ResourceValidation>, serde_json::Error> {
    let report: KubeconformReport = serde_json::from_str(stdout)?;
    Ok(report
        .resources
        .into_iter()
        .map(|resource| ResourceValidation::new(resource.signature(), resource.status(), resource.msg))
        .collect())
}

impl Validator for KubeconformValidator {
    fn validate(&self, manifest: &str) -> Result<Vec<ResourceValidation>> {
        debug!(program = %self.program.display(), "validating manifest");
        let output = run_with_stdin(self.command(), manifest).map_err(|err| ChartTestError::Validator {
            message: format!("{}: {err}", self.program.display()),
        })?;

        // A non-zero exit status only means some resource was invalid; the
        // report is authoritative as long as it parses.
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_report(&stdout).map_err(|err| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ChartTestError::Validator {
                message: if stderr.trim().is_empty() {
                    format!("unreadable report: {err}")
                } else {
                    stderr.trim().to_string()
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_installed() {
        let validator = KubeconformValidator::new(Vec::new()).with_program("/nonexistent/kubeconform");
        assert!(!validator.is_installed());
    }

    #[test]
    fn parses_findings() {
        let report = r#"{
          "resources": [
            {"filename": "stdin", "kind": "Deployment", "name": "web", "version": "apps/v1",
             "status": "statusInvalid", "msg": "spec.replicas: expected integer"},
            {"filename": "stdin", "kind": "Widget", "name": "w", "version": "",
             "status": "statusSkipped", "msg": ""}
          ]
        }"#;
        let results = parse_report(report).unwrap();
        assert_eq!(
            results,
            vec![
                ResourceValidation::new(
                    "Deployment/web (apps/v1)",
                    ValidationStatus::Invalid,
                    "spec.replicas: expected integer"
                ),
                ResourceValidation::new("Widget/w", ValidationStatus::Skipped, ""),
            ]
        );
        assert!(results[0].status.is_failure());
        assert!(!results[1].status.is_failure());
    }

    #[test]
    fn empty_report_has_no_findings() {
        assert!(parse_report("{}").unwrap().is_empty());
        assert!(parse_report(r#"{"resources": []}"#).unwrap().is_empty());
    }

    #[test]
    fn error_status_is_a_failure() {
        let results =
            parse_report(r#"{"resources": [{"kind": "A", "name": "b", "status": "statusError", "msg": "boom"}]}"#)
                .unwrap();
        assert_eq!(results[0].status, ValidationStatus::Error);
        assert!(results[0].status.is_failure());
    }

    #[test]
    fn command_line_puts_extra_args_before_stdin() {
        let validator = KubeconformValidator::new(vec!["-kubernetes-version".into(), "1.29.0".into()]);
        let args: Vec<_> = validator
            .command()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            ["-strict", "-ignore-missing-schemas", "-output", "json", "-kubernetes-version", "1.29.0", "-"]
        );
    }

    #[test]
    fn missing_binary_is_a_validator_error() {
        let validator = KubeconformValidator::new(Vec::new()).with_program("/nonexistent/kubeconform");
        let err = validator.validate("a: 1").unwrap_err();
        assert!(matches!(err, ChartTestError::Validator { .. }));
    }

    #[test]
    fn noop_accepts_anything() {
        assert!(NoopValidator.validate("not: [yaml").unwrap().is_empty());
    }
}
