//! Shared fixtures for integration tests: a scripted renderer and helpers
//! that lay out test directories on disk.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chartcheck::render::{RenderError, Rendered, Renderer};
use chartcheck::value::Value;

/// Renders whatever the values ask for.
///
/// * `manifest` (string): returned as the primary manifest.
/// * `hooks` (mapping of path to string): returned as hook manifests.
/// * `delay_ms` (number): sleep before answering.
/// * `fail` (string): fail with this message.
///
/// Tracks how many renders are running at once.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    pub in_flight: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Renderer for ScriptedRenderer {
    fn render(&self, values: &Value) -> Result<Rendered, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(Value::Number(ms)) = values.get("delay_ms") {
            thread::sleep(Duration::from_millis(ms.as_u64().unwrap_or(0)));
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(Value::String(message)) = values.get("fail") {
            return Err(RenderError::new(message.clone()));
        }

        let manifest = match values.get("manifest") {
            Some(Value::String(manifest)) => manifest.clone(),
            _ => String::new(),
        };
        let mut rendered = Rendered::new(manifest);
        if let Some(Value::Mapping(hooks)) = values.get("hooks") {
            for (path, hook) in hooks {
                if let Value::String(hook) = hook {
                    rendered = rendered.with_hook(path.clone(), hook.clone());
                }
            }
        }
        Ok(rendered)
    }
}

/// Builds a values file for [`ScriptedRenderer`].
pub fn scripted_values(manifest: &str, delay_ms: u64) -> String {
    let mut map = serde_yaml::Mapping::new();
    map.insert("manifest".into(), manifest.into());
    map.insert("delay_ms".into(), delay_ms.into());
    serde_yaml::to_string(&map).unwrap()
}

/// Builds a composite manifest from `(source, body)` pairs.
pub fn manifest(sections: &[(&str, &str)]) -> String {
    sections
        .iter()
        .map(|(source, body)| format!("---\n# Source: {source}\n{body}\n"))
        .collect()
}

/// Creates `root/name` with the given values and, optionally, expected file.
pub fn write_test(root: &Path, name: &str, values: &str, expected: Option<&str>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("values.yaml"), values).unwrap();
    if let Some(expected) = expected {
        fs::write(dir.join("expected.yaml"), expected).unwrap();
    }
}

pub fn read_expected(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join(name).join("expected.yaml")).unwrap()
}
