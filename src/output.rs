/// Persistence of the generated JSON documents.
///
/// Documents are addressed by a logical path relative to the output root
/// (`ports.json`, `tides/2024/vigo/05.json`, ...). The `Sink` trait keeps
/// the pipelines independent of where those bytes end up.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::model::TideError;

pub const PORTS_PATH: &str = "ports.json";
pub const COEFFICIENTS_PATH: &str = "coefficients.json";

/// Logical path of a port-month document.
pub fn tides_path(year: i32, port_code: &str, month: u32) -> String {
    format!("tides/{}/{}/{:02}.json", year, port_code, month)
}

/// Persist a JSON document at a logical path.
pub trait Sink {
    fn persist(&self, document: &serde_json::Value, logical_path: &str) -> Result<(), TideError>;
}

/// Serializes `document` and hands it to `sink`.
pub fn persist_json<T: Serialize>(
    sink: &dyn Sink,
    document: &T,
    logical_path: &str,
) -> Result<(), TideError> {
    let value = serde_json::to_value(document)?;
    sink.persist(&value, logical_path)
}

/// Writes documents as files below a root directory, creating parent
/// directories as needed.
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSink { root: root.into() }
    }

    fn resolve(&self, logical_path: &str) -> Result<PathBuf, TideError> {
        let relative = Path::new(logical_path);
        if relative.is_absolute()
            || relative.components().any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(TideError::Io(format!(
                "refusing to write outside the output root: {}",
                logical_path
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl Sink for FsSink {
    fn persist(&self, document: &serde_json::Value, logical_path: &str) -> Result<(), TideError> {
        let path = self.resolve(logical_path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(document)?;
        std::fs::write(&path, bytes)
            .map_err(|e| TideError::Io(format!("{}: {}", path.display(), e)))
    }
}
