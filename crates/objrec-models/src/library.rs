//! Object models and the sources that load them.
//!
//! A [`ModelSource`] yields the library as an ordered `Vec<ObjectModel>`;
//! the position of a model in that list fixes its
//! [`ModelId`][objrec_types::ModelId] (index + 1) for the lifetime of the
//! process.
//!
//! [`JsonModelFile`] reads a library stored as
//!
//! ```json
//! { "models": [ { "name": "mug", "points": [ {"x":0.0,"y":0.0,"z":0.0} ] } ] }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use objrec_types::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while loading the model library.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model library at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model library: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Model library contains no models")]
    EmptyLibrary,
    #[error("Model '{0}' has an empty reference cloud")]
    EmptyReference(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// ObjectModel
// ─────────────────────────────────────────────────────────────────────────────

/// A known object: a name plus its reference geometry in the model frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    pub name: String,
    #[serde(rename = "points")]
    pub reference_cloud: Vec<Vec3>,
}

impl ObjectModel {
    pub fn new(name: impl Into<String>, reference_cloud: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            reference_cloud,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can produce the ordered model library.
pub trait ModelSource {
    /// Load every model, in library order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyLibrary`] when no model is available, or an
    /// I/O / parse error from the backing store.
    fn load(&self) -> Result<Vec<ObjectModel>, ModelError>;
}

#[derive(Deserialize)]
struct LibraryFile {
    models: Vec<ObjectModel>,
}

/// A model library stored in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonModelFile {
    path: PathBuf,
}

impl JsonModelFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ModelSource for JsonModelFile {
    fn load(&self) -> Result<Vec<ObjectModel>, ModelError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| ModelError::Io {
            path: self.path.clone(),
            source,
        })?;
        let library: LibraryFile = serde_json::from_str(&raw)?;
        if library.models.is_empty() {
            return Err(ModelError::EmptyLibrary);
        }
        if let Some(bad) = library.models.iter().find(|m| m.reference_cloud.is_empty()) {
            return Err(ModelError::EmptyReference(bad.name.clone()));
        }
        info!(
            path = %self.path.display(),
            models = library.models.len(),
            "model library loaded"
        );
        Ok(library.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("models.json");
        fs::write(&path, body).expect("write library");
        path
    }

    #[test]
    fn json_file_loads_models_in_order() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            r#"{"models":[
                {"name":"mug","points":[{"x":0.0,"y":0.0,"z":0.0}]},
                {"name":"can","points":[{"x":1.0,"y":0.0,"z":0.0},{"x":0.0,"y":1.0,"z":0.0}]}
            ]}"#,
        );
        let models = JsonModelFile::new(&path).load().expect("load");
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "mug");
        assert_eq!(models[1].reference_cloud.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = JsonModelFile::new(dir.path().join("absent.json"))
            .load()
            .unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "{ not json");
        assert!(matches!(
            JsonModelFile::new(&path).load(),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn empty_library_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, r#"{"models":[]}"#);
        assert!(matches!(
            JsonModelFile::new(&path).load(),
            Err(ModelError::EmptyLibrary)
        ));
    }

    #[test]
    fn model_without_points_rejected() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, r#"{"models":[{"name":"ghost","points":[]}]}"#);
        let err = JsonModelFile::new(&path).load().unwrap_err();
        assert!(matches!(err, ModelError::EmptyReference(ref n) if n == "ghost"));
    }
}
