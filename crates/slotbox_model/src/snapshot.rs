//! The snapshot file and generation runs.

use crate::declared::DeclaredModel;
use crate::error::ModelResult;
use crate::merge::{MergeEngine, MergeReport};
use crate::model::Model;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A model snapshot file on disk.
#[derive(Debug, Clone)]
pub struct ModelFile {
    path: PathBuf,
}

impl ModelFile {
    /// Refers to the snapshot at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and validates the snapshot. A missing file yields an empty model.
    pub fn load(&self) -> ModelResult<Model> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No model snapshot at {:?}, starting empty", self.path);
                return Ok(Model::new());
            }
            Err(e) => return Err(e.into()),
        };
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Validates `model` and atomically replaces the snapshot with it.
    ///
    /// The JSON is written to a temporary file in the same directory and
    /// renamed over the target, so readers see either the old or the new
    /// snapshot.
    pub fn store(&self, model: &Model) -> ModelResult<()> {
        model.validate()?;
        let mut json = serde_json::to_string_pretty(model)?;
        json.push('\n');

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        info!("Wrote model snapshot to {:?}", self.path);
        Ok(())
    }

    /// Runs one generation: load, merge `declared`, store.
    ///
    /// On any error the file on disk is left untouched.
    pub fn generate(&self, engine: &MergeEngine, declared: &DeclaredModel) -> ModelResult<(Model, MergeReport)> {
        let previous = self.load()?;
        let outcome = engine.merge(&previous, declared)?;
        self.store(&outcome.model)?;
        Ok((outcome.model, outcome.report))
    }
}
