//! Snapshot file helpers.
//!
//! A [`TempModelFile`] is a model snapshot inside its own temporary
//! directory, so tests can inspect exactly what a generation run left on
//! disk.

use slotbox_model::{DeclaredModel, MergeEngine, MergeReport, Model, ModelFile, ModelResult};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// File name used for snapshots in tests.
pub const SNAPSHOT_NAME: &str = "slotbox-model.json";

/// A snapshot file in a fresh temporary directory.
pub struct TempModelFile {
    file: ModelFile,
    /// Kept alive to prevent cleanup.
    dir: TempDir,
}

impl TempModelFile {
    /// Creates a directory with no snapshot in it yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let file = ModelFile::new(dir.path().join(SNAPSHOT_NAME));
        Self { file, dir }
    }

    /// The snapshot file.
    pub fn file(&self) -> &ModelFile {
        &self.file
    }

    /// The snapshot path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Runs one generation against the snapshot.
    pub fn generate(
        &self,
        engine: &MergeEngine,
        declared: &DeclaredModel,
    ) -> ModelResult<(Model, MergeReport)> {
        self.file.generate(engine, declared)
    }

    /// Raw snapshot bytes, or `None` if there is no snapshot yet.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.path()).ok()
    }

    /// Overwrites the snapshot with `contents`, bypassing validation.
    pub fn write_raw(&self, contents: &str) {
        fs::write(self.path(), contents).expect("Failed to write snapshot");
    }

    /// Names of every file in the directory, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .expect("Failed to list temp directory")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TempModelFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{iot_declared, merge_engine};

    #[test]
    fn starts_empty_then_holds_one_file() {
        let snapshot = TempModelFile::new();
        assert!(snapshot.bytes().is_none());
        assert!(snapshot.entries().is_empty());

        snapshot.generate(&merge_engine(), &iot_declared()).unwrap();
        assert_eq!(snapshot.entries(), vec![SNAPSHOT_NAME.to_string()]);
        assert!(snapshot.bytes().is_some());
    }
}
