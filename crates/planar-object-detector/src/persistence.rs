//! Named reference models stored in a JSON archive.
//!
//! An archive is `{"version": 1, "records": {"<name>": <model>, ...}}`.
//! Writing a record rewrites the file, keeping every other record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{DetectError, PlanarDetectorParams, PlanarObjectDetector, PointClassifier};

/// Archive format written by this version.
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no record named {name:?} in {path}")]
    RecordNotFound { name: String, path: PathBuf },
    #[error("unsupported archive version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelArchive {
    version: u32,
    #[serde(default)]
    records: BTreeMap<String, serde_json::Value>,
}

impl Default for ModelArchive {
    fn default() -> Self {
        Self {
            version: ARCHIVE_VERSION,
            records: BTreeMap::new(),
        }
    }
}

fn read_archive(path: &Path) -> Result<ModelArchive, PersistenceError> {
    let raw = fs::read_to_string(path)?;
    let archive: ModelArchive = serde_json::from_str(&raw)?;
    if archive.version != ARCHIVE_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: archive.version,
            expected: ARCHIVE_VERSION,
        });
    }
    Ok(archive)
}

/// Store `record` under `name`, creating the archive if needed.
pub fn write_record<T: Serialize>(
    path: impl AsRef<Path>,
    name: &str,
    record: &T,
) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let mut archive = if path.exists() {
        read_archive(path)?
    } else {
        ModelArchive::default()
    };
    if archive
        .records
        .insert(name.to_owned(), serde_json::to_value(record)?)
        .is_some()
    {
        log::warn!("replacing record {name:?} in {}", path.display());
    }
    fs::write(path, serde_json::to_string(&archive)?)?;
    Ok(())
}

/// Read the record stored under `name`.
pub fn read_record<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    name: &str,
) -> Result<T, PersistenceError> {
    let path = path.as_ref();
    let mut archive = read_archive(path)?;
    let value = archive
        .records
        .remove(name)
        .ok_or_else(|| PersistenceError::RecordNotFound {
            name: name.to_owned(),
            path: path.to_path_buf(),
        })?;
    Ok(serde_json::from_value(value)?)
}

/// Names of all records in the archive, sorted.
pub fn record_names(path: impl AsRef<Path>) -> Result<Vec<String>, PersistenceError> {
    Ok(read_archive(path.as_ref())?.records.into_keys().collect())
}

impl<C: PointClassifier> PlanarObjectDetector<C> {
    /// Save the reference model as record `object_name` of the archive at `path`.
    pub fn record_detector(
        &self,
        object_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<(), DetectError> {
        let model = self.model.as_ref().ok_or(DetectError::ModelNotBuilt)?;
        write_record(path, object_name, model)?;
        log::info!("recorded reference model {object_name:?}");
        Ok(())
    }

    /// Replace the reference model with record `object_name` of `path`.
    ///
    /// On failure the current model is kept.
    pub fn load(&mut self, path: impl AsRef<Path>, object_name: &str) -> Result<(), DetectError> {
        let model = read_record(path, object_name)?;
        self.model = Some(model);
        self.last_result = None;
        log::info!("loaded reference model {object_name:?}");
        Ok(())
    }

    /// Create a detector whose reference model is read from `path`.
    pub fn from_file(
        path: impl AsRef<Path>,
        object_name: &str,
        classifier: C,
        params: PlanarDetectorParams,
    ) -> Result<Self, DetectError> {
        let mut detector = Self::new(classifier, params);
        detector.load(path, object_name)?;
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn records_are_added_and_replaced_independently() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("models.json");

        write_record(&path, "a", &json!({"v": 1})).expect("write a");
        write_record(&path, "b", &json!({"v": 2})).expect("write b");
        write_record(&path, "a", &json!({"v": 3})).expect("replace a");

        assert_eq!(record_names(&path).expect("names"), vec!["a", "b"]);
        let a: serde_json::Value = read_record(&path, "a").expect("read a");
        let b: serde_json::Value = read_record(&path, "b").expect("read b");
        assert_eq!(a, json!({"v": 3}));
        assert_eq!(b, json!({"v": 2}));
    }

    #[test]
    fn missing_record_and_file_are_reported() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("models.json");
        assert!(matches!(
            read_record::<serde_json::Value>(&path, "x"),
            Err(PersistenceError::Io(_))
        ));

        write_record(&path, "a", &1u32).expect("write");
        assert!(matches!(
            read_record::<u32>(&path, "x"),
            Err(PersistenceError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn foreign_versions_are_refused() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("models.json");
        fs::write(&path, r#"{"version": 7, "records": {}}"#).expect("write");
        assert!(matches!(
            read_record::<u32>(&path, "a"),
            Err(PersistenceError::UnsupportedVersion { found: 7, .. })
        ));
        // The file is left untouched when the version is unknown.
        assert!(write_record(&path, "a", &1u32).is_err());
    }

    #[test]
    fn garbage_is_a_json_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("models.json");
        fs::write(&path, "not json").expect("write");
        assert!(matches!(
            read_record::<u32>(&path, "a"),
            Err(PersistenceError::Json(_))
        ));
    }
}
