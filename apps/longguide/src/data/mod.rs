//! Dataset Loader: reads a dataset directory into standardized `Example`s and
//! splits it into demonstration, validation and evaluation slices.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Example;

pub mod standardize;

pub use standardize::DatasetFormat;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Dataset directory not found: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON array of records")]
    NotAnArray { path: PathBuf },

    #[error("Record {index} of {dataset} is missing field '{field}'")]
    MissingField {
        dataset: DatasetFormat,
        index: usize,
        field: &'static str,
    },

    #[error("Cannot infer dataset format from directory '{0}'; set `dataset_format` in the config")]
    UnknownFormat(String),

    #[error("No examples found in {0}")]
    Empty(PathBuf),
}

/// A fully loaded, standardized dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub format: DatasetFormat,
    pub examples: Vec<Example>,
}

impl Dataset {
    pub fn task_instruction(&self) -> &'static str {
        self.format.task_instruction()
    }
}

/// Loads every `*.json` file in `dir` (sorted by file name) and standardizes
/// the records. The format comes from `format`, or else the directory name.
pub fn load_dataset(dir: &Path, format: Option<DatasetFormat>) -> Result<Dataset, DataError> {
    if !dir.is_dir() {
        return Err(DataError::MissingDirectory(dir.to_path_buf()));
    }

    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let format = match format {
        Some(f) => f,
        None => DatasetFormat::from_name(&dir_name)
            .ok_or_else(|| DataError::UnknownFormat(dir_name.clone()))?,
    };

    let mut examples = Vec::new();
    for path in json_files(dir)? {
        let records = read_records(&path)?;
        for record in &records {
            let index = examples.len();
            let (input, output) = format.standardize(record, index)?;
            examples.push(Example::new(
                format!("{}-{index}", format.dir_name()),
                input,
                output,
            ));
        }
    }

    if examples.is_empty() {
        return Err(DataError::Empty(dir.to_path_buf()));
    }

    info!("Loaded {} examples from {}", examples.len(), dir.display());
    Ok(Dataset { format, examples })
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    let entries = std::fs::read_dir(dir).map_err(|source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_records(path: &Path) -> Result<Vec<Value>, DataError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Array(records) => Ok(records),
        _ => Err(DataError::NotAnArray {
            path: path.to_path_buf(),
        }),
    }
}

/// Standardizes every known dataset found under `data_dir`.
/// Returns `(format, example count)` for each dataset that loaded.
pub fn standardize_all(data_dir: &Path) -> Vec<(DatasetFormat, Result<usize, DataError>)> {
    DatasetFormat::ALL
        .into_iter()
        .filter_map(|format| {
            let dir = data_dir.join(format.dir_name());
            if !dir.is_dir() {
                warn!("Dataset directory not found: {}", dir.display());
                return None;
            }
            Some((format, load_dataset(&dir, Some(format)).map(|d| d.examples.len())))
        })
        .collect()
}

/// Three pairwise-disjoint slices of one dataset.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    /// Shown to the model when generating guidelines.
    pub demonstrations: Vec<Example>,
    /// Used only to score guideline candidates.
    pub validation: Vec<Example>,
    /// The final run.
    pub evaluation: Vec<Example>,
}

/// Seeded shuffle, then demonstrations, validation, and the rest for evaluation.
pub fn split_dataset(
    mut examples: Vec<Example>,
    demonstration_count: usize,
    validation_size: usize,
    max_eval_examples: Option<usize>,
    seed: u64,
) -> DatasetSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let demo_end = demonstration_count.min(examples.len());
    let mut rest = examples.split_off(demo_end);
    let demonstrations = examples;

    let validation_end = validation_size.min(rest.len());
    let mut evaluation = rest.split_off(validation_end);
    let validation = rest;

    if let Some(cap) = max_eval_examples {
        evaluation.truncate(cap);
    }

    if evaluation.is_empty() {
        warn!("Evaluation slice is empty; the dataset is smaller than demonstrations + validation");
    }

    DatasetSplit {
        demonstrations,
        validation,
        evaluation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| Example::new(format!("ex-{i}"), format!("src {i}"), format!("ref {i}")))
            .collect()
    }

    #[test]
    fn test_load_infers_format_from_directory_name() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("SWiPE");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "a.json", r#"[{"r_content": "hard one", "s_content": "easy one"}]"#);
        write(&dir, "b.json", r#"[{"r_content": "hard two", "s_content": "easy two"}]"#);
        write(&dir, "notes.txt", "ignored");

        let dataset = load_dataset(&dir, None).unwrap();
        assert_eq!(dataset.format, DatasetFormat::Swipe);
        assert_eq!(dataset.examples.len(), 2);
        assert_eq!(dataset.examples[0].source_text, "hard one");
        assert_eq!(dataset.examples[1].id, "SWiPE-1");
        assert_eq!(dataset.task_instruction(), "Simplify this text.");
    }

    #[test]
    fn test_explicit_format_overrides_directory_name() {
        let root = TempDir::new().unwrap();
        write(root.path(), "data.json", r#"[{"text": "doc", "target": "sum"}]"#);
        let dataset = load_dataset(root.path(), Some(DatasetFormat::XlSum)).unwrap();
        assert_eq!(dataset.examples[0].reference_text, "sum");
    }

    #[test]
    fn test_unknown_directory_name_is_an_error() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("mystery");
        std::fs::create_dir(&dir).unwrap();
        assert!(matches!(
            load_dataset(&dir, None),
            Err(DataError::UnknownFormat(name)) if name == "mystery"
        ));
    }

    #[test]
    fn test_missing_directory() {
        let root = TempDir::new().unwrap();
        let err = load_dataset(&root.path().join("SAMSum"), None).unwrap_err();
        assert!(matches!(err, DataError::MissingDirectory(_)));
    }

    #[test]
    fn test_non_array_file_rejected() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("CNN");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "x.json", r#"{"input": "a", "output": "b"}"#);
        assert!(matches!(
            load_dataset(&dir, None),
            Err(DataError::NotAnArray { .. })
        ));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("CNN");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "x.json", "[]");
        assert!(matches!(load_dataset(&dir, None), Err(DataError::Empty(_))));
    }

    #[test]
    fn test_split_slices_are_disjoint() {
        let split = split_dataset(examples(30), 5, 10, None, 7);
        assert_eq!(split.demonstrations.len(), 5);
        assert_eq!(split.validation.len(), 10);
        assert_eq!(split.evaluation.len(), 15);

        let mut seen = HashSet::new();
        for ex in split
            .demonstrations
            .iter()
            .chain(&split.validation)
            .chain(&split.evaluation)
        {
            assert!(seen.insert(ex.id.clone()), "{} appears twice", ex.id);
        }
    }

    #[test]
    fn test_split_is_reproducible_for_a_seed() {
        let a = split_dataset(examples(20), 3, 4, None, 42);
        let b = split_dataset(examples(20), 3, 4, None, 42);
        assert_eq!(a.validation, b.validation);
        assert_eq!(a.evaluation, b.evaluation);
    }

    #[test]
    fn test_split_caps_evaluation_and_handles_small_datasets() {
        let capped = split_dataset(examples(30), 5, 5, Some(4), 1);
        assert_eq!(capped.evaluation.len(), 4);

        let tiny = split_dataset(examples(3), 5, 5, None, 1);
        assert_eq!(tiny.demonstrations.len(), 3);
        assert!(tiny.validation.is_empty());
        assert!(tiny.evaluation.is_empty());
    }

    #[test]
    fn test_standardize_all_reports_each_present_dataset() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("CommonGen");
        std::fs::create_dir(&dir).unwrap();
        write(&dir, "x.json", r#"[{"concepts": ["a", "b"], "target": "ab"}]"#);

        let report = standardize_all(root.path());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].0, DatasetFormat::CommonGen);
        assert_eq!(*report[0].1.as_ref().unwrap(), 1);
    }
}
