// On-disk artifacts passed between pipeline stages.
//
// Each stage reads its upstream artifact wholesale and writes its own once,
// atomically (temp file + rename), so a crashed stage never leaves a
// half-written file for the next one. Reads validate record by record:
// a malformed element is logged and skipped, a missing file is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cooccurrence::ModelingOutput;
use crate::error::{PipelineError, Result};
use crate::models::{CategorizedDocument, Document};
use crate::terms::category::ExpandedTermSet;

pub const EXPANDED_TERMS: &str = "expanded_terms.json";
pub const RAW_DOCUMENTS: &str = "raw_documents.json";
pub const PREPROCESSED_ARTICLES: &str = "preprocessed_articles.json";
pub const MODELING_OUTPUT: &str = "modeling_output.json";

/// Every artifact, in pipeline order.
pub const ALL_ARTIFACTS: [&str; 4] = [
    EXPANDED_TERMS,
    RAW_DOCUMENTS,
    PREPROCESSED_ARTICLES,
    MODELING_OUTPUT,
];

/// A validated artifact and how many records were dropped on the way in.
#[derive(Debug)]
pub struct Loaded<T> {
    pub value: T,
    pub skipped: usize,
}

/// Inventory line for `status`.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub name: &'static str,
    pub path: PathBuf,
    pub bytes: Option<u64>,
    pub records: Option<usize>,
    pub modified: Option<DateTime<Local>>,
}

impl ArtifactInfo {
    pub fn exists(&self) -> bool {
        self.bytes.is_some()
    }
}

/// The artifact directory for one pipeline.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Serialize `value` and atomically replace `name`.
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));

        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }

    /// Parse `name` as untyped JSON.
    fn read_value(&self, name: &str) -> Result<(PathBuf, Value)> {
        let path = self.path(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::MissingArtifact { path });
            }
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_str(&text).map_err(|e| PipelineError::MalformedInput {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok((path, value))
    }

    pub fn read_expanded_terms(&self) -> Result<Loaded<ExpandedTermSet>> {
        let (path, value) = self.read_value(EXPANDED_TERMS)?;
        let (value, skipped) = ExpandedTermSet::from_json_value(value)
            .map_err(|message| PipelineError::MalformedInput { path, message })?;
        Ok(Loaded { value, skipped })
    }

    pub fn write_expanded_terms(&self, terms: &ExpandedTermSet) -> Result<PathBuf> {
        self.write_json(EXPANDED_TERMS, terms)
    }

    pub fn read_documents(&self) -> Result<Loaded<Vec<Document>>> {
        let (path, value) = self.read_value(RAW_DOCUMENTS)?;
        let (value, skipped) = read_records(&path, value)?;
        Ok(Loaded { value, skipped })
    }

    pub fn write_documents(&self, documents: &[Document]) -> Result<PathBuf> {
        self.write_json(RAW_DOCUMENTS, documents)
    }

    /// Categorized corpus. Records missing a category key get it back empty.
    pub fn read_categorized(&self) -> Result<Loaded<Vec<CategorizedDocument>>> {
        let (path, value) = self.read_value(PREPROCESSED_ARTICLES)?;
        let (mut value, skipped): (Vec<CategorizedDocument>, usize) = read_records(&path, value)?;
        value.iter_mut().for_each(CategorizedDocument::fill_missing_categories);
        Ok(Loaded { value, skipped })
    }

    pub fn write_categorized(&self, corpus: &[CategorizedDocument]) -> Result<PathBuf> {
        self.write_json(PREPROCESSED_ARTICLES, corpus)
    }

    pub fn read_modeling_output(&self) -> Result<ModelingOutput> {
        let (path, value) = self.read_value(MODELING_OUTPUT)?;
        serde_json::from_value(value).map_err(|e| PipelineError::MalformedInput {
            path,
            message: e.to_string(),
        })
    }

    pub fn write_modeling_output(&self, output: &ModelingOutput) -> Result<PathBuf> {
        self.write_json(MODELING_OUTPUT, output)
    }

    /// Existence, size and record count of every artifact.
    pub fn inventory(&self) -> Vec<ArtifactInfo> {
        ALL_ARTIFACTS
            .iter()
            .map(|&name| {
                let path = self.path(name);
                let metadata = fs::metadata(&path).ok().filter(|m| m.is_file());
                let bytes = metadata.as_ref().map(|m| m.len());
                let modified = metadata
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Local>::from);
                let records = bytes
                    .and_then(|_| self.read_value(name).ok())
                    .map(|(_, value)| record_count(&value));
                ArtifactInfo {
                    name,
                    path,
                    bytes,
                    records,
                    modified,
                }
            })
            .collect()
    }
}

/// Deserialize a JSON array element by element, skipping bad records.
fn read_records<T: DeserializeOwned>(path: &Path, value: Value) -> Result<(Vec<T>, usize)> {
    let Value::Array(items) = value else {
        return Err(PipelineError::MalformedInput {
            path: path.to_path_buf(),
            message: "expected a JSON array of records".to_string(),
        });
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(path = %path.display(), index = index, error = %e, "Skipping malformed record");
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

/// Array length, pair count, or total listed terms, depending on shape.
fn record_count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => match map.get("pairs") {
            Some(Value::Array(pairs)) => pairs.len(),
            _ => map.values().filter_map(Value::as_array).map(Vec::len).sum(),
        },
        _ => 0,
    }
}
