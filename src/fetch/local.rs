// Local plain-text ingestion.
//
// Lets the pipeline run over papers that were downloaded or converted by
// hand. Every `*.txt` file in the directory becomes one document keyed by
// its file name. A file that cannot be read as UTF-8 still becomes a
// document, with empty text, so the categorizer flags it instead of the
// file silently disappearing.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::FetchOutcome;
use crate::models::{Document, DocumentMetadata};

/// Read every `*.txt` file in `dir`, in file-name order.
pub fn load_directory(dir: &Path) -> Result<FetchOutcome> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read document directory {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        })
        .collect();
    paths.sort();

    let mut outcome = FetchOutcome::default();
    for path in paths {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().replace(['_', '-'], " "));

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Unreadable document, keeping it flagged");
                outcome.failed += 1;
                String::new()
            }
        };

        outcome.documents.push(Document {
            id,
            text,
            metadata: DocumentMetadata {
                title,
                source: Some("directory".to_string()),
                ..Default::default()
            },
        });
    }

    info!(
        dir = %dir.display(),
        documents = outcome.documents.len(),
        unreadable = outcome.failed,
        "Loaded local documents"
    );

    Ok(outcome)
}
