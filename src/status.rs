// System status display: artifact inventory and model presence.

use std::path::Path;

use colored::Colorize;

use crate::artifacts::ArtifactStore;
use crate::terms::download::{embedding_model_dir, missing_files};

/// Display pipeline status to the terminal.
pub fn show(store: &ArtifactStore, model_dir: &Path) {
    println!("Data directory: {}", store.dir().display());

    let mut next_step: Option<&str> = None;
    for info in store.inventory() {
        match (info.bytes, info.records) {
            (Some(bytes), Some(records)) => {
                let written = info
                    .modified
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "  {} {:<28} {:>10}  {:>7} records  {}",
                    "+".green(),
                    info.name,
                    format_bytes(bytes),
                    records,
                    written.dimmed()
                );
            }
            (Some(bytes), None) => {
                println!(
                    "  {} {:<28} {:>10}  {}",
                    "!".yellow(),
                    info.name,
                    format_bytes(bytes),
                    "unreadable".yellow()
                );
            }
            (None, _) => {
                println!("  {} {:<28} {}", "-".dimmed(), info.name, "not yet produced".dimmed());
                next_step.get_or_insert(stage_for(info.name));
            }
        }
    }

    let missing = missing_files(model_dir);
    if missing.is_empty() {
        println!(
            "Embedding model: present ({})",
            embedding_model_dir(model_dir).display()
        );
    } else {
        println!(
            "Embedding model: missing {} (expansion runs unranked)",
            missing.join(", ")
        );
        println!("  Run `epitrace download-model` to fetch it");
    }

    if let Some(command) = next_step {
        println!("\nNext step: run `epitrace {command}`");
    }
}

fn stage_for(artifact: &str) -> &'static str {
    match artifact {
        crate::artifacts::EXPANDED_TERMS => "expand",
        crate::artifacts::RAW_DOCUMENTS => "fetch",
        crate::artifacts::PREPROCESSED_ARTICLES => "categorize",
        _ => "cooccur",
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
