// Pipeline stages: expand -> fetch -> categorize -> cooccur.
//
// Each stage reads its upstream artifact from the store, does its work in
// memory and writes its own artifact exactly once at the end. Stages never
// start before the previous one has returned, so an artifact on disk is
// always complete.

pub mod categorize;
pub mod cooccur;
pub mod expand;
pub mod fetch;
pub mod suggest;

use std::path::PathBuf;

use serde::Serialize;

/// Per-stage tallies printed at completion.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: &'static str,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Artifact written by the stage, if any
    pub output: Option<PathBuf>,
    /// Set when the stage reused an earlier artifact instead of recomputing
    pub cached: bool,
}

impl StageSummary {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            processed: 0,
            skipped: 0,
            failed: 0,
            output: None,
            cached: false,
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}
