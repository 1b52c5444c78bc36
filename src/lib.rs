// Epitrace: biomedical term categorization and co-occurrence
//
// This is the library root. Each module corresponds to a stage or a
// shared concern of the expand -> fetch -> categorize -> cooccur pipeline.

pub mod artifacts;
pub mod config;
pub mod cooccurrence;
pub mod error;
pub mod fetch;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod terms;
pub mod text;
