// Term co-occurrence across the categorized corpus.

pub mod builder;
pub mod matrix;

pub use builder::{build, CooccurrenceOptions};
pub use matrix::{CategoryTotals, CooccurrenceMatrix, ModelingOutput, PairCount};
