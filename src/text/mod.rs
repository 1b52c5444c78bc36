// Text processing: normalization, term matching and disparity markers.

pub mod categorize;
pub mod disparity;
pub mod normalize;

pub use categorize::{categorize, Categorizer};
pub use normalize::Normalizer;
