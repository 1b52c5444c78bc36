// Term vocabulary: categories, seed expansion and keyword suggestions.

pub mod category;
pub mod download;
pub mod embeddings;
pub mod expander;
pub mod suggest;
pub mod traits;
pub mod wikipedia;
