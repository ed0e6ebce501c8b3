/// BERT for Text Classification
pub mod model;

/// Training routine
pub mod train;

pub use model::{Model, ModelRecord};
