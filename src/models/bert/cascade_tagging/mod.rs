/// BIO tagger with an entity type classifier
pub mod model;

/// Training routine
pub mod train;

pub use model::{Model, ModelRecord};
