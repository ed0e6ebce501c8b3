/// Efficient global pointer head
pub mod model;

/// Training routine
pub mod train;

pub use model::{Model, ModelRecord};
