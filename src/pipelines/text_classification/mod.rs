/// Features for text classification
pub mod item;

/// Batcher for text classification
pub mod batcher;

/// Training and evaluation routine
pub mod training;

/// Inference routine
pub mod inference;

pub use batcher::Batcher;
pub use item::Feature;
