/// Features for span tagging
pub mod item;

/// Batcher for span tagging
pub mod batcher;

/// Turning start/end predictions into spans
pub mod decode;

/// Training and evaluation routine
pub mod training;

/// Inference routine
pub mod inference;

pub use batcher::Batcher;
pub use item::Feature;
