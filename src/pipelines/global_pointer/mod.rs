/// Features for the global pointer
pub mod item;

/// Batcher for the global pointer
pub mod batcher;

/// Turning span logits into spans
pub mod decode;

/// Training and evaluation routine
pub mod training;

pub use batcher::Batcher;
pub use item::Feature;
