/// Whole word masking
pub mod item;

/// Batcher for masked language modeling
pub mod batcher;

/// Training and evaluation routine
pub mod training;

pub use batcher::Batcher;
pub use item::{Feature, Masking};
