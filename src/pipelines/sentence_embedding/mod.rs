/// Features for SimCSE
pub mod item;

/// Batcher that feeds every sentence twice
pub mod batcher;

/// Training and evaluation routine
pub mod training;

pub use batcher::Batcher;
pub use item::{Pair, Sentence};
