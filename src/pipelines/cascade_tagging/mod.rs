/// Features for cascaded tagging
pub mod item;

/// Batcher for cascaded tagging
pub mod batcher;

/// Turning BIO tags into spans
pub mod decode;

/// Training and evaluation routine
pub mod training;

pub use batcher::Batcher;
pub use item::Feature;

/// Outside any entity
pub const TAG_O: i64 = 0;

/// First token of an entity
pub const TAG_B: i64 = 1;

/// Continuation of an entity
pub const TAG_I: i64 = 2;
