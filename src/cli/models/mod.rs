/// CLI Indexes: BERT models
pub mod bert;

/// CLI Indexes: Model index
pub mod index;

pub use index::{Model, ModelError};
