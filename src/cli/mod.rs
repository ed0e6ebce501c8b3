/// CLI Indexes: Models
pub mod models;

/// CLI Indexes: Tasks
pub mod tasks;

pub use tasks::Task;
