//! # CLUE Transformers
//!
//! Fine-tune pre-trained Chinese BERT checkpoints with Burn: TNEWS classification, CLUENER entity
//! recognition (span, global pointer and cascade heads), relation extraction, SimCSE sentence
//! embeddings and whole word masked language modeling.
#![forbid(unsafe_code)]

/// Task heads on top of BERT
pub mod models;

/// Features, batching, training and inference for every task
pub mod pipelines;

/// Input file formats
pub mod datasets;

/// Task metrics
pub mod metrics;

/// Utilities
pub mod utils;

/// CLI indexes and utilities
pub mod cli;

/// Error macros
#[macro_use]
extern crate anyhow;
