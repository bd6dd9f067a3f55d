//! Synthetic Zipf-skewed batch generation for exercising `nezha-core`
//! end-to-end without a real EVM simulator: a simulator is out of scope,
//! so this crate is a lightweight stand-in so the workspace is runnable
//! and testable.

pub mod generator;

pub use generator::{generate_batch, generate_batches, BatchParams, GeneratedBatch};
