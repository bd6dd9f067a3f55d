//! Deterministic concurrency control for speculatively-executed transaction batches.
//!
//! `nezha-core` takes a batch of transactions whose read/write footprints have
//! already been captured under optimistic execution and decides:
//!
//! 1. which transactions to abort, and
//! 2. a total commit order over the survivors,
//!
//! such that serial application of the survivors' writes, in that order, is
//! equivalent to some conflict-serializable schedule of the original batch.
//!
//! Two independent engines compute this:
//!
//! - [`engine::Engine::ConflictGraph`] builds an explicit conflict graph,
//!   finds strongly connected components ([`scc`]), enumerates elementary
//!   cycles within each ([`cycles`]), breaks cycles with a greedy vertex
//!   cover ([`breaker`]), and topologically sorts the survivors ([`toposort`]).
//! - [`engine::Engine::ConflictQueue`] never materializes a graph: it groups
//!   operations per key into queues and assigns every operation a global
//!   sequence number, aborting a transaction only when a previously bound
//!   read is contradicted ([`queue`]).
//!
//! Both engines produce a [`plan::Plan`]: a set of aborted transaction ids and
//! a map from sequence number to the write-sets that may commit, in parallel,
//! at that sequence.
//!
//! # Entry point
//!
//! [`plan::analyze`] is the main entry point. It takes a [`model::Batch`] and
//! an [`engine::Engine`] selector and returns a [`plan::Plan`] or an
//! [`error::Error`].
//!
//! ```
//! use nezha_core::engine::Engine;
//! use nezha_core::model::{Batch, OpKind, Tx};
//! use nezha_core::plan::analyze;
//!
//! let batch = Batch::new(vec![
//!     Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
//!     Tx::new(1, vec![
//!         (OpKind::Read, b"x".to_vec(), b"1".to_vec()),
//!         (OpKind::Write, b"y".to_vec(), b"2".to_vec()),
//!     ]),
//! ]).unwrap();
//!
//! let plan = analyze(&batch, Engine::ConflictGraph).unwrap();
//! assert!(plan.aborted.is_empty());
//! ```
//!
//! # Crate features
//!
//! - `serde` -- enables `Serialize`/`Deserialize` on the public data model
//!   ([`model::Key`], [`model::Batch`], [`plan::Plan`], ...).

pub mod account;
pub mod breaker;
pub mod builder;
pub mod cycles;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod plan;
pub mod queue;
pub mod scc;
pub mod toposort;

pub use engine::Engine;
pub use error::Error;
pub use plan::{analyze, Plan};
