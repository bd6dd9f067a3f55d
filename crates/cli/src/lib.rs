//! `nezha` CLI -- generate synthetic batches and run them through the
//! analysis and commit phases end to end. This is the process CLI of the
//! enclosing benchmark driver, not the core.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use nezha_core::engine::Engine as CoreEngine;

#[derive(Debug, Parser)]
#[command(name = "nezha", about = "Deterministic concurrency control benchmark driver")]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a Zipf-skewed synthetic batch and write it to a JSON file
    Generate(GenerateArgs),
    /// Generate-or-load a batch, analyze it, commit the survivors, and
    /// print `Plan.stats` as JSON
    Run(RunArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Address universe size
    #[arg(short = 'a', long = "address-universe")]
    pub address_universe: u64,
    /// Transaction count / block size
    #[arg(short = 't', long = "tx-count")]
    pub tx_count: u64,
    /// Zipf skew exponent
    #[arg(short = 's', long = "skew", default_value_t = 0.6)]
    pub skew: f64,
    /// Read/write events per transaction
    #[arg(long = "ops-per-tx", default_value_t = 4)]
    pub ops_per_tx: u64,
    /// RNG seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Output path for the generated batch JSON file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Load a previously generated batch from this path instead of
    /// generating a new one
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Address universe size, when generating inline
    #[arg(short = 'a', long = "address-universe", default_value_t = 10_000)]
    pub address_universe: u64,
    /// Transaction count / block size, when generating inline
    #[arg(short = 't', long = "tx-count", default_value_t = 200)]
    pub tx_count: u64,
    /// Zipf skew exponent, when generating inline
    #[arg(short = 's', long = "skew", default_value_t = 0.6)]
    pub skew: f64,
    /// Commit dispatcher worker-pool capacity; defaults to the number of
    /// CPU cores
    #[arg(short = 'c', long = "concurrency")]
    pub concurrency: Option<usize>,
    /// RNG seed, when generating inline
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Which engine to analyze with
    #[arg(long, value_enum, default_value_t = EngineArg::ConflictGraph)]
    pub engine: EngineArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EngineArg {
    /// Conflict-Graph engine: cycle-breaking plus topological sort
    ConflictGraph,
    /// Conflict-Queue engine (ACG / DeSS)
    ConflictQueue,
}

impl From<EngineArg> for CoreEngine {
    fn from(engine: EngineArg) -> Self {
        match engine {
            EngineArg::ConflictGraph => Self::ConflictGraph,
            EngineArg::ConflictQueue => Self::ConflictQueue,
        }
    }
}
