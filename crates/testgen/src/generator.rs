//! Zipf-skewed synthetic batch generator.
//!
//! Grounded on this pack's history generator (`rand` + `rand_distr` +
//! `rayon` + `typed-builder`, and the start/end-timestamped report wrapper
//! around the generated payload), retargeted from session/transaction
//! histories onto `nezha-core`'s `(txId, RWOp)` batches.
//!
//! # Coherence invariant
//!
//! Every generated read observes a value that some earlier-chosen write in
//! the same batch actually produced: an init transaction writes every
//! address once before any transaction reads it, and a per-address
//! "latest value" table is threaded through generation so reads always
//! sample from it rather than fabricating an unbacked value.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Local};
use nezha_core::model::{Batch, OpKind, Tx};
use rand::distr::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_distr::Zipf;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Parameters for one generated batch (mirrors the benchmark driver's
/// `a`/`t`/`s`/`b`/`c` flags: `b` -- block size -- is this `tx_count`, `c`
/// -- concurrency -- is the commit dispatcher's concern and lives in
/// `nezha-commit`, not here).
#[derive(Clone, Debug, Deserialize, Serialize, TypedBuilder)]
pub struct BatchParams {
    /// Number of distinct addresses (`a`).
    pub address_universe: u64,
    /// Number of transactions in the batch (`t`/`b`).
    pub tx_count: u64,
    /// Zipf skew exponent (`s`); `0.0` is uniform, higher concentrates
    /// access onto a few hot addresses.
    pub skew: f64,
    /// Number of read/write events per transaction.
    #[builder(default = 4)]
    pub ops_per_tx: u64,
    /// RNG seed, for deterministic regeneration across runs.
    #[builder(default = 0)]
    pub seed: u64,
}

/// A generated batch plus the parameters and wall-clock span that produced
/// it, mirroring this pack's timestamped history-report shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedBatch {
    pub params: BatchParams,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub batch: Batch,
}

impl GeneratedBatch {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Generate a single Zipf-skewed batch.
///
/// # Panics
///
/// Panics if `address_universe` is zero (there is no address to touch) or
/// if `skew` is not a finite exponent `rand_distr::Zipf` accepts.
#[must_use]
pub fn generate_batch(params: &BatchParams) -> Batch {
    assert!(params.address_universe > 0, "address_universe must be positive");

    let mut rng = rand::rngs::StdRng::seed_from_u64(params.seed);
    #[allow(clippy::cast_precision_loss)]
    let zipf = Zipf::new(params.address_universe as f64, params.skew)
        .expect("skew must be a valid zipf exponent");
    let coin = Uniform::new(0.0_f64, 1.0).expect("valid uniform range");

    let mut latest_value: HashMap<u64, u64> = (0..params.address_universe).map(|a| (a, 0)).collect();
    let mut next_value: u64 = 1;
    let mut txs = Vec::with_capacity(params.tx_count as usize + 1);

    // Init transaction: every address is written once so every later read
    // has a backing write to observe, maintaining the coherence invariant
    // above across per-address values.
    let init_ops: Vec<(OpKind, Vec<u8>, Vec<u8>)> = (0..params.address_universe)
        .map(|addr| (OpKind::Write, address_key(addr), value_bytes(0)))
        .collect();
    txs.push(Tx::new(0, init_ops));

    for tx_id in 1..=params.tx_count {
        let mut touched: HashSet<u64> = HashSet::new();
        let mut ops = Vec::with_capacity(params.ops_per_tx as usize);
        for _ in 0..params.ops_per_tx {
            #[allow(clippy::cast_possible_truncation)]
            let addr = zipf.sample(&mut rng) as u64 - 1;
            if !touched.insert(addr) {
                continue;
            }
            let want_write = coin.sample(&mut rng) < 0.5;
            if want_write {
                let value = next_value;
                next_value += 1;
                latest_value.insert(addr, value);
                ops.push((OpKind::Write, address_key(addr), value_bytes(value)));
            } else {
                let value = latest_value.get(&addr).copied().unwrap_or(0);
                ops.push((OpKind::Read, address_key(addr), value_bytes(value)));
            }
        }
        if ops.is_empty() {
            // Every sampled address collided with one already touched this
            // Tx; fall back to a single read so no transaction is empty
            // (Batch::new rejects empty transactions).
            let addr = rng.random_range(0..params.address_universe);
            let value = latest_value.get(&addr).copied().unwrap_or(0);
            ops.push((OpKind::Read, address_key(addr), value_bytes(value)));
        }
        txs.push(Tx::new(tx_id, ops));
    }

    Batch::new(txs).expect("generator only emits non-empty, duplicate-free transactions")
}

/// Generate `count` independent batches in parallel, one `seed` offset per
/// batch so the set as a whole stays reproducible.
#[must_use]
pub fn generate_batches(count: u64, params: &BatchParams) -> Vec<GeneratedBatch> {
    (0..count)
        .into_par_iter()
        .map(|i| {
            let mut this_params = params.clone();
            this_params.seed = params.seed.wrapping_add(i);
            let start = Local::now();
            let batch = generate_batch(&this_params);
            let end = Local::now();
            GeneratedBatch {
                params: this_params,
                start,
                end,
                batch,
            }
        })
        .collect()
}

fn address_key(addr: u64) -> Vec<u8> {
    addr.to_be_bytes().to_vec()
}

fn value_bytes(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BatchParams {
        BatchParams::builder()
            .address_universe(64)
            .tx_count(50)
            .skew(0.6)
            .ops_per_tx(4)
            .seed(7)
            .build()
    }

    #[test]
    fn generated_batch_has_init_plus_requested_tx_count() {
        let batch = generate_batch(&params());
        assert_eq!(batch.len() as u64, params().tx_count + 1);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = generate_batch(&params());
        let b = generate_batch(&params());
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let mut p1 = params();
        let mut p2 = params();
        p1.seed = 1;
        p2.seed = 2;
        assert_ne!(generate_batch(&p1), generate_batch(&p2));
    }

    #[test]
    #[should_panic(expected = "address_universe must be positive")]
    fn zero_address_universe_panics() {
        let mut p = params();
        p.address_universe = 0;
        generate_batch(&p);
    }
}
