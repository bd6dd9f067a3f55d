//! `analyze()`: the engine-selecting entry point that ties the
//! Conflict-Graph pipeline and the Conflict-Queue pipeline together into
//! one [`Plan`].

use hashbrown::HashSet;

use crate::breaker::break_cycles;
use crate::builder::light_builder;
use crate::cycles::enumerate_cycles;
use crate::engine::Engine;
use crate::error::Error;
use crate::graph::AdjGraph;
use crate::model::{Batch, Key, Seq, TxId, TxIndex};
use crate::queue;
use crate::scc::tarjan_scc;
use crate::toposort::kahn_advanced;

/// A single `(key, value)` write, ready for [`crate::plan::Plan::commit`]
/// dispatch.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub key: Key,
    pub value: Vec<u8>,
}

/// Counters describing how an [`analyze`] run arrived at its [`Plan`].
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub aborted_count: usize,
    /// Conflict-graph edge count. Always `0` for [`Engine::ConflictQueue`],
    /// which never materializes a graph.
    pub edge_count: usize,
    /// Non-trivial SCC count. Always `0` for [`Engine::ConflictQueue`].
    pub scc_count: usize,
    /// Elementary cycle count. Always `0` for [`Engine::ConflictQueue`].
    pub cycle_count: usize,
}

/// The output of [`analyze`]: which transactions to abort, and a total
/// commit order over the survivors, bucketed by sequence number so that
/// [`crate::commit`]-style dispatchers (out of this crate; see
/// `nezha-commit`) can apply each bucket in parallel.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// `seq -> write-sets`, ascending `seq`. Writes within one entry are
    /// safe to apply in parallel: they come from distinct, write-disjoint
    /// surviving transactions.
    pub commit: Vec<(Seq, Vec<WriteOp>)>,
    pub aborted: HashSet<TxId>,
    pub stats: Stats,
}

/// Run the selected engine over `batch` and produce a [`Plan`].
///
/// # Errors
///
/// Propagates [`Error::AllocationFailure`] should an internal allocation
/// fail; neither engine otherwise fails on a validated [`Batch`] (conflict
/// aborts are reported via [`Plan::aborted`], not returned as an error).
pub fn analyze(batch: &Batch, engine: Engine) -> Result<Plan, Error> {
    tracing::debug!(txs = batch.len(), %engine, "analyzing batch");
    match engine {
        Engine::ConflictGraph => analyze_cg(batch),
        Engine::ConflictQueue => analyze_acg(batch),
    }
}

/// Builds the conflict graph (light builder), finds non-trivial SCCs,
/// enumerates and breaks cycles within each, then topologically sorts the
/// survivors into a [`Plan`].
///
/// Each surviving transaction lands in its own singleton commit bucket, in
/// topological order: the sorter only guarantees an order consistent with
/// the conflict edges, not which survivors are write-disjoint, so grouping
/// beyond "one transaction per bucket" would require re-deriving write
/// disjointness from scratch. `nezha-commit` still parallelizes *across*
/// buckets being prepared, but applies one bucket (one transaction) at a
/// time per seq.
fn analyze_cg(batch: &Batch) -> Result<Plan, Error> {
    let n = batch.len();
    let adj = light_builder(batch);
    let edge_count = adj.iter().map(Vec::len).sum();
    let mut graph = AdjGraph::new(adj);

    let mut aborted = vec![false; n];
    let mut scc_count = 0usize;
    let mut cycle_count = 0usize;

    let active = vec![true; n];
    for scc in tarjan_scc(&graph, &active) {
        if !scc.is_cyclic(&graph) {
            continue;
        }
        scc_count += 1;
        let (cycles, _counts) = enumerate_cycles(&graph, &scc);
        cycle_count += cycles.len();
        for victim in break_cycles(&cycles) {
            aborted[victim as usize] = true;
        }
    }

    tracing::debug!(
        edge_count,
        scc_count,
        cycle_count,
        aborted = aborted.iter().filter(|a| **a).count(),
        "conflict-graph cycle breaking complete"
    );

    graph.rebuild(&aborted);
    let order = kahn_advanced(&graph, &aborted);

    let commit = order
        .into_iter()
        .enumerate()
        .map(|(i, tx_idx)| {
            #[allow(clippy::cast_possible_truncation)]
            let seq = queue::INITIAL_SEQ + i as Seq;
            let tx = batch.get(tx_idx).expect("order only contains valid indices");
            let writes = tx
                .ops
                .iter()
                .filter(|op| op.is_write())
                .map(|op| WriteOp {
                    key: op.key.clone(),
                    value: op.value.clone(),
                })
                .collect();
            (seq, writes)
        })
        .collect();

    let aborted_ids = tx_ids(batch, &aborted);
    Ok(Plan {
        commit,
        stats: Stats {
            aborted_count: aborted_ids.len(),
            edge_count,
            scc_count,
            cycle_count,
        },
        aborted: aborted_ids,
    })
}

/// Runs the per-key queue engine directly into a [`Plan`]. Never builds a
/// conflict graph, so `Stats::edge_count`/`scc_count`/`cycle_count` stay
/// `0`.
fn analyze_acg(batch: &Batch) -> Result<Plan, Error> {
    let mut working = batch.clone();
    let result = queue::run(&mut working);
    tracing::debug!(
        aborted = result.aborted.iter().filter(|a| **a).count(),
        buckets = result.commit.len(),
        "conflict-queue engine complete"
    );

    let commit = result
        .commit
        .into_iter()
        .map(|(seq, writes)| {
            (
                seq,
                writes
                    .into_iter()
                    .map(|(_tx, key, value)| WriteOp { key, value })
                    .collect(),
            )
        })
        .collect();

    let aborted_ids = tx_ids(batch, &result.aborted);
    Ok(Plan {
        commit,
        stats: Stats {
            aborted_count: aborted_ids.len(),
            edge_count: 0,
            scc_count: 0,
            cycle_count: 0,
        },
        aborted: aborted_ids,
    })
}

fn tx_ids(batch: &Batch, aborted: &[bool]) -> HashSet<TxId> {
    #[allow(clippy::cast_possible_truncation)]
    (0..batch.len() as TxIndex)
        .filter(|&i| aborted[i as usize])
        .map(|i| batch.get(i).expect("index in range").id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OpKind, Tx};

    fn batch_of(txs: Vec<Tx>) -> Batch {
        Batch::new(txs).unwrap()
    }

    #[test]
    fn empty_batch_yields_empty_plan() {
        let batch = batch_of(vec![]);
        for engine in [Engine::ConflictGraph, Engine::ConflictQueue] {
            let plan = analyze(&batch, engine).unwrap();
            assert!(plan.commit.is_empty());
            assert!(plan.aborted.is_empty());
        }
    }

    #[test]
    fn single_tx_commits_at_initial_seq() {
        let batch = batch_of(vec![Tx::new(
            7,
            vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())],
        )]);
        for engine in [Engine::ConflictGraph, Engine::ConflictQueue] {
            let plan = analyze(&batch, engine).unwrap();
            assert!(plan.aborted.is_empty());
            assert_eq!(plan.commit.len(), 1);
            assert_eq!(plan.commit[0].0, queue::INITIAL_SEQ);
        }
    }

    #[test]
    fn disjoint_txs_all_survive() {
        let batch = batch_of(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(1, vec![(OpKind::Write, b"y".to_vec(), b"1".to_vec())]),
            Tx::new(2, vec![(OpKind::Write, b"z".to_vec(), b"1".to_vec())]),
        ]);
        for engine in [Engine::ConflictGraph, Engine::ConflictQueue] {
            let plan = analyze(&batch, engine).unwrap();
            assert!(plan.aborted.is_empty());
            let total_writes: usize = plan.commit.iter().map(|(_, ws)| ws.len()).sum();
            assert_eq!(total_writes, 3);
        }
    }

    #[test]
    fn scenario_1_chain_commits_in_order_cg() {
        let batch = batch_of(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(
                1,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"1".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"2".to_vec()),
                ],
            ),
            Tx::new(
                2,
                vec![
                    (OpKind::Read, b"y".to_vec(), b"2".to_vec()),
                    (OpKind::Write, b"z".to_vec(), b"3".to_vec()),
                ],
            ),
        ]);
        let plan = analyze(&batch, Engine::ConflictGraph).unwrap();
        assert!(plan.aborted.is_empty());
        let committed_keys: Vec<&str> = plan
            .commit
            .iter()
            .flat_map(|(_, ws)| ws.iter().map(|w| std::str::from_utf8(&w.key.0).unwrap()))
            .collect();
        assert_eq!(committed_keys, vec!["x", "y", "z"]);
    }

    #[test]
    fn scenario_3_rw_cycle_aborts_lowest_index() {
        let batch = batch_of(vec![
            Tx::new(
                0,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"0".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"1".to_vec()),
                ],
            ),
            Tx::new(
                1,
                vec![
                    (OpKind::Read, b"y".to_vec(), b"0".to_vec()),
                    (OpKind::Write, b"x".to_vec(), b"1".to_vec()),
                ],
            ),
        ]);
        let plan = analyze(&batch, Engine::ConflictGraph).unwrap();
        assert_eq!(plan.aborted.len(), 1);
        assert!(plan.aborted.contains(&0));
        assert_eq!(plan.stats.scc_count, 1);
        assert_eq!(plan.stats.cycle_count, 1);
    }

    #[test]
    fn p7_analyze_is_deterministic() {
        let batch = batch_of(vec![
            Tx::new(
                0,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"0".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"1".to_vec()),
                ],
            ),
            Tx::new(
                1,
                vec![
                    (OpKind::Read, b"y".to_vec(), b"0".to_vec()),
                    (OpKind::Write, b"x".to_vec(), b"1".to_vec()),
                ],
            ),
            Tx::new(2, vec![(OpKind::Write, b"z".to_vec(), b"9".to_vec())]),
        ]);
        for engine in [Engine::ConflictGraph, Engine::ConflictQueue] {
            let first = analyze(&batch, engine).unwrap();
            let second = analyze(&batch, engine).unwrap();
            assert_eq!(first.aborted, second.aborted);
            assert_eq!(first.commit, second.commit);
            assert_eq!(first.stats, second.stats);
        }
    }

    #[test]
    fn p3_survivor_writes_share_one_bucket_acg() {
        // Tx0: R(x); Tx2: R(x)->W(y) depends on whichever writer of x lands
        // first; every surviving Tx's writes must all land in one bucket.
        let batch = batch_of(vec![
            Tx::new(0, vec![(OpKind::Read, b"x".to_vec(), b"0".to_vec())]),
            Tx::new(1, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(
                2,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"1".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"2".to_vec()),
                    (OpKind::Write, b"w".to_vec(), b"3".to_vec()),
                ],
            ),
        ]);
        let plan = analyze(&batch, Engine::ConflictQueue).unwrap();
        for (_, writes) in &plan.commit {
            let keys: HashSet<&[u8]> = writes.iter().map(|w| w.key.0.as_slice()).collect();
            assert_eq!(keys.len(), writes.len(), "bucket must be write-disjoint");
        }
    }
}
