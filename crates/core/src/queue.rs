//! Conflict-Queue engine, DeSS.
//!
//! Never materializes a conflict graph over transactions: every key gets its
//! own [`Queue`] of reader/writer transaction indices, queues are processed
//! in an order that respects same-transaction cross-key dependencies (a
//! secondary DAG over *queues*, sorted with [`crate::toposort::kahn_advanced`]),
//! and each queue assigns global sequence numbers by the eight-step
//! procedure in this module's doc comments below. A transaction is aborted
//! only when its required position contradicts an already-bound read; no
//! elementary-cycle search ever runs.

use hashbrown::{HashMap, HashSet};

use crate::graph::AdjGraph;
use crate::model::{Batch, Key, Seq, TxIndex, UNASSIGNED_SEQ};
use crate::toposort::kahn_advanced;

/// Sequence value reserved for the first queue processed; `0` stays
/// reserved for "unassigned".
pub const INITIAL_SEQ: Seq = 10;

/// Per-key queue: the transactions that read or write this key, in no
/// particular stored order (each list is normalized to ascending
/// [`TxIndex`] once at construction).
#[derive(Debug, Clone)]
pub struct Queue {
    pub key: Key,
    pub reads: Vec<TxIndex>,
    pub writes: Vec<TxIndex>,
    pub max_read: Seq,
    pub max_write: Seq,
}

/// The result of running the queue engine: which transactions were
/// aborted, and every surviving write grouped by its final sequence number.
#[derive(Debug, Clone, Default)]
pub struct DessResult {
    pub aborted: Vec<bool>,
    /// `seq -> [(tx, key, value)]`, ascending `seq`.
    pub commit: Vec<(Seq, Vec<(TxIndex, Key, Vec<u8>)>)>,
}

/// Run the full DeSS pipeline over `batch`, mutating every op's `seq` field
/// in place via propagation to every sibling op of a transaction once one
/// of them is assigned.
#[must_use]
pub fn run(batch: &mut Batch) -> DessResult {
    let n = batch.len();
    let mut queues = build_queues(batch);
    let order = queue_processing_order(batch, &queues);
    let mut aborted = vec![false; n];

    for &q_idx in &order {
        process_queue(batch, &mut queues[q_idx], &mut aborted);
    }

    DessResult {
        aborted: aborted.clone(),
        commit: commit_grouping(batch, &aborted),
    }
}

fn seq_of(batch: &Batch, tx: TxIndex) -> Seq {
    batch.get(tx).expect("tx in range").ops[0].seq
}

fn assign_sequence(batch: &mut Batch, tx: TxIndex, seq: Seq) {
    for op in batch.ops_mut(tx) {
        op.seq = seq;
    }
}

/// Group ops by key, reads and writes separately, with queues indexed in
/// ascending canonical key order for determinism.
fn build_queues(batch: &Batch) -> Vec<Queue> {
    let mut by_key: HashMap<Key, (Vec<TxIndex>, Vec<TxIndex>)> = HashMap::new();
    for tx in batch.iter() {
        for op in &tx.ops {
            let entry = by_key.entry(op.key.clone()).or_default();
            if op.is_read() {
                entry.0.push(op.tx);
            } else {
                entry.1.push(op.tx);
            }
        }
    }

    let mut keys: Vec<Key> = by_key.keys().cloned().collect();
    keys.sort_unstable_by(|a, b| a.to_canonical_hex().cmp(&b.to_canonical_hex()));

    keys.into_iter()
        .map(|key| {
            let (mut reads, mut writes) = by_key.remove(&key).expect("key present");
            reads.sort_unstable();
            reads.dedup();
            writes.sort_unstable();
            writes.dedup();
            Queue {
                key,
                reads,
                writes,
                max_read: UNASSIGNED_SEQ,
                max_write: UNASSIGNED_SEQ,
            }
        })
        .collect()
}

/// Secondary DAG over queues. For every write `w` in queue `q` whose
/// Tx also reads a different key `k'`, the Tx's read must already be bound
/// by the time `q` processes `w` (so `w` arrives at `q` pre-bound and takes
/// the `W_same`/`abort`/`W_other` path in step 4 rather than the
/// still-unassigned path in step 7). That requires `queue(k')` to run
/// before `q`, so the edge recorded here is `queue(k') -> q`: the *read's*
/// queue precedes the *write's* queue.
fn queue_processing_order(batch: &Batch, queues: &[Queue]) -> Vec<usize> {
    let queue_of: HashMap<&Key, usize> = queues
        .iter()
        .enumerate()
        .map(|(idx, q)| (&q.key, idx))
        .collect();

    let mut adj: Vec<HashSet<TxIndex>> = vec![HashSet::new(); queues.len()];
    for (q_idx, queue) in queues.iter().enumerate() {
        for &w in &queue.writes {
            let tx = batch.get(w).expect("tx in range");
            for op in &tx.ops {
                if op.is_read() && op.key != queue.key {
                    let src = queue_of[&op.key];
                    if src != q_idx {
                        adj[src].insert(q_idx as TxIndex);
                    }
                }
            }
        }
    }
    let adj: Vec<Vec<TxIndex>> = adj.into_iter().map(|s| s.into_iter().collect()).collect();
    let graph = AdjGraph::new(adj);
    let none_aborted = vec![false; queues.len()];
    kahn_advanced(&graph, &none_aborted)
        .into_iter()
        .map(|v| v as usize)
        .collect()
}

/// The eight-step per-queue sequencing procedure described above, run for a
/// single queue.
fn process_queue(batch: &mut Batch, queue: &mut Queue, aborted: &mut [bool]) {
    // Step 1: reads already bound by earlier queues.
    let r_plus: Vec<TxIndex> = queue
        .reads
        .iter()
        .copied()
        .filter(|&r| seq_of(batch, r) != UNASSIGNED_SEQ && !aborted[r as usize])
        .collect();

    // Steps 2-3: assign every read, set max_read. A queue with no reads at
    // all leaves max_read unassigned so step 5 reserves INITIAL_SEQ for the
    // first write instead of skipping straight to INITIAL_SEQ + 1 (the
    // lone-writer boundary case).
    if queue.reads.is_empty() {
        // nothing to assign; max_read stays UNASSIGNED_SEQ.
    } else if r_plus.is_empty() {
        for &r in &queue.reads {
            assign_sequence(batch, r, INITIAL_SEQ);
        }
        queue.max_read = INITIAL_SEQ;
    } else {
        let m = r_plus.iter().map(|&r| seq_of(batch, r)).min().expect("nonempty");
        let big_m = r_plus.iter().map(|&r| seq_of(batch, r)).max().expect("nonempty");
        for &r in &queue.reads {
            if seq_of(batch, r) == UNASSIGNED_SEQ {
                assign_sequence(batch, r, m);
            }
        }
        queue.max_read = big_m;
    }

    // Step 4: partition pre-bound writes (seq != 0) into W_same / abort / W_other.
    let reads_here: HashSet<TxIndex> = queue.reads.iter().copied().collect();
    let mut w_same: Vec<TxIndex> = Vec::new();
    let mut w_other: Vec<(Seq, TxIndex)> = Vec::new();
    for &w in &queue.writes {
        let seq = seq_of(batch, w);
        if seq == UNASSIGNED_SEQ {
            continue;
        }
        if seq > queue.max_read {
            w_other.push((seq, w));
        } else if reads_here.contains(&w) {
            w_same.push(w);
        } else {
            tracing::trace!(tx = w, key = %queue.key, "aborting: write contradicts an already-bound read");
            aborted[w as usize] = true;
        }
    }
    w_same.sort_unstable();
    w_other.sort_unstable();

    // Step 5: initialize max_write.
    queue.max_write = if queue.max_read == UNASSIGNED_SEQ {
        INITIAL_SEQ - 1
    } else {
        queue.max_read
    };

    // Step 6: first W_same entry re-sequenced right after reads; the rest abort.
    let mut w_same_iter = w_same.iter();
    if let Some(&first) = w_same_iter.next() {
        queue.max_write += 1;
        queue.max_read = queue.max_write;
        assign_sequence(batch, first, queue.max_write);
    }
    for &extra in w_same_iter {
        tracing::trace!(tx = extra, key = %queue.key, "aborting: second W_same write at this key");
        aborted[extra as usize] = true;
    }

    // Step 7: still-unassigned writes get the smallest seq above max_write
    // not already claimed by a W_other entry.
    let used: HashSet<Seq> = w_other.iter().map(|(seq, _)| *seq).collect();
    let mut unassigned: Vec<TxIndex> = queue
        .writes
        .iter()
        .copied()
        .filter(|&w| seq_of(batch, w) == UNASSIGNED_SEQ)
        .collect();
    unassigned.sort_unstable();
    for w in unassigned {
        let mut candidate = queue.max_write + 1;
        while used.contains(&candidate) {
            candidate += 1;
        }
        queue.max_write = candidate;
        assign_sequence(batch, w, candidate);
    }

    // Step 8: reconcile W_other, leaving the first (lowest-seq) entry in
    // place and squeezing every subsequent one right after max_write.
    if let Some(&(max_other_seq, _)) = w_other.last() {
        if max_other_seq > queue.max_write {
            queue.max_write = max_other_seq;
        }
    }
    for (pos, &(_seq, tx)) in w_other.iter().enumerate() {
        if pos == 0 {
            continue;
        }
        queue.max_write += 1;
        assign_sequence(batch, tx, queue.max_write);
    }
}

/// Group surviving writes by shared seq, ascending.
fn commit_grouping(batch: &Batch, aborted: &[bool]) -> Vec<(Seq, Vec<(TxIndex, Key, Vec<u8>)>)> {
    let mut grouped: HashMap<Seq, Vec<(TxIndex, Key, Vec<u8>)>> = HashMap::new();
    #[allow(clippy::cast_possible_truncation)]
    for tx_idx in 0..batch.len() as TxIndex {
        if aborted[tx_idx as usize] {
            continue;
        }
        let tx = batch.get(tx_idx).expect("tx in range");
        let seq = tx.ops[0].seq;
        for op in &tx.ops {
            if op.is_write() {
                grouped
                    .entry(seq)
                    .or_default()
                    .push((tx_idx, op.key.clone(), op.value.clone()));
            }
        }
    }
    let mut out: Vec<(Seq, Vec<(TxIndex, Key, Vec<u8>)>)> = grouped.into_iter().collect();
    out.sort_unstable_by_key(|(seq, _)| *seq);
    out
}
