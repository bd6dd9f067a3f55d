//! Dependency builder: turns a batch's read/write footprints into a
//! deduplicated conflict-edge adjacency list.
//!
//! # Canonical edge semantics
//!
//! The "general" and "light" builders below could, in principle, disagree on
//! which direction a read-before-write pair gets wired; this module settles
//! on one canonical definition that both builders implement identically:
//!
//! - **write-read**: for every key `k`, every transaction `w` that writes
//!   `k` has an edge `w -> r` to every transaction `r` that reads `k`
//!   (`r != w`), *regardless of their relative batch index*. A reader whose
//!   witnessed value predates a same-batch write (an antidependency) still
//!   needs that writer to commit before it for the read to remain valid, so
//!   the edge is always writer-to-reader.
//! - **write-write**: for every key `k`, writers are totally ordered by
//!   ascending batch index; edge `w1 -> w2` for every `w1 < w2` both
//!   writing `k`.
//!
//! This reproduces the classic two-transaction rw-cycle
//! (`Tx0: R(x) -> W(y)`, `Tx1: R(y) -> W(x)` yields `0 -> 1` from the `y`
//! write-read pair and `1 -> 0` from the `x` write-read pair, a two-cycle
//! broken in favor of the lower index).
//!
//! Edges within `adj[i]` are deduplicated; there is no ordering requirement
//! across `adj[i]` entries (the two builders may emit them in different
//! orders for the same edge set).

use hashbrown::{HashMap, HashSet};

use crate::model::{Batch, Key, TxIndex};

/// Build the conflict adjacency list with the `O(N^2 * |ops|)` pairwise
/// algorithm. Provided as an independently-implemented cross-check of
/// [`light_builder`]; `analyze()` uses the light builder for performance.
#[must_use]
pub fn general_builder(batch: &Batch) -> Vec<Vec<TxIndex>> {
    #[allow(clippy::cast_possible_truncation)]
    let n = batch.len() as TxIndex;
    let mut adj: Vec<HashSet<TxIndex>> = vec![HashSet::new(); n as usize];

    for i in 0..n {
        let tx_i = batch.get(i).expect("index in range");
        let writes_i = tx_i.write_set();
        for j in 0..n {
            if i == j {
                continue;
            }
            let tx_j = batch.get(j).expect("index in range");
            let conflicts = writes_i.iter().any(|k| {
                tx_j.read_set().contains(*k) || (i < j && tx_j.write_set().contains(*k))
            });
            if conflicts {
                adj[i as usize].insert(j);
            }
        }
    }

    adj.into_iter().map(|set| set.into_iter().collect()).collect()
}

/// Build the conflict adjacency list in one pass over per-key reader/writer
/// indices, avoiding the `O(N^2)` pairwise scan.
#[must_use]
pub fn light_builder(batch: &Batch) -> Vec<Vec<TxIndex>> {
    let n = batch.len();
    let mut readers: HashMap<&Key, Vec<TxIndex>> = HashMap::new();
    let mut writers: HashMap<&Key, Vec<TxIndex>> = HashMap::new();

    for tx in batch.iter() {
        for op in &tx.ops {
            if op.is_read() {
                readers.entry(&op.key).or_default().push(op.tx);
            } else {
                writers.entry(&op.key).or_default().push(op.tx);
            }
        }
    }
    for list in readers.values_mut() {
        list.sort_unstable();
        list.dedup();
    }
    for list in writers.values_mut() {
        list.sort_unstable();
        list.dedup();
    }

    let mut adj: Vec<HashSet<TxIndex>> = vec![HashSet::new(); n];

    for (key, write_idxs) in &writers {
        // write-read: every writer of `key` precedes every reader of `key`.
        if let Some(read_idxs) = readers.get(key) {
            for &w in write_idxs {
                for &r in read_idxs {
                    if w != r {
                        adj[w as usize].insert(r);
                    }
                }
            }
        }
        // write-write: every earlier writer precedes every later writer.
        for (pos, &w1) in write_idxs.iter().enumerate() {
            for &w2 in &write_idxs[pos + 1..] {
                adj[w1 as usize].insert(w2);
            }
        }
    }

    adj.into_iter().map(|set| set.into_iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;

    use super::*;
    use crate::model::{OpKind, Tx};

    fn edge_set(adj: &[Vec<TxIndex>]) -> HashSet<(TxIndex, TxIndex)> {
        let mut set = HashSet::new();
        for (src, dsts) in adj.iter().enumerate() {
            for &dst in dsts {
                #[allow(clippy::cast_possible_truncation)]
                set.insert((src as TxIndex, dst));
            }
        }
        set
    }

    #[test]
    fn scenario_1_no_cycle_chain() {
        let batch = Batch::new(vec![
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
        ])
        .unwrap();

        let light = light_builder(&batch);
        let general = general_builder(&batch);
        assert_eq!(edge_set(&light), edge_set(&general));
        assert_eq!(edge_set(&light), [(0, 1), (1, 2)].into_iter().collect());
    }

    #[test]
    fn scenario_2_ww_forward_only() {
        let batch = Batch::new(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(1, vec![(OpKind::Write, b"x".to_vec(), b"2".to_vec())]),
        ])
        .unwrap();

        let light = light_builder(&batch);
        let general = general_builder(&batch);
        assert_eq!(edge_set(&light), edge_set(&general));
        assert_eq!(edge_set(&light), [(0, 1)].into_iter().collect());
    }

    #[test]
    fn scenario_3_rw_cycle() {
        let batch = Batch::new(vec![
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
        ])
        .unwrap();

        let light = light_builder(&batch);
        let general = general_builder(&batch);
        assert_eq!(edge_set(&light), edge_set(&general));
        assert_eq!(edge_set(&light), [(0, 1), (1, 0)].into_iter().collect());
    }

    #[test]
    fn builders_agree_on_disjoint_batch() {
        let batch = Batch::new(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(1, vec![(OpKind::Write, b"y".to_vec(), b"1".to_vec())]),
            Tx::new(2, vec![(OpKind::Write, b"z".to_vec(), b"1".to_vec())]),
        ])
        .unwrap();
        assert_eq!(
            edge_set(&light_builder(&batch)),
            edge_set(&general_builder(&batch))
        );
        assert!(edge_set(&light_builder(&batch)).is_empty());
    }
}
