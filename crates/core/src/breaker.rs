//! Greedy cycle-breaking vertex cover.
//!
//! Given the elementary cycles found within one SCC ([`crate::cycles`]),
//! repeatedly abort the vertex that appears in the most still-unbroken
//! cycles, breaking ties by lowest [`TxIndex`], until no cycle survives.
//! This is the standard greedy approximation to minimum feedback vertex
//! set; an optimal (minimum-size) cover isn't required, only a
//! deterministic one, which the lowest-index tie-break provides.

use hashbrown::HashSet;

use crate::cycles::Cycle;
use crate::model::TxIndex;

/// Choose a set of vertices whose removal leaves no cycle in `cycles`.
///
/// Deterministic: at each step, the vertex with the highest remaining
/// coverage count wins; ties go to the lowest [`TxIndex`]. Re-scores after
/// every abort, since one abort can fully cover several other cycles.
#[must_use]
pub fn break_cycles(cycles: &[Cycle]) -> Vec<TxIndex> {
    let mut unbroken: Vec<HashSet<TxIndex>> = cycles
        .iter()
        .map(|c| c.vertices.iter().copied().collect())
        .collect();
    let mut aborted = Vec::new();

    while let Some(victim) = pick_victim(&unbroken) {
        aborted.push(victim);
        unbroken.retain(|members| !members.contains(&victim));
    }

    aborted.sort_unstable();
    aborted
}

/// Find the vertex covering the most remaining cycles, lowest index first on
/// ties. Returns `None` once `unbroken` is empty.
fn pick_victim(unbroken: &[HashSet<TxIndex>]) -> Option<TxIndex> {
    let mut scores: hashbrown::HashMap<TxIndex, u32> = hashbrown::HashMap::new();
    for members in unbroken {
        for &v in members {
            *scores.entry(v).or_insert(0) += 1;
        }
    }
    scores
        .into_iter()
        .max_by(|(v1, c1), (v2, c2)| c1.cmp(c2).then_with(|| v2.cmp(v1)))
        .map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(vertices: &[TxIndex]) -> Cycle {
        Cycle {
            vertices: vertices.to_vec(),
        }
    }

    #[test]
    fn two_cycle_breaks_lower_index() {
        let cycles = vec![cycle(&[0, 1])];
        assert_eq!(break_cycles(&cycles), vec![0]);
    }

    #[test]
    fn shared_vertex_covers_both_cycles_at_once() {
        // Tx1 appears in all three cycles: 0-1, 1-2, 0-1-2.
        let cycles = vec![cycle(&[0, 1]), cycle(&[1, 2]), cycle(&[0, 1, 2])];
        assert_eq!(break_cycles(&cycles), vec![1]);
    }

    #[test]
    fn disjoint_cycles_each_abort_their_own_lowest_vertex() {
        let cycles = vec![cycle(&[0, 1]), cycle(&[2, 3])];
        assert_eq!(break_cycles(&cycles), vec![0, 2]);
    }

    #[test]
    fn no_cycles_aborts_nothing() {
        assert!(break_cycles(&[]).is_empty());
    }

    #[test]
    fn tie_break_prefers_lowest_index_when_coverage_equal() {
        // Both 0 and 1 cover exactly one cycle each, disjoint; lowest index
        // picked first deterministically, then its own cycle is removed,
        // leaving the other to be picked next.
        let cycles = vec![cycle(&[5, 6]), cycle(&[1, 2])];
        assert_eq!(break_cycles(&cycles), vec![1, 5]);
    }
}
