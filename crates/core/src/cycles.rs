//! Elementary cycle enumeration, Johnson's algorithm, explicit-stack
//! and unbounded.
//!
//! A depth cap on this search would silently drop longer cycles from the
//! breaker's input, which can leave real cycles uncovered and ship a
//! non-serializable order. This implementation has no depth cap; cost is
//! bounded instead by only ever searching within one SCC at a time
//! ([`crate::scc::tarjan_scc`] partitions the graph first), which is what
//! makes Johnson's algorithm tractable in practice.
//!
//! The unblock/B-set bookkeeping and the path search are both run with an
//! explicit stack rather than recursion, for the same reason recursive SCC
//! search is avoided in [`crate::scc`].

use hashbrown::{HashMap, HashSet};

use crate::graph::AdjGraph;
use crate::model::TxIndex;
use crate::scc::Scc;

/// An elementary cycle, as the sequence of vertices visited (not repeating
/// the start vertex at the end).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub vertices: Vec<TxIndex>,
}

struct PathFrame {
    vertex: TxIndex,
    next_edge: usize,
}

/// Enumerate every elementary cycle within `scc`'s induced subgraph of
/// `graph`. Vertices outside `scc` and `aborted`-flagged edges are ignored.
///
/// Returns both the cycles and, for convenience, a per-vertex count of how
/// many returned cycles each vertex participates in -- the greedy breaker
/// ([`crate::breaker`]) uses this as its coverage score.
#[must_use]
pub fn enumerate_cycles(graph: &AdjGraph, scc: &Scc) -> (Vec<Cycle>, HashMap<TxIndex, u32>) {
    let members: HashSet<TxIndex> = scc.members.iter().copied().collect();
    // Johnson orders the search by the least vertex in the component,
    // restricting each search root to vertices >= it, shrinking the
    // subgraph searched as roots are exhausted.
    let mut ordered: Vec<TxIndex> = scc.members.clone();
    ordered.sort_unstable();

    let mut cycles = Vec::new();
    let mut counts: HashMap<TxIndex, u32> = HashMap::new();

    for (pos, &start) in ordered.iter().enumerate() {
        let remaining: HashSet<TxIndex> = ordered[pos..].iter().copied().collect();
        if !members.contains(&start) {
            continue;
        }
        let found = johnson_from(graph, start, &remaining);
        for cycle in found {
            for v in &cycle.vertices {
                *counts.entry(*v).or_insert(0) += 1;
            }
            cycles.push(cycle);
        }
    }

    (cycles, counts)
}

/// Find every elementary cycle rooted at `start`, confined to `allowed`
/// vertices, via Johnson's blocked DFS. Implemented with an explicit stack:
/// each [`PathFrame`] is a suspended call to the recursive `circuit(v)` in
/// Johnson's original formulation.
fn johnson_from(graph: &AdjGraph, start: TxIndex, allowed: &HashSet<TxIndex>) -> Vec<Cycle> {
    let mut blocked: HashSet<TxIndex> = HashSet::new();
    let mut block_map: HashMap<TxIndex, HashSet<TxIndex>> = HashMap::new();
    let mut path: Vec<TxIndex> = vec![start];
    let mut closed: HashSet<TxIndex> = HashSet::new(); // per-start "found a cycle through here"
    let mut out = Vec::new();

    blocked.insert(start);
    let mut stack: Vec<PathFrame> = vec![PathFrame {
        vertex: start,
        next_edge: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let v = frame.vertex;
        let edges = &graph.out_adj[v as usize];
        let mut descended = false;

        while frame.next_edge < edges.len() {
            let edge = edges[frame.next_edge];
            frame.next_edge += 1;
            if edge.aborted || !allowed.contains(&edge.dst) {
                continue;
            }
            if edge.dst == start {
                out.push(Cycle {
                    vertices: path.clone(),
                });
                closed.insert(v);
            } else if !blocked.contains(&edge.dst) {
                blocked.insert(edge.dst);
                path.push(edge.dst);
                stack.push(PathFrame {
                    vertex: edge.dst,
                    next_edge: 0,
                });
                descended = true;
                break;
            }
        }
        if descended {
            continue;
        }

        // v exhausted: unblock if it contributed to a cycle, else keep it
        // blocked and remember who to unblock once v itself unblocks.
        if closed.contains(&v) {
            unblock(v, &mut blocked, &mut block_map, &mut closed);
        } else {
            for edge in edges {
                if edge.aborted || !allowed.contains(&edge.dst) {
                    continue;
                }
                block_map.entry(edge.dst).or_default().insert(v);
            }
        }
        stack.pop();
        path.pop();
    }

    out
}

/// Explicit-stack unblock: `U(v)` in Johnson's paper, expressed as a work
/// queue instead of recursive calls.
fn unblock(
    v: TxIndex,
    blocked: &mut HashSet<TxIndex>,
    block_map: &mut HashMap<TxIndex, HashSet<TxIndex>>,
    closed: &mut HashSet<TxIndex>,
) {
    let mut queue = vec![v];
    while let Some(w) = queue.pop() {
        blocked.remove(&w);
        closed.remove(&w);
        if let Some(dependents) = block_map.remove(&w) {
            for dep in dependents {
                if blocked.contains(&dep) {
                    queue.push(dep);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scc_of(members: &[TxIndex]) -> Scc {
        Scc {
            members: members.to_vec(),
        }
    }

    #[test]
    fn two_cycle_found_once() {
        let g = AdjGraph::new(vec![vec![1], vec![0]]);
        let (cycles, counts) = enumerate_cycles(&g, &scc_of(&[0, 1]));
        assert_eq!(cycles.len(), 1);
        assert_eq!(counts[&0], 1);
        assert_eq!(counts[&1], 1);
    }

    #[test]
    fn three_cycle_found_once() {
        let g = AdjGraph::new(vec![vec![1], vec![2], vec![0]]);
        let (cycles, counts) = enumerate_cycles(&g, &scc_of(&[0, 1, 2]));
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].vertices.len(), 3);
        assert_eq!(counts[&0], 1);
    }

    #[test]
    fn overlapping_cycles_both_found() {
        // 0->1->0 and 1->2->1 share vertex 1.
        let g = AdjGraph::new(vec![vec![1], vec![0, 2], vec![1]]);
        let (cycles, counts) = enumerate_cycles(&g, &scc_of(&[0, 1, 2]));
        assert_eq!(cycles.len(), 2);
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&0], 1);
        assert_eq!(counts[&2], 1);
    }

    #[test]
    fn five_cycle_unbounded_by_depth() {
        // 0->1->2->3->4->0, length-5 cycle: would be dropped by a MAXDEPTH=4 cap.
        let g = AdjGraph::new(vec![vec![1], vec![2], vec![3], vec![4], vec![0]]);
        let (cycles, _) = enumerate_cycles(&g, &scc_of(&[0, 1, 2, 3, 4]));
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].vertices.len(), 5);
    }

    #[test]
    fn self_loop_counts_as_its_own_cycle() {
        let g = AdjGraph::new(vec![vec![0]]);
        let (cycles, counts) = enumerate_cycles(&g, &scc_of(&[0]));
        assert_eq!(cycles.len(), 1);
        assert_eq!(counts[&0], 1);
    }
}
