//! Topological sort of the survivors, after cycle breaking.
//!
//! Two variants:
//!
//! - **Basic**: standard Kahn's algorithm. The frontier (zero in-degree,
//!   non-aborted vertices) is always processed lowest-index first, which is
//!   enough to make the output deterministic as long as the frontier is
//!   never empty while vertices remain.
//! - **Advanced**: Basic, plus a safety net for when cycle breaking left a
//!   residual cycle the frontier can't make progress on (should not happen
//!   if the breaker did its job, but the sorter must not hang or panic if it
//!   does): if the frontier is empty and vertices remain, force the next
//!   vertex in by `(min in_degree, max out_degree, min index)` and treat its
//!   still-incoming edges as satisfied.
//!
//! Both variants are linear in vertices plus edges.

use std::collections::BinaryHeap;
use std::cmp::Reverse;

use crate::graph::AdjGraph;
use crate::model::TxIndex;

/// A deterministic total order over the surviving (non-aborted) vertices.
#[must_use]
pub fn kahn_basic(graph: &AdjGraph, aborted: &[bool]) -> Vec<TxIndex> {
    kahn(graph, aborted, false)
}

/// [`kahn_basic`] with the forced-vertex safety net engaged.
#[must_use]
pub fn kahn_advanced(graph: &AdjGraph, aborted: &[bool]) -> Vec<TxIndex> {
    kahn(graph, aborted, true)
}

fn kahn(graph: &AdjGraph, aborted: &[bool], advanced: bool) -> Vec<TxIndex> {
    let n = graph.len();
    debug_assert_eq!(aborted.len(), n);

    let mut in_degree = graph.in_degree.clone();
    let mut done = aborted.to_vec();
    let mut order = Vec::new();

    // min-heap over TxIndex via Reverse, so the lowest index is always
    // popped first among equally-ready vertices.
    let mut frontier: BinaryHeap<Reverse<TxIndex>> = BinaryHeap::new();
    for v in 0..n {
        #[allow(clippy::cast_possible_truncation)]
        let v = v as TxIndex;
        if !aborted[v as usize] && in_degree[v as usize] == 0 {
            frontier.push(Reverse(v));
        }
    }

    loop {
        while let Some(Reverse(v)) = frontier.pop() {
            if done[v as usize] {
                continue;
            }
            done[v as usize] = true;
            order.push(v);
            for edge in &graph.out_adj[v as usize] {
                if edge.aborted || done[edge.dst as usize] {
                    continue;
                }
                in_degree[edge.dst as usize] = in_degree[edge.dst as usize].saturating_sub(1);
                if in_degree[edge.dst as usize] == 0 {
                    frontier.push(Reverse(edge.dst));
                }
            }
        }

        if done.iter().all(|d| *d) {
            break;
        }
        if !advanced {
            // Basic sorter has no residual-cycle recovery; stop rather than
            // loop forever. Callers are expected to have removed all
            // cycles before reaching here.
            break;
        }

        // Safety net: pick (min in_degree, max out_degree, min index) among
        // the still-undone vertices and force it in, satisfying its
        // remaining in-edges as a side effect.
        let forced = (0..n)
            .map(|v| v as TxIndex)
            .filter(|&v| !done[v as usize])
            .min_by(|&a, &b| {
                in_degree[a as usize]
                    .cmp(&in_degree[b as usize])
                    .then_with(|| graph.out_degree[b as usize].cmp(&graph.out_degree[a as usize]))
                    .then_with(|| a.cmp(&b))
            })
            .expect("remaining() > 0 implies an undone vertex exists");
        frontier.push(Reverse(forced));
    }

    order
}
