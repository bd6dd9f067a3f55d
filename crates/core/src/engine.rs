//! Engine selection: the two alternative analyses offered over the same
//! batch input.

/// Which analysis to run over a batch.
///
/// [`Engine::ConflictGraph`] builds an explicit conflict graph and breaks
/// cycles before sorting ([`crate::builder`], [`crate::graph`],
/// [`crate::scc`], [`crate::cycles`], [`crate::breaker`],
/// [`crate::toposort`]). [`Engine::ConflictQueue`] never materializes a
/// graph; it assigns sequence numbers directly from per-key queues
/// ([`crate::queue`]). Both are wired together by [`crate::plan::analyze`].
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// Conflict-Graph engine: cycle-breaking plus topological sort.
    #[default]
    ConflictGraph,
    /// Conflict-Queue engine (ACG / DeSS): per-key queues with sequence
    /// numbers.
    ConflictQueue,
}

impl core::fmt::Display for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConflictGraph => write!(f, "cg"),
            Self::ConflictQueue => write!(f, "acg"),
        }
    }
}

impl core::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cg" | "conflict-graph" => Ok(Self::ConflictGraph),
            "acg" | "conflict-queue" | "dess" => Ok(Self::ConflictQueue),
            other => Err(format!("unknown engine {other:?}, expected `cg` or `acg`")),
        }
    }
}
