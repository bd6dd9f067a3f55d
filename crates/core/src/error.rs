//! Error kinds for the analysis and commit phases.
//!
//! Conflict-driven aborts (the algorithmic core of [`crate::breaker`] and
//! [`crate::queue`]) are *not* represented here: they surface only through
//! [`crate::plan::Plan::aborted`]. [`Error`] is reserved for conditions that
//! prevent `analyze`/`commit` from producing a plan at all.

/// Errors that can abort analysis or commit outright.
#[derive(Debug)]
pub enum Error {
    /// A `Vec`/`HashMap` allocation failed. Fatal; propagates out.
    AllocationFailure,
    /// A commit-phase write to the KV sink failed. The whole batch is
    /// aborted to preserve sequence ordering (see [`crate::plan::Plan`]).
    KvFailure(String),
    /// A transaction referenced no key, or declared the same `(kind, key)`
    /// pair twice. Rejected at `analyze` with a descriptive message.
    InputViolation(String),
    /// An internal invariant documented in `model`/`queue` was violated at a
    /// phase boundary. Debug builds panic via `debug_assert!` at the call
    /// site; release builds downgrade to this variant, skip the offending
    /// transaction, and log via `tracing::error!`.
    InternalInvariant(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AllocationFailure => write!(f, "allocation failure"),
            Self::KvFailure(msg) => write!(f, "kv sink failure: {msg}"),
            Self::InputViolation(msg) => write!(f, "invalid input batch: {msg}"),
            Self::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
