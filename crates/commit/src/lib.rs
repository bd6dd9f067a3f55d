//! Bounded-parallel commit dispatcher.
//!
//! `nezha-core::plan::analyze` only decides *what* to commit and in what
//! order; this crate applies that decision to a key-value sink. For each
//! sequence number ascending, every write-set in that bucket is dispatched
//! concurrently onto a caller-supplied [`rayon::ThreadPool`]; the pool
//! drains before the next sequence starts, which is the barrier that gives
//! the ordering guarantee: if `seq(a) < seq(b)`, all of `a`'s writes are
//! visible before any of `b`'s.
//!
//! No process-global pool -- the pool is always a parameter, so callers
//! control its lifetime and sizing.

use nezha_core::plan::Plan;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

mod map_sink;

pub use map_sink::MapKvSink;

/// The minimal key-value surface the commit dispatcher needs: `put(key,
/// value) -> Result`, nothing more. Grounded on the narrow, associated-
/// `Error` driver shape in this pack's `DbDriver` trait.
pub trait KvSink {
    type Error;

    /// Write `value` at `key`. Implementations need not be internally
    /// consistent across concurrent calls to *different* keys (one bucket
    /// never writes the same key twice), but must be safe to call
    /// concurrently from multiple threads.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error>;
}

/// Errors from [`commit`].
#[derive(Debug)]
pub enum Error<E> {
    /// A write in some bucket failed; the batch is aborted wholesale (the
    /// remaining buckets are never dispatched) to preserve `seq` ordering.
    Kv(E),
}

impl<E: core::fmt::Display> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Kv(err) => write!(f, "kv sink failure: {err}"),
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for Error<E> {}

/// Apply `plan` to `sink`, one sequence bucket at a time, ascending.
///
/// Every write in a bucket is dispatched onto `pool` concurrently;
/// `pool.install` blocks until the whole closure -- including every
/// spawned write -- completes, which is the barrier separating buckets.
/// On the first failing write, the whole commit aborts without starting
/// the next bucket: a partially-applied batch must never leave the sink
/// inconsistent relative to `seq` order.
///
/// # Errors
///
/// Returns the sink's error, wrapped in [`Error::Kv`], from the first write
/// that fails. Buckets strictly before the failing one have already been
/// fully applied; buckets at or after it are never attempted.
pub fn commit<S>(plan: &Plan, sink: &S, pool: &rayon::ThreadPool) -> Result<(), Error<S::Error>>
where
    S: KvSink + Sync,
    S::Error: Send,
{
    for (seq, writes) in &plan.commit {
        tracing::debug!(seq, bucket_size = writes.len(), "dispatching commit bucket");
        let result = pool.install(|| {
            writes
                .par_iter()
                .try_for_each(|write| sink.put(write.key.as_bytes(), &write.value))
        });
        if let Err(err) = result {
            tracing::error!(seq, "commit bucket failed, aborting remaining buckets");
            return Err(Error::Kv(err));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nezha_core::engine::Engine;
    use nezha_core::model::{Batch, OpKind, Tx};
    use nezha_core::plan::analyze;

    use super::*;

    fn pool(n: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .unwrap()
    }

    #[test]
    fn commits_every_surviving_write() {
        let batch = Batch::new(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(
                1,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"1".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"2".to_vec()),
                ],
            ),
        ])
        .unwrap();
        let plan = analyze(&batch, Engine::ConflictGraph).unwrap();

        let sink = MapKvSink::default();
        commit(&plan, &sink, &pool(2)).unwrap();

        assert_eq!(sink.get(b"x"), Some(b"1".to_vec()));
        assert_eq!(sink.get(b"y"), Some(b"2".to_vec()));
    }

    #[test]
    fn bucket_failure_stops_later_buckets() {
        let batch = Batch::new(vec![
            Tx::new(0, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(
                1,
                vec![
                    (OpKind::Read, b"x".to_vec(), b"1".to_vec()),
                    (OpKind::Write, b"y".to_vec(), b"2".to_vec()),
                ],
            ),
        ])
        .unwrap();
        let plan = analyze(&batch, Engine::ConflictGraph).unwrap();

        let sink = FailingSink { fail_key: b"y".to_vec(), inner: MapKvSink::default() };
        let result = commit(&plan, &sink, &pool(2));
        assert!(result.is_err());
        // the bucket before the failing key's bucket must have landed.
        assert_eq!(sink.inner.get(b"x"), Some(b"1".to_vec()));
        assert_eq!(sink.inner.get(b"y"), None);
    }

    struct FailingSink {
        fail_key: Vec<u8>,
        inner: MapKvSink,
    }

    impl KvSink for FailingSink {
        type Error = String;

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
            if key == self.fail_key.as_slice() {
                return Err("simulated kv failure".to_string());
            }
            self.inner.put(key, value).map_err(|e| e.to_string())
        }
    }
}
