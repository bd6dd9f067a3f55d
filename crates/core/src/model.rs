//! The read/write-set data model: keys, operations, transactions, and
//! batches. A transaction's operation order is preserved for
//! display/debugging but is semantically a set for conflict purposes --
//! conflict detection never depends on intra-`Tx` op order.

use std::fmt;

use hashbrown::HashSet;

use crate::error::Error;

/// An opaque byte-sequence key, compared and hashed byte-wise.
///
/// Equality and hashing operate on the raw bytes; [`Key::to_canonical_hex`]
/// produces the lowercase-hex string form used *only* as a map key inside
/// [`crate::queue::Queue`]. Raw bytes remain authoritative everywhere else,
/// including commit-dispatcher writes.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub Vec<u8>);

impl Key {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Lowercase hex encoding of the raw bytes.
    #[must_use]
    pub fn to_canonical_hex(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 2);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_hex())
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The kind of a read/write unit within a transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
}

/// A global commit sequence number. `0` means "unassigned"; any non-zero
/// value is a tentative or committed logical position within the batch.
pub type Seq = u32;

/// Sequence value reserved for "unassigned".
pub const UNASSIGNED_SEQ: Seq = 0;

/// A transaction's position within the batch, `0..N`. Also its vertex id in
/// the conflict graph.
pub type TxIndex = u32;

/// A caller-supplied, opaque transaction identifier (distinct from
/// [`TxIndex`], which is the transaction's position within this batch).
pub type TxId = u64;

/// A single read or write unit within a transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RwOp {
    /// Position of the owning transaction within the batch.
    pub tx: TxIndex,
    pub kind: OpKind,
    pub key: Key,
    /// Witnessed value (reads) or intended new value (writes).
    pub value: Vec<u8>,
    /// `0` until assigned by a sorter/queue engine.
    pub seq: Seq,
}

impl RwOp {
    #[must_use]
    pub const fn new(tx: TxIndex, kind: OpKind, key: Key, value: Vec<u8>) -> Self {
        Self {
            tx,
            kind,
            key,
            value,
            seq: UNASSIGNED_SEQ,
        }
    }

    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self.kind, OpKind::Read)
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self.kind, OpKind::Write)
    }

    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.seq != UNASSIGNED_SEQ
    }
}

/// A transaction: a caller-supplied id plus its ordered list of operations.
///
/// Operation *order* is preserved (for display and for "first op" lookups
/// such as commit grouping), but conflict detection treats `ops` as a set
/// keyed by `(kind, key)`.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub id: TxId,
    pub ops: Vec<RwOp>,
}

impl Tx {
    /// Build a transaction from `(kind, key, value)` triples. `index` is the
    /// transaction's position within the batch being constructed; it is
    /// stamped onto every op's `tx` field.
    ///
    /// # Panics
    ///
    /// Does not panic; malformed input is reported by [`Batch::new`] via
    /// [`Error::InputViolation`], not here.
    #[must_use]
    pub fn new(id: TxId, ops: Vec<(OpKind, Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            id,
            ops: ops
                .into_iter()
                .map(|(kind, key, value)| RwOp::new(0, kind, Key::new(key), value))
                .collect(),
        }
    }

    /// The read-set: distinct keys read by this transaction.
    #[must_use]
    pub fn read_set(&self) -> HashSet<&Key> {
        self.ops
            .iter()
            .filter(|op| op.is_read())
            .map(|op| &op.key)
            .collect()
    }

    /// The write-set: distinct keys written by this transaction.
    #[must_use]
    pub fn write_set(&self) -> HashSet<&Key> {
        self.ops
            .iter()
            .filter(|op| op.is_write())
            .map(|op| &op.key)
            .collect()
    }

    fn validate(&self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Err(Error::InputViolation(format!(
                "tx {} references no key",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        for op in &self.ops {
            if !seen.insert((op.kind, &op.key)) {
                return Err(Error::InputViolation(format!(
                    "tx {} has a duplicate ({:?}, {}) op",
                    self.id, op.kind, op.key
                )));
            }
        }
        Ok(())
    }
}

/// An ordered batch of transactions. The batch's natural index `i`
/// (`0..N-1`, i.e. [`TxIndex`]) is the only ordering hint used for
/// deterministic tie-breaking throughout the engines.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    txs: Vec<Tx>,
}

impl Batch {
    /// Validate and index a batch. Stamps each op's `tx` field with the
    /// transaction's batch index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputViolation`] if any transaction has no ops or a
    /// duplicate `(kind, key)` pair.
    pub fn new(mut txs: Vec<Tx>) -> Result<Self, Error> {
        for tx in &mut txs {
            tx.validate()?;
        }
        #[allow(clippy::cast_possible_truncation)]
        for (index, tx) in txs.iter_mut().enumerate() {
            for op in &mut tx.ops {
                op.tx = index as TxIndex;
            }
        }
        Ok(Self { txs })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: TxIndex) -> Option<&Tx> {
        self.txs.get(index as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tx> {
        self.txs.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Tx] {
        &self.txs
    }

    /// Mutable access to every op of a transaction at once, used to
    /// propagate a sequence number to every sibling op once one of them is
    /// assigned.
    pub fn ops_mut(&mut self, index: TxIndex) -> &mut [RwOp] {
        &mut self.txs[index as usize].ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_tx() {
        let err = Batch::new(vec![Tx::new(0, vec![])]);
        assert!(matches!(err, Err(Error::InputViolation(_))));
    }

    #[test]
    fn rejects_duplicate_op() {
        let err = Batch::new(vec![Tx::new(
            0,
            vec![
                (OpKind::Write, b"x".to_vec(), b"1".to_vec()),
                (OpKind::Write, b"x".to_vec(), b"2".to_vec()),
            ],
        )]);
        assert!(matches!(err, Err(Error::InputViolation(_))));
    }

    #[test]
    fn stamps_batch_index_on_ops() {
        let batch = Batch::new(vec![
            Tx::new(100, vec![(OpKind::Write, b"x".to_vec(), b"1".to_vec())]),
            Tx::new(200, vec![(OpKind::Read, b"x".to_vec(), b"1".to_vec())]),
        ])
        .unwrap();
        assert_eq!(batch.get(0).unwrap().ops[0].tx, 0);
        assert_eq!(batch.get(1).unwrap().ops[0].tx, 1);
    }

    #[test]
    fn canonical_hex_roundtrip_shape() {
        let key = Key::new(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(key.to_canonical_hex(), "deadbeef");
    }
}
