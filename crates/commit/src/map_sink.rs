//! An in-memory [`KvSink`] for tests and the CLI demo.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::KvSink;

/// A `parking_lot::Mutex`-guarded in-memory map, standing in for a real KV
/// store. Explicitly not a production store: durability is out of scope
/// for the core.
#[derive(Debug, Default)]
pub struct MapKvSink {
    inner: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MapKvSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl KvSink for MapKvSink {
    type Error = std::convert::Infallible;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Self::Error> {
        self.inner.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
