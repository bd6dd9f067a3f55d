//! Persisted account key/value layout.
//!
//! The value encoding is a concrete, testable codec (`u32` little-endian
//! length prefix per field) so the CLI demo and the commit-dispatcher tests
//! have something real to exercise. [`crate::queue::Queue`]/
//! [`crate::plan::Plan`] are agnostic to this encoding -- it is purely a
//! convenience for callers that want a named account keyspace.

/// Prefix byte for the account keyspace: every account lives under
/// `"a" ++ address`.
const ACCOUNT_PREFIX: u8 = b'a';

/// Build the KV key for an account: `"a" ++ address`.
#[must_use]
pub fn encode_account_key(address: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + address.len());
    out.push(ACCOUNT_PREFIX);
    out.extend_from_slice(address);
    out
}

/// Build the KV value for an account: `{address, value}`, each field
/// preceded by its length as a `u32` little-endian integer.
#[must_use]
pub fn encode_account_value(address: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + address.len() + value.len());
    out.extend_from_slice(&u32::try_from(address.len()).unwrap_or(u32::MAX).to_le_bytes());
    out.extend_from_slice(address);
    out.extend_from_slice(&u32::try_from(value.len()).unwrap_or(u32::MAX).to_le_bytes());
    out.extend_from_slice(value);
    out
}

/// Inverse of [`encode_account_value`].
#[must_use]
pub fn decode_account_value(bytes: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    fn take(bytes: &[u8], n: usize) -> Option<(&[u8], &[u8])> {
        if bytes.len() < n {
            return None;
        }
        Some(bytes.split_at(n))
    }

    let (addr_len, rest) = take(bytes, 4)?;
    let addr_len = u32::from_le_bytes(addr_len.try_into().ok()?) as usize;
    let (address, rest) = take(rest, addr_len)?;
    let (value_len, rest) = take(rest, 4)?;
    let value_len = u32::from_le_bytes(value_len.try_into().ok()?) as usize;
    let (value, _) = take(rest, value_len)?;
    Some((address.to_vec(), value.to_vec()))
}
