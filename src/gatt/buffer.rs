//! Bounded outgoing attribute buffer
//!
//! Appends are all-or-nothing: a slice that does not fit leaves the buffer
//! untouched and reports `InsufficientResources`.

use crate::config::gatt::MAX_ATTRIBUTE_VALUE;
use crate::gatt::error::AttError;
use heapless::Vec;

/// Owned attribute value, as returned from reads
pub type AttValue = Vec<u8, MAX_ATTRIBUTE_VALUE>;

/// Outgoing payload with a capacity limit below the static maximum
#[derive(Debug, Clone)]
pub struct AttBuffer {
    data: AttValue,
    limit: usize,
}

impl AttBuffer {
    /// Create an empty buffer that accepts at most `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit: limit.min(MAX_ATTRIBUTE_VALUE),
        }
    }

    /// Append a slice, or fail without writing anything
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), AttError> {
        if bytes.len() > self.remaining() {
            return Err(AttError::InsufficientResources);
        }
        self.data
            .extend_from_slice(bytes)
            .map_err(|_| AttError::InsufficientResources)
    }

    pub fn push(&mut self, byte: u8) -> Result<(), AttError> {
        self.append(&[byte])
    }

    /// Bytes that can still be appended
    pub fn remaining(&self) -> usize {
        self.limit - self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_value(self) -> AttValue {
        self.data
    }
}
