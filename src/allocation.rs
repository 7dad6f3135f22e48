//! # Allocation Index Registry
//!
//! Hands out the slot indices under which expanded evaluator nodes allocate
//! their sub-rig. One registry lives for exactly one compile pass.

use crate::error::{ExpansionError, Result};

/// Monotonic per-pass counter. Indices are never reused within a pass.
#[derive(Debug, Clone)]
pub struct AllocationIndexRegistry {
    base: u32,
    /// `None` once `u32::MAX` has been handed out.
    next: Option<u32>,
    issued: usize,
}

impl Default for AllocationIndexRegistry {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl AllocationIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(base: u32) -> Self {
        Self {
            base,
            next: Some(base),
            issued: 0,
        }
    }

    /// Next free index. Fails once the index space above the base is used up.
    pub fn next_index(&mut self) -> Result<u32> {
        let index = self.next.ok_or(ExpansionError::AllocationExhausted {
            base: self.base,
            issued: self.issued,
        })?;
        self.next = index.checked_add(1);
        self.issued += 1;
        Ok(index)
    }

    /// Number of indices issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }
}
