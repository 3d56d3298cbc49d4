use crate::error::{Result, SuretyError};
use crate::event::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome of inserting into a `BoundedSet`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insert {
    Added,
    AlreadyPresent,
}

/// Ordered address set with a hard capacity, used for airline votes and oracle support.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedSet {
    members: BTreeSet<Address>,
    capacity: usize,
}

impl BoundedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            members: BTreeSet::new(),
            capacity,
        }
    }

    /// Re-inserting a member is a no-op; a new member past capacity is an error.
    pub fn insert(&mut self, member: Address, what: &'static str) -> Result<Insert> {
        if self.members.contains(&member) {
            return Ok(Insert::AlreadyPresent);
        }
        if self.members.len() >= self.capacity {
            return Err(SuretyError::CapacityExceeded {
                what,
                capacity: self.capacity,
            });
        }
        self.members.insert(member);
        Ok(Insert::Added)
    }

    /// Raise the bound; never shrinks below the current capacity.
    pub fn grow_to(&mut self, capacity: usize) {
        self.capacity = self.capacity.max(capacity);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}
