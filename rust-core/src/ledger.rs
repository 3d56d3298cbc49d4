// Append-only event log (single-parent, hash-chained).
// Every committed transaction appends its events here; entries are never rewritten.

use crate::event::{BlockContext, Hash, LedgerEvent, ZERO_HASH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLinkError {
    /// Entry does not point at its predecessor's hash.
    BrokenLink { seq: u64 },
    /// Stored hash differs from the recomputed one.
    HashMismatch { seq: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub block: BlockContext,
    pub prev_hash: Hash,
    pub event: LedgerEvent,
    pub hash: Hash,
}

/// Event paired with its canonical bytes, encoded before any state is committed.
#[derive(Debug, Clone)]
pub struct EncodedEvent {
    pub event: LedgerEvent,
    pub bytes: Vec<u8>,
}

impl EncodedEvent {
    pub fn encode(event: LedgerEvent) -> Result<Self, serde_json::Error> {
        let bytes = event.canonical_bytes()?;
        Ok(Self { event, bytes })
    }
}

#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    by_hash: HashMap<Hash, u64>,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog {
            entries: Vec::new(),
            by_hash: HashMap::new(),
        }
    }

    pub fn hash_entry(seq: u64, block: &BlockContext, prev_hash: &Hash, event_bytes: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(seq.to_le_bytes());
        hasher.update(block.height.to_le_bytes());
        hasher.update(block.timestamp.to_le_bytes());
        hasher.update(prev_hash);
        hasher.update(event_bytes);
        hasher.finalize().into()
    }

    /// Append one pre-encoded event on top of the current tip.
    pub fn append(&mut self, block: BlockContext, encoded: EncodedEvent) -> Hash {
        let seq = self.entries.len() as u64;
        let prev_hash = self.tip();
        let hash = Self::hash_entry(seq, &block, &prev_hash, &encoded.bytes);

        self.entries.push(LogEntry {
            seq,
            block,
            prev_hash,
            event: encoded.event,
            hash,
        });
        self.by_hash.insert(hash, seq);
        hash
    }

    /// Hash of the latest entry, ZERO_HASH when empty.
    pub fn tip(&self) -> Hash {
        self.entries.last().map(|e| e.hash).unwrap_or(ZERO_HASH)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, seq: u64) -> Option<&LogEntry> {
        self.entries.get(seq as usize)
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&LogEntry> {
        self.by_hash.get(hash).and_then(|seq| self.get(*seq))
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries with `seq >= from`, for followers catching up.
    pub fn since(&self, from: u64) -> &[LogEntry] {
        let start = (from as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// Recompute every hash and check parent linkage from genesis.
    pub fn verify_chain(&self) -> Result<(), LogLinkError> {
        let mut prev = ZERO_HASH;
        for entry in &self.entries {
            if entry.prev_hash != prev {
                return Err(LogLinkError::BrokenLink { seq: entry.seq });
            }
            let bytes = entry
                .event
                .canonical_bytes()
                .map_err(|_| LogLinkError::HashMismatch { seq: entry.seq })?;
            let expected = Self::hash_entry(entry.seq, &entry.block, &entry.prev_hash, &bytes);
            if expected != entry.hash {
                return Err(LogLinkError::HashMismatch { seq: entry.seq });
            }
            prev = entry.hash;
        }
        Ok(())
    }

    /// Deterministic Merkle root over entry hashes in log order.
    /// None iff the log is empty.
    pub fn merkle_root(&self) -> Option<Hash> {
        if self.entries.is_empty() {
            return None;
        }
        let mut level: Vec<Hash> = self.entries.iter().map(|e| e.hash).collect();

        while level.len() > 1 {
            let mut next: Vec<Hash> = Vec::with_capacity(level.len().div_ceil(2));
            let mut i = 0;
            while i < level.len() {
                let a = level[i];
                let b = if i + 1 < level.len() {
                    level[i + 1]
                } else {
                    level[i]
                };
                let mut hasher = Sha256::new();
                hasher.update(a);
                hasher.update(b);
                next.push(hasher.finalize().into());
                i += 2;
            }
            level = next;
        }

        level.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(byte: u8) -> EncodedEvent {
        EncodedEvent::encode(LedgerEvent::AirlineRegistered { airline: [byte; 32] }).unwrap()
    }

    #[test]
    fn append_links_entries() {
        let mut log = EventLog::new();
        assert_eq!(log.tip(), ZERO_HASH);
        assert!(log.merkle_root().is_none());

        let block = BlockContext { height: 1, timestamp: 10 };
        let h0 = log.append(block, registered(1));
        let h1 = log.append(block, registered(2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.tip(), h1);
        assert_eq!(log.get(1).unwrap().prev_hash, h0);
        assert_eq!(log.get_by_hash(&h0).unwrap().seq, 0);
        assert_eq!(log.since(1).len(), 1);
        assert!(log.verify_chain().is_ok());
    }

    #[test]
    fn merkle_root_changes_with_content() {
        let block = BlockContext::default();
        let mut a = EventLog::new();
        let mut b = EventLog::new();
        a.append(block, registered(1));
        b.append(block, registered(2));
        assert_ne!(a.merkle_root(), b.merkle_root());

        // Single leaf: root is the leaf itself.
        assert_eq!(a.merkle_root(), Some(a.tip()));
    }

    #[test]
    fn tampered_entry_fails_verification() {
        let block = BlockContext::default();
        let mut log = EventLog::new();
        log.append(block, registered(1));
        log.append(block, registered(2));
        log.entries[1].event = LedgerEvent::AirlineRegistered { airline: [9; 32] };
        assert_eq!(log.verify_chain(), Err(LogLinkError::HashMismatch { seq: 1 }));
    }
}
