//! Oracle response aggregation.
//!
//! Registered oracles hold three indexes. A status request picks one index; any oracle
//! holding it may answer. Responses are tallied per `(index, flight)` and per status
//! code; the first code whose support reaches quorum seals the request. There is no
//! final-tally tie-break: later responses for a sealed key are ignored.

use crate::config::SuretyConfig;
use crate::error::{Result, SuretyError};
use crate::event::{Address, Amount, BlockContext, FlightKey, FlightStatus, LedgerEvent, short};
use crate::flights::Flight;
use crate::tally::{BoundedSet, Insert};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Redraws allowed while looking for three distinct indexes; collisions are kept after that.
const MAX_DRAW_ATTEMPTS: usize = 16;

/// Pseudo-random index assignment from public entropy.
/// Only needs to spread load across oracles, not to be unpredictable.
pub trait IndexSource {
    fn draw(&self, seed: &[u8], nonce: u64, range: u8) -> u8;
}

/// SHA-256 over seed and nonce, reduced modulo the range.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashIndexSource;

impl IndexSource for HashIndexSource {
    fn draw(&self, seed: &[u8], nonce: u64, range: u8) -> u8 {
        let mut h = Sha256::new();
        h.update(seed);
        h.update(nonce.to_le_bytes());
        let digest: [u8; 32] = h.finalize().into();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(word) % u64::from(range.max(1))) as u8
    }
}

/// Always returns the same index. For simulations and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedIndexSource(pub u8);

impl IndexSource for FixedIndexSource {
    fn draw(&self, _seed: &[u8], _nonce: u64, range: u8) -> u8 {
        self.0 % range.max(1)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleNode {
    pub address: Address,
    pub indexes: [u8; 3],
    pub registered: bool,
    pub fee_paid: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub index: u8,
    pub flight: FlightKey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Open,
    Sealed(FlightStatus),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseTally {
    pub requester: Address,
    pub opened_at: u64,
    pub state: RequestState,
    /// Every oracle that answered, whatever it reported.
    responders: BoundedSet,
    support: BTreeMap<FlightStatus, BoundedSet>,
}

impl ResponseTally {
    fn open(requester: Address, opened_at: u64, capacity: usize) -> Self {
        Self {
            requester,
            opened_at,
            state: RequestState::Open,
            responders: BoundedSet::new(capacity),
            support: BTreeMap::new(),
        }
    }

    pub fn support_for(&self, status: FlightStatus) -> u32 {
        self.support.get(&status).map(|s| s.len() as u32).unwrap_or(0)
    }

    pub fn responders(&self) -> usize {
        self.responders.len()
    }

    fn is_expired(&self, block: &BlockContext, cfg: &SuretyConfig) -> bool {
        match cfg.request_ttl_secs {
            Some(ttl) => self.state == RequestState::Open && block.timestamp.saturating_sub(self.opened_at) > ttl,
            None => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Quorum already reached on this key.
    Sealed,
    /// The flight was resolved through another index.
    FlightResolved,
    AlreadyResponded,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Recorded { support: u32 },
    Sealed(FlightStatus),
    /// Oracles cannot see sealing in advance, so late answers are not errors.
    Ignored(IgnoreReason),
}

#[derive(Clone, Debug, Default)]
pub struct OracleConsensus {
    oracles: BTreeMap<Address, OracleNode>,
    tallies: BTreeMap<ResponseKey, ResponseTally>,
    nonce: u64,
}

fn entropy_seed(account: &Address, block: &BlockContext) -> Vec<u8> {
    let mut seed = Vec::with_capacity(32 + 8 + 8);
    seed.extend_from_slice(account);
    seed.extend_from_slice(&block.height.to_le_bytes());
    seed.extend_from_slice(&block.timestamp.to_le_bytes());
    seed
}

impl OracleConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oracle(&self, address: &Address) -> Option<&OracleNode> {
        self.oracles.get(address)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn oracle_indexes(&self, address: &Address) -> Result<[u8; 3]> {
        self.oracles
            .get(address)
            .filter(|o| o.registered)
            .map(|o| o.indexes)
            .ok_or_else(|| SuretyError::unauthorized("not a registered oracle"))
    }

    pub fn tally(&self, key: &ResponseKey) -> Option<&ResponseTally> {
        self.tallies.get(key)
    }

    pub fn request_state(&self, key: &ResponseKey) -> Option<RequestState> {
        self.tallies.get(key).map(|t| t.state)
    }

    pub fn open_requests(&self) -> impl Iterator<Item = &ResponseKey> {
        self.tallies
            .iter()
            .filter(|(_, t)| t.state == RequestState::Open)
            .map(|(k, _)| k)
    }

    fn next_index(&mut self, seed: &[u8], cfg: &SuretyConfig, source: &dyn IndexSource) -> u8 {
        let index = source.draw(seed, self.nonce, cfg.index_range);
        self.nonce = self.nonce.wrapping_add(1);
        index
    }

    fn draw_distinct(
        &mut self,
        seed: &[u8],
        taken: &[u8],
        cfg: &SuretyConfig,
        source: &dyn IndexSource,
    ) -> u8 {
        let mut index = self.next_index(seed, cfg, source);
        for _ in 1..MAX_DRAW_ATTEMPTS {
            if !taken.contains(&index) {
                break;
            }
            index = self.next_index(seed, cfg, source);
        }
        index
    }

    pub fn register_oracle(
        &mut self,
        address: Address,
        fee: Amount,
        block: &BlockContext,
        cfg: &SuretyConfig,
        source: &dyn IndexSource,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<[u8; 3]> {
        if self.oracles.get(&address).is_some_and(|o| o.registered) {
            return Err(SuretyError::duplicate("oracle registration"));
        }
        if fee < cfg.oracle_registration_fee {
            return Err(SuretyError::InsufficientFee {
                provided: fee,
                required: cfg.oracle_registration_fee,
            });
        }

        let seed = entropy_seed(&address, block);
        let first = self.next_index(&seed, cfg, source);
        let second = self.draw_distinct(&seed, &[first], cfg, source);
        let third = self.draw_distinct(&seed, &[first, second], cfg, source);
        let indexes = [first, second, third];

        self.oracles.insert(
            address,
            OracleNode {
                address,
                indexes,
                registered: true,
                fee_paid: fee,
            },
        );
        info!(oracle = %short(&address), ?indexes, "oracle registered");
        events.push(LedgerEvent::OracleRegistered {
            oracle: address,
            indexes,
        });
        Ok(indexes)
    }

    /// Open (or re-announce) a status request for `flight` on a freshly drawn index.
    pub fn fetch_flight_status(
        &mut self,
        requester: Address,
        flight: &Flight,
        block: &BlockContext,
        cfg: &SuretyConfig,
        source: &dyn IndexSource,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<ResponseKey> {
        if flight.is_resolved() {
            return Err(SuretyError::precondition("flight status already resolved"));
        }
        let seed = entropy_seed(&requester, block);
        let index = self.next_index(&seed, cfg, source);
        let key = ResponseKey {
            index,
            flight: flight.key.clone(),
        };

        let reopen = match self.tallies.get(&key) {
            None => true,
            Some(t) => t.is_expired(block, cfg),
        };
        if reopen {
            self.tallies.insert(
                key.clone(),
                ResponseTally::open(requester, block.timestamp, cfg.tally_capacity),
            );
        }

        debug!(index, flight = %flight.key, reopened = reopen, "status request opened");
        events.push(LedgerEvent::OracleRequest {
            index,
            flight: flight.key.clone(),
            requester,
        });
        Ok(key)
    }

    /// Record one oracle response. `flight_resolved` reflects the catalog, which can be
    /// resolved through a different index than this one.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_response(
        &mut self,
        oracle: &Address,
        index: u8,
        flight: &FlightKey,
        status: FlightStatus,
        flight_resolved: bool,
        block: &BlockContext,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<SubmitOutcome> {
        let node = self
            .oracles
            .get(oracle)
            .filter(|o| o.registered)
            .ok_or_else(|| SuretyError::unauthorized("not a registered oracle"))?;
        if !node.indexes.contains(&index) {
            return Err(SuretyError::InvalidIndex { index });
        }
        if !status.is_terminal() {
            return Err(SuretyError::precondition("oracles must report a terminal status"));
        }

        let key = ResponseKey {
            index,
            flight: flight.clone(),
        };
        let tally = self
            .tallies
            .get_mut(&key)
            .ok_or_else(|| SuretyError::RequestNotFound {
                index,
                flight: flight.clone(),
            })?;

        if let RequestState::Sealed(_) = tally.state {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Sealed));
        }
        if flight_resolved {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::FlightResolved));
        }
        if tally.is_expired(block, cfg) {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::Expired));
        }
        if tally.responders.insert(*oracle, "oracle responders")? == Insert::AlreadyPresent {
            return Ok(SubmitOutcome::Ignored(IgnoreReason::AlreadyResponded));
        }

        let support_set = tally
            .support
            .entry(status)
            .or_insert_with(|| BoundedSet::new(cfg.tally_capacity));
        support_set.insert(*oracle, "status support")?;
        let support = support_set.len() as u32;

        events.push(LedgerEvent::OracleReport {
            index,
            flight: flight.clone(),
            status,
            oracle: *oracle,
            support,
        });

        if support < cfg.oracle_quorum {
            debug!(index, flight = %flight, ?status, support, "oracle response recorded");
            return Ok(SubmitOutcome::Recorded { support });
        }

        tally.state = RequestState::Sealed(status);
        info!(index, flight = %flight, ?status, support, "status request sealed");
        events.push(LedgerEvent::FlightStatusInfo {
            index,
            flight: flight.clone(),
            status,
        });
        Ok(SubmitOutcome::Sealed(status))
    }

    /// Drop open requests past their TTL. Sealed tallies are kept for audit.
    pub fn reap_expired(
        &mut self,
        block: &BlockContext,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> usize {
        let expired: Vec<ResponseKey> = self
            .tallies
            .iter()
            .filter(|(_, t)| t.is_expired(block, cfg))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.tallies.remove(key);
            events.push(LedgerEvent::RequestExpired {
                index: key.index,
                flight: key.flight.clone(),
            });
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "expired status requests reaped");
        }
        expired.len()
    }
}
