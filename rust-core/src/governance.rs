use crate::config::SuretyConfig;
use crate::error::{Result, SuretyError};
use crate::event::{Address, Amount, LedgerEvent, short};
use crate::tally::{BoundedSet, Insert};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Airline membership record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub address: Address,
    pub exists: bool,
    /// Monotonic: once set it is never cleared.
    pub funded: bool,
    pub registered: bool,
    /// Total stake deposited, excess over the minimum included.
    pub stake: Amount,
    /// Voters for the pending candidacy; emptied on registration.
    pub votes: BoundedSet,
}

impl Airline {
    fn nominated(address: Address, capacity: usize) -> Self {
        Self {
            address,
            exists: true,
            funded: false,
            registered: false,
            stake: 0,
            votes: BoundedSet::new(capacity),
        }
    }

    pub fn is_participant(&self) -> bool {
        self.registered && self.funded
    }
}

/// Result of a nomination or vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Registered,
    Pending { votes: u32, funded_airlines: u32 },
    /// Voter had already backed this candidacy; nothing changed.
    AlreadyVoted { votes: u32 },
}

/// Airline admission: direct registration below the membership threshold,
/// majority of funded airlines beyond it.
#[derive(Clone, Debug, Default)]
pub struct GovernanceEngine {
    airlines: BTreeMap<Address, Airline>,
    registered_count: u32,
    funded_count: u32,
}

impl GovernanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the first airline as registered and funded.
    pub fn with_genesis_airline(first_airline: Address, capacity: usize) -> Self {
        let mut airline = Airline::nominated(first_airline, capacity);
        airline.registered = true;
        airline.funded = true;
        let mut engine = Self::new();
        engine.airlines.insert(first_airline, airline);
        engine.registered_count = 1;
        engine.funded_count = 1;
        engine
    }

    pub fn airline(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn is_airline(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| a.exists)
    }

    pub fn airline_registered(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| a.registered)
    }

    pub fn airline_funded(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(|a| a.funded)
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        self.airlines.get(address).is_some_and(Airline::is_participant)
    }

    pub fn registered_airline_count(&self) -> u32 {
        self.registered_count
    }

    pub fn funded_airline_count(&self) -> u32 {
        self.funded_count
    }

    pub fn existing_airline_count(&self) -> u32 {
        self.airlines.len() as u32
    }

    pub fn votes_for(&self, candidate: &Address) -> u32 {
        self.airlines
            .get(candidate)
            .map(|a| a.votes.len() as u32)
            .unwrap_or(0)
    }

    /// Registered and funded; required to nominate, vote, and list flights.
    pub fn require_participant(&self, address: &Address) -> Result<()> {
        match self.airlines.get(address) {
            Some(a) if a.is_participant() => Ok(()),
            Some(a) if a.registered => Err(SuretyError::unauthorized("airline has not provided funding")),
            Some(_) => Err(SuretyError::unauthorized("airline is not registered")),
            None => Err(SuretyError::unauthorized("caller is not an airline")),
        }
    }

    pub fn register_airline(
        &mut self,
        candidate: Address,
        proposer: &Address,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Admission> {
        self.require_participant(proposer)?;
        if self.airline_registered(&candidate) {
            return Err(SuretyError::duplicate("airline registration"));
        }

        if self.registered_count < cfg.direct_registration_limit {
            let airline = self
                .airlines
                .entry(candidate)
                .or_insert_with(|| Airline::nominated(candidate, cfg.tally_capacity));
            airline.registered = true;
            airline.votes.clear();
            self.registered_count += 1;
            info!(airline = %short(&candidate), registered = self.registered_count, "airline registered directly");
            events.push(LedgerEvent::AirlineRegistered { airline: candidate });
            return Ok(Admission::Registered);
        }

        if !self.airlines.contains_key(&candidate) {
            self.airlines
                .insert(candidate, Airline::nominated(candidate, cfg.tally_capacity));
            events.push(LedgerEvent::AirlineNominated {
                airline: candidate,
                proposer: *proposer,
            });
        }
        self.record_vote(candidate, proposer, events)
    }

    pub fn vote_for_airline(
        &mut self,
        candidate: Address,
        voter: &Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Admission> {
        self.require_participant(voter)?;
        match self.airlines.get(&candidate) {
            None => Err(SuretyError::precondition("candidate has not been nominated")),
            Some(a) if a.registered => Err(SuretyError::duplicate("airline registration")),
            Some(_) => self.record_vote(candidate, voter, events),
        }
    }

    // Quorum: 2 * votes >= funded airlines. Voters are funded airlines, so a vote set
    // sized to the funded count can always reach quorum.
    fn record_vote(
        &mut self,
        candidate: Address,
        voter: &Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Admission> {
        let funded_airlines = self.funded_count;
        let airline = self
            .airlines
            .get_mut(&candidate)
            .ok_or_else(|| SuretyError::precondition("candidate has not been nominated"))?;

        airline.votes.grow_to(funded_airlines as usize);
        if airline.votes.insert(*voter, "airline votes")? == Insert::AlreadyPresent {
            let votes = airline.votes.len() as u32;
            debug!(airline = %short(&candidate), voter = %short(voter), "duplicate vote ignored");
            return Ok(Admission::AlreadyVoted { votes });
        }

        let votes = airline.votes.len() as u32;
        events.push(LedgerEvent::AirlineVoted {
            airline: candidate,
            voter: *voter,
            votes,
            funded_airlines,
        });

        if u64::from(votes) * 2 < u64::from(funded_airlines) {
            debug!(airline = %short(&candidate), votes, funded_airlines, "vote recorded");
            return Ok(Admission::Pending {
                votes,
                funded_airlines,
            });
        }

        airline.registered = true;
        airline.votes.clear();
        self.registered_count += 1;
        info!(airline = %short(&candidate), votes, funded_airlines, "airline registered by vote");
        events.push(LedgerEvent::AirlineRegistered { airline: candidate });
        Ok(Admission::Registered)
    }

    /// Attach a stake of at least the configured minimum. Top-ups are retained.
    pub fn fund_airline(
        &mut self,
        address: Address,
        amount: Amount,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        if amount < cfg.airline_fund_minimum {
            return Err(SuretyError::InsufficientStake {
                provided: amount,
                required: cfg.airline_fund_minimum,
            });
        }
        let airline = self
            .airlines
            .get_mut(&address)
            .filter(|a| a.exists)
            .ok_or_else(|| SuretyError::precondition("airline does not exist"))?;

        airline.stake = airline
            .stake
            .checked_add(amount)
            .ok_or(SuretyError::Overflow { what: "airline stake" })?;
        if !airline.funded {
            airline.funded = true;
            self.funded_count += 1;
        }
        info!(airline = %short(&address), amount, total = airline.stake, "airline funded");
        events.push(LedgerEvent::AirlineFunded {
            airline: address,
            amount,
            total_stake: airline.stake,
        });
        Ok(())
    }
}
