//! The single mutation gate over the shared ledger state.
//!
//! Each transaction runs against a staged copy of the state. The copy replaces the live
//! state only if every step succeeds, and only then are its events appended to the log.

use crate::bank::{Balances, ValueTransfer};
use crate::config::{ConfigError, Genesis, SuretyConfig};
use crate::error::{Result, SuretyError};
use crate::event::{
    Address, Amount, BlockContext, ESCROW_ACCOUNT, FlightKey, FlightStatus, Hash, LedgerEvent,
    ORACLE_CONSENSUS_ACCOUNT, hex_bytes, short,
};
use crate::flights::{FlightCatalog, TicketQuote};
use crate::governance::{Admission, GovernanceEngine};
use crate::insurance::{InsuranceLedger, InsurancePolicy};
use crate::ledger::{EncodedEvent, EventLog};
use crate::oracle::{HashIndexSource, IndexSource, OracleConsensus, ResponseKey, SubmitOutcome};
use crate::registry::AccountRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, warn};

/// Entry points reachable by transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    SetOperatingStatus {
        operational: bool,
    },
    AuthorizeCaller {
        #[serde(with = "hex_bytes")]
        address: Address,
    },
    DeauthorizeCaller {
        #[serde(with = "hex_bytes")]
        address: Address,
    },
    RegisterAirline {
        #[serde(with = "hex_bytes")]
        candidate: Address,
    },
    FundAirline {
        #[serde(with = "hex_bytes")]
        airline: Address,
    },
    VoteForAirline {
        #[serde(with = "hex_bytes")]
        candidate: Address,
    },
    RegisterFlight {
        designator: String,
        departure: u64,
        base_price: Amount,
    },
    BuyInsurance {
        #[serde(with = "hex_bytes")]
        airline: Address,
        designator: String,
        departure: u64,
    },
    /// Seat at the base price; with `insured`, value above it is the premium.
    BuyTicket {
        #[serde(with = "hex_bytes")]
        airline: Address,
        designator: String,
        departure: u64,
        #[serde(default)]
        insured: bool,
    },
    WithdrawPayout,
    RegisterOracle,
    FetchFlightStatus {
        #[serde(with = "hex_bytes")]
        airline: Address,
        designator: String,
        departure: u64,
    },
    SubmitOracleResponse {
        index: u8,
        #[serde(with = "hex_bytes")]
        airline: Address,
        designator: String,
        departure: u64,
        status: u8,
    },
    ReapExpiredRequests,
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetOperatingStatus { .. } => "set_operating_status",
            Self::AuthorizeCaller { .. } => "authorize_caller",
            Self::DeauthorizeCaller { .. } => "deauthorize_caller",
            Self::RegisterAirline { .. } => "register_airline",
            Self::FundAirline { .. } => "fund_airline",
            Self::VoteForAirline { .. } => "vote_for_airline",
            Self::RegisterFlight { .. } => "register_flight",
            Self::BuyInsurance { .. } => "buy_insurance",
            Self::BuyTicket { .. } => "buy_ticket",
            Self::WithdrawPayout => "withdraw_payout",
            Self::RegisterOracle => "register_oracle",
            Self::FetchFlightStatus { .. } => "fetch_flight_status",
            Self::SubmitOracleResponse { .. } => "submit_oracle_response",
            Self::ReapExpiredRequests => "reap_expired_requests",
        }
    }

    /// Calls that accept attached value.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            Self::FundAirline { .. }
                | Self::BuyInsurance { .. }
                | Self::BuyTicket { .. }
                | Self::RegisterOracle
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "hex_bytes")]
    pub sender: Address,
    /// Attached value, moved into escrow before the call runs.
    #[serde(default)]
    pub value: Amount,
    pub call: Call,
}

impl Transaction {
    pub fn new(sender: Address, call: Call) -> Self {
        Self {
            sender,
            value: 0,
            call,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Call-specific result of a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Admission(Admission),
    FlightRegistered(FlightKey),
    TicketIssued { price: Amount, premium: Amount },
    OracleIndexes([u8; 3]),
    RequestOpened(ResponseKey),
    Response(SubmitOutcome),
    Withdrawn(Amount),
    Reaped(usize),
}

#[derive(Clone, Debug)]
pub struct Receipt {
    pub first_seq: u64,
    pub events: Vec<LedgerEvent>,
    pub log_hashes: Vec<Hash>,
    pub outcome: Outcome,
}

/// All authoritative state. Cloned per transaction for all-or-nothing commits.
#[derive(Clone, Debug)]
pub struct LedgerState<B> {
    registry: AccountRegistry,
    governance: GovernanceEngine,
    flights: FlightCatalog,
    insurance: InsuranceLedger,
    oracles: OracleConsensus,
    bank: B,
}

impl<B: ValueTransfer + Clone> LedgerState<B> {
    fn genesis(genesis: &Genesis, cfg: &SuretyConfig, bank: B) -> Self {
        let mut registry = AccountRegistry::new(genesis.owner);
        registry.seed_authorized(ORACLE_CONSENSUS_ACCOUNT);
        Self {
            registry,
            governance: GovernanceEngine::with_genesis_airline(genesis.first_airline, cfg.tally_capacity),
            flights: FlightCatalog::new(),
            insurance: InsuranceLedger::new(),
            oracles: OracleConsensus::new(),
            bank,
        }
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn governance(&self) -> &GovernanceEngine {
        &self.governance
    }

    pub fn flights(&self) -> &FlightCatalog {
        &self.flights
    }

    pub fn insurance(&self) -> &InsuranceLedger {
        &self.insurance
    }

    pub fn oracles(&self) -> &OracleConsensus {
        &self.oracles
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    fn apply(
        &mut self,
        cfg: &SuretyConfig,
        source: &dyn IndexSource,
        block: &BlockContext,
        tx: &Transaction,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Outcome> {
        let sender = tx.sender;

        // The owner must be able to resume a suspended ledger.
        if !matches!(tx.call, Call::SetOperatingStatus { .. }) {
            self.registry.require_operational()?;
        }
        if tx.value > 0 {
            if !tx.call.is_payable() {
                return Err(SuretyError::precondition(format!(
                    "{} does not accept value",
                    tx.call.name()
                )));
            }
            self.bank.transfer(&sender, &ESCROW_ACCOUNT, tx.value)?;
        }

        match &tx.call {
            Call::SetOperatingStatus { operational } => {
                self.registry
                    .set_operating_status(&sender, *operational, events)?;
                Ok(Outcome::Done)
            }
            Call::AuthorizeCaller { address } => {
                self.registry.authorize_caller(&sender, *address, events)?;
                Ok(Outcome::Done)
            }
            Call::DeauthorizeCaller { address } => {
                self.registry.deauthorize_caller(&sender, *address, events)?;
                Ok(Outcome::Done)
            }
            Call::RegisterAirline { candidate } => self
                .governance
                .register_airline(*candidate, &sender, cfg, events)
                .map(Outcome::Admission),
            Call::FundAirline { airline } => {
                self.governance
                    .fund_airline(*airline, tx.value, cfg, events)?;
                Ok(Outcome::Done)
            }
            Call::VoteForAirline { candidate } => self
                .governance
                .vote_for_airline(*candidate, &sender, events)
                .map(Outcome::Admission),
            Call::RegisterFlight {
                designator,
                departure,
                base_price,
            } => {
                self.governance.require_participant(&sender)?;
                self.flights
                    .register_flight(sender, designator, *departure, *base_price, events)
                    .map(Outcome::FlightRegistered)
            }
            Call::BuyInsurance {
                airline,
                designator,
                departure,
            } => {
                let key = FlightKey::new(*airline, designator.as_str(), *departure);
                let flight = self.flights.require_flight(&key)?;
                self.insurance
                    .buy_insurance(sender, flight, tx.value, cfg, events)?;
                Ok(Outcome::Done)
            }
            Call::BuyTicket {
                airline,
                designator,
                departure,
                insured,
            } => {
                let key = FlightKey::new(*airline, designator.as_str(), *departure);
                let price = self.flights.issue_ticket(sender, &key, events)?;
                let premium = tx.value.checked_sub(price).ok_or(SuretyError::InsufficientPayment {
                    provided: tx.value,
                    required: price,
                })?;
                if *insured {
                    let flight = self.flights.require_flight(&key)?;
                    self.insurance
                        .buy_insurance(sender, flight, premium, cfg, events)?;
                } else if premium > 0 {
                    return Err(SuretyError::precondition(
                        "uninsured ticket must be paid at exactly the base price",
                    ));
                }
                if price > 0 {
                    self.bank.transfer(&ESCROW_ACCOUNT, airline, price)?;
                }
                Ok(Outcome::TicketIssued { price, premium })
            }
            Call::WithdrawPayout => self
                .insurance
                .withdraw_payout(&sender, &mut self.bank, events)
                .map(Outcome::Withdrawn),
            Call::RegisterOracle => self
                .oracles
                .register_oracle(sender, tx.value, block, cfg, source, events)
                .map(Outcome::OracleIndexes),
            Call::FetchFlightStatus {
                airline,
                designator,
                departure,
            } => {
                let key = FlightKey::new(*airline, designator.as_str(), *departure);
                let flight = self.flights.require_flight(&key)?;
                self.oracles
                    .fetch_flight_status(sender, flight, block, cfg, source, events)
                    .map(Outcome::RequestOpened)
            }
            Call::SubmitOracleResponse {
                index,
                airline,
                designator,
                departure,
                status,
            } => {
                let status = FlightStatus::from_code(*status).ok_or_else(|| {
                    SuretyError::precondition(format!("unknown status code {status}"))
                })?;
                let key = FlightKey::new(*airline, designator.as_str(), *departure);
                let resolved = self.flights.require_flight(&key)?.is_resolved();
                let outcome = self.oracles.submit_response(
                    &sender, *index, &key, status, resolved, block, cfg, events,
                )?;
                if let SubmitOutcome::Sealed(sealed) = outcome {
                    self.settle(&key, sealed, cfg, events)?;
                }
                Ok(Outcome::Response(outcome))
            }
            Call::ReapExpiredRequests => {
                Ok(Outcome::Reaped(self.oracles.reap_expired(block, cfg, events)))
            }
        }
    }

    /// Write the sealed status and fan it out to policies, as the oracle component.
    fn settle(
        &mut self,
        key: &FlightKey,
        status: FlightStatus,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        if !self.flights.resolve(key, status)? {
            return Ok(());
        }
        self.insurance.process_flight_status(
            &self.registry,
            &ORACLE_CONSENSUS_ACCOUNT,
            key,
            status,
            cfg,
            events,
        )?;
        Ok(())
    }
}

pub struct Surety<B = Balances> {
    config: SuretyConfig,
    state: LedgerState<B>,
    log: EventLog,
    index_source: Box<dyn IndexSource + Send + Sync>,
}

impl<B: ValueTransfer + Clone> Surety<B> {
    /// Build the ledger from genesis; the genesis airline and oracle authorization are
    /// recorded as the first log entries.
    pub fn new(config: SuretyConfig, genesis: &Genesis, bank: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = LedgerState::genesis(genesis, &config, bank);
        let mut log = EventLog::new();
        let block = BlockContext::default();
        for event in [
            LedgerEvent::CallerAuthorized {
                address: ORACLE_CONSENSUS_ACCOUNT,
            },
            LedgerEvent::AirlineRegistered {
                airline: genesis.first_airline,
            },
            // Seeded as funded without a deposit.
            LedgerEvent::AirlineFunded {
                airline: genesis.first_airline,
                amount: 0,
                total_stake: 0,
            },
        ] {
            log.append(block, EncodedEvent::encode(event)?);
        }
        Ok(Self {
            config,
            state,
            log,
            index_source: Box::new(HashIndexSource),
        })
    }

    pub fn with_index_source<S>(mut self, source: S) -> Self
    where
        S: IndexSource + Send + Sync + 'static,
    {
        self.index_source = Box::new(source);
        self
    }

    /// Apply one transaction atomically.
    pub fn execute(&mut self, block: BlockContext, tx: Transaction) -> Result<Receipt> {
        let span = debug_span!(
            "tx",
            call = tx.call.name(),
            sender = %short(&tx.sender),
            height = block.height
        );
        let _enter = span.enter();

        let mut staged = self.state.clone();
        let mut events = Vec::new();
        let outcome = match staged.apply(
            &self.config,
            self.index_source.as_ref(),
            &block,
            &tx,
            &mut events,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(code = e.kind().code(), error = %e, "transaction reverted");
                return Err(e);
            }
        };

        let encoded = events
            .into_iter()
            .map(EncodedEvent::encode)
            .collect::<Result<Vec<_>, _>>()?;

        self.state = staged;
        let first_seq = self.log.len() as u64;
        let mut events = Vec::with_capacity(encoded.len());
        let mut log_hashes = Vec::with_capacity(encoded.len());
        for e in encoded {
            events.push(e.event.clone());
            log_hashes.push(self.log.append(block, e));
        }
        debug!(events = events.len(), "transaction committed");

        Ok(Receipt {
            first_seq,
            events,
            log_hashes,
            outcome,
        })
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn state(&self) -> &LedgerState<B> {
        &self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn is_operational(&self) -> bool {
        self.state.registry.is_operational()
    }

    pub fn is_authorized(&self, address: &Address) -> bool {
        self.state.registry.is_authorized(address)
    }

    pub fn airline_registered(&self, airline: &Address) -> bool {
        self.state.governance.airline_registered(airline)
    }

    pub fn airline_funded(&self, airline: &Address) -> bool {
        self.state.governance.airline_funded(airline)
    }

    pub fn ticket_price(&self, designator: &str, departure: u64, airline: Address) -> Result<Amount> {
        self.state.flights.ticket_price(designator, departure, airline)
    }

    pub fn ticket_quote(&self, designator: &str, departure: u64, airline: Address) -> Result<TicketQuote> {
        self.state
            .flights
            .ticket_quote(designator, departure, airline, self.config.premium_cap)
    }

    pub fn has_ticket(&self, passenger: &Address, flight: &FlightKey) -> bool {
        self.state.flights.has_ticket(passenger, flight)
    }

    pub fn flight_status(&self, key: &FlightKey) -> Result<FlightStatus> {
        self.state.flights.flight_status(key)
    }

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<&InsurancePolicy> {
        self.state.insurance.policy(passenger, flight)
    }

    pub fn oracle_indexes(&self, oracle: &Address) -> Result<[u8; 3]> {
        self.state.oracles.oracle_indexes(oracle)
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.bank.balance_of(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ETHER;
    use crate::insurance::PolicyState;
    use crate::oracle::FixedIndexSource;

    const OWNER: Address = [1; 32];
    const FIRST: Address = [2; 32];
    const PASSENGER: Address = [3; 32];

    fn surety() -> Surety {
        let genesis = Genesis {
            owner: OWNER,
            first_airline: FIRST,
            balances: Vec::new(),
        };
        let bank = Balances::with_balances([(FIRST, 100 * ETHER), (PASSENGER, 10 * ETHER)]);
        Surety::new(SuretyConfig::default(), &genesis, bank)
            .unwrap()
            .with_index_source(FixedIndexSource(4))
    }

    fn block(n: u64) -> BlockContext {
        BlockContext {
            height: n,
            timestamp: 1_000 + n,
        }
    }

    #[test]
    fn genesis_seeds_first_airline_and_log() {
        let s = surety();
        assert!(s.airline_registered(&FIRST));
        assert!(s.airline_funded(&FIRST));
        assert!(s.is_authorized(&ORACLE_CONSENSUS_ACCOUNT));
        assert_eq!(s.log().len(), 3);
        assert_eq!(
            s.log().get(2).unwrap().event,
            LedgerEvent::AirlineFunded {
                airline: FIRST,
                amount: 0,
                total_stake: 0,
            }
        );
        assert!(s.log().verify_chain().is_ok());
    }

    #[test]
    fn suspended_ledger_rejects_everything_but_resume() {
        let mut s = surety();
        s.execute(block(1), Transaction::new(OWNER, Call::SetOperatingStatus { operational: false }))
            .unwrap();
        let err = s
            .execute(block(2), Transaction::new(FIRST, Call::RegisterAirline { candidate: [5; 32] }))
            .unwrap_err();
        assert_eq!(err, SuretyError::OperationSuspended);

        s.execute(block(3), Transaction::new(OWNER, Call::SetOperatingStatus { operational: true }))
            .unwrap();
        s.execute(block(4), Transaction::new(FIRST, Call::RegisterAirline { candidate: [5; 32] }))
            .unwrap();
        assert!(s.airline_registered(&[5; 32]));
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let mut s = surety();
        let before_log = s.log().len();
        let register = Call::RegisterFlight {
            designator: "ND1309".into(),
            departure: 42,
            base_price: ETHER / 2,
        };
        s.execute(block(1), Transaction::new(FIRST, register)).unwrap();
        let key = FlightKey::new(FIRST, "ND1309", 42);

        // Over the cap: escrow transfer happened in the staged copy only.
        let buy = Call::BuyInsurance {
            airline: FIRST,
            designator: "ND1309".into(),
            departure: 42,
        };
        let err = s
            .execute(block(2), Transaction::new(PASSENGER, buy).with_value(2 * ETHER))
            .unwrap_err();
        assert!(matches!(err, SuretyError::PremiumExceedsLimit { .. }));
        assert_eq!(s.balance_of(&PASSENGER), 10 * ETHER);
        assert_eq!(s.balance_of(&ESCROW_ACCOUNT), 0);
        assert!(s.policy(&PASSENGER, &key).is_none());
        assert_eq!(s.log().len(), before_log + 1);
    }

    fn register_flight(s: &mut Surety, designator: &str, base_price: Amount) {
        let call = Call::RegisterFlight {
            designator: designator.into(),
            departure: 42,
            base_price,
        };
        s.execute(block(1), Transaction::new(FIRST, call)).unwrap();
    }

    fn ticket(designator: &str, insured: bool) -> Call {
        Call::BuyTicket {
            airline: FIRST,
            designator: designator.into(),
            departure: 42,
            insured,
        }
    }

    #[test]
    fn padded_designator_reaches_the_registered_flight() {
        let mut s = surety();
        register_flight(&mut s, "ND1309 ", ETHER / 2);
        let buy = Call::BuyInsurance {
            airline: FIRST,
            designator: "ND1309 ".into(),
            departure: 42,
        };
        s.execute(block(2), Transaction::new(PASSENGER, buy).with_value(ETHER / 10))
            .unwrap();
        let key = FlightKey::new(FIRST, "ND1309", 42);
        assert_eq!(s.policy(&PASSENGER, &key).unwrap().premium, ETHER / 10);
        assert_eq!(s.ticket_price(" ND1309", 42, FIRST).unwrap(), ETHER / 2);
    }

    #[test]
    fn insured_ticket_pays_airline_and_opens_policy() {
        let mut s = surety();
        register_flight(&mut s, "ND1309", ETHER / 2);
        let quote = s.ticket_quote("ND1309", 42, FIRST).unwrap();
        assert_eq!(quote.base_price, ETHER / 2);
        assert_eq!(quote.insured_price, ETHER / 2 + ETHER);

        let receipt = s
            .execute(
                block(2),
                Transaction::new(PASSENGER, ticket("ND1309", true)).with_value(ETHER / 2 + ETHER / 10),
            )
            .unwrap();
        assert_eq!(
            receipt.outcome,
            Outcome::TicketIssued {
                price: ETHER / 2,
                premium: ETHER / 10
            }
        );
        let key = FlightKey::new(FIRST, "ND1309", 42);
        assert!(s.has_ticket(&PASSENGER, &key));
        assert_eq!(s.balance_of(&FIRST), 100 * ETHER + ETHER / 2);
        assert_eq!(s.balance_of(&ESCROW_ACCOUNT), ETHER / 10);
        let policy = s.policy(&PASSENGER, &key).unwrap();
        assert_eq!(policy.state, PolicyState::Bought);
        assert_eq!(policy.premium, ETHER / 10);
    }

    #[test]
    fn ticket_payment_must_match_the_price() {
        let mut s = surety();
        register_flight(&mut s, "ND1309", ETHER / 2);
        let key = FlightKey::new(FIRST, "ND1309", 42);

        let err = s
            .execute(block(2), Transaction::new(PASSENGER, ticket("ND1309", false)).with_value(ETHER / 4))
            .unwrap_err();
        assert!(matches!(err, SuretyError::InsufficientPayment { .. }));

        let err = s
            .execute(block(3), Transaction::new(PASSENGER, ticket("ND1309", false)).with_value(ETHER))
            .unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));

        // Insured with nothing above the base price buys no policy.
        let err = s
            .execute(block(4), Transaction::new(PASSENGER, ticket("ND1309", true)).with_value(ETHER / 2))
            .unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));
        assert!(!s.has_ticket(&PASSENGER, &key));
        assert_eq!(s.balance_of(&PASSENGER), 10 * ETHER);

        let receipt = s
            .execute(block(5), Transaction::new(PASSENGER, ticket("ND1309", false)).with_value(ETHER / 2))
            .unwrap();
        assert_eq!(
            receipt.outcome,
            Outcome::TicketIssued {
                price: ETHER / 2,
                premium: 0
            }
        );
        assert!(s.policy(&PASSENGER, &key).is_none());
        assert_eq!(s.balance_of(&ESCROW_ACCOUNT), 0);
    }

    #[test]
    fn value_on_non_payable_call_is_rejected() {
        let mut s = surety();
        let err = s
            .execute(
                block(1),
                Transaction::new(FIRST, Call::RegisterAirline { candidate: [5; 32] }).with_value(1),
            )
            .unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));
        assert!(!s.airline_registered(&[5; 32]));
    }

    #[test]
    fn revoked_oracle_authorization_blocks_settlement() {
        let mut s = surety();
        s.execute(
            block(1),
            Transaction::new(
                FIRST,
                Call::RegisterFlight {
                    designator: "ND1309".into(),
                    departure: 42,
                    base_price: 0,
                },
            ),
        )
        .unwrap();
        for n in 10..13u8 {
            s.state.bank.mint([n; 32], ETHER);
            s.execute(block(2), Transaction::new([n; 32], Call::RegisterOracle).with_value(ETHER))
                .unwrap();
        }
        s.execute(
            block(3),
            Transaction::new(
                PASSENGER,
                Call::FetchFlightStatus {
                    airline: FIRST,
                    designator: "ND1309".into(),
                    departure: 42,
                },
            ),
        )
        .unwrap();
        s.execute(
            block(4),
            Transaction::new(OWNER, Call::DeauthorizeCaller { address: ORACLE_CONSENSUS_ACCOUNT }),
        )
        .unwrap();

        let respond = |n: u8| {
            Transaction::new(
                [n; 32],
                Call::SubmitOracleResponse {
                    index: 4,
                    airline: FIRST,
                    designator: "ND1309".into(),
                    departure: 42,
                    status: FlightStatus::LateAirline.code(),
                },
            )
        };
        s.execute(block(5), respond(10)).unwrap();
        s.execute(block(5), respond(11)).unwrap();
        let err = s.execute(block(5), respond(12)).unwrap_err();
        assert!(matches!(err, SuretyError::Unauthorized { .. }));

        // The sealing response was reverted along with the fan-out.
        let key = FlightKey::new(FIRST, "ND1309", 42);
        assert_eq!(s.flight_status(&key).unwrap(), FlightStatus::Unknown);
        assert_eq!(s.state().insurance().policy_state(&PASSENGER, &key), PolicyState::NotPurchased);
    }
}
