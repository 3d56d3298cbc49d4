use crate::bank::ValueTransfer;
use crate::config::SuretyConfig;
use crate::error::{Result, SuretyError};
use crate::event::{Address, Amount, ESCROW_ACCOUNT, FlightKey, FlightStatus, LedgerEvent, short};
use crate::flights::Flight;
use crate::registry::AccountRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Policy lifecycle. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyState {
    NotPurchased,
    Bought,
    Credited,
    Paid,
    /// Flight resolved without an airline-caused delay; nothing is owed.
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub passenger: Address,
    pub flight: FlightKey,
    pub premium: Amount,
    pub state: PolicyState,
    /// Set on Bought -> Credited, zeroed when paid.
    pub payout: Amount,
}

/// Counts from fanning one resolved status out to a flight's policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanOut {
    pub credited: usize,
    pub closed: usize,
}

#[derive(Clone, Debug, Default)]
pub struct InsuranceLedger {
    policies: BTreeMap<(Address, FlightKey), InsurancePolicy>,
    by_flight: BTreeMap<FlightKey, BTreeSet<Address>>,
    by_passenger: BTreeMap<Address, BTreeSet<FlightKey>>,
    resolved: BTreeSet<FlightKey>,
}

impl InsuranceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<&InsurancePolicy> {
        self.policies.get(&(*passenger, flight.clone()))
    }

    /// State of a (passenger, flight) pair; NotPurchased when no policy exists.
    pub fn policy_state(&self, passenger: &Address, flight: &FlightKey) -> PolicyState {
        self.policy(passenger, flight)
            .map(|p| p.state)
            .unwrap_or(PolicyState::NotPurchased)
    }

    pub fn policies_of(&self, passenger: &Address) -> impl Iterator<Item = &InsurancePolicy> {
        self.by_passenger
            .get(passenger)
            .into_iter()
            .flatten()
            .filter_map(move |f| self.policies.get(&(*passenger, f.clone())))
    }

    /// Sum of credited, not yet withdrawn payouts.
    pub fn pending_payout(&self, passenger: &Address) -> Amount {
        self.policies_of(passenger)
            .filter(|p| p.state == PolicyState::Credited)
            .fold(0, |acc: Amount, p| acc.saturating_add(p.payout))
    }

    pub fn is_resolved(&self, flight: &FlightKey) -> bool {
        self.resolved.contains(flight)
    }

    /// Create or top up a Bought policy. The premium has already reached escrow.
    pub fn buy_insurance(
        &mut self,
        passenger: Address,
        flight: &Flight,
        premium: Amount,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        if flight.is_resolved() || self.is_resolved(&flight.key) {
            return Err(SuretyError::precondition("flight status already resolved"));
        }
        if premium == 0 {
            return Err(SuretyError::precondition("premium must be greater than zero"));
        }

        let key = (passenger, flight.key.clone());
        let existing = self.policies.get(&key);
        let paid_so_far = match existing {
            None => 0,
            Some(p) if p.state == PolicyState::Bought => p.premium,
            Some(p) => {
                return Err(SuretyError::precondition(format!(
                    "policy is {:?}, cannot add premium",
                    p.state
                )));
            }
        };
        let total = paid_so_far
            .checked_add(premium)
            .ok_or(SuretyError::Overflow { what: "premium" })?;
        if total > cfg.premium_cap {
            return Err(SuretyError::PremiumExceedsLimit {
                total,
                cap: cfg.premium_cap,
            });
        }

        self.policies.insert(
            key,
            InsurancePolicy {
                passenger,
                flight: flight.key.clone(),
                premium: total,
                state: PolicyState::Bought,
                payout: 0,
            },
        );
        self.by_flight
            .entry(flight.key.clone())
            .or_default()
            .insert(passenger);
        self.by_passenger
            .entry(passenger)
            .or_default()
            .insert(flight.key.clone());

        info!(passenger = %short(&passenger), flight = %flight.key, premium, total, "insurance bought");
        events.push(LedgerEvent::InsuranceBought {
            passenger,
            flight: flight.key.clone(),
            premium,
            total_premium: total,
        });
        Ok(())
    }

    /// Fan a sealed status out to every Bought policy on the flight.
    /// Only an authorized caller may drive this; a second call for the same flight is a no-op.
    pub fn process_flight_status(
        &mut self,
        registry: &AccountRegistry,
        caller: &Address,
        flight: &FlightKey,
        status: FlightStatus,
        cfg: &SuretyConfig,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Option<FanOut>> {
        registry.require_authorized(caller)?;
        if !status.is_terminal() {
            return Err(SuretyError::precondition("cannot settle policies on Unknown status"));
        }
        if self.resolved.contains(flight) {
            debug!(flight = %flight, "flight already processed");
            return Ok(None);
        }

        let passengers: Vec<Address> = self
            .by_flight
            .get(flight)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        // Compute every payout first so an overflow leaves no policy half-settled.
        let mut settlements = Vec::with_capacity(passengers.len());
        for passenger in passengers {
            let Some(policy) = self.policies.get(&(passenger, flight.clone())) else {
                continue;
            };
            if policy.state != PolicyState::Bought {
                continue;
            }
            let payout = if status.is_airline_caused() {
                Some(payout_for(policy.premium, cfg)?)
            } else {
                None
            };
            settlements.push((passenger, payout));
        }

        let mut fan_out = FanOut::default();
        for (passenger, payout) in settlements {
            let Some(policy) = self.policies.get_mut(&(passenger, flight.clone())) else {
                continue;
            };
            match payout {
                Some(amount) => {
                    policy.state = PolicyState::Credited;
                    policy.payout = amount;
                    fan_out.credited += 1;
                    events.push(LedgerEvent::InsuranceCredited {
                        passenger,
                        flight: flight.clone(),
                        payout: amount,
                    });
                }
                None => {
                    policy.state = PolicyState::Closed;
                    fan_out.closed += 1;
                    events.push(LedgerEvent::InsuranceClosed {
                        passenger,
                        flight: flight.clone(),
                    });
                }
            }
        }
        self.resolved.insert(flight.clone());

        info!(flight = %flight, ?status, credited = fan_out.credited, closed = fan_out.closed, "policies settled");
        Ok(Some(fan_out))
    }

    /// Pay every credited policy of `passenger` out of escrow.
    /// The payout is zeroed and the policy marked Paid before each transfer.
    pub fn withdraw_payout<B: ValueTransfer>(
        &mut self,
        passenger: &Address,
        bank: &mut B,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Amount> {
        let credited: Vec<FlightKey> = self
            .policies_of(passenger)
            .filter(|p| p.state == PolicyState::Credited)
            .map(|p| p.flight.clone())
            .collect();

        let mut total: Amount = 0;
        for flight in credited {
            let Some(policy) = self.policies.get_mut(&(*passenger, flight.clone())) else {
                continue;
            };
            let amount = std::mem::take(&mut policy.payout);
            policy.state = PolicyState::Paid;

            bank.transfer(&ESCROW_ACCOUNT, passenger, amount)?;
            total = total
                .checked_add(amount)
                .ok_or(SuretyError::Overflow { what: "withdrawal total" })?;
            events.push(LedgerEvent::InsurancePaid {
                passenger: *passenger,
                flight,
                amount,
            });
        }

        if total == 0 {
            debug!(passenger = %short(passenger), "nothing to withdraw");
        } else {
            info!(passenger = %short(passenger), total, "payout withdrawn");
        }
        Ok(total)
    }
}

/// premium * numerator / denominator, checked.
pub fn payout_for(premium: Amount, cfg: &SuretyConfig) -> Result<Amount> {
    if cfg.payout_denominator == 0 {
        return Err(SuretyError::Overflow { what: "payout (zero denominator)" });
    }
    premium
        .checked_mul(cfg.payout_numerator)
        .map(|v| v / cfg.payout_denominator)
        .ok_or(SuretyError::Overflow { what: "payout" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Balances;
    use crate::event::{ETHER, ORACLE_CONSENSUS_ACCOUNT};

    const PASSENGER: Address = [3; 32];
    const OTHER: Address = [4; 32];

    fn flight() -> Flight {
        Flight {
            key: FlightKey::new([7; 32], "ND1309", 1_700_000_000),
            base_price: 0,
            status: FlightStatus::Unknown,
        }
    }

    fn registry() -> AccountRegistry {
        let mut reg = AccountRegistry::new([1; 32]);
        reg.seed_authorized(ORACLE_CONSENSUS_ACCOUNT);
        reg
    }

    #[test]
    fn premium_cap_is_enforced_across_top_ups() {
        let cfg = SuretyConfig::default();
        let mut ledger = InsuranceLedger::new();
        let f = flight();
        let mut events = Vec::new();

        ledger.buy_insurance(PASSENGER, &f, ETHER / 2, &cfg, &mut events).unwrap();
        ledger.buy_insurance(PASSENGER, &f, ETHER / 2, &cfg, &mut events).unwrap();
        let err = ledger.buy_insurance(PASSENGER, &f, 1, &cfg, &mut events).unwrap_err();
        assert!(matches!(err, SuretyError::PremiumExceedsLimit { .. }));
        assert_eq!(ledger.policy(&PASSENGER, &f.key).unwrap().premium, ETHER);

        let err = ledger.buy_insurance(OTHER, &f, 0, &cfg, &mut events).unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));
        assert_eq!(ledger.policy_state(&OTHER, &f.key), PolicyState::NotPurchased);
    }

    #[test]
    fn airline_delay_credits_one_and_a_half() {
        let cfg = SuretyConfig::default();
        let mut ledger = InsuranceLedger::new();
        let f = flight();
        let mut events = Vec::new();
        ledger.buy_insurance(PASSENGER, &f, ETHER / 10, &cfg, &mut events).unwrap();

        let fan = ledger
            .process_flight_status(&registry(), &ORACLE_CONSENSUS_ACCOUNT, &f.key, FlightStatus::LateAirline, &cfg, &mut events)
            .unwrap();
        assert_eq!(fan, Some(FanOut { credited: 1, closed: 0 }));
        let policy = ledger.policy(&PASSENGER, &f.key).unwrap();
        assert_eq!(policy.state, PolicyState::Credited);
        assert_eq!(policy.payout, 15 * ETHER / 100);

        // Second resolution is a no-op.
        let again = ledger
            .process_flight_status(&registry(), &ORACLE_CONSENSUS_ACCOUNT, &f.key, FlightStatus::OnTime, &cfg, &mut events)
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(ledger.policy_state(&PASSENGER, &f.key), PolicyState::Credited);
    }

    #[test]
    fn other_statuses_close_policies() {
        let cfg = SuretyConfig::default();
        let mut ledger = InsuranceLedger::new();
        let f = flight();
        ledger.buy_insurance(PASSENGER, &f, ETHER / 10, &cfg, &mut Vec::new()).unwrap();
        ledger
            .process_flight_status(&registry(), &ORACLE_CONSENSUS_ACCOUNT, &f.key, FlightStatus::LateWeather, &cfg, &mut Vec::new())
            .unwrap();
        let policy = ledger.policy(&PASSENGER, &f.key).unwrap();
        assert_eq!(policy.state, PolicyState::Closed);
        assert_eq!(policy.payout, 0);

        let err = ledger.buy_insurance(PASSENGER, &f, 1, &cfg, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));
    }

    #[test]
    fn unauthorized_caller_cannot_settle() {
        let cfg = SuretyConfig::default();
        let mut ledger = InsuranceLedger::new();
        let f = flight();
        let err = ledger
            .process_flight_status(&registry(), &PASSENGER, &f.key, FlightStatus::LateAirline, &cfg, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, SuretyError::Unauthorized { .. }));
        assert!(!ledger.is_resolved(&f.key));
    }

    #[test]
    fn withdraw_pays_exactly_once() {
        let cfg = SuretyConfig::default();
        let mut ledger = InsuranceLedger::new();
        let mut bank = Balances::with_balances([(ESCROW_ACCOUNT, ETHER)]);
        let f = flight();
        ledger.buy_insurance(PASSENGER, &f, ETHER / 10, &cfg, &mut Vec::new()).unwrap();
        ledger
            .process_flight_status(&registry(), &ORACLE_CONSENSUS_ACCOUNT, &f.key, FlightStatus::LateAirline, &cfg, &mut Vec::new())
            .unwrap();
        assert_eq!(ledger.pending_payout(&PASSENGER), 15 * ETHER / 100);

        let paid = ledger.withdraw_payout(&PASSENGER, &mut bank, &mut Vec::new()).unwrap();
        assert_eq!(paid, 15 * ETHER / 100);
        assert_eq!(bank.balance_of(&PASSENGER), 15 * ETHER / 100);
        let policy = ledger.policy(&PASSENGER, &f.key).unwrap();
        assert_eq!(policy.state, PolicyState::Paid);
        assert_eq!(policy.payout, 0);

        let second = ledger.withdraw_payout(&PASSENGER, &mut bank, &mut Vec::new()).unwrap();
        assert_eq!(second, 0);
        assert_eq!(bank.balance_of(&PASSENGER), 15 * ETHER / 100);
    }

    #[test]
    fn payout_overflow_is_reported() {
        let cfg = SuretyConfig::default();
        assert!(matches!(
            payout_for(Amount::MAX, &cfg),
            Err(SuretyError::Overflow { .. })
        ));
        assert_eq!(payout_for(2, &cfg).unwrap(), 3);
    }
}
