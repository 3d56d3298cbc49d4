use crate::error::{Result, SuretyError};
use crate::event::{Address, Amount, FlightKey, FlightStatus, LedgerEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub base_price: Amount,
    /// Unknown until oracles seal a terminal status; set once.
    pub status: FlightStatus,
}

impl Flight {
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Price of a seat alone and with the largest premium the cap allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketQuote {
    pub base_price: Amount,
    pub insured_price: Amount,
}

#[derive(Clone, Debug, Default)]
pub struct FlightCatalog {
    flights: BTreeMap<FlightKey, Flight>,
    /// One seat per passenger per flight.
    tickets: BTreeSet<(FlightKey, Address)>,
}

impl FlightCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caller authorization (registered + funded airline) is checked by the gate.
    pub fn register_flight(
        &mut self,
        airline: Address,
        designator: &str,
        departure: u64,
        base_price: Amount,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<FlightKey> {
        let key = FlightKey::new(airline, designator, departure);
        if key.designator.is_empty() {
            return Err(SuretyError::precondition("flight designator must not be empty"));
        }
        if self.flights.contains_key(&key) {
            return Err(SuretyError::duplicate(format!("flight {key}")));
        }
        self.flights.insert(
            key.clone(),
            Flight {
                key: key.clone(),
                base_price,
                status: FlightStatus::Unknown,
            },
        );
        info!(flight = %key, base_price, "flight registered");
        events.push(LedgerEvent::FlightRegistered {
            flight: key.clone(),
            base_price,
        });
        Ok(key)
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn require_flight(&self, key: &FlightKey) -> Result<&Flight> {
        self.flights
            .get(key)
            .ok_or_else(|| SuretyError::UnknownFlight(key.clone()))
    }

    pub fn flight_status(&self, key: &FlightKey) -> Result<FlightStatus> {
        self.require_flight(key).map(|f| f.status)
    }

    pub fn ticket_price(&self, designator: &str, departure: u64, airline: Address) -> Result<Amount> {
        let key = FlightKey::new(airline, designator, departure);
        self.require_flight(&key).map(|f| f.base_price)
    }

    pub fn ticket_quote(
        &self,
        designator: &str,
        departure: u64,
        airline: Address,
        premium_cap: Amount,
    ) -> Result<TicketQuote> {
        let base_price = self.ticket_price(designator, departure, airline)?;
        Ok(TicketQuote {
            base_price,
            insured_price: base_price.saturating_add(premium_cap),
        })
    }

    pub fn has_ticket(&self, passenger: &Address, key: &FlightKey) -> bool {
        self.tickets.contains(&(key.clone(), *passenger))
    }

    /// Sell a seat on an unresolved flight. Returns the base price owed to the airline.
    pub fn issue_ticket(
        &mut self,
        passenger: Address,
        key: &FlightKey,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Amount> {
        let flight = self.require_flight(key)?;
        if flight.is_resolved() {
            return Err(SuretyError::precondition("flight status already resolved"));
        }
        let price = flight.base_price;
        if !self.tickets.insert((key.clone(), passenger)) {
            return Err(SuretyError::duplicate(format!("ticket for {key}")));
        }
        info!(flight = %key, price, "ticket issued");
        events.push(LedgerEvent::TicketPurchased {
            passenger,
            flight: key.clone(),
            price,
        });
        Ok(price)
    }

    /// Record the sealed status. Returns false when the flight was already resolved.
    pub(crate) fn resolve(&mut self, key: &FlightKey, status: FlightStatus) -> Result<bool> {
        if !status.is_terminal() {
            return Err(SuretyError::precondition("cannot resolve a flight to Unknown"));
        }
        let flight = self
            .flights
            .get_mut(key)
            .ok_or_else(|| SuretyError::UnknownFlight(key.clone()))?;
        if flight.is_resolved() {
            return Ok(false);
        }
        flight.status = status;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AIRLINE: Address = [7; 32];

    #[test]
    fn register_and_price_lookup() {
        let mut catalog = FlightCatalog::new();
        let mut events = Vec::new();
        let key = catalog
            .register_flight(AIRLINE, "ND1309", 1_700_000_000, 250, &mut events)
            .unwrap();
        assert_eq!(catalog.ticket_price("ND1309", 1_700_000_000, AIRLINE).unwrap(), 250);
        assert_eq!(catalog.flight_status(&key).unwrap(), FlightStatus::Unknown);
        assert_eq!(events.len(), 1);

        let err = catalog
            .register_flight(AIRLINE, "ND1309", 1_700_000_000, 300, &mut events)
            .unwrap_err();
        assert!(matches!(err, SuretyError::Duplicate { .. }));

        assert!(matches!(
            catalog.ticket_price("XX1", 1, AIRLINE),
            Err(SuretyError::UnknownFlight(_))
        ));
    }

    #[test]
    fn padded_designator_resolves_to_one_flight() {
        let mut catalog = FlightCatalog::new();
        let key = catalog
            .register_flight(AIRLINE, "ND1309 ", 5, 100, &mut Vec::new())
            .unwrap();
        assert_eq!(key.designator, "ND1309");
        assert_eq!(catalog.ticket_price("ND1309 ", 5, AIRLINE).unwrap(), 100);
        assert_eq!(catalog.ticket_price(" ND1309", 5, AIRLINE).unwrap(), 100);

        let err = catalog
            .register_flight(AIRLINE, "ND1309", 5, 100, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, SuretyError::Duplicate { .. }));
        assert!(catalog.register_flight(AIRLINE, "  ", 5, 100, &mut Vec::new()).is_err());
    }

    #[test]
    fn one_ticket_per_passenger_until_resolution() {
        let mut catalog = FlightCatalog::new();
        let key = catalog
            .register_flight(AIRLINE, "ND1309", 9, 400, &mut Vec::new())
            .unwrap();
        let passenger = [3; 32];
        let mut events = Vec::new();

        assert_eq!(catalog.issue_ticket(passenger, &key, &mut events).unwrap(), 400);
        assert!(catalog.has_ticket(&passenger, &key));
        let err = catalog.issue_ticket(passenger, &key, &mut events).unwrap_err();
        assert!(matches!(err, SuretyError::Duplicate { .. }));

        catalog.resolve(&key, FlightStatus::OnTime).unwrap();
        let err = catalog.issue_ticket([4; 32], &key, &mut events).unwrap_err();
        assert!(matches!(err, SuretyError::Precondition { .. }));
        assert_eq!(events.len(), 1);

        let quote = catalog.ticket_quote("ND1309", 9, AIRLINE, 100).unwrap();
        assert_eq!(quote, TicketQuote { base_price: 400, insured_price: 500 });
    }

    #[test]
    fn status_resolves_once() {
        let mut catalog = FlightCatalog::new();
        let key = catalog
            .register_flight(AIRLINE, "ND1309", 1, 0, &mut Vec::new())
            .unwrap();
        assert!(catalog.resolve(&key, FlightStatus::LateWeather).unwrap());
        assert!(!catalog.resolve(&key, FlightStatus::LateAirline).unwrap());
        assert_eq!(catalog.flight_status(&key).unwrap(), FlightStatus::LateWeather);
        assert!(catalog.resolve(&key, FlightStatus::Unknown).is_err());
    }
}
