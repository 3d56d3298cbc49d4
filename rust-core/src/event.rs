// Ledger vocabulary: addresses, amounts, flight keys, status codes, and the events
// every committed transaction appends to the log.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Hash = [u8; 32];
pub type Address = [u8; 32];

/// Smallest indivisible unit of the host ledger's native asset.
pub type Amount = u128;

pub const ZERO_HASH: Hash = [0u8; 32];
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// One whole unit of the native asset (10^18 base units).
pub const ETHER: Amount = 1_000_000_000_000_000_000;

/// Account that holds airline stakes, oracle fees and premiums until paid out.
pub const ESCROW_ACCOUNT: Address = [0xE5; 32];

/// Identity the oracle component presents when it fans resolved status out to policies.
pub const ORACLE_CONSENSUS_ACCOUNT: Address = [0x0C; 32];

/// Hex (de)serialization for 32-byte identifiers.
pub mod hex_bytes {
    use hex::FromHex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(d)?;
        <[u8; 32]>::from_hex(raw.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

/// Short form for logs: first four bytes in hex.
pub fn short(addr: &Address) -> String {
    hex::encode(&addr[..4])
}

/// Flight status codes as reported by oracles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightStatus {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl FlightStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            10 => Some(Self::OnTime),
            20 => Some(Self::LateAirline),
            30 => Some(Self::LateWeather),
            40 => Some(Self::LateTechnical),
            50 => Some(Self::LateOther),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Unknown
    }

    /// Only delays the airline is responsible for pay out.
    pub fn is_airline_caused(self) -> bool {
        self == Self::LateAirline
    }
}

/// Flight identity: (airline, designator, departure timestamp).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    #[serde(with = "hex_bytes")]
    pub airline: Address,
    pub designator: String,
    pub departure: u64,
}

impl FlightKey {
    /// Surrounding whitespace is not part of a designator.
    pub fn new(airline: Address, designator: impl AsRef<str>, departure: u64) -> Self {
        Self {
            airline,
            designator: designator.as_ref().trim().to_string(),
            departure,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", short(&self.airline), self.designator, self.departure)
    }
}

/// Block the transaction is included in; the only source of time and entropy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: u64,
    pub timestamp: u64,
}

/// Lifecycle events; the only channel through which off-ledger parties observe state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    OperatingStatusChanged {
        operational: bool,
    },
    CallerAuthorized {
        #[serde(with = "hex_bytes")]
        address: Address,
    },
    CallerDeauthorized {
        #[serde(with = "hex_bytes")]
        address: Address,
    },
    AirlineNominated {
        #[serde(with = "hex_bytes")]
        airline: Address,
        #[serde(with = "hex_bytes")]
        proposer: Address,
    },
    AirlineVoted {
        #[serde(with = "hex_bytes")]
        airline: Address,
        #[serde(with = "hex_bytes")]
        voter: Address,
        votes: u32,
        funded_airlines: u32,
    },
    AirlineRegistered {
        #[serde(with = "hex_bytes")]
        airline: Address,
    },
    AirlineFunded {
        #[serde(with = "hex_bytes")]
        airline: Address,
        amount: Amount,
        total_stake: Amount,
    },
    FlightRegistered {
        flight: FlightKey,
        base_price: Amount,
    },
    TicketPurchased {
        #[serde(with = "hex_bytes")]
        passenger: Address,
        flight: FlightKey,
        price: Amount,
    },
    InsuranceBought {
        #[serde(with = "hex_bytes")]
        passenger: Address,
        flight: FlightKey,
        premium: Amount,
        total_premium: Amount,
    },
    OracleRegistered {
        #[serde(with = "hex_bytes")]
        oracle: Address,
        indexes: [u8; 3],
    },
    OracleRequest {
        index: u8,
        flight: FlightKey,
        #[serde(with = "hex_bytes")]
        requester: Address,
    },
    OracleReport {
        index: u8,
        flight: FlightKey,
        status: FlightStatus,
        #[serde(with = "hex_bytes")]
        oracle: Address,
        support: u32,
    },
    FlightStatusInfo {
        index: u8,
        flight: FlightKey,
        status: FlightStatus,
    },
    RequestExpired {
        index: u8,
        flight: FlightKey,
    },
    InsuranceCredited {
        #[serde(with = "hex_bytes")]
        passenger: Address,
        flight: FlightKey,
        payout: Amount,
    },
    InsuranceClosed {
        #[serde(with = "hex_bytes")]
        passenger: Address,
        flight: FlightKey,
    },
    InsurancePaid {
        #[serde(with = "hex_bytes")]
        passenger: Address,
        flight: FlightKey,
        amount: Amount,
    },
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OperatingStatusChanged { .. } => "operating_status_changed",
            Self::CallerAuthorized { .. } => "caller_authorized",
            Self::CallerDeauthorized { .. } => "caller_deauthorized",
            Self::AirlineNominated { .. } => "airline_nominated",
            Self::AirlineVoted { .. } => "airline_voted",
            Self::AirlineRegistered { .. } => "airline_registered",
            Self::AirlineFunded { .. } => "airline_funded",
            Self::FlightRegistered { .. } => "flight_registered",
            Self::TicketPurchased { .. } => "ticket_purchased",
            Self::InsuranceBought { .. } => "insurance_bought",
            Self::OracleRegistered { .. } => "oracle_registered",
            Self::OracleRequest { .. } => "oracle_request",
            Self::OracleReport { .. } => "oracle_report",
            Self::FlightStatusInfo { .. } => "flight_status_info",
            Self::RequestExpired { .. } => "request_expired",
            Self::InsuranceCredited { .. } => "insurance_credited",
            Self::InsuranceClosed { .. } => "insurance_closed",
            Self::InsurancePaid { .. } => "insurance_paid",
        }
    }

    /// Bytes hashed into the event log.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
