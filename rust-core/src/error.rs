//! Transaction failure reasons.
//!
//! Any error aborts the whole transaction; nothing it touched is committed.

use crate::bank::TransferError;
use crate::event::{Amount, FlightKey};
use thiserror::Error;

/// Coarse classification used as the abort reason code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    OperationSuspended,
    Duplicate,
    Precondition,
    InvalidIndex,
    OverflowOrLimit,
    Transfer,
    Encoding,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Authorization => "AUTHORIZATION",
            Self::OperationSuspended => "OPERATION_SUSPENDED",
            Self::Duplicate => "DUPLICATE",
            Self::Precondition => "PRECONDITION",
            Self::InvalidIndex => "INVALID_INDEX",
            Self::OverflowOrLimit => "OVERFLOW_OR_LIMIT",
            Self::Transfer => "TRANSFER",
            Self::Encoding => "ENCODING",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuretyError {
    #[error("operation suspended: ledger is not operational")]
    OperationSuspended,

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("duplicate {what}")]
    Duplicate { what: String },

    #[error("precondition failed: {reason}")]
    Precondition { reason: String },

    #[error("insufficient stake: {provided} below minimum {required}")]
    InsufficientStake { provided: Amount, required: Amount },

    #[error("insufficient fee: {provided} below registration fee {required}")]
    InsufficientFee { provided: Amount, required: Amount },

    #[error("insufficient payment: {provided} below ticket price {required}")]
    InsufficientPayment { provided: Amount, required: Amount },

    #[error("premium exceeds limit: {total} above cap {cap}")]
    PremiumExceedsLimit { total: Amount, cap: Amount },

    #[error("index {index} is not assigned to this oracle")]
    InvalidIndex { index: u8 },

    #[error("no open status request for index {index} on {flight}")]
    RequestNotFound { index: u8, flight: FlightKey },

    #[error("unknown flight {0}")]
    UnknownFlight(FlightKey),

    #[error("arithmetic overflow computing {what}")]
    Overflow { what: &'static str },

    #[error("{what} is full (capacity {capacity})")]
    CapacityExceeded { what: &'static str, capacity: usize },

    #[error("value transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("event encoding failed: {0}")]
    Encoding(String),
}

impl SuretyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OperationSuspended => ErrorKind::OperationSuspended,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Precondition { .. }
            | Self::InsufficientStake { .. }
            | Self::InsufficientFee { .. }
            | Self::InsufficientPayment { .. }
            | Self::PremiumExceedsLimit { .. }
            | Self::RequestNotFound { .. }
            | Self::UnknownFlight(_) => ErrorKind::Precondition,
            Self::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            Self::Overflow { .. } | Self::CapacityExceeded { .. } => ErrorKind::OverflowOrLimit,
            Self::Transfer(_) => ErrorKind::Transfer,
            Self::Encoding(_) => ErrorKind::Encoding,
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    pub(crate) fn duplicate(what: impl Into<String>) -> Self {
        Self::Duplicate { what: what.into() }
    }
}

impl From<serde_json::Error> for SuretyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

pub type Result<T, E = SuretyError> = std::result::Result<T, E>;
