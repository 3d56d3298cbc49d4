// Account registry: contract owner, operational switch, and callers allowed to
// drive internal entry points (the oracle component's policy fan-out).

use crate::error::{Result, SuretyError};
use crate::event::{Address, LedgerEvent};
use std::collections::BTreeSet;
use tracing::info;

#[derive(Clone, Debug)]
pub struct AccountRegistry {
    owner: Address,
    operational: bool,
    authorized: BTreeSet<Address>,
}

impl AccountRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            operational: true,
            authorized: BTreeSet::new(),
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn is_authorized(&self, address: &Address) -> bool {
        self.authorized.contains(address)
    }

    /// First check of every mutating entry point.
    pub fn require_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::OperationSuspended)
        }
    }

    pub fn require_owner(&self, caller: &Address) -> Result<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(SuretyError::unauthorized("caller is not the contract owner"))
        }
    }

    pub fn require_authorized(&self, caller: &Address) -> Result<()> {
        if self.is_authorized(caller) {
            Ok(())
        } else {
            Err(SuretyError::unauthorized("caller is not authorized"))
        }
    }

    /// Owner-only; callable while suspended so the ledger can be resumed.
    pub fn set_operating_status(
        &mut self,
        caller: &Address,
        operational: bool,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        self.require_owner(caller)?;
        if self.operational == operational {
            return Ok(());
        }
        self.operational = operational;
        info!(operational, "operating status changed");
        events.push(LedgerEvent::OperatingStatusChanged { operational });
        Ok(())
    }

    pub fn authorize_caller(
        &mut self,
        caller: &Address,
        address: Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        self.require_owner(caller)?;
        if self.authorized.insert(address) {
            events.push(LedgerEvent::CallerAuthorized { address });
        }
        Ok(())
    }

    pub fn deauthorize_caller(
        &mut self,
        caller: &Address,
        address: Address,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<()> {
        self.require_owner(caller)?;
        if self.authorized.remove(&address) {
            events.push(LedgerEvent::CallerDeauthorized { address });
        }
        Ok(())
    }

    /// Genesis seeding, bypasses the owner check.
    pub(crate) fn seed_authorized(&mut self, address: Address) {
        self.authorized.insert(address);
    }
}
