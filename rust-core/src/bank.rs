// Value-transfer seam. The host ledger supplies an atomic, all-or-nothing transfer;
// `Balances` is the in-memory stand-in used by the replay tool and tests.

use crate::event::{Address, Amount, short};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("account {account} holds {available}, needs {requested}")]
    InsufficientBalance {
        account: String,
        available: Amount,
        requested: Amount,
    },
    #[error("balance overflow crediting {account}")]
    Overflow { account: String },
}

pub trait ValueTransfer {
    fn balance_of(&self, account: &Address) -> Amount;

    /// Move `amount` from `from` to `to`. Either both sides change or neither does.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), TransferError>;
}

#[derive(Clone, Debug, Default)]
pub struct Balances {
    accounts: HashMap<Address, Amount>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances<I: IntoIterator<Item = (Address, Amount)>>(balances: I) -> Self {
        let mut out = Self::new();
        for (account, amount) in balances {
            out.mint(account, amount);
        }
        out
    }

    /// Credit out of thin air; genesis and tests only.
    pub fn mint(&mut self, account: Address, amount: Amount) {
        let entry = self.accounts.entry(account).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

impl ValueTransfer for Balances {
    fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), TransferError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: short(from),
                available,
                requested: amount,
            });
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow { account: short(to) })?;

        self.accounts.insert(*from, available - amount);
        self.accounts.insert(*to, credited);
        Ok(())
    }
}
